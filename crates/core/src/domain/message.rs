#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    Other(String),
}

impl MessageKind {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "text" => Self::Text,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Text => "text",
            Self::Other(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub kind: MessageKind,
    pub sender: String,
    pub recipient: String,
    /// Unix seconds, when the payload carries one.
    pub created_at: Option<i64>,
    /// Empty for non-text kinds.
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub recipient: String,
    pub sender: String,
    pub created_at: i64,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// An empty identifier means the user sent the keyword alone.
    Query(String),
    Help,
    Unknown,
}
