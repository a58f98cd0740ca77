pub mod command;
pub mod reply;
pub mod signature;
pub mod xml;

pub use command::parse_command;
pub use signature::verify_signature;
pub use xml::parse_inbound;

use crate::analytics::AnalyticsPipeline;
use crate::config::Settings;
use crate::domain::message::{Command, InboundMessage, MessageKind, OutboundMessage};
use chrono::Utc;

#[derive(Debug, Clone)]
pub struct ProtocolConfig {
    pub shared_secret: String,
    /// Accept every request without checking its signature. Local use only.
    pub bypass_signature: bool,
}

impl ProtocolConfig {
    /// `DEBUG_MODE` enables the bypass; otherwise `WECHAT_TOKEN` is required.
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        if settings.debug_mode {
            return Ok(Self {
                shared_secret: settings.wechat_token.clone().unwrap_or_default(),
                bypass_signature: true,
            });
        }
        Ok(Self {
            shared_secret: settings.require_wechat_token()?.to_string(),
            bypass_signature: false,
        })
    }
}

/// Result of handling one webhook body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookReply {
    Outbound(OutboundMessage),
    /// The payload could not be parsed into a message; carries an explanation
    /// for the caller.
    Malformed(String),
}

/// Stateless request handler for the chat webhook.
#[derive(Clone)]
pub struct CommandProtocol {
    config: ProtocolConfig,
    pipeline: AnalyticsPipeline,
}

impl CommandProtocol {
    pub fn new(config: ProtocolConfig, pipeline: AnalyticsPipeline) -> Self {
        if config.bypass_signature {
            tracing::warn!("webhook signature verification is DISABLED; every request will be accepted");
        }
        Self { config, pipeline }
    }

    pub fn verify(&self, signature: &str, timestamp: &str, nonce: &str) -> bool {
        if self.config.bypass_signature {
            tracing::warn!(timestamp, nonce, "signature check bypassed");
            return true;
        }
        let ok = verify_signature(signature, timestamp, nonce, &self.config.shared_secret);
        if !ok {
            tracing::warn!(timestamp, nonce, "webhook signature mismatch");
        }
        ok
    }

    pub async fn handle_payload(&self, raw: &str) -> WebhookReply {
        tracing::debug!(payload = raw, "webhook payload received");
        match parse_inbound(raw) {
            Ok(inbound) => WebhookReply::Outbound(self.respond(&inbound).await),
            Err(err) => {
                tracing::warn!(reason = %err.reason, "rejecting malformed webhook payload");
                WebhookReply::Malformed(reply::malformed(&err.reason))
            }
        }
    }

    /// Exactly one reply per inbound message, whatever its kind.
    pub async fn respond(&self, inbound: &InboundMessage) -> OutboundMessage {
        let text = match &inbound.kind {
            MessageKind::Text => {
                tracing::info!(sender = %inbound.sender, content = %inbound.content, "text message received");
                self.dispatch(&parse_command(&inbound.content)).await
            }
            MessageKind::Other(kind) => {
                tracing::info!(sender = %inbound.sender, kind = %kind, "unsupported message kind");
                reply::unsupported_kind(kind)
            }
        };
        format_outbound(inbound, text)
    }

    pub async fn dispatch(&self, command: &Command) -> String {
        match command {
            Command::Query(id) if id.is_empty() => reply::MISSING_CODE.to_string(),
            Command::Query(id) => match self.pipeline.run(id).await {
                Ok(result) => match result.latest() {
                    Some(latest) => reply::latest_summary(id, latest),
                    None => reply::query_failed(id),
                },
                Err(_) => reply::query_failed(id),
            },
            Command::Help => reply::HELP.to_string(),
            Command::Unknown => reply::UNKNOWN.to_string(),
        }
    }
}

/// Reply addressed back to the inbound sender, stamped with the current time.
pub fn format_outbound(inbound: &InboundMessage, reply_text: String) -> OutboundMessage {
    OutboundMessage {
        recipient: inbound.sender.clone(),
        sender: inbound.recipient.clone(),
        created_at: Utc::now().timestamp(),
        content: reply_text,
    }
}
