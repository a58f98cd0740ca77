use crate::domain::message::{InboundMessage, MessageKind, OutboundMessage};
use crate::error::MalformedMessage;
use anyhow::Context;
use quick_xml::events::{BytesCData, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
struct RawInbound {
    #[serde(rename = "ToUserName", default)]
    to_user: Option<String>,
    #[serde(rename = "FromUserName", default)]
    from_user: Option<String>,
    #[serde(rename = "CreateTime", default)]
    create_time: Option<String>,
    #[serde(rename = "MsgType", default)]
    msg_type: Option<String>,
    #[serde(rename = "Content", default)]
    content: Option<String>,
}

/// Parses a webhook XML payload. Any message kind is accepted; `MsgType`,
/// `FromUserName` and `ToUserName` are required.
pub fn parse_inbound(raw: &str) -> Result<InboundMessage, MalformedMessage> {
    let parsed: RawInbound = quick_xml::de::from_str(raw)
        .map_err(|e| MalformedMessage::new(format!("payload is not valid message XML: {e}")))?;

    let kind = MessageKind::parse(&required(parsed.msg_type, "MsgType")?);
    let sender = required(parsed.from_user, "FromUserName")?;
    let recipient = required(parsed.to_user, "ToUserName")?;

    // CreateTime is informational; a bad value never rejects the message.
    let created_at = match parsed.create_time.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => match s.parse::<i64>() {
            Ok(ts) => Some(ts),
            Err(_) => {
                tracing::warn!(create_time = s, "ignoring non-numeric CreateTime");
                None
            }
        },
        _ => None,
    };

    let content = match kind {
        MessageKind::Text => parsed.content.unwrap_or_default(),
        MessageKind::Other(_) => String::new(),
    };

    Ok(InboundMessage {
        kind,
        sender,
        recipient,
        created_at,
        content,
    })
}

fn required(value: Option<String>, field: &str) -> Result<String, MalformedMessage> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| MalformedMessage::new(format!("missing required field {field}")))
}

impl OutboundMessage {
    /// Serializes as a webhook text reply.
    pub fn to_xml(&self) -> anyhow::Result<String> {
        let mut w = Writer::new(Vec::new());
        w.write_event(Event::Start(BytesStart::new("xml")))
            .context("write reply root")?;
        write_cdata_element(&mut w, "ToUserName", &self.recipient)?;
        write_cdata_element(&mut w, "FromUserName", &self.sender)?;
        write_text_element(&mut w, "CreateTime", &self.created_at.to_string())?;
        write_cdata_element(&mut w, "MsgType", MessageKind::Text.as_str())?;
        write_cdata_element(&mut w, "Content", &self.content)?;
        w.write_event(Event::End(BytesEnd::new("xml")))
            .context("write reply root")?;
        String::from_utf8(w.into_inner()).context("reply XML is not UTF-8")
    }
}

fn write_cdata_element(w: &mut Writer<Vec<u8>>, name: &str, text: &str) -> anyhow::Result<()> {
    w.write_event(Event::Start(BytesStart::new(name)))
        .with_context(|| format!("write <{name}>"))?;
    for chunk in cdata_chunks(text) {
        w.write_event(Event::CData(BytesCData::new(chunk)))
            .with_context(|| format!("write <{name}> content"))?;
    }
    w.write_event(Event::End(BytesEnd::new(name)))
        .with_context(|| format!("write </{name}>"))?;
    Ok(())
}

fn write_text_element(w: &mut Writer<Vec<u8>>, name: &str, text: &str) -> anyhow::Result<()> {
    w.write_event(Event::Start(BytesStart::new(name)))
        .with_context(|| format!("write <{name}>"))?;
    w.write_event(Event::Text(BytesText::new(text)))
        .with_context(|| format!("write <{name}> content"))?;
    w.write_event(Event::End(BytesEnd::new(name)))
        .with_context(|| format!("write </{name}>"))?;
    Ok(())
}

// A CDATA section cannot contain "]]>", so the text is split across adjacent
// sections at every occurrence.
fn cdata_chunks(text: &str) -> Vec<String> {
    let parts: Vec<&str> = text.split("]]>").collect();
    let last = parts.len() - 1;
    parts
        .iter()
        .enumerate()
        .map(|(i, part)| {
            let mut chunk = String::with_capacity(part.len() + 3);
            if i > 0 {
                chunk.push('>');
            }
            chunk.push_str(part);
            if i < last {
                chunk.push_str("]]");
            }
            chunk
        })
        .collect()
}
