//! Plain-text extraction from Slack Events API payloads.
//!
//! Slack delivers message text as rich-text blocks:
//! `event.blocks[].elements[].elements[]`, where the innermost elements are
//! tagged by `type` (`text`, `user`, `link`, `emoji`, ...). Only the first
//! block's first element group is inspected.

use serde_json::Value;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("malformed slack payload: {0}")]
    MalformedPayload(String),
}

/// Challenge token, if the payload carries one.
pub fn challenge(payload: &Value) -> Option<&str> {
    payload.get("challenge").and_then(Value::as_str)
}

/// A `url_verification` handshake: a challenge and no event.
pub fn is_url_verification(payload: &Value) -> bool {
    challenge(payload).is_some() && payload.get("event").is_none()
}

/// Trimmed text of the first `text` element in the first block's first
/// element group. Nothing outside that path is looked at.
pub fn extract_message(payload: &Value) -> Result<String, ExtractError> {
    let event = payload
        .get("event")
        .ok_or_else(|| malformed("no event in payload"))?;
    let block = event
        .get("blocks")
        .and_then(Value::as_array)
        .and_then(|blocks| blocks.first())
        .ok_or_else(|| malformed("event has no blocks"))?;
    let group = block
        .get("elements")
        .and_then(Value::as_array)
        .and_then(|groups| groups.first())
        .ok_or_else(|| malformed("first block has no elements"))?;
    let element = group
        .get("elements")
        .and_then(Value::as_array)
        .and_then(|elements| {
            elements
                .iter()
                .find(|element| element.get("type").and_then(Value::as_str) == Some("text"))
        })
        .ok_or_else(|| malformed("no text element in first element group"))?;
    let text = element
        .get("text")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("text element has no text"))?;

    Ok(text.trim().to_string())
}

fn malformed(reason: &str) -> ExtractError {
    ExtractError::MalformedPayload(reason.to_string())
}
