//! Version-gated argument encoding.
//!
//! Peers older than [`ARGS_CUTOVER_VERSION`](super::version::ARGS_CUTOVER_VERSION)
//! expect arguments as JSON text. Newer peers take the structured list as
//! is, which lets direct channels carry [`ElementHandle`](super::ElementHandle)s.
//! The form is chosen from the declared version only, never from the channel.

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;

use crate::error::{Error, Result};

use super::message::{Arg, Payload};
use super::version::uses_legacy_args;

// ============================================================================
// Encode / Decode
// ============================================================================

/// Encodes `args` for a message declared at `version`.
///
/// # Errors
///
/// Returns [`Error::Codec`] if a direct reference must be JSON encoded.
pub fn encode(version: &str, args: Vec<Arg>) -> Result<Payload> {
    if !uses_legacy_args(version) {
        return Ok(Payload::Structured(args));
    }

    let values = args
        .into_iter()
        .map(|arg| match arg {
            Arg::Json(value) => Ok(value),
            Arg::Element(_) => Err(Error::codec(format!(
                "direct references cannot be encoded at version {version}"
            ))),
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Payload::Encoded(serde_json::to_string(&Value::Array(values))?))
}

/// Decodes a payload received in a message declared at `version`.
///
/// Absent and empty payloads decode to no arguments. Before the cutover a
/// payload that is not text also decodes to no arguments.
///
/// # Errors
///
/// Returns [`Error::Json`] if legacy text is not valid JSON.
pub fn decode(version: &str, payload: Payload) -> Result<Vec<Arg>> {
    if uses_legacy_args(version) {
        return match payload {
            Payload::Encoded(text) if !text.is_empty() => {
                Ok(spread(serde_json::from_str(&text)?))
            }
            _ => Ok(Vec::new()),
        };
    }

    match payload {
        Payload::Absent => Ok(Vec::new()),
        Payload::Structured(args) => Ok(args),
        Payload::Encoded(text) if text.is_empty() => Ok(Vec::new()),
        Payload::Encoded(text) => Ok(vec![Arg::Json(Value::String(text))]),
    }
}

/// Spreads a decoded JSON value into an argument list.
fn spread(value: Value) -> Vec<Arg> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(values) => values.into_iter().map(Arg::Json).collect(),
        other => vec![Arg::Json(other)],
    }
}

// ============================================================================
// Tests
// ============================================================================
