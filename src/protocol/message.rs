//! Message and payload types.
//!
//! A [`Message`] carries a correlation id, a namespaced method, the
//! protocol version of its sender and an argument [`Payload`]. It is created
//! by the sender and consumed once by the receiving dispatcher.
//!
//! # Wire Format
//!
//! ```json
//! {
//!   "omid_message_guid": "uuid",
//!   "omid_message_method": "SessionService.impressionOccurred",
//!   "omid_message_version": "1.4.10-iab4600",
//!   "omid_message_args": [ ... ] | "[...]"
//! }
//! ```
//!
//! Relay channels prefix the JSON text with [`PROTOCOL_TAG`]. Unknown keys
//! are ignored; `omid_message_args` may be absent.

// ============================================================================
// Imports
// ============================================================================

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::MessageId;

// ============================================================================
// Constants
// ============================================================================

/// Prefix identifying protocol traffic on a shared delivery point.
pub const PROTOCOL_TAG: &str = "omid://";

/// Wire key of the correlation id.
pub const KEY_ID: &str = "omid_message_guid";

/// Wire key of the method name.
pub const KEY_METHOD: &str = "omid_message_method";

/// Wire key of the sender's protocol version.
pub const KEY_VERSION: &str = "omid_message_version";

/// Wire key of the argument payload.
pub const KEY_ARGS: &str = "omid_message_args";

// ============================================================================
// ElementHandle
// ============================================================================

/// Direct reference to an object living in the sender's context.
///
/// Handles travel only over direct channels. They compare equal when they
/// point at the same object.
#[derive(Clone)]
pub struct ElementHandle {
    inner: Arc<dyn Any + Send + Sync>,
}

impl ElementHandle {
    /// Wraps a host object.
    #[must_use]
    pub fn new<T: Any + Send + Sync>(element: T) -> Self {
        Self {
            inner: Arc::new(element),
        }
    }

    /// Returns the wrapped object if it has type `T`.
    #[inline]
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }
}

impl PartialEq for ElementHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ElementHandle")
            .field(&Arc::as_ptr(&self.inner).cast::<()>())
            .finish()
    }
}

// ============================================================================
// Arg
// ============================================================================

/// One argument of a remote call.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// Plain JSON value, transmissible over every channel.
    Json(Value),
    /// Direct reference, transmissible over direct channels only.
    Element(ElementHandle),
}

impl Arg {
    /// Returns the JSON value, if this is not a direct reference.
    #[inline]
    #[must_use]
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Element(_) => None,
        }
    }

    /// Returns the string value, if this is a JSON string.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.as_json().and_then(Value::as_str)
    }

    /// Returns `true` if the argument can cross a context boundary.
    #[inline]
    #[must_use]
    pub fn is_transmissible(&self) -> bool {
        matches!(self, Self::Json(_))
    }
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Self::Json(Value::from(value))
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Self::Json(Value::from(value))
    }
}

impl From<f64> for Arg {
    fn from(value: f64) -> Self {
        Self::Json(Value::from(value))
    }
}

impl From<u64> for Arg {
    fn from(value: u64) -> Self {
        Self::Json(Value::from(value))
    }
}

impl From<bool> for Arg {
    fn from(value: bool) -> Self {
        Self::Json(Value::from(value))
    }
}

impl From<ElementHandle> for Arg {
    fn from(value: ElementHandle) -> Self {
        Self::Element(value)
    }
}

// ============================================================================
// Payload
// ============================================================================

/// Encoded argument list as carried by a [`Message`].
///
/// Which form is used is decided by the message version, see
/// [`codec`](super::codec).
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Payload {
    /// No arguments were attached.
    #[default]
    Absent,
    /// JSON text, used by protocol revisions before the cutover.
    Encoded(String),
    /// Structured values, used from the cutover on.
    Structured(Vec<Arg>),
}

impl Payload {
    /// Converts the payload to its wire value.
    ///
    /// Returns `None` for an absent payload.
    fn to_wire(&self, method: &str) -> Result<Option<Value>> {
        match self {
            Self::Absent => Ok(None),
            Self::Encoded(text) => Ok(Some(Value::String(text.clone()))),
            Self::Structured(args) => args
                .iter()
                .map(|arg| {
                    arg.as_json()
                        .cloned()
                        .ok_or_else(|| Error::not_transmissible(method))
                })
                .collect::<Result<Vec<_>>>()
                .map(|values| Some(Value::Array(values))),
        }
    }

    /// Reads a payload from its wire value.
    ///
    /// A lone structured value that is not a list is one argument.
    fn from_wire(value: Option<Value>) -> Self {
        match value {
            None | Some(Value::Null) => Self::Absent,
            Some(Value::String(text)) => Self::Encoded(text),
            Some(Value::Array(values)) => {
                Self::Structured(values.into_iter().map(Arg::Json).collect())
            }
            Some(other) => Self::Structured(vec![Arg::Json(other)]),
        }
    }
}

// ============================================================================
// WireMessage
// ============================================================================

/// Serde mirror of the wire object.
#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    #[serde(rename = "omid_message_guid")]
    id: String,

    #[serde(rename = "omid_message_method")]
    method: String,

    #[serde(rename = "omid_message_version")]
    version: String,

    #[serde(
        rename = "omid_message_args",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    args: Option<Value>,
}

// ============================================================================
// Message
// ============================================================================

/// A protocol message. Immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Correlation id.
    pub id: MessageId,

    /// Method in `Service.operation` form, or `response` / `error`.
    pub method: String,

    /// Protocol version of the sender.
    pub version: String,

    /// Encoded arguments.
    pub args: Payload,
}

impl Message {
    /// Creates a message.
    #[inline]
    #[must_use]
    pub fn new(
        id: impl Into<MessageId>,
        method: impl Into<String>,
        version: impl Into<String>,
        args: Payload,
    ) -> Self {
        Self {
            id: id.into(),
            method: method.into(),
            version: version.into(),
            args,
        }
    }

    /// Returns `true` if `raw` carries the id, method and version keys as
    /// strings. The args key is optional. Never panics.
    #[must_use]
    pub fn is_well_formed(raw: &Value) -> bool {
        raw.is_object() && WireMessage::deserialize(raw).is_ok()
    }

    /// Reads a message from its wire object.
    ///
    /// Returns `None` if the object is not well formed.
    #[must_use]
    pub fn from_wire(raw: &Value) -> Option<Self> {
        if !raw.is_object() {
            return None;
        }
        let wire = WireMessage::deserialize(raw).ok()?;
        Some(Self {
            id: MessageId::from(wire.id),
            method: wire.method,
            version: wire.version,
            args: Payload::from_wire(wire.args),
        })
    }

    /// Converts the message to its wire object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotTransmissible`] if the payload holds a direct
    /// reference.
    pub fn to_wire(&self) -> Result<Value> {
        let wire = WireMessage {
            id: self.id.to_string(),
            method: self.method.clone(),
            version: self.version.clone(),
            args: self.args.to_wire(&self.method)?,
        };
        Ok(serde_json::to_value(wire)?)
    }

    /// Renders the tagged text form used on relay channels.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotTransmissible`] if the payload holds a direct
    /// reference.
    pub fn to_tagged(&self) -> Result<String> {
        let json = serde_json::to_string(&self.to_wire()?)?;
        Ok(format!("{PROTOCOL_TAG}{json}"))
    }

    /// Parses the tagged text form.
    ///
    /// Returns `None` for untagged, unparsable or malformed data.
    #[must_use]
    pub fn from_tagged(data: &str) -> Option<Self> {
        let json = data.strip_prefix(PROTOCOL_TAG)?;
        let raw: Value = serde_json::from_str(json).ok()?;
        Self::from_wire(&raw)
    }
}

// ============================================================================
// Tests
// ============================================================================
