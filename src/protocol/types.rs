//! Measurement value types.
//!
//! String-valued enums serialize to the exact names the service expects.
//!
//! | Type | Used by |
//! |------|---------|
//! | [`ErrorType`] | `sessionError` reports |
//! | [`AdEventType`] | Lifecycle and event listener types |
//! | [`VideoPosition`] | [`VastProperties`] |
//! | [`VideoPlayerState`] | `playerStateChange` |
//! | [`InteractionType`] | `adUserInteraction` |
//! | [`Rectangle`] | `setElementBounds` |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::Result;
use crate::validate::{assert_number, assert_positive_number};

// ============================================================================
// ErrorType
// ============================================================================

/// Category of a session error report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorType {
    /// Error not tied to media playback.
    Generic,
    /// Video playback error.
    Video,
    /// Media playback error.
    Media,
}

impl ErrorType {
    /// Returns the wire name.
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::Video => "video",
            Self::Media => "media",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// AdEventType
// ============================================================================

/// Event types delivered to session observers and event listeners.
///
/// Unrecognized names deserialize to [`AdEventType::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AdEventType {
    Impression,
    StateChange,
    GeometryChange,
    SessionStart,
    SessionError,
    SessionFinish,
    Media,
    Video,
    Loaded,
    Start,
    FirstQuartile,
    Midpoint,
    ThirdQuartile,
    Complete,
    Pause,
    Resume,
    BufferStart,
    BufferFinish,
    Skipped,
    VolumeChange,
    PlayerStateChange,
    AdUserInteraction,
    #[serde(other)]
    Other,
}

// ============================================================================
// SessionEvent
// ============================================================================

/// Lifecycle event as received by a session observer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEvent {
    /// Event type, read from the `type` field.
    #[serde(rename = "type")]
    pub event_type: AdEventType,

    /// Event-specific data.
    #[serde(default)]
    pub data: Option<Value>,
}

impl SessionEvent {
    /// Reads an event from an observer callback argument.
    ///
    /// Returns `None` if the value has no recognizable `type` field.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        Self::deserialize(value).ok()
    }
}

// ============================================================================
// VideoPosition
// ============================================================================

/// Placement of a video ad relative to the content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VideoPosition {
    Preroll,
    Midroll,
    Postroll,
    Standalone,
}

// ============================================================================
// VideoPlayerState
// ============================================================================

/// Presentation state of the media player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VideoPlayerState {
    Minimized,
    Collapsed,
    Normal,
    Expanded,
    Fullscreen,
}

// ============================================================================
// InteractionType
// ============================================================================

/// User interaction with a media ad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InteractionType {
    Click,
    InvitationAccept,
}

// ============================================================================
// VastProperties
// ============================================================================

/// Properties of a VAST ad, sent with the `loaded` event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VastProperties {
    /// Whether the ad can be skipped.
    pub is_skippable: bool,

    /// Seconds before the skip control appears. Only sent for skippable ads.
    pub skip_offset: Option<f64>,

    /// Whether playback starts without user action.
    pub is_auto_play: bool,

    /// Placement relative to the content.
    pub position: VideoPosition,
}

impl VastProperties {
    /// Properties of a skippable ad.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`](crate::Error::InvalidArgument) if
    /// `skip_offset` is not a positive number.
    pub fn skippable(skip_offset: f64, is_auto_play: bool, position: VideoPosition) -> Result<Self> {
        assert_positive_number("VastProperties.skipOffset", skip_offset)?;
        Ok(Self {
            is_skippable: true,
            skip_offset: Some(skip_offset),
            is_auto_play,
            position,
        })
    }

    /// Properties of an ad that cannot be skipped.
    #[inline]
    #[must_use]
    pub fn non_skippable(is_auto_play: bool, position: VideoPosition) -> Self {
        Self {
            is_skippable: false,
            skip_offset: None,
            is_auto_play,
            position,
        }
    }

    /// Renders the JSON object sent to the service.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut value = json!({
            "isSkippable": self.is_skippable,
            "isAutoPlay": self.is_auto_play,
            "position": self.position,
        });
        if self.is_skippable
            && let (Some(offset), Some(object)) = (self.skip_offset, value.as_object_mut())
        {
            object.insert("skipOffset".to_string(), json!(offset));
        }
        value
    }
}

// ============================================================================
// Rectangle
// ============================================================================

/// Element bounds in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rectangle {
    /// Creates a rectangle, validating that every component is finite.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`](crate::Error::InvalidArgument) for
    /// a non-finite component.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Result<Self> {
        assert_number("Rectangle.x", x)?;
        assert_number("Rectangle.y", y)?;
        assert_number("Rectangle.width", width)?;
        assert_number("Rectangle.height", height)?;
        Ok(Self {
            x,
            y,
            width,
            height,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(serde_json::to_value(ErrorType::Generic).unwrap(), json!("generic"));
        assert_eq!(
            serde_json::to_value(VideoPlayerState::Fullscreen).unwrap(),
            json!("fullscreen")
        );
        assert_eq!(
            serde_json::to_value(InteractionType::InvitationAccept).unwrap(),
            json!("invitationAccept")
        );
        assert_eq!(
            serde_json::to_value(AdEventType::SessionStart).unwrap(),
            json!("sessionStart")
        );
    }

    #[test]
    fn test_session_event_parsing() {
        let event = SessionEvent::from_value(&json!({"type": "sessionFinish", "adSessionId": "x"}))
            .expect("event");
        assert_eq!(event.event_type, AdEventType::SessionFinish);
        assert!(event.data.is_none());

        let event = SessionEvent::from_value(&json!({"type": "somethingNew"})).expect("event");
        assert_eq!(event.event_type, AdEventType::Other);

        assert!(SessionEvent::from_value(&json!({"data": {}})).is_none());
        assert!(SessionEvent::from_value(&json!("sessionStart")).is_none());
    }

    #[test]
    fn test_vast_properties_json() {
        let skippable = VastProperties::skippable(5.0, true, VideoPosition::Preroll).expect("valid");
        assert_eq!(
            skippable.to_json(),
            json!({"isSkippable": true, "skipOffset": 5.0, "isAutoPlay": true, "position": "preroll"})
        );

        let fixed = VastProperties::non_skippable(false, VideoPosition::Standalone);
        assert_eq!(
            fixed.to_json(),
            json!({"isSkippable": false, "isAutoPlay": false, "position": "standalone"})
        );
    }

    #[test]
    fn test_vast_properties_rejects_bad_offset() {
        assert!(VastProperties::skippable(-1.0, true, VideoPosition::Midroll).is_err());
        assert!(VastProperties::skippable(f64::NAN, true, VideoPosition::Midroll).is_err());
    }

    #[test]
    fn test_rectangle_validation() {
        assert!(Rectangle::new(0.0, 0.0, 300.0, 250.0).is_ok());
        assert!(Rectangle::new(0.0, f64::INFINITY, 300.0, 250.0).is_err());
    }
}
