//! Protocol message types.
//!
//! This module defines what travels between a client and its service,
//! independent of the channel that carries it.
//!
//! # Protocol Overview
//!
//! | Message | Direction | Purpose |
//! |---------|-----------|---------|
//! | `<Service>.<operation>` | Client → Service | Command or request |
//! | `response` | Service → Client | Reply correlated by id |
//! | `error` | Service → Client | Remote failure, logged only |
//!
//! # Argument Encoding
//!
//! Arguments are JSON text for versions before `1.0.3` and structured values
//! from then on. See [`codec`].
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `codec` | Version-gated argument encoding |
//! | `message` | Message, payload and wire form |
//! | `method` | Service namespaces |
//! | `types` | Measurement value types |
//! | `version` | Version parsing and compatibility |

// ============================================================================
// Submodules
// ============================================================================

/// Version-gated argument encoding.
pub mod codec;

/// Message, payload and wire form.
pub mod message;

/// Service namespaces and reply methods.
pub mod method;

/// Measurement value types.
pub mod types;

/// Version parsing and compatibility.
pub mod version;

// ============================================================================
// Re-exports
// ============================================================================

pub use codec::{decode, encode};
pub use message::{Arg, ElementHandle, Message, PROTOCOL_TAG, Payload};
pub use method::{ERROR_METHOD, IDENTIFY_SERVICE_WINDOW_METHOD, RESPONSE_METHOD, Service};
pub use types::{
    AdEventType, ErrorType, InteractionType, Rectangle, SessionEvent, VastProperties,
    VideoPlayerState, VideoPosition,
};
pub use version::{ARGS_CUTOVER_VERSION, PROTOCOL_VERSION, is_compatible};
