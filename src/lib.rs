//! OMID bridge - cross-context messaging for Open Measurement clients.
//!
//! This library lets an ad session client and a verification client talk to
//! a measurement service that may live in the same execution context, in a
//! same-origin frame, or across an origin boundary.
//!
//! # Architecture
//!
//! The bridge follows a client-service model:
//!
//! - **Clients (this crate)**: [`AdSession`] with its event facades, and
//!   [`VerificationClient`]
//! - **Service (remote)**: answers requests, reports lifecycle events
//!
//! Key design principles:
//!
//! - Each client exclusively owns at most one [`Transport`]
//! - Protocol uses `Service.operation` method names
//! - Replies are correlated by message id; nothing holds a reference back
//!   to a client
//! - A missing service degrades to silent no-ops, never to errors
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//!
//! use omid_bridge::{
//!     AdEvents, AdSession, Export, ExportedHandler, FrameTree, Partner, SessionContext,
//!     SESSION_SERVICE_KEY_PATH,
//! };
//!
//! # fn example() -> omid_bridge::Result<()> {
//! let tree = FrameTree::new();
//! let top = tree.add_root("https://publisher.example");
//! let creative = tree.add_frame(top, "https://publisher.example");
//!
//! // A service exported in the top frame.
//! tree.export(
//!     top,
//!     SESSION_SERVICE_KEY_PATH,
//!     Export::Handler(ExportedHandler::new(|message, _from| {
//!         println!("service received {}", message.method);
//!     })),
//! );
//!
//! let session = AdSession::builder()
//!     .context(SessionContext::new(Partner::new("Partner", "1.0.0")?))
//!     .host(Arc::new(tree.view(creative)))
//!     .build()?;
//! assert!(session.is_supported());
//!
//! let ad_events = AdEvents::new(&session)?;
//! // Fails until the service reports the session start.
//! assert!(ad_events.impression_occurred().is_err());
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`discovery`] | Boundary checks and service location |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`events`] | [`AdEvents`] and [`MediaEvents`] facades |
//! | [`host`] | Host environment abstraction and the in-process [`FrameTree`] |
//! | [`identifiers`] | Message and context ids |
//! | [`protocol`] | Messages, argument codec, versions, value types |
//! | [`session`] | [`AdSession`] and its context |
//! | [`transport`] | Direct and relay transports |
//! | [`validate`] | Argument checks |
//! | [`verification`] | [`VerificationClient`] |

// ============================================================================
// Modules
// ============================================================================

/// Service discovery.
///
/// Decides whether a peer is across a boundary and picks the transport.
pub mod discovery;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Ad and media event facades.
pub mod events;

/// Host environment abstraction.
///
/// Everything the bridge needs from its environment goes through [`Host`].
pub mod host;

/// Type-safe identifiers.
pub mod identifiers;

/// Protocol message types.
pub mod protocol;

/// Ad session lifecycle.
pub mod session;

/// Message transports.
pub mod transport;

/// Argument checks.
pub mod validate;

/// Verification client.
pub mod verification;

#[cfg(test)]
mod testing;

// ============================================================================
// Re-exports
// ============================================================================

// Discovery
pub use discovery::{
    PresenceProbe, SERVICE_WINDOW_KEY_PATH, SESSION_SERVICE_KEY_PATH,
    VERIFICATION_SERVICE_KEY_PATH, is_cross_boundary, listen_for_service_context, locate,
};

// Error types
pub use error::{Error, Result};

// Facades
pub use events::{AdEvents, MediaEvents};

// Host types
pub use host::{
    Capability, CrossOriginReads, Export, FrameTree, FrameView, Host, KeyPath, TokioTimers,
};

// Identifier types
pub use identifiers::{ContextId, MessageId};

// Protocol types
pub use protocol::{
    AdEventType, Arg, ElementHandle, ErrorType, InteractionType, Message, PROTOCOL_VERSION,
    Payload, Rectangle, VastProperties, VideoPlayerState, VideoPosition,
};

// Session types
pub use session::{
    AdSession, AdSessionBuilder, FacadeKind, Partner, Registration, SessionContext,
    SessionState, VerificationScriptResource,
};

// Transport types
pub use transport::{DirectTransport, Endpoint, ExportedHandler, RelayTransport, Transport};

// Verification types
pub use verification::{VerificationClient, VerificationClientBuilder};
