//! Event facades.
//!
//! A facade wraps an [`AdSession`](crate::AdSession) and binds to it once per
//! kind. Constructing a second facade of the same kind on one session fails
//! with [`Error::AlreadyRegistered`](crate::Error::AlreadyRegistered).
//!
//! | Facade | Kind | Preconditions |
//! |--------|------|---------------|
//! | [`AdEvents`] | [`FacadeKind::AdEvents`](crate::FacadeKind::AdEvents) | running session |
//! | [`MediaEvents`] | [`FacadeKind::MediaEvents`](crate::FacadeKind::MediaEvents) | running session and impression for playback events |

// ============================================================================
// Submodules
// ============================================================================

/// Ad lifecycle events.
pub mod ad;

/// Media playback events.
pub mod media;

// ============================================================================
// Re-exports
// ============================================================================

pub use ad::AdEvents;
pub use media::MediaEvents;
