//! Ad session lifecycle.
//!
//! An [`AdSession`] owns at most one transport to the session service. It
//! correlates replies by message id, derives its running state from the
//! lifecycle events the service reports, and lets each facade kind bind
//! once.
//!
//! # Lifecycle
//!
//! ```text
//! NotStarted ──sessionStart──► Running ──sessionFinish──► Finished
//!                                 ▲                          │
//!                                 └───────sessionStart───────┘
//! ```
//!
//! Operations gated on a running session also require the version
//! handshake to have produced a compatible service version.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `builder` | [`AdSessionBuilder`] |
//! | `context` | [`SessionContext`], [`Partner`], [`VerificationScriptResource`] |
//! | `core` | [`AdSession`] |
//! | `correlation` | Reply callbacks by message id |

// ============================================================================
// Submodules
// ============================================================================

/// Session builder.
pub mod builder;

/// Session context descriptors.
pub mod context;

/// The session itself.
pub mod core;

/// Reply correlation shared by all clients.
pub mod correlation;

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::AdSessionBuilder;
pub use context::{Partner, SessionContext, VerificationScriptResource};
pub use self::core::AdSession;

// ============================================================================
// SessionState
// ============================================================================

/// Lifecycle state observed from the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No start event seen yet.
    #[default]
    NotStarted,
    /// Between a start and a finish event.
    Running,
    /// After a finish event.
    Finished,
}

// ============================================================================
// FacadeKind
// ============================================================================

/// The two facade kinds a session binds at most once each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FacadeKind {
    /// [`AdEvents`](crate::events::AdEvents).
    AdEvents,
    /// [`MediaEvents`](crate::events::MediaEvents).
    MediaEvents,
}

impl FacadeKind {
    /// Returns the operation announcing the registration to the service.
    #[inline]
    #[must_use]
    pub const fn register_method(&self) -> &'static str {
        match self {
            Self::AdEvents => "registerAdEvents",
            Self::MediaEvents => "registerMediaEvents",
        }
    }
}

impl fmt::Display for FacadeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AdEvents => f.write_str("an ad events instance"),
            Self::MediaEvents => f.write_str("a media events instance"),
        }
    }
}

// ============================================================================
// Registration
// ============================================================================

/// Outcome of binding a facade kind to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// First binding of this kind.
    Registered,
    /// The kind was already bound. Nothing changed.
    AlreadyRegistered,
}

impl Registration {
    #[inline]
    #[must_use]
    pub fn is_registered(&self) -> bool {
        matches!(self, Self::Registered)
    }
}
