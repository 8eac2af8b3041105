//! Host environment abstraction.
//!
//! Clients never probe ambient globals. Everything they need from the
//! embedding environment is reached through an injected [`Host`].
//!
//! # Capabilities
//!
//! | Capability | Method |
//! |------------|--------|
//! | Context identity | [`Host::current`], [`Host::fallback`], [`Host::top`] |
//! | Boundary probing | [`Host::read_property`] |
//! | Exported handles | [`Host::lookup`] |
//! | Presence marker | [`Host::child_named`] |
//! | Delivery point | [`Host::post_message`], [`Host::listen`] |
//! | Timers | [`Host::timers`] |
//!
//! Contexts are referenced by [`ContextId`] tokens. The host owns the
//! contexts; holding a token never keeps one alive.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `frames` | In-process [`FrameTree`] host |
//! | `timers` | Tokio-backed [`Timers`] |

// ============================================================================
// Submodules
// ============================================================================

/// In-process tree of execution contexts.
pub mod frames;

/// Tokio-backed timers.
pub mod timers;

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::identifiers::ContextId;
use crate::transport::ExportedHandler;

// ============================================================================
// Re-exports
// ============================================================================

pub use frames::{CrossOriginReads, FrameTree, FrameView};
pub use timers::TokioTimers;

// ============================================================================
// KeyPath
// ============================================================================

/// Fixed nested path under which a context exports a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyPath(&'static [&'static str]);

impl KeyPath {
    /// Creates a key path from its segments.
    #[inline]
    #[must_use]
    pub const fn new(segments: &'static [&'static str]) -> Self {
        Self(segments)
    }

    /// Returns the path segments.
    #[inline]
    #[must_use]
    pub const fn segments(&self) -> &'static [&'static str] {
        self.0
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

// ============================================================================
// Capability
// ============================================================================

/// Typed descriptor of an exported value: where to look and under which path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Capability {
    /// Context to read from.
    pub peer: ContextId,
    /// Path of the export inside that context.
    pub key_path: KeyPath,
}

impl Capability {
    /// Creates a capability descriptor.
    #[inline]
    #[must_use]
    pub const fn new(peer: ContextId, key_path: KeyPath) -> Self {
        Self { peer, key_path }
    }
}

// ============================================================================
// Export
// ============================================================================

/// A value found at a key path.
#[derive(Debug, Clone)]
pub enum Export {
    /// Inbound handler of a direct channel.
    Handler(ExportedHandler),
    /// Reference to another context.
    Context(ContextId),
}

// ============================================================================
// PropertyRead
// ============================================================================

/// Outcome of reading a property off another context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyRead {
    /// The read succeeded and produced a value.
    Defined,
    /// The read succeeded but produced nothing.
    Undefined,
    /// The read failed with an access error.
    Denied,
}

/// Access to another context was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Access to {peer} denied")]
pub struct AccessDenied {
    /// The context that refused access.
    pub peer: ContextId,
}

// ============================================================================
// Envelope
// ============================================================================

/// Datum received at a delivery point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Raw posted text. May be unrelated third-party traffic.
    pub data: String,
    /// Context that posted it.
    pub source: ContextId,
}

// ============================================================================
// Timers
// ============================================================================

/// Repeating timer callback.
pub type IntervalCallback = Arc<dyn Fn() + Send + Sync>;

/// One-shot timer callback.
pub type TimeoutCallback = Box<dyn FnOnce() + Send>;

/// Timer functions offered by the host.
pub trait Timers: Send + Sync {
    /// Runs `callback` once after `delay`. Returns an id for
    /// [`clear_timeout`](Self::clear_timeout).
    fn set_timeout(&self, callback: TimeoutCallback, delay: Duration) -> u64;

    /// Cancels a pending timeout. Unknown ids are ignored.
    fn clear_timeout(&self, id: u64);

    /// Runs `callback` every `period`. Returns an id for
    /// [`clear_interval`](Self::clear_interval).
    fn set_interval(&self, callback: IntervalCallback, period: Duration) -> u64;

    /// Cancels an interval. Unknown ids are ignored.
    fn clear_interval(&self, id: u64);
}

// ============================================================================
// Host
// ============================================================================

/// The embedding environment, as seen from one client.
pub trait Host: Send + Sync {
    /// Returns the context the client runs in, or `None` in a headless host.
    fn current(&self) -> Option<ContextId>;

    /// Returns the process-wide fallback context.
    fn fallback(&self) -> ContextId;

    /// Returns the outermost context above `context`.
    ///
    /// Returns `None` if `context` is not part of a valid context chain.
    fn top(&self, context: ContextId) -> Option<ContextId>;

    /// Reads the property `name` of `peer`, as seen from `from`.
    fn read_property(&self, from: ContextId, peer: ContextId, name: &str) -> PropertyRead;

    /// Resolves a capability, as seen from `from`.
    ///
    /// # Errors
    ///
    /// Returns [`AccessDenied`] if the peer cannot be read from `from`.
    fn lookup(&self, from: ContextId, capability: &Capability) -> Result<Option<Export>, AccessDenied>;

    /// Returns the child of `peer` named `name`. Readable across boundaries.
    fn child_named(&self, peer: ContextId, name: &str) -> Option<ContextId>;

    /// Posts `data` to the delivery point of `target`. Delivery happens on a
    /// later turn; datums without listeners are dropped.
    fn post_message(&self, target: ContextId, data: String, source: ContextId);

    /// Subscribes to the delivery point of `context`.
    fn listen(&self, context: ContextId) -> mpsc::UnboundedReceiver<Envelope>;

    /// Returns the host timers, if the host has them.
    fn timers(&self) -> Option<Arc<dyn Timers>>;
}

// ============================================================================
// Tests
// ============================================================================
