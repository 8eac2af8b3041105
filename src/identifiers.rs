//! Type-safe identifiers.
//!
//! Newtype wrappers prevent mixing correlation ids with context tokens.
//!
//! | Type | Wraps | Purpose |
//! |------|-------|---------|
//! | [`MessageId`] | `String` (UUID v4 shaped) | Request/response correlation |
//! | [`ContextId`] | `u64` | Non-owning token for an execution context |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// MessageId
// ============================================================================

/// Correlation token carried by every message.
///
/// Locally generated ids are RFC 4122 version 4 UUIDs in hyphenated form.
/// Ids received from peers are kept verbatim: older peers are not required
/// to produce UUIDs, only unique strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Generates a fresh random id.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().hyphenated().to_string())
    }

    /// Returns the id as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ============================================================================
// ContextId
// ============================================================================

/// Process-wide counter for context tokens.
static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque, non-owning reference to an execution context.
///
/// The context itself is owned by the host environment. Holding a
/// `ContextId` never keeps a context alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    /// Allocates a new unique context token.
    #[inline]
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw token value.
    #[inline]
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
