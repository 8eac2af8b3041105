//! Method namespaces.
//!
//! Operations travel as `"<Service>.<operation>"`. Replies use the bare
//! [`RESPONSE_METHOD`] and [`ERROR_METHOD`] names.

// ============================================================================
// Constants
// ============================================================================

/// Method of a reply correlated by id.
pub const RESPONSE_METHOD: &str = "response";

/// Method of an error reported by the service.
pub const ERROR_METHOD: &str = "error";

/// Method a service uses to announce its context to verification clients.
pub const IDENTIFY_SERVICE_WINDOW_METHOD: &str = "identifyServiceWindow";

// ============================================================================
// Service
// ============================================================================

/// Service a client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    /// Service used by session clients.
    Session,
    /// Service used by verification clients.
    Verification,
}

impl Service {
    /// Returns the namespace prefix, without the trailing dot.
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Session => "SessionService",
            Self::Verification => "VerificationService",
        }
    }

    /// Prefixes `operation` with this service's namespace.
    #[inline]
    #[must_use]
    pub fn qualify(&self, operation: &str) -> String {
        format!("{}.{operation}", self.name())
    }

    /// Strips this service's namespace from `method`.
    ///
    /// Returns `None` if `method` belongs to another namespace.
    #[must_use]
    pub fn strip<'a>(&self, method: &'a str) -> Option<&'a str> {
        method
            .strip_prefix(self.name())
            .and_then(|rest| rest.strip_prefix('.'))
            .filter(|operation| !operation.is_empty())
    }
}

/// Splits a namespaced method into `(service, operation)`.
///
/// Returns `None` for bare methods such as [`RESPONSE_METHOD`].
#[must_use]
pub fn split_method(method: &str) -> Option<(&str, &str)> {
    method
        .split_once('.')
        .filter(|(service, operation)| !service.is_empty() && !operation.is_empty())
}

// ============================================================================
// Tests
// ============================================================================
