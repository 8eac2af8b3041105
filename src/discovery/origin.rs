//! Origin boundary checks and context resolution.
//!
//! Hosts disagree on whether reading an inaccessible context raises or
//! quietly yields undefined, and some raise only for certain properties.
//! Every failure shape counts as crossing a boundary.

// ============================================================================
// Imports
// ============================================================================

use tracing::trace;

use crate::host::{Host, PropertyRead};
use crate::identifiers::ContextId;

// ============================================================================
// Constants
// ============================================================================

/// Stable identifying property read first.
const IDENTITY_PROPERTY: &str = "hostname";

/// Arbitrary property read second.
const PROBE_PROPERTY: &str = "x";

// ============================================================================
// Functions
// ============================================================================

/// Returns `true` if `peer` cannot be accessed directly from `own`.
#[must_use]
pub fn is_cross_boundary(host: &dyn Host, own: ContextId, peer: ContextId) -> bool {
    if own == peer {
        return false;
    }

    match host.read_property(own, peer, IDENTITY_PROPERTY) {
        PropertyRead::Undefined | PropertyRead::Denied => {
            trace!(%peer, "Identity read failed, peer is cross-boundary");
            return true;
        }
        PropertyRead::Defined => {}
    }

    if host.read_property(own, peer, PROBE_PROPERTY) == PropertyRead::Denied {
        trace!(%peer, "Probe read denied, peer is cross-boundary");
        return true;
    }

    false
}

/// Returns the context the client runs in, or the process-wide fallback
/// when the host has no valid context chain.
#[must_use]
pub fn resolve_global_context(host: &dyn Host) -> ContextId {
    match host.current() {
        Some(context) if host.top(context).is_some() => context,
        _ => host.fallback(),
    }
}

/// Returns the outermost context above `start`, or the process-wide
/// fallback when `start` has no valid context chain.
#[must_use]
pub fn resolve_top_context(host: &dyn Host, start: ContextId) -> ContextId {
    host.top(start).unwrap_or_else(|| host.fallback())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{CrossOriginReads, FrameTree};

    #[test]
    fn test_identity_is_same_boundary() {
        let tree = FrameTree::new();
        let top = tree.add_root("https://a.example");
        assert!(!is_cross_boundary(tree.as_ref(), top, top));
        assert!(!is_cross_boundary(tree.as_ref(), tree.global(), tree.global()));
    }

    #[test]
    fn test_same_origin_peer() {
        let tree = FrameTree::new();
        let top = tree.add_root("https://a.example");
        let child = tree.add_frame(top, "https://a.example");
        assert!(!is_cross_boundary(tree.as_ref(), child, top));
    }

    #[test]
    fn test_throwing_read_is_cross_boundary() {
        let tree = FrameTree::with_options(CrossOriginReads::Throwing, None);
        let top = tree.add_root("https://a.example");
        let child = tree.add_frame(top, "https://b.example");
        assert!(is_cross_boundary(tree.as_ref(), child, top));
    }

    #[test]
    fn test_undefined_read_is_cross_boundary() {
        let tree = FrameTree::with_options(CrossOriginReads::SilentUndefined, None);
        let top = tree.add_root("https://a.example");
        let child = tree.add_frame(top, "https://b.example");
        assert!(is_cross_boundary(tree.as_ref(), child, top));
    }

    #[test]
    fn test_probe_throwing_is_cross_boundary() {
        let tree = FrameTree::with_options(CrossOriginReads::LegacyProbe, None);
        let top = tree.add_root("https://a.example");
        let child = tree.add_frame(top, "https://b.example");
        assert!(is_cross_boundary(tree.as_ref(), child, top));
    }

    #[test]
    fn test_resolve_global_context() {
        let tree = FrameTree::new();
        let top = tree.add_root("https://a.example");
        assert_eq!(resolve_global_context(&tree.view(top)), top);
        assert_eq!(resolve_global_context(&tree.headless_view()), tree.global());
        assert_eq!(resolve_global_context(&tree.view(ContextId::next())), tree.global());
    }

    #[test]
    fn test_resolve_top_context() {
        let tree = FrameTree::new();
        let top = tree.add_root("https://a.example");
        let leaf = tree.add_frame(tree.add_frame(top, "https://b.example"), "https://c.example");

        assert_eq!(resolve_top_context(tree.as_ref(), leaf), top);
        assert_eq!(resolve_top_context(tree.as_ref(), top), top);
        assert_eq!(resolve_top_context(tree.as_ref(), tree.global()), tree.global());
    }
}
