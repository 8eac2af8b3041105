//! Service discovery.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `origin` | Boundary checks and context resolution |
//! | `locator` | Candidate walk producing a transport |

// ============================================================================
// Submodules
// ============================================================================

/// Boundary checks and context resolution.
pub mod origin;

/// Candidate walk producing a transport.
pub mod locator;

// ============================================================================
// Re-exports
// ============================================================================

pub use locator::{
    PRESENCE_FRAME_NAME, PresenceProbe, SERVICE_WINDOW_KEY_PATH, SESSION_SERVICE_KEY_PATH,
    VERIFICATION_SERVICE_KEY_PATH, default_presence_probe, is_service_present,
    listen_for_service_context, locate, locate_session_service, locate_verification_service,
};
pub use origin::{is_cross_boundary, resolve_global_context, resolve_top_context};
