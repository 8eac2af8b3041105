//! Verification client.
//!
//! The second local participant: a verification script talking to the
//! verification service. It shares the message format, codec and
//! correlation rules of the session, under the `VerificationService.`
//! namespace.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `builder` | [`VerificationClientBuilder`] |
//! | `client` | [`VerificationClient`] |

// ============================================================================
// Submodules
// ============================================================================

/// Verification client builder.
pub mod builder;

/// The verification client itself.
pub mod client;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::VerificationClientBuilder;
pub use client::VerificationClient;
