//! Protocol version strings.
//!
//! Versions look like `major.minor.patch` with an optional `-build` suffix
//! (`1.3.12`, `1.2.3-iab123`). The suffix never takes part in comparisons.

// ============================================================================
// Imports
// ============================================================================

use std::cmp::Ordering;
use std::sync::LazyLock;

use regex::Regex;

// ============================================================================
// Constants
// ============================================================================

/// Protocol version spoken by the clients in this crate.
pub const PROTOCOL_VERSION: &str = "1.4.10-iab4600";

/// First version whose argument payloads travel as structured values.
pub const ARGS_CUTOVER_VERSION: &str = "1.0.3";

/// Shape of a well-formed version string.
static VERSION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\d+\.\d+(-.*)?$").expect("valid version pattern"));

// ============================================================================
// Functions
// ============================================================================

/// Returns `true` if `version` has three dot-separated numeric components,
/// optionally followed by a `-build` suffix.
#[must_use]
pub fn is_valid_version(version: &str) -> bool {
    VERSION_PATTERN.is_match(version)
}

/// Compares two well-formed versions by their numeric triple.
///
/// Returns `None` if either version is malformed.
#[must_use]
pub fn compare_versions(a: &str, b: &str) -> Option<Ordering> {
    Some(numeric_triple(a)?.cmp(&numeric_triple(b)?))
}

/// Returns `true` if `a >= b`. Malformed versions never compare greater.
#[must_use]
pub fn version_greater_or_equal(a: &str, b: &str) -> bool {
    matches!(
        compare_versions(a, b),
        Some(Ordering::Greater | Ordering::Equal)
    )
}

/// Returns `true` if a service reporting `service_version` can talk to a
/// client speaking `client_version`.
///
/// Only the major component matters, and it is read leniently: `1.3` is a
/// usable answer from a service even though it is not a full version string.
#[must_use]
pub fn is_compatible(service_version: &str, client_version: &str) -> bool {
    match (major(service_version), major(client_version)) {
        (Some(service), Some(client)) => service == client,
        _ => false,
    }
}

/// Returns `true` if arguments sent at `version` must be JSON encoded.
#[must_use]
pub fn uses_legacy_args(version: &str) -> bool {
    !is_valid_version(version) || !version_greater_or_equal(version, ARGS_CUTOVER_VERSION)
}

// ============================================================================
// Helpers
// ============================================================================

/// Parses the numeric part of a well-formed version.
fn numeric_triple(version: &str) -> Option<(u64, u64, u64)> {
    if !is_valid_version(version) {
        return None;
    }
    let core = version.split('-').next()?;
    let mut parts = core.split('.').map(str::parse::<u64>);
    let major = parts.next()?.ok()?;
    let minor = parts.next()?.ok()?;
    let patch = parts.next()?.ok()?;
    Some((major, minor, patch))
}

/// Reads the leading major component of a dotted version.
fn major(version: &str) -> Option<u64> {
    let (major, rest) = version.split_once('.')?;
    if rest.is_empty() {
        return None;
    }
    major.parse().ok()
}

// ============================================================================
// Tests
// ============================================================================
