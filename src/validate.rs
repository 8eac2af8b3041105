//! Argument checks shared by facades and value constructors.
//!
//! Each check names the offending argument in its
//! [`Error::InvalidArgument`] message.

// ============================================================================
// Imports
// ============================================================================

use crate::error::{Error, Result};

// ============================================================================
// Checks
// ============================================================================

/// Fails if `value` is empty or only whitespace.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] for a blank string.
pub fn assert_truthy_string(name: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::invalid_argument(format!(
            "Value for {name} is undefined, null or blank."
        )));
    }
    if value.trim().is_empty() {
        return Err(Error::invalid_argument(format!(
            "Value for {name} is empty string."
        )));
    }
    Ok(())
}

/// Fails if `value` is NaN or infinite.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] for a non-finite number.
pub fn assert_number(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(Error::invalid_argument(format!(
            "Value for {name} is not a number"
        )));
    }
    Ok(())
}

/// Fails unless `value` is a finite number in `[min, max]`.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] for a non-finite or out of range number.
pub fn assert_number_between(name: &str, value: f64, min: f64, max: f64) -> Result<()> {
    assert_number(name, value)?;
    if value < min || value > max {
        return Err(Error::invalid_argument(format!(
            "Value for {name} is outside the range [{min},{max}]"
        )));
    }
    Ok(())
}

/// Fails unless `value` is a finite number that is not negative.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] for a non-finite or negative number.
pub fn assert_positive_number(name: &str, value: f64) -> Result<()> {
    assert_number(name, value)?;
    if value < 0.0 {
        return Err(Error::invalid_argument(format!(
            "Value for {name} is not a positive number"
        )));
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
