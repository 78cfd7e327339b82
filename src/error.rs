//! Crate-wide error types.
//!
//! Mirrors the split the engine's design calls for: a tiny set of
//! driver-contract violations that are the only errors ever handed back to
//! the caller, and a larger set of "didn't apply" signals that helpers use
//! internally and that a rule consumes without ever turning into a finding
//! or escaping as an error.

use thiserror::Error;

/// Errors that terminate an analysis pass and are surfaced to the driver.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DriverError {
    #[error("no SSA result available for package")]
    NoSsaResult,
    #[error("SSA bundle has an invalid or unexpected shape: {0}")]
    InvalidSsaType(String),
}

/// Internal "didn't apply" signals. Helpers return these; rules swallow
/// them (`.ok()`, `if let Ok(..)`) and never let them become a finding.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HelperError {
    #[error("value is not a constant integer")]
    NotConstant,
    #[error("type is not an integer type")]
    NotIntegerType,
    #[error("no matching definition found")]
    NotFound,
}

pub type DriverResult<T> = std::result::Result<T, DriverError>;
pub type HelperResult<T> = std::result::Result<T, HelperError>;
