//! Error types for parsing domain values

use thiserror::Error;

/// Result type for parsing domain values
pub type Result<T> = std::result::Result<T, ParseError>;

/// Parse errors for user-supplied domain values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Not one of the eight canonical blood types
    #[error("Invalid blood type: {0}")]
    InvalidBloodType(String),

    /// Neither `donor` nor `staff`
    #[error("Invalid role: {0}")]
    InvalidRole(String),

    /// Not a known unit status
    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    /// Not a known request urgency
    #[error("Invalid urgency: {0}")]
    InvalidUrgency(String),
}
