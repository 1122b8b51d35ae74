//! Error types for email parsing

use thiserror::Error;

/// Errors that can occur while parsing messages and headers
#[derive(Error, Debug)]
pub enum ParseError {
    /// Failed to parse the email structure
    #[error("Failed to parse email structure: {0}")]
    Structure(String),

    /// Failed to decode email content
    #[error("Failed to decode content: {0}")]
    Decode(String),

    /// No address could be found in an address header group
    #[error("No email address found in: {0}")]
    AddressNotFound(String),

    /// Invalid configuration document
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Errors reported by a [`crate::CryptoService`] backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// The armored input was malformed or truncated
    #[error("Malformed armor: {0}")]
    Malformed(String),

    /// The backend failed while processing the data
    #[error("Crypto backend failure: {0}")]
    Backend(String),
}

/// Result type for email parsing operations
pub type Result<T> = std::result::Result<T, ParseError>;
