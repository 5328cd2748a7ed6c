//! Error types for the ad lifecycle manager
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Message carried by load and init failures on an adapter that never finished bootstrapping
pub const NOT_INITIALIZED: &str = "SDK not initialized";

/// Terminal message of a load replaced by a newer load of the same placement
pub const LOAD_SUPERSEDED: &str = "Superseded by a newer load";

/// Terminal message of a pending load whose surface was cleaned up
pub const VIEW_RELEASED: &str = "Ad view was released";

/// Result type alias for ad operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the ad lifecycle manager
#[derive(Error, Debug)]
pub enum Error {
    /// Vendor bootstrap failed, threw, or never reported back
    #[error("Initialization error: {0}")]
    Initialization(String),

    /// Vendor load callback reported a failure
    #[error("Load error: {0}")]
    Load(String),

    /// Load or view access attempted before a successful initialization
    #[error("{0}")]
    NotInitialized(String),

    /// Placement identifier the vendor cannot represent
    #[error("Invalid placement: {0}")]
    InvalidPlacement(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Vendor-specific error
    #[error("Vendor error ({provider}): {message}")]
    Vendor {
        /// Network name
        provider: String,
        /// Error message
        message: String,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an initialization error
    pub fn initialization(msg: impl Into<String>) -> Self {
        Self::Initialization(msg.into())
    }

    /// Create a load error
    pub fn load(msg: impl Into<String>) -> Self {
        Self::Load(msg.into())
    }

    /// Create the "not initialized" error with its standard message
    pub fn not_initialized() -> Self {
        Self::NotInitialized(NOT_INITIALIZED.to_string())
    }

    /// Create an invalid placement error
    pub fn invalid_placement(msg: impl Into<String>) -> Self {
        Self::InvalidPlacement(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a vendor-specific error
    pub fn vendor(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Vendor {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// The bare failure message, without the category prefix
    ///
    /// This is what ends up in `AdState::Error` and `AdResult::Error`, so the
    /// presentation layer can show the vendor's wording verbatim.
    pub fn reason(&self) -> String {
        match self {
            Error::Initialization(msg)
            | Error::Load(msg)
            | Error::NotInitialized(msg)
            | Error::InvalidPlacement(msg)
            | Error::Config(msg)
            | Error::Other(msg) => msg.clone(),
            Error::Vendor { message, .. } => message.clone(),
            Error::Json(err) => err.to_string(),
        }
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
