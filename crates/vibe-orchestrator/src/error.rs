//! Error types for the Vibe Wallpaper orchestrator.
//!
//! This module defines the error hierarchy for configuration loading, prompt
//! validation, and the two model endpoints. Operation failures are never
//! propagated to the presentation layer directly; the orchestrator folds them
//! into the advisory `last_error` field using [`VibeError::kind`].

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A specialized `Result` type for orchestrator operations.
pub type Result<T> = std::result::Result<T, VibeError>;

/// Errors that can occur while configuring or running a session.
#[derive(Debug, thiserror::Error)]
pub enum VibeError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your vibe.json with a JSON linter")]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    // ========================================================================
    // Operation Errors
    // ========================================================================
    /// The prompt handed to an operation was empty.
    ///
    /// Raised before any network call is made.
    #[error("Invalid input: {message}")]
    Validation {
        /// User-facing description of what is missing.
        message: String,
    },

    /// The endpoint could not be reached or answered with a non-success status.
    #[error("{endpoint} endpoint request failed{}: {message}", status_suffix(.status))]
    Endpoint {
        /// Which endpoint failed.
        endpoint: EndpointKind,
        /// HTTP status, when a response was received at all.
        status: Option<u16>,
        /// Diagnostic detail (response body or transport error).
        message: String,
    },

    /// The endpoint answered successfully but the payload was not usable.
    #[error("Unexpected response from {endpoint} endpoint: {message}")]
    ResponseShape {
        /// Which endpoint returned the payload.
        endpoint: EndpointKind,
        /// First missing or malformed field.
        message: String,
    },

    // ========================================================================
    // General Errors
    // ========================================================================
    /// General I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map_or_else(String::new, |s| format!(" with status {s}"))
}

/// The two external model endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
    /// Image-generation endpoint.
    Image,
    /// Text-generation (prompt enhancement) endpoint.
    Text,
}

impl std::fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Image => write!(f, "image"),
            Self::Text => write!(f, "text"),
        }
    }
}

/// Categories of operation failure, as shown to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Empty prompt; no network call was made.
    Validation,
    /// Transport failure or non-success status.
    Endpoint,
    /// Success status with a missing or malformed payload.
    ResponseShape,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Endpoint => write!(f, "endpoint"),
            Self::ResponseShape => write!(f, "response_shape"),
        }
    }
}

impl VibeError {
    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `Validation` error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates an `Endpoint` error for a non-success HTTP status.
    #[must_use]
    pub fn endpoint_status(endpoint: EndpointKind, status: u16, message: impl Into<String>) -> Self {
        Self::Endpoint {
            endpoint,
            status: Some(status),
            message: message.into(),
        }
    }

    /// Creates an `Endpoint` error for failures without a response.
    #[must_use]
    pub fn endpoint_unreachable(endpoint: EndpointKind, message: impl Into<String>) -> Self {
        Self::Endpoint {
            endpoint,
            status: None,
            message: message.into(),
        }
    }

    /// Creates a new `ResponseShape` error.
    #[must_use]
    pub fn response_shape(endpoint: EndpointKind, message: impl Into<String>) -> Self {
        Self::ResponseShape {
            endpoint,
            message: message.into(),
        }
    }

    /// Returns the category used when this error becomes `last_error`.
    ///
    /// Errors outside the operation taxonomy count as endpoint failures.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::ResponseShape { .. } => ErrorKind::ResponseShape,
            Self::Endpoint { .. }
            | Self::ConfigParseError { .. }
            | Self::ConfigValidationError { .. }
            | Self::Io(_) => ErrorKind::Endpoint,
        }
    }

    /// Returns the HTTP status carried by an `Endpoint` error.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Endpoint { status, .. } => *status,
            _ => None,
        }
    }
}
