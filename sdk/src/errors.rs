//! Error types and handling
//!
//! This module provides the error types used throughout the Strider runtime.
//! All errors implement the `StriderErrorExt` trait which provides user-friendly
//! hints and indicates whether errors are recoverable.
//!
//! # Recoverability
//!
//! Step-local failures (unknown capability, invalid input, a capability that
//! fails or times out) are recoverable: the execution loop records them on the
//! step and keeps iterating. Decision-provider failures end the run, and
//! persistence failures are surfaced to whoever asked for the write.

use thiserror::Error;

use crate::types::ValidationError;

/// Trait for Strider error extensions
///
/// This trait provides additional context for errors, including user-friendly
/// hints and recoverability information. All engine errors implement this trait.
pub trait StriderErrorExt {
    /// Returns a user-friendly hint for the error
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors are recorded and worked around by the execution loop.
    /// Non-recoverable errors end the current run or operation.
    fn is_recoverable(&self) -> bool;
}

/// Main engine error type
///
/// # Error Categories
///
/// - **Configuration**: Invalid or missing configuration
/// - **Capability**: Lookup, registration, validation, execution and deadline failures
/// - **Decision provider**: Failures and timeouts of the reasoning backend
/// - **Memory**: Persistence failures and invalid search patterns
///
/// # Examples
///
/// ```
/// use sdk::errors::{EngineError, StriderErrorExt};
///
/// let error = EngineError::CapabilityNotFound("ghost".to_string());
/// assert!(error.to_string().contains("not found"));
/// assert!(error.is_recoverable());
///
/// let fatal = EngineError::Persistence("disk full".to_string());
/// assert!(!fatal.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Capability errors
    #[error("Capability not found: {0}")]
    CapabilityNotFound(String),

    #[error("Duplicate capability: {0} is already registered")]
    DuplicateCapability(String),

    #[error("Validation failed for capability '{capability}': {source}")]
    Validation {
        capability: String,
        #[source]
        source: ValidationError,
    },

    #[error("Capability '{capability}' failed: {message}")]
    CapabilityFailed { capability: String, message: String },

    #[error("Capability '{capability}' timed out after {timeout_ms}ms")]
    CapabilityTimeout { capability: String, timeout_ms: u64 },

    // Decision provider errors
    #[error("Decision provider error: {0}")]
    DecisionProvider(String),

    #[error("Decision provider timed out")]
    DecisionTimeout,

    // Memory errors
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Invalid search pattern: {0}")]
    InvalidPattern(String),
}

impl EngineError {
    /// Build a `CapabilityFailed` error from any displayable cause
    pub fn capability_failed(capability: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::CapabilityFailed {
            capability: capability.into(),
            message: cause.to_string(),
        }
    }
}

impl StriderErrorExt for EngineError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Config(_) => "Check your config.toml file for errors",

            Self::CapabilityNotFound(_) => "The requested capability is not registered",
            Self::DuplicateCapability(_) => "Choose a unique name for each capability",
            Self::Validation { .. } => "Capability input does not match its schema",
            Self::CapabilityFailed { .. } => "Capability operation failed",
            Self::CapabilityTimeout { .. } => {
                "Capability took too long. Raise capability_timeout_secs or simplify the call"
            }

            Self::DecisionProvider(_) => "Decision provider failed. Check its configuration",
            Self::DecisionTimeout => "Decision provider took too long to respond. Try again",

            Self::Persistence(_) => "Could not write memory to disk. Check permissions and space",
            Self::InvalidPattern(_) => "Search pattern is not a valid regular expression",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::DecisionProvider(_) | Self::Persistence(_) => false,
            _ => true,
        }
    }
}
