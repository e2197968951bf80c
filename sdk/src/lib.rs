//! Strider SDK
//!
//! Shared library providing traits, types, and utilities for Strider components.
//! This crate is used by the engine and by applications that supply capabilities.

/// Capability trait and closure adapter
pub mod capability;

/// Error types and handling
pub mod errors;

/// Structural input schemas
pub mod schema;

/// Decision, action and validation types
pub mod types;

// Re-export commonly used types
pub use capability::{Capability, FnCapability};
pub use errors::{EngineError, StriderErrorExt};
pub use schema::InputSchema;
pub use types::{Action, CapabilityExample, Decision, ValidationError, ValidationErrorKind};
