//! Strider Engine Library
//!
//! Autonomous task-execution runtime: an agent loop that asks a decision
//! provider what to do, dispatches validated capability calls, keeps
//! ephemeral and durable memory, and publishes lifecycle events.

/// Agent loop core module
pub mod agent;

/// Capability registry and built-in capabilities
pub mod capabilities;

/// Configuration management module
pub mod config;

/// Event bus for run observability
pub mod events;

/// Ephemeral and durable key/value memory
pub mod memory;

/// Telemetry and Observability
pub mod telemetry;

pub use agent::{Agent, DecisionProvider, RunResult};
pub use capabilities::CapabilityRegistry;
pub use config::{AgentConfig, MemoryConfig, RuntimeConfig};
pub use events::{AgentEvent, EventBus, EventListener};
pub use memory::{DurableMemory, EphemeralMemory, MemoryStore};
