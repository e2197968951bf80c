//! Key/value memory for agents
//!
//! Two stores with different lifecycles:
//!
//! - `EphemeralMemory`: bounded in-process window, oldest write evicted first
//! - `DurableMemory`: file-backed map with dirty tracking and optional
//!   periodic flushing
//!
//! Both implement `MemoryStore`, which is what the built-in memory
//! capabilities are written against. Memory lives outside the execution
//! state, so resetting an agent never touches it.

pub mod durable;
pub mod ephemeral;

pub use durable::DurableMemory;
pub use ephemeral::EphemeralMemory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// Default capacity of the ephemeral window
pub const DEFAULT_CAPACITY: usize = 100;

/// Common interface over both memory stores
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Store a value, replacing any previous value for the key
    async fn save(&self, key: &str, value: Value);

    async fn get(&self, key: &str) -> Option<Value>;

    /// Remove a key, returning whether it was present
    async fn delete(&self, key: &str) -> bool;

    async fn clear(&self);

    async fn keys(&self) -> Vec<String>;

    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// A single key/value pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub key: String,
    pub value: Value,
}

impl MemoryEntry {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Snapshot of a durable store's bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryStats {
    pub entry_count: usize,
    pub is_dirty: bool,
    pub storage_path: PathBuf,
}
