//! Bounded in-process memory
//!
//! Keeps at most `capacity` keys. Writing a key moves it to the most recent
//! position; once the window overflows, the key written longest ago is
//! evicted. Reads never change the order.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::trace;

use super::{MemoryEntry, MemoryStore, DEFAULT_CAPACITY};

#[derive(Debug, Default)]
struct Window {
    values: HashMap<String, Value>,
    /// Keys from oldest to most recent write
    order: VecDeque<String>,
}

/// Write-ordered key/value window with FIFO eviction
#[derive(Debug)]
pub struct EphemeralMemory {
    capacity: usize,
    window: Mutex<Window>,
}

impl EphemeralMemory {
    /// Create a window holding `DEFAULT_CAPACITY` keys
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a window holding `capacity` keys. A capacity of 0 is treated as 1.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            window: Mutex::new(Window::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Window> {
        self.window.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn save(&self, key: &str, value: Value) {
        let mut window = self.lock();

        if window.values.insert(key.to_string(), value).is_some() {
            window.order.retain(|k| k != key);
        }
        window.order.push_back(key.to_string());

        while window.values.len() > self.capacity {
            let Some(oldest) = window.order.pop_front() else {
                break;
            };
            window.values.remove(&oldest);
            trace!(key = %oldest, "Evicted memory entry");
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.lock().values.get(key).cloned()
    }

    pub fn delete(&self, key: &str) -> bool {
        let mut window = self.lock();
        let existed = window.values.remove(key).is_some();
        if existed {
            window.order.retain(|k| k != key);
        }
        existed
    }

    pub fn clear(&self) {
        let mut window = self.lock();
        window.values.clear();
        window.order.clear();
    }

    /// Keys from oldest to most recent write
    pub fn keys(&self) -> Vec<String> {
        self.lock().order.iter().cloned().collect()
    }

    /// The `count` most recently written entries, oldest first
    pub fn get_recent(&self, count: usize) -> Vec<MemoryEntry> {
        let window = self.lock();
        let skip = window.order.len().saturating_sub(count);
        window
            .order
            .iter()
            .skip(skip)
            .filter_map(|key| {
                window
                    .values
                    .get(key)
                    .map(|value| MemoryEntry::new(key.clone(), value.clone()))
            })
            .collect()
    }

    pub fn size(&self) -> usize {
        self.lock().values.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EphemeralMemory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MemoryStore for EphemeralMemory {
    async fn save(&self, key: &str, value: Value) {
        EphemeralMemory::save(self, key, value)
    }

    async fn get(&self, key: &str) -> Option<Value> {
        EphemeralMemory::get(self, key)
    }

    async fn delete(&self, key: &str) -> bool {
        EphemeralMemory::delete(self, key)
    }

    async fn clear(&self) {
        EphemeralMemory::clear(self)
    }

    async fn keys(&self) -> Vec<String> {
        EphemeralMemory::keys(self)
    }

    async fn len(&self) -> usize {
        self.size()
    }
}
