//! File-backed memory
//!
//! The store keeps the whole map in memory and writes it out as a single
//! JSON object on `persist()`. Mutations only flip a store-level dirty flag;
//! nothing touches disk until `persist()`, `dispose()` or the auto-flush
//! task runs.
//!
//! Writes go to a sibling temp file that is then renamed over the target, so
//! a successful persist never leaves a truncated file behind.

use regex::Regex;
use sdk::errors::EngineError;
use serde_json::Value;
use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{MemoryEntry, MemoryStats, MemoryStore};
use crate::config::MemoryConfig;

#[derive(Debug, Default)]
struct Contents {
    entries: BTreeMap<String, Value>,
    dirty: bool,
    /// Bumped on every mutation so a persist can tell whether it saw the latest state
    generation: u64,
}

impl Contents {
    fn touch(&mut self) {
        self.dirty = true;
        self.generation = self.generation.wrapping_add(1);
    }
}

#[derive(Debug)]
struct Shared {
    path: PathBuf,
    contents: Mutex<Contents>,
    /// Serializes this store's persists so an older snapshot never lands last
    write_lock: tokio::sync::Mutex<()>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Contents> {
        self.contents.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_dirty(&self) -> bool {
        self.lock().dirty
    }

    async fn persist(&self) -> Result<(), EngineError> {
        let _writer = self.write_lock.lock().await;

        let (json, generation) = {
            let contents = self.lock();
            let json = serde_json::to_string_pretty(&contents.entries)
                .map_err(|e| EngineError::Persistence(e.to_string()))?;
            (json, contents.generation)
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                EngineError::Persistence(format!("{}: {}", parent.display(), e))
            })?;
        }

        let tmp = temp_path(&self.path);
        tokio::fs::write(&tmp, json.as_bytes())
            .await
            .map_err(|e| EngineError::Persistence(format!("{}: {}", tmp.display(), e)))?;

        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(EngineError::Persistence(format!(
                "{}: {}",
                self.path.display(),
                e
            )));
        }

        let mut contents = self.lock();
        if contents.generation == generation {
            contents.dirty = false;
        }
        debug!(path = %self.path.display(), entries = contents.entries.len(), "Persisted memory");
        Ok(())
    }
}

/// Unique hidden sibling of `path`, so stores sharing a file never write
/// through the same temp file
fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(path.file_name().unwrap_or_else(|| OsStr::new("memory")));
    name.push(format!(".{}.tmp", Uuid::new_v4().simple()));
    path.with_file_name(name)
}

/// JSON-file-backed key/value store
#[derive(Debug)]
pub struct DurableMemory {
    shared: Arc<Shared>,
    flusher: Mutex<Option<JoinHandle<()>>>,
}

impl DurableMemory {
    /// Create an empty store for `path` without reading it
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            shared: Arc::new(Shared {
                path: path.into(),
                contents: Mutex::new(Contents::default()),
                write_lock: tokio::sync::Mutex::new(()),
            }),
            flusher: Mutex::new(None),
        }
    }

    /// Create a store and load whatever `path` holds
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let memory = Self::new(path);
        memory.load().await;
        memory
    }

    /// Create a store that persists itself every `interval` while dirty.
    ///
    /// A zero interval disables the background task, as does calling this
    /// outside a tokio runtime. The store is not loaded; call `load()`.
    pub fn with_auto_flush(path: impl Into<PathBuf>, interval: Duration) -> Self {
        let memory = Self::new(path);
        if !interval.is_zero() {
            memory.start_auto_flush(interval);
        }
        memory
    }

    /// Open the store described by a `MemoryConfig`
    pub async fn from_config(config: &MemoryConfig) -> Self {
        let memory = match config.auto_flush_interval() {
            Some(interval) => Self::with_auto_flush(config.storage_path.clone(), interval),
            None => Self::new(config.storage_path.clone()),
        };
        memory.load().await;
        memory
    }

    fn start_auto_flush(&self, interval: Duration) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(
                path = %self.shared.path.display(),
                "No async runtime available, auto-flush disabled"
            );
            return;
        };

        let shared = Arc::clone(&self.shared);
        let handle = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                if !shared.is_dirty() {
                    continue;
                }
                if let Err(e) = shared.persist().await {
                    warn!(path = %shared.path.display(), "Auto-flush failed: {}", e);
                }
            }
        });

        debug!(
            path = %self.shared.path.display(),
            interval_ms = interval.as_millis() as u64,
            "Auto-flush started"
        );
        *self.flusher_slot() = Some(handle);
    }

    fn flusher_slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.flusher.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stop_auto_flush(&self) {
        if let Some(handle) = self.flusher_slot().take() {
            handle.abort();
        }
    }

    /// Replace the in-memory map with the file's contents.
    ///
    /// Never fails: a missing file yields an empty map, and an unreadable or
    /// malformed file is logged and also yields an empty map. Clears the
    /// dirty flag.
    pub async fn load(&self) {
        let path = &self.shared.path;
        let entries = match tokio::fs::read_to_string(path).await {
            Ok(text) => match serde_json::from_str::<BTreeMap<String, Value>>(&text) {
                Ok(entries) => {
                    info!(path = %path.display(), entries = entries.len(), "Loaded memory");
                    entries
                }
                Err(e) => {
                    warn!(path = %path.display(), "Malformed memory file, starting empty: {}", e);
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No memory file yet");
                BTreeMap::new()
            }
            Err(e) => {
                warn!(path = %path.display(), "Could not read memory file, starting empty: {}", e);
                BTreeMap::new()
            }
        };

        let mut contents = self.shared.lock();
        contents.entries = entries;
        contents.dirty = false;
        contents.generation = contents.generation.wrapping_add(1);
    }

    pub fn save(&self, key: &str, value: Value) {
        let mut contents = self.shared.lock();
        contents.entries.insert(key.to_string(), value);
        contents.touch();
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.shared.lock().entries.get(key).cloned()
    }

    pub fn delete(&self, key: &str) -> bool {
        let mut contents = self.shared.lock();
        let existed = contents.entries.remove(key).is_some();
        if existed {
            contents.touch();
        }
        existed
    }

    pub fn clear(&self) {
        let mut contents = self.shared.lock();
        contents.entries.clear();
        contents.touch();
    }

    /// Keys in sorted order
    pub fn keys(&self) -> Vec<String> {
        self.shared.lock().entries.keys().cloned().collect()
    }

    /// Keys matching a regular expression
    pub fn search(&self, pattern: &str) -> Result<Vec<String>, EngineError> {
        let regex = Regex::new(pattern).map_err(|e| EngineError::InvalidPattern(e.to_string()))?;
        Ok(self
            .shared
            .lock()
            .entries
            .keys()
            .filter(|key| regex.is_match(key))
            .cloned()
            .collect())
    }

    pub fn get_all(&self) -> Vec<MemoryEntry> {
        self.shared
            .lock()
            .entries
            .iter()
            .map(|(key, value)| MemoryEntry::new(key.clone(), value.clone()))
            .collect()
    }

    /// Merge entries into the store, overwriting existing keys
    pub fn import<I>(&self, entries: I)
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let mut contents = self.shared.lock();
        contents.entries.extend(entries);
        contents.touch();
    }

    /// Copy of the full map
    pub fn export(&self) -> BTreeMap<String, Value> {
        self.shared.lock().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.shared.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.lock().entries.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.shared.is_dirty()
    }

    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    /// Write the full map to disk and clear the dirty flag
    pub async fn persist(&self) -> Result<(), EngineError> {
        self.shared.persist().await
    }

    pub fn stats(&self) -> MemoryStats {
        let contents = self.shared.lock();
        MemoryStats {
            entry_count: contents.entries.len(),
            is_dirty: contents.dirty,
            storage_path: self.shared.path.clone(),
        }
    }

    /// Stop auto-flushing and write out any unsaved changes
    pub async fn dispose(&self) -> Result<(), EngineError> {
        self.stop_auto_flush();
        if self.is_dirty() {
            self.persist().await?;
        }
        Ok(())
    }
}

impl Drop for DurableMemory {
    fn drop(&mut self) {
        self.stop_auto_flush();
    }
}

#[async_trait::async_trait]
impl MemoryStore for DurableMemory {
    async fn save(&self, key: &str, value: Value) {
        DurableMemory::save(self, key, value)
    }

    async fn get(&self, key: &str) -> Option<Value> {
        DurableMemory::get(self, key)
    }

    async fn delete(&self, key: &str) -> bool {
        DurableMemory::delete(self, key)
    }

    async fn clear(&self) {
        DurableMemory::clear(self)
    }

    async fn keys(&self) -> Vec<String> {
        DurableMemory::keys(self)
    }

    async fn len(&self) -> usize {
        DurableMemory::len(self)
    }
}
