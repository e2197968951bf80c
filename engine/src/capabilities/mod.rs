//! Capability Registry
//!
//! Named, schema-validated capabilities the execution loop may dispatch to.
//! Every call goes through `execute`, which looks the capability up,
//! validates the input against its schema and only then runs it.
//!
//! A registry can be shared by several agents. Registration takes a write
//! lock; lookups clone the `Arc<dyn Capability>` out of a read lock, so no
//! lock is ever held while a capability runs.

pub mod memory;

pub use memory::{register_memory_capabilities, MemoryCapability, MemoryOp};

use sdk::capability::Capability;
use sdk::errors::EngineError;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::sync::{Arc, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tracing::{debug, warn};

static SHARED_REGISTRY: OnceLock<Arc<CapabilityRegistry>> = OnceLock::new();

/// Process-wide default registry, created on first use.
///
/// Tests and embedders that need isolation should build their own
/// `CapabilityRegistry` instead.
pub fn shared_registry() -> Arc<CapabilityRegistry> {
    Arc::clone(SHARED_REGISTRY.get_or_init(|| Arc::new(CapabilityRegistry::new())))
}

#[derive(Default)]
struct Inner {
    capabilities: BTreeMap<String, Arc<dyn Capability>>,
    categories: BTreeMap<String, BTreeSet<String>>,
}

/// Registry of capabilities, keyed by unique name
#[derive(Default)]
pub struct CapabilityRegistry {
    inner: RwLock<Inner>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a capability, optionally under a category.
    ///
    /// Fails with `DuplicateCapability` if the name is taken.
    pub fn register(
        &self,
        capability: Arc<dyn Capability>,
        category: Option<&str>,
    ) -> Result<(), EngineError> {
        let name = capability.name().to_string();
        let mut inner = self.write();

        if inner.capabilities.contains_key(&name) {
            return Err(EngineError::DuplicateCapability(name));
        }

        if let Some(category) = category {
            inner
                .categories
                .entry(category.to_string())
                .or_default()
                .insert(name.clone());
        }
        inner.capabilities.insert(name.clone(), capability);

        debug!(capability = %name, category = ?category, "Registered capability");
        Ok(())
    }

    /// Add an already registered capability to another category
    pub fn add_to_category(&self, name: &str, category: &str) -> Result<(), EngineError> {
        let mut inner = self.write();
        if !inner.capabilities.contains_key(name) {
            return Err(EngineError::CapabilityNotFound(name.to_string()));
        }
        inner
            .categories
            .entry(category.to_string())
            .or_default()
            .insert(name.to_string());
        Ok(())
    }

    /// Remove a capability and scrub it from every category.
    ///
    /// Returns whether the capability existed. Categories left empty are dropped.
    pub fn unregister(&self, name: &str) -> bool {
        let mut inner = self.write();
        let existed = inner.capabilities.remove(name).is_some();
        if existed {
            inner.categories.retain(|_, members| {
                members.remove(name);
                !members.is_empty()
            });
            debug!(capability = %name, "Unregistered capability");
        }
        existed
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Capability>> {
        self.read().capabilities.get(name).map(Arc::clone)
    }

    pub fn has(&self, name: &str) -> bool {
        self.read().capabilities.contains_key(name)
    }

    /// All capabilities, ordered by name
    pub fn list(&self) -> Vec<Arc<dyn Capability>> {
        self.read().capabilities.values().map(Arc::clone).collect()
    }

    /// Capabilities in a category, ordered by name. Unknown categories yield nothing.
    pub fn list_by_category(&self, category: &str) -> Vec<Arc<dyn Capability>> {
        let inner = self.read();
        inner
            .categories
            .get(category)
            .map(|members| {
                members
                    .iter()
                    .filter_map(|name| inner.capabilities.get(name).map(Arc::clone))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn names(&self) -> Vec<String> {
        self.read().capabilities.keys().cloned().collect()
    }

    pub fn categories(&self) -> Vec<String> {
        self.read().categories.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().capabilities.is_empty()
    }

    /// Remove every capability and category
    pub fn clear(&self) {
        let mut inner = self.write();
        inner.capabilities.clear();
        inner.categories.clear();
    }

    /// Look up, validate and run a capability without a deadline
    pub async fn execute(&self, name: &str, input: Value) -> Result<Value, EngineError> {
        self.execute_with_deadline(name, input, None).await
    }

    /// Look up, validate and run a capability.
    ///
    /// The capability runs on its own task: a panic inside it surfaces as
    /// `CapabilityFailed`, and when `deadline` expires the task is aborted and
    /// `CapabilityTimeout` is returned.
    pub async fn execute_with_deadline(
        &self,
        name: &str,
        input: Value,
        deadline: Option<Duration>,
    ) -> Result<Value, EngineError> {
        let capability = self
            .get(name)
            .ok_or_else(|| EngineError::CapabilityNotFound(name.to_string()))?;

        capability
            .schema()
            .validate(&input)
            .map_err(|source| EngineError::Validation {
                capability: name.to_string(),
                source,
            })?;

        debug!(capability = %name, "Executing capability");

        let mut handle = tokio::spawn(async move { capability.execute(input).await });

        let joined = match deadline {
            Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    handle.abort();
                    let timeout_ms = limit.as_millis() as u64;
                    warn!(capability = %name, timeout_ms, "Capability timed out");
                    return Err(EngineError::CapabilityTimeout {
                        capability: name.to_string(),
                        timeout_ms,
                    });
                }
            },
            None => handle.await,
        };

        match joined {
            Ok(result) => result,
            Err(e) if e.is_panic() => {
                warn!(capability = %name, "Capability panicked");
                Err(EngineError::capability_failed(name, "capability panicked"))
            }
            Err(e) => Err(EngineError::capability_failed(name, e)),
        }
    }

    /// Render every capability for the decision provider.
    ///
    /// One `## name` section per capability with its description, the JSON
    /// shape of its input, and any examples.
    pub fn describe(&self) -> String {
        let capabilities = self.list();
        if capabilities.is_empty() {
            return "No capabilities are available.".to_string();
        }

        let mut out = String::new();
        for capability in capabilities {
            let _ = writeln!(out, "## {}", capability.name());
            let _ = writeln!(out, "{}", capability.description());
            let _ = writeln!(out, "Input: {}", capability.schema().to_json_schema());

            let examples = capability.examples();
            if !examples.is_empty() {
                let _ = writeln!(out, "Examples:");
                for example in examples {
                    let _ = write!(out, "- {}", example.input);
                    if let Some(output) = &example.output {
                        let _ = write!(out, " -> {}", output);
                    }
                    if let Some(description) = &example.description {
                        let _ = write!(out, " ({})", description);
                    }
                    out.push('\n');
                }
            }
            out.push('\n');
        }

        out.trim_end().to_string()
    }
}

impl std::fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.read();
        f.debug_struct("CapabilityRegistry")
            .field("capabilities", &inner.capabilities.keys().collect::<Vec<_>>())
            .field("categories", &inner.categories)
            .finish()
    }
}
