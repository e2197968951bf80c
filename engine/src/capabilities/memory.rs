//! Built-in capabilities exposing a `MemoryStore` to the decision provider

use async_trait::async_trait;
use sdk::capability::Capability;
use sdk::errors::EngineError;
use sdk::schema::InputSchema;
use sdk::types::CapabilityExample;
use serde_json::{json, Value};
use std::sync::Arc;

use super::CapabilityRegistry;
use crate::memory::MemoryStore;

/// Category the memory capabilities are registered under
pub const MEMORY_CATEGORY: &str = "memory";

const MAX_KEY_LEN: usize = 256;

/// Operation performed by a `MemoryCapability`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryOp {
    Save,
    Get,
    Delete,
    Keys,
}

impl MemoryOp {
    pub const ALL: [MemoryOp; 4] = [MemoryOp::Save, MemoryOp::Get, MemoryOp::Delete, MemoryOp::Keys];

    pub fn capability_name(&self) -> &'static str {
        match self {
            MemoryOp::Save => "memory_save",
            MemoryOp::Get => "memory_get",
            MemoryOp::Delete => "memory_delete",
            MemoryOp::Keys => "memory_keys",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            MemoryOp::Save => "Store a value under a key, replacing any previous value",
            MemoryOp::Get => "Read the value stored under a key",
            MemoryOp::Delete => "Remove a key and its value",
            MemoryOp::Keys => "List every stored key",
        }
    }

    fn schema(&self) -> InputSchema {
        let key = InputSchema::string().length(1, MAX_KEY_LEN);
        match self {
            MemoryOp::Save => InputSchema::object()
                .field("key", key)
                .field("value", InputSchema::any())
                .strict(),
            MemoryOp::Get | MemoryOp::Delete => InputSchema::object().field("key", key).strict(),
            MemoryOp::Keys => InputSchema::object().strict(),
        }
    }

    fn examples(&self) -> Vec<CapabilityExample> {
        match self {
            MemoryOp::Save => vec![CapabilityExample::new(json!({"key": "user_name", "value": "Ada"}))
                .with_output(json!({"saved": "user_name"}))],
            MemoryOp::Get => vec![CapabilityExample::new(json!({"key": "user_name"}))
                .with_output(json!({"key": "user_name", "found": true, "value": "Ada"}))],
            MemoryOp::Delete => vec![CapabilityExample::new(json!({"key": "user_name"}))
                .with_output(json!({"deleted": true}))],
            MemoryOp::Keys => vec![CapabilityExample::new(json!({}))
                .with_output(json!({"keys": ["user_name"]}))],
        }
    }
}

/// One memory operation bound to a store
pub struct MemoryCapability {
    op: MemoryOp,
    store: Arc<dyn MemoryStore>,
    schema: InputSchema,
    examples: Vec<CapabilityExample>,
}

impl MemoryCapability {
    pub fn new(op: MemoryOp, store: Arc<dyn MemoryStore>) -> Self {
        Self {
            op,
            store,
            schema: op.schema(),
            examples: op.examples(),
        }
    }

    pub fn op(&self) -> MemoryOp {
        self.op
    }
}

fn key_of(input: &Value) -> Result<&str, EngineError> {
    // The schema has already required a string key
    input["key"]
        .as_str()
        .ok_or_else(|| EngineError::capability_failed("memory", "missing key"))
}

#[async_trait]
impl Capability for MemoryCapability {
    fn name(&self) -> &str {
        self.op.capability_name()
    }

    fn description(&self) -> &str {
        self.op.description()
    }

    fn schema(&self) -> &InputSchema {
        &self.schema
    }

    fn examples(&self) -> &[CapabilityExample] {
        &self.examples
    }

    async fn execute(&self, input: Value) -> Result<Value, EngineError> {
        match self.op {
            MemoryOp::Save => {
                let key = key_of(&input)?;
                let value = input.get("value").cloned().unwrap_or(Value::Null);
                self.store.save(key, value).await;
                Ok(json!({ "saved": key }))
            }
            MemoryOp::Get => {
                let key = key_of(&input)?;
                let value = self.store.get(key).await;
                Ok(json!({
                    "key": key,
                    "found": value.is_some(),
                    "value": value.unwrap_or(Value::Null),
                }))
            }
            MemoryOp::Delete => {
                let key = key_of(&input)?;
                Ok(json!({ "deleted": self.store.delete(key).await }))
            }
            MemoryOp::Keys => Ok(json!({ "keys": self.store.keys().await })),
        }
    }
}

impl std::fmt::Debug for MemoryCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCapability")
            .field("op", &self.op)
            .finish_non_exhaustive()
    }
}

/// Register `memory_save`, `memory_get`, `memory_delete` and `memory_keys`
/// over `store` under the `memory` category.
///
/// Stops at the first name that is already taken.
pub fn register_memory_capabilities(
    registry: &CapabilityRegistry,
    store: Arc<dyn MemoryStore>,
) -> Result<(), EngineError> {
    for op in MemoryOp::ALL {
        registry.register(
            Arc::new(MemoryCapability::new(op, Arc::clone(&store))),
            Some(MEMORY_CATEGORY),
        )?;
    }
    Ok(())
}
