//! Capability trait and closure-backed capabilities
//!
//! This module defines the `Capability` trait that every unit of external
//! action must implement. Capabilities are supplied by the embedding
//! application, registered with the engine's capability registry, and invoked
//! by the execution loop when a decision names them.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::errors::EngineError;
use crate::schema::InputSchema;
use crate::types::CapabilityExample;

/// Trait that all capabilities must implement
///
/// `execute` only ever receives input that already passed `schema()`.
#[async_trait]
pub trait Capability: Send + Sync {
    /// Returns the unique name of the capability
    fn name(&self) -> &str;

    /// Returns a one-line description shown to the decision provider
    fn description(&self) -> &str;

    /// Returns the structural schema for the capability's input
    fn schema(&self) -> &InputSchema;

    /// Returns usage examples (documentation only, never executed)
    fn examples(&self) -> &[CapabilityExample] {
        &[]
    }

    /// Run the capability on validated input
    async fn execute(&self, input: Value) -> Result<Value, EngineError>;
}

type BoxFuture = Pin<Box<dyn Future<Output = Result<Value, EngineError>> + Send>>;
type BoxedHandler = Arc<dyn Fn(Value) -> BoxFuture + Send + Sync>;

/// A capability assembled from a name, a schema and an async closure
///
/// # Examples
///
/// ```
/// use sdk::capability::{Capability, FnCapability};
/// use sdk::schema::InputSchema;
/// use serde_json::json;
///
/// let echo = FnCapability::new(
///     "echo",
///     "Return the given text",
///     InputSchema::object().field("text", InputSchema::string()),
///     |input| async move { Ok::<_, sdk::EngineError>(input["text"].clone()) },
/// );
/// assert_eq!(echo.name(), "echo");
/// ```
#[derive(Clone)]
pub struct FnCapability {
    name: String,
    description: String,
    schema: InputSchema,
    examples: Vec<CapabilityExample>,
    handler: BoxedHandler,
}

impl FnCapability {
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: InputSchema,
        handler: F,
    ) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, EngineError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
            examples: Vec::new(),
            handler: Arc::new(move |input| -> BoxFuture { Box::pin(handler(input)) }),
        }
    }

    /// Attach a usage example
    pub fn with_example(mut self, example: CapabilityExample) -> Self {
        self.examples.push(example);
        self
    }
}

impl fmt::Debug for FnCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCapability")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("examples", &self.examples.len())
            .finish()
    }
}

#[async_trait]
impl Capability for FnCapability {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn schema(&self) -> &InputSchema {
        &self.schema
    }

    fn examples(&self) -> &[CapabilityExample] {
        &self.examples
    }

    async fn execute(&self, input: Value) -> Result<Value, EngineError> {
        (self.handler)(input).await
    }
}
