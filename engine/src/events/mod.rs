//! Event Bus for run observability
//!
//! The loop publishes one `AgentEvent` per lifecycle occurrence. The bus
//! delivers each event to every listener in registration order and awaits a
//! listener before moving to the next, so observers see events in exactly the
//! order the loop produced them:
//!
//! `start`, then per iteration `tool_call`? `tool_result`? `error`? `step`,
//! and finally `finish`.
//!
//! Listeners are fixed when the bus is built. A listener that returns an
//! error is logged and skipped; it never stops delivery to later listeners
//! and never affects the run.

pub mod listeners;

pub use listeners::{ChannelListener, EventRecorder, FnListener, TracingListener};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

use crate::agent::state::{RunResult, Step};
use crate::config::AgentConfig;

/// Discriminant of an `AgentEvent`
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Start,
    Step,
    ToolCall,
    ToolResult,
    Error,
    Finish,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Start => "start",
            EventKind::Step => "step",
            EventKind::ToolCall => "tool_call",
            EventKind::ToolResult => "tool_result",
            EventKind::Error => "error",
            EventKind::Finish => "finish",
        }
    }
}

/// Lifecycle notification published by the execution loop
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// Run started with the given configuration and goal
    Start { config: AgentConfig, input: String },
    /// An iteration completed
    Step { step: Step },
    /// A capability is about to be invoked
    ToolCall { capability: String, input: Value },
    /// A capability returned
    ToolResult { capability: String, output: Value },
    /// A step failed, or the run itself was aborted
    Error { error: String, step_number: usize },
    /// Run ended
    Finish { result: RunResult },
}

impl AgentEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            AgentEvent::Start { .. } => EventKind::Start,
            AgentEvent::Step { .. } => EventKind::Step,
            AgentEvent::ToolCall { .. } => EventKind::ToolCall,
            AgentEvent::ToolResult { .. } => EventKind::ToolResult,
            AgentEvent::Error { .. } => EventKind::Error,
            AgentEvent::Finish { .. } => EventKind::Finish,
        }
    }
}

/// Observer of agent events
#[async_trait]
pub trait EventListener: Send + Sync {
    /// Handle one event. Errors are logged by the bus and otherwise ignored.
    async fn on_event(&self, event: &AgentEvent) -> anyhow::Result<()>;
}

/// Sequential fan-out of events to a fixed list of listeners
#[derive(Clone, Default)]
pub struct EventBus {
    listeners: Vec<Arc<dyn EventListener>>,
}

impl EventBus {
    /// Create a bus with no listeners
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a listener; delivery follows the order listeners were added
    pub fn with_listener(mut self, listener: impl EventListener + 'static) -> Self {
        self.listeners.push(Arc::new(listener));
        self
    }

    /// Add a listener that is also held elsewhere
    pub fn with_shared_listener(mut self, listener: Arc<dyn EventListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Deliver an event to every listener, one after another
    pub async fn emit(&self, event: &AgentEvent) {
        for (index, listener) in self.listeners.iter().enumerate() {
            if let Err(e) = listener.on_event(event).await {
                warn!(
                    listener = index,
                    event = event.kind().as_str(),
                    "Event listener failed: {:#}",
                    e
                );
            }
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn tool_call(name: &str) -> AgentEvent {
        AgentEvent::ToolCall {
            capability: name.to_string(),
            input: serde_json::json!({}),
        }
    }

    struct Failing;

    #[async_trait]
    impl EventListener for Failing {
        async fn on_event(&self, _event: &AgentEvent) -> anyhow::Result<()> {
            anyhow::bail!("listener exploded")
        }
    }

    #[tokio::test]
    async fn test_listeners_run_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let first = Arc::clone(&log);
        let second = Arc::clone(&log);

        let bus = EventBus::new()
            .with_listener(FnListener::new(move |_e| first.lock().unwrap().push("first")))
            .with_listener(FnListener::new(move |_e| second.lock().unwrap().push("second")));

        bus.emit(&tool_call("a")).await;
        bus.emit(&tool_call("b")).await;

        assert_eq!(
            *log.lock().unwrap(),
            vec!["first", "second", "first", "second"]
        );
    }

    #[tokio::test]
    async fn test_failing_listener_does_not_block_others() {
        let recorder = Arc::new(EventRecorder::new());
        let bus = EventBus::new()
            .with_listener(Failing)
            .with_shared_listener(Arc::clone(&recorder) as Arc<dyn EventListener>);

        bus.emit(&tool_call("a")).await;

        assert_eq!(recorder.kinds(), vec![EventKind::ToolCall]);
    }

    #[tokio::test]
    async fn test_empty_bus() {
        let bus = EventBus::new();
        assert_eq!(bus.listener_count(), 0);
        bus.emit(&tool_call("a")).await;
    }

    #[test]
    fn test_event_kind_names() {
        assert_eq!(tool_call("a").kind().as_str(), "tool_call");
        let err = AgentEvent::Error {
            error: "boom".into(),
            step_number: 2,
        };
        assert_eq!(err.kind(), EventKind::Error);
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let json = serde_json::to_value(tool_call("search")).unwrap();
        assert_eq!(json["type"], "tool_call");
        assert_eq!(json["capability"], "search");
    }
}
