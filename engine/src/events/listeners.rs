//! Ready-made event listeners

use async_trait::async_trait;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{AgentEvent, EventKind, EventListener};

/// Channel buffer size for `ChannelListener`
const CHANNEL_BUFFER_SIZE: usize = 100;

/// Listener backed by a synchronous closure
pub struct FnListener<F> {
    handler: F,
}

impl<F> FnListener<F>
where
    F: Fn(&AgentEvent) + Send + Sync,
{
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl<F> EventListener for FnListener<F>
where
    F: Fn(&AgentEvent) + Send + Sync,
{
    async fn on_event(&self, event: &AgentEvent) -> anyhow::Result<()> {
        (self.handler)(event);
        Ok(())
    }
}

/// Forwards events into a bounded channel
///
/// When the buffer is full the send waits, which pauses the run until the
/// consumer catches up. A dropped receiver turns every delivery into a logged
/// listener error.
pub struct ChannelListener {
    tx: mpsc::Sender<AgentEvent>,
}

impl ChannelListener {
    /// Create a listener and the receiver it feeds, with the default buffer
    pub fn new() -> (Self, mpsc::Receiver<AgentEvent>) {
        Self::with_capacity(CHANNEL_BUFFER_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> (Self, mpsc::Receiver<AgentEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl EventListener for ChannelListener {
    async fn on_event(&self, event: &AgentEvent) -> anyhow::Result<()> {
        self.tx
            .send(event.clone())
            .await
            .map_err(|_| anyhow::anyhow!("event receiver dropped"))
    }
}

/// Logs every event through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingListener;

#[async_trait]
impl EventListener for TracingListener {
    async fn on_event(&self, event: &AgentEvent) -> anyhow::Result<()> {
        match event {
            AgentEvent::Start { config, input } => {
                info!(agent = %config.name, "Run started: {}", input)
            }
            AgentEvent::Step { step } => debug!(
                iteration = step.iteration,
                terminal = step.is_terminal(),
                failed = step.has_error(),
                "Step completed"
            ),
            AgentEvent::ToolCall { capability, input } => {
                debug!(capability = %capability, "Calling capability with {}", input)
            }
            AgentEvent::ToolResult { capability, .. } => {
                debug!(capability = %capability, "Capability returned")
            }
            AgentEvent::Error { error, step_number } => {
                warn!(step = step_number, "Step error: {}", error)
            }
            AgentEvent::Finish { result } => info!(
                run_id = %result.run_id,
                success = result.success,
                iterations = result.iterations,
                duration_ms = result.metadata.duration_ms,
                "Run finished"
            ),
        }
        Ok(())
    }
}

/// Keeps a copy of every event, for tests and post-mortem inspection
#[derive(Debug, Default)]
pub struct EventRecorder {
    events: Mutex<Vec<AgentEvent>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded events
    pub fn events(&self) -> Vec<AgentEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Kinds of the recorded events, in delivery order
    pub fn kinds(&self) -> Vec<EventKind> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(AgentEvent::kind)
            .collect()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}

#[async_trait]
impl EventListener for EventRecorder {
    async fn on_event(&self, event: &AgentEvent) -> anyhow::Result<()> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.clone());
        Ok(())
    }
}
