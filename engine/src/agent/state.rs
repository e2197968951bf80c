//! Execution State for the Agent Loop
//!
//! Holds everything a single run accumulates: the message history handed to
//! the decision provider, the per-iteration step records, and the finish
//! flag. The state is owned by one `Agent`; only the loop mutates it, and
//! decision providers receive it by shared reference.

use chrono::{DateTime, Utc};
use sdk::errors::EngineError;
use sdk::types::Action;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    /// Output (or failure) of a capability call
    Capability,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::Capability => write!(f, "capability"),
        }
    }
}

/// Message in the run history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: MessageRole,

    pub content: String,

    /// Capability that produced this message, for capability-role messages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capability: Option<String>,

    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn with_role(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            capability: None,
            timestamp: Utc::now(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::Assistant, content)
    }

    pub fn capability(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            capability: Some(name.into()),
            ..Self::with_role(MessageRole::Capability, content)
        }
    }
}

/// Failure class of a step
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepErrorKind {
    /// The action named an unregistered capability
    NotFound,
    /// The action's input failed the capability schema
    Validation,
    /// The capability itself failed
    Execution,
    /// The capability exceeded its deadline
    Timeout,
}

/// Error recorded on a step
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepError {
    pub kind: StepErrorKind,
    pub message: String,
}

impl From<&EngineError> for StepError {
    fn from(err: &EngineError) -> Self {
        let kind = match err {
            EngineError::CapabilityNotFound(_) => StepErrorKind::NotFound,
            EngineError::Validation { .. } => StepErrorKind::Validation,
            EngineError::CapabilityTimeout { .. } => StepErrorKind::Timeout,
            _ => StepErrorKind::Execution,
        };
        Self {
            kind,
            message: err.to_string(),
        }
    }
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Record of one loop iteration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Step {
    /// 1-based iteration number
    pub iteration: usize,

    pub thought: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observation: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<StepError>,

    pub timestamp: DateTime<Utc>,
}

impl Step {
    pub fn new(iteration: usize, thought: impl Into<String>, action: Option<Action>) -> Self {
        Self {
            iteration,
            thought: thought.into(),
            action,
            observation: None,
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// A step without an action ends the run
    pub fn is_terminal(&self) -> bool {
        self.action.is_none()
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Mutable state of one agent
///
/// Invariant while running: `steps().len() == iteration()`.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionState {
    iteration: usize,
    messages: Vec<Message>,
    steps: Vec<Step>,
    is_finished: bool,
    final_output: Option<String>,
}

impl ExecutionState {
    /// Fresh state holding only the system prompt
    pub fn new(system_prompt: &str) -> Self {
        Self {
            iteration: 0,
            messages: vec![Message::system(system_prompt)],
            steps: Vec::new(),
            is_finished: false,
            final_output: None,
        }
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn is_finished(&self) -> bool {
        self.is_finished
    }

    pub fn final_output(&self) -> Option<&str> {
        self.final_output.as_deref()
    }

    /// The most recent user message, usually the goal of the current run
    pub fn goal(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.content.as_str())
    }

    pub(crate) fn reset(&mut self, system_prompt: &str) {
        *self = Self::new(system_prompt);
    }

    pub(crate) fn begin_iteration(&mut self) -> usize {
        self.iteration += 1;
        self.iteration
    }

    pub(crate) fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub(crate) fn push_step(&mut self, step: Step) {
        self.steps.push(step);
    }

    pub(crate) fn finish(&mut self, output: impl Into<String>) {
        self.is_finished = true;
        self.final_output = Some(output.into());
    }
}

/// Timing of a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunMetadata {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_ms: u64,
}

/// Summary returned by `Agent::run`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunResult {
    pub run_id: Uuid,

    /// Final thought of a finished run, empty otherwise
    pub output: String,

    pub steps: Vec<Step>,

    pub iterations: usize,

    /// Finished and no step recorded an error
    pub success: bool,

    /// Run-level failure, if the loop itself was aborted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub metadata: RunMetadata,
}

impl RunResult {
    /// Steps that recorded an error
    pub fn failed_steps(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter().filter(|s| s.has_error())
    }
}
