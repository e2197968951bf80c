//! Agent Core
//!
//! This module implements the execution loop. Each run goes through an
//! iterative decide-act-observe cycle:
//!
//! 1. Reset state, emit `start`, record the goal as a user message
//! 2. Ask the decision provider for a thought and optional action
//! 3. No action: the thought is the final output, the run is finished
//! 4. Action: look up, validate and execute the capability, record the
//!    observation or the failure on the step
//! 5. Emit `step`, repeat until finished or `max_iterations` is reached
//! 6. Emit `finish` and return a `RunResult`
//!
//! Capability failures (unknown name, invalid input, execution error,
//! deadline) are recorded on the step and the loop continues. Only a
//! failing decision provider aborts the run, and even then a well-formed
//! result is returned.

use chrono::Utc;
use futures::FutureExt;
use sdk::errors::EngineError;
use sdk::types::{Action, Decision};
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::decision::DecisionProvider;
use super::state::{ExecutionState, Message, RunMetadata, RunResult, Step, StepError};
use crate::capabilities::CapabilityRegistry;
use crate::config::AgentConfig;
use crate::events::{AgentEvent, EventBus};

/// The execution loop
pub struct Agent {
    config: AgentConfig,

    /// Fixed at construction, from config or derived from the registry
    system_prompt: String,

    provider: Arc<dyn DecisionProvider>,

    capabilities: Arc<CapabilityRegistry>,

    events: EventBus,

    state: ExecutionState,
}

impl Agent {
    /// Create an agent.
    ///
    /// Fails if the configuration is invalid. When the configuration carries
    /// no system prompt, one is derived from the agent's name, description
    /// and the capabilities registered at this point.
    pub fn new(
        config: AgentConfig,
        provider: Arc<dyn DecisionProvider>,
        capabilities: Arc<CapabilityRegistry>,
    ) -> Result<Self, EngineError> {
        config.validate()?;

        let system_prompt = match &config.system_prompt {
            Some(prompt) => prompt.clone(),
            None => format!(
                "You are {}. {}\n\n{}",
                config.name,
                config.description,
                capabilities.describe()
            ),
        };

        debug!(
            agent = %config.name,
            provider = provider.name(),
            capabilities = capabilities.len(),
            "Agent created"
        );

        Ok(Self {
            state: ExecutionState::new(&system_prompt),
            config,
            system_prompt,
            provider,
            capabilities,
            events: EventBus::new(),
        })
    }

    /// Publish this agent's events on `events`
    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// State of the current or most recent run
    pub fn state(&self) -> &ExecutionState {
        &self.state
    }

    pub fn capabilities(&self) -> &Arc<CapabilityRegistry> {
        &self.capabilities
    }

    /// Clear the execution state. Registry, memory and provider are untouched.
    pub fn reset(&mut self) {
        self.state.reset(&self.system_prompt);
    }

    /// Run the loop on `input` until the provider finishes or the iteration
    /// ceiling is hit.
    ///
    /// Never fails: run-level errors are reported in `RunResult::error`.
    pub async fn run(&mut self, input: &str) -> RunResult {
        let run_id = Uuid::new_v4();
        let start = Utc::now();
        let clock = Instant::now();

        info!(run_id = %run_id, agent = %self.config.name, "Starting run: {}", input);

        self.reset();
        self.events
            .emit(&AgentEvent::Start {
                config: self.config.clone(),
                input: input.to_string(),
            })
            .await;
        self.state.push_message(Message::user(input));

        let error = match self.run_loop().await {
            Ok(()) => None,
            Err(e) => {
                let message = e.to_string();
                error!(run_id = %run_id, "Run aborted: {}", message);
                self.events
                    .emit(&AgentEvent::Error {
                        error: message.clone(),
                        step_number: self.state.iteration() + 1,
                    })
                    .await;
                Some(message)
            }
        };

        let success = error.is_none()
            && self.state.is_finished()
            && !self.state.steps().iter().any(Step::has_error);

        if error.is_none() && !self.state.is_finished() {
            warn!(
                run_id = %run_id,
                max_iterations = self.config.max_iterations,
                "Run stopped at the iteration limit without finishing"
            );
        }

        let result = RunResult {
            run_id,
            output: self.state.final_output().unwrap_or_default().to_string(),
            steps: self.state.steps().to_vec(),
            iterations: self.state.iteration(),
            success,
            error,
            metadata: RunMetadata {
                start,
                end: Utc::now(),
                duration_ms: clock.elapsed().as_millis() as u64,
            },
        };

        info!(
            run_id = %run_id,
            success = result.success,
            iterations = result.iterations,
            duration_ms = result.metadata.duration_ms,
            "Run finished"
        );

        self.events
            .emit(&AgentEvent::Finish {
                result: result.clone(),
            })
            .await;

        result
    }

    async fn run_loop(&mut self) -> Result<(), EngineError> {
        while self.state.iteration() < self.config.max_iterations && !self.state.is_finished() {
            debug!(
                "Iteration {}/{}",
                self.state.iteration() + 1,
                self.config.max_iterations
            );

            // The provider sees the state before the iteration is counted, so
            // a failed decision leaves no half-recorded step behind.
            let decision = self.decide().await?;
            let iteration = self.state.begin_iteration();
            self.step(iteration, decision).await;
        }
        Ok(())
    }

    async fn decide(&self) -> Result<Decision, EngineError> {
        // A panicking provider is a run-level failure, not a crash of the caller
        let call =
            AssertUnwindSafe(self.provider.decide(&self.config, &self.state)).catch_unwind();

        let outcome = match self.config.decision_timeout() {
            Some(limit) => timeout(limit, call).await.map_err(|_| {
                error!(
                    provider = self.provider.name(),
                    "Decision timed out after {}s", self.config.decision_timeout_secs
                );
                EngineError::DecisionTimeout
            })?,
            None => call.await,
        };

        match outcome {
            Ok(decision) => {
                decision.map_err(|e| EngineError::DecisionProvider(format!("{:#}", e)))
            }
            Err(_) => {
                error!(provider = self.provider.name(), "Decision provider panicked");
                Err(EngineError::DecisionProvider(
                    "decision provider panicked".to_string(),
                ))
            }
        }
    }

    async fn step(&mut self, iteration: usize, decision: Decision) {
        let Decision { thought, action } = decision;
        let mut step = Step::new(iteration, thought.clone(), action.clone());
        self.state.push_message(Message::assistant(thought.clone()));

        match action {
            None => {
                debug!("Final answer received");
                self.state.finish(thought);
            }
            Some(action) => match self.invoke(&action).await {
                Ok(output) => step.observation = Some(output),
                Err(err) => {
                    self.events
                        .emit(&AgentEvent::Error {
                            error: err.message.clone(),
                            step_number: iteration,
                        })
                        .await;
                    step.error = Some(err);
                }
            },
        }

        self.state.push_step(step.clone());
        self.events.emit(&AgentEvent::Step { step }).await;
    }

    /// Dispatch one action, recording its outcome in the message history
    async fn invoke(&mut self, action: &Action) -> Result<Value, StepError> {
        let name = action.capability_name.as_str();
        debug!(capability = %name, "Capability call");

        self.events
            .emit(&AgentEvent::ToolCall {
                capability: name.to_string(),
                input: action.input.clone(),
            })
            .await;

        let outcome = self
            .capabilities
            .execute_with_deadline(name, action.input.clone(), self.config.capability_timeout())
            .await;

        match outcome {
            Ok(output) => {
                self.state
                    .push_message(Message::capability(name, observation_text(&output)));
                self.events
                    .emit(&AgentEvent::ToolResult {
                        capability: name.to_string(),
                        output: output.clone(),
                    })
                    .await;
                Ok(output)
            }
            Err(e) => {
                let err = StepError::from(&e);
                warn!(capability = %name, kind = ?err.kind, "Capability call failed: {}", err);
                self.state
                    .push_message(Message::capability(name, format!("ERROR: {}", err)));
                Err(err)
            }
        }
    }
}

fn observation_text(output: &Value) -> String {
    match output {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("config", &self.config)
            .field("provider", &self.provider.name())
            .field("capabilities", &self.capabilities.len())
            .field("events", &self.events)
            .field("iteration", &self.state.iteration())
            .finish()
    }
}
