//! Decision Provider seam
//!
//! The agent never reasons on its own. Each iteration it hands a read-only
//! view of its state to a `DecisionProvider` and acts on the returned
//! `Decision`. Providers may wrap an LLM, a planner, a script, or a human.

use anyhow::Result;
use async_trait::async_trait;
use sdk::types::Decision;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::state::ExecutionState;
use crate::config::AgentConfig;

/// Source of the next thought and action
#[async_trait]
pub trait DecisionProvider: Send + Sync {
    /// Provider name, used in logs
    fn name(&self) -> &str;

    /// Decide what to do next.
    ///
    /// An error here aborts the run.
    async fn decide(&self, config: &AgentConfig, state: &ExecutionState) -> Result<Decision>;
}

/// Finishes on the first iteration, echoing the goal back as the output
#[derive(Debug, Default, Clone, Copy)]
pub struct FinishImmediately;

#[async_trait]
impl DecisionProvider for FinishImmediately {
    fn name(&self) -> &str {
        "finish_immediately"
    }

    async fn decide(&self, _config: &AgentConfig, state: &ExecutionState) -> Result<Decision> {
        Ok(Decision::finish(state.goal().unwrap_or_default()))
    }
}

/// Adapter turning a synchronous closure into a provider
pub struct FnDecisionProvider<F> {
    name: String,
    decide: F,
}

impl<F> FnDecisionProvider<F>
where
    F: Fn(&ExecutionState) -> Result<Decision> + Send + Sync,
{
    pub fn new(name: impl Into<String>, decide: F) -> Self {
        Self {
            name: name.into(),
            decide,
        }
    }
}

#[async_trait]
impl<F> DecisionProvider for FnDecisionProvider<F>
where
    F: Fn(&ExecutionState) -> Result<Decision> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn decide(&self, _config: &AgentConfig, state: &ExecutionState) -> Result<Decision> {
        (self.decide)(state)
    }
}

/// Replays a fixed list of decisions in order.
///
/// Running out of decisions is an error, which aborts the run.
#[derive(Debug, Default)]
pub struct ScriptedDecisionProvider {
    script: Mutex<VecDeque<Decision>>,
}

impl ScriptedDecisionProvider {
    pub fn new(decisions: impl IntoIterator<Item = Decision>) -> Self {
        Self {
            script: Mutex::new(decisions.into_iter().collect()),
        }
    }

    /// Decisions not yet handed out
    pub fn remaining(&self) -> usize {
        self.script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

#[async_trait]
impl DecisionProvider for ScriptedDecisionProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn decide(&self, _config: &AgentConfig, _state: &ExecutionState) -> Result<Decision> {
        self.script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("script exhausted"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> AgentConfig {
        AgentConfig::new("tester", "test agent")
    }

    #[tokio::test]
    async fn test_finish_immediately_echoes_goal() {
        let mut state = ExecutionState::new("sys");
        state.push_message(crate::agent::state::Message::user("hello"));

        let decision = FinishImmediately.decide(&config(), &state).await.unwrap();
        assert!(decision.is_final());
        assert_eq!(decision.thought, "hello");
    }

    #[tokio::test]
    async fn test_fn_provider_sees_state() {
        let provider = FnDecisionProvider::new("counter", |state: &ExecutionState| {
            Ok(Decision::finish(format!("iteration {}", state.iteration())))
        });
        let state = ExecutionState::new("sys");

        let decision = provider.decide(&config(), &state).await.unwrap();
        assert_eq!(decision.thought, "iteration 0");
        assert_eq!(provider.name(), "counter");
    }

    #[tokio::test]
    async fn test_scripted_provider_replays_then_fails() {
        let provider = ScriptedDecisionProvider::new([
            Decision::act("look", "search", json!({"q": "rust"})),
            Decision::finish("done"),
        ]);
        let state = ExecutionState::new("sys");

        assert!(!provider.decide(&config(), &state).await.unwrap().is_final());
        assert!(provider.decide(&config(), &state).await.unwrap().is_final());
        assert_eq!(provider.remaining(), 0);
        assert!(provider.decide(&config(), &state).await.is_err());
    }
}
