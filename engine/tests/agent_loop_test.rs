//! Integration tests for the agent loop
//!
//! Validates run semantics end to end:
//! - Success and failure definitions
//! - Step-local failures (not found, validation, execution, timeout)
//! - Run-level failures from the decision provider
//! - Event ordering as seen by listeners

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use sdk::capability::FnCapability;
use sdk::errors::EngineError;
use sdk::schema::InputSchema;
use sdk::types::Decision;
use strider_engine::agent::{
    Agent, DecisionProvider, ExecutionState, FnDecisionProvider, ScriptedDecisionProvider,
    StepErrorKind,
};
use strider_engine::capabilities::{register_memory_capabilities, CapabilityRegistry};
use strider_engine::config::AgentConfig;
use strider_engine::events::{
    AgentEvent, ChannelListener, EventBus, EventKind, EventListener, EventRecorder,
};
use strider_engine::memory::{EphemeralMemory, MemoryStore};

fn config() -> AgentConfig {
    AgentConfig::new("integration", "Agent under integration test")
}

fn registry() -> Arc<CapabilityRegistry> {
    let registry = CapabilityRegistry::new();
    registry
        .register(
            Arc::new(FnCapability::new(
                "add",
                "Add two integers",
                InputSchema::object()
                    .field("a", InputSchema::integer())
                    .field("b", InputSchema::integer())
                    .strict(),
                |input| async move {
                    let a = input["a"].as_i64().unwrap_or_default();
                    let b = input["b"].as_i64().unwrap_or_default();
                    Ok(json!(a + b))
                },
            )),
            Some("math"),
        )
        .unwrap();
    registry
        .register(
            Arc::new(FnCapability::new(
                "explode",
                "Always fails",
                InputSchema::any(),
                |_| async { Err(EngineError::capability_failed("explode", "kaboom")) },
            )),
            None,
        )
        .unwrap();
    registry
        .register(
            Arc::new(FnCapability::new(
                "sleep",
                "Never returns in time",
                InputSchema::any(),
                |_| async {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(Value::Null)
                },
            )),
            None,
        )
        .unwrap();
    Arc::new(registry)
}

fn recording_bus() -> (EventBus, Arc<EventRecorder>) {
    let recorder = Arc::new(EventRecorder::new());
    let bus = EventBus::new().with_shared_listener(Arc::clone(&recorder) as Arc<dyn EventListener>);
    (bus, recorder)
}

#[tokio::test]
async fn test_missing_capability_scenario() {
    let provider = FnDecisionProvider::new("ghost", |_: &ExecutionState| {
        Ok(Decision::act("try the ghost", "ghost", json!({})))
    });
    let mut agent = Agent::new(config().with_max_iterations(1), Arc::new(provider), registry()).unwrap();

    let result = agent.run("find the ghost").await;

    assert_eq!(result.iterations, 1);
    assert!(!result.success);
    assert!(result.error.is_none());
    let error = result.steps[0].error.as_ref().unwrap();
    assert!(error.message.contains("not found"));
    assert_eq!(error.kind, StepErrorKind::NotFound);
}

#[tokio::test]
async fn test_always_unregistered_exhausts_iterations() {
    let provider = FnDecisionProvider::new("ghost", |_: &ExecutionState| {
        Ok(Decision::act("again", "ghost", json!({})))
    });
    let mut agent = Agent::new(config().with_max_iterations(4), Arc::new(provider), registry()).unwrap();

    let result = agent.run("loop forever").await;

    assert_eq!(result.iterations, 4);
    assert!(!result.success);
    assert!(result.error.is_none());
    assert_eq!(result.output, "");
    assert!(result.steps.iter().all(|s| s.has_error()));
}

#[tokio::test]
async fn test_immediate_finish_scenario() {
    let provider = FnDecisionProvider::new("done", |_: &ExecutionState| Ok(Decision::finish("done")));
    let mut agent = Agent::new(config(), Arc::new(provider), registry()).unwrap();

    let result = agent.run("").await;

    assert!(result.success);
    assert_eq!(result.iterations, 1);
    assert_eq!(result.output, "done");
    assert!(result.metadata.end >= result.metadata.start);
}

#[tokio::test]
async fn test_event_order_for_one_successful_call() {
    let provider = ScriptedDecisionProvider::new([
        Decision::act("add them", "add", json!({"a": 2, "b": 3})),
        Decision::finish("5"),
    ]);
    let (bus, recorder) = recording_bus();
    let mut agent = Agent::new(config(), Arc::new(provider), registry())
        .unwrap()
        .with_event_bus(bus);

    let result = agent.run("what is 2 + 3?").await;
    assert!(result.success);
    assert_eq!(result.steps[0].observation, Some(json!(5)));

    assert_eq!(
        recorder.kinds(),
        vec![
            EventKind::Start,
            EventKind::ToolCall,
            EventKind::ToolResult,
            EventKind::Step,
            EventKind::Step,
            EventKind::Finish,
        ]
    );

    match &recorder.events()[0] {
        AgentEvent::Start { config, input } => {
            assert_eq!(config.name, "integration");
            assert_eq!(input, "what is 2 + 3?");
        }
        other => panic!("Expected start event, got {:?}", other),
    }
    match recorder.events().last() {
        Some(AgentEvent::Finish { result: finished }) => assert_eq!(finished, &result),
        other => panic!("Expected finish event, got {:?}", other),
    }
}

#[tokio::test]
async fn test_single_call_run_emits_exact_sequence() {
    let provider = ScriptedDecisionProvider::new([Decision::act("add", "add", json!({"a": 1, "b": 1}))]);
    let (bus, recorder) = recording_bus();
    let mut agent = Agent::new(config().with_max_iterations(1), Arc::new(provider), registry())
        .unwrap()
        .with_event_bus(bus);

    agent.run("add once").await;

    assert_eq!(
        recorder.kinds(),
        vec![
            EventKind::Start,
            EventKind::ToolCall,
            EventKind::ToolResult,
            EventKind::Step,
            EventKind::Finish,
        ]
    );
}

#[tokio::test]
async fn test_validation_failure_is_isolated() {
    let provider = ScriptedDecisionProvider::new([
        Decision::act("bad input", "add", json!({"a": "two", "b": 3})),
        Decision::act("good input", "add", json!({"a": 2, "b": 3})),
        Decision::finish("5"),
    ]);
    let (bus, recorder) = recording_bus();
    let mut agent = Agent::new(config(), Arc::new(provider), registry())
        .unwrap()
        .with_event_bus(bus);

    let result = agent.run("add").await;

    assert_eq!(result.iterations, 3);
    assert!(!result.success);
    let error = result.steps[0].error.as_ref().unwrap();
    assert_eq!(error.kind, StepErrorKind::Validation);
    assert!(error.message.contains("$.a"));
    assert_eq!(result.steps[1].observation, Some(json!(5)));
    assert_eq!(result.output, "5");

    assert_eq!(
        &recorder.kinds()[..4],
        &[
            EventKind::Start,
            EventKind::ToolCall,
            EventKind::Error,
            EventKind::Step
        ]
    );
}

#[tokio::test]
async fn test_execution_failure_preserves_message() {
    let provider = ScriptedDecisionProvider::new([
        Decision::act("try", "explode", json!(null)),
        Decision::finish("gave up"),
    ]);
    let mut agent = Agent::new(config(), Arc::new(provider), registry()).unwrap();

    let result = agent.run("explode").await;

    let error = result.steps[0].error.as_ref().unwrap();
    assert_eq!(error.kind, StepErrorKind::Execution);
    assert!(error.message.contains("kaboom"));
    assert!(!result.success);
    assert_eq!(result.output, "gave up");
}

#[tokio::test]
async fn test_capability_deadline_is_step_error() {
    let provider = ScriptedDecisionProvider::new([
        Decision::act("wait", "sleep", json!(null)),
        Decision::finish("too slow"),
    ]);
    let mut agent = Agent::new(
        config().with_capability_timeout_secs(1),
        Arc::new(provider),
        registry(),
    )
    .unwrap();

    let result = agent.run("sleep").await;

    assert_eq!(result.iterations, 2);
    let error = result.steps[0].error.as_ref().unwrap();
    assert_eq!(error.kind, StepErrorKind::Timeout);
    assert!(error.message.contains("timed out"));
}

struct FailingProvider;

#[async_trait]
impl DecisionProvider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn decide(&self, _config: &AgentConfig, _state: &ExecutionState) -> anyhow::Result<Decision> {
        anyhow::bail!("model unavailable")
    }
}

struct SlowProvider;

#[async_trait]
impl DecisionProvider for SlowProvider {
    fn name(&self) -> &str {
        "slow"
    }

    async fn decide(&self, _config: &AgentConfig, _state: &ExecutionState) -> anyhow::Result<Decision> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(Decision::finish("late"))
    }
}

#[tokio::test]
async fn test_decision_failure_aborts_run() {
    let (bus, recorder) = recording_bus();
    let mut agent = Agent::new(config(), Arc::new(FailingProvider), registry())
        .unwrap()
        .with_event_bus(bus);

    let result = agent.run("anything").await;

    assert!(!result.success);
    assert_eq!(result.iterations, 0);
    assert!(result.steps.is_empty());
    assert!(result.error.as_deref().unwrap().contains("model unavailable"));
    assert_eq!(
        recorder.kinds(),
        vec![EventKind::Start, EventKind::Error, EventKind::Finish]
    );
}

#[tokio::test]
async fn test_panicking_provider_fails_run() {
    let (bus, recorder) = recording_bus();
    let provider = FnDecisionProvider::new(
        "panicking",
        |state: &ExecutionState| -> anyhow::Result<Decision> {
            if state.iteration() == 0 {
                panic!("provider bug");
            }
            Ok(Decision::finish("unreachable"))
        },
    );
    let mut agent = Agent::new(config(), Arc::new(provider), registry())
        .unwrap()
        .with_event_bus(bus);

    let result = agent.run("anything").await;

    assert!(!result.success);
    assert_eq!(result.iterations, 0);
    assert!(result.error.as_deref().unwrap().contains("panicked"));
    assert_eq!(
        recorder.kinds(),
        vec![EventKind::Start, EventKind::Error, EventKind::Finish]
    );

    // The agent stays usable after the failed run
    let again = agent.run("again").await;
    assert!(!again.success);
}

#[tokio::test]
async fn test_decision_deadline_aborts_run() {
    let mut agent = Agent::new(
        config().with_decision_timeout_secs(1),
        Arc::new(SlowProvider),
        registry(),
    )
    .unwrap();

    let result = agent.run("anything").await;

    assert!(!result.success);
    assert_eq!(
        result.error.as_deref(),
        Some(EngineError::DecisionTimeout.to_string().as_str())
    );
}

struct BrokenListener;

#[async_trait]
impl EventListener for BrokenListener {
    async fn on_event(&self, _event: &AgentEvent) -> anyhow::Result<()> {
        anyhow::bail!("listener down")
    }
}

#[tokio::test]
async fn test_listener_failure_does_not_affect_run() {
    let recorder = Arc::new(EventRecorder::new());
    let bus = EventBus::new()
        .with_listener(BrokenListener)
        .with_shared_listener(Arc::clone(&recorder) as Arc<dyn EventListener>);
    let provider = FnDecisionProvider::new("done", |_: &ExecutionState| Ok(Decision::finish("ok")));
    let mut agent = Agent::new(config(), Arc::new(provider), registry())
        .unwrap()
        .with_event_bus(bus);

    let result = agent.run("go").await;

    assert!(result.success);
    assert_eq!(
        recorder.kinds(),
        vec![EventKind::Start, EventKind::Step, EventKind::Finish]
    );
}

#[tokio::test]
async fn test_channel_listener_streams_events() {
    let (listener, mut rx) = ChannelListener::new();
    let provider = FnDecisionProvider::new("done", |_: &ExecutionState| Ok(Decision::finish("ok")));
    let mut agent = Agent::new(config(), Arc::new(provider), registry())
        .unwrap()
        .with_event_bus(EventBus::new().with_listener(listener));

    agent.run("go").await;
    drop(agent);

    let mut kinds = Vec::new();
    while let Some(event) = rx.recv().await {
        kinds.push(event.kind());
    }
    assert_eq!(kinds, vec![EventKind::Start, EventKind::Step, EventKind::Finish]);
}

#[tokio::test]
async fn test_shared_registry_between_agents() {
    let shared = registry();
    let provider = || {
        Arc::new(ScriptedDecisionProvider::new([
            Decision::act("add", "add", json!({"a": 1, "b": 2})),
            Decision::finish("3"),
        ]))
    };

    let mut first = Agent::new(config(), provider(), Arc::clone(&shared)).unwrap();
    let mut second = Agent::new(config(), provider(), Arc::clone(&shared)).unwrap();

    let (a, b) = tokio::join!(first.run("one"), second.run("two"));
    assert!(a.success);
    assert!(b.success);
}

#[tokio::test]
async fn test_agent_uses_memory_capabilities() {
    let registry = CapabilityRegistry::new();
    let memory = Arc::new(EphemeralMemory::with_capacity(10));
    register_memory_capabilities(&registry, Arc::clone(&memory) as Arc<dyn MemoryStore>).unwrap();

    let provider = ScriptedDecisionProvider::new([
        Decision::act("remember", "memory_save", json!({"key": "city", "value": "Lisbon"})),
        Decision::act("recall", "memory_get", json!({"key": "city"})),
        Decision::finish("Lisbon"),
    ]);
    let mut agent = Agent::new(config(), Arc::new(provider), Arc::new(registry)).unwrap();
    assert!(agent.system_prompt().contains("## memory_save"));

    let result = agent.run("remember the city").await;

    assert!(result.success);
    assert_eq!(result.steps[1].observation.as_ref().unwrap()["value"], json!("Lisbon"));

    // Memory survives a reset of the execution state
    agent.reset();
    assert_eq!(memory.get("city"), Some(json!("Lisbon")));
}
