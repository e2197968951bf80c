//! Agent Loop
//!
//! The agent drives a run through an iterative decide-act-observe cycle.
//! Decisions come from an injected `DecisionProvider`; actions are
//! dispatched through the `CapabilityRegistry`; every lifecycle occurrence
//! is published on the `EventBus`.

pub mod core;
pub mod decision;
pub mod state;

pub use self::core::Agent;
pub use decision::{DecisionProvider, FinishImmediately, FnDecisionProvider, ScriptedDecisionProvider};
pub use state::{
    ExecutionState, Message, MessageRole, RunMetadata, RunResult, Step, StepError, StepErrorKind,
};
