//! # Decision Engine
//!
//! A deterministic decider for SWF-style workflow orchestration. Given the
//! polled history of a workflow run it computes the next decisions: schedule
//! work, retry it, or close the run.
//!
//! ## Features
//!
//! - **Canonical events**: Every raw history event is classified into one shape with a state and a chain correlation
//! - **Read-through actions**: Actions own no state, each query joins the history on the action id
//! - **Retries and repeats**: Stateless retry policies with backoff, jitter, attempt caps and expiration
//! - **Control flow**: Sequence and split combinators evaluated once per decision cycle
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Decider                             │
//! │  (one decision cycle per polled task, registry lookup)      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      WorkflowHistory                         │
//! │  (classified events, action chains, run metadata)           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │              Action / DecisionBuilder / RetryPolicy          │
//! │  (state machine, flow evaluation, retry timers)             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use everruns_decider::prelude::*;
//!
//! struct Pipeline;
//!
//! impl Workflow for Pipeline {
//!     const NAME: &'static str = "Pipeline";
//!     const VERSION: &'static str = "1.0";
//!
//!     fn new() -> Self {
//!         Self
//!     }
//!
//!     fn decide(&mut self, history: &WorkflowHistory, decisions: &mut Vec<Decision>) -> Result<()> {
//!         let mut flow = DecisionBuilder::new();
//!         flow.split(vec![
//!             FlowArg::action(|| Action::activity("extract-a", "Extract", "1.0")),
//!             FlowArg::action(|| Action::activity("extract-b", "Extract", "1.0")),
//!         ])?
//!         .sequence(vec![
//!             FlowArg::Stacked,
//!             FlowArg::action(|| {
//!                 Action::activity("load", "Load", "1.0").with_complete_workflow_on_success()
//!             }),
//!         ])?;
//!         flow.decide(history, decisions)?;
//!         Ok(())
//!     }
//! }
//!
//! let mut registry = WorkflowRegistry::new();
//! registry.register::<Pipeline>();
//!
//! let task = DecisionTask::new("wf-1", "run-1", Pipeline::workflow_type(), vec![]);
//! let outcome = Decider::new().decide(&registry, &task).unwrap();
//! assert_eq!(outcome.decisions.len(), 2);
//! ```

pub mod action;
pub mod config;
pub mod decision;
pub mod engine;
pub mod error;
pub mod event;
pub mod flow;
pub mod history;
pub mod reliability;

/// Prelude for common imports
pub mod prelude {
    pub use crate::action::{
        Action, ActionKind, ActionState, ActivitySpec, ChildWorkflowSpec, ContinueAsNewSpec,
        MarkerSpec, SignalSpec, TimerSpec,
    };
    pub use crate::config::DeciderConfig;
    pub use crate::decision::{ChildPolicy, Decision, Timeout};
    pub use crate::engine::{Decider, DecisionOutcome, DecisionTask, Workflow, WorkflowRegistry};
    pub use crate::error::{DecisionError, Result};
    pub use crate::event::{
        ActionEvent, EventAttributes, EventState, EventType, HistoryEvent, WorkflowType,
    };
    pub use crate::flow::{DecisionBuilder, FlowArg, FlowNode};
    pub use crate::history::WorkflowHistory;
    pub use crate::reliability::{RetryPolicy, RetryTrigger};
}

// Re-export key types at crate root
pub use action::{
    Action, ActionKind, ActionState, ActivitySpec, ChildWorkflowSpec, ContinueAsNewSpec,
    MarkerSpec, SignalSpec, TimerSpec,
};
pub use config::DeciderConfig;
pub use decision::{ChildPolicy, Decision, Timeout};
pub use engine::{AnyWorkflow, Decider, DecisionOutcome, DecisionTask, Workflow, WorkflowRegistry};
pub use error::{DecisionError, Result};
pub use event::{
    classify, ActionEvent, ActivityType, EventAttributes, EventCategory, EventState, EventType,
    HistoryEvent, WorkflowType,
};
pub use flow::{DecisionBuilder, FlowArg, FlowNode};
pub use history::WorkflowHistory;
pub use reliability::{ResultMatcher, RetryPolicy, RetryTrigger};
