//! Decision engine
//!
//! The engine module provides the [`Decider`] which runs one decision cycle
//! per polled task, and the [`WorkflowRegistry`] it builds workflows from.

mod decider;
mod registry;
mod workflow;

pub use decider::{Decider, DecisionOutcome, DecisionTask};
pub use registry::{AnyWorkflow, WorkflowFactory, WorkflowRegistry};
pub use workflow::Workflow;
