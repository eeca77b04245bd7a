//! Workflow registry for type-erased workflow creation
//!
//! The registry maps `name-version` keys to factories, so the decider can
//! build a workflow for a decision task without knowing its concrete type.
//! It is an explicit value built once at startup and passed by reference.

use std::collections::HashMap;
use std::fmt;

use tracing::info;

use crate::decision::Decision;
use crate::error::{DecisionError, Result};
use crate::event::{HistoryEvent, WorkflowType};
use crate::history::WorkflowHistory;

use super::workflow::Workflow;

/// Type-erased workflow interface
///
/// This trait allows the decider to work with workflows without knowing
/// their concrete types.
pub trait AnyWorkflow: Send + Sync {
    /// Get the registered workflow type
    fn workflow_type(&self) -> WorkflowType;

    /// Append the decisions for the current history
    fn decide(&mut self, history: &WorkflowHistory, decisions: &mut Vec<Decision>) -> Result<()>;

    /// Handle unrecoverable error events
    fn on_unrecoverable_errors(&mut self, errors: &[&HistoryEvent], decisions: &mut Vec<Decision>);

    /// Whether the poller should fetch another page of history
    fn is_continue_polling(&self, history: &WorkflowHistory) -> bool;
}

/// Wrapper to implement AnyWorkflow for any Workflow
struct WorkflowWrapper<W: Workflow> {
    inner: W,
}

impl<W: Workflow> AnyWorkflow for WorkflowWrapper<W> {
    fn workflow_type(&self) -> WorkflowType {
        W::workflow_type()
    }

    fn decide(&mut self, history: &WorkflowHistory, decisions: &mut Vec<Decision>) -> Result<()> {
        self.inner.decide(history, decisions)
    }

    fn on_unrecoverable_errors(&mut self, errors: &[&HistoryEvent], decisions: &mut Vec<Decision>) {
        self.inner.on_unrecoverable_errors(errors, decisions)
    }

    fn is_continue_polling(&self, history: &WorkflowHistory) -> bool {
        self.inner.is_continue_polling(history)
    }
}

/// Factory function type for creating workflows
pub type WorkflowFactory = Box<dyn Fn() -> Box<dyn AnyWorkflow> + Send + Sync>;

/// Registry of workflow factories
pub struct WorkflowRegistry {
    factories: HashMap<String, WorkflowFactory>,
}

impl Default for WorkflowRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a workflow type
    ///
    /// Registering the same name and version again replaces the factory.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let mut registry = WorkflowRegistry::new();
    /// registry.register::<CronWorkflow>();
    /// ```
    pub fn register<W: Workflow>(&mut self) {
        let factory: WorkflowFactory =
            Box::new(|| Box::new(WorkflowWrapper { inner: W::new() }) as Box<dyn AnyWorkflow>);

        let key = W::workflow_type().key();
        info!(workflow_type = %key, "registered workflow type");
        self.factories.insert(key, factory);
    }

    /// Check if a workflow type is registered
    pub fn contains(&self, workflow_type: &WorkflowType) -> bool {
        self.factories.contains_key(&workflow_type.key())
    }

    /// Create a workflow instance for a registered type
    pub fn create(&self, workflow_type: &WorkflowType) -> Result<Box<dyn AnyWorkflow>> {
        let key = workflow_type.key();
        let factory = self
            .factories
            .get(&key)
            .ok_or(DecisionError::UnknownWorkflowType(key))?;

        Ok(factory())
    }

    /// Get the number of registered workflow types
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Get all registered `name-version` keys
    pub fn workflow_types(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(|s| s.as_str())
    }
}

impl fmt::Debug for WorkflowRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowRegistry")
            .field("workflow_types", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}
