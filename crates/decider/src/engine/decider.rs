//! Decision engine
//!
//! The `Decider` runs one decision cycle per polled decision task:
//! - Looks up the workflow type in the registry
//! - Indexes the task's history events
//! - Routes unrecoverable error events to the workflow hook
//! - Collects the workflow's decisions for the transport to submit

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::config::DeciderConfig;
use crate::decision::Decision;
use crate::error::{DecisionError, Result};
use crate::event::{HistoryEvent, WorkflowType};
use crate::history::WorkflowHistory;

use super::registry::WorkflowRegistry;

/// A decision task as handed over by the poller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionTask {
    /// Opaque token identifying the task to the service
    pub task_token: String,

    /// Workflow id of the run
    pub workflow_id: String,

    /// Run id of the run
    pub run_id: String,

    /// Registered workflow type of the run
    pub workflow_type: WorkflowType,

    /// Task list the decision task was polled from
    #[serde(default)]
    pub task_list: Option<String>,

    /// History events, in either order
    #[serde(default)]
    pub events: Vec<HistoryEvent>,
}

impl DecisionTask {
    /// Create a task for a run
    pub fn new(
        workflow_id: impl Into<String>,
        run_id: impl Into<String>,
        workflow_type: WorkflowType,
        events: Vec<HistoryEvent>,
    ) -> Self {
        Self {
            task_token: String::new(),
            workflow_id: workflow_id.into(),
            run_id: run_id.into(),
            workflow_type,
            task_list: None,
            events,
        }
    }

    /// Set the task token
    pub fn with_task_token(mut self, task_token: impl Into<String>) -> Self {
        self.task_token = task_token.into();
        self
    }

    /// Set the task list
    pub fn with_task_list(mut self, task_list: impl Into<String>) -> Self {
        self.task_list = Some(task_list.into());
        self
    }
}

/// Result of one decision cycle
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionOutcome {
    /// Decisions to submit, in evaluation order
    pub decisions: Vec<Decision>,

    /// Number of events kept in the history index
    pub events_indexed: usize,

    /// Number of unrecoverable error events seen
    pub error_events: usize,
}

impl DecisionOutcome {
    /// Check if the cycle closes the run
    pub fn is_terminal(&self) -> bool {
        self.decisions.iter().any(Decision::is_terminal)
    }
}

/// Decision engine
///
/// Stateless across tasks: every call builds a fresh workflow and history, so
/// one decider can serve many runs from several threads.
///
/// # Example
///
/// ```ignore
/// let mut registry = WorkflowRegistry::new();
/// registry.register::<CronWorkflow>();
///
/// let decider = Decider::with_config(DeciderConfig::from_env());
/// let outcome = decider.decide(&registry, &task)?;
/// // hand outcome.decisions to the transport
/// ```
#[derive(Debug, Clone, Default)]
pub struct Decider {
    config: DeciderConfig,
}

impl Decider {
    /// Create a decider with the default config
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a decider with custom config
    pub fn with_config(config: DeciderConfig) -> Self {
        Self { config }
    }

    /// Get the config
    pub fn config(&self) -> &DeciderConfig {
        &self.config
    }

    /// Run one decision cycle
    #[instrument(
        skip(self, registry, task),
        fields(
            workflow_id = %task.workflow_id,
            run_id = %task.run_id,
            workflow_type = %task.workflow_type,
            events = task.events.len()
        )
    )]
    pub fn decide(&self, registry: &WorkflowRegistry, task: &DecisionTask) -> Result<DecisionOutcome> {
        let mut workflow = registry.create(&task.workflow_type)?;

        // Check event limit
        if task.events.len() > self.config.max_events_per_decision {
            return Err(DecisionError::TooManyEvents {
                workflow_id: task.workflow_id.clone(),
                count: task.events.len(),
                max: self.config.max_events_per_decision,
            });
        }

        let history = WorkflowHistory::from_events(&task.events);
        let errors = history.error_events();
        let mut decisions = Vec::new();

        if !errors.is_empty() && self.config.fail_on_unrecoverable_errors {
            warn!(
                error_events = errors.len(),
                first = %errors[0].event_type,
                "workflow has unrecoverable errors"
            );
            workflow.on_unrecoverable_errors(&errors, &mut decisions);
        } else {
            workflow.decide(&history, &mut decisions)?;
        }

        self.fill_task_lists(task, &mut decisions);

        info!(
            decisions = decisions.len(),
            terminal = decisions.iter().any(Decision::is_terminal),
            "decision cycle complete"
        );

        Ok(DecisionOutcome {
            decisions,
            events_indexed: history.len(),
            error_events: errors.len(),
        })
    }

    /// Ask the workflow whether the poller should fetch more history
    pub fn is_continue_polling(&self, registry: &WorkflowRegistry, task: &DecisionTask) -> Result<bool> {
        let workflow = registry.create(&task.workflow_type)?;
        let history = WorkflowHistory::from_events(&task.events);
        Ok(workflow.is_continue_polling(&history))
    }

    /// Child workflows without a task list inherit the parent's
    fn fill_task_lists(&self, task: &DecisionTask, decisions: &mut [Decision]) {
        let parent = task
            .task_list
            .as_deref()
            .unwrap_or(&self.config.default_task_list);

        for decision in decisions.iter_mut() {
            if let Decision::StartChildWorkflowExecution {
                workflow_id,
                task_list: task_list @ None,
                ..
            } = decision
            {
                debug!(child = %workflow_id, task_list = parent, "child inherits task list");
                *task_list = Some(parent.to_string());
            }
        }
    }
}
