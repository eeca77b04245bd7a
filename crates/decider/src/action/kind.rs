//! Per-kind action configuration
//!
//! Each [`ActionKind`] variant carries the configuration needed to build the
//! decision that starts its unit of work.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decision::{ChildPolicy, Decision, Timeout};
use crate::error::{DecisionError, Result};
use crate::event::{ActivityType, WorkflowType};

/// Maximum number of tags the service accepts on a run
pub const MAX_TAGS: usize = 5;

/// What an action does when it is initiated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionKind {
    /// Schedule an activity task
    Activity(ActivitySpec),

    /// Start a timer
    Timer(TimerSpec),

    /// Signal another workflow run
    Signal(SignalSpec),

    /// Start a child workflow
    ChildWorkflow(ChildWorkflowSpec),

    /// Record a marker
    Marker(MarkerSpec),

    /// Continue the run as a new one
    ContinueAsNew(ContinueAsNewSpec),
}

impl ActionKind {
    /// Short label used in action descriptions
    pub fn label(&self) -> &'static str {
        match self {
            Self::Activity(_) => "Activity",
            Self::Timer(_) => "Timer",
            Self::Signal(_) => "Signal",
            Self::ChildWorkflow(_) => "ChildWorkflow",
            Self::Marker(_) => "Marker",
            Self::ContinueAsNew(_) => "ContinueAsNew",
        }
    }

    /// Check if this is the timer variant
    pub fn is_timer(&self) -> bool {
        matches!(self, Self::Timer(_))
    }

    /// Build the decision that starts this unit of work
    pub fn initiate_decision(&self, action_id: &str) -> Decision {
        match self {
            Self::Activity(spec) => Decision::ScheduleActivityTask {
                activity_id: action_id.to_string(),
                activity_type: spec.activity_type.clone(),
                input: spec.input.clone(),
                control: spec.control.clone(),
                task_list: spec.task_list.clone(),
                heartbeat_timeout: spec.heartbeat_timeout,
                schedule_to_close_timeout: spec.schedule_to_close_timeout,
                schedule_to_start_timeout: spec.schedule_to_start_timeout,
                start_to_close_timeout: spec.start_to_close_timeout,
                task_priority: spec.task_priority,
            },
            Self::Timer(spec) => Decision::StartTimer {
                timer_id: action_id.to_string(),
                start_to_fire_timeout: spec.delay,
                control: spec.control.clone(),
            },
            Self::Signal(spec) => Decision::SignalExternalWorkflowExecution {
                workflow_id: spec.workflow_id.clone(),
                run_id: spec.run_id.clone(),
                signal_name: spec.signal_name.clone(),
                input: spec.input.clone(),
                control: Some(action_id.to_string()),
            },
            Self::ChildWorkflow(spec) => Decision::StartChildWorkflowExecution {
                workflow_id: spec.next_workflow_id(),
                workflow_type: spec.workflow_type.clone(),
                control: Some(action_id.to_string()),
                input: spec.input.clone(),
                task_list: spec.task_list.clone(),
                execution_start_to_close_timeout: spec.execution_start_to_close_timeout,
                task_start_to_close_timeout: spec.task_start_to_close_timeout,
                child_policy: spec.child_policy,
                tags: spec.tags.clone(),
            },
            Self::Marker(spec) => Decision::record_marker(action_id, spec.details.clone()),
            Self::ContinueAsNew(spec) => Decision::ContinueAsNewWorkflowExecution {
                input: spec.input.clone(),
                task_list: spec.task_list.clone(),
                execution_start_to_close_timeout: spec.execution_start_to_close_timeout,
                task_start_to_close_timeout: spec.task_start_to_close_timeout,
                child_policy: spec.child_policy,
                tags: spec.tags.clone(),
                workflow_type_version: spec.workflow_type_version.clone(),
            },
        }
    }
}

/// Activity task configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivitySpec {
    /// Registered activity type
    pub activity_type: ActivityType,

    /// Input passed to the activity
    pub input: Option<String>,

    /// Control data echoed back in the scheduled event
    pub control: Option<String>,

    /// Task list override
    pub task_list: Option<String>,

    /// Heartbeat timeout override
    pub heartbeat_timeout: Option<Timeout>,

    /// Schedule-to-close timeout override
    pub schedule_to_close_timeout: Option<Timeout>,

    /// Schedule-to-start timeout override
    pub schedule_to_start_timeout: Option<Timeout>,

    /// Start-to-close timeout override
    pub start_to_close_timeout: Option<Timeout>,

    /// Task priority override
    pub task_priority: Option<i32>,
}

impl ActivitySpec {
    /// Create a spec for a registered activity type
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            activity_type: ActivityType::new(name, version),
            input: None,
            control: None,
            task_list: None,
            heartbeat_timeout: None,
            schedule_to_close_timeout: None,
            schedule_to_start_timeout: None,
            start_to_close_timeout: None,
            task_priority: None,
        }
    }

    /// Set the activity input
    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }

    /// Set control data
    pub fn with_control(mut self, control: impl Into<String>) -> Self {
        self.control = Some(control.into());
        self
    }

    /// Set the task list
    pub fn with_task_list(mut self, task_list: impl Into<String>) -> Self {
        self.task_list = Some(task_list.into());
        self
    }

    /// Set the heartbeat timeout (zero means no limit)
    pub fn with_heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.heartbeat_timeout = Some(Timeout::from_duration(timeout));
        self
    }

    /// Set the schedule-to-close timeout (zero means no limit)
    pub fn with_schedule_to_close_timeout(mut self, timeout: Duration) -> Self {
        self.schedule_to_close_timeout = Some(Timeout::from_duration(timeout));
        self
    }

    /// Set the schedule-to-start timeout (zero means no limit)
    pub fn with_schedule_to_start_timeout(mut self, timeout: Duration) -> Self {
        self.schedule_to_start_timeout = Some(Timeout::from_duration(timeout));
        self
    }

    /// Set the start-to-close timeout (zero means no limit)
    pub fn with_start_to_close_timeout(mut self, timeout: Duration) -> Self {
        self.start_to_close_timeout = Some(Timeout::from_duration(timeout));
        self
    }

    /// Set the task priority
    pub fn with_task_priority(mut self, priority: i32) -> Self {
        self.task_priority = Some(priority);
        self
    }
}

/// Timer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerSpec {
    /// Delay before the timer fires
    pub delay: Duration,

    /// Control data echoed back in the started event
    pub control: Option<String>,
}

impl TimerSpec {
    /// Create a timer spec, rounding the delay up to whole seconds
    pub fn new(delay: Duration) -> Self {
        Self {
            delay: Duration::from_secs(crate::decision::whole_seconds(delay)),
            control: None,
        }
    }

    /// Set control data
    pub fn with_control(mut self, control: impl Into<String>) -> Self {
        self.control = Some(control.into());
        self
    }
}

/// External signal configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSpec {
    /// Target workflow id
    pub workflow_id: String,

    /// Target run id
    pub run_id: Option<String>,

    /// Signal name
    pub signal_name: String,

    /// Signal input
    pub input: Option<String>,
}

impl SignalSpec {
    /// Create a spec signalling the current run of a workflow id
    pub fn new(workflow_id: impl Into<String>, signal_name: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            run_id: None,
            signal_name: signal_name.into(),
            input: None,
        }
    }

    /// Target a specific run
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    /// Set the signal input
    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }
}

/// Child workflow configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildWorkflowSpec {
    /// Registered child workflow type
    pub workflow_type: WorkflowType,

    /// Child input
    pub input: Option<String>,

    /// Task list (the parent's when `None`)
    pub task_list: Option<String>,

    /// Execution start-to-close timeout override
    pub execution_start_to_close_timeout: Option<Timeout>,

    /// Decision task start-to-close timeout override
    pub task_start_to_close_timeout: Option<Timeout>,

    /// Child policy override
    pub child_policy: Option<ChildPolicy>,

    /// Tags attached to the child run
    pub tags: Vec<String>,

    /// Fixed workflow id, generated per start when `None`
    pub workflow_id: Option<String>,
}

impl ChildWorkflowSpec {
    /// Create a spec for a registered workflow type
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            workflow_type: WorkflowType::new(name, version),
            input: None,
            task_list: None,
            execution_start_to_close_timeout: None,
            task_start_to_close_timeout: None,
            child_policy: None,
            tags: vec![],
            workflow_id: None,
        }
    }

    /// Set the child input
    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }

    /// Set the task list
    pub fn with_task_list(mut self, task_list: impl Into<String>) -> Self {
        self.task_list = Some(task_list.into());
        self
    }

    /// Set the execution start-to-close timeout (zero means no limit)
    pub fn with_execution_start_to_close_timeout(mut self, timeout: Duration) -> Self {
        self.execution_start_to_close_timeout = Some(Timeout::from_duration(timeout));
        self
    }

    /// Set the decision task start-to-close timeout (zero means no limit)
    pub fn with_task_start_to_close_timeout(mut self, timeout: Duration) -> Self {
        self.task_start_to_close_timeout = Some(Timeout::from_duration(timeout));
        self
    }

    /// Set the child policy
    pub fn with_child_policy(mut self, policy: ChildPolicy) -> Self {
        self.child_policy = Some(policy);
        self
    }

    /// Set the tags
    ///
    /// # Errors
    ///
    /// [`DecisionError::UnconfiguredAction`] when more than [`MAX_TAGS`] are given.
    pub fn with_tags<I, S>(mut self, tags: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = collect_tags(tags)?;
        Ok(self)
    }

    /// Use a fixed workflow id for the child
    pub fn with_workflow_id(mut self, workflow_id: impl Into<String>) -> Self {
        self.workflow_id = Some(workflow_id.into());
        self
    }

    /// Fixed id, or the sanitized type name plus a fresh UUID v7
    ///
    /// Generated ids differ between two cycles over the same history. The
    /// service only ever receives the one from the cycle that initiated the
    /// child, and the started event records it for `child_workflow_id`.
    /// Set a fixed id when the child must be addressable up front.
    fn next_workflow_id(&self) -> String {
        match &self.workflow_id {
            Some(id) => id.clone(),
            None => format!(
                "{}.{}",
                sanitize_workflow_id(&self.workflow_type.name),
                Uuid::now_v7()
            ),
        }
    }
}

/// Marker configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarkerSpec {
    /// Marker details
    pub details: Option<String>,
}

impl MarkerSpec {
    /// Create an empty marker spec
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the marker details
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Continue-as-new configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContinueAsNewSpec {
    /// Input for the new run
    pub input: Option<String>,

    /// Task list override
    pub task_list: Option<String>,

    /// Execution start-to-close timeout override
    pub execution_start_to_close_timeout: Option<Timeout>,

    /// Decision task start-to-close timeout override
    pub task_start_to_close_timeout: Option<Timeout>,

    /// Child policy override
    pub child_policy: Option<ChildPolicy>,

    /// Tags for the new run
    pub tags: Vec<String>,

    /// Workflow type version override
    pub workflow_type_version: Option<String>,
}

impl ContinueAsNewSpec {
    /// Create a spec that restarts with the registered defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the input for the new run
    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }

    /// Set the task list
    pub fn with_task_list(mut self, task_list: impl Into<String>) -> Self {
        self.task_list = Some(task_list.into());
        self
    }

    /// Set the execution start-to-close timeout (zero means no limit)
    pub fn with_execution_start_to_close_timeout(mut self, timeout: Duration) -> Self {
        self.execution_start_to_close_timeout = Some(Timeout::from_duration(timeout));
        self
    }

    /// Set the decision task start-to-close timeout (zero means no limit)
    pub fn with_task_start_to_close_timeout(mut self, timeout: Duration) -> Self {
        self.task_start_to_close_timeout = Some(Timeout::from_duration(timeout));
        self
    }

    /// Set the child policy
    pub fn with_child_policy(mut self, policy: ChildPolicy) -> Self {
        self.child_policy = Some(policy);
        self
    }

    /// Set the tags
    ///
    /// # Errors
    ///
    /// [`DecisionError::UnconfiguredAction`] when more than [`MAX_TAGS`] are given.
    pub fn with_tags<I, S>(mut self, tags: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = collect_tags(tags)?;
        Ok(self)
    }

    /// Continue with another version of the workflow type
    pub fn with_workflow_type_version(mut self, version: impl Into<String>) -> Self {
        self.workflow_type_version = Some(version.into());
        self
    }
}

impl From<ActivitySpec> for ActionKind {
    fn from(spec: ActivitySpec) -> Self {
        Self::Activity(spec)
    }
}

impl From<TimerSpec> for ActionKind {
    fn from(spec: TimerSpec) -> Self {
        Self::Timer(spec)
    }
}

impl From<SignalSpec> for ActionKind {
    fn from(spec: SignalSpec) -> Self {
        Self::Signal(spec)
    }
}

impl From<ChildWorkflowSpec> for ActionKind {
    fn from(spec: ChildWorkflowSpec) -> Self {
        Self::ChildWorkflow(spec)
    }
}

impl From<MarkerSpec> for ActionKind {
    fn from(spec: MarkerSpec) -> Self {
        Self::Marker(spec)
    }
}

impl From<ContinueAsNewSpec> for ActionKind {
    fn from(spec: ContinueAsNewSpec) -> Self {
        Self::ContinueAsNew(spec)
    }
}

fn collect_tags<I, S>(tags: I) -> Result<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let tags: Vec<String> = tags.into_iter().map(Into::into).collect();
    if tags.len() > MAX_TAGS {
        return Err(DecisionError::unconfigured(format!(
            "at most {} tags allowed, got {}",
            MAX_TAGS,
            tags.len()
        )));
    }
    Ok(tags)
}

/// Replace characters the service rejects in workflow ids
///
/// Whitespace, `:`, `/`, `|` and control characters become `_`. The literal
/// `arn` is reserved, so it is capitalized.
pub fn sanitize_workflow_id(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            ':' | '/' | '|' => '_',
            c if c.is_whitespace() || c.is_control() => '_',
            c => c,
        })
        .collect();
    replaced.replace("arn", "Arn")
}
