//! Decisions returned to the orchestration service

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::event::{ActivityType, WorkflowType};

/// Instructions a decision cycle can produce
///
/// The decider only builds these. Marshaling them into a
/// `RespondDecisionTaskCompleted` call is up to the transport.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Decision {
    /// Schedule an activity task
    ScheduleActivityTask {
        /// Workflow-unique action id
        activity_id: String,

        /// Registered activity type
        activity_type: ActivityType,

        /// Input passed to the activity
        input: Option<String>,

        /// Free-form control data echoed back in the scheduled event
        control: Option<String>,

        /// Task list override (registered default when `None`)
        task_list: Option<String>,

        /// Heartbeat timeout override
        heartbeat_timeout: Option<Timeout>,

        /// Schedule-to-close timeout override
        schedule_to_close_timeout: Option<Timeout>,

        /// Schedule-to-start timeout override
        schedule_to_start_timeout: Option<Timeout>,

        /// Start-to-close timeout override
        start_to_close_timeout: Option<Timeout>,

        /// Task priority override
        task_priority: Option<i32>,
    },

    /// Start a timer
    StartTimer {
        /// Timer identifier
        timer_id: String,

        /// Delay before the timer fires
        #[serde(with = "duration_secs")]
        start_to_fire_timeout: Duration,

        /// Free-form control data echoed back in the started event
        control: Option<String>,
    },

    /// Cancel a started timer
    CancelTimer {
        /// Timer identifier
        timer_id: String,
    },

    /// Record a marker in the workflow history
    RecordMarker {
        /// Marker name (the action id)
        marker_name: String,

        /// Marker details
        details: Option<String>,
    },

    /// Signal another workflow run
    SignalExternalWorkflowExecution {
        /// Target workflow id
        workflow_id: String,

        /// Target run (the current run of the workflow id when `None`)
        run_id: Option<String>,

        /// Signal name
        signal_name: String,

        /// Signal input
        input: Option<String>,

        /// Carries the action id
        control: Option<String>,
    },

    /// Start a child workflow
    StartChildWorkflowExecution {
        /// Workflow id for the child
        workflow_id: String,

        /// Registered child workflow type
        workflow_type: WorkflowType,

        /// Carries the action id
        control: Option<String>,

        /// Child input
        input: Option<String>,

        /// Task list (the parent's task list when `None`)
        task_list: Option<String>,

        /// Execution start-to-close timeout override
        execution_start_to_close_timeout: Option<Timeout>,

        /// Decision task start-to-close timeout override
        task_start_to_close_timeout: Option<Timeout>,

        /// What happens to the child when the parent closes
        child_policy: Option<ChildPolicy>,

        /// Tags attached to the child run
        tags: Vec<String>,
    },

    /// Close this run and start a new one with fresh history
    ContinueAsNewWorkflowExecution {
        /// Input for the new run
        input: Option<String>,

        /// Task list override
        task_list: Option<String>,

        /// Execution start-to-close timeout override
        execution_start_to_close_timeout: Option<Timeout>,

        /// Decision task start-to-close timeout override
        task_start_to_close_timeout: Option<Timeout>,

        /// Child policy override
        child_policy: Option<ChildPolicy>,

        /// Tags for the new run
        tags: Vec<String>,

        /// Workflow type version override
        workflow_type_version: Option<String>,
    },

    /// Complete the workflow run successfully
    CompleteWorkflowExecution {
        /// Run result
        result: Option<String>,
    },

    /// Fail the workflow run
    FailWorkflowExecution {
        /// Failure reason
        reason: Option<String>,

        /// Failure details
        details: Option<String>,
    },
}

impl Decision {
    /// Create a start timer decision
    pub fn timer(timer_id: impl Into<String>, delay: Duration) -> Self {
        Self::StartTimer {
            timer_id: timer_id.into(),
            start_to_fire_timeout: delay,
            control: None,
        }
    }

    /// Create a cancel timer decision
    pub fn cancel_timer(timer_id: impl Into<String>) -> Self {
        Self::CancelTimer {
            timer_id: timer_id.into(),
        }
    }

    /// Create a record marker decision
    pub fn record_marker(marker_name: impl Into<String>, details: Option<String>) -> Self {
        Self::RecordMarker {
            marker_name: marker_name.into(),
            details,
        }
    }

    /// Create a complete workflow decision
    pub fn complete(result: Option<String>) -> Self {
        Self::CompleteWorkflowExecution { result }
    }

    /// Create a fail workflow decision
    ///
    /// `target` names what failed and prefixes the reason.
    pub fn fail(target: &str, reason: Option<&str>, details: Option<&str>) -> Self {
        let reason = match reason {
            Some(reason) => format!("{} error: {}", target, reason),
            None => format!("{} error", target),
        };
        Self::FailWorkflowExecution {
            reason: Some(reason),
            details: details.map(str::to_string),
        }
    }

    /// Wire name of the decision type
    pub fn decision_type(&self) -> &'static str {
        match self {
            Self::ScheduleActivityTask { .. } => "ScheduleActivityTask",
            Self::StartTimer { .. } => "StartTimer",
            Self::CancelTimer { .. } => "CancelTimer",
            Self::RecordMarker { .. } => "RecordMarker",
            Self::SignalExternalWorkflowExecution { .. } => "SignalExternalWorkflowExecution",
            Self::StartChildWorkflowExecution { .. } => "StartChildWorkflowExecution",
            Self::ContinueAsNewWorkflowExecution { .. } => "ContinueAsNewWorkflowExecution",
            Self::CompleteWorkflowExecution { .. } => "CompleteWorkflowExecution",
            Self::FailWorkflowExecution { .. } => "FailWorkflowExecution",
        }
    }

    /// Check if this decision closes the workflow run
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::CompleteWorkflowExecution { .. }
                | Self::FailWorkflowExecution { .. }
                | Self::ContinueAsNewWorkflowExecution { .. }
        )
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ScheduleActivityTask { activity_id, .. } => {
                write!(f, "ScheduleActivityTask '{}'", activity_id)
            }
            Self::StartTimer {
                timer_id,
                start_to_fire_timeout,
                ..
            } => write!(
                f,
                "StartTimer '{}' {}s",
                timer_id,
                start_to_fire_timeout.as_secs()
            ),
            Self::CancelTimer { timer_id } => write!(f, "CancelTimer '{}'", timer_id),
            Self::RecordMarker { marker_name, .. } => write!(f, "RecordMarker '{}'", marker_name),
            Self::SignalExternalWorkflowExecution {
                workflow_id,
                signal_name,
                ..
            } => write!(
                f,
                "SignalExternalWorkflowExecution '{}' -> {}",
                signal_name, workflow_id
            ),
            Self::StartChildWorkflowExecution { workflow_id, .. } => {
                write!(f, "StartChildWorkflowExecution {}", workflow_id)
            }
            other => f.write_str(other.decision_type()),
        }
    }
}

/// Timeout override sent with a decision
///
/// The service takes timeouts as whole seconds, or `"NONE"` for no limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// No limit
    Unlimited,

    /// Limit in whole seconds
    Seconds(u64),
}

impl Timeout {
    /// Convert a duration, rounding sub-second values up to one second
    ///
    /// A zero duration means no limit.
    pub fn from_duration(duration: Duration) -> Self {
        if duration.is_zero() {
            Self::Unlimited
        } else {
            Self::Seconds(whole_seconds(duration))
        }
    }
}

impl fmt::Display for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unlimited => f.write_str("NONE"),
            Self::Seconds(secs) => write!(f, "{}", secs),
        }
    }
}

impl Serialize for Timeout {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timeout {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if s.eq_ignore_ascii_case("NONE") {
            return Ok(Self::Unlimited);
        }
        s.parse()
            .map(Self::Seconds)
            .map_err(|_| serde::de::Error::custom(format!("invalid timeout: {}", s)))
    }
}

/// What happens to child workflows when their parent closes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChildPolicy {
    /// Children are terminated
    #[default]
    Terminate,

    /// Children get a cancel request
    RequestCancel,

    /// Children keep running
    Abandon,
}

/// Round a duration up to whole seconds, never below one
pub(crate) fn whole_seconds(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    let secs = if duration.subsec_nanos() > 0 { secs.saturating_add(1) } else { secs };
    secs.max(1)
}

/// Serde support for Duration as whole seconds
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
