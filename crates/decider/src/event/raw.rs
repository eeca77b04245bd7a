//! Raw history events as polled from the orchestration service

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// History event types
///
/// This is the closed set of event types the service records in a workflow
/// run's history. Names match the service's wire names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    // =========================================================================
    // Workflow Execution Events
    // =========================================================================
    WorkflowExecutionStarted,
    WorkflowExecutionCancelRequested,
    WorkflowExecutionCompleted,
    CompleteWorkflowExecutionFailed,
    WorkflowExecutionFailed,
    FailWorkflowExecutionFailed,
    WorkflowExecutionTimedOut,
    WorkflowExecutionCanceled,
    CancelWorkflowExecutionFailed,
    WorkflowExecutionContinuedAsNew,
    ContinueAsNewWorkflowExecutionFailed,
    WorkflowExecutionTerminated,
    WorkflowExecutionSignaled,

    // =========================================================================
    // Decision Task Events
    // =========================================================================
    DecisionTaskScheduled,
    DecisionTaskStarted,
    DecisionTaskCompleted,
    DecisionTaskTimedOut,

    // =========================================================================
    // Activity Task Events
    // =========================================================================
    ActivityTaskScheduled,
    ScheduleActivityTaskFailed,
    ActivityTaskStarted,
    ActivityTaskCompleted,
    ActivityTaskFailed,
    ActivityTaskTimedOut,
    ActivityTaskCanceled,
    ActivityTaskCancelRequested,
    RequestCancelActivityTaskFailed,

    // =========================================================================
    // Marker Events
    // =========================================================================
    MarkerRecorded,
    RecordMarkerFailed,

    // =========================================================================
    // Timer Events
    // =========================================================================
    TimerStarted,
    StartTimerFailed,
    TimerFired,
    TimerCanceled,
    CancelTimerFailed,

    // =========================================================================
    // Child Workflow Events
    // =========================================================================
    StartChildWorkflowExecutionInitiated,
    StartChildWorkflowExecutionFailed,
    ChildWorkflowExecutionStarted,
    ChildWorkflowExecutionCompleted,
    ChildWorkflowExecutionFailed,
    ChildWorkflowExecutionTimedOut,
    ChildWorkflowExecutionCanceled,
    ChildWorkflowExecutionTerminated,

    // =========================================================================
    // External Workflow Events
    // =========================================================================
    SignalExternalWorkflowExecutionInitiated,
    SignalExternalWorkflowExecutionFailed,
    ExternalWorkflowExecutionSignaled,
    RequestCancelExternalWorkflowExecutionInitiated,
    RequestCancelExternalWorkflowExecutionFailed,
    ExternalWorkflowExecutionCancelRequested,
}

impl EventType {
    /// Check if this event type ends the workflow run
    pub fn is_workflow_terminal(&self) -> bool {
        matches!(
            self,
            Self::WorkflowExecutionCompleted
                | Self::WorkflowExecutionFailed
                | Self::WorkflowExecutionTimedOut
                | Self::WorkflowExecutionCanceled
                | Self::WorkflowExecutionContinuedAsNew
                | Self::WorkflowExecutionTerminated
        )
    }

    /// Check if this event type is a run-level error the decider cannot recover from
    ///
    /// These point at configuration or state problems (unknown activity type,
    /// unknown child workflow, ...) rather than a failed unit of work.
    pub fn is_unrecoverable_error(&self) -> bool {
        matches!(
            self,
            Self::WorkflowExecutionCancelRequested
                | Self::ScheduleActivityTaskFailed
                | Self::StartChildWorkflowExecutionFailed
                | Self::SignalExternalWorkflowExecutionFailed
        )
    }

    /// Check if this event is one of the two timer events the action layer reads as a retry
    pub fn is_retry_timer_event(&self) -> bool {
        matches!(self, Self::TimerFired | Self::TimerCanceled)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A registered workflow type, identified by name and version
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowType {
    /// Registered name
    pub name: String,

    /// Registered version
    pub version: String,
}

impl WorkflowType {
    /// Create a workflow type
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Registry key combining name and version
    pub fn key(&self) -> String {
        make_key(&self.name, &self.version)
    }
}

impl fmt::Display for WorkflowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// A registered activity type, identified by name and version
pub type ActivityType = WorkflowType;

/// Combine a name and version into a single key
pub fn make_key(name: &str, version: &str) -> String {
    format!("{}-{}", name, version)
}

/// Kind-specific event attributes
///
/// The service nests a different attribute record under each event type. The
/// decider only reads a handful of fields, so they are flattened here and
/// left `None` when the event type does not carry them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EventAttributes {
    pub activity_id: Option<String>,
    pub activity_type: Option<ActivityType>,
    pub timer_id: Option<String>,
    pub marker_name: Option<String>,
    pub signal_name: Option<String>,
    pub control: Option<String>,
    pub input: Option<String>,
    pub result: Option<String>,
    pub reason: Option<String>,
    pub details: Option<String>,
    pub cause: Option<String>,
    pub timeout_type: Option<String>,
    pub start_to_fire_timeout: Option<String>,

    /// Back-reference to the ActivityTaskScheduled event
    pub scheduled_event_id: Option<i64>,

    /// Back-reference to the TimerStarted (or ActivityTaskStarted) event
    pub started_event_id: Option<i64>,

    /// Back-reference to the *Initiated event of a child workflow or signal
    pub initiated_event_id: Option<i64>,

    pub workflow_id: Option<String>,
    pub run_id: Option<String>,
    pub workflow_type: Option<WorkflowType>,
}

/// One record of a workflow run's history
///
/// Immutable once the service has written it. Event ids increase
/// monotonically and are unique within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEvent {
    /// Sequence number within the run
    pub event_id: i64,

    /// Type of the event
    pub event_type: EventType,

    /// When the service recorded the event
    pub event_timestamp: DateTime<Utc>,

    /// Kind-specific attributes
    #[serde(default)]
    pub attributes: EventAttributes,
}

impl HistoryEvent {
    /// Create an event with empty attributes
    pub fn new(event_id: i64, event_type: EventType, event_timestamp: DateTime<Utc>) -> Self {
        Self {
            event_id,
            event_type,
            event_timestamp,
            attributes: EventAttributes::default(),
        }
    }

    /// Replace the attributes
    pub fn with_attributes(mut self, attributes: EventAttributes) -> Self {
        self.attributes = attributes;
        self
    }
}
