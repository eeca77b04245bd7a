//! Canonical action events
//!
//! Every raw [`HistoryEvent`] is converted into an [`ActionEvent`] that unifies
//! activities, timers, signals, markers and child workflows behind one shape:
//! a state, a category and a correlation back to the event that started its
//! chain.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::raw::{EventType, HistoryEvent};

/// State an event puts its action in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventState {
    /// Work is in flight
    Active,

    /// Work finished successfully
    Success,

    /// Work failed, timed out or was canceled
    Error,

    /// Workflow-level information, not tied to one action
    Info,

    /// Not relevant to action tracking
    Undefined,
}

impl fmt::Display for EventState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Active => "active",
            Self::Success => "success",
            Self::Error => "error",
            Self::Info => "info",
            Self::Undefined => "undefined",
        };
        f.write_str(s)
    }
}

/// Whether an event belongs to a trackable action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    /// Part of an action chain
    Action,

    /// Workflow-level signal, marker failure or lifecycle event
    External,
}

/// A classified history event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionEvent {
    event_id: i64,
    event_type: EventType,
    event_timestamp: DateTime<Utc>,
    state: EventState,
    category: EventCategory,
    initial_event_id: i64,
    is_initial_event: bool,
    action_id: Option<String>,
    data1: Option<String>,
    data2: Option<String>,
}

impl ActionEvent {
    /// Classify a raw history event
    pub fn new(event: &HistoryEvent) -> Self {
        classify(event)
    }

    /// Sequence number of the raw event
    pub fn event_id(&self) -> i64 {
        self.event_id
    }

    /// Raw event type
    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    /// When the service recorded the event
    pub fn event_timestamp(&self) -> DateTime<Utc> {
        self.event_timestamp
    }

    /// Classified state
    pub fn state(&self) -> EventState {
        self.state
    }

    /// Classified category
    pub fn category(&self) -> EventCategory {
        self.category
    }

    /// Event id of the event that began this event's chain
    ///
    /// Equals [`event_id`](Self::event_id) for chain roots and for events that
    /// belong to no chain.
    pub fn initial_event_id(&self) -> i64 {
        self.initial_event_id
    }

    /// True if this event begins a new action chain
    pub fn is_initial_event(&self) -> bool {
        self.is_initial_event
    }

    /// Workflow-unique action id, present on chain roots
    pub fn action_id(&self) -> Option<&str> {
        self.action_id.as_deref()
    }

    /// Result payload, or failure reason
    pub fn data1(&self) -> Option<&str> {
        self.data1.as_deref()
    }

    /// Failure details, or a secondary payload
    pub fn data2(&self) -> Option<&str> {
        self.data2.as_deref()
    }
}

/// How an event correlates to its chain
enum Link {
    /// Begins a chain carrying this action id
    Root(Option<String>),
    /// Points back at the chain root
    Child(Option<i64>),
    /// Belongs to no chain
    Own,
}

/// Classify one raw history event
///
/// Total over [`EventType`]. Event types that mean nothing to action tracking
/// come back [`EventState::Undefined`] so the history index can drop them.
pub fn classify(event: &HistoryEvent) -> ActionEvent {
    use EventCategory::{Action, External};
    use EventState::{Active, Error, Info, Success, Undefined};
    use EventType::*;

    let a = &event.attributes;

    let (state, category, link, data1, data2) = match event.event_type {
        ActivityTaskScheduled => (
            Active,
            Action,
            Link::Root(a.activity_id.clone()),
            a.input.clone(),
            a.control.clone(),
        ),
        ScheduleActivityTaskFailed => (
            Error,
            Action,
            Link::Root(a.activity_id.clone()),
            a.cause.clone(),
            None,
        ),
        ActivityTaskStarted => (Active, Action, Link::Child(a.scheduled_event_id), None, None),
        ActivityTaskCompleted => (
            Success,
            Action,
            Link::Child(a.scheduled_event_id),
            a.result.clone(),
            None,
        ),
        ActivityTaskFailed => (
            Error,
            Action,
            Link::Child(a.scheduled_event_id),
            a.reason.clone(),
            a.details.clone(),
        ),
        ActivityTaskTimedOut => (
            Error,
            Action,
            Link::Child(a.scheduled_event_id),
            a.timeout_type.clone(),
            a.details.clone(),
        ),
        ActivityTaskCanceled => (
            Error,
            Action,
            Link::Child(a.scheduled_event_id),
            None,
            a.details.clone(),
        ),

        TimerStarted => (
            Active,
            Action,
            Link::Root(a.timer_id.clone()),
            a.control.clone(),
            a.start_to_fire_timeout.clone(),
        ),
        StartTimerFailed => (
            Error,
            Action,
            Link::Root(a.timer_id.clone()),
            a.cause.clone(),
            None,
        ),
        TimerFired => (Success, Action, Link::Child(a.started_event_id), None, None),
        TimerCanceled => (Error, Action, Link::Child(a.started_event_id), None, None),

        SignalExternalWorkflowExecutionInitiated => (
            Active,
            Action,
            Link::Root(a.control.clone()),
            a.signal_name.clone(),
            a.input.clone(),
        ),
        ExternalWorkflowExecutionSignaled => (
            Success,
            Action,
            Link::Child(a.initiated_event_id),
            None,
            None,
        ),
        SignalExternalWorkflowExecutionFailed => (
            Error,
            Action,
            Link::Child(a.initiated_event_id),
            a.cause.clone(),
            None,
        ),

        StartChildWorkflowExecutionInitiated => (
            Active,
            Action,
            Link::Root(a.control.clone()),
            a.input.clone(),
            None,
        ),
        StartChildWorkflowExecutionFailed => (
            Error,
            Action,
            Link::Child(a.initiated_event_id),
            Some("StartChildWorkflowExecutionFailed".to_string()),
            a.cause.clone(),
        ),
        ChildWorkflowExecutionStarted => (
            Active,
            Action,
            Link::Child(a.initiated_event_id),
            a.workflow_id.clone(),
            a.run_id.clone(),
        ),
        ChildWorkflowExecutionCompleted => (
            Success,
            Action,
            Link::Child(a.initiated_event_id),
            a.result.clone(),
            None,
        ),
        ChildWorkflowExecutionFailed => (
            Error,
            Action,
            Link::Child(a.initiated_event_id),
            a.reason.clone(),
            a.details.clone(),
        ),
        ChildWorkflowExecutionTimedOut => (
            Error,
            Action,
            Link::Child(a.initiated_event_id),
            a.timeout_type.clone(),
            None,
        ),
        ChildWorkflowExecutionCanceled => (
            Error,
            Action,
            Link::Child(a.initiated_event_id),
            None,
            a.details.clone(),
        ),
        ChildWorkflowExecutionTerminated => (
            Error,
            Action,
            Link::Child(a.initiated_event_id),
            None,
            None,
        ),

        MarkerRecorded => (
            Success,
            Action,
            Link::Root(a.marker_name.clone()),
            a.details.clone(),
            None,
        ),
        RecordMarkerFailed => (Info, External, Link::Own, a.cause.clone(), None),

        WorkflowExecutionSignaled => (
            Info,
            External,
            Link::Own,
            a.signal_name.clone(),
            a.input.clone(),
        ),
        WorkflowExecutionStarted => (Info, External, Link::Own, a.input.clone(), None),
        WorkflowExecutionCancelRequested => (Info, External, Link::Own, a.cause.clone(), None),
        WorkflowExecutionCompleted => (Info, External, Link::Own, a.result.clone(), None),
        WorkflowExecutionFailed => (
            Info,
            External,
            Link::Own,
            a.reason.clone(),
            a.details.clone(),
        ),
        WorkflowExecutionTimedOut => (Info, External, Link::Own, a.timeout_type.clone(), None),
        WorkflowExecutionCanceled => (Info, External, Link::Own, None, a.details.clone()),
        WorkflowExecutionContinuedAsNew => (Info, External, Link::Own, a.input.clone(), None),
        WorkflowExecutionTerminated => (
            Info,
            External,
            Link::Own,
            a.reason.clone(),
            a.details.clone(),
        ),
        CompleteWorkflowExecutionFailed
        | FailWorkflowExecutionFailed
        | CancelWorkflowExecutionFailed
        | ContinueAsNewWorkflowExecutionFailed => {
            (Info, External, Link::Own, a.cause.clone(), None)
        }

        DecisionTaskScheduled
        | DecisionTaskStarted
        | DecisionTaskCompleted
        | DecisionTaskTimedOut
        | ActivityTaskCancelRequested
        | RequestCancelActivityTaskFailed
        | CancelTimerFailed
        | RequestCancelExternalWorkflowExecutionInitiated
        | RequestCancelExternalWorkflowExecutionFailed
        | ExternalWorkflowExecutionCancelRequested => {
            (Undefined, External, Link::Own, None, None)
        }
    };

    let (initial_event_id, is_initial_event, action_id) = match link {
        Link::Root(action_id) => (event.event_id, true, action_id),
        // A child without its back-reference cannot join any chain; pointing
        // it at itself keeps it out of every chain lookup.
        Link::Child(initial) => (initial.unwrap_or(event.event_id), false, None),
        Link::Own => (event.event_id, false, None),
    };

    ActionEvent {
        event_id: event.event_id,
        event_type: event.event_type,
        event_timestamp: event.event_timestamp,
        state,
        category,
        initial_event_id,
        is_initial_event,
        action_id,
        data1,
        data2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventAttributes;
    use chrono::TimeZone;

    fn event(id: i64, event_type: EventType, attributes: EventAttributes) -> HistoryEvent {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        HistoryEvent::new(id, event_type, ts).with_attributes(attributes)
    }

    #[test]
    fn test_scheduled_is_chain_root() {
        let e = classify(&event(
            5,
            EventType::ActivityTaskScheduled,
            EventAttributes {
                activity_id: Some("step-1".into()),
                input: Some("in".into()),
                ..Default::default()
            },
        ));

        assert_eq!(e.state(), EventState::Active);
        assert_eq!(e.category(), EventCategory::Action);
        assert!(e.is_initial_event());
        assert_eq!(e.initial_event_id(), 5);
        assert_eq!(e.action_id(), Some("step-1"));
        assert_eq!(e.data1(), Some("in"));
    }

    #[test]
    fn test_completed_points_at_scheduled() {
        let e = classify(&event(
            9,
            EventType::ActivityTaskCompleted,
            EventAttributes {
                scheduled_event_id: Some(5),
                result: Some("done".into()),
                ..Default::default()
            },
        ));

        assert_eq!(e.state(), EventState::Success);
        assert!(!e.is_initial_event());
        assert_eq!(e.initial_event_id(), 5);
        assert_eq!(e.action_id(), None);
        assert_eq!(e.data1(), Some("done"));
    }

    #[test]
    fn test_failed_carries_reason_and_details() {
        let e = classify(&event(
            9,
            EventType::ActivityTaskFailed,
            EventAttributes {
                scheduled_event_id: Some(5),
                reason: Some("boom".into()),
                details: Some("stack".into()),
                ..Default::default()
            },
        ));

        assert_eq!(e.state(), EventState::Error);
        assert_eq!(e.data1(), Some("boom"));
        assert_eq!(e.data2(), Some("stack"));
    }

    #[test]
    fn test_child_workflow_uses_control_as_action_id() {
        let e = classify(&event(
            3,
            EventType::StartChildWorkflowExecutionInitiated,
            EventAttributes {
                control: Some("child".into()),
                workflow_id: Some("child.2024".into()),
                ..Default::default()
            },
        ));
        assert!(e.is_initial_event());
        assert_eq!(e.action_id(), Some("child"));

        let failed = classify(&event(
            4,
            EventType::StartChildWorkflowExecutionFailed,
            EventAttributes {
                initiated_event_id: Some(3),
                cause: Some("WORKFLOW_TYPE_DOES_NOT_EXIST".into()),
                ..Default::default()
            },
        ));
        assert_eq!(failed.state(), EventState::Error);
        assert_eq!(failed.initial_event_id(), 3);
        assert_eq!(failed.data1(), Some("StartChildWorkflowExecutionFailed"));
        assert_eq!(failed.data2(), Some("WORKFLOW_TYPE_DOES_NOT_EXIST"));
    }

    #[test]
    fn test_timer_events() {
        let fired = classify(&event(
            12,
            EventType::TimerFired,
            EventAttributes {
                started_event_id: Some(10),
                ..Default::default()
            },
        ));
        assert_eq!(fired.state(), EventState::Success);
        assert_eq!(fired.initial_event_id(), 10);

        let canceled = classify(&event(
            12,
            EventType::TimerCanceled,
            EventAttributes {
                started_event_id: Some(10),
                ..Default::default()
            },
        ));
        assert_eq!(canceled.state(), EventState::Error);
    }

    #[test]
    fn test_external_events() {
        let signaled = classify(&event(
            4,
            EventType::WorkflowExecutionSignaled,
            EventAttributes {
                signal_name: Some("go".into()),
                input: Some("now".into()),
                ..Default::default()
            },
        ));
        assert_eq!(signaled.state(), EventState::Info);
        assert_eq!(signaled.category(), EventCategory::External);
        assert!(!signaled.is_initial_event());
        assert_eq!(signaled.initial_event_id(), 4);
        assert_eq!(signaled.data1(), Some("go"));
        assert_eq!(signaled.data2(), Some("now"));
    }

    #[test]
    fn test_decision_events_undefined() {
        for event_type in [
            EventType::DecisionTaskScheduled,
            EventType::DecisionTaskStarted,
            EventType::DecisionTaskCompleted,
            EventType::CancelTimerFailed,
        ] {
            let e = classify(&event(1, event_type, EventAttributes::default()));
            assert_eq!(e.state(), EventState::Undefined, "{event_type}");
            assert_eq!(e.category(), EventCategory::External);
        }
    }

    #[test]
    fn test_child_without_back_reference() {
        let e = classify(&event(8, EventType::ActivityTaskCompleted, EventAttributes::default()));
        assert_eq!(e.initial_event_id(), 8);
        assert!(!e.is_initial_event());
    }
}
