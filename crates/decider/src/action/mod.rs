//! Actions: workflow-unique units of work and their state machine
//!
//! An [`Action`] owns no events. Every state query reads through the
//! [`WorkflowHistory`] passed in, joined on the action id, so an action always
//! reflects the latest polled history.
//!
//! # State Machine
//!
//! ```text
//! Initial ──► Active ──► Success ──(repeat policy)──► Active (timer) ──► Retry
//!                  │                                                       │
//!                  └──► Error ──(retry policy)──► Active (timer) ──► Retry ┘
//!                                                                          │
//!                                                         Active ◄─────────┘
//! ```

mod kind;

pub use kind::{
    sanitize_workflow_id, ActionKind, ActivitySpec, ChildWorkflowSpec, ContinueAsNewSpec,
    MarkerSpec, SignalSpec, TimerSpec, MAX_TAGS,
};

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::decision::Decision;
use crate::error::{DecisionError, Result};
use crate::event::{ActionEvent, EventState, EventType};
use crate::history::WorkflowHistory;
use crate::reliability::{RetryPolicy, RetryTrigger};

/// State of an action, derived from its newest chain event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionState {
    /// Never seen in the history
    Initial,

    /// Work is in flight
    Active,

    /// Finished successfully
    Success,

    /// Failed, timed out or was canceled
    Error,

    /// A delay timer fired or was canceled, the work must restart
    Retry,
}

impl fmt::Display for ActionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Initial => "initial",
            Self::Active => "active",
            Self::Success => "success",
            Self::Error => "error",
            Self::Retry => "retry",
        };
        f.write_str(s)
    }
}

/// A workflow-unique unit of work
///
/// Two actions are the same entity iff their ids are equal. The id is the
/// join key against the history and must be unique within one run.
///
/// # Example
///
/// ```
/// use everruns_decider::{Action, ActivitySpec, RetryPolicy, WorkflowHistory};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let mut action = Action::new("fetch", ActivitySpec::new("Fetch", "1.0").with_input("url"))
///     .with_on_error_retry_policy(Arc::new(RetryPolicy::fixed(Duration::from_secs(30), 3)))
///     .unwrap();
///
/// let history = WorkflowHistory::new();
/// let mut decisions = Vec::new();
/// action.decide(&history, &mut decisions).unwrap();
/// assert_eq!(decisions.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct Action {
    id: String,
    kind: ActionKind,
    fail_workflow_on_error: bool,
    complete_workflow_on_success: bool,
    error_retry_policy: Option<Arc<RetryPolicy>>,
    success_retry_policy: Option<Arc<RetryPolicy>>,
    cancel_active_retry_timer: bool,
}

impl Action {
    /// Create an action
    pub fn new(id: impl Into<String>, kind: impl Into<ActionKind>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            fail_workflow_on_error: true,
            complete_workflow_on_success: false,
            error_retry_policy: None,
            success_retry_policy: None,
            cancel_active_retry_timer: false,
        }
    }

    /// Create an activity action
    pub fn activity(
        id: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self::new(id, ActivitySpec::new(name, version))
    }

    /// Create a timer action
    pub fn timer(id: impl Into<String>, delay: Duration) -> Self {
        Self::new(id, TimerSpec::new(delay))
    }

    /// Create a marker action
    pub fn marker(id: impl Into<String>) -> Self {
        Self::new(id, MarkerSpec::new())
    }

    /// Workflow-unique id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Kind-specific configuration
    pub fn kind(&self) -> &ActionKind {
        &self.kind
    }

    /// Error retry policy, if any
    pub fn error_retry_policy(&self) -> Option<&RetryPolicy> {
        self.error_retry_policy.as_deref()
    }

    /// Success repeat policy, if any
    pub fn success_retry_policy(&self) -> Option<&RetryPolicy> {
        self.success_retry_policy.as_deref()
    }

    /// Keep the workflow running when this action ends in error
    pub fn with_no_fail_workflow_on_error(mut self) -> Self {
        self.fail_workflow_on_error = false;
        self
    }

    /// Complete the workflow with this action's output once it succeeds
    pub fn with_complete_workflow_on_success(mut self) -> Self {
        self.complete_workflow_on_success = true;
        self
    }

    /// Retry the action after errors
    ///
    /// # Errors
    ///
    /// [`DecisionError::UnconfiguredAction`] on a timer action, or when the
    /// policy fails validation.
    pub fn with_on_error_retry_policy(mut self, policy: Arc<RetryPolicy>) -> Result<Self> {
        self.check_policy(&policy)?;
        self.error_retry_policy = Some(policy);
        Ok(self)
    }

    /// Repeat the action after each success
    ///
    /// # Errors
    ///
    /// [`DecisionError::UnconfiguredAction`] on a timer action, or when the
    /// policy fails validation.
    pub fn with_on_success_retry_policy(mut self, policy: Arc<RetryPolicy>) -> Result<Self> {
        self.check_policy(&policy)?;
        self.success_retry_policy = Some(policy);
        Ok(self)
    }

    /// Cancel an active retry timer on the next [`decide`](Self::decide)
    ///
    /// Forces the retry to start right away, e.g. when a signal asks an
    /// hourly job to run now. The flag is consumed by the next call whether
    /// or not a timer was active.
    pub fn with_cancel_active_retry_timer(&mut self) {
        self.cancel_active_retry_timer = true;
    }

    fn check_policy(&self, policy: &RetryPolicy) -> Result<()> {
        if self.kind.is_timer() {
            return Err(DecisionError::unconfigured(format!(
                "{} does not support retry policies",
                self
            )));
        }
        policy.validate()
    }

    /// Events of the most recent chain, oldest-first
    pub fn events<'h>(&self, history: &'h WorkflowHistory) -> Vec<&'h ActionEvent> {
        history.action_chain(&self.id)
    }

    /// Most recent event of the chain, `None` while initial
    pub fn current_event<'h>(&self, history: &'h WorkflowHistory) -> Option<&'h ActionEvent> {
        history.action_chain(&self.id).last().copied()
    }

    /// Current state
    pub fn state(&self, history: &WorkflowHistory) -> Result<ActionState> {
        match self.current_event(history) {
            Some(event) => self.state_of(event),
            None => Ok(ActionState::Initial),
        }
    }

    fn state_of(&self, event: &ActionEvent) -> Result<ActionState> {
        // A timer action's own timer is its outcome, not a retry delay
        if event.event_type().is_retry_timer_event() && !self.kind.is_timer() {
            return Ok(ActionState::Retry);
        }
        match event.state() {
            EventState::Active => Ok(ActionState::Active),
            EventState::Success => Ok(ActionState::Success),
            EventState::Error => Ok(ActionState::Error),
            other @ (EventState::Info | EventState::Undefined) => {
                Err(DecisionError::UnknownActionState {
                    action: self.to_string(),
                    state: other.to_string(),
                })
            }
        }
    }

    /// Check if the action finished successfully
    pub fn is_success(&self, history: &WorkflowHistory) -> Result<bool> {
        Ok(self.state(history)? == ActionState::Success)
    }

    /// Check if the action never appeared in the history
    pub fn is_initial(&self, history: &WorkflowHistory) -> Result<bool> {
        Ok(self.state(history)? == ActionState::Initial)
    }

    /// Check if the action's work is in flight
    pub fn is_active(&self, history: &WorkflowHistory) -> Result<bool> {
        Ok(self.state(history)? == ActionState::Active)
    }

    /// Check if the action ended in error
    pub fn is_error(&self, history: &WorkflowHistory) -> Result<bool> {
        Ok(self.state(history)? == ActionState::Error)
    }

    /// Output of the action
    ///
    /// Available in [`ActionState::Success`], and in [`ActionState::Retry`]
    /// when a repeat policy is set, in which case the newest completion
    /// before the repeat timer is returned.
    ///
    /// # Errors
    ///
    /// - [`DecisionError::StateUnavailable`] when that completion is no longer
    ///   in the polled history.
    /// - [`DecisionError::OutputUnavailable`] in any other state.
    pub fn output(&self, history: &WorkflowHistory) -> Result<Option<String>> {
        match self.state(history)? {
            ActionState::Success => Ok(self
                .current_event(history)
                .and_then(ActionEvent::data1)
                .map(str::to_string)),
            ActionState::Retry if self.success_retry_policy.is_some() => history
                .action_history(&self.id)
                .into_iter()
                .rev()
                .find(|e| e.state() == EventState::Success && !e.event_type().is_retry_timer_event())
                .map(|e| e.data1().map(str::to_string))
                .ok_or_else(|| {
                    DecisionError::state_unavailable(format!(
                        "{} completion before the repeat timer is not in the polled history",
                        self
                    ))
                }),
            state => Err(DecisionError::OutputUnavailable {
                action: self.to_string(),
                state: state.to_string(),
            }),
        }
    }

    /// Workflow id of a started child workflow
    ///
    /// # Errors
    ///
    /// - [`DecisionError::UnconfiguredAction`] on any other kind of action.
    /// - [`DecisionError::StateUnavailable`] until the child has started.
    pub fn child_workflow_id(&self, history: &WorkflowHistory) -> Result<String> {
        if !matches!(self.kind, ActionKind::ChildWorkflow(_)) {
            return Err(DecisionError::unconfigured(format!(
                "{} is not a child workflow",
                self
            )));
        }
        history
            .action_chain(&self.id)
            .into_iter()
            .rev()
            .find(|e| e.event_type() == EventType::ChildWorkflowExecutionStarted)
            .and_then(ActionEvent::data1)
            .map(str::to_string)
            .ok_or_else(|| {
                DecisionError::state_unavailable(format!("{} has not started yet", self))
            })
    }

    /// Decision that starts this action's unit of work
    pub fn initiate_decision(&self) -> Decision {
        self.kind.initiate_decision(&self.id)
    }

    /// Decision that cancels this action's retry timer
    pub fn cancel_retry_timer_decision(&self) -> Decision {
        Decision::cancel_timer(&self.id)
    }

    /// Append the decisions the current state calls for
    ///
    /// - Initial or Retry: initiate the work.
    /// - Active: nothing, wait for more history.
    /// - Success: schedule the next repeat, complete the workflow, or nothing.
    /// - Error: schedule a retry, otherwise fail the workflow unless disabled.
    pub fn decide(
        &mut self,
        history: &WorkflowHistory,
        decisions: &mut Vec<Decision>,
    ) -> Result<&mut Self> {
        let current = self.current_event(history);
        let mut state = match current {
            Some(event) => self.state_of(event)?,
            None => ActionState::Initial,
        };

        if self.cancel_active_retry_timer
            && current.is_some_and(|e| e.event_type() == EventType::TimerStarted)
        {
            info!(action_id = %self.id, "cancel active retry timer");
            decisions.push(self.cancel_retry_timer_decision());
            state = ActionState::Retry;
        }
        self.cancel_active_retry_timer = false;

        debug!(action_id = %self.id, state = %state, "deciding action");

        match state {
            ActionState::Initial => decisions.push(self.initiate_decision()),
            ActionState::Retry => {
                info!(action_id = %self.id, "retry, restart action");
                decisions.push(self.initiate_decision());
            }
            ActionState::Active => {}
            ActionState::Success => self.decide_success(history, current, decisions)?,
            ActionState::Error => self.decide_error(history, current, decisions),
        }

        Ok(self)
    }

    fn decide_success(
        &self,
        history: &WorkflowHistory,
        current: Option<&ActionEvent>,
        decisions: &mut Vec<Decision>,
    ) -> Result<()> {
        let result = current.and_then(ActionEvent::data1);

        if let Some(policy) = &self.success_retry_policy {
            if policy.stop_pattern_matches(result, None) {
                info!(action_id = %self.id, output = ?result, "success, no more repeats");
                return Ok(());
            }
            match policy.next_decision(
                &self.id,
                RetryTrigger::Success,
                &history.action_history(&self.id),
            ) {
                Some(decision) => {
                    info!(action_id = %self.id, decision = %decision, "success, start repeat timer");
                    decisions.push(decision);
                }
                None => info!(action_id = %self.id, output = ?result, "success, no more attempts"),
            }
        } else if self.complete_workflow_on_success {
            let output = self.output(history)?;
            info!(action_id = %self.id, output = ?output, "success, workflow complete");
            decisions.push(Decision::complete(output));
        } else {
            debug!(action_id = %self.id, output = ?result, "success");
        }
        Ok(())
    }

    fn decide_error(
        &self,
        history: &WorkflowHistory,
        current: Option<&ActionEvent>,
        decisions: &mut Vec<Decision>,
    ) {
        let reason = current.and_then(ActionEvent::data1);
        let details = current.and_then(ActionEvent::data2);
        let mut fail_workflow = self.fail_workflow_on_error;

        if let Some(policy) = &self.error_retry_policy {
            if policy.should_stop(reason, details) {
                info!(
                    action_id = %self.id,
                    reason = ?reason,
                    details = ?details,
                    "error, matched stop condition"
                );
            } else if let Some(decision) = policy.next_decision(
                &self.id,
                RetryTrigger::Error,
                &history.action_history(&self.id),
            ) {
                info!(action_id = %self.id, decision = %decision, "error, start retry timer");
                decisions.push(decision);
                fail_workflow = false;
            } else {
                info!(
                    action_id = %self.id,
                    reason = ?reason,
                    details = ?details,
                    "error, no more attempts"
                );
            }
        }

        if fail_workflow {
            info!(action_id = %self.id, reason = ?reason, "error, fail workflow");
            decisions.push(Decision::fail(&self.to_string(), reason, details));
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind.label(), self.id)
    }
}

impl PartialEq for Action {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Action {}

impl Hash for Action {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventAttributes, HistoryEvent};
    use chrono::{DateTime, TimeZone, Utc};

    struct Events {
        start: DateTime<Utc>,
        events: Vec<HistoryEvent>,
    }

    impl Events {
        fn new() -> Self {
            Self {
                start: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
                events: vec![],
            }
        }

        fn push(&mut self, event_type: EventType, attributes: EventAttributes) -> i64 {
            let id = self.events.len() as i64 + 1;
            let ts = self.start + chrono::Duration::seconds(id * 10);
            self.events
                .push(HistoryEvent::new(id, event_type, ts).with_attributes(attributes));
            id
        }

        fn scheduled(&mut self, activity_id: &str) -> i64 {
            self.push(
                EventType::ActivityTaskScheduled,
                EventAttributes {
                    activity_id: Some(activity_id.into()),
                    ..Default::default()
                },
            )
        }

        fn completed(&mut self, scheduled: i64, result: &str) -> i64 {
            self.push(
                EventType::ActivityTaskCompleted,
                EventAttributes {
                    scheduled_event_id: Some(scheduled),
                    result: Some(result.into()),
                    ..Default::default()
                },
            )
        }

        fn failed(&mut self, scheduled: i64, reason: &str) -> i64 {
            self.push(
                EventType::ActivityTaskFailed,
                EventAttributes {
                    scheduled_event_id: Some(scheduled),
                    reason: Some(reason.into()),
                    details: Some("stack".into()),
                    ..Default::default()
                },
            )
        }

        fn timer_started(&mut self, timer_id: &str) -> i64 {
            self.push(
                EventType::TimerStarted,
                EventAttributes {
                    timer_id: Some(timer_id.into()),
                    ..Default::default()
                },
            )
        }

        fn timer_fired(&mut self, started: i64) -> i64 {
            self.push(
                EventType::TimerFired,
                EventAttributes {
                    started_event_id: Some(started),
                    ..Default::default()
                },
            )
        }

        fn timer_canceled(&mut self, started: i64) -> i64 {
            self.push(
                EventType::TimerCanceled,
                EventAttributes {
                    started_event_id: Some(started),
                    ..Default::default()
                },
            )
        }

        fn history(&self) -> WorkflowHistory {
            WorkflowHistory::from_events(&self.events)
        }
    }

    fn fixed(max_attempts: u32) -> Arc<RetryPolicy> {
        Arc::new(RetryPolicy::fixed(Duration::from_secs(10), max_attempts))
    }

    #[test]
    fn test_initial_action_initiates() {
        let mut action = Action::activity("step", "Step", "1.0");
        let history = WorkflowHistory::new();
        let mut decisions = vec![];

        assert_eq!(action.state(&history).unwrap(), ActionState::Initial);
        action.decide(&history, &mut decisions).unwrap();

        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].decision_type(), "ScheduleActivityTask");
    }

    #[test]
    fn test_active_action_waits() {
        let mut events = Events::new();
        events.scheduled("step");
        let history = events.history();

        let mut action = Action::activity("step", "Step", "1.0");
        let mut decisions = vec![];
        action.decide(&history, &mut decisions).unwrap();

        assert!(action.is_active(&history).unwrap());
        assert!(decisions.is_empty());
    }

    #[test]
    fn test_success_output() {
        let mut events = Events::new();
        let s = events.scheduled("step");
        events.completed(s, "42");
        let history = events.history();

        let mut action = Action::activity("step", "Step", "1.0");
        let mut decisions = vec![];
        action.decide(&history, &mut decisions).unwrap();

        assert!(action.is_success(&history).unwrap());
        assert_eq!(action.output(&history).unwrap().as_deref(), Some("42"));
        assert!(decisions.is_empty());
    }

    #[test]
    fn test_complete_workflow_on_success() {
        let mut events = Events::new();
        let s = events.scheduled("step");
        events.completed(s, "done");
        let history = events.history();

        let mut action = Action::activity("step", "Step", "1.0").with_complete_workflow_on_success();
        let mut decisions = vec![];
        action.decide(&history, &mut decisions).unwrap();

        assert_eq!(decisions, vec![Decision::complete(Some("done".to_string()))]);
    }

    #[test]
    fn test_error_fails_workflow() {
        let mut events = Events::new();
        let s = events.scheduled("step");
        events.failed(s, "boom");
        let history = events.history();

        let mut action = Action::activity("step", "Step", "1.0");
        let mut decisions = vec![];
        action.decide(&history, &mut decisions).unwrap();

        assert_eq!(
            decisions,
            vec![Decision::fail("Activity 'step'", Some("boom"), Some("stack"))]
        );
    }

    #[test]
    fn test_error_without_fail_workflow() {
        let mut events = Events::new();
        let s = events.scheduled("step");
        events.failed(s, "boom");
        let history = events.history();

        let mut action = Action::activity("step", "Step", "1.0").with_no_fail_workflow_on_error();
        let mut decisions = vec![];
        action.decide(&history, &mut decisions).unwrap();

        assert!(action.is_error(&history).unwrap());
        assert!(decisions.is_empty());
    }

    #[test]
    fn test_error_retry_starts_timer() {
        let mut events = Events::new();
        let s = events.scheduled("step");
        events.failed(s, "boom");
        let history = events.history();

        let mut action = Action::activity("step", "Step", "1.0")
            .with_on_error_retry_policy(fixed(3))
            .unwrap();
        let mut decisions = vec![];
        action.decide(&history, &mut decisions).unwrap();

        assert_eq!(decisions.len(), 1);
        match &decisions[0] {
            Decision::StartTimer {
                timer_id,
                start_to_fire_timeout,
                control,
            } => {
                assert_eq!(timer_id, "step");
                assert_eq!(*start_to_fire_timeout, Duration::from_secs(10));
                assert_eq!(control.as_deref(), Some("1"));
            }
            other => panic!("Expected StartTimer, got {other:?}"),
        }
    }

    #[test]
    fn test_error_retry_stop_pattern_fails_workflow() {
        let mut events = Events::new();
        let s = events.scheduled("step");
        events.failed(s, "fatal: bad input");
        let history = events.history();

        let policy = RetryPolicy::fixed(Duration::from_secs(10), 3)
            .with_stop_pattern("^fatal")
            .unwrap();
        let mut action = Action::activity("step", "Step", "1.0")
            .with_on_error_retry_policy(Arc::new(policy))
            .unwrap();
        let mut decisions = vec![];
        action.decide(&history, &mut decisions).unwrap();

        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].decision_type(), "FailWorkflowExecution");
    }

    #[test]
    fn test_retry_exhausted_fails_workflow() {
        let mut events = Events::new();
        let s = events.scheduled("step");
        events.failed(s, "boom");
        let t = events.timer_started("step");
        events.timer_fired(t);
        let s = events.scheduled("step");
        events.failed(s, "boom again");
        let history = events.history();

        let mut action = Action::activity("step", "Step", "1.0")
            .with_on_error_retry_policy(fixed(2))
            .unwrap();
        let mut decisions = vec![];
        action.decide(&history, &mut decisions).unwrap();

        assert_eq!(
            decisions,
            vec![Decision::fail("Activity 'step'", Some("boom again"), Some("stack"))]
        );
    }

    #[test]
    fn test_timer_fired_reads_retry() {
        let mut events = Events::new();
        let s = events.scheduled("step");
        events.failed(s, "boom");
        let t = events.timer_started("step");
        events.timer_fired(t);
        let history = events.history();

        let mut action = Action::activity("step", "Step", "1.0")
            .with_on_error_retry_policy(fixed(3))
            .unwrap();
        assert_eq!(action.state(&history).unwrap(), ActionState::Retry);

        let mut decisions = vec![];
        action.decide(&history, &mut decisions).unwrap();
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].decision_type(), "ScheduleActivityTask");
    }

    #[test]
    fn test_timer_canceled_reads_retry() {
        let mut events = Events::new();
        let s = events.scheduled("poll");
        events.completed(s, "tick-1");
        let t = events.timer_started("poll");
        events.timer_canceled(t);
        let history = events.history();

        let mut action = Action::activity("poll", "Poll", "1.0")
            .with_on_success_retry_policy(Arc::new(RetryPolicy::repeat_every(Duration::from_secs(
                60,
            ))))
            .unwrap();
        assert_eq!(action.state(&history).unwrap(), ActionState::Retry);
        assert_eq!(action.output(&history).unwrap().as_deref(), Some("tick-1"));

        let mut decisions = vec![];
        action.decide(&history, &mut decisions).unwrap();
        assert_eq!(
            decisions.iter().map(Decision::decision_type).collect::<Vec<_>>(),
            vec!["ScheduleActivityTask"]
        );
    }

    #[test]
    fn test_error_after_repeats_still_retries() {
        let mut events = Events::new();
        for tick in ["tick-1", "tick-2"] {
            let s = events.scheduled("poll");
            events.completed(s, tick);
            let t = events.timer_started("poll");
            events.timer_fired(t);
        }
        let s = events.scheduled("poll");
        events.failed(s, "boom");
        let history = events.history();

        let mut action = Action::activity("poll", "Poll", "1.0")
            .with_on_success_retry_policy(Arc::new(RetryPolicy::repeat_every(Duration::from_secs(
                60,
            ))))
            .unwrap()
            .with_on_error_retry_policy(fixed(3))
            .unwrap();
        let mut decisions = vec![];
        action.decide(&history, &mut decisions).unwrap();

        match &decisions[..] {
            [Decision::StartTimer {
                start_to_fire_timeout,
                control,
                ..
            }] => {
                assert_eq!(*start_to_fire_timeout, Duration::from_secs(10));
                assert_eq!(control.as_deref(), Some("1"));
            }
            other => panic!("Expected error retry timer, got {other:?}"),
        }
    }

    #[test]
    fn test_timer_action_reads_own_outcome() {
        let mut events = Events::new();
        let t = events.timer_started("wait");
        events.timer_fired(t);
        let history = events.history();

        let action = Action::timer("wait", Duration::from_secs(5));
        assert_eq!(action.state(&history).unwrap(), ActionState::Success);
        assert_eq!(action.output(&history).unwrap(), None);
    }

    #[test]
    fn test_timer_rejects_retry_policy() {
        let result = Action::timer("wait", Duration::from_secs(5)).with_on_error_retry_policy(fixed(3));
        assert!(matches!(result, Err(DecisionError::UnconfiguredAction(_))));

        let result =
            Action::timer("wait", Duration::from_secs(5)).with_on_success_retry_policy(fixed(3));
        assert!(matches!(result, Err(DecisionError::UnconfiguredAction(_))));
    }

    #[test]
    fn test_invalid_policy_rejected() {
        let policy = Arc::new(RetryPolicy::exponential().with_max_attempts(0));
        let result = Action::activity("step", "Step", "1.0").with_on_error_retry_policy(policy);
        assert!(matches!(result, Err(DecisionError::UnconfiguredAction(_))));
    }

    #[test]
    fn test_repeat_on_success() {
        let mut events = Events::new();
        let s = events.scheduled("poll");
        events.completed(s, "tick-1");
        let history = events.history();

        let mut action = Action::activity("poll", "Poll", "1.0")
            .with_on_success_retry_policy(Arc::new(RetryPolicy::repeat_every(Duration::from_secs(
                60,
            ))))
            .unwrap();
        let mut decisions = vec![];
        action.decide(&history, &mut decisions).unwrap();

        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].decision_type(), "StartTimer");
    }

    #[test]
    fn test_output_during_repeat() {
        let mut events = Events::new();
        let s = events.scheduled("poll");
        events.completed(s, "tick-1");
        let t = events.timer_started("poll");
        events.timer_fired(t);
        let history = events.history();

        let action = Action::activity("poll", "Poll", "1.0")
            .with_on_success_retry_policy(Arc::new(RetryPolicy::repeat_every(Duration::from_secs(
                60,
            ))))
            .unwrap();

        assert_eq!(action.state(&history).unwrap(), ActionState::Retry);
        assert_eq!(action.output(&history).unwrap().as_deref(), Some("tick-1"));
    }

    #[test]
    fn test_output_during_repeat_truncated_history() {
        let mut events = Events::new();
        let t = events.timer_started("poll");
        events.timer_fired(t);
        let history = events.history();

        let action = Action::activity("poll", "Poll", "1.0")
            .with_on_success_retry_policy(Arc::new(RetryPolicy::repeat_every(Duration::from_secs(
                60,
            ))))
            .unwrap();

        assert!(matches!(
            action.output(&history),
            Err(DecisionError::StateUnavailable(_))
        ));
    }

    #[test]
    fn test_output_unavailable() {
        let action = Action::activity("step", "Step", "1.0");
        let history = WorkflowHistory::new();

        match action.output(&history) {
            Err(DecisionError::OutputUnavailable { action, state }) => {
                assert_eq!(action, "Activity 'step'");
                assert_eq!(state, "initial");
            }
            other => panic!("Expected OutputUnavailable, got {other:?}"),
        }
    }

    #[test]
    fn test_cancel_active_retry_timer() {
        let mut events = Events::new();
        let s = events.scheduled("poll");
        events.completed(s, "tick-1");
        events.timer_started("poll");
        let history = events.history();

        let mut action = Action::activity("poll", "Poll", "1.0");
        action.with_cancel_active_retry_timer();

        let mut decisions = vec![];
        action.decide(&history, &mut decisions).unwrap();
        assert_eq!(
            decisions.iter().map(Decision::decision_type).collect::<Vec<_>>(),
            vec!["CancelTimer", "ScheduleActivityTask"]
        );

        // Consumed by the first call
        let mut decisions = vec![];
        action.decide(&history, &mut decisions).unwrap();
        assert!(decisions.is_empty());
    }

    #[test]
    fn test_cancel_flag_cleared_without_timer() {
        let mut events = Events::new();
        events.scheduled("step");
        let history = events.history();

        let mut action = Action::activity("step", "Step", "1.0");
        action.with_cancel_active_retry_timer();

        let mut decisions = vec![];
        action.decide(&history, &mut decisions).unwrap();
        assert!(decisions.is_empty());
        assert!(!action.cancel_active_retry_timer);
    }

    #[test]
    fn test_child_workflow_id() {
        let mut events = Events::new();
        let initiated = events.push(
            EventType::StartChildWorkflowExecutionInitiated,
            EventAttributes {
                control: Some("child".into()),
                ..Default::default()
            },
        );
        let action = Action::new("child", ChildWorkflowSpec::new("Report", "1.0"));

        assert!(matches!(
            action.child_workflow_id(&events.history()),
            Err(DecisionError::StateUnavailable(_))
        ));

        events.push(
            EventType::ChildWorkflowExecutionStarted,
            EventAttributes {
                initiated_event_id: Some(initiated),
                workflow_id: Some("Report.0192".into()),
                run_id: Some("run-1".into()),
                ..Default::default()
            },
        );
        assert_eq!(action.child_workflow_id(&events.history()).unwrap(), "Report.0192");
    }

    #[test]
    fn test_equality_by_id() {
        let a = Action::activity("same", "A", "1.0");
        let b = Action::timer("same", Duration::from_secs(1));
        assert_eq!(a, b);
        assert_ne!(a, Action::marker("other"));
        assert_eq!(a.to_string(), "Activity 'same'");
    }
}
