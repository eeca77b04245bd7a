//! Per-run history index
//!
//! [`WorkflowHistory`] holds the classified events of one decision cycle and
//! answers the questions actions ask about them: which events belong to my
//! chain, what was the workflow started with, did the service report an error
//! the run cannot recover from.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::error::{DecisionError, Result};
use crate::event::{ActionEvent, EventCategory, EventState, EventType, HistoryEvent};

/// Classified history of one workflow run
///
/// Events are keyed by event id, so iteration is always oldest-first no
/// matter which order the poller delivered them in. The service pages
/// history newest-first; both orders index identically.
#[derive(Debug, Clone, Default)]
pub struct WorkflowHistory {
    events: BTreeMap<i64, ActionEvent>,
    error_events: BTreeMap<i64, HistoryEvent>,
    workflow_started: Option<HistoryEvent>,
}

impl WorkflowHistory {
    /// Create an empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a history from one batch of raw events
    pub fn from_events(events: &[HistoryEvent]) -> Self {
        let mut history = Self::new();
        history.add_history_events(events);
        history
    }

    /// Classify and index a batch of raw events
    ///
    /// Events without meaning for action tracking are dropped. Run-level
    /// errors are kept aside for [`error_events`](Self::error_events) and the
    /// workflow-started event is remembered for the workflow metadata.
    ///
    /// Batches may extend the history incrementally. Call
    /// [`reset`](Self::reset) before indexing a different run.
    pub fn add_history_events(&mut self, events: &[HistoryEvent]) {
        let before = self.events.len();

        for event in events {
            let action_event = ActionEvent::new(event);

            if action_event.state() != EventState::Undefined {
                self.events.insert(action_event.event_id(), action_event);
            }

            if event.event_type == EventType::WorkflowExecutionStarted {
                self.workflow_started = Some(event.clone());
            }

            if event.event_type.is_unrecoverable_error() {
                warn!(
                    event_id = event.event_id,
                    event_type = %event.event_type,
                    "unrecoverable workflow error event"
                );
                self.error_events.insert(event.event_id, event.clone());
            }
        }

        debug!(
            received = events.len(),
            indexed = self.events.len() - before,
            total = self.events.len(),
            "indexed history events"
        );
    }

    /// Clear the history to prepare for another run
    pub fn reset(&mut self) {
        self.events.clear();
        self.error_events.clear();
        self.workflow_started = None;
    }

    /// All indexed events, oldest-first
    pub fn events(&self) -> impl DoubleEndedIterator<Item = &ActionEvent> {
        self.events.values()
    }

    /// Number of indexed events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if no events are indexed
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events of the most recent chain started for an action, oldest-first
    ///
    /// Empty if the action id never appeared, meaning the action has not
    /// been started yet.
    pub fn action_chain(&self, action_id: &str) -> Vec<&ActionEvent> {
        let root = self
            .events
            .values()
            .rev()
            .find(|e| e.is_initial_event() && e.action_id() == Some(action_id));

        match root {
            Some(root) => {
                let root_id = root.event_id();
                self.events
                    .range(root_id..)
                    .map(|(_, e)| e)
                    .filter(|e| e.initial_event_id() == root_id)
                    .collect()
            }
            None => Vec::new(),
        }
    }

    /// Events of every chain started for an action, oldest-first
    ///
    /// A retry or repeat timer is keyed by the action id, so each attempt of
    /// an action begins a new chain. This is the full attempt history.
    pub fn action_history(&self, action_id: &str) -> Vec<&ActionEvent> {
        let roots: Vec<i64> = self
            .events
            .values()
            .filter(|e| e.is_initial_event() && e.action_id() == Some(action_id))
            .map(ActionEvent::event_id)
            .collect();

        if roots.is_empty() {
            return Vec::new();
        }

        self.events
            .range(roots[0]..)
            .map(|(_, e)| e)
            .filter(|e| {
                e.category() == EventCategory::Action && roots.contains(&e.initial_event_id())
            })
            .collect()
    }

    /// Filter events by action id, event type, or both
    ///
    /// With an action id the filter runs over that action's current chain,
    /// otherwise over the whole history.
    pub fn filter_events(
        &self,
        action_id: Option<&str>,
        event_type: Option<EventType>,
    ) -> Vec<&ActionEvent> {
        let matches_type = |e: &&ActionEvent| event_type.map_or(true, |t| e.event_type() == t);

        match action_id {
            Some(action_id) => self
                .action_chain(action_id)
                .into_iter()
                .filter(matches_type)
                .collect(),
            None => self.events.values().filter(matches_type).collect(),
        }
    }

    /// MarkerRecorded events across the run
    pub fn markers(&self) -> Vec<&ActionEvent> {
        self.filter_events(None, Some(EventType::MarkerRecorded))
    }

    /// WorkflowExecutionSignaled events across the run
    pub fn signals(&self) -> Vec<&ActionEvent> {
        self.filter_events(None, Some(EventType::WorkflowExecutionSignaled))
    }

    /// Input of the newest signal received with the given name
    ///
    /// The outer `Option` is whether the signal arrived at all.
    pub fn signal(&self, signal_name: &str) -> Option<Option<&str>> {
        self.events
            .values()
            .rev()
            .find(|e| {
                e.event_type() == EventType::WorkflowExecutionSignaled
                    && e.data1() == Some(signal_name)
            })
            .map(ActionEvent::data2)
    }

    /// Input the workflow run was started with
    ///
    /// # Errors
    ///
    /// [`DecisionError::StateUnavailable`] if the WorkflowExecutionStarted
    /// event is not part of the polled history.
    pub fn workflow_input(&self) -> Result<Option<&str>> {
        self.started_event()
            .map(|event| event.attributes.input.as_deref())
    }

    /// When the workflow run was started
    ///
    /// # Errors
    ///
    /// [`DecisionError::StateUnavailable`] if the WorkflowExecutionStarted
    /// event is not part of the polled history.
    pub fn workflow_start_time(&self) -> Result<DateTime<Utc>> {
        self.started_event().map(|event| event.event_timestamp)
    }

    /// Run-level error events reported in this cycle, oldest-first
    pub fn error_events(&self) -> Vec<&HistoryEvent> {
        self.error_events.values().collect()
    }

    fn started_event(&self) -> Result<&HistoryEvent> {
        self.workflow_started.as_ref().ok_or_else(|| {
            DecisionError::state_unavailable("workflow start event not in polled history")
        })
    }
}
