//! History builder shared by the integration tests
//!
//! Plays the service's part: turns submitted decisions into history events
//! and lets a test complete, fail or fire them.

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use everruns_decider::prelude::*;

pub struct HistoryBuilder {
    start: DateTime<Utc>,
    now: DateTime<Utc>,
    events: Vec<HistoryEvent>,
}

impl HistoryBuilder {
    /// History of a run started with `input`
    pub fn started(input: Option<&str>) -> Self {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let mut builder = Self {
            start,
            now: start,
            events: vec![],
        };
        builder.push(
            EventType::WorkflowExecutionStarted,
            EventAttributes {
                input: input.map(str::to_string),
                ..Default::default()
            },
        );
        builder.decision_task();
        builder
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn push(&mut self, event_type: EventType, attributes: EventAttributes) -> i64 {
        let id = self.events.len() as i64 + 1;
        self.now += Duration::seconds(1);
        self.events
            .push(HistoryEvent::new(id, event_type, self.now).with_attributes(attributes));
        id
    }

    /// Move the clock forward
    pub fn advance(&mut self, secs: i64) -> &mut Self {
        self.now += Duration::seconds(secs);
        self
    }

    /// The bookkeeping events the service writes around each decision task
    pub fn decision_task(&mut self) {
        self.push(EventType::DecisionTaskScheduled, EventAttributes::default());
        self.push(EventType::DecisionTaskStarted, EventAttributes::default());
    }

    /// Record what the service does with submitted decisions
    pub fn apply(&mut self, decisions: &[Decision]) {
        self.push(EventType::DecisionTaskCompleted, EventAttributes::default());
        for decision in decisions {
            match decision {
                Decision::ScheduleActivityTask {
                    activity_id,
                    activity_type,
                    input,
                    ..
                } => {
                    self.push(
                        EventType::ActivityTaskScheduled,
                        EventAttributes {
                            activity_id: Some(activity_id.clone()),
                            activity_type: Some(activity_type.clone()),
                            input: input.clone(),
                            ..Default::default()
                        },
                    );
                }
                Decision::StartTimer {
                    timer_id,
                    start_to_fire_timeout,
                    control,
                } => {
                    self.push(
                        EventType::TimerStarted,
                        EventAttributes {
                            timer_id: Some(timer_id.clone()),
                            control: control.clone(),
                            start_to_fire_timeout: Some(start_to_fire_timeout.as_secs().to_string()),
                            ..Default::default()
                        },
                    );
                }
                Decision::CancelTimer { timer_id } => {
                    let started = self.latest(EventType::TimerStarted, timer_id);
                    self.push(
                        EventType::TimerCanceled,
                        EventAttributes {
                            timer_id: Some(timer_id.clone()),
                            started_event_id: started,
                            ..Default::default()
                        },
                    );
                }
                Decision::RecordMarker {
                    marker_name,
                    details,
                } => {
                    self.push(
                        EventType::MarkerRecorded,
                        EventAttributes {
                            marker_name: Some(marker_name.clone()),
                            details: details.clone(),
                            ..Default::default()
                        },
                    );
                }
                _ => {}
            }
        }
    }

    fn latest(&self, event_type: EventType, id: &str) -> Option<i64> {
        self.events
            .iter()
            .rev()
            .find(|e| {
                e.event_type == event_type
                    && (e.attributes.activity_id.as_deref() == Some(id)
                        || e.attributes.timer_id.as_deref() == Some(id))
            })
            .map(|e| e.event_id)
    }

    fn scheduled_id(&self, activity_id: &str) -> i64 {
        self.latest(EventType::ActivityTaskScheduled, activity_id)
            .unwrap_or_else(|| panic!("activity {activity_id} was never scheduled"))
    }

    pub fn complete(&mut self, activity_id: &str, result: &str) {
        let scheduled = self.scheduled_id(activity_id);
        self.push(
            EventType::ActivityTaskStarted,
            EventAttributes {
                scheduled_event_id: Some(scheduled),
                ..Default::default()
            },
        );
        self.push(
            EventType::ActivityTaskCompleted,
            EventAttributes {
                scheduled_event_id: Some(scheduled),
                result: Some(result.to_string()),
                ..Default::default()
            },
        );
        self.decision_task();
    }

    pub fn fail(&mut self, activity_id: &str, reason: &str, details: &str) {
        let scheduled = self.scheduled_id(activity_id);
        self.push(
            EventType::ActivityTaskFailed,
            EventAttributes {
                scheduled_event_id: Some(scheduled),
                reason: Some(reason.to_string()),
                details: Some(details.to_string()),
                ..Default::default()
            },
        );
        self.decision_task();
    }

    pub fn fire_timer(&mut self, timer_id: &str) {
        let started = self
            .latest(EventType::TimerStarted, timer_id)
            .unwrap_or_else(|| panic!("timer {timer_id} was never started"));
        self.push(
            EventType::TimerFired,
            EventAttributes {
                timer_id: Some(timer_id.to_string()),
                started_event_id: Some(started),
                ..Default::default()
            },
        );
        self.decision_task();
    }

    pub fn signal(&mut self, name: &str, input: Option<&str>) {
        self.push(
            EventType::WorkflowExecutionSignaled,
            EventAttributes {
                signal_name: Some(name.to_string()),
                input: input.map(str::to_string),
                ..Default::default()
            },
        );
        self.decision_task();
    }

    /// Events as the service pages them, newest-first
    pub fn newest_first(&self) -> Vec<HistoryEvent> {
        self.events.iter().rev().cloned().collect()
    }

    /// Decision task for the current history
    pub fn task(&self, workflow_type: WorkflowType) -> DecisionTask {
        DecisionTask::new("wf-1", "run-1", workflow_type, self.newest_first())
            .with_task_token(format!("token-{}", self.events.len()))
            .with_task_list("integration")
    }
}

/// Run one cycle and feed the decisions back into the history
pub fn cycle(
    decider: &Decider,
    registry: &WorkflowRegistry,
    history: &mut HistoryBuilder,
    workflow_type: WorkflowType,
) -> Vec<Decision> {
    let outcome = decider
        .decide(registry, &history.task(workflow_type))
        .expect("decision cycle should succeed");
    history.apply(&outcome.decisions);
    outcome.decisions
}
