//! Cron-like workflow driven through a few simulated decision cycles
//!
//! An echo activity repeats every 10 seconds, each run getting the previous
//! output plus one. After a minute the run continues as new with the
//! current count, keeping the history short.
//!
//! ```text
//! RUST_LOG=everruns_decider=debug cargo run --example cron_workflow
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, TimeZone, Utc};
use everruns_decider::prelude::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const ECHO: &str = "echo";

struct CronWorkflow;

impl Workflow for CronWorkflow {
    const NAME: &'static str = "Cron Workflow";
    const VERSION: &'static str = "1.0";

    fn new() -> Self {
        Self
    }

    fn decide(&mut self, history: &WorkflowHistory, decisions: &mut Vec<Decision>) -> Result<()> {
        let every_10_seconds = Arc::new(RetryPolicy::repeat_every(Duration::from_secs(10)));
        let probe = Action::activity(ECHO, "Activity Echo", "1.0")
            .with_on_success_retry_policy(every_10_seconds.clone())?;

        let state = probe.state(history)?;
        let count: u64 = match state {
            ActionState::Initial => history
                .workflow_input()?
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            ActionState::Success | ActionState::Retry => probe
                .output(history)?
                .and_then(|v| v.parse::<u64>().ok())
                .map_or(0, |n| n + 1),
            // Nothing to do until the activity or its timer reports back
            ActionState::Active | ActionState::Error => 0,
        };

        let newest = history.events().next_back().map(ActionEvent::event_timestamp);
        let runtime = match newest {
            Some(ts) => ts - history.workflow_start_time()?,
            None => chrono::Duration::zero(),
        };

        if state == ActionState::Retry && runtime >= chrono::Duration::minutes(1) {
            tracing::info!(count, "continue as new");
            Action::new("continue", ContinueAsNewSpec::new().with_input(count.to_string()))
                .decide(history, decisions)?;
        } else {
            Action::new(
                ECHO,
                ActivitySpec::new("Activity Echo", "1.0").with_input(count.to_string()),
            )
            .with_on_success_retry_policy(every_10_seconds)?
            .decide(history, decisions)?;
        }
        Ok(())
    }
}

/// Minimal stand-in for the service: records decisions as history events
struct Service {
    clock: DateTime<Utc>,
    events: Vec<HistoryEvent>,
}

impl Service {
    fn start(input: &str) -> Self {
        let clock = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let mut service = Self {
            clock,
            events: vec![],
        };
        service.record(
            EventType::WorkflowExecutionStarted,
            EventAttributes {
                input: Some(input.to_string()),
                ..Default::default()
            },
        );
        service
    }

    fn record(&mut self, event_type: EventType, attributes: EventAttributes) -> i64 {
        let id = self.events.len() as i64 + 1;
        self.events
            .push(HistoryEvent::new(id, event_type, self.clock).with_attributes(attributes));
        id
    }

    fn task(&self) -> DecisionTask {
        let newest_first = self.events.iter().rev().cloned().collect();
        DecisionTask::new("cron-1", "run-1", CronWorkflow::workflow_type(), newest_first)
            .with_task_list("default")
    }

    /// Carry out the decisions, finishing echoes and firing timers at once
    fn apply(&mut self, decisions: &[Decision]) -> bool {
        let mut open = true;
        for decision in decisions {
            self.clock += chrono::Duration::seconds(1);
            match decision {
                Decision::ScheduleActivityTask {
                    activity_id, input, ..
                } => {
                    let scheduled = self.record(
                        EventType::ActivityTaskScheduled,
                        EventAttributes {
                            activity_id: Some(activity_id.clone()),
                            input: input.clone(),
                            ..Default::default()
                        },
                    );
                    self.record(
                        EventType::ActivityTaskCompleted,
                        EventAttributes {
                            scheduled_event_id: Some(scheduled),
                            result: input.clone(),
                            ..Default::default()
                        },
                    );
                }
                Decision::StartTimer {
                    timer_id,
                    start_to_fire_timeout,
                    ..
                } => {
                    let started = self.record(
                        EventType::TimerStarted,
                        EventAttributes {
                            timer_id: Some(timer_id.clone()),
                            ..Default::default()
                        },
                    );
                    let delay = chrono::Duration::from_std(*start_to_fire_timeout)
                        .unwrap_or_else(|_| chrono::Duration::zero());
                    self.clock += delay;
                    self.record(
                        EventType::TimerFired,
                        EventAttributes {
                            started_event_id: Some(started),
                            ..Default::default()
                        },
                    );
                }
                other if other.is_terminal() => open = false,
                _ => {}
            }
        }
        open
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "everruns_decider=info,cron_workflow=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut registry = WorkflowRegistry::new();
    registry.register::<CronWorkflow>();

    let decider = Decider::with_config(DeciderConfig::from_env());
    let mut service = Service::start("0");

    for cycle in 1..=20 {
        let outcome = decider
            .decide(&registry, &service.task())
            .with_context(|| format!("decision cycle {cycle}"))?;

        for decision in &outcome.decisions {
            tracing::info!(cycle, %decision, "decided");
        }

        if !service.apply(&outcome.decisions) {
            tracing::info!(cycle, events = outcome.events_indexed, "run closed");
            break;
        }
    }

    Ok(())
}
