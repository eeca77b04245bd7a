//! Workflow definition trait

use crate::decision::Decision;
use crate::error::Result;
use crate::event::{HistoryEvent, WorkflowType};
use crate::history::WorkflowHistory;

/// A workflow type the decider can run
///
/// Workflows are rebuilt for every decision cycle. All state comes from the
/// [`WorkflowHistory`] handed to [`decide`](Workflow::decide), so an
/// implementation typically holds nothing but its action factories.
///
/// # Example
///
/// ```
/// use everruns_decider::prelude::*;
///
/// struct Greeter;
///
/// impl Workflow for Greeter {
///     const NAME: &'static str = "Greeter";
///     const VERSION: &'static str = "1.0";
///
///     fn new() -> Self {
///         Self
///     }
///
///     fn decide(&mut self, history: &WorkflowHistory, decisions: &mut Vec<Decision>) -> Result<()> {
///         let input = history.workflow_input()?.unwrap_or("world").to_string();
///         Action::new("greet", ActivitySpec::new("Greet", "1.0").with_input(input))
///             .with_complete_workflow_on_success()
///             .decide(history, decisions)?;
///         Ok(())
///     }
/// }
/// ```
pub trait Workflow: Send + Sync + 'static {
    /// Registered workflow type name
    const NAME: &'static str;

    /// Registered workflow type version
    const VERSION: &'static str;

    /// Create a workflow instance for one decision cycle
    fn new() -> Self;

    /// Append the decisions for the current history
    fn decide(&mut self, history: &WorkflowHistory, decisions: &mut Vec<Decision>) -> Result<()>;

    /// Called instead of [`decide`](Workflow::decide) when the history holds
    /// unrecoverable error events
    ///
    /// The default fails the run, naming the first error event.
    fn on_unrecoverable_errors(&mut self, errors: &[&HistoryEvent], decisions: &mut Vec<Decision>) {
        if let Some(first) = errors.first() {
            let target = format!("{} event {}", first.event_type, first.event_id);
            let attributes = &first.attributes;
            decisions.push(Decision::fail(
                &target,
                attributes.cause.as_deref().or(attributes.reason.as_deref()),
                attributes.details.as_deref(),
            ));
        }
    }

    /// Whether the poller should fetch another page of history
    ///
    /// Long running workflows can stop early once the events they need are in
    /// `history`. The default reads the full history.
    fn is_continue_polling(&self, history: &WorkflowHistory) -> bool {
        let _ = history;
        true
    }

    /// Registered workflow type
    fn workflow_type() -> WorkflowType
    where
        Self: Sized,
    {
        WorkflowType::new(Self::NAME, Self::VERSION)
    }
}
