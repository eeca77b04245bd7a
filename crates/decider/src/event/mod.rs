//! History events and their canonical classification
//!
//! This module contains:
//! - [`HistoryEvent`] the raw record polled from the service
//! - [`ActionEvent`] the classified event used for action tracking
//! - [`classify`] the pure conversion between the two

mod canonical;
mod raw;

pub use canonical::{classify, ActionEvent, EventCategory, EventState};
pub use raw::{make_key, ActivityType, EventAttributes, EventType, HistoryEvent, WorkflowType};
