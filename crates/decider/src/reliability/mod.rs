//! Reliability patterns for action execution
//!
//! This module provides:
//! - [`RetryPolicy`]: Configurable retry and repeat with exponential backoff
//! - [`ResultMatcher`]: Regex stop condition tested against action payloads
//! - [`RetryTrigger`]: Which outcome a policy reacts to

mod retry;

pub use retry::{ResultMatcher, RetryPolicy, RetryTrigger};
