//! Retry policy implementation

use std::fmt;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::decision::{whole_seconds, Decision};
use crate::error::{DecisionError, Result};
use crate::event::{ActionEvent, EventState, EventType};

/// Configuration for action retries and repeats
///
/// A policy is attached to an action either to retry it after an error or to
/// repeat it after each success. It holds no state of its own: the attempt
/// count and elapsed time are recomputed from the action's history on every
/// call, so one policy can be shared by many actions and runs.
///
/// Supports exponential backoff with jitter to avoid thundering herd. Jitter
/// is seeded from the action id and attempt, so replaying the same history
/// always yields the same delay.
///
/// # Example
///
/// ```
/// use everruns_decider::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::exponential()
///     .with_max_attempts(5)
///     .with_initial_interval(Duration::from_secs(1))
///     .with_max_interval(Duration::from_secs(60));
///
/// // First retry after ~1 second
/// // Second retry after ~2 seconds
/// // Third retry after ~4 seconds
/// // etc.
/// assert!(policy.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including initial)
    pub max_attempts: u32,

    /// Initial delay before first retry
    #[serde(with = "duration_millis")]
    pub initial_interval: Duration,

    /// Maximum delay between retries
    #[serde(with = "duration_millis")]
    pub max_interval: Duration,

    /// Backoff multiplier (e.g., 2.0 for exponential)
    pub backoff_coefficient: f64,

    /// Jitter factor (0.0-1.0) to add randomness
    ///
    /// A value of 0.1 means ±10% randomness.
    pub jitter: f64,

    /// Stop once this much time has passed since the first attempt
    #[serde(default, with = "option_duration_millis")]
    pub expiration: Option<Duration>,

    /// Error reasons that should NOT be retried
    #[serde(default)]
    pub non_retryable_errors: Vec<String>,

    /// Stop when the latest result, reason or details match this pattern
    #[serde(default)]
    pub stop_matcher: Option<ResultMatcher>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential()
    }
}

impl RetryPolicy {
    /// Create an exponential backoff retry policy with sensible defaults
    ///
    /// - 5 max attempts
    /// - 1 second initial interval
    /// - 60 second max interval
    /// - 2x backoff coefficient
    /// - 10% jitter
    pub fn exponential() -> Self {
        Self {
            max_attempts: 5,
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(60),
            backoff_coefficient: 2.0,
            jitter: 0.1,
            expiration: None,
            non_retryable_errors: vec![],
            stop_matcher: None,
        }
    }

    /// Create a policy that never retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_interval: Duration::ZERO,
            max_interval: Duration::ZERO,
            backoff_coefficient: 1.0,
            jitter: 0.0,
            expiration: None,
            non_retryable_errors: vec![],
            stop_matcher: None,
        }
    }

    /// Create a policy with fixed intervals (no backoff)
    pub fn fixed(interval: Duration, max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_interval: interval,
            max_interval: interval,
            backoff_coefficient: 1.0,
            jitter: 0.0,
            expiration: None,
            non_retryable_errors: vec![],
            stop_matcher: None,
        }
    }

    /// Create a fixed-interval policy without an attempt cap
    ///
    /// Meant for repeat-on-success policies on cron-like actions.
    pub fn repeat_every(interval: Duration) -> Self {
        Self::fixed(interval, u32::MAX)
    }

    /// Set the maximum number of attempts
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the initial retry interval
    pub fn with_initial_interval(mut self, interval: Duration) -> Self {
        self.initial_interval = interval;
        self
    }

    /// Set the maximum retry interval
    pub fn with_max_interval(mut self, interval: Duration) -> Self {
        self.max_interval = interval;
        self
    }

    /// Set the backoff coefficient
    pub fn with_backoff_coefficient(mut self, coefficient: f64) -> Self {
        self.backoff_coefficient = coefficient;
        self
    }

    /// Set the jitter factor (0.0-1.0)
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Stop retrying once this much time has passed since the first attempt
    pub fn with_expiration(mut self, expiration: Duration) -> Self {
        self.expiration = Some(expiration);
        self
    }

    /// Add a non-retryable error reason
    pub fn with_non_retryable_error(mut self, error_type: impl Into<String>) -> Self {
        self.non_retryable_errors.push(error_type.into());
        self
    }

    /// Stop when the latest payload matches a regular expression
    ///
    /// # Errors
    ///
    /// [`DecisionError::UnconfiguredAction`] if the pattern does not compile.
    pub fn with_stop_pattern(mut self, pattern: &str) -> Result<Self> {
        self.stop_matcher = Some(ResultMatcher::new(pattern)?);
        Ok(self)
    }

    /// Check the policy parameters
    ///
    /// Called when the policy is attached to an action, so misconfiguration
    /// fails at setup rather than in the middle of a decision.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(DecisionError::unconfigured(
                "retry policy max_attempts must be at least 1",
            ));
        }
        if self.max_attempts > 1 && self.initial_interval.is_zero() {
            return Err(DecisionError::unconfigured(
                "retry policy initial_interval must be positive",
            ));
        }
        if self.max_interval < self.initial_interval {
            return Err(DecisionError::unconfigured(format!(
                "retry policy max_interval {:?} is below initial_interval {:?}",
                self.max_interval, self.initial_interval
            )));
        }
        if !self.backoff_coefficient.is_finite() || self.backoff_coefficient < 1.0 {
            return Err(DecisionError::unconfigured(format!(
                "retry policy backoff_coefficient {} must be >= 1.0",
                self.backoff_coefficient
            )));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(DecisionError::unconfigured(format!(
                "retry policy jitter {} must be within 0.0..=1.0",
                self.jitter
            )));
        }
        if self.expiration.is_some_and(|e| e.is_zero()) {
            return Err(DecisionError::unconfigured(
                "retry policy expiration must be positive",
            ));
        }
        Ok(())
    }

    /// Calculate delay for a given attempt number (1-based)
    ///
    /// Returns the duration to wait before the attempt. `action_id` seeds
    /// the jitter.
    pub fn delay_for_attempt(&self, action_id: &str, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }

        let retry_num = attempt - 1; // First retry is after attempt 1
        let exponent = i32::try_from(retry_num - 1).unwrap_or(i32::MAX);
        let base = self.initial_interval.as_secs_f64() * self.backoff_coefficient.powi(exponent);
        let capped = base.min(self.max_interval.as_secs_f64());

        // Apply jitter
        let jittered = if self.jitter > 0.0 && capped > 0.0 {
            let mut rng = StdRng::seed_from_u64(jitter_seed(action_id, attempt));
            let jitter_range = capped * self.jitter;
            let jitter_offset = rng.gen_range(-jitter_range..jitter_range);
            (capped + jitter_offset).max(0.0)
        } else {
            capped
        };

        Duration::try_from_secs_f64(jittered).unwrap_or(self.max_interval)
    }

    /// Check if an error reason should be retried
    pub fn should_retry(&self, error_type: Option<&str>) -> bool {
        if let Some(error_type) = error_type {
            !self.non_retryable_errors.iter().any(|e| e == error_type)
        } else {
            true
        }
    }

    /// Check if there are remaining attempts
    pub fn has_attempts_remaining(&self, current_attempt: u32) -> bool {
        current_attempt < self.max_attempts
    }

    /// Termination predicate tested against the latest payload
    ///
    /// For errors `data1` is the reason and `data2` the details, for
    /// successes `data1` is the result.
    pub fn should_stop(&self, data1: Option<&str>, data2: Option<&str>) -> bool {
        !self.should_retry(data1) || self.stop_pattern_matches(data1, data2)
    }

    /// Check the stop pattern alone against either payload
    pub fn stop_pattern_matches(&self, data1: Option<&str>, data2: Option<&str>) -> bool {
        self.stop_matcher
            .as_ref()
            .is_some_and(|m| m.matches(data1) || m.matches(data2))
    }

    /// Compute the timer that delays the next attempt, if any
    ///
    /// `history` is every event the action has produced across attempts,
    /// oldest-first. Only the current streak for `trigger` counts: a retry
    /// timer follows the outcome it reacts to, so the streak's TimerStarted
    /// events give the attempts made so far. An error streak restarts after
    /// each success, so repeats never use up error retries, and error
    /// retries never use up repeats. Returns `None` once attempts or time
    /// are exhausted.
    pub fn next_decision(
        &self,
        action_id: &str,
        trigger: RetryTrigger,
        history: &[&ActionEvent],
    ) -> Option<Decision> {
        let streak = trigger.streak(history);
        let retries = streak
            .windows(2)
            .filter(|pair| {
                pair[1].event_type() == EventType::TimerStarted && trigger.is_outcome(pair[0])
            })
            .count();
        let retries = u32::try_from(retries).unwrap_or(u32::MAX);
        let attempt = retries.saturating_add(1);

        if !self.has_attempts_remaining(attempt) {
            return None;
        }

        let first = streak.iter().find(|e| !is_timer_event(e));
        if let (Some(expiration), Some(first), Some(last)) = (self.expiration, first, streak.last())
        {
            let elapsed = (last.event_timestamp() - first.event_timestamp())
                .to_std()
                .unwrap_or_default();
            if elapsed >= expiration {
                return None;
            }
        }

        let delay = self.delay_for_attempt(action_id, attempt + 1);
        Some(Decision::StartTimer {
            timer_id: action_id.to_string(),
            start_to_fire_timeout: Duration::from_secs(whole_seconds(delay)),
            control: Some((retries + 1).to_string()),
        })
    }
}

/// Outcome a retry policy reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryTrigger {
    /// Retry after a failed, timed-out or canceled attempt
    Error,
    /// Repeat after a completed attempt
    Success,
}

impl RetryTrigger {
    fn is_outcome(self, event: &ActionEvent) -> bool {
        let wanted = match self {
            Self::Error => EventState::Error,
            Self::Success => EventState::Success,
        };
        !is_timer_event(event) && event.state() == wanted
    }

    /// Events that count toward the current streak
    ///
    /// Error retries restart after the newest success. Repeats span the
    /// whole history.
    fn streak<'a, 'h>(self, history: &'a [&'h ActionEvent]) -> &'a [&'h ActionEvent] {
        match self {
            Self::Error => {
                let start = history
                    .iter()
                    .rposition(|e| Self::Success.is_outcome(e))
                    .map_or(0, |i| i + 1);
                &history[start..]
            }
            Self::Success => history,
        }
    }
}

fn is_timer_event(event: &ActionEvent) -> bool {
    matches!(
        event.event_type(),
        EventType::TimerStarted
            | EventType::StartTimerFailed
            | EventType::TimerFired
            | EventType::TimerCanceled
    )
}

/// Stable seed for the jitter of one attempt (FNV-1a)
fn jitter_seed(action_id: &str, attempt: u32) -> u64 {
    action_id
        .bytes()
        .chain(attempt.to_le_bytes())
        .fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
            (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
        })
}

/// Compiled regular expression tested against action payloads
#[derive(Clone)]
pub struct ResultMatcher {
    regex: Regex,
}

impl ResultMatcher {
    /// Compile a pattern
    pub fn new(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(|regex| Self { regex })
            .map_err(|e| DecisionError::unconfigured(format!("invalid stop pattern: {}", e)))
    }

    /// Source pattern
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// Check if a payload matches, `None` never matches
    pub fn matches(&self, payload: Option<&str>) -> bool {
        payload.is_some_and(|p| self.regex.is_match(p))
    }
}

impl fmt::Debug for ResultMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ResultMatcher").field(&self.as_str()).finish()
    }
}

impl PartialEq for ResultMatcher {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Serialize for ResultMatcher {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ResultMatcher {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let pattern = String::deserialize(deserializer)?;
        Self::new(&pattern).map_err(serde::de::Error::custom)
    }
}

/// Serde support for Duration as milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Serde support for Option<Duration>
mod option_duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => d.as_millis().serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis: Option<u64> = Option::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}
