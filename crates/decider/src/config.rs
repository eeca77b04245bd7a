// Decider Configuration
//
// Limits and defaults for decision cycles, loaded from environment variables.

use std::env;

use serde::{Deserialize, Serialize};

/// Default maximum number of history events in one decision task
pub const DEFAULT_MAX_EVENTS: usize = 10000;

/// Default task list for child workflows that do not name one
pub const DEFAULT_TASK_LIST: &str = "default";

/// Configuration for the decision engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeciderConfig {
    /// Maximum events per decision task (for safety)
    pub max_events_per_decision: usize,

    /// Hand unrecoverable error events to the workflow hook instead of deciding
    pub fail_on_unrecoverable_errors: bool,

    /// Task list used when neither the action nor the task names one
    pub default_task_list: String,
}

impl Default for DeciderConfig {
    fn default() -> Self {
        Self {
            max_events_per_decision: DEFAULT_MAX_EVENTS,
            fail_on_unrecoverable_errors: true,
            default_task_list: DEFAULT_TASK_LIST.to_string(),
        }
    }
}

impl DeciderConfig {
    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `DECIDER_MAX_EVENTS`: Maximum events per decision task (default: 10000)
    /// - `DECIDER_FAIL_ON_ERRORS`: Route unrecoverable errors to the workflow hook (default: true)
    /// - `DECIDER_TASK_LIST`: Default task list (default: "default")
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let max_events_per_decision = lookup("DECIDER_MAX_EVENTS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_events_per_decision);

        let fail_on_unrecoverable_errors = lookup("DECIDER_FAIL_ON_ERRORS")
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(defaults.fail_on_unrecoverable_errors);

        let default_task_list = lookup("DECIDER_TASK_LIST")
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.default_task_list);

        Self {
            max_events_per_decision,
            fail_on_unrecoverable_errors,
            default_task_list,
        }
    }

    /// Set the maximum events per decision task
    pub fn with_max_events_per_decision(mut self, max: usize) -> Self {
        self.max_events_per_decision = max;
        self
    }

    /// Set whether unrecoverable errors go to the workflow hook
    pub fn with_fail_on_unrecoverable_errors(mut self, fail: bool) -> Self {
        self.fail_on_unrecoverable_errors = fail;
        self
    }

    /// Set the default task list
    pub fn with_default_task_list(mut self, task_list: impl Into<String>) -> Self {
        self.default_task_list = task_list.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = DeciderConfig::from_lookup(lookup(&[]));
        assert_eq!(config, DeciderConfig::default());
        assert_eq!(config.max_events_per_decision, 10000);
        assert!(config.fail_on_unrecoverable_errors);
        assert_eq!(config.default_task_list, "default");
    }

    #[test]
    fn test_from_vars() {
        let config = DeciderConfig::from_lookup(lookup(&[
            ("DECIDER_MAX_EVENTS", "250"),
            ("DECIDER_FAIL_ON_ERRORS", "false"),
            ("DECIDER_TASK_LIST", "reports"),
        ]));

        assert_eq!(config.max_events_per_decision, 250);
        assert!(!config.fail_on_unrecoverable_errors);
        assert_eq!(config.default_task_list, "reports");
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = DeciderConfig::from_lookup(lookup(&[
            ("DECIDER_MAX_EVENTS", "lots"),
            ("DECIDER_FAIL_ON_ERRORS", "1"),
            ("DECIDER_TASK_LIST", ""),
        ]));

        assert_eq!(config.max_events_per_decision, DEFAULT_MAX_EVENTS);
        assert!(config.fail_on_unrecoverable_errors);
        assert_eq!(config.default_task_list, DEFAULT_TASK_LIST);
    }

    #[test]
    fn test_builder_and_serde() {
        let config = DeciderConfig::default()
            .with_max_events_per_decision(5)
            .with_fail_on_unrecoverable_errors(false)
            .with_default_task_list("tl");

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["max_events_per_decision"], 5);

        let parsed: DeciderConfig =
            serde_json::from_value(serde_json::json!({ "default_task_list": "tl" })).unwrap();
        assert_eq!(parsed.max_events_per_decision, DEFAULT_MAX_EVENTS);
        assert_eq!(parsed.default_task_list, "tl");
    }
}
