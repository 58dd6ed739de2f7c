//! Flow configuration
//!
//! Process-level settings for decision passes, loaded from environment
//! variables or built explicitly. Not part of snapshots.

use std::env;
use std::time::Duration;

use serde_json::Value;
use tracing::warn;

use crate::nodes::DEFAULT_START_TO_FIRE_TIMEOUT;

/// Result used when a flow goes quiet without completing the execution
pub const DEFAULT_QUIESCENT_RESULT: &str = "UNKNOWN";

/// Configuration for a [`Flow`](crate::Flow)
#[derive(Debug, Clone, PartialEq)]
pub struct FlowConfig {
    /// Result the execution is completed with when a pass ends with no active
    /// node and no decisions
    pub quiescent_result: Value,

    /// Timeout for timers created through [`Flow::add_timer`](crate::Flow::add_timer)
    pub default_timer_timeout: Duration,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            quiescent_result: Value::String(DEFAULT_QUIESCENT_RESULT.to_string()),
            default_timer_timeout: DEFAULT_START_TO_FIRE_TIMEOUT,
        }
    }
}

impl FlowConfig {
    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `FLOWSER_QUIESCENT_RESULT`: JSON value, or a plain string if it does
    ///   not parse (default: "UNKNOWN")
    /// - `FLOWSER_TIMER_TIMEOUT_SECS`: default timer timeout in seconds (default: 5)
    pub fn from_env() -> Self {
        Self::from_vars(|name| env::var(name).ok())
    }

    fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let quiescent_result = lookup("FLOWSER_QUIESCENT_RESULT")
            .map(|raw| serde_json::from_str(&raw).unwrap_or(Value::String(raw)))
            .unwrap_or(defaults.quiescent_result);

        let default_timer_timeout = match lookup("FLOWSER_TIMER_TIMEOUT_SECS") {
            Some(raw) => match raw.trim().parse() {
                Ok(secs) => Duration::from_secs(secs),
                Err(error) => {
                    warn!(value = %raw, %error, "invalid FLOWSER_TIMER_TIMEOUT_SECS, using default");
                    defaults.default_timer_timeout
                }
            },
            None => defaults.default_timer_timeout,
        };

        Self {
            quiescent_result,
            default_timer_timeout,
        }
    }

    /// Set the quiescence result
    pub fn with_quiescent_result(mut self, result: Value) -> Self {
        self.quiescent_result = result;
        self
    }

    /// Set the default timer timeout
    pub fn with_default_timer_timeout(mut self, timeout: Duration) -> Self {
        self.default_timer_timeout = timeout;
        self
    }
}
