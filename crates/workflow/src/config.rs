use std::time::Duration;

use clubflow_core::deadline::{
    DeadlineWindows, DEFAULT_NAME_REVISION_WINDOW_DAYS, DEFAULT_PROPOSAL_WINDOW_DAYS,
    DEFAULT_TRIAGE_WINDOW_DAYS,
};

/// A malformed environment variable.
#[derive(Debug, thiserror::Error)]
#[error("{var} must be {expected}, got '{value}'")]
pub struct ConfigError {
    pub var: &'static str,
    pub expected: &'static str,
    pub value: String,
}

/// Workflow configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowConfig {
    /// Response windows used when a transition sets a deadline.
    pub deadlines: DeadlineWindows,
    /// How often the overdue-request sweep runs.
    pub deadline_sweep_interval: Duration,
    /// How often unprovisioned approvals are retried / reported.
    pub provisioning_retry_interval: Duration,
    /// Maximum rows handled per sweep or retry pass.
    pub batch_limit: i64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            deadlines: DeadlineWindows::default(),
            deadline_sweep_interval: Duration::from_secs(3600),
            provisioning_retry_interval: Duration::from_secs(300),
            batch_limit: 100,
        }
    }
}

impl WorkflowConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                            | Default |
    /// |------------------------------------|---------|
    /// | `TRIAGE_WINDOW_DAYS`               | `5`     |
    /// | `PROPOSAL_WINDOW_DAYS`             | `14`    |
    /// | `NAME_REVISION_WINDOW_DAYS`        | `7`     |
    /// | `DEADLINE_SWEEP_INTERVAL_SECS`     | `3600`  |
    /// | `PROVISIONING_RETRY_INTERVAL_SECS` | `300`   |
    /// | `WORKFLOW_BATCH_LIMIT`             | `100`   |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let days = |var: &'static str, default: i64| -> Result<i64, ConfigError> {
            let value = parse_or(&lookup, var, "a positive number of days", default)?;
            if value <= 0 {
                return Err(ConfigError {
                    var,
                    expected: "a positive number of days",
                    value: value.to_string(),
                });
            }
            Ok(value)
        };

        let deadlines = DeadlineWindows {
            triage_days: days("TRIAGE_WINDOW_DAYS", DEFAULT_TRIAGE_WINDOW_DAYS)?,
            proposal_days: days("PROPOSAL_WINDOW_DAYS", DEFAULT_PROPOSAL_WINDOW_DAYS)?,
            name_revision_days: days(
                "NAME_REVISION_WINDOW_DAYS",
                DEFAULT_NAME_REVISION_WINDOW_DAYS,
            )?,
        };

        let defaults = Self::default();

        let sweep_secs: u64 = parse_or(
            &lookup,
            "DEADLINE_SWEEP_INTERVAL_SECS",
            "a number of seconds",
            defaults.deadline_sweep_interval.as_secs(),
        )?;
        let retry_secs: u64 = parse_or(
            &lookup,
            "PROVISIONING_RETRY_INTERVAL_SECS",
            "a number of seconds",
            defaults.provisioning_retry_interval.as_secs(),
        )?;
        let batch_limit: i64 = parse_or(
            &lookup,
            "WORKFLOW_BATCH_LIMIT",
            "a positive integer",
            defaults.batch_limit,
        )?;

        Ok(Self {
            deadlines,
            deadline_sweep_interval: Duration::from_secs(sweep_secs.max(1)),
            provisioning_retry_interval: Duration::from_secs(retry_secs.max(1)),
            batch_limit: batch_limit.max(1),
        })
    }
}

fn parse_or<F, T>(lookup: &F, var: &'static str, expected: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError {
            var,
            expected,
            value: raw,
        }),
    }
}
