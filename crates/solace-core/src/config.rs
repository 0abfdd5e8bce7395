use std::str::FromStr;
use std::time::Duration;

use anyhow::{Result, anyhow};

use crate::connect::ConnectScope;

pub const DEFAULT_PRESENCE_DEBOUNCE: Duration = Duration::from_millis(500);
pub const DEFAULT_REPORT_CONFIRMATION: Duration = Duration::from_secs(2);
pub const DEFAULT_FOLLOW_UP_DELAY: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    /// Quiet period before a pushed presence snapshot is applied.
    pub presence_debounce: Duration,
    /// How long a submitted report shows its confirmation before the dialog resets.
    pub report_confirmation: Duration,
    /// Settle delay between a confirmed block and the chained report dialog.
    pub follow_up_delay: Duration,
    pub connect_scope: ConnectScope,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            presence_debounce: DEFAULT_PRESENCE_DEBOUNCE,
            report_confirmation: DEFAULT_REPORT_CONFIRMATION,
            follow_up_delay: DEFAULT_FOLLOW_UP_DELAY,
            connect_scope: ConnectScope::Global,
        }
    }
}

impl CoreConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            presence_debounce: millis_or(
                &lookup,
                "SOLACE_PRESENCE_DEBOUNCE_MS",
                defaults.presence_debounce,
            )?,
            report_confirmation: millis_or(
                &lookup,
                "SOLACE_REPORT_CONFIRMATION_MS",
                defaults.report_confirmation,
            )?,
            follow_up_delay: millis_or(&lookup, "SOLACE_FOLLOW_UP_DELAY_MS", defaults.follow_up_delay)?,
            connect_scope: match lookup("SOLACE_CONNECT_SCOPE") {
                Some(raw) => raw
                    .parse()
                    .map_err(|err| anyhow!("invalid SOLACE_CONNECT_SCOPE: {}", err))?,
                None => defaults.connect_scope,
            },
        })
    }
}

fn millis_or<F>(lookup: &F, key: &str, default: Duration) -> Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => u64::from_str(raw.trim())
            .map(Duration::from_millis)
            .map_err(|err| anyhow!("invalid {}: {}", key, err)),
        None => Ok(default),
    }
}
