use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_FALLBACK_BUDGET: u32 = 3;
pub const DEFAULT_STREAM_IDLE_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GlobalConfigError {
    #[error("invalid global config field {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

/// Final, merged global configuration used by the running process.
///
/// Sources, highest priority first: CLI flag, environment variable, default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalConfig {
    pub host: String,
    pub port: u16,
    /// Maximum provider-to-provider transitions within one client request.
    pub fallback_budget: u32,
    /// Optional outbound proxy (for upstream egress).
    pub proxy: Option<String>,
    /// A stalled upstream read longer than this ends the attempt.
    pub stream_idle_timeout_secs: u64,
    /// Print observability events to stderr.
    pub event_log: bool,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            fallback_budget: DEFAULT_FALLBACK_BUDGET,
            proxy: None,
            stream_idle_timeout_secs: DEFAULT_STREAM_IDLE_TIMEOUT_SECS,
            event_log: false,
        }
    }
}

impl GlobalConfig {
    pub fn validate(&self) -> Result<(), GlobalConfigError> {
        if self.host.trim().is_empty() {
            return Err(GlobalConfigError::Invalid {
                field: "host",
                reason: "must not be empty",
            });
        }
        if self.fallback_budget == 0 {
            return Err(GlobalConfigError::Invalid {
                field: "fallback_budget",
                reason: "must be at least 1",
            });
        }
        if self.stream_idle_timeout_secs == 0 {
            return Err(GlobalConfigError::Invalid {
                field: "stream_idle_timeout_secs",
                reason: "must be at least 1",
            });
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn stream_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_idle_timeout_secs)
    }
}
