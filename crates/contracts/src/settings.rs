//! Runtime settings shared by the compiler, movers and supervisor.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Literal token replaced by a generated named-pipe path in stage 0
pub const DEFAULT_MARKER: &str = "#PIPE#";

/// Runtime settings (loaded from file, overridden by CLI flags)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeSettings {
    /// Named-pipe substitution marker
    #[serde(default = "default_marker")]
    pub marker: String,

    /// Stall detection
    #[serde(default)]
    pub watchdog: WatchdogSettings,

    /// Teardown timing
    #[serde(default)]
    pub teardown: TeardownSettings,

    /// Pipeline size limits
    #[serde(default)]
    pub limits: PipelineLimits,
}

fn default_marker() -> String {
    DEFAULT_MARKER.to_string()
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            marker: default_marker(),
            watchdog: WatchdogSettings::default(),
            teardown: TeardownSettings::default(),
            limits: PipelineLimits::default(),
        }
    }
}

/// Watchdog stall detection configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogSettings {
    /// Treat a pipeline without forward progress as failed
    pub enabled: bool,
    /// Supervisor wait timeout between liveness checks
    pub check_interval_ms: u64,
    /// Consecutive idle checks before declaring a stall
    pub stall_checks: u32,
}

impl Default for WatchdogSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            check_interval_ms: 1000,
            stall_checks: 10,
        }
    }
}

impl WatchdogSettings {
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }

    /// Time without progress after which the pipeline counts as stalled
    pub fn stall_window(&self) -> Duration {
        self.check_interval().saturating_mul(self.stall_checks)
    }
}

/// Teardown timing configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeardownSettings {
    /// Time granted to stages to exit on their own
    pub grace_ms: u64,
    /// Grace period used in fast mode
    pub fast_grace_ms: u64,
    /// Use `fast_grace_ms` instead of `grace_ms`
    pub fast: bool,
}

impl Default for TeardownSettings {
    fn default() -> Self {
        Self {
            grace_ms: 2000,
            fast_grace_ms: 200,
            fast: false,
        }
    }
}

impl TeardownSettings {
    /// Effective grace period
    pub fn grace(&self) -> Duration {
        if self.fast {
            Duration::from_millis(self.fast_grace_ms)
        } else {
            Duration::from_millis(self.grace_ms)
        }
    }
}

/// Pipeline size limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineLimits {
    /// Maximum number of commands in a template
    pub max_stages: usize,
    /// Mover transfer buffer size in bytes
    pub buffer_size: usize,
}

impl Default for PipelineLimits {
    fn default() -> Self {
        Self {
            max_stages: 16,
            buffer_size: 8 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = RuntimeSettings::default();
        assert_eq!(settings.marker, "#PIPE#");
        assert!(!settings.watchdog.enabled);
        assert_eq!(settings.limits.buffer_size, 8192);
        assert_eq!(settings.teardown.grace(), Duration::from_millis(2000));
    }

    #[test]
    fn test_fast_teardown() {
        let teardown = TeardownSettings {
            fast: true,
            ..Default::default()
        };
        assert_eq!(teardown.grace(), Duration::from_millis(200));
    }

    #[test]
    fn test_stall_window() {
        let watchdog = WatchdogSettings {
            enabled: true,
            check_interval_ms: 250,
            stall_checks: 4,
        };
        assert_eq!(watchdog.stall_window(), Duration::from_secs(1));
    }

    #[test]
    fn test_stall_window_saturates() {
        let watchdog = WatchdogSettings {
            enabled: true,
            check_interval_ms: u64::MAX,
            stall_checks: 2000,
        };
        assert_eq!(watchdog.stall_window(), Duration::MAX);
    }

    #[test]
    fn test_partial_toml() {
        let settings: RuntimeSettings = toml::from_str(
            r#"
[watchdog]
enabled = true
"#,
        )
        .unwrap();
        assert!(settings.watchdog.enabled);
        assert_eq!(settings.watchdog.stall_checks, 10);
        assert_eq!(settings.marker, DEFAULT_MARKER);
    }
}
