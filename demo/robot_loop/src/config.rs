use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use shuffleboard_core::ShuffleboardConfig;

/// Configuration for the robot loop demo
#[derive(Clone, Debug)]
pub struct RobotLoopConfig {
    /// Loop period; the dashboard is updated once per tick
    pub period: Duration,
    /// Ticks to run before shutting down; 0 runs until Ctrl+C
    pub iterations: u64,
    /// Tick at which recording starts
    pub record_from: u64,
    pub shuffleboard: ShuffleboardConfig,
}

impl Default for RobotLoopConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(
                std::env::var("ROBOT_LOOP_PERIOD_MS")
                    .ok()
                    .and_then(|v| v.parse::<u64>().ok())
                    .filter(|ms| *ms > 0)
                    .unwrap_or(20),
            ),
            iterations: std::env::var("ROBOT_LOOP_ITERATIONS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(500),
            record_from: 50,
            shuffleboard: ShuffleboardConfig::from_env(),
        }
    }
}

impl RobotLoopConfig {
    /// Load configuration from a TOML file (path via ROBOT_LOOP_CONFIG or ./robot_loop.toml),
    /// overlaying values onto defaults and env-driven defaults.
    pub fn load() -> Self {
        let default = Self::default();
        let path = std::env::var("ROBOT_LOOP_CONFIG").unwrap_or_else(|_| "robot_loop.toml".into());
        let p = Path::new(&path);
        if !p.exists() {
            tracing::info!(target: "robot_loop", path = %path, "No TOML config found; using defaults/env");
            return default;
        }
        match fs::read_to_string(p) {
            Ok(s) => match toml::from_str::<RobotLoopToml>(&s) {
                Ok(t) => t.overlay(default),
                Err(e) => {
                    tracing::warn!(target: "robot_loop", error = %e, "Failed to parse TOML; using defaults");
                    default
                }
            },
            Err(e) => {
                tracing::warn!(target: "robot_loop", error = %e, "Failed to read TOML; using defaults");
                default
            }
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct RobotLoopToml {
    period_ms: Option<u64>,
    iterations: Option<u64>,
    record_from: Option<u64>,
    recording_dir: Option<PathBuf>,
    file_name_format: Option<String>,
}

impl RobotLoopToml {
    fn overlay(self, mut base: RobotLoopConfig) -> RobotLoopConfig {
        if let Some(ms) = self.period_ms.filter(|ms| *ms > 0) {
            base.period = Duration::from_millis(ms);
        }
        if let Some(n) = self.iterations {
            base.iterations = n;
        }
        if let Some(n) = self.record_from {
            base.record_from = n;
        }
        if let Some(dir) = self.recording_dir {
            base.shuffleboard.recording_dir = dir;
        }
        if let Some(f) = self.file_name_format.filter(|s| !s.is_empty()) {
            base.shuffleboard.default_file_name_format = f;
        }
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_overlays_defaults() {
        let parsed: RobotLoopToml = toml::from_str(
            r#"
            period_ms = 10
            iterations = 3
            file_name_format = "demo-${time}"
            "#,
        )
        .unwrap();
        let cfg = parsed.overlay(RobotLoopConfig::default());
        assert_eq!(cfg.period, Duration::from_millis(10));
        assert_eq!(cfg.iterations, 3);
        assert_eq!(cfg.shuffleboard.default_file_name_format, "demo-${time}");
    }

    #[test]
    fn zero_period_is_ignored() {
        let parsed: RobotLoopToml = toml::from_str("period_ms = 0").unwrap();
        let base = RobotLoopConfig::default();
        let expected = base.period;
        assert_eq!(parsed.overlay(base).period, expected);
    }
}
