//! Session configuration with per-mode defaults
//!
//! Layering: `SessionConfig::for_mode` → optional JSON overrides → CLI flags.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::recognition::smoother::DEFAULT_WINDOW;
use crate::recognition::Thresholds;

/// Which practice surface drives the engine
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionMode {
    /// Single-sign realtime practice
    Realtime,
    /// One target per letter of a typed word
    FingerSpelling,
    /// Timed randomized test
    ModuleTest,
}

impl FromStr for SessionMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "realtime" => Ok(SessionMode::Realtime),
            "finger-spelling" => Ok(SessionMode::FingerSpelling),
            "module-test" => Ok(SessionMode::ModuleTest),
            other => Err(ConfigError::UnknownMode(other.to_string())),
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown session mode `{0}` (use realtime, finger-spelling or module-test)")]
    UnknownMode(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Engine tuning for one session
#[derive(Clone, Debug, PartialEq)]
pub struct SessionConfig {
    pub mode: SessionMode,
    /// Smoothing window capacity
    pub window_capacity: usize,
    pub thresholds: Thresholds,
    /// Accept matches in the low-confidence tier (flagged)
    pub accept_low_confidence: bool,
    /// Capture cadence
    pub capture_interval: Duration,
    /// Per-target deadline
    pub item_timeout: Duration,
    /// Capture pause after a correct match
    pub match_cooldown: Duration,
    /// Delay before the one-off retry of a retriable fault
    pub retry_delay: Duration,
    /// Bound on one readiness probe
    pub readiness_timeout: Duration,
    /// Bound on the best-effort snapshot taken on a miss
    pub snapshot_timeout: Duration,
    /// Countdown tick granularity
    pub tick: Duration,
    /// End early after this many misses
    pub lives: Option<u32>,
    /// Consecutive failed readiness probes before unreadiness is surfaced
    pub unready_alert_after: u32,
}

impl SessionConfig {
    pub fn for_mode(mode: SessionMode) -> Self {
        let base = SessionConfig {
            mode,
            window_capacity: DEFAULT_WINDOW,
            thresholds: Thresholds::default(),
            accept_low_confidence: false,
            capture_interval: Duration::from_millis(2000),
            item_timeout: Duration::from_secs(10),
            match_cooldown: Duration::from_millis(4000),
            retry_delay: Duration::from_millis(1000),
            readiness_timeout: Duration::from_millis(5000),
            snapshot_timeout: Duration::from_millis(500),
            tick: Duration::from_secs(1),
            lives: None,
            unready_alert_after: 3,
        };

        match mode {
            SessionMode::Realtime => base,
            SessionMode::FingerSpelling => SessionConfig {
                match_cooldown: Duration::from_millis(1500),
                ..base
            },
            SessionMode::ModuleTest => SessionConfig {
                accept_low_confidence: true,
                capture_interval: Duration::from_millis(1000),
                item_timeout: Duration::from_secs(5),
                match_cooldown: Duration::from_millis(1500),
                lives: Some(3),
                ..base
            },
        }
    }

    /// Apply overrides from a JSON file on top of the current values.
    pub fn apply_file(self, path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        self.apply_json(&content)
    }

    pub fn apply_json(self, json: &str) -> Result<Self, ConfigError> {
        let overrides: ConfigOverrides = serde_json::from_str(json)?;
        Ok(overrides.apply(self))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.thresholds;
        if self.window_capacity == 0 {
            return Err(ConfigError::Invalid("window capacity must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&t.accept) || !(0.0..=1.0).contains(&t.low) {
            return Err(ConfigError::Invalid("thresholds must lie in [0, 1]".into()));
        }
        if t.low > t.accept {
            return Err(ConfigError::Invalid(format!(
                "low-confidence threshold {} exceeds accept threshold {}",
                t.low, t.accept
            )));
        }
        if self.capture_interval.is_zero() || self.item_timeout.is_zero() || self.tick.is_zero() {
            return Err(ConfigError::Invalid(
                "capture interval, item timeout and tick must be non-zero".into(),
            ));
        }
        if self.lives == Some(0) {
            return Err(ConfigError::Invalid("lives must be at least 1 when set".into()));
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::for_mode(SessionMode::Realtime)
    }
}

/// JSON override file; every field optional, durations in milliseconds
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigOverrides {
    window_capacity: Option<usize>,
    accept_threshold: Option<f32>,
    low_confidence_threshold: Option<f32>,
    accept_low_confidence: Option<bool>,
    capture_interval_ms: Option<u64>,
    item_timeout_ms: Option<u64>,
    match_cooldown_ms: Option<u64>,
    retry_delay_ms: Option<u64>,
    readiness_timeout_ms: Option<u64>,
    snapshot_timeout_ms: Option<u64>,
    lives: Option<u32>,
    unready_alert_after: Option<u32>,
}

impl ConfigOverrides {
    fn apply(self, mut config: SessionConfig) -> SessionConfig {
        let ms = Duration::from_millis;

        if let Some(v) = self.window_capacity {
            config.window_capacity = v;
        }
        if let Some(v) = self.accept_threshold {
            config.thresholds.accept = v;
        }
        if let Some(v) = self.low_confidence_threshold {
            config.thresholds.low = v;
        }
        if let Some(v) = self.accept_low_confidence {
            config.accept_low_confidence = v;
        }
        if let Some(v) = self.capture_interval_ms {
            config.capture_interval = ms(v);
        }
        if let Some(v) = self.item_timeout_ms {
            config.item_timeout = ms(v);
        }
        if let Some(v) = self.match_cooldown_ms {
            config.match_cooldown = ms(v);
        }
        if let Some(v) = self.retry_delay_ms {
            config.retry_delay = ms(v);
        }
        if let Some(v) = self.readiness_timeout_ms {
            config.readiness_timeout = ms(v);
        }
        if let Some(v) = self.snapshot_timeout_ms {
            config.snapshot_timeout = ms(v);
        }
        if self.lives.is_some() {
            config.lives = self.lives;
        }
        if let Some(v) = self.unready_alert_after {
            config.unready_alert_after = v;
        }
        config
    }
}
