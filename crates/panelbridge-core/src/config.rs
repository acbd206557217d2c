use std::path::Path;
use std::time::Duration;

use panelbridge_frame::{FrameConfig, DEFAULT_CHANNEL_COUNT, MAX_CHANNELS};
use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};
use crate::timer::TickSchedule;

/// Bridge configuration, loadable from JSON.
///
/// Missing fields take their defaults; unknown fields are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// Number of button/relay channel pairs (1..=8).
    pub device_count: usize,
    /// Ticks between button polls.
    pub poll_interval_ticks: u32,
    /// Ticks between heartbeat increments.
    pub heartbeat_interval_ticks: u32,
    /// Tick count at which the counter (and heartbeat) wraps to zero.
    pub tick_wrap: u32,
    /// Tick period in microseconds.
    pub tick_period_us: u64,
    /// Pause between consecutive sound module commands.
    pub settle_delay_ms: u32,
    /// Reject non-digit bytes in command fields instead of converting them.
    pub strict_digits: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            device_count: DEFAULT_CHANNEL_COUNT,
            poll_interval_ticks: 10,
            heartbeat_interval_ticks: 1000,
            tick_wrap: 3_600_000,
            tick_period_us: 1000,
            settle_delay_ms: 20,
            strict_digits: false,
        }
    }
}

impl BridgeConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_CHANNELS).contains(&self.device_count) {
            return Err(invalid(
                "device_count",
                format!("{} not in 1..={MAX_CHANNELS}", self.device_count),
            ));
        }
        if self.poll_interval_ticks == 0 {
            return Err(invalid("poll_interval_ticks", "must be non-zero".into()));
        }
        if self.heartbeat_interval_ticks == 0 {
            return Err(invalid("heartbeat_interval_ticks", "must be non-zero".into()));
        }
        if self.tick_period_us == 0 {
            return Err(invalid("tick_period_us", "must be non-zero".into()));
        }
        if self.tick_wrap == 0
            || self.tick_wrap % self.poll_interval_ticks != 0
            || self.tick_wrap % self.heartbeat_interval_ticks != 0
        {
            return Err(invalid(
                "tick_wrap",
                format!(
                    "{} must be a non-zero multiple of both intervals ({}, {})",
                    self.tick_wrap, self.poll_interval_ticks, self.heartbeat_interval_ticks
                ),
            ));
        }
        Ok(())
    }

    pub fn tick_schedule(&self) -> TickSchedule {
        TickSchedule {
            poll_interval: self.poll_interval_ticks,
            heartbeat_interval: self.heartbeat_interval_ticks,
            wrap: self.tick_wrap,
        }
    }

    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            channel_count: self.device_count,
            strict_digits: self.strict_digits,
        }
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_micros(self.tick_period_us)
    }
}

fn invalid(field: &'static str, reason: String) -> BridgeError {
    BridgeError::InvalidConfig { field, reason }
}
