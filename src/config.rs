// Speed bounds, pin assignment, timeouts, topics
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::InitError;

// Speed is a duty-cycle percentage
pub const MIN_SPEED: f64 = 0.0;
pub const MAX_SPEED: f64 = 100.0;

// Motor driver pins (BCM numbering)
pub const LEFT_ENABLE_PIN: u8 = 17; // PWM
pub const LEFT_IN1_PIN: u8 = 27;
pub const LEFT_IN2_PIN: u8 = 22;
pub const RIGHT_ENABLE_PIN: u8 = 18; // PWM
pub const RIGHT_IN3_PIN: u8 = 23;
pub const RIGHT_IN4_PIN: u8 = 24;

// Indicator pins
pub const FRONT_INDICATOR_PIN: u8 = 20;
pub const BACK_INDICATOR_PIN: u8 = 12;

// PWM frequency for the enable pins
pub const PWM_FREQUENCY_HZ: f64 = 1000.0;

// Half-cycle of the indicator blink
pub const BLINK_INTERVAL: Duration = Duration::from_millis(500);

// Runtime loop frequency
pub const LOOP_HZ: u64 = 50;

// Command timeout for watchdog
pub const CMD_TIMEOUT: Duration = Duration::from_millis(500);

// Zenoh topics
pub const TOPIC_CMD_DRIVE: &str = "rover/cmd/drive"; // movement intents
pub const TOPIC_CMD_SAFETY: &str = "rover/cmd/safety"; // emergency stop / reset
pub const TOPIC_CMD_INDICATOR: &str = "rover/cmd/indicator"; // blink control
pub const TOPIC_STATE_DRIVE: &str = "rover/state/drive"; // status snapshot
pub const TOPIC_HEALTH: &str = "rover/state/health"; // health status

/// Pins of one H-bridge channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct MotorPins {
    /// Power level (PWM duty cycle)
    pub enable: u8,
    /// Direction select, high for forward
    pub in_a: u8,
    /// Direction select, high for backward
    pub in_b: u8,
}

/// Hardware layout and timing of the drive base.
///
/// Every field falls back to the constants above, so a config file only
/// needs to name what differs from the stock wiring.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    pub left: MotorPins,
    pub right: MotorPins,
    pub front_indicator: u8,
    pub back_indicator: u8,
    pub pwm_frequency_hz: f64,
    pub blink_interval_ms: u64,
    pub cmd_timeout_ms: u64,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            left: MotorPins {
                enable: LEFT_ENABLE_PIN,
                in_a: LEFT_IN1_PIN,
                in_b: LEFT_IN2_PIN,
            },
            right: MotorPins {
                enable: RIGHT_ENABLE_PIN,
                in_a: RIGHT_IN3_PIN,
                in_b: RIGHT_IN4_PIN,
            },
            front_indicator: FRONT_INDICATOR_PIN,
            back_indicator: BACK_INDICATOR_PIN,
            pwm_frequency_hz: PWM_FREQUENCY_HZ,
            blink_interval_ms: BLINK_INTERVAL.as_millis() as u64,
            cmd_timeout_ms: CMD_TIMEOUT.as_millis() as u64,
        }
    }
}

impl DriveConfig {
    /// Load a JSON config file
    pub fn load(path: &Path) -> Result<Self, InitError> {
        let raw = std::fs::read_to_string(path).map_err(|source| InitError::ConfigRead {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, InitError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn blink_interval(&self) -> Duration {
        Duration::from_millis(self.blink_interval_ms)
    }

    pub fn cmd_timeout(&self) -> Duration {
        Duration::from_millis(self.cmd_timeout_ms)
    }
}
