// H-bridge driver for one wheel
//
// Translates a (speed, direction) pair into the two direction-select
// levels and the PWM duty cycle of one L298N-style channel.

use tracing::{debug, info};

use super::pins::{Board, DigitalOutput, Level, PowerOutput, Result};
use crate::config::MotorPins;
use crate::messages::{Direction, Wheel};

/// Direction-select levels (in_a, in_b) for a direction.
/// Forward and backward are complementary; stopped drives both low.
pub fn direction_levels(direction: Direction) -> (Level, Level) {
    match direction {
        Direction::Forward => (Level::High, Level::Low),
        Direction::Backward => (Level::Low, Level::High),
        Direction::Stopped => (Level::Low, Level::Low),
    }
}

/// Duty cycle sent to the enable pin. Stopped always means no power.
pub fn power_level(speed: f64, direction: Direction) -> f64 {
    match direction {
        Direction::Stopped => 0.0,
        _ => speed,
    }
}

pub struct MotorDriver {
    wheel: Wheel,
    in_a: Box<dyn DigitalOutput>,
    in_b: Box<dyn DigitalOutput>,
    enable: Box<dyn PowerOutput>,
}

impl MotorDriver {
    pub fn new(
        wheel: Wheel,
        in_a: Box<dyn DigitalOutput>,
        in_b: Box<dyn DigitalOutput>,
        enable: Box<dyn PowerOutput>,
    ) -> Self {
        Self {
            wheel,
            in_a,
            in_b,
            enable,
        }
    }

    /// Claim the channel's pins and leave the motor stopped
    pub fn open(
        board: &mut dyn Board,
        wheel: Wheel,
        pins: &MotorPins,
        frequency_hz: f64,
    ) -> Result<Self> {
        info!(
            "Setting up {} motor: enable={}, in_a={}, in_b={}",
            wheel, pins.enable, pins.in_a, pins.in_b
        );
        let in_a = board.digital_output(pins.in_a)?;
        let in_b = board.digital_output(pins.in_b)?;
        let enable = board.power_output(pins.enable, frequency_hz)?;

        let mut driver = Self::new(wheel, in_a, in_b, enable);
        driver.drive(0.0, Direction::Stopped)?;
        Ok(driver)
    }

    /// Drive the channel.
    ///
    /// `speed` is a duty-cycle percentage and is passed through as-is; the
    /// caller is responsible for clamping it.
    pub fn drive(&mut self, speed: f64, direction: Direction) -> Result<()> {
        let (a, b) = direction_levels(direction);
        let duty = power_level(speed, direction);
        debug!(
            "Driving {} motor: direction={:?}, duty={}",
            self.wheel, direction, duty
        );

        self.in_a.set_level(a)?;
        self.in_b.set_level(b)?;
        self.enable.set_duty_cycle(duty)
    }

    pub fn wheel(&self) -> Wheel {
        self.wheel
    }
}
