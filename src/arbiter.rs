// Command arbiter: the only write path into the actuator state
//
// Every wheel write happens under one lock, and the hardware write happens
// before that lock is released, so a status read never sees a value that
// was not sent to the motors. The emergency-stop flag lives under the same
// lock and is checked on every write.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::{MAX_SPEED, MIN_SPEED};
use crate::error::DriveError;
use crate::indicator::IndicatorController;
use crate::messages::{Direction, StatusSnapshot, Wheel};
use crate::motor::MotorDriver;

/// Clamp a requested speed into [MIN_SPEED, MAX_SPEED]. NaN becomes MIN_SPEED.
pub fn clamp_speed(speed: f64) -> f64 {
    if speed.is_nan() {
        MIN_SPEED
    } else {
        speed.clamp(MIN_SPEED, MAX_SPEED)
    }
}

/// Whether a wheel write reached the motor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Applied,
    /// Emergency stop was active; the robot was stopped instead
    Overridden,
}

#[derive(Debug, Clone, Copy, Default)]
struct WheelState {
    speed: f64,
    direction: Direction,
}

#[derive(Debug, Default)]
struct ActuatorState {
    wheels: [WheelState; 2],
    emergency_stopped: bool,
}

impl ActuatorState {
    fn snapshot(&self) -> StatusSnapshot {
        let [left, right] = self.wheels;
        StatusSnapshot {
            left_speed: left.speed,
            right_speed: right.speed,
            left_direction: left.direction,
            right_direction: right.direction,
            emergency_stopped: self.emergency_stopped,
        }
    }
}

struct Actuators {
    state: ActuatorState,
    drivers: [MotorDriver; 2],
}

impl Actuators {
    /// Record and send (0, Stopped) on both wheels.
    /// Both drivers are attempted even if the first fails.
    fn halt(&mut self) -> Result<(), DriveError> {
        let mut result = Ok(());
        for wheel in Wheel::ALL {
            self.state.wheels[wheel.index()] = WheelState::default();
            if let Err(source) = self.drivers[wheel.index()].drive(0.0, Direction::Stopped) {
                warn!("Failed to stop {} motor: {}", wheel, source);
                if result.is_ok() {
                    result = Err(DriveError::Driver { wheel, source });
                }
            }
        }
        result
    }
}

pub struct CommandArbiter {
    actuators: Mutex<Actuators>,
    indicators: Arc<IndicatorController>,
}

impl CommandArbiter {
    pub fn new(
        left: MotorDriver,
        right: MotorDriver,
        indicators: Arc<IndicatorController>,
    ) -> Self {
        debug_assert_eq!(left.wheel(), Wheel::Left);
        debug_assert_eq!(right.wheel(), Wheel::Right);
        Self {
            actuators: Mutex::new(Actuators {
                state: ActuatorState::default(),
                drivers: [left, right],
            }),
            indicators,
        }
    }

    /// Set one wheel's speed and direction.
    ///
    /// With the emergency stop active the request is discarded and the
    /// robot is stopped instead. On a driver failure the attempted values
    /// stay recorded and the error is returned; nothing is retried.
    pub fn set_wheel_target(
        &self,
        wheel: Wheel,
        speed: f64,
        direction: Direction,
    ) -> Result<WriteOutcome, DriveError> {
        let mut actuators = self.actuators.lock();
        if actuators.state.emergency_stopped {
            debug!("Emergency stop active, discarding {} wheel command", wheel);
            let result = actuators.halt();
            drop(actuators);
            self.indicators_off();
            return result.map(|()| WriteOutcome::Overridden);
        }

        let speed = clamp_speed(speed);
        actuators.state.wheels[wheel.index()] = WheelState { speed, direction };
        actuators.drivers[wheel.index()]
            .drive(speed, direction)
            .map_err(|source| DriveError::Driver { wheel, source })?;
        Ok(WriteOutcome::Applied)
    }

    /// Stop both wheels and switch the indicators off
    pub fn stop_all(&self) -> Result<(), DriveError> {
        let result = self.actuators.lock().halt();
        self.indicators_off();
        result
    }

    /// Latch the emergency stop and halt immediately
    pub fn activate_emergency_stop(&self) -> Result<(), DriveError> {
        let result = {
            let mut actuators = self.actuators.lock();
            actuators.state.emergency_stopped = true;
            actuators.halt()
        };
        warn!("EMERGENCY STOP ACTIVATED");
        self.indicators_off();
        result
    }

    /// Clear the emergency stop. The robot stays stopped until the next command.
    pub fn reset_emergency_stop(&self) {
        self.actuators.lock().state.emergency_stopped = false;
        info!("Emergency stop reset");
    }

    pub fn status(&self) -> StatusSnapshot {
        self.actuators.lock().state.snapshot()
    }

    // Lights are cosmetic: a failure here never fails a stop.
    // A live blink is left running.
    fn indicators_off(&self) {
        if let Err(e) = self.indicators.follow_motion(false) {
            warn!("Failed to switch indicators off: {}", e);
        }
    }
}

impl Drop for CommandArbiter {
    fn drop(&mut self) {
        // Try to stop motors when the arbiter is dropped (safety measure)
        if let Err(e) = self.actuators.get_mut().halt() {
            warn!("Failed to stop motors on drop: {}", e);
        }
    }
}
