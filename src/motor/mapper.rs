// Differential-drive motion mapping
// Converts movement intents (discrete commands or joystick axes) into per-wheel targets.

use crate::config::MAX_SPEED;
use crate::messages::{Direction, MovementIntent};

/// Target speed (duty-cycle percent) and direction for one wheel
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WheelTarget {
    pub speed: f64,
    pub direction: Direction,
}

impl WheelTarget {
    pub fn new(speed: f64, direction: Direction) -> Self {
        Self { speed, direction }
    }
}

/// Targets for both wheels
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WheelTargets {
    pub left: WheelTarget,
    pub right: WheelTarget,
}

impl WheelTargets {
    pub fn new(left: WheelTarget, right: WheelTarget) -> Self {
        Self { left, right }
    }

    /// Both wheels at (0, Stopped)
    pub fn stop() -> Self {
        Self::default()
    }

    /// True when neither wheel is commanded to turn
    pub fn is_stop(&self) -> bool {
        self.left.direction == Direction::Stopped && self.right.direction == Direction::Stopped
    }
}

/// Map an intent to wheel targets.
///
/// Malformed input (a non-finite axis or speed override) maps to a stop.
/// Values outside the nominal ranges are passed through unscaled; clamping
/// happens when the targets are applied.
pub fn map_intent(intent: &MovementIntent) -> WheelTargets {
    match *intent {
        MovementIntent::Forward { speed } => {
            discrete(speed, Direction::Forward, Direction::Forward)
        }
        MovementIntent::Backward { speed } => {
            discrete(speed, Direction::Backward, Direction::Backward)
        }
        // Spot turns: wheels at equal speed in opposite directions
        MovementIntent::TurnLeft { speed } => {
            discrete(speed, Direction::Backward, Direction::Forward)
        }
        MovementIntent::TurnRight { speed } => {
            discrete(speed, Direction::Forward, Direction::Backward)
        }
        MovementIntent::Stop => WheelTargets::stop(),
        MovementIntent::Joystick {
            left_x,
            left_y,
            right_x,
            right_y,
        } => {
            if [left_x, left_y, right_x, right_y].iter().any(|v| !v.is_finite()) {
                return WheelTargets::stop();
            }
            joystick_to_wheels(left_y, right_x)
        }
    }
}

fn discrete(speed: Option<f64>, left: Direction, right: Direction) -> WheelTargets {
    let speed = speed.unwrap_or(MAX_SPEED);
    if !speed.is_finite() {
        return WheelTargets::stop();
    }
    WheelTargets::new(WheelTarget::new(speed, left), WheelTarget::new(speed, right))
}

/// Left stick Y is throttle, right stick X is steering.
///
/// With throttle, steering slows the inner wheel by the steering fraction
/// (an arc). Without throttle, steering alone spins the robot in place:
/// the left wheel runs against the steering sign, the right wheel with it.
pub fn joystick_to_wheels(throttle: f64, steering: f64) -> WheelTargets {
    let base_speed = throttle.abs() * MAX_SPEED;
    let base_direction = Direction::from_sign(throttle);

    let steer_speed = steering.abs() * MAX_SPEED;
    let steer_direction = Direction::from_sign(steering);

    match (base_direction, steer_direction) {
        (Direction::Stopped, Direction::Stopped) => WheelTargets::stop(),
        (Direction::Stopped, steer) => WheelTargets::new(
            WheelTarget::new(steer_speed, steer.reversed()),
            WheelTarget::new(steer_speed, steer),
        ),
        (base, steer) => {
            let mut left_speed = base_speed;
            let mut right_speed = base_speed;
            let steering_factor = steer_speed / MAX_SPEED;
            match steer {
                Direction::Forward => right_speed *= 1.0 - steering_factor,
                Direction::Backward => left_speed *= 1.0 - steering_factor,
                Direction::Stopped => {}
            }
            WheelTargets::new(
                WheelTarget::new(left_speed, base),
                WheelTarget::new(right_speed, base),
            )
        }
    }
}
