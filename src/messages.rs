// Define message types for the drive core and its runtime

use std::fmt;

use serde::{Deserialize, Serialize};

/// One side of the differential drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Wheel {
    Left,
    Right,
}

impl Wheel {
    pub const ALL: [Wheel; 2] = [Wheel::Left, Wheel::Right];

    /// Slot in wheel-indexed arrays
    pub fn index(self) -> usize {
        match self {
            Wheel::Left => 0,
            Wheel::Right => 1,
        }
    }
}

impl fmt::Display for Wheel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Wheel::Left => f.write_str("left"),
            Wheel::Right => f.write_str("right"),
        }
    }
}

/// Commanded rotation of a wheel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Backward,
    #[default]
    Stopped,
}

impl Direction {
    /// Direction from the sign of an axis value; zero (and NaN) is Stopped
    pub fn from_sign(value: f64) -> Self {
        if value > 0.0 {
            Direction::Forward
        } else if value < 0.0 {
            Direction::Backward
        } else {
            Direction::Stopped
        }
    }

    pub fn reversed(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
            Direction::Stopped => Direction::Stopped,
        }
    }
}

/// Status light position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Indicator {
    Front,
    Back,
}

impl Indicator {
    pub fn index(self) -> usize {
        match self {
            Indicator::Front => 0,
            Indicator::Back => 1,
        }
    }
}

// Movement request from teleop/front-end -> core
// Discrete commands carry an optional speed override (percent), joystick axes are in [-1, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum MovementIntent {
    Forward {
        #[serde(default)]
        speed: Option<f64>,
    },
    Backward {
        #[serde(default)]
        speed: Option<f64>,
    },
    TurnLeft {
        #[serde(default)]
        speed: Option<f64>,
    },
    TurnRight {
        #[serde(default)]
        speed: Option<f64>,
    },
    Stop,
    Joystick {
        #[serde(default)]
        left_x: f64,
        #[serde(default)]
        left_y: f64,
        #[serde(default)]
        right_x: f64,
        #[serde(default)]
        right_y: f64,
    },
}

impl MovementIntent {
    /// Resolve a front-end action name ("forward", "left", ...).
    /// Unknown names resolve to Stop so a bad request never moves the robot.
    pub fn from_action(action: &str, speed: Option<f64>) -> Self {
        match action.trim().to_ascii_lowercase().as_str() {
            "forward" => MovementIntent::Forward { speed },
            "backward" => MovementIntent::Backward { speed },
            "left" | "turn_left" => MovementIntent::TurnLeft { speed },
            "right" | "turn_right" => MovementIntent::TurnRight { speed },
            _ => MovementIntent::Stop,
        }
    }

    pub fn joystick(left_x: f64, left_y: f64, right_x: f64, right_y: f64) -> Self {
        MovementIntent::Joystick {
            left_x,
            left_y,
            right_x,
            right_y,
        }
    }
}

// Front-end button payload: {"action": "forward", "speed": 50}
#[derive(Debug, Clone, Deserialize)]
pub struct ActionRequest {
    pub action: String,
    #[serde(default)]
    pub speed: Option<f64>,
}

impl From<&ActionRequest> for MovementIntent {
    fn from(req: &ActionRequest) -> Self {
        MovementIntent::from_action(&req.action, req.speed)
    }
}

/// Read-only view of the actuator state
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub left_speed: f64,
    pub right_speed: f64,
    pub left_direction: Direction,
    pub right_direction: Direction,
    pub emergency_stopped: bool,
}

impl StatusSnapshot {
    /// True when no wheel is commanded to turn
    pub fn is_stopped(&self) -> bool {
        self.left_direction == Direction::Stopped && self.right_direction == Direction::Stopped
    }
}

/// Safety commands from operator surfaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum SafetyCommand {
    EmergencyStop,
    Reset,
}

/// Indicator commands from operator surfaces
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum IndicatorCommand {
    StartBlink {
        indicator: Indicator,
        #[serde(default)]
        interval_ms: Option<u64>,
    },
    StopBlink {
        indicator: Indicator,
    },
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    CmdStale,
    EmergencyStopped,
    HardwareFault,
}
