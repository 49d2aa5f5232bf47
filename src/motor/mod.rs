// Motor control module for the two-wheeled base
//
// Provides:
// - Differential-drive motion mapping (intent -> wheel targets)
// - H-bridge driver per wheel
// - Output pin abstraction with simulated and Raspberry Pi backends

mod driver;
#[cfg(feature = "rpi")]
pub mod gpio;
pub mod mapper;
pub mod pins;

pub use driver::{MotorDriver, direction_levels, power_level};
#[cfg(feature = "rpi")]
pub use gpio::RpiBoard;
pub use mapper::{WheelTarget, WheelTargets, joystick_to_wheels, map_intent};
pub use pins::{Board, DigitalOutput, HardwareError, Level, PinWrite, PowerOutput, SimBoard};
