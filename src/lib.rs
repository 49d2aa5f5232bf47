// Differential-drive actuation core for a two-wheeled rover
//
// Movement intents -> motion mapper -> command arbiter (e-stop gate) -> motor drivers,
// with front/back status indicators following the motion state.

pub mod arbiter;
pub mod config;
pub mod controller;
pub mod error;
pub mod indicator;
pub mod messages;
pub mod motor;
pub mod runtime;

pub use controller::DriveController;
pub use error::{DriveError, InitError};
pub use messages::{Direction, Indicator, MovementIntent, StatusSnapshot, Wheel};
