// Error types for the drive core

use crate::messages::Wheel;
use crate::motor::HardwareError;

/// A motion command could not be delivered to the hardware.
///
/// The actuator state still records what was attempted, so a status read
/// after a failure shows the command that was in flight.
#[derive(Debug, thiserror::Error)]
pub enum DriveError {
    #[error("{wheel} wheel driver write failed: {source}")]
    Driver {
        wheel: Wheel,
        #[source]
        source: HardwareError,
    },
}

/// Startup failed before the controller was usable
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("Hardware setup failed: {0}")]
    Hardware(#[from] HardwareError),

    #[error("No tokio runtime available for indicator tasks")]
    NoRuntime,

    #[error("Failed to read config {path}: {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    ConfigParse(#[from] serde_json::Error),
}
