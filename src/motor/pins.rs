// Hardware signal sink
//
// The drive core only ever asks for two things from the hardware:
// - set a digital output to a level (direction select, indicators)
// - set a PWM output to a duty cycle (motor power)
//
// `SimBoard` keeps those writes in memory for simulation and tests.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

/// Logic level of a digital output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

impl From<bool> for Level {
    fn from(on: bool) -> Self {
        if on { Level::High } else { Level::Low }
    }
}

/// Error types for output writes
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    #[error("Write to pin {pin} failed: {reason}")]
    Write { pin: u8, reason: String },

    #[error("Pin {pin} is already claimed")]
    PinBusy { pin: u8 },

    #[cfg(feature = "rpi")]
    #[error("GPIO error: {0}")]
    Gpio(#[from] rppal::gpio::Error),
}

pub type Result<T> = std::result::Result<T, HardwareError>;

/// A single digital output pin
pub trait DigitalOutput: Send {
    fn set_level(&mut self, level: Level) -> Result<()>;
}

/// A PWM output driven as a duty-cycle percentage in [0, 100]
pub trait PowerOutput: Send {
    fn set_duty_cycle(&mut self, percent: f64) -> Result<()>;
}

/// Source of output pins (GPIO header, simulator)
pub trait Board {
    fn digital_output(&mut self, pin: u8) -> Result<Box<dyn DigitalOutput>>;
    fn power_output(&mut self, pin: u8, frequency_hz: f64) -> Result<Box<dyn PowerOutput>>;
}

/// One recorded write on the simulated board
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PinWrite {
    Level { pin: u8, level: Level },
    Duty { pin: u8, percent: f64 },
}

impl PinWrite {
    pub fn pin(&self) -> u8 {
        match *self {
            PinWrite::Level { pin, .. } | PinWrite::Duty { pin, .. } => pin,
        }
    }
}

#[derive(Debug, Default)]
struct SimState {
    claimed: HashSet<u8>,
    levels: HashMap<u8, Level>,
    duty: HashMap<u8, f64>,
    writes: Vec<PinWrite>,
    failing: HashSet<u8>,
}

/// In-memory board. Clones share the same pin state.
#[derive(Debug, Clone, Default)]
pub struct SimBoard {
    state: Arc<Mutex<SimState>>,
}

impl SimBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current level of a digital pin, None if never written
    pub fn level(&self, pin: u8) -> Option<Level> {
        self.state.lock().levels.get(&pin).copied()
    }

    /// Current duty cycle of a PWM pin, None if never written
    pub fn duty_cycle(&self, pin: u8) -> Option<f64> {
        self.state.lock().duty.get(&pin).copied()
    }

    /// Every write so far, oldest first
    pub fn writes(&self) -> Vec<PinWrite> {
        self.state.lock().writes.clone()
    }

    /// Number of writes to one pin
    pub fn write_count(&self, pin: u8) -> usize {
        self.state.lock().writes.iter().filter(|w| w.pin() == pin).count()
    }

    pub fn clear_writes(&self) {
        self.state.lock().writes.clear();
    }

    /// Make every later write to `pin` fail
    pub fn fail_pin(&self, pin: u8) {
        self.state.lock().failing.insert(pin);
    }

    pub fn restore_pin(&self, pin: u8) {
        self.state.lock().failing.remove(&pin);
    }

    fn claim(&self, pin: u8) -> Result<SimOutput> {
        let mut state = self.state.lock();
        if !state.claimed.insert(pin) {
            return Err(HardwareError::PinBusy { pin });
        }
        debug!("Claimed simulated pin {}", pin);
        Ok(SimOutput {
            pin,
            board: self.clone(),
        })
    }

    fn record(&self, write: PinWrite) -> Result<()> {
        let mut state = self.state.lock();
        let pin = write.pin();
        if state.failing.contains(&pin) {
            return Err(HardwareError::Write {
                pin,
                reason: "injected failure".to_string(),
            });
        }
        match write {
            PinWrite::Level { level, .. } => {
                state.levels.insert(pin, level);
            }
            PinWrite::Duty { percent, .. } => {
                state.duty.insert(pin, percent);
            }
        }
        state.writes.push(write);
        Ok(())
    }
}

impl Board for SimBoard {
    fn digital_output(&mut self, pin: u8) -> Result<Box<dyn DigitalOutput>> {
        Ok(Box::new(self.claim(pin)?))
    }

    fn power_output(&mut self, pin: u8, _frequency_hz: f64) -> Result<Box<dyn PowerOutput>> {
        Ok(Box::new(self.claim(pin)?))
    }
}

/// A pin handed out by `SimBoard`
#[derive(Debug)]
pub struct SimOutput {
    pin: u8,
    board: SimBoard,
}

impl DigitalOutput for SimOutput {
    fn set_level(&mut self, level: Level) -> Result<()> {
        self.board.record(PinWrite::Level {
            pin: self.pin,
            level,
        })
    }
}

impl PowerOutput for SimOutput {
    fn set_duty_cycle(&mut self, percent: f64) -> Result<()> {
        self.board.record(PinWrite::Duty {
            pin: self.pin,
            percent,
        })
    }
}
