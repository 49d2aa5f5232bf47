// Raspberry Pi GPIO backend (BCM numbering)
//
// Direction and indicator pins are plain outputs; the enable pins use
// rppal's software PWM at the configured frequency.

use rppal::gpio::{self, Gpio, OutputPin};
use tracing::info;

use super::pins::{Board, DigitalOutput, Level, PowerOutput, Result};

pub struct RpiBoard {
    gpio: Gpio,
}

impl RpiBoard {
    pub fn open() -> Result<Self> {
        info!("Opening GPIO");
        Ok(Self { gpio: Gpio::new()? })
    }
}

impl Board for RpiBoard {
    fn digital_output(&mut self, pin: u8) -> Result<Box<dyn DigitalOutput>> {
        let mut output = self.gpio.get(pin)?.into_output();
        output.set_low();
        Ok(Box::new(RpiOutput { output }))
    }

    fn power_output(&mut self, pin: u8, frequency_hz: f64) -> Result<Box<dyn PowerOutput>> {
        let mut output = self.gpio.get(pin)?.into_output();
        output.set_pwm_frequency(frequency_hz, 0.0)?;
        Ok(Box::new(RpiPwm {
            output,
            frequency_hz,
        }))
    }
}

struct RpiOutput {
    output: OutputPin,
}

impl DigitalOutput for RpiOutput {
    fn set_level(&mut self, level: Level) -> Result<()> {
        self.output.write(match level {
            Level::High => gpio::Level::High,
            Level::Low => gpio::Level::Low,
        });
        Ok(())
    }
}

struct RpiPwm {
    output: OutputPin,
    frequency_hz: f64,
}

impl PowerOutput for RpiPwm {
    fn set_duty_cycle(&mut self, percent: f64) -> Result<()> {
        // rppal takes the duty cycle as a fraction
        self.output
            .set_pwm_frequency(self.frequency_hz, percent / 100.0)?;
        Ok(())
    }
}

impl Drop for RpiPwm {
    fn drop(&mut self) {
        let _ = self.output.clear_pwm();
    }
}
