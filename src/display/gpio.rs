//! Control lines of the Inky wHAT (BCM numbering): reset on 27,
//! data/command select on 22, busy on 17.

use rppal::gpio::{Gpio, InputPin, Level, OutputPin};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

pub mod pins {
    pub const RST: u8 = 27;
    pub const DC: u8 = 22;
    pub const BUSY: u8 = 17;
}

/// A red refresh runs for well over ten seconds
const BUSY_TIMEOUT: Duration = Duration::from_secs(45);
const BUSY_POLL: Duration = Duration::from_millis(10);
const RESET_HOLD: Duration = Duration::from_millis(500);

#[derive(Error, Debug)]
pub enum GpioError {
    #[error("Cannot claim panel pins: {0}")]
    InitError(#[from] rppal::gpio::Error),

    #[error("Panel still busy after {0}ms")]
    BusyTimeout(u64),
}

/// Owns the three control pins while a frame is pushed
pub struct GpioController {
    rst: OutputPin,
    dc: OutputPin,
    busy: InputPin,
}

impl GpioController {
    pub fn new() -> Result<Self, GpioError> {
        let gpio = Gpio::new()?;
        let controller = Self {
            rst: gpio.get(pins::RST)?.into_output_high(),
            dc: gpio.get(pins::DC)?.into_output_low(),
            busy: gpio.get(pins::BUSY)?.into_input(),
        };
        tracing::debug!("Panel pins claimed (rst {}, dc {}, busy {})", pins::RST, pins::DC, pins::BUSY);
        Ok(controller)
    }

    /// Pulse RST; the controller needs it to leave deep sleep
    pub fn reset(&mut self) {
        self.rst.set_low();
        thread::sleep(RESET_HOLD);
        self.rst.set_high();
        thread::sleep(RESET_HOLD);
    }

    /// Block while BUSY is held high
    pub fn wait_busy(&self) -> Result<(), GpioError> {
        let start = Instant::now();
        while self.busy.read() == Level::High {
            if start.elapsed() > BUSY_TIMEOUT {
                return Err(GpioError::BusyTimeout(BUSY_TIMEOUT.as_millis() as u64));
            }
            thread::sleep(BUSY_POLL);
        }
        tracing::trace!("Panel ready after {:?}", start.elapsed());
        Ok(())
    }

    /// Next bytes are a command
    #[inline]
    pub fn dc_low(&mut self) {
        self.dc.set_low();
    }

    /// Next bytes are data
    #[inline]
    pub fn dc_high(&mut self) {
        self.dc.set_high();
    }
}
