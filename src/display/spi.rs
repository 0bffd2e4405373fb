//! SPI link to the panel controller: SPI0, CE0, mode 0.

use super::gpio::GpioController;
use rppal::spi::{Bus, Mode, SlaveSelect, Spi};
use thiserror::Error;

/// Clock used by the vendor driver for this controller
pub const CLOCK_SPEED: u32 = 488_000;

/// spidev refuses transfers above its buffer size
const CHUNK_SIZE: usize = 4096;

#[derive(Error, Debug)]
pub enum SpiError {
    #[error("Cannot open SPI0: {0}")]
    InitError(rppal::spi::Error),

    #[error("SPI transfer failed: {0}")]
    WriteError(rppal::spi::Error),
}

pub struct SpiDisplay {
    spi: Spi,
}

impl SpiDisplay {
    pub fn new() -> Result<Self, SpiError> {
        let spi = Spi::new(Bus::Spi0, SlaveSelect::Ss0, CLOCK_SPEED, Mode::Mode0)
            .map_err(SpiError::InitError)?;
        tracing::debug!("SPI0 open at {} Hz", CLOCK_SPEED);
        Ok(Self { spi })
    }

    /// Send `cmd` with DC low, then `data` (if any) with DC high
    pub fn write_command_data(
        &mut self,
        gpio: &mut GpioController,
        cmd: u8,
        data: &[u8],
    ) -> Result<(), SpiError> {
        gpio.dc_low();
        self.send(&[cmd])?;

        if !data.is_empty() {
            gpio.dc_high();
            data.chunks(CHUNK_SIZE).try_for_each(|chunk| self.send(chunk))?;
        }
        Ok(())
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), SpiError> {
        self.spi.write(bytes).map(|_| ()).map_err(SpiError::WriteError)
    }
}
