//! Pimoroni Inky wHAT (red) driver.
//!
//! 400 x 300 pixels, white/black/red.
//! The frame goes out as two 1-bit planes: the black/white plane (1 = not
//! black) and the red plane (1 = red), 50 bytes per row, MSB first.

use super::gpio::GpioController;
use super::spi::SpiDisplay;
use super::{Border, DisplayError, DisplaySink};
use crate::canvas::{Color, IndexedImage, HEIGHT, WIDTH};
use std::thread;
use std::time::Duration;

/// Bytes per plane row
pub const ROW_BYTES: usize = WIDTH as usize / 8;

/// Bytes per plane
pub const PLANE_SIZE: usize = ROW_BYTES * HEIGHT as usize;

mod cmd {
    pub const DRIVER_OUTPUT: u8 = 0x01;
    pub const GATE_VOLTAGE: u8 = 0x03;
    pub const SOURCE_VOLTAGE: u8 = 0x04;
    pub const DEEP_SLEEP: u8 = 0x10;
    pub const DATA_ENTRY_MODE: u8 = 0x11;
    pub const SOFT_RESET: u8 = 0x12;
    pub const MASTER_ACTIVATE: u8 = 0x20;
    pub const UPDATE_SEQUENCE: u8 = 0x22;
    pub const WRITE_BW_RAM: u8 = 0x24;
    pub const WRITE_RED_RAM: u8 = 0x26;
    pub const VCOM: u8 = 0x2C;
    pub const WRITE_LUT: u8 = 0x32;
    pub const DUMMY_LINE_PERIOD: u8 = 0x3A;
    pub const GATE_LINE_WIDTH: u8 = 0x3B;
    pub const BORDER: u8 = 0x3C;
    pub const RAM_X_RANGE: u8 = 0x44;
    pub const RAM_Y_RANGE: u8 = 0x45;
    pub const RAM_X_POINTER: u8 = 0x4E;
    pub const RAM_Y_POINTER: u8 = 0x4F;
    pub const ANALOG_BLOCK: u8 = 0x74;
    pub const DIGITAL_BLOCK: u8 = 0x7E;
}

/// Waveform for the red panel: five 7-phase voltage tables, then
/// seven rows of phase durations and repeat counts
#[rustfmt::skip]
const RED_LUT: [u8; 70] = [
    0b01001000, 0b10100000, 0b00010000, 0b00010000, 0b00010011, 0b00000000, 0b00000000,
    0b01001000, 0b10100000, 0b10000000, 0b00000000, 0b00000011, 0b00000000, 0b00000000,
    0b00000000, 0b00000000, 0b00000000, 0b00000000, 0b00000000, 0b00000000, 0b00000000,
    0b01001000, 0b10100101, 0b00000000, 0b10111011, 0b00000000, 0b00000000, 0b00000000,
    0b00000000, 0b00000000, 0b00000000, 0b00000000, 0b00000000, 0b00000000, 0b00000000,
    64, 12, 32, 12, 6,
    16,  8,  4,  4, 6,
     4,  8,  8, 16, 16,
     2,  2,  2, 64, 32,
     2,  2,  2,  2, 2,
     0,  0,  0,  0, 0,
     0,  0,  0,  0, 0,
];

impl Border {
    fn register(self) -> u8 {
        match self {
            Border::White => 0b0011_0001,
            Border::Black => 0b0000_0000,
            Border::Red => 0b0111_0011,
        }
    }
}

/// Pack a frame into the black/white and red planes
pub fn pack_planes(frame: &IndexedImage) -> Result<(Vec<u8>, Vec<u8>), DisplayError> {
    if frame.dimensions() != (WIDTH, HEIGHT) {
        return Err(DisplayError::InvalidFrameSize {
            width: frame.width(),
            height: frame.height(),
        });
    }

    let mut bw = vec![0u8; PLANE_SIZE];
    let mut red = vec![0u8; PLANE_SIZE];

    for (i, &index) in frame.indices().iter().enumerate() {
        let bit = 0x80 >> (i % 8);
        let byte = i / 8;
        // Unused palette indices render black
        match Color::from_index(index) {
            Some(Color::White) => bw[byte] |= bit,
            Some(Color::Red) => {
                bw[byte] |= bit;
                red[byte] |= bit;
            }
            Some(Color::Black) | None => {}
        }
    }

    Ok((bw, red))
}

/// Inky wHAT driver
pub struct InkyWhat {
    gpio: GpioController,
    spi: SpiDisplay,
    border: Border,
}

impl InkyWhat {
    /// Claim the GPIO and SPI lines; fails off-device
    pub fn new(border: Border) -> Result<Self, DisplayError> {
        let gpio = GpioController::new()?;
        let spi = SpiDisplay::new()?;

        Ok(Self { gpio, spi, border })
    }

    /// Reset out of deep sleep and soft-reset the controller
    fn wake(&mut self) -> Result<(), DisplayError> {
        self.gpio.reset();
        self.send(cmd::SOFT_RESET, &[])?;
        self.gpio.wait_busy()?;
        Ok(())
    }

    fn configure(&mut self) -> Result<(), DisplayError> {
        let [rows_lo, rows_hi] = (HEIGHT as u16).to_le_bytes();

        self.send(cmd::ANALOG_BLOCK, &[0x54])?;
        self.send(cmd::DIGITAL_BLOCK, &[0x3B])?;
        self.send(cmd::DRIVER_OUTPUT, &[rows_lo, rows_hi, 0x00])?;
        self.send(cmd::GATE_VOLTAGE, &[0x17])?;
        self.send(cmd::SOURCE_VOLTAGE, &[0x41, 0xAC, 0x32])?;
        self.send(cmd::DUMMY_LINE_PERIOD, &[0x07])?;
        self.send(cmd::GATE_LINE_WIDTH, &[0x04])?;
        // X and Y increment
        self.send(cmd::DATA_ENTRY_MODE, &[0x03])?;
        self.send(cmd::VCOM, &[0x3C])?;
        self.send(cmd::BORDER, &[self.border.register()])?;
        self.send(cmd::WRITE_LUT, &RED_LUT)?;
        self.send(cmd::RAM_X_RANGE, &[0x00, ROW_BYTES as u8 - 1])?;
        self.send(cmd::RAM_Y_RANGE, &[0x00, 0x00, rows_lo, rows_hi])?;
        Ok(())
    }

    fn write_plane(&mut self, ram: u8, plane: &[u8]) -> Result<(), DisplayError> {
        self.send(cmd::RAM_X_POINTER, &[0x00])?;
        self.send(cmd::RAM_Y_POINTER, &[0x00, 0x00])?;
        self.send(ram, plane)
    }

    fn send(&mut self, cmd: u8, data: &[u8]) -> Result<(), DisplayError> {
        self.spi.write_command_data(&mut self.gpio, cmd, data)?;
        Ok(())
    }
}

impl DisplaySink for InkyWhat {
    fn name(&self) -> &'static str {
        "inky-what"
    }

    fn render(&mut self, frame: &IndexedImage) -> Result<(), DisplayError> {
        let (bw, red) = pack_planes(frame)?;

        tracing::info!("Sending frame to Inky wHAT ({} bytes per plane)", bw.len());

        self.wake()?;
        self.configure()?;
        self.write_plane(cmd::WRITE_BW_RAM, &bw)?;
        self.write_plane(cmd::WRITE_RED_RAM, &red)?;

        self.send(cmd::UPDATE_SEQUENCE, &[0xC7])?;
        self.send(cmd::MASTER_ACTIVATE, &[])?;
        thread::sleep(Duration::from_millis(50));
        self.gpio.wait_busy()?;

        self.send(cmd::DEEP_SLEEP, &[0x01])?;
        tracing::info!("Display refresh complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_white_frame_planes() {
        let (bw, red) = pack_planes(&IndexedImage::panel(Color::White)).unwrap();
        assert_eq!(bw.len(), PLANE_SIZE);
        assert!(bw.iter().all(|&b| b == 0xFF));
        assert!(red.iter().all(|&b| b == 0x00));
    }

    #[test]
    fn test_pixel_bits_are_msb_first() {
        let mut frame = IndexedImage::panel(Color::Black);
        frame.put(0, 0, Color::Red);
        frame.put(9, 0, Color::White);
        frame.put(7, 1, Color::Red);

        let (bw, red) = pack_planes(&frame).unwrap();
        assert_eq!(bw[0], 0b1000_0000);
        assert_eq!(bw[1], 0b0100_0000);
        assert_eq!(red[0], 0b1000_0000);
        assert_eq!(red[1], 0);
        assert_eq!(red[ROW_BYTES], 0b0000_0001);
        assert_eq!(bw[ROW_BYTES], 0b0000_0001);
    }

    #[test]
    fn test_wrong_size_frame_is_rejected() {
        let frame = IndexedImage::filled(200, 100, Color::White);
        assert!(matches!(
            pack_planes(&frame),
            Err(DisplayError::InvalidFrameSize { width: 200, height: 100 })
        ));
    }
}
