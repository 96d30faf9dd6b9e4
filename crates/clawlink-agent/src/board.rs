//! # Board Abstraction
//!
//! Peripheral access used by the built-in tools. Each method is a single
//! side-effecting hardware operation with primitive arguments; the tools
//! layer owns parameter handling and result shaping.
//!
//! [`SimulatedBoard`] models an RP2040 closely enough to drive the whole
//! protocol without hardware:
//!
//! | Peripheral | Model |
//! |------------|-------|
//! | GPIO | pins 0–29, output latch plus settable input level |
//! | PWM | frequency and duty per pin |
//! | ADC | channels 0–4 with settable 16-bit readings |
//! | I2C | devices with 256-byte register files |
//! | SPI | loopback: bytes written are read back |

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use crate::registry::ToolError;

const ADC_CHANNEL_COUNT: usize = 5;

/// Board shared between tool handlers.
pub type SharedBoard = Arc<Mutex<dyn Board>>;

/// Lock a shared board, recovering from a poisoned lock.
pub fn lock_board(board: &SharedBoard) -> MutexGuard<'_, dyn Board + 'static> {
    board.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    Input,
    Output,
}

impl PinMode {
    pub fn parse(mode: &str) -> Option<Self> {
        match mode {
            "input" => Some(Self::Input),
            "output" => Some(Self::Output),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct I2cBus {
    pub scl: u8,
    pub sda: u8,
    pub frequency: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpiBus {
    pub sck: u8,
    pub mosi: u8,
    pub miso: u8,
    pub frequency: u32,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BoardError {
    #[error("invalid pin {0}")]
    InvalidPin(u8),

    #[error("invalid ADC channel {0}")]
    InvalidAdcChannel(u8),

    #[error("duty cycle {0} outside 0.0..=1.0")]
    InvalidDuty(f64),

    #[error("PWM frequency must be non-zero")]
    InvalidFrequency,

    #[error("no I2C device at {0:#x}")]
    I2cNoDevice(u8),

    #[error("{0}")]
    Hardware(String),
}

impl From<BoardError> for ToolError {
    fn from(error: BoardError) -> Self {
        ToolError::execution(error)
    }
}

/// Peripheral operations of a microcontroller board.
pub trait Board: Send {
    fn name(&self) -> &str;

    fn gpio_mode(&mut self, pin: u8, mode: PinMode) -> Result<(), BoardError>;
    fn gpio_write(&mut self, pin: u8, high: bool) -> Result<(), BoardError>;
    fn gpio_read(&mut self, pin: u8) -> Result<bool, BoardError>;

    fn pwm_start(&mut self, pin: u8, frequency: u32, duty: f64) -> Result<(), BoardError>;
    fn pwm_set_duty(&mut self, pin: u8, duty: f64) -> Result<(), BoardError>;
    fn pwm_stop(&mut self, pin: u8) -> Result<(), BoardError>;

    /// Raw reading scaled to 16 bits.
    fn adc_read_u16(&mut self, channel: u8) -> Result<u16, BoardError>;

    fn i2c_scan(&mut self, bus: I2cBus) -> Result<Vec<u8>, BoardError>;
    fn i2c_read(
        &mut self,
        bus: I2cBus,
        address: u8,
        register: u8,
        length: usize,
    ) -> Result<Vec<u8>, BoardError>;
    fn i2c_write(
        &mut self,
        bus: I2cBus,
        address: u8,
        register: u8,
        data: &[u8],
    ) -> Result<usize, BoardError>;

    fn spi_read(&mut self, bus: SpiBus, length: usize) -> Result<Vec<u8>, BoardError>;
    fn spi_write(&mut self, bus: SpiBus, data: &[u8]) -> Result<usize, BoardError>;

    /// CPU clock in Hz.
    fn cpu_frequency(&self) -> u32;
    fn mem_free(&self) -> u64;
    fn reset(&mut self) -> Result<(), BoardError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PwmChannel {
    pub frequency: u32,
    pub duty: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct PinState {
    mode: Option<PinMode>,
    output: bool,
    input: bool,
}

/// In-memory RP2040 stand-in.
#[derive(Debug, Clone)]
pub struct SimulatedBoard {
    name: String,
    pins: HashMap<u8, PinState>,
    pwm: HashMap<u8, PwmChannel>,
    adc: [u16; ADC_CHANNEL_COUNT],
    i2c_devices: BTreeMap<u8, Vec<u8>>,
    spi_loopback: VecDeque<u8>,
    reset_count: u32,
}

impl Default for SimulatedBoard {
    fn default() -> Self {
        Self::new("RP2040")
    }
}

impl SimulatedBoard {
    pub const GPIO_PINS: u8 = 30;
    pub const ADC_CHANNELS: u8 = ADC_CHANNEL_COUNT as u8;
    const CPU_FREQUENCY: u32 = 125_000_000;
    const MEM_FREE: u64 = 192 * 1024;
    const SPI_IDLE: u8 = 0xFF;

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pins: HashMap::new(),
            pwm: HashMap::new(),
            adc: [0; ADC_CHANNEL_COUNT],
            i2c_devices: BTreeMap::new(),
            spi_loopback: VecDeque::new(),
            reset_count: 0,
        }
    }

    pub fn shared(self) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(self))
    }

    /// Level seen by `gpio_read` on a pin configured as input.
    pub fn set_input(&mut self, pin: u8, high: bool) -> Result<(), BoardError> {
        Self::check_pin(pin)?;
        self.pins.entry(pin).or_default().input = high;
        Ok(())
    }

    pub fn set_adc(&mut self, channel: u8, raw: u16) -> Result<(), BoardError> {
        *self.adc_slot(channel)? = raw;
        Ok(())
    }

    /// Attach an I2C device with a zeroed register file.
    pub fn add_i2c_device(&mut self, address: u8) {
        self.i2c_devices.entry(address).or_insert_with(|| vec![0; 256]);
    }

    pub fn i2c_register(&self, address: u8, register: u8) -> Option<u8> {
        self.i2c_devices
            .get(&address)
            .map(|registers| registers[usize::from(register)])
    }

    pub fn output_level(&self, pin: u8) -> Option<bool> {
        self.pins
            .get(&pin)
            .filter(|state| state.mode == Some(PinMode::Output))
            .map(|state| state.output)
    }

    pub fn pwm_channel(&self, pin: u8) -> Option<PwmChannel> {
        self.pwm.get(&pin).copied()
    }

    pub fn reset_count(&self) -> u32 {
        self.reset_count
    }

    fn check_pin(pin: u8) -> Result<(), BoardError> {
        if pin < Self::GPIO_PINS {
            Ok(())
        } else {
            Err(BoardError::InvalidPin(pin))
        }
    }

    fn check_duty(duty: f64) -> Result<(), BoardError> {
        if (0.0..=1.0).contains(&duty) {
            Ok(())
        } else {
            Err(BoardError::InvalidDuty(duty))
        }
    }

    fn adc_slot(&mut self, channel: u8) -> Result<&mut u16, BoardError> {
        self.adc
            .get_mut(usize::from(channel))
            .ok_or(BoardError::InvalidAdcChannel(channel))
    }

    fn check_i2c(&self, bus: I2cBus, address: u8) -> Result<&Vec<u8>, BoardError> {
        Self::check_pin(bus.scl)?;
        Self::check_pin(bus.sda)?;
        self.i2c_devices
            .get(&address)
            .ok_or(BoardError::I2cNoDevice(address))
    }

    fn check_spi(bus: SpiBus) -> Result<(), BoardError> {
        Self::check_pin(bus.sck)?;
        Self::check_pin(bus.mosi)?;
        Self::check_pin(bus.miso)
    }
}

impl Board for SimulatedBoard {
    fn name(&self) -> &str {
        &self.name
    }

    fn gpio_mode(&mut self, pin: u8, mode: PinMode) -> Result<(), BoardError> {
        Self::check_pin(pin)?;
        self.pins.entry(pin).or_default().mode = Some(mode);
        Ok(())
    }

    fn gpio_write(&mut self, pin: u8, high: bool) -> Result<(), BoardError> {
        Self::check_pin(pin)?;
        let state = self.pins.entry(pin).or_default();
        state.mode = Some(PinMode::Output);
        state.output = high;
        Ok(())
    }

    fn gpio_read(&mut self, pin: u8) -> Result<bool, BoardError> {
        Self::check_pin(pin)?;
        let state = self.pins.entry(pin).or_default();
        Ok(match state.mode {
            Some(PinMode::Output) => state.output,
            _ => state.input,
        })
    }

    fn pwm_start(&mut self, pin: u8, frequency: u32, duty: f64) -> Result<(), BoardError> {
        Self::check_pin(pin)?;
        Self::check_duty(duty)?;
        if frequency == 0 {
            return Err(BoardError::InvalidFrequency);
        }
        self.pwm.insert(pin, PwmChannel { frequency, duty });
        Ok(())
    }

    fn pwm_set_duty(&mut self, pin: u8, duty: f64) -> Result<(), BoardError> {
        Self::check_pin(pin)?;
        Self::check_duty(duty)?;
        self.pwm
            .entry(pin)
            .or_insert(PwmChannel {
                frequency: 1000,
                duty,
            })
            .duty = duty;
        Ok(())
    }

    fn pwm_stop(&mut self, pin: u8) -> Result<(), BoardError> {
        Self::check_pin(pin)?;
        self.pwm.remove(&pin);
        Ok(())
    }

    fn adc_read_u16(&mut self, channel: u8) -> Result<u16, BoardError> {
        self.adc_slot(channel).map(|raw| *raw)
    }

    fn i2c_scan(&mut self, bus: I2cBus) -> Result<Vec<u8>, BoardError> {
        Self::check_pin(bus.scl)?;
        Self::check_pin(bus.sda)?;
        Ok(self.i2c_devices.keys().copied().collect())
    }

    fn i2c_read(
        &mut self,
        bus: I2cBus,
        address: u8,
        register: u8,
        length: usize,
    ) -> Result<Vec<u8>, BoardError> {
        let registers = self.check_i2c(bus, address)?;
        Ok((0..length)
            .map(|offset| registers[(usize::from(register) + offset) % registers.len()])
            .collect())
    }

    fn i2c_write(
        &mut self,
        bus: I2cBus,
        address: u8,
        register: u8,
        data: &[u8],
    ) -> Result<usize, BoardError> {
        self.check_i2c(bus, address)?;
        if let Some(registers) = self.i2c_devices.get_mut(&address) {
            let size = registers.len();
            for (offset, byte) in data.iter().enumerate() {
                registers[(usize::from(register) + offset) % size] = *byte;
            }
        }
        Ok(data.len())
    }

    fn spi_read(&mut self, bus: SpiBus, length: usize) -> Result<Vec<u8>, BoardError> {
        Self::check_spi(bus)?;
        Ok((0..length)
            .map(|_| self.spi_loopback.pop_front().unwrap_or(Self::SPI_IDLE))
            .collect())
    }

    fn spi_write(&mut self, bus: SpiBus, data: &[u8]) -> Result<usize, BoardError> {
        Self::check_spi(bus)?;
        self.spi_loopback.extend(data);
        Ok(data.len())
    }

    fn cpu_frequency(&self) -> u32 {
        Self::CPU_FREQUENCY
    }

    fn mem_free(&self) -> u64 {
        Self::MEM_FREE
    }

    fn reset(&mut self) -> Result<(), BoardError> {
        self.pins.clear();
        self.pwm.clear();
        self.spi_loopback.clear();
        self.reset_count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUS: I2cBus = I2cBus {
        scl: 5,
        sda: 4,
        frequency: 400_000,
    };

    const SPI: SpiBus = SpiBus {
        sck: 6,
        mosi: 7,
        miso: 4,
        frequency: 1_000_000,
    };

    #[test]
    fn gpio_output_reads_back_latch() {
        let mut board = SimulatedBoard::default();
        board.gpio_write(25, true).expect("write");

        assert_eq!(board.gpio_read(25), Ok(true));
        assert_eq!(board.output_level(25), Some(true));
    }

    #[test]
    fn gpio_input_reads_injected_level() {
        let mut board = SimulatedBoard::default();
        board.gpio_mode(3, PinMode::Input).expect("mode");
        board.set_input(3, true).expect("set");

        assert_eq!(board.gpio_read(3), Ok(true));
        assert_eq!(board.output_level(3), None);
    }

    #[test]
    fn pins_outside_rp2040_range_are_rejected() {
        let mut board = SimulatedBoard::default();
        assert_eq!(board.gpio_write(30, true), Err(BoardError::InvalidPin(30)));
        assert_eq!(board.adc_read_u16(5), Err(BoardError::InvalidAdcChannel(5)));
    }

    #[test]
    fn pwm_validates_duty_and_frequency() {
        let mut board = SimulatedBoard::default();
        assert_eq!(board.pwm_start(15, 1000, 1.5), Err(BoardError::InvalidDuty(1.5)));
        assert_eq!(board.pwm_start(15, 0, 0.5), Err(BoardError::InvalidFrequency));

        board.pwm_start(15, 50, 0.075).expect("start");
        board.pwm_set_duty(15, 0.1).expect("duty");
        assert_eq!(
            board.pwm_channel(15),
            Some(PwmChannel {
                frequency: 50,
                duty: 0.1
            })
        );

        board.pwm_stop(15).expect("stop");
        assert_eq!(board.pwm_channel(15), None);
    }

    #[test]
    fn i2c_register_file_wraps() {
        let mut board = SimulatedBoard::default();
        board.add_i2c_device(0x3c);

        assert_eq!(board.i2c_write(BUS, 0x3c, 0xFF, &[1, 2]), Ok(2));
        assert_eq!(board.i2c_register(0x3c, 0xFF), Some(1));
        assert_eq!(board.i2c_register(0x3c, 0x00), Some(2));
        assert_eq!(board.i2c_read(BUS, 0x3c, 0xFF, 2), Ok(vec![1, 2]));
        assert_eq!(board.i2c_scan(BUS), Ok(vec![0x3c]));
    }

    #[test]
    fn i2c_missing_device_reports_address() {
        let mut board = SimulatedBoard::default();
        let error = board.i2c_read(BUS, 0x50, 0, 1).expect_err("absent");
        assert_eq!(error.to_string(), "no I2C device at 0x50");
    }

    #[test]
    fn spi_loopback_pads_with_idle_bytes() {
        let mut board = SimulatedBoard::default();
        board.spi_write(SPI, &[0xAA]).expect("write");

        assert_eq!(board.spi_read(SPI, 3), Ok(vec![0xAA, 0xFF, 0xFF]));
    }

    #[test]
    fn reset_clears_outputs_and_counts() {
        let mut board = SimulatedBoard::default();
        board.gpio_write(25, true).expect("write");
        board.reset().expect("reset");

        assert_eq!(board.output_level(25), None);
        assert_eq!(board.reset_count(), 1);
    }

    #[test]
    fn poisoned_lock_is_recovered() {
        let board: SharedBoard = SimulatedBoard::default().shared();
        let poisoner = Arc::clone(&board);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().expect("first lock");
            panic!("poison the lock");
        })
        .join();

        assert!(board.is_poisoned());
        assert_eq!(lock_board(&board).name(), "RP2040");
    }
}
