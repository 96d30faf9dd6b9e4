//! # Built-in Tools
//!
//! The hardware tool set every device exposes, registered in this order:
//!
//! | Group | Tools |
//! |-------|-------|
//! | GPIO | `gpio_mode`, `gpio_write`, `gpio_read` |
//! | PWM | `pwm_start`, `pwm_stop`, `pwm_duty` |
//! | ADC | `adc_read`, `adc_read_voltage` |
//! | I2C | `i2c_scan`, `i2c_read`, `i2c_write` |
//! | SPI | `spi_read`, `spi_write` |
//! | System | `system_info`, `system_reset`, `get_time`, `delay` |
//!
//! Default pin assignments follow the Pico pinout: I2C0 on SCL 5 / SDA 4,
//! SPI0 on SCK 6 / MOSI 7 / MISO 4.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clawlink_core::Event;
use serde_json::{json, Value};

use crate::board::{lock_board, I2cBus, PinMode, SharedBoard, SpiBus};
use crate::events::EventBus;
use crate::registry::ToolRegistry;
use crate::schema::{ParamError, ParamKind, ToolParams, ToolSpec};

pub const ADC_REFERENCE_VOLTS: f64 = 3.3;

const I2C_SCL: u8 = 5;
const I2C_SDA: u8 = 4;
const I2C_FREQUENCY: u32 = 400_000;
const SPI_SCK: u8 = 6;
const SPI_MOSI: u8 = 7;
const SPI_MISO: u8 = 4;
const SPI_FREQUENCY: u32 = 1_000_000;

/// Largest `length` accepted by `i2c_read` and `spi_read`. A full read of
/// 0xFF bytes still fits a response line under the default line limit.
pub const MAX_TRANSFER_BYTES: usize = 1024;

/// Names of the built-in tools in registration order.
pub const BUILTIN_TOOLS: [&str; 17] = [
    "gpio_mode",
    "gpio_write",
    "gpio_read",
    "pwm_start",
    "pwm_stop",
    "pwm_duty",
    "adc_read",
    "adc_read_voltage",
    "i2c_scan",
    "i2c_read",
    "i2c_write",
    "spi_read",
    "spi_write",
    "system_info",
    "system_reset",
    "get_time",
    "delay",
];

/// Register the built-in hardware tools against `board`.
///
/// `version` is reported by `system_info`; `get_time` and the uptime are
/// measured from this call.
pub fn register_builtin_tools(
    registry: &mut ToolRegistry,
    board: &SharedBoard,
    events: &EventBus,
    version: &str,
) {
    let started = Instant::now();
    register_gpio(registry, board);
    register_pwm(registry, board);
    register_adc(registry, board);
    register_i2c(registry, board);
    register_spi(registry, board);
    register_system(registry, board, events, version, started);
}

fn register_gpio(registry: &mut ToolRegistry, board: &SharedBoard) {
    let b = Arc::clone(board);
    registry.register(
        ToolSpec::new("gpio_mode", "Configure a GPIO pin as input or output")
            .required("pin", ParamKind::Integer, "GPIO pin number (0-29)")
            .optional("mode", ParamKind::String, json!("output"), "Pin direction: input or output"),
        move |params| {
            let pin = params.u8("pin")?;
            let mode = params.str("mode")?;
            let direction = PinMode::parse(mode).ok_or_else(|| {
                ParamError::out_of_range("mode", format!("expected input or output, found {mode}"))
            })?;
            lock_board(&b).gpio_mode(pin, direction)?;
            Ok(json!({"pin": pin, "mode": mode}))
        },
    );

    let b = Arc::clone(board);
    registry.register(
        ToolSpec::new("gpio_write", "Write a digital value (0 or 1) to a GPIO pin")
            .required("pin", ParamKind::Integer, "GPIO pin number (0-29)")
            .required("value", ParamKind::Integer, "Digital value: 0 (low) or 1 (high)"),
        move |params| {
            let pin = params.u8("pin")?;
            let value = params.u8("value")?;
            lock_board(&b).gpio_write(pin, value != 0)?;
            Ok(json!({"pin": pin, "value": value}))
        },
    );

    let b = Arc::clone(board);
    registry.register(
        ToolSpec::new("gpio_read", "Read a digital value from a GPIO pin")
            .required("pin", ParamKind::Integer, "GPIO pin number (0-29)"),
        move |params| {
            let pin = params.u8("pin")?;
            let high = lock_board(&b).gpio_read(pin)?;
            Ok(json!({"pin": pin, "value": u8::from(high)}))
        },
    );
}

fn register_pwm(registry: &mut ToolRegistry, board: &SharedBoard) {
    let b = Arc::clone(board);
    registry.register(
        ToolSpec::new("pwm_start", "Start PWM on a GPIO pin for motor/servo control")
            .required("pin", ParamKind::Integer, "GPIO pin number")
            .optional("frequency", ParamKind::Integer, json!(1000), "PWM frequency in Hz")
            .optional("duty", ParamKind::Number, json!(0.5), "Duty cycle 0.0 to 1.0")
            .non_idempotent(),
        move |params| {
            let pin = params.u8("pin")?;
            let frequency = params.u32("frequency")?;
            let duty = params.f64("duty")?;
            lock_board(&b).pwm_start(pin, frequency, duty)?;
            Ok(json!({"pin": pin, "frequency": frequency, "duty": duty}))
        },
    );

    let b = Arc::clone(board);
    registry.register(
        ToolSpec::new("pwm_stop", "Stop PWM output on a GPIO pin")
            .required("pin", ParamKind::Integer, "GPIO pin number")
            .non_idempotent(),
        move |params| {
            let pin = params.u8("pin")?;
            lock_board(&b).pwm_stop(pin)?;
            Ok(json!({"pin": pin, "stopped": true}))
        },
    );

    let b = Arc::clone(board);
    registry.register(
        ToolSpec::new("pwm_duty", "Change the duty cycle of a PWM pin")
            .required("pin", ParamKind::Integer, "GPIO pin number")
            .required("duty", ParamKind::Number, "Duty cycle 0.0 to 1.0"),
        move |params| {
            let pin = params.u8("pin")?;
            let duty = params.f64("duty")?;
            lock_board(&b).pwm_set_duty(pin, duty)?;
            Ok(json!({"pin": pin, "duty": duty}))
        },
    );
}

fn register_adc(registry: &mut ToolRegistry, board: &SharedBoard) {
    let b = Arc::clone(board);
    registry.register(
        ToolSpec::new("adc_read", "Read the raw 16-bit value of an ADC channel").optional(
            "channel",
            ParamKind::Integer,
            json!(0),
            "ADC channel (0-4 on RP2040)",
        ),
        move |params| {
            let channel = params.u8("channel")?;
            let raw = lock_board(&b).adc_read_u16(channel)?;
            Ok(json!({"channel": channel, "raw": raw}))
        },
    );

    let b = Arc::clone(board);
    registry.register(
        ToolSpec::new("adc_read_voltage", "Read analog voltage from ADC channel").optional(
            "channel",
            ParamKind::Integer,
            json!(0),
            "ADC channel (0-4 on RP2040)",
        ),
        move |params| {
            let channel = params.u8("channel")?;
            let raw = lock_board(&b).adc_read_u16(channel)?;
            Ok(json!({"channel": channel, "voltage": raw_to_volts(raw)}))
        },
    );
}

/// Scale a 16-bit reading to volts, rounded to millivolts.
pub fn raw_to_volts(raw: u16) -> f64 {
    let volts = f64::from(raw) / f64::from(u16::MAX) * ADC_REFERENCE_VOLTS;
    (volts * 1000.0).round() / 1000.0
}

fn i2c_bus(params: &ToolParams, frequency: u32) -> Result<I2cBus, ParamError> {
    Ok(I2cBus {
        scl: params.u8("scl")?,
        sda: params.u8("sda")?,
        frequency,
    })
}

fn transfer_length(params: &ToolParams) -> Result<usize, ParamError> {
    let length = params.u64("length")?;
    match usize::try_from(length) {
        Ok(length) if length <= MAX_TRANSFER_BYTES => Ok(length),
        _ => Err(ParamError::out_of_range(
            "length",
            format!("{length} exceeds {MAX_TRANSFER_BYTES} bytes"),
        )),
    }
}

fn hex_address(address: u8) -> String {
    format!("{address:#x}")
}

fn register_i2c(registry: &mut ToolRegistry, board: &SharedBoard) {
    let b = Arc::clone(board);
    registry.register(
        ToolSpec::new("i2c_scan", "Scan I2C bus for connected devices")
            .optional("scl", ParamKind::Integer, json!(I2C_SCL), "SCL pin")
            .optional("sda", ParamKind::Integer, json!(I2C_SDA), "SDA pin")
            .optional("frequency", ParamKind::Integer, json!(I2C_FREQUENCY), "Bus frequency in Hz"),
        move |params| {
            let bus = i2c_bus(params, params.u32("frequency")?)?;
            let devices: Vec<String> = lock_board(&b)
                .i2c_scan(bus)?
                .into_iter()
                .map(hex_address)
                .collect();
            Ok(json!({"count": devices.len(), "devices": devices}))
        },
    );

    let b = Arc::clone(board);
    registry.register(
        ToolSpec::new("i2c_read", "Read registers from an I2C device")
            .required("address", ParamKind::Integer, "7-bit device address")
            .optional("register", ParamKind::Integer, json!(0), "First register")
            .optional("length", ParamKind::Integer, json!(1), "Number of bytes")
            .optional("scl", ParamKind::Integer, json!(I2C_SCL), "SCL pin")
            .optional("sda", ParamKind::Integer, json!(I2C_SDA), "SDA pin"),
        move |params| {
            let address = params.u8("address")?;
            let register = params.u8("register")?;
            let length = transfer_length(params)?;
            let bus = i2c_bus(params, I2C_FREQUENCY)?;
            let data = lock_board(&b).i2c_read(bus, address, register, length)?;
            Ok(json!({"address": hex_address(address), "data": data}))
        },
    );

    let b = Arc::clone(board);
    registry.register(
        ToolSpec::new("i2c_write", "Write bytes to I2C device registers")
            .required("address", ParamKind::Integer, "7-bit device address")
            .optional("register", ParamKind::Integer, json!(0), "First register")
            .optional("data", ParamKind::Array, Value::Null, "Bytes to write")
            .optional("scl", ParamKind::Integer, json!(I2C_SCL), "SCL pin")
            .optional("sda", ParamKind::Integer, json!(I2C_SDA), "SDA pin")
            .non_idempotent(),
        move |params| {
            let address = params.u8("address")?;
            let register = params.u8("register")?;
            let data = params.optional_bytes("data")?.unwrap_or_default();
            let bus = i2c_bus(params, I2C_FREQUENCY)?;
            let written = if data.is_empty() {
                0
            } else {
                lock_board(&b).i2c_write(bus, address, register, &data)?
            };
            Ok(json!({"address": hex_address(address), "written": written}))
        },
    );
}

fn spi_bus(params: &ToolParams) -> Result<SpiBus, ParamError> {
    Ok(SpiBus {
        sck: params.u8("sck")?,
        mosi: params.u8("mosi")?,
        miso: params.u8("miso")?,
        frequency: params.u32("frequency")?,
    })
}

fn spi_spec(name: &str, description: &str) -> ToolSpec {
    ToolSpec::new(name, description)
        .optional("frequency", ParamKind::Integer, json!(SPI_FREQUENCY), "Bus frequency in Hz")
        .optional("sck", ParamKind::Integer, json!(SPI_SCK), "SCK pin")
        .optional("mosi", ParamKind::Integer, json!(SPI_MOSI), "MOSI pin")
        .optional("miso", ParamKind::Integer, json!(SPI_MISO), "MISO pin")
        .non_idempotent()
}

fn register_spi(registry: &mut ToolRegistry, board: &SharedBoard) {
    let b = Arc::clone(board);
    registry.register(
        spi_spec("spi_read", "Read bytes from the SPI bus").optional(
            "length",
            ParamKind::Integer,
            json!(1),
            "Number of bytes",
        ),
        move |params| {
            let length = transfer_length(params)?;
            let data = lock_board(&b).spi_read(spi_bus(params)?, length)?;
            Ok(json!({"data": data}))
        },
    );

    let b = Arc::clone(board);
    registry.register(
        spi_spec("spi_write", "Write bytes to the SPI bus").required(
            "data",
            ParamKind::Array,
            "Bytes to write",
        ),
        move |params| {
            let data = params.bytes("data")?;
            let written = lock_board(&b).spi_write(spi_bus(params)?, &data)?;
            Ok(json!({"written": written}))
        },
    );
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn register_system(
    registry: &mut ToolRegistry,
    board: &SharedBoard,
    events: &EventBus,
    version: &str,
    started: Instant,
) {
    let b = Arc::clone(board);
    let firmware = version.to_owned();
    registry.register(
        ToolSpec::new("system_info", "Report firmware version, board and resources"),
        move |_| {
            let board = lock_board(&b);
            Ok(json!({
                "version": firmware,
                "board": board.name(),
                "frequency": board.cpu_frequency(),
                "mem_free": board.mem_free(),
                "uptime_ms": elapsed_ms(started),
            }))
        },
    );

    let b = Arc::clone(board);
    let bus = events.clone();
    registry.register(
        ToolSpec::new("system_reset", "Reset the microcontroller").non_idempotent(),
        move |_| {
            let mut board = lock_board(&b);
            bus.emit(Event::new("reset", json!({"board": board.name()})));
            board.reset()?;
            Ok(json!({"reset": true}))
        },
    );

    registry.register(
        ToolSpec::new("get_time", "Time since the agent started"),
        move |_| {
            let elapsed = started.elapsed();
            Ok(json!({
                "time_ms": u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                "time_us": u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX),
            }))
        },
    );

    registry.register(
        ToolSpec::new("delay", "Block the agent for a number of milliseconds").optional(
            "milliseconds",
            ParamKind::Integer,
            json!(0),
            "Delay in milliseconds",
        ),
        |params| {
            let milliseconds = params.u64("milliseconds")?;
            thread::sleep(Duration::from_millis(milliseconds));
            Ok(json!({"delayed_ms": milliseconds}))
        },
    );
}
