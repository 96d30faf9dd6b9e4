//! CLI argument definitions for clawlink.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ports` | List candidate serial ports |
//! | `info` | Handshake and print the device's Ready payload |
//! | `tools` | List tools registered on the device |
//! | `schema` | Print function-calling schemas for the built-in tools |
//! | `exec` | Run any tool with JSON params |
//! | `send` | Send a raw JSON instruction |
//! | `gpio`, `pwm`, `adc`, `i2c`, `spi`, `system`, `delay` | Hardware shortcuts |
//! | `context`, `state` | Device-held conversation history and key/value state |
//! | `device` | Run a simulated device agent |
//!
//! # Global Options
//!
//! | Option | Env | Default | Description |
//! |--------|-----|---------|-------------|
//! | `--port` | `CLAWLINK_PORT` | `/dev/ttyACM0` | Serial endpoint |
//! | `--baud` | `CLAWLINK_BAUD` | `115200` | Baud rate |
//! | `--timeout-ms` | `CLAWLINK_TIMEOUT_MS` | `5000` | Per-attempt timeout |
//! | `--retries` | `CLAWLINK_RETRIES` | `3` | Extra attempts after a timeout |
//! | `--config` | | | TOML file with `ClientConfig` keys |
//! | `--auto` | | `false` | Probe candidate ports instead of `--port` |
//! | `--pretty` | | `false` | Pretty-print JSON output |
//! | `-v` | | | `-v` info logs, `-vv` debug logs (stderr) |
//!
//! # Examples
//!
//! ```bash
//! clawlink --port /dev/ttyACM0 gpio write 25 1
//! clawlink --auto adc voltage 0 --pretty
//! clawlink exec i2c_read --params '{"address": 60, "length": 2}'
//! clawlink send '{"type":"state","action":"get","key":"mode"}'
//! clawlink device --stdio
//! ```

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

/// clawlink - drive a microcontroller agent over a serial link
#[derive(Debug, Parser)]
#[command(
    name = "clawlink",
    author,
    version,
    about = "Command a clawlink device over a serial link",
    long_about = "clawlink talks newline-delimited JSON to a microcontroller agent. Each \
instruction gets exactly one response; the device may also push events.\n\
\n\
Use 'clawlink <command> --help' for command-specific help."
)]
pub struct Cli {
    /// Serial endpoint, e.g. /dev/ttyACM0 or COM3.
    #[arg(long, global = true, env = "CLAWLINK_PORT")]
    pub port: Option<String>,

    /// Baud rate.
    #[arg(long, global = true, env = "CLAWLINK_BAUD")]
    pub baud: Option<u32>,

    /// Per-attempt response timeout in milliseconds.
    #[arg(long, global = true, env = "CLAWLINK_TIMEOUT_MS")]
    pub timeout_ms: Option<u64>,

    /// Additional attempts after a timeout.
    #[arg(long, global = true, env = "CLAWLINK_RETRIES")]
    pub retries: Option<u32>,

    /// TOML config file. Flags and environment override its values.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Probe USB/ACM/SLAB ports and use the first device that answers. Ignores --port.
    #[arg(long, global = true, default_value_t = false)]
    pub auto: bool,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Increase log verbosity (-v info, -vv debug). RUST_LOG wins when set.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List serial ports that look like a board.
    Ports(PortsArgs),

    /// Handshake and print version, board and tools.
    Info,

    /// List tools registered on the device.
    Tools,

    /// Print function-calling schemas for the built-in tools.
    ///
    /// Needs no device. The output plugs into LLM tool-use APIs.
    Schema(SchemaArgs),

    /// Run a tool by name.
    ///
    /// # Examples
    ///
    ///   clawlink exec gpio_read --params '{"pin": 25}'
    ///   clawlink exec system_info
    Exec(ExecArgs),

    /// Send one raw JSON instruction.
    ///
    /// Malformed JSON is rejected locally without touching the link.
    Send(SendArgs),

    /// Digital pins.
    Gpio(GpioArgs),

    /// PWM outputs.
    Pwm(PwmArgs),

    /// Analog inputs.
    Adc(AdcArgs),

    /// I2C bus.
    I2c(I2cArgs),

    /// SPI bus.
    Spi(SpiArgs),

    /// Board information, reset and clock.
    System(SystemArgs),

    /// Block the device for a number of milliseconds.
    Delay(DelayArgs),

    /// Device-held conversation history.
    Context(ContextArgs),

    /// Device-held key/value state.
    State(StateArgs),

    /// Run a simulated RP2040 agent.
    ///
    /// Serves the serial endpoint from --port, or stdin/stdout with --stdio.
    /// Stops on Ctrl-C or when the link closes.
    Device(DeviceArgs),
}

#[derive(Debug, Args)]
pub struct PortsArgs {
    /// Include ports that fail the USB/ACM/SLAB name filter.
    #[arg(long, default_value_t = false)]
    pub all: bool,
}

#[derive(Debug, Args)]
pub struct SchemaArgs {
    /// Only print the schema for this tool.
    #[arg(long)]
    pub tool: Option<String>,
}

#[derive(Debug, Args)]
pub struct ExecArgs {
    /// Tool name.
    pub tool: String,

    /// Parameters as a JSON object.
    #[arg(long)]
    pub params: Option<String>,
}

#[derive(Debug, Args)]
pub struct SendArgs {
    /// Instruction JSON, e.g. '{"type":"list_tools"}'.
    pub json: String,
}

#[derive(Debug, Args)]
pub struct GpioArgs {
    #[command(subcommand)]
    pub command: GpioCommand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PinDirection {
    Input,
    Output,
}

impl PinDirection {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum GpioCommand {
    /// Configure a pin as input or output.
    Mode {
        pin: u8,
        #[arg(value_enum, default_value_t = PinDirection::Output)]
        mode: PinDirection,
    },
    /// Drive a pin low (0) or high (1).
    Write {
        pin: u8,
        #[arg(value_parser = clap::value_parser!(u8).range(0..=1))]
        value: u8,
    },
    /// Read a pin.
    Read { pin: u8 },
}

#[derive(Debug, Args)]
pub struct PwmArgs {
    #[command(subcommand)]
    pub command: PwmCommand,
}

#[derive(Debug, Subcommand)]
pub enum PwmCommand {
    /// Start PWM. Not retried on timeout.
    Start {
        pin: u8,
        #[arg(long, default_value_t = 1000)]
        frequency: u32,
        #[arg(long, default_value_t = 0.5)]
        duty: f64,
    },
    /// Stop PWM. Not retried on timeout.
    Stop { pin: u8 },
    /// Change the duty cycle (0.0 to 1.0).
    Duty { pin: u8, duty: f64 },
}

#[derive(Debug, Args)]
pub struct AdcArgs {
    #[command(subcommand)]
    pub command: AdcCommand,
}

#[derive(Debug, Subcommand)]
pub enum AdcCommand {
    /// Raw 16-bit reading.
    Read {
        #[arg(default_value_t = 0)]
        channel: u8,
    },
    /// Reading scaled to volts (3.3 V reference).
    Voltage {
        #[arg(default_value_t = 0)]
        channel: u8,
    },
}

#[derive(Debug, Args)]
pub struct I2cArgs {
    #[command(subcommand)]
    pub command: I2cCommand,
}

#[derive(Debug, Subcommand)]
pub enum I2cCommand {
    /// Scan the default bus.
    Scan,
    /// Read registers from a device.
    Read {
        /// 7-bit address, decimal or 0x-prefixed hex.
        #[arg(value_parser = parse_byte)]
        address: u8,
        #[arg(long, default_value_t = 0, value_parser = parse_byte)]
        register: u8,
        #[arg(long, default_value_t = 1)]
        length: usize,
    },
    /// Write bytes to device registers. Not retried on timeout.
    Write {
        #[arg(value_parser = parse_byte)]
        address: u8,
        #[arg(long, default_value_t = 0, value_parser = parse_byte)]
        register: u8,
        /// Bytes, decimal or 0x-prefixed hex.
        #[arg(num_args = 0.., value_parser = parse_byte)]
        data: Vec<u8>,
    },
}

#[derive(Debug, Args)]
pub struct SpiArgs {
    #[command(subcommand)]
    pub command: SpiCommand,
}

#[derive(Debug, Subcommand)]
pub enum SpiCommand {
    /// Clock bytes in. Not retried on timeout.
    Read {
        #[arg(long, default_value_t = 1)]
        length: usize,
    },
    /// Clock bytes out. Not retried on timeout.
    Write {
        #[arg(required = true, num_args = 1.., value_parser = parse_byte)]
        data: Vec<u8>,
    },
}

#[derive(Debug, Args)]
pub struct SystemArgs {
    #[command(subcommand)]
    pub command: SystemCommand,
}

#[derive(Debug, Subcommand)]
pub enum SystemCommand {
    /// Firmware version, board, clock and free memory.
    Info,
    /// Reset the board. The device may not answer.
    Reset,
    /// Time since the agent started.
    Time,
}

#[derive(Debug, Args)]
pub struct DelayArgs {
    pub milliseconds: u64,
}

#[derive(Debug, Args)]
pub struct ContextArgs {
    #[command(subcommand)]
    pub command: ContextCommand,
}

#[derive(Debug, Subcommand)]
pub enum ContextCommand {
    Get,
    Add {
        #[arg(long, default_value = "user")]
        role: String,
        content: String,
    },
    Clear,
}

#[derive(Debug, Args)]
pub struct StateArgs {
    #[command(subcommand)]
    pub command: StateCommand,
}

#[derive(Debug, Subcommand)]
pub enum StateCommand {
    Get {
        key: String,
    },
    /// Store a value. VALUE is parsed as JSON, falling back to a plain string.
    Set {
        key: String,
        value: String,
    },
}

#[derive(Debug, Args)]
pub struct DeviceArgs {
    /// Serve stdin/stdout instead of a serial port.
    #[arg(long, default_value_t = false)]
    pub stdio: bool,

    /// Firmware version to report.
    #[arg(long)]
    pub firmware_version: Option<String>,

    /// History entries kept by the context store.
    #[arg(long)]
    pub max_history: Option<usize>,
}

fn parse_byte(input: &str) -> Result<u8, String> {
    let parsed = match input.strip_prefix("0x").or_else(|| input.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => input.parse::<u8>(),
    };
    parsed.map_err(|error| format!("'{input}' is not a byte: {error}"))
}
