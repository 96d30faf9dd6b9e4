//! # Clawlink Host
//!
//! Talks to a clawlink device over a serial link.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`capabilities`] | Typed wrappers: GPIO, PWM, ADC, I2C, SPI, system, context, state |
//! | [`client`] | Handshake, request correlation, timeouts and retries |
//! | [`config`] | `ClientConfig` with TOML loading |
//! | [`discovery`] | Candidate port filtering and auto-connect |
//! | [`error`] | `ClientError` |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use clawlink_host::{Client, ClientConfig};
//!
//! let mut client = Client::open(ClientConfig::default().with_endpoint("/dev/ttyACM0"))?;
//! let info = client.connect()?;
//! println!("{} v{} with {} tools", info.board, info.version, info.tools.len());
//!
//! client.gpio_write(25, true)?;
//! let volts = client.adc_read_voltage(0)?;
//! ```

pub mod capabilities;
pub mod client;
pub mod config;
pub mod discovery;
pub mod error;

pub use client::Client;
pub use config::{ClientConfig, ConfigError, DEFAULT_ENDPOINT};
pub use discovery::{candidate_ports, discover, is_candidate_port};
pub use error::ClientError;
