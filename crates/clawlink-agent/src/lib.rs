//! # clawlink-agent
//!
//! The device side of clawlink: everything that runs on (or simulates) the
//! microcontroller.
//!
//! ## Overview
//!
//! An [`AgentEngine`] owns a [`ToolRegistry`] populated with the built-in
//! hardware tools, a [`ContextStore`] and an [`EventBus`]. A [`DeviceAgent`]
//! drives the engine from a serial [`Link`](clawlink_core::Link), answering
//! every line with exactly one Response.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`board`] | `Board` trait and `SimulatedBoard` |
//! | [`config`] | `AgentConfig` |
//! | [`context`] | Bounded history and key/value state |
//! | [`device`] | Cooperative device loop and `StopHandle` |
//! | [`engine`] | Instruction dispatch |
//! | [`events`] | Broadcast event bus |
//! | [`registry`] | Tool lookup and panic-free calls |
//! | [`schema`] | Parameter schemas and typed accessors |
//! | [`tools`] | The 17 built-in hardware tools |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use clawlink_agent::{AgentConfig, AgentEngine, DeviceAgent};
//! use clawlink_core::SerialLink;
//!
//! let link = SerialLink::open("/dev/ttyGS0", 115_200)?;
//! let mut agent = DeviceAgent::new(AgentEngine::new(AgentConfig::default()), link);
//! agent.run()?;
//! ```

pub mod board;
pub mod config;
pub mod context;
pub mod device;
pub mod engine;
pub mod events;
pub mod registry;
pub mod schema;
pub mod tools;

pub use board::{
    lock_board, Board, BoardError, I2cBus, PinMode, PwmChannel, SharedBoard, SimulatedBoard, SpiBus,
};
pub use config::AgentConfig;
pub use context::ContextStore;
pub use device::{AgentError, DeviceAgent, StopHandle};
pub use engine::AgentEngine;
pub use events::{EventBus, EventSubscriber};
pub use registry::{ToolError, ToolRegistry};
pub use schema::{ParamError, ParamKind, ParamSpec, ToolParams, ToolSpec};
pub use tools::{register_builtin_tools, BUILTIN_TOOLS};
