//! # Clawlink Core
//!
//! Wire protocol shared by the device agent and the host client.
//!
//! ## Overview
//!
//! A host sends an [`Instruction`] as one line of JSON over a serial link; the
//! device answers each with exactly one [`Response`] and may push [`Event`]s at
//! any time. This crate owns everything both sides must agree on:
//!
//! - **Messages** with strict decoding and field-precise errors
//! - **Error taxonomy** with stable wire codes
//! - **Line framing** over any byte [`Link`]
//! - **Links** for real serial ports and in-process testing
//! - **Retry policy** for timed-out requests
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`error`] | `ErrorKind`, `ProtocolError` |
//! | [`framing`] | Newline-delimited JSON framer |
//! | [`link`] | `Link` trait, `SerialLink`, `MemoryLink` |
//! | [`message`] | Instruction, Request, Response, Event, DeviceInfo |
//! | [`request_id`] | UUID request ids for correlation |
//! | [`retry`] | Backoff and retry configuration |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use clawlink_core::{DeviceMessage, Instruction, LineFramer, MemoryLink, Request};
//!
//! let (host, _device) = MemoryLink::pair();
//! let mut framer = LineFramer::new(host);
//! framer.write_message(&Request::new(Instruction::ListTools).with_id("1"))?;
//!
//! if let Some(line) = framer.try_read_line()? {
//!     match DeviceMessage::decode(&line)? {
//!         DeviceMessage::Response(response) => println!("{:?}", response.data()),
//!         DeviceMessage::Event(event) => println!("event {}", event.name),
//!     }
//! }
//! ```

pub mod error;
pub mod framing;
pub mod link;
pub mod message;
pub mod request_id;
pub mod retry;

pub use error::{ErrorKind, ProtocolError};
pub use framing::{FramingError, LineFramer, DEFAULT_MAX_LINE_BYTES};
pub use link::{Link, MemoryLink, SerialLink};
pub use message::{
    ContextAction, DeviceInfo, DeviceMessage, Event, HistoryEntry, Instruction, RejectedRequest,
    Request, Response, StateAction, BUILTIN_NON_IDEMPOTENT_TOOLS, READY_EVENT,
};
pub use request_id::RequestId;
pub use retry::{Backoff, RetryConfig};

/// Baud rate used by the reference firmware.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;
