//! # Device Loop
//!
//! A single cooperative loop that owns the engine and one end of the link:
//!
//! 1. send Ready (once)
//! 2. flush queued events
//! 3. read a line; if present, dispatch it and write its Response
//! 4. otherwise sleep `idle_sleep`
//!
//! A long-running tool blocks the whole loop, event delivery included.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clawlink_core::{FramingError, LineFramer, Link};
use tracing::{debug, info, warn};

use crate::engine::AgentEngine;
use crate::events::EventSubscriber;

/// Ends [`DeviceAgent::run`] from another thread.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("link error: {0}")]
    Framing(#[from] FramingError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Serves one link with one engine.
pub struct DeviceAgent<L: Link> {
    engine: AgentEngine,
    framer: LineFramer<L>,
    events: EventSubscriber,
    stop: StopHandle,
    idle_sleep: Duration,
    ready_sent: bool,
}

impl<L: Link> DeviceAgent<L> {
    pub fn new(engine: AgentEngine, link: L) -> Self {
        let framer = LineFramer::new(link).with_max_line_bytes(engine.config().max_line_bytes);
        let events = engine.events().subscribe();
        let idle_sleep = engine.config().idle_sleep;
        Self {
            engine,
            framer,
            events,
            stop: StopHandle::default(),
            idle_sleep,
            ready_sent: false,
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn engine(&self) -> &AgentEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut AgentEngine {
        &mut self.engine
    }

    /// Send the Ready event. Later calls do nothing.
    pub fn start(&mut self) -> Result<(), AgentError> {
        if self.ready_sent {
            return Ok(());
        }
        let ready = self.engine.ready_event()?;
        self.framer.write_message(&ready)?;
        self.ready_sent = true;
        info!(
            version = %self.engine.config().version,
            tools = self.engine.registry().len(),
            "device agent ready"
        );
        Ok(())
    }

    /// One loop iteration without sleeping. Returns whether a line was served.
    pub fn poll_once(&mut self) -> Result<bool, AgentError> {
        self.start()?;
        self.flush_events();

        let Some(line) = self.framer.try_read_line()? else {
            return Ok(false);
        };
        debug!(%line, "instruction received");
        let response = self.engine.execute_line(&line);
        self.framer.write_message(&response)?;
        self.flush_events();
        Ok(true)
    }

    /// Serve until [`StopHandle::stop`] or a link failure.
    pub fn run(&mut self) -> Result<(), AgentError> {
        self.start()?;
        while !self.stop.is_stopped() {
            if !self.poll_once()? {
                thread::sleep(self.idle_sleep);
            }
        }
        info!("device agent stopped");
        Ok(())
    }

    pub fn into_link(self) -> L {
        self.framer.into_inner()
    }

    fn flush_events(&mut self) {
        for event in self.events.drain() {
            if let Err(error) = self.framer.write_message(&event) {
                warn!(event = %event.name, %error, "failed to write event");
            }
        }
    }
}
