//! Harnesses shared by the behaviour tests.
//!
//! [`SimulatedDevice`] runs the real agent loop on a thread. [`ScriptedDevice`]
//! answers each request through a closure, for exercising host timing rules.

use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub use clawlink_agent::{AgentConfig, AgentEngine, DeviceAgent, StopHandle};
pub use clawlink_core::{LineFramer, MemoryLink};
pub use clawlink_host::{Client, ClientConfig};
use serde_json::Value;

pub const READY_LINE: &str =
    r#"{"event":"ready","data":{"version":"1.0.0","board":"RP2040","tools":["gpio_read","system_reset"]}}"#;

/// Host settings tight enough to keep timeout tests quick.
pub fn fast_config() -> ClientConfig {
    ClientConfig::default()
        .with_timeout(Duration::from_millis(60))
        .with_retry_backoff(Duration::from_millis(1))
        .with_poll_interval(Duration::from_millis(1))
}

/// A full device agent serving one end of a [`MemoryLink`] pair.
pub struct SimulatedDevice {
    stop: StopHandle,
    worker: Option<JoinHandle<()>>,
}

impl SimulatedDevice {
    pub fn spawn(engine: AgentEngine) -> (Self, MemoryLink) {
        let (host, device) = MemoryLink::pair();
        let mut agent = DeviceAgent::new(engine, device);
        let stop = agent.stop_handle();
        let worker = thread::spawn(move || {
            agent.run().expect("device loop");
        });
        (
            Self {
                stop,
                worker: Some(worker),
            },
            host,
        )
    }

    pub fn spawn_default() -> (Self, MemoryLink) {
        let config = AgentConfig::default()
            .with_version("1.0.0")
            .with_idle_sleep(Duration::from_millis(1));
        Self::spawn(AgentEngine::new(config))
    }

    /// Connected client with a generous timeout.
    pub fn client() -> (Self, Client<MemoryLink>) {
        let (device, link) = Self::spawn_default();
        let mut client = Client::with_link(
            link,
            ClientConfig::default()
                .with_timeout(Duration::from_secs(2))
                .with_poll_interval(Duration::from_millis(1)),
        );
        client.connect().expect("handshake with simulated device");
        (device, client)
    }
}

impl Drop for SimulatedDevice {
    fn drop(&mut self) {
        self.stop.stop();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

type Script = Box<dyn FnMut(usize, &Value) -> Vec<String> + Send>;

/// Sends [`READY_LINE`], then hands every request to a script.
///
/// The script gets the zero-based request number and the decoded request and
/// returns the raw lines to send back. Every request is recorded.
pub struct ScriptedDevice {
    received: Arc<Mutex<Vec<Value>>>,
    stop: StopHandle,
    worker: Option<JoinHandle<()>>,
}

impl ScriptedDevice {
    pub fn spawn(
        script: impl FnMut(usize, &Value) -> Vec<String> + Send + 'static,
    ) -> (Self, MemoryLink) {
        let (host, device) = MemoryLink::pair();
        let received = Arc::new(Mutex::new(Vec::new()));
        let stop = StopHandle::default();
        let worker = {
            let received = Arc::clone(&received);
            let stop = stop.clone();
            let mut script: Script = Box::new(script);
            thread::spawn(move || {
                let mut framer = LineFramer::new(device);
                framer.write_line(READY_LINE).expect("ready");
                while !stop.is_stopped() {
                    let Some(line) = framer.try_read_line().expect("read") else {
                        thread::sleep(Duration::from_millis(1));
                        continue;
                    };
                    let request: Value = serde_json::from_str(&line).expect("request json");
                    let index = {
                        let mut received = received.lock().unwrap_or_else(PoisonError::into_inner);
                        received.push(request.clone());
                        received.len() - 1
                    };
                    for reply in script(index, &request) {
                        framer.write_line(&reply).expect("reply");
                    }
                }
            })
        };
        (
            Self {
                received,
                stop,
                worker: Some(worker),
            },
            host,
        )
    }

    /// Connected client using [`fast_config`] with `retry_count` retries.
    pub fn client(
        retry_count: u32,
        script: impl FnMut(usize, &Value) -> Vec<String> + Send + 'static,
    ) -> (Self, Client<MemoryLink>) {
        let (device, link) = Self::spawn(script);
        let mut client = Client::with_link(link, fast_config().with_retry_count(retry_count));
        client.connect().expect("handshake with scripted device");
        (device, client)
    }

    pub fn received(&self) -> Vec<Value> {
        self.received
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Drop for ScriptedDevice {
    fn drop(&mut self) {
        self.stop.stop();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// `{"status":"ok","data":{"result":result},"id":<request id>}`.
pub fn ok_reply(request: &Value, result: Value) -> String {
    serde_json::json!({"status": "ok", "data": {"result": result}, "id": request["id"]}).to_string()
}
