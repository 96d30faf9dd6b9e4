//! # Host Client
//!
//! Lock-step request/response over a [`Link`]. One request is outstanding at
//! a time; `&mut self` on [`Client::execute`] makes that a compile-time rule.
//!
//! ## Exchange
//!
//! | Step | Behaviour |
//! |------|-----------|
//! | send | request serialized with a fresh UUID `id` |
//! | wait | poll every `poll_interval` until `timeout` |
//! | event | queued for [`Client::drain_events`], oldest dropped when full |
//! | response, other `id` | stale, discarded |
//! | response, same or no `id` | returned |
//! | timeout | re-send with the same `id`, up to `retry_count` more times |
//!
//! Instructions that are not idempotent are sent once unless
//! `retry_non_idempotent` is set. After the last attempt the caller gets a
//! synthetic `{"status":"error","error":"Timeout","code":"timeout"}`.

use std::collections::VecDeque;
use std::thread;
use std::time::Instant;

use clawlink_core::{
    DeviceInfo, DeviceMessage, Event, Instruction, LineFramer, Link, ProtocolError, Request,
    RequestId, Response, SerialLink,
};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::ClientError;

pub struct Client<L: Link> {
    framer: LineFramer<L>,
    config: ClientConfig,
    device: Option<DeviceInfo>,
    events: VecDeque<Event>,
}

impl Client<SerialLink> {
    /// Open the configured serial endpoint. Does not perform the handshake.
    pub fn open(config: ClientConfig) -> Result<Self, ClientError> {
        let link = SerialLink::open(&config.endpoint, config.baud_rate).map_err(|source| {
            ClientError::Connection {
                endpoint: config.endpoint.clone(),
                source,
            }
        })?;
        debug!(endpoint = %config.endpoint, baud = config.baud_rate, "serial endpoint opened");
        Ok(Self::with_link(link, config))
    }
}

impl<L: Link> Client<L> {
    pub fn with_link(link: L, config: ClientConfig) -> Self {
        Self {
            framer: LineFramer::new(link),
            config,
            device: None,
            events: VecDeque::new(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.device.is_some()
    }

    /// Capabilities reported by the last Ready event.
    pub fn device_info(&self) -> Option<&DeviceInfo> {
        self.device.as_ref()
    }

    /// Wait for the device's Ready event.
    ///
    /// Anything else seen before Ready is logged and dropped.
    pub fn connect(&mut self) -> Result<DeviceInfo, ClientError> {
        let timeout = self.config.timeout();
        let deadline = Instant::now() + timeout;
        loop {
            while let Some(line) = self.framer.try_read_line()? {
                match DeviceMessage::decode(&line) {
                    Ok(DeviceMessage::Event(event)) if event.is_ready() => {
                        match DeviceInfo::from_event(&event) {
                            Ok(info) => {
                                info!(
                                    version = %info.version,
                                    board = %info.board,
                                    tools = info.tools.len(),
                                    "connected"
                                );
                                self.device = Some(info.clone());
                                return Ok(info);
                            }
                            Err(error) => warn!(%error, "malformed ready event"),
                        }
                    }
                    Ok(other) => debug!(message = ?other, "ignoring message before ready"),
                    Err(error) => warn!(code = %error.kind(), %error, "undecodable line during handshake"),
                }
            }
            if Instant::now() >= deadline {
                warn!(?timeout, "handshake timed out");
                return Err(ClientError::HandshakeTimeout(timeout));
            }
            thread::sleep(self.config.poll_interval());
        }
    }

    pub fn disconnect(&mut self) {
        if self.device.take().is_some() {
            info!("disconnected");
        }
        self.events.clear();
    }

    pub fn into_link(self) -> L {
        self.framer.into_inner()
    }

    /// Events received so far, oldest first.
    pub fn drain_events(&mut self) -> Vec<Event> {
        self.events.drain(..).collect()
    }

    /// Send one instruction and wait for its Response.
    ///
    /// Errors only for [`ClientError::NotConnected`] and link failures; a
    /// device-reported error or a timeout comes back as an error Response.
    pub fn execute(&mut self, instruction: Instruction) -> Result<Response, ClientError> {
        let device = self.device.as_ref().ok_or(ClientError::NotConnected)?;
        let idempotent = instruction.is_idempotent(|tool| device.is_tool_idempotent(tool));
        let retry = self.config.retry();
        let attempts = retry.attempts_for(idempotent);

        let id = RequestId::new_v4().to_string();
        let request = Request::new(instruction).with_id(id.as_str());

        for attempt in 0..attempts {
            if attempt > 0 {
                thread::sleep(retry.delay_for_retry(attempt - 1));
                debug!(%id, attempt = attempt + 1, "retrying request");
            }
            self.framer.write_message(&request)?;
            if let Some(response) = self.await_response(&id)? {
                return Ok(response);
            }
            warn!(
                %id,
                kind = request.instruction.kind_name(),
                attempt = attempt + 1,
                attempts,
                "request timed out"
            );
        }
        Ok(Response::timeout())
    }

    /// Parse caller-supplied JSON and execute it.
    ///
    /// Malformed input is answered locally and never reaches the wire.
    pub fn execute_json(&mut self, json: &str) -> Result<Response, ClientError> {
        let Ok(value) = serde_json::from_str::<Value>(json) else {
            return Ok(Response::from(ProtocolError::InvalidJson));
        };
        match Instruction::from_value(&value) {
            Ok(instruction) => self.execute(instruction),
            Err(error) => Ok(Response::from(error)),
        }
    }

    fn await_response(&mut self, id: &str) -> Result<Option<Response>, ClientError> {
        let deadline = Instant::now() + self.config.timeout();
        loop {
            while let Some(line) = self.framer.try_read_line()? {
                match DeviceMessage::decode(&line) {
                    Ok(DeviceMessage::Response(response)) => match response.id() {
                        Some(other) if other != id => {
                            debug!(stale = other, expected = id, "discarding stale response");
                        }
                        _ => return Ok(Some(response)),
                    },
                    Ok(DeviceMessage::Event(event)) => self.record_event(event),
                    Err(error) => warn!(code = %error.kind(), %error, %line, "undecodable line"),
                }
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            thread::sleep(self.config.poll_interval());
        }
    }

    fn record_event(&mut self, event: Event) {
        if event.is_ready() {
            match DeviceInfo::from_event(&event) {
                Ok(info) => {
                    warn!(version = %info.version, "device restarted");
                    self.device = Some(info);
                }
                Err(error) => warn!(%error, "malformed ready event"),
            }
        }
        if self.events.len() >= self.config.event_queue_capacity() {
            if let Some(dropped) = self.events.pop_front() {
                warn!(
                    dropped = %dropped.name,
                    capacity = self.config.event_queue_capacity(),
                    "event queue full, oldest event dropped"
                );
            }
        }
        debug!(event = %event.name, "event queued");
        self.events.push_back(event);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use clawlink_core::{ErrorKind, MemoryLink};
    use serde_json::json;

    use super::*;

    const READY: &str = r#"{"event":"ready","data":{"version":"1.0.0","board":"RP2040","tools":["gpio_read"]}}"#;

    fn fast_config() -> ClientConfig {
        ClientConfig::default()
            .with_timeout(Duration::from_millis(30))
            .with_retry_backoff(Duration::from_millis(1))
            .with_poll_interval(Duration::from_millis(1))
    }

    fn client_with_device_lines(lines: &[&str]) -> (Client<MemoryLink>, LineFramer<MemoryLink>) {
        let (host, device) = MemoryLink::pair();
        let mut device = LineFramer::new(device);
        for line in lines {
            device.write_line(line).expect("preload");
        }
        (Client::with_link(host, fast_config()), device)
    }

    fn sent_lines(device: &mut LineFramer<MemoryLink>) -> Vec<Value> {
        std::iter::from_fn(|| device.try_read_line().expect("read"))
            .map(|line| serde_json::from_str(&line).expect("json"))
            .collect()
    }

    #[test]
    fn connect_skips_noise_until_ready() {
        let (mut client, _device) =
            client_with_device_lines(&["garbage", r#"{"status":"ok","data":1}"#, READY]);

        let info = client.connect().expect("connect");
        assert_eq!(info.board, "RP2040");
        assert!(client.is_connected());
    }

    #[test]
    fn connect_times_out_without_ready() {
        let (mut client, _device) = client_with_device_lines(&[]);
        assert!(matches!(
            client.connect(),
            Err(ClientError::HandshakeTimeout(_))
        ));
        assert!(!client.is_connected());
    }

    #[test]
    fn execute_requires_connection() {
        let (mut client, _device) = client_with_device_lines(&[]);
        assert!(matches!(
            client.execute(Instruction::ListTools),
            Err(ClientError::NotConnected)
        ));
    }

    #[test]
    fn legacy_response_without_id_is_accepted() {
        let (mut client, mut device) =
            client_with_device_lines(&[READY, r#"{"status":"ok","data":{"tools":["gpio_read"]}}"#]);
        client.connect().expect("connect");

        let response = client.execute(Instruction::ListTools).expect("execute");
        assert_eq!(response.data(), Some(&json!({"tools": ["gpio_read"]})));

        let sent = sent_lines(&mut device);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["type"], "list_tools");
        assert!(sent[0]["id"].is_string());
    }

    #[test]
    fn stale_response_is_discarded() {
        let (mut client, _device) = client_with_device_lines(&[
            READY,
            r#"{"status":"ok","data":"old","id":"previous-request"}"#,
            r#"{"status":"ok","data":"current"}"#,
        ]);
        client.connect().expect("connect");

        let response = client.execute(Instruction::ListTools).expect("execute");
        assert_eq!(response.data(), Some(&json!("current")));
    }

    #[test]
    fn events_are_queued_while_waiting() {
        let (mut client, _device) = client_with_device_lines(&[
            READY,
            r#"{"event":"reset","data":{"board":"RP2040"}}"#,
            r#"{"status":"ok","data":null}"#,
        ]);
        client.connect().expect("connect");
        client.execute(Instruction::ListTools).expect("execute");

        let events = client.drain_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "reset");
        assert!(client.drain_events().is_empty());
    }

    #[test]
    fn full_event_queue_drops_oldest() {
        let (host, device) = MemoryLink::pair();
        let mut device = LineFramer::new(device);
        for line in [
            READY,
            r#"{"event":"tick","data":1}"#,
            r#"{"event":"tick","data":2}"#,
            r#"{"event":"tick","data":3}"#,
            r#"{"status":"ok","data":null}"#,
        ] {
            device.write_line(line).expect("preload");
        }
        let mut client = Client::with_link(host, fast_config().with_event_queue_capacity(2));
        client.connect().expect("connect");
        client.execute(Instruction::ListTools).expect("execute");

        let data: Vec<Value> = client.drain_events().into_iter().map(|event| event.data).collect();
        assert_eq!(data, vec![json!(2), json!(3)]);
    }

    #[test]
    fn sustained_timeout_retries_with_same_id() {
        let (mut client, mut device) = client_with_device_lines(&[READY]);
        client.connect().expect("connect");

        let response = client.execute(Instruction::ListTools).expect("execute");
        assert_eq!(response.kind(), Some(ErrorKind::Timeout));
        assert_eq!(response.error_message(), Some("Timeout"));

        let sent = sent_lines(&mut device);
        assert_eq!(sent.len(), 4);
        assert!(sent.iter().all(|request| request["id"] == sent[0]["id"]));
    }

    #[test]
    fn non_idempotent_tool_is_sent_once() {
        let (mut client, mut device) = client_with_device_lines(&[READY]);
        client.connect().expect("connect");

        let response = client
            .execute(Instruction::exec("system_reset", None))
            .expect("execute");
        assert!(response.is_timeout());
        assert_eq!(sent_lines(&mut device).len(), 1);
    }

    #[test]
    fn execute_json_rejects_bad_input_locally() {
        let (mut client, mut device) = client_with_device_lines(&[READY]);
        client.connect().expect("connect");

        let response = client.execute_json("{not json").expect("local");
        assert_eq!(response.error_message(), Some("Invalid JSON"));

        let response = client.execute_json(r#"{"type":"exec"}"#).expect("local");
        assert_eq!(response.error_message(), Some("Missing field: tool"));
        assert!(sent_lines(&mut device).is_empty());
    }

    #[test]
    fn repeated_ready_refreshes_device_info() {
        let (mut client, _device) = client_with_device_lines(&[
            READY,
            r#"{"event":"ready","data":{"version":"1.1.0","board":"RP2350","tools":[]}}"#,
            r#"{"status":"ok","data":null}"#,
        ]);
        client.connect().expect("connect");
        client.execute(Instruction::ListTools).expect("execute");

        assert_eq!(client.device_info().map(|info| info.board.as_str()), Some("RP2350"));
    }

    #[test]
    fn disconnect_clears_state() {
        let (mut client, _device) = client_with_device_lines(&[READY]);
        client.connect().expect("connect");
        client.disconnect();
        assert!(!client.is_connected());
    }
}
