//! Typed wrappers over [`Client::execute`], one per device capability.
//!
//! A device-reported error or a timeout collapses to a neutral value (`0`,
//! `false`, empty). Only host-side failures surface as [`ClientError`]. Use
//! [`Client::execute`] when the difference matters.

use clawlink_core::{ContextAction, HistoryEntry, Instruction, Link, Response, StateAction};
use serde_json::{Map, Value};
use tracing::debug;

use crate::client::Client;
use crate::error::ClientError;

fn params<const N: usize>(pairs: [(&str, Value); N]) -> Map<String, Value> {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_owned(), value))
        .collect()
}

fn field_u64(result: Option<&Value>, key: &str) -> u64 {
    result
        .and_then(|result| result.get(key))
        .and_then(Value::as_u64)
        .unwrap_or_default()
}

fn byte_list(value: Option<&Value>) -> Vec<u8> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_u64)
                .filter_map(|byte| u8::try_from(byte).ok())
                .collect()
        })
        .unwrap_or_default()
}

fn parse_hex_address(text: &str) -> Option<u8> {
    let digits = text.strip_prefix("0x").unwrap_or(text);
    u8::from_str_radix(digits, 16).ok()
}

fn bytes_value(data: &[u8]) -> Value {
    Value::from(data.to_vec())
}

impl<L: Link> Client<L> {
    /// Run a tool and hand back `data.result`, or `None` on any error Response.
    fn exec_result(
        &mut self,
        tool: &str,
        params: Option<Map<String, Value>>,
    ) -> Result<Option<Value>, ClientError> {
        let response = self.execute(Instruction::exec(tool, params))?;
        Ok(successful(tool, &response).and_then(Response::result).cloned())
    }

    fn data_of(&mut self, instruction: Instruction) -> Result<Option<Value>, ClientError> {
        let kind = instruction.kind_name();
        let response = self.execute(instruction)?;
        Ok(successful(kind, &response).and_then(Response::data).cloned())
    }

    pub fn gpio_mode(&mut self, pin: u8, mode: &str) -> Result<bool, ClientError> {
        let result = self.exec_result(
            "gpio_mode",
            Some(params([("pin", pin.into()), ("mode", mode.into())])),
        )?;
        Ok(result.is_some())
    }

    pub fn gpio_write(&mut self, pin: u8, high: bool) -> Result<bool, ClientError> {
        let result = self.exec_result(
            "gpio_write",
            Some(params([("pin", pin.into()), ("value", u8::from(high).into())])),
        )?;
        Ok(result.is_some())
    }

    pub fn gpio_read(&mut self, pin: u8) -> Result<u8, ClientError> {
        let result = self.exec_result("gpio_read", Some(params([("pin", pin.into())])))?;
        Ok(u8::try_from(field_u64(result.as_ref(), "value")).unwrap_or_default())
    }

    pub fn pwm_start(&mut self, pin: u8, frequency: u32, duty: f64) -> Result<bool, ClientError> {
        let result = self.exec_result(
            "pwm_start",
            Some(params([
                ("pin", pin.into()),
                ("frequency", frequency.into()),
                ("duty", duty.into()),
            ])),
        )?;
        Ok(result.is_some())
    }

    pub fn pwm_stop(&mut self, pin: u8) -> Result<bool, ClientError> {
        let result = self.exec_result("pwm_stop", Some(params([("pin", pin.into())])))?;
        Ok(result.is_some())
    }

    pub fn pwm_duty(&mut self, pin: u8, duty: f64) -> Result<bool, ClientError> {
        let result = self.exec_result(
            "pwm_duty",
            Some(params([("pin", pin.into()), ("duty", duty.into())])),
        )?;
        Ok(result.is_some())
    }

    /// Raw 16-bit reading.
    pub fn adc_read(&mut self, channel: u8) -> Result<u16, ClientError> {
        let result = self.exec_result("adc_read", Some(params([("channel", channel.into())])))?;
        Ok(u16::try_from(field_u64(result.as_ref(), "raw")).unwrap_or_default())
    }

    pub fn adc_read_voltage(&mut self, channel: u8) -> Result<f64, ClientError> {
        let result = self.exec_result(
            "adc_read_voltage",
            Some(params([("channel", channel.into())])),
        )?;
        Ok(result
            .as_ref()
            .and_then(|result| result.get("voltage"))
            .and_then(Value::as_f64)
            .unwrap_or_default())
    }

    /// Addresses found on the default bus.
    pub fn i2c_scan(&mut self) -> Result<Vec<u8>, ClientError> {
        let result = self.exec_result("i2c_scan", None)?;
        Ok(result
            .as_ref()
            .and_then(|result| result.get("devices"))
            .and_then(Value::as_array)
            .map(|devices| {
                devices
                    .iter()
                    .filter_map(Value::as_str)
                    .filter_map(parse_hex_address)
                    .collect()
            })
            .unwrap_or_default())
    }

    pub fn i2c_read(&mut self, address: u8, register: u8, length: usize) -> Result<Vec<u8>, ClientError> {
        let result = self.exec_result(
            "i2c_read",
            Some(params([
                ("address", address.into()),
                ("register", register.into()),
                ("length", length.into()),
            ])),
        )?;
        Ok(byte_list(result.as_ref().and_then(|result| result.get("data"))))
    }

    /// Number of bytes written.
    pub fn i2c_write(&mut self, address: u8, register: u8, data: &[u8]) -> Result<usize, ClientError> {
        let result = self.exec_result(
            "i2c_write",
            Some(params([
                ("address", address.into()),
                ("register", register.into()),
                ("data", bytes_value(data)),
            ])),
        )?;
        Ok(usize::try_from(field_u64(result.as_ref(), "written")).unwrap_or_default())
    }

    pub fn spi_read(&mut self, length: usize) -> Result<Vec<u8>, ClientError> {
        let result = self.exec_result("spi_read", Some(params([("length", length.into())])))?;
        Ok(byte_list(result.as_ref().and_then(|result| result.get("data"))))
    }

    pub fn spi_write(&mut self, data: &[u8]) -> Result<usize, ClientError> {
        let result = self.exec_result("spi_write", Some(params([("data", bytes_value(data))])))?;
        Ok(usize::try_from(field_u64(result.as_ref(), "written")).unwrap_or_default())
    }

    pub fn system_info(&mut self) -> Result<Map<String, Value>, ClientError> {
        let result = self.exec_result("system_info", None)?;
        Ok(match result {
            Some(Value::Object(info)) => info,
            _ => Map::new(),
        })
    }

    /// The raw Response; a resetting device may never answer.
    pub fn system_reset(&mut self) -> Result<Response, ClientError> {
        self.execute(Instruction::exec("system_reset", None))
    }

    /// Milliseconds since the agent started.
    pub fn get_time(&mut self) -> Result<u64, ClientError> {
        let result = self.exec_result("get_time", None)?;
        Ok(field_u64(result.as_ref(), "time_ms"))
    }

    pub fn delay(&mut self, milliseconds: u64) -> Result<bool, ClientError> {
        let result = self.exec_result(
            "delay",
            Some(params([("milliseconds", milliseconds.into())])),
        )?;
        Ok(result.is_some())
    }

    pub fn list_tools(&mut self) -> Result<Vec<String>, ClientError> {
        let data = self.data_of(Instruction::ListTools)?;
        Ok(data
            .as_ref()
            .and_then(|data| data.get("tools"))
            .and_then(Value::as_array)
            .map(|tools| {
                tools
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default())
    }

    pub fn context_get(&mut self) -> Result<Vec<HistoryEntry>, ClientError> {
        let data = self.data_of(Instruction::Context(ContextAction::Get))?;
        Ok(data
            .and_then(|mut data| data.get_mut("history").map(Value::take))
            .and_then(|history| serde_json::from_value(history).ok())
            .unwrap_or_default())
    }

    pub fn context_add(&mut self, role: &str, content: &str) -> Result<bool, ClientError> {
        let data = self.data_of(Instruction::Context(ContextAction::Add {
            role: role.to_owned(),
            content: content.to_owned(),
        }))?;
        Ok(data.is_some())
    }

    pub fn context_clear(&mut self) -> Result<bool, ClientError> {
        let data = self.data_of(Instruction::Context(ContextAction::Clear))?;
        Ok(data.is_some())
    }

    /// Stored value, or `Null` when unset or on error.
    pub fn state_get(&mut self, key: &str) -> Result<Value, ClientError> {
        let data = self.data_of(Instruction::State(StateAction::Get {
            key: key.to_owned(),
        }))?;
        Ok(data
            .and_then(|mut data| data.get_mut("value").map(Value::take))
            .unwrap_or(Value::Null))
    }

    pub fn state_set(&mut self, key: &str, value: Value) -> Result<bool, ClientError> {
        let data = self.data_of(Instruction::State(StateAction::Set {
            key: key.to_owned(),
            value,
        }))?;
        Ok(data.is_some())
    }
}

fn successful<'a>(what: &str, response: &'a Response) -> Option<&'a Response> {
    if response.is_ok() {
        Some(response)
    } else {
        debug!(
            what,
            error = response.error_message().unwrap_or_default(),
            "device call failed, using default"
        );
        None
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use clawlink_core::{LineFramer, MemoryLink};
    use serde_json::json;

    use super::*;
    use crate::config::ClientConfig;

    const READY: &str = r#"{"event":"ready","data":{"version":"1.0.0","board":"RP2040","tools":[]}}"#;

    fn connected(replies: &[&str]) -> (Client<MemoryLink>, LineFramer<MemoryLink>) {
        let (host, device) = MemoryLink::pair();
        let mut device = LineFramer::new(device);
        device.write_line(READY).expect("ready");
        for reply in replies {
            device.write_line(reply).expect("reply");
        }
        let config = ClientConfig::default()
            .with_timeout(Duration::from_millis(20))
            .with_retry_count(0)
            .with_poll_interval(Duration::from_millis(1));
        let mut client = Client::with_link(host, config);
        client.connect().expect("connect");
        (client, device)
    }

    fn last_sent(device: &mut LineFramer<MemoryLink>) -> Value {
        let line = device.try_read_line().expect("read").expect("a request");
        serde_json::from_str(&line).expect("json")
    }

    #[test]
    fn gpio_read_unwraps_value_and_sends_params() {
        let (mut client, mut device) =
            connected(&[r#"{"status":"ok","data":{"result":{"pin":25,"value":1}}}"#]);

        assert_eq!(client.gpio_read(25).expect("read"), 1);
        let sent = last_sent(&mut device);
        assert_eq!(sent["tool"], "gpio_read");
        assert_eq!(sent["params"], json!({"pin": 25}));
    }

    #[test]
    fn device_error_collapses_to_default() {
        let (mut client, _device) = connected(&[
            r#"{"status":"error","error":"Unknown tool: adc_read","code":"unknown_tool"}"#,
        ]);
        assert_eq!(client.adc_read(0).expect("adc"), 0);
    }

    #[test]
    fn timeout_collapses_to_default() {
        let (mut client, _device) = connected(&[]);
        assert!(!client.gpio_write(25, true).expect("write"));
        assert!(client.list_tools().expect("tools").is_empty());
    }

    #[test]
    fn i2c_scan_parses_hex_addresses() {
        let (mut client, _device) = connected(&[
            r#"{"status":"ok","data":{"result":{"devices":["0x8","0x3c"],"count":2}}}"#,
        ]);
        assert_eq!(client.i2c_scan().expect("scan"), vec![0x08, 0x3c]);
    }

    #[test]
    fn spi_write_sends_bytes() {
        let (mut client, mut device) =
            connected(&[r#"{"status":"ok","data":{"result":{"written":3}}}"#]);

        assert_eq!(client.spi_write(&[1, 2, 3]).expect("write"), 3);
        assert_eq!(last_sent(&mut device)["params"], json!({"data": [1, 2, 3]}));
    }

    #[test]
    fn context_get_decodes_history() {
        let (mut client, _device) = connected(&[
            r#"{"status":"ok","data":{"history":[{"role":"user","content":"hi"}]}}"#,
        ]);
        assert_eq!(
            client.context_get().expect("history"),
            vec![HistoryEntry::new("user", "hi")]
        );
    }

    #[test]
    fn state_get_returns_stored_value() {
        let (mut client, mut device) = connected(&[
            r#"{"status":"ok","data":{"key":"mode","value":{"speed":3}}}"#,
        ]);
        assert_eq!(client.state_get("mode").expect("state"), json!({"speed": 3}));

        let sent = last_sent(&mut device);
        assert_eq!(sent["type"], "state");
        assert_eq!(sent["action"], "get");
        assert_eq!(sent["key"], "mode");
    }

    #[test]
    fn system_reset_returns_raw_response() {
        let (mut client, _device) = connected(&[]);
        assert!(client.system_reset().expect("reset").is_timeout());
    }

    #[test]
    fn hex_addresses_parse_with_or_without_prefix() {
        assert_eq!(parse_hex_address("0x3c"), Some(0x3c));
        assert_eq!(parse_hex_address("8"), Some(8));
        assert_eq!(parse_hex_address("0xzz"), None);
    }
}
