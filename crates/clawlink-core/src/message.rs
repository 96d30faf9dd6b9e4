//! # Protocol Messages
//!
//! Typed forms of everything that crosses the link.
//!
//! | Direction | Message | Discriminator |
//! |-----------|---------|---------------|
//! | host → device | [`Request`] wrapping an [`Instruction`] | `type` |
//! | device → host | [`Response`] | `status` |
//! | device → host | [`Event`] | `event` |
//!
//! Decoding works on `serde_json::Value` rather than derived `Deserialize`
//! impls so that a bad instruction is reported with the precise field that is
//! wrong (`Missing field: tool`) instead of a serde error string.
//!
//! A device message must carry exactly one of `status` or `event`. That check
//! runs before any other field is read, so an Event can never be mistaken for
//! a Response.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::{ErrorKind, ProtocolError};

/// Name of the event a device emits once at startup.
pub const READY_EVENT: &str = "ready";

/// Built-in tools with side effects that must not be repeated blindly.
///
/// Used by the host when a device does not advertise its own list.
pub const BUILTIN_NON_IDEMPOTENT_TOOLS: &[&str] = &[
    "pwm_start",
    "pwm_stop",
    "i2c_write",
    "spi_read",
    "spi_write",
    "system_reset",
];

/// One role/content pair in the device-held conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: String,
    pub content: String,
}

impl HistoryEntry {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextAction {
    Get,
    Add { role: String, content: String },
    Clear,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StateAction {
    Get { key: String },
    Set { key: String, value: Value },
}

/// A structured command sent from host to device.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Invoke a registered tool. `None` params means "call with no arguments".
    Exec {
        tool: String,
        params: Option<Map<String, Value>>,
    },
    ListTools,
    Context(ContextAction),
    State(StateAction),
    /// Runtime tool registration. Always refused by the device.
    Register { name: Option<String> },
}

impl Instruction {
    pub fn exec(tool: impl Into<String>, params: Option<Map<String, Value>>) -> Self {
        Self::Exec {
            tool: tool.into(),
            params,
        }
    }

    /// Wire value of the `type` discriminator.
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Exec { .. } => "exec",
            Self::ListTools => "list_tools",
            Self::Context(_) => "context",
            Self::State(_) => "state",
            Self::Register { .. } => "register",
        }
    }

    /// Whether re-sending this instruction after a timeout is harmless.
    ///
    /// `tool_is_idempotent` answers for `exec` instructions; appending to the
    /// history is never idempotent.
    pub fn is_idempotent(&self, tool_is_idempotent: impl Fn(&str) -> bool) -> bool {
        match self {
            Self::Exec { tool, .. } => tool_is_idempotent(tool),
            Self::Context(ContextAction::Add { .. }) => false,
            _ => true,
        }
    }

    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("type".into(), Value::from(self.kind_name()));
        match self {
            Self::Exec { tool, params } => {
                obj.insert("tool".into(), Value::from(tool.as_str()));
                if let Some(params) = params {
                    obj.insert("params".into(), Value::Object(params.clone()));
                }
            }
            Self::ListTools => {}
            Self::Context(action) => match action {
                ContextAction::Get => {
                    obj.insert("action".into(), Value::from("get"));
                }
                ContextAction::Add { role, content } => {
                    obj.insert("action".into(), Value::from("add"));
                    obj.insert("role".into(), Value::from(role.as_str()));
                    obj.insert("content".into(), Value::from(content.as_str()));
                }
                ContextAction::Clear => {
                    obj.insert("action".into(), Value::from("clear"));
                }
            },
            Self::State(action) => match action {
                StateAction::Get { key } => {
                    obj.insert("action".into(), Value::from("get"));
                    obj.insert("key".into(), Value::from(key.as_str()));
                }
                StateAction::Set { key, value } => {
                    obj.insert("action".into(), Value::from("set"));
                    obj.insert("key".into(), Value::from(key.as_str()));
                    obj.insert("value".into(), value.clone());
                }
            },
            Self::Register { name } => {
                if let Some(name) = name {
                    obj.insert("name".into(), Value::from(name.as_str()));
                }
            }
        }
        Value::Object(obj)
    }

    pub fn from_value(value: &Value) -> Result<Self, ProtocolError> {
        let obj = value.as_object().ok_or(ProtocolError::InvalidFormat)?;
        Self::from_map(obj)
    }

    pub fn from_map(obj: &Map<String, Value>) -> Result<Self, ProtocolError> {
        let kind = required_str(obj, "type")?;
        match kind.as_str() {
            "exec" => {
                let tool = required_str(obj, "tool")?;
                let params = match obj.get("params") {
                    None | Some(Value::Null) => None,
                    Some(Value::Object(params)) => Some(params.clone()),
                    Some(_) => {
                        return Err(ProtocolError::InvalidField {
                            field: "params",
                            expected: "object",
                        })
                    }
                };
                Ok(Self::Exec { tool, params })
            }
            "list_tools" => Ok(Self::ListTools),
            "context" => {
                let action = required_str(obj, "action")?;
                let action = match action.as_str() {
                    "get" => ContextAction::Get,
                    "add" => ContextAction::Add {
                        role: required_str(obj, "role")?,
                        content: required_str(obj, "content")?,
                    },
                    "clear" => ContextAction::Clear,
                    _ => {
                        return Err(ProtocolError::UnknownAction {
                            kind: "context",
                            action,
                        })
                    }
                };
                Ok(Self::Context(action))
            }
            "state" => {
                let action = required_str(obj, "action")?;
                let action = match action.as_str() {
                    "get" => StateAction::Get {
                        key: required_str(obj, "key")?,
                    },
                    "set" => StateAction::Set {
                        key: required_str(obj, "key")?,
                        value: obj
                            .get("value")
                            .cloned()
                            .ok_or(ProtocolError::MissingField("value"))?,
                    },
                    _ => {
                        return Err(ProtocolError::UnknownAction {
                            kind: "state",
                            action,
                        })
                    }
                };
                Ok(Self::State(action))
            }
            "register" => Ok(Self::Register {
                name: optional_str(obj, "name")?,
            }),
            _ => Err(ProtocolError::UnknownCommand(kind)),
        }
    }
}

impl Serialize for Instruction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// An [`Instruction`] plus its optional correlation id.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub id: Option<String>,
    pub instruction: Instruction,
}

/// A line the device could not turn into a [`Request`].
///
/// Keeps the id when it was readable so the error Response can still echo it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{error}")]
pub struct RejectedRequest {
    pub id: Option<String>,
    pub error: ProtocolError,
}

impl RejectedRequest {
    fn anonymous(error: ProtocolError) -> Self {
        Self { id: None, error }
    }
}

impl Request {
    pub fn new(instruction: Instruction) -> Self {
        Self {
            id: None,
            instruction,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn to_value(&self) -> Value {
        let mut value = self.instruction.to_value();
        if let (Some(id), Value::Object(obj)) = (&self.id, &mut value) {
            obj.insert("id".into(), Value::from(id.as_str()));
        }
        value
    }

    /// Decode one received line.
    pub fn decode(line: &str) -> Result<Self, RejectedRequest> {
        let value: Value = serde_json::from_str(line)
            .map_err(|_| RejectedRequest::anonymous(ProtocolError::InvalidJson))?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self, RejectedRequest> {
        let obj = value
            .as_object()
            .ok_or_else(|| RejectedRequest::anonymous(ProtocolError::InvalidFormat))?;
        let id = optional_str(obj, "id").map_err(RejectedRequest::anonymous)?;
        match Instruction::from_map(obj) {
            Ok(instruction) => Ok(Self { id, instruction }),
            Err(error) => Err(RejectedRequest { id, error }),
        }
    }
}

impl Serialize for Request {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// The single structured reply to one instruction.
///
/// `Ok` always carries `data` (possibly `null`) and never `error`; `Error`
/// always carries `error` and never `data`.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Ok {
        data: Value,
        id: Option<String>,
    },
    Error {
        error: String,
        kind: Option<ErrorKind>,
        id: Option<String>,
    },
}

impl Response {
    pub fn ok(data: Value) -> Self {
        Self::Ok { data, id: None }
    }

    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
            kind: Some(kind),
            id: None,
        }
    }

    /// Synthetic reply the host returns once every attempt has timed out.
    pub fn timeout() -> Self {
        Self::error(ErrorKind::Timeout, "Timeout")
    }

    pub fn with_id(mut self, request_id: Option<String>) -> Self {
        match &mut self {
            Self::Ok { id, .. } | Self::Error { id, .. } => *id = request_id,
        }
        self
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Ok { id, .. } | Self::Error { id, .. } => id.as_deref(),
        }
    }

    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            Self::Ok { data, .. } => Some(data),
            Self::Error { .. } => None,
        }
    }

    /// `data.result` of a successful `exec` reply.
    pub fn result(&self) -> Option<&Value> {
        self.data().and_then(|data| data.get("result"))
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Ok { .. } => None,
            Self::Error { error, .. } => Some(error),
        }
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Ok { .. } => None,
            Self::Error { kind, .. } => *kind,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.kind() == Some(ErrorKind::Timeout)
    }

    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        match self {
            Self::Ok { data, id } => {
                obj.insert("status".into(), Value::from("ok"));
                obj.insert("data".into(), data.clone());
                if let Some(id) = id {
                    obj.insert("id".into(), Value::from(id.as_str()));
                }
            }
            Self::Error { error, kind, id } => {
                obj.insert("status".into(), Value::from("error"));
                obj.insert("error".into(), Value::from(error.as_str()));
                if let Some(kind) = kind {
                    obj.insert("code".into(), Value::from(kind.as_str()));
                }
                if let Some(id) = id {
                    obj.insert("id".into(), Value::from(id.as_str()));
                }
            }
        }
        Value::Object(obj)
    }

    pub fn from_map(obj: &Map<String, Value>) -> Result<Self, ProtocolError> {
        let status = required_str(obj, "status")?;
        let id = optional_str(obj, "id")?;
        match status.as_str() {
            "ok" => {
                if obj.contains_key("error") {
                    return Err(ProtocolError::MalformedResponse("ok response carries error"));
                }
                let data = obj
                    .get("data")
                    .cloned()
                    .ok_or(ProtocolError::MalformedResponse("ok response lacks data"))?;
                Ok(Self::Ok { data, id })
            }
            "error" => {
                if obj.contains_key("data") {
                    return Err(ProtocolError::MalformedResponse("error response carries data"));
                }
                let error = match obj.get("error") {
                    Some(Value::String(error)) => error.clone(),
                    _ => {
                        return Err(ProtocolError::MalformedResponse(
                            "error response lacks error message",
                        ))
                    }
                };
                let kind = optional_str(obj, "code")?
                    .as_deref()
                    .and_then(ErrorKind::from_code);
                Ok(Self::Error { error, kind, id })
            }
            _ => Err(ProtocolError::InvalidStatus(status)),
        }
    }
}

impl From<ProtocolError> for Response {
    fn from(error: ProtocolError) -> Self {
        Self::error(error.kind(), error.to_string())
    }
}

impl Serialize for Response {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// Unsolicited device → host message.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub name: String,
    pub data: Value,
}

impl Event {
    pub fn new(name: impl Into<String>, data: Value) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.name == READY_EVENT
    }

    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("event".into(), Value::from(self.name.as_str()));
        obj.insert("data".into(), self.data.clone());
        Value::Object(obj)
    }

    pub fn from_map(obj: &Map<String, Value>) -> Result<Self, ProtocolError> {
        let name = required_str(obj, "event")?;
        let data = obj.get("data").cloned().unwrap_or(Value::Null);
        Ok(Self { name, data })
    }
}

impl Serialize for Event {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// Anything a device may write to the host.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceMessage {
    Response(Response),
    Event(Event),
}

impl DeviceMessage {
    pub fn decode(line: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(line).map_err(|_| ProtocolError::InvalidJson)?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self, ProtocolError> {
        let obj = value.as_object().ok_or(ProtocolError::InvalidFormat)?;
        match (obj.contains_key("status"), obj.contains_key("event")) {
            (true, false) => Response::from_map(obj).map(Self::Response),
            (false, true) => Event::from_map(obj).map(Self::Event),
            (true, true) => Err(ProtocolError::AmbiguousDiscriminator),
            (false, false) => Err(ProtocolError::MissingDiscriminator),
        }
    }
}

impl Serialize for DeviceMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Response(response) => response.serialize(serializer),
            Self::Event(event) => event.serialize(serializer),
        }
    }
}

/// Payload of the Ready event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub version: String,
    pub board: String,
    pub tools: Vec<String>,
    /// Tools the device declares unsafe to retry. Older firmware omits it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub non_idempotent: Option<Vec<String>>,
}

impl DeviceInfo {
    pub fn from_event(event: &Event) -> Result<Self, ProtocolError> {
        if !event.is_ready() {
            return Err(ProtocolError::UnknownCommand(event.name.clone()));
        }
        serde_json::from_value(event.data.clone()).map_err(|_| ProtocolError::InvalidField {
            field: "data",
            expected: "ready payload",
        })
    }

    pub fn to_event(&self) -> Result<Event, serde_json::Error> {
        Ok(Event::new(READY_EVENT, serde_json::to_value(self)?))
    }

    /// Falls back to [`BUILTIN_NON_IDEMPOTENT_TOOLS`] when the device did not advertise a list.
    pub fn is_tool_idempotent(&self, tool: &str) -> bool {
        match &self.non_idempotent {
            Some(tools) => !tools.iter().any(|name| name == tool),
            None => !BUILTIN_NON_IDEMPOTENT_TOOLS.contains(&tool),
        }
    }
}

fn required_str(obj: &Map<String, Value>, field: &'static str) -> Result<String, ProtocolError> {
    optional_str(obj, field)?.ok_or(ProtocolError::MissingField(field))
}

fn optional_str(
    obj: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<String>, ProtocolError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(_) => Err(ProtocolError::InvalidField {
            field,
            expected: "string",
        }),
    }
}
