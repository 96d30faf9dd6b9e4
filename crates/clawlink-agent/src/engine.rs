//! Instruction dispatch.
//!
//! [`AgentEngine`] turns one Instruction into exactly one Response. Every
//! failure, from an unparsable line to a panicking tool, comes back as an
//! error Response; nothing escapes as a panic or `Err`.

use std::fmt;

use clawlink_core::{
    ContextAction, DeviceInfo, Event, Instruction, ProtocolError, Request, Response, StateAction,
};
use serde_json::{json, Value};
use tracing::debug;

use crate::board::{lock_board, SharedBoard, SimulatedBoard};
use crate::config::AgentConfig;
use crate::context::ContextStore;
use crate::events::EventBus;
use crate::registry::ToolRegistry;
use crate::tools::register_builtin_tools;

/// Registry, stores and event bus of one device.
pub struct AgentEngine {
    registry: ToolRegistry,
    context: ContextStore,
    events: EventBus,
    board: SharedBoard,
    config: AgentConfig,
}

impl AgentEngine {
    /// Engine over a [`SimulatedBoard`] with the built-in tools.
    pub fn new(config: AgentConfig) -> Self {
        Self::with_board(SimulatedBoard::default().shared(), config)
    }

    pub fn with_board(board: SharedBoard, config: AgentConfig) -> Self {
        let events = EventBus::new(config.event_capacity);
        let mut registry = ToolRegistry::new();
        register_builtin_tools(&mut registry, &board, &events, &config.version);
        Self {
            registry,
            context: ContextStore::with_max_history(config.max_history),
            events,
            board,
            config,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ToolRegistry {
        &mut self.registry
    }

    pub fn context(&self) -> &ContextStore {
        &self.context
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn board(&self) -> &SharedBoard {
        &self.board
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            version: self.config.version.clone(),
            board: lock_board(&self.board).name().to_owned(),
            tools: self.registry.list(),
            non_idempotent: Some(self.registry.non_idempotent()),
        }
    }

    pub fn ready_event(&self) -> Result<Event, serde_json::Error> {
        self.device_info().to_event()
    }

    /// Decode and dispatch one received line.
    pub fn execute_line(&mut self, line: &str) -> Response {
        match Request::decode(line) {
            Ok(request) => self.execute_request(request),
            Err(rejected) => {
                debug!(error = %rejected.error, "rejected instruction");
                Response::from(rejected.error).with_id(rejected.id)
            }
        }
    }

    /// Dispatch a decoded request and echo its id.
    pub fn execute_request(&mut self, request: Request) -> Response {
        self.execute(&request.instruction).with_id(request.id)
    }

    pub fn execute(&mut self, instruction: &Instruction) -> Response {
        match instruction {
            Instruction::Exec { tool, params } => {
                let params = params.clone().map(Value::Object).unwrap_or(Value::Null);
                match self.registry.call(tool, &params) {
                    Ok(result) => Response::ok(json!({"result": result})),
                    Err(error) => {
                        debug!(tool = %tool, %error, "tool call failed");
                        Response::error(error.kind(), error.to_string())
                    }
                }
            }
            Instruction::ListTools => Response::ok(json!({"tools": self.registry.list()})),
            Instruction::Context(action) => self.execute_context(action),
            Instruction::State(action) => self.execute_state(action),
            Instruction::Register { name } => {
                debug!(name = ?name, "dynamic registration refused");
                Response::from(ProtocolError::RegistrationUnsupported)
            }
        }
    }

    fn execute_context(&mut self, action: &ContextAction) -> Response {
        match action {
            ContextAction::Get => Response::ok(json!({"history": self.context.history()})),
            ContextAction::Add { role, content } => {
                self.context.add(role.as_str(), content.as_str());
                Response::ok(json!({"added": true}))
            }
            ContextAction::Clear => {
                self.context.clear();
                Response::ok(json!({"cleared": true}))
            }
        }
    }

    fn execute_state(&mut self, action: &StateAction) -> Response {
        match action {
            StateAction::Get { key } => Response::ok(json!({
                "key": key,
                "value": self.context.get_state_or(key, Value::Null),
            })),
            StateAction::Set { key, value } => {
                self.context.set_state(key.as_str(), value.clone());
                Response::ok(json!({"key": key, "value": value}))
            }
        }
    }
}

impl fmt::Debug for AgentEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentEngine")
            .field("registry", &self.registry)
            .field("context", &self.context)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for AgentEngine {
    fn default() -> Self {
        Self::new(AgentConfig::default())
    }
}
