//! Name → tool lookup and panic-free dispatch.

use std::any::Any;
use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::panic::{self, AssertUnwindSafe};

use clawlink_core::ErrorKind;
use serde_json::Value;
use tracing::warn;

use crate::schema::{ParamError, ToolParams, ToolSpec};

/// Failure of a single tool call. Never crosses the dispatch boundary as a panic.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(#[from] ParamError),

    #[error("{0}")]
    Execution(String),
}

impl ToolError {
    pub fn execution(message: impl fmt::Display) -> Self {
        Self::Execution(message.to_string())
    }

    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownTool(_) => ErrorKind::UnknownTool,
            Self::InvalidParameters(_) => ErrorKind::InvalidParameters,
            Self::Execution(_) => ErrorKind::ExecutionError,
        }
    }
}

pub type ToolHandler = Box<dyn Fn(&ToolParams) -> Result<Value, ToolError> + Send + Sync>;

struct ToolEntry {
    spec: ToolSpec,
    handler: ToolHandler,
}

/// Registered tools in registration order.
#[derive(Default)]
pub struct ToolRegistry {
    entries: Vec<ToolEntry>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool. Re-registering a name replaces the entry in place and
    /// returns the previous spec.
    pub fn register<F>(&mut self, spec: ToolSpec, handler: F) -> Option<ToolSpec>
    where
        F: Fn(&ToolParams) -> Result<Value, ToolError> + Send + Sync + 'static,
    {
        let entry = ToolEntry {
            spec,
            handler: Box::new(handler),
        };
        match self.index.get(&entry.spec.name) {
            Some(&position) => {
                let previous = std::mem::replace(&mut self.entries[position], entry);
                Some(previous.spec)
            }
            None => {
                self.index
                    .insert(entry.spec.name.clone(), self.entries.len());
                self.entries.push(entry);
                None
            }
        }
    }

    /// Add a tool without a parameter schema.
    pub fn register_raw<F>(&mut self, name: impl Into<String>, handler: F) -> Option<ToolSpec>
    where
        F: Fn(&ToolParams) -> Result<Value, ToolError> + Send + Sync + 'static,
    {
        self.register(ToolSpec::untyped(name), handler)
    }

    pub fn unregister(&mut self, name: &str) -> Option<ToolSpec> {
        let position = self.index.remove(name)?;
        let removed = self.entries.remove(position);
        for slot in self.index.values_mut() {
            if *slot > position {
                *slot -= 1;
            }
        }
        Some(removed.spec)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn spec(&self, name: &str) -> Option<&ToolSpec> {
        self.index.get(name).map(|&position| &self.entries[position].spec)
    }

    /// Tool names in registration order.
    pub fn list(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|entry| entry.spec.name.clone())
            .collect()
    }

    pub fn specs(&self) -> impl Iterator<Item = &ToolSpec> {
        self.entries.iter().map(|entry| &entry.spec)
    }

    pub fn non_idempotent(&self) -> Vec<String> {
        self.specs()
            .filter(|spec| !spec.idempotent)
            .map(|spec| spec.name.clone())
            .collect()
    }

    pub fn function_schemas(&self) -> Vec<Value> {
        self.specs().map(ToolSpec::function_schema).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Validate `params` and invoke the tool.
    ///
    /// A panicking handler is reported as [`ToolError::Execution`].
    pub fn call(&self, name: &str, params: &Value) -> Result<Value, ToolError> {
        let entry = self
            .index
            .get(name)
            .map(|&position| &self.entries[position])
            .ok_or_else(|| ToolError::UnknownTool(name.to_owned()))?;

        let params = entry.spec.validate(params)?;

        match panic::catch_unwind(AssertUnwindSafe(|| (entry.handler)(&params))) {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(tool = name, %message, "tool handler panicked");
                Err(ToolError::Execution(message))
            }
        }
    }
}

impl Debug for ToolRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.list())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "tool panicked".to_owned()
    }
}
