//! Conversation history and key/value state held on the device.

use std::collections::HashMap;

use clawlink_core::HistoryEntry;
use serde_json::Value;

pub const DEFAULT_MAX_HISTORY: usize = 10;

/// Bounded history plus an unbounded state map. Owned by one engine.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextStore {
    history: Vec<HistoryEntry>,
    max_history: usize,
    state: HashMap<String, Value>,
}

impl Default for ContextStore {
    fn default() -> Self {
        Self::with_max_history(DEFAULT_MAX_HISTORY)
    }
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            history: Vec::new(),
            max_history,
            state: HashMap::new(),
        }
    }

    /// Append an entry, evicting the oldest once the bound is exceeded.
    pub fn add(&mut self, role: impl Into<String>, content: impl Into<String>) {
        self.history.push(HistoryEntry::new(role, content));
        if self.history.len() > self.max_history {
            let excess = self.history.len() - self.max_history;
            self.history.drain(..excess);
        }
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Drops the history. State is untouched.
    pub fn clear(&mut self) {
        self.history.clear();
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    pub fn set_state(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.state.insert(key.into(), value)
    }

    pub fn get_state(&self, key: &str) -> Option<&Value> {
        self.state.get(key)
    }

    pub fn get_state_or(&self, key: &str, default: Value) -> Value {
        self.state.get(key).cloned().unwrap_or(default)
    }
}
