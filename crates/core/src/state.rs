//! Turn state: the read-only, key-addressable store templates read from.

use crate::error::ResolutionError;
use serde_json::{Map, Value};

/// Read access to conversation/turn state.
///
/// Paths are dot separated (`temp.input`, `conversation.history`).
/// `Ok(None)` means the value is absent; `Err` means the store itself
/// could not answer, which is fatal for the render call.
pub trait TurnState: Send + Sync {
    fn get_value(&self, path: &str) -> Result<Option<Value>, ResolutionError>;
}

/// A JSON-backed state store. Useful for tests and one-shot renders.
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    root: Map<String, Value>,
}

impl MemoryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON object. Non-object values yield an empty store.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(root) => Self { root },
            _ => Self::default(),
        }
    }

    /// Set a value at a dotted path, creating intermediate objects.
    pub fn set_value(&mut self, path: &str, value: Value) {
        let mut segments: Vec<&str> = path.split('.').collect();
        let Some(last) = segments.pop() else {
            return;
        };

        let mut current = &mut self.root;
        for segment in segments {
            let entry = current
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            current = match entry {
                Value::Object(map) => map,
                _ => return,
            };
        }
        current.insert(last.to_string(), value);
    }

    /// Builder-style [`set_value`](Self::set_value).
    pub fn with_value(mut self, path: &str, value: Value) -> Self {
        self.set_value(path, value);
        self
    }
}

impl TurnState for MemoryState {
    fn get_value(&self, path: &str) -> Result<Option<Value>, ResolutionError> {
        let mut segments = path.split('.');
        let Some(first) = segments.next() else {
            return Ok(None);
        };

        let mut current = match self.root.get(first) {
            Some(v) => v,
            None => return Ok(None),
        };
        for segment in segments {
            current = match current.get(segment) {
                Some(v) => v,
                None => return Ok(None),
            };
        }
        Ok(Some(current.clone()))
    }
}
