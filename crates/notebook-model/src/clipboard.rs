//! Opaque clipboard collaborator: a tagged key/value store shared between
//! notebook surfaces.

use serde_json::Value;
use std::collections::HashMap;

/// Tag under which serialized cell records travel.
pub const CELLS_CLIPBOARD_TYPE: &str = "application/vnd.jupyter.cells";

#[derive(Debug, Clone, Default)]
pub struct Clipboard {
    data: HashMap<String, Value>,
}

impl Clipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_data(&mut self, tag: &str, data: Value) {
        self.data.insert(tag.to_string(), data);
    }

    pub fn get_data(&self, tag: &str) -> Option<&Value> {
        self.data.get(tag)
    }

    pub fn has_data(&self, tag: &str) -> bool {
        self.data.contains_key(tag)
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }
}
