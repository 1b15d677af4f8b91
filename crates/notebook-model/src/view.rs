//! View-collaborator state consumed by the cell actions.
//!
//! The rendering widget owns scrolling and the per-cell widgets; the pieces
//! the orchestrator needs are the active cell index, the selection set, the
//! interaction mode, and a scroll-to-active request latch. The orchestrator
//! consumes this state, it never owns the widget.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Whether keystrokes act on the notebook or on the active cell's editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionMode {
    Command,
    Edit,
}

#[derive(Debug, Clone)]
pub struct ViewState {
    active_index: Option<usize>,
    selected: BTreeSet<usize>,
    pub mode: InteractionMode,
    scroll_pending: bool,
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewState {
    pub fn new() -> Self {
        ViewState {
            active_index: None,
            selected: BTreeSet::new(),
            mode: InteractionMode::Command,
            scroll_pending: false,
        }
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active_index
    }

    pub fn set_active(&mut self, index: Option<usize>) {
        self.active_index = index;
    }

    pub fn select(&mut self, index: usize) {
        self.selected.insert(index);
    }

    pub fn deselect(&mut self, index: usize) {
        self.selected.remove(&index);
    }

    /// Membership in the multi-select set; the active cell is not implied.
    pub fn is_selected(&self, index: usize) -> bool {
        self.selected.contains(&index)
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }

    pub fn has_multi_select(&self) -> bool {
        !self.selected.is_empty()
    }

    /// Indices the next action applies to: the selection set joined with
    /// the active cell, in document order.
    pub fn effective_selection(&self) -> Vec<usize> {
        let mut indices = self.selected.clone();
        if let Some(active) = self.active_index {
            indices.insert(active);
        }
        indices.into_iter().collect()
    }

    /// Ask the widget to bring the active cell into view.
    pub fn request_scroll(&mut self) {
        self.scroll_pending = true;
    }

    /// Consume a pending scroll request.
    pub fn take_scroll_request(&mut self) -> bool {
        std::mem::replace(&mut self.scroll_pending, false)
    }
}
