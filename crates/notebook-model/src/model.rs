//! Notebook document model.
//!
//! Owns the undoable cell list, the document metadata map, and the
//! interchange format versions. Structural cell edits go through the list's
//! own API; the model layers dirty tracking, metadata cursors,
//! (de)serialization, and the never-empty placeholder guard on top.
//!
//! Two notification feeds exist: the cell list's change feed
//! ([`crate::undoable_list::ListEvent`], structural changes) and the
//! model's own feed ([`ModelEvent`], metadata and in-place content edits).
//! Both raise the shared dirty flag.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::mpsc;

use crate::cell::{CellId, CellModel};
use crate::undoable_list::UndoableList;

/// Interchange format version written by `to_json`.
pub const NBFORMAT: u32 = 4;
pub const NBFORMAT_MINOR: u32 = 5;

/// Metadata namespaces that survive a reload even when the incoming
/// payload omits them.
const PROTECTED_METADATA: &[&str] = &["kernelspec", "language_info"];

/// Notification for metadata and in-place content changes.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelEvent {
    ContentChanged,
    MetadataChanged {
        name: String,
        old_value: Option<Value>,
        new_value: Option<Value>,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum NotebookLoadError {
    #[error("unsupported notebook format {0}")]
    UnsupportedFormat(u32),
    #[error("invalid notebook JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Wire shape of a whole notebook document. Cells stay raw here so one
/// unreadable record cannot fail the load of the rest.
#[derive(Serialize, Deserialize)]
struct NotebookRecord {
    nbformat: u32,
    nbformat_minor: u32,
    #[serde(default)]
    metadata: HashMap<String, Value>,
    #[serde(default)]
    cells: Vec<Value>,
}

/// Shared model handle for orchestration and guard tasks.
pub type SharedNotebookModel = Arc<StdMutex<NotebookModel>>;

pub struct NotebookModel {
    cells: UndoableList<CellModel>,
    metadata: HashMap<String, Value>,
    nbformat: u32,
    nbformat_minor: u32,
    dirty: Arc<AtomicBool>,
    event_txs: Vec<mpsc::UnboundedSender<ModelEvent>>,
}

impl Default for NotebookModel {
    fn default() -> Self {
        Self::new()
    }
}

impl NotebookModel {
    /// Create a model holding one default code cell, with empty history
    /// and a clean dirty flag.
    pub fn new() -> Self {
        let dirty = Arc::new(AtomicBool::new(false));
        let mut cells = UndoableList::new();
        cells.set_dirty_flag(Arc::clone(&dirty));

        let mut model = NotebookModel {
            cells,
            metadata: HashMap::new(),
            nbformat: NBFORMAT,
            nbformat_minor: NBFORMAT_MINOR,
            dirty,
            event_txs: Vec::new(),
        };
        model.ensure_placeholder_cell();
        model.dirty.store(false, Ordering::Relaxed);
        model
    }

    pub fn into_shared(self) -> SharedNotebookModel {
        Arc::new(StdMutex::new(self))
    }

    /// The owned cell collection. Structural mutation routes through the
    /// collection's own API.
    pub fn cells(&self) -> &UndoableList<CellModel> {
        &self.cells
    }

    pub fn cells_mut(&mut self) -> &mut UndoableList<CellModel> {
        &mut self.cells
    }

    pub fn nbformat(&self) -> (u32, u32) {
        (self.nbformat, self.nbformat_minor)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Relaxed)
    }

    pub fn mark_clean(&self) {
        self.dirty.store(false, Ordering::Relaxed);
    }

    /// Receive [`ModelEvent`]s for metadata and in-place content changes.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<ModelEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.event_txs.push(tx);
        rx
    }

    fn emit(&mut self, event: ModelEvent) {
        self.event_txs.retain(|tx| tx.send(event.clone()).is_ok());
    }

    // ── Metadata ────────────────────────────────────────────────────

    pub fn metadata(&self) -> &HashMap<String, Value> {
        &self.metadata
    }

    pub fn get_metadata(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// Read/write handle scoped to one metadata key.
    pub fn metadata_cursor(&mut self, key: &str) -> MetadataCursor<'_> {
        MetadataCursor {
            model: self,
            key: key.to_string(),
        }
    }

    // ── Cells ───────────────────────────────────────────────────────

    pub fn find_cell_index(&self, cell_id: &CellId) -> Option<usize> {
        self.cells.iter().position(|c| c.id() == cell_id)
    }

    /// In-place source edit. Content edits are the editor's concern and do
    /// not enter the cell list's undo history.
    pub fn update_cell_source(&mut self, cell_id: &CellId, source: &str) -> bool {
        let Some(index) = self.find_cell_index(cell_id) else {
            return false;
        };
        let Some(cell) = self.cells.get_mut(index) else {
            return false;
        };
        if cell.source() == source {
            return true;
        }
        cell.set_source(source);
        self.dirty.store(true, Ordering::Relaxed);
        self.emit(ModelEvent::ContentChanged);
        true
    }

    /// Append one default code cell if the list has drained to zero.
    ///
    /// The insertion bypasses undo history: the placeholder is synthesized
    /// state, not a user edit. Callers must not invoke this from inside a
    /// change-notification turn; [`spawn_placeholder_guard`] defers it to a
    /// later tick.
    pub fn ensure_placeholder_cell(&mut self) {
        if !self.cells.is_empty() {
            return;
        }
        self.cells.begin_compound(false);
        self.cells.push_back(CellModel::new_code(""));
        self.cells.end_compound();
    }

    // ── Serialization ───────────────────────────────────────────────

    /// Snapshot the document to the interchange format.
    pub fn to_json(&self) -> Value {
        let cells: Vec<Value> = self
            .cells
            .iter()
            .filter_map(|cell| serde_json::to_value(cell.to_record()).ok())
            .collect();
        serde_json::json!({
            "nbformat": self.nbformat,
            "nbformat_minor": self.nbformat_minor,
            "metadata": self.metadata,
            "cells": cells,
        })
    }

    /// Replace the document's contents from the interchange format.
    ///
    /// Metadata is reconciled key by key (keys absent from the payload are
    /// dropped unless protected); the cell collection is replaced wholesale
    /// as one batched change; unreadable cell records are skipped. Undo
    /// history is cleared afterwards so undo cannot revert the load.
    pub fn from_json(&mut self, value: &Value) -> Result<(), NotebookLoadError> {
        let record: NotebookRecord = serde_json::from_value(value.clone())?;
        if record.nbformat != NBFORMAT {
            return Err(NotebookLoadError::UnsupportedFormat(record.nbformat));
        }
        self.nbformat = record.nbformat;
        self.nbformat_minor = record.nbformat_minor;

        let stale: Vec<String> = self
            .metadata
            .keys()
            .filter(|key| {
                !record.metadata.contains_key(*key)
                    && !PROTECTED_METADATA.contains(&key.as_str())
            })
            .cloned()
            .collect();
        for key in stale {
            self.metadata_cursor(&key).remove();
        }
        for (key, value) in &record.metadata {
            self.metadata_cursor(key).set(value.clone());
        }

        let total = record.cells.len();
        let cells: Vec<CellModel> = record
            .cells
            .iter()
            .filter_map(|raw| match serde_json::from_value(raw.clone()) {
                Ok(rec) => Some(CellModel::from_record(&rec)),
                Err(e) => {
                    warn!("[model] Skipping unreadable cell record: {}", e);
                    None
                }
            })
            .collect();
        debug!("[model] Loaded {}/{} cell records", cells.len(), total);
        self.cells.replace_all(cells);

        self.cells.clear_undo();
        self.emit(ModelEvent::ContentChanged);
        Ok(())
    }

    /// Write the document to disk as pretty-printed JSON and mark clean.
    pub fn save_to_file(&self, path: &Path) -> Result<(), NotebookLoadError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.to_json())?;
        std::fs::write(path, format!("{json}\n"))?;
        self.mark_clean();
        info!(
            "[model] Saved {} cells to {}",
            self.cells.len(),
            path.display()
        );
        Ok(())
    }

    /// Load the document from disk, replacing the current contents, and
    /// mark clean.
    pub fn load_from_file(&mut self, path: &Path) -> Result<(), NotebookLoadError> {
        let contents = std::fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&contents)?;
        self.from_json(&value)?;
        self.mark_clean();
        info!(
            "[model] Loaded {} cells from {}",
            self.cells.len(),
            path.display()
        );
        Ok(())
    }
}

/// Read/write handle scoped to one metadata key.
pub struct MetadataCursor<'m> {
    model: &'m mut NotebookModel,
    key: String,
}

impl MetadataCursor<'_> {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn get(&self) -> Option<&Value> {
        self.model.metadata.get(&self.key)
    }

    /// Write the key's value. Deep-compares against the current value:
    /// unchanged writes are no-ops. Returns the replaced value when a
    /// change was applied.
    pub fn set(&mut self, value: Value) -> Option<Value> {
        let old = self.model.metadata.get(&self.key).cloned();
        if old.as_ref() == Some(&value) {
            return None;
        }
        self.model.metadata.insert(self.key.clone(), value.clone());
        self.model.dirty.store(true, Ordering::Relaxed);
        self.model.emit(ModelEvent::ContentChanged);
        self.model.emit(ModelEvent::MetadataChanged {
            name: self.key.clone(),
            old_value: old.clone(),
            new_value: Some(value),
        });
        old
    }

    /// Drop the key, returning its value if it was present.
    pub fn remove(&mut self) -> Option<Value> {
        let old = self.model.metadata.remove(&self.key)?;
        self.model.dirty.store(true, Ordering::Relaxed);
        self.model.emit(ModelEvent::ContentChanged);
        self.model.emit(ModelEvent::MetadataChanged {
            name: self.key.clone(),
            old_value: Some(old.clone()),
            new_value: None,
        });
        Some(old)
    }
}

/// Spawn the never-empty guard for a shared model.
///
/// Subscribes to the cell list's change feed and appends one default code
/// cell whenever the list has drained to zero. The insertion happens on a
/// later tick of the owning runtime, never inside the mutation that emptied
/// the list, so change handlers never observe a mutation of the collection
/// they are being notified about.
pub fn spawn_placeholder_guard(model: &SharedNotebookModel) -> tokio::task::JoinHandle<()> {
    let mut rx = model.lock().unwrap().cells_mut().subscribe();
    let model = Arc::clone(model);
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if event.new_len == 0 {
                info!("[guard] Cell list drained, inserting placeholder cell");
                model.lock().unwrap().ensure_placeholder_cell();
            }
        }
        debug!("[guard] Cell change feed closed");
    })
}
