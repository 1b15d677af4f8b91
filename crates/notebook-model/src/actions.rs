//! Cell actions: stateless operations over a notebook panel.
//!
//! Every operation follows the same guard: no model, no active cell, or an
//! active index past the end of the list is a silent no-op (run variants
//! additionally report `false`). Multi-step mutations are bracketed in
//! exactly one compound operation so a single undo reverts the whole
//! logical action.

use futures::future::join_all;
use log::{debug, warn};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::cell::{CellId, CellModel, CellRecord, CellType};
use crate::clipboard::{Clipboard, CELLS_CLIPBOARD_TYPE};
use crate::execution::{ExecutionHandle, PayloadEntry, SET_NEXT_INPUT};
use crate::model::{NotebookModel, SharedNotebookModel};
use crate::view::{InteractionMode, ViewState};

/// A notebook surface the actions operate on: the (possibly absent)
/// document model plus the view-collaborator state.
pub struct NotebookPanel {
    pub model: Option<SharedNotebookModel>,
    pub view: ViewState,
}

impl NotebookPanel {
    pub fn new(model: SharedNotebookModel) -> Self {
        let mut view = ViewState::new();
        if !model.lock().unwrap().cells().is_empty() {
            view.set_active(Some(0));
        }
        NotebookPanel {
            model: Some(model),
            view,
        }
    }

    /// A panel with no document attached; every action no-ops.
    pub fn detached() -> Self {
        NotebookPanel {
            model: None,
            view: ViewState::new(),
        }
    }
}

/// Uniform guard: model present and active index in range.
fn guard(panel: &NotebookPanel) -> Option<(SharedNotebookModel, usize)> {
    let model = panel.model.as_ref()?;
    let active = panel.view.active_index()?;
    if active >= model.lock().unwrap().cells().len() {
        return None;
    }
    Some((Arc::clone(model), active))
}

/// Effective selection filtered to in-range indices, in document order.
fn selected_indices(panel: &NotebookPanel, len: usize) -> Vec<usize> {
    panel
        .view
        .effective_selection()
        .into_iter()
        .filter(|&i| i < len)
        .collect()
}

fn snap_to_char_boundary(source: &str, offset: usize) -> usize {
    let mut offset = offset.min(source.len());
    while offset > 0 && !source.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

/// Split the active cell at `offset` (a byte offset into its source,
/// snapped back to a char boundary).
///
/// The first half keeps the cell's identity with outputs cleared; the
/// second half gets a fresh identity, keeps the outputs, and has leading
/// whitespace stripped. One compound operation; the second half becomes
/// active.
pub fn split_cell(panel: &mut NotebookPanel, offset: usize) {
    let Some((model, active)) = guard(panel) else {
        return;
    };
    let mut m = model.lock().unwrap();
    let Some(cell) = m.cells().get(active).cloned() else {
        return;
    };

    let source = cell.source().to_string();
    let offset = snap_to_char_boundary(&source, offset);
    let head = source[..offset].to_string();
    let tail = source[offset..].trim_start().to_string();

    let mut first = cell.clone();
    first.set_source(head);
    first.clear_execution();
    first.set_rendered(false);

    let mut second = cell.with_new_id();
    second.set_source(tail);
    second.set_rendered(false);

    let cells = m.cells_mut();
    cells.begin_compound(true);
    cells.set(active, first);
    cells.insert(active + 1, second);
    cells.end_compound();
    drop(m);

    panel.view.clear_selection();
    panel.view.set_active(Some(active + 1));
}

/// Merge the selected cells into the active cell, joining sources with a
/// blank line. A single-cell selection merges with the cell below (no-op
/// when the active cell is last). One compound operation.
pub fn merge_cells(panel: &mut NotebookPanel) {
    let Some((model, active)) = guard(panel) else {
        return;
    };
    let mut m = model.lock().unwrap();
    let len = m.cells().len();
    let mut targets = selected_indices(panel, len);
    if targets.len() <= 1 {
        if active + 1 >= len {
            return;
        }
        targets = vec![active, active + 1];
    }

    let joined = targets
        .iter()
        .filter_map(|&i| m.cells().get(i))
        .map(|c| c.source().to_string())
        .collect::<Vec<_>>()
        .join("\n\n");

    let Some(primary) = m.cells().get(active).cloned() else {
        return;
    };
    let mut merged = primary.with_new_id();
    merged.set_source(joined);
    merged.clear_execution();
    merged.set_rendered(false);

    let cells = m.cells_mut();
    cells.begin_compound(true);
    cells.set(active, merged);
    for &i in targets.iter().rev() {
        if i != active {
            cells.remove_at(i);
        }
    }
    cells.end_compound();
    drop(m);

    let merged_index = active - targets.iter().filter(|&&i| i < active).count();
    panel.view.clear_selection();
    panel.view.set_active(Some(merged_index));
}

/// Remove the selected cells in one compound operation and select the cell
/// that followed the last deleted one. The model's zero-length guard
/// independently restores a placeholder when the list drains.
pub fn delete_cells(panel: &mut NotebookPanel) {
    let Some((model, _)) = guard(panel) else {
        return;
    };
    let mut m = model.lock().unwrap();
    let len = m.cells().len();
    let targets = selected_indices(panel, len);
    let Some(&last) = targets.last() else {
        return;
    };

    let cells = m.cells_mut();
    cells.begin_compound(true);
    for &i in targets.iter().rev() {
        cells.remove_at(i);
    }
    cells.end_compound();
    let remaining = m.cells().len();
    drop(m);

    panel.view.clear_selection();
    let followed = (last + 1).saturating_sub(targets.len());
    let active = if remaining == 0 {
        // Placeholder lands at index 0 on the next tick.
        0
    } else {
        followed.min(remaining - 1)
    };
    panel.view.set_active(Some(active));
}

/// Move each selected cell up one position unless the neighbor above is
/// also selected, so contiguous blocks travel as a unit and pin at the top.
/// One compound operation; selection and active index follow their cells.
pub fn move_cells_up(panel: &mut NotebookPanel) {
    shift_cells(panel, Direction::Up)
}

/// Mirror image of [`move_cells_up`].
pub fn move_cells_down(panel: &mut NotebookPanel) {
    shift_cells(panel, Direction::Down)
}

enum Direction {
    Up,
    Down,
}

fn shift_cells(panel: &mut NotebookPanel, direction: Direction) {
    let Some((model, active)) = guard(panel) else {
        return;
    };
    let mut m = model.lock().unwrap();
    let len = m.cells().len();
    let targets = selected_indices(panel, len);

    // Scan in the direction away from the move so earlier swaps never
    // disturb the indices still to be visited.
    let scan: Vec<usize> = match direction {
        Direction::Up => targets.clone(),
        Direction::Down => targets.iter().rev().copied().collect(),
    };

    let mut new_positions = BTreeSet::new();
    let mut moved_active = active;
    let cells = m.cells_mut();
    cells.begin_compound(true);
    for i in scan {
        let dest = match direction {
            Direction::Up if i > 0 && !new_positions.contains(&(i - 1)) => i - 1,
            Direction::Down if i + 1 < len && !new_positions.contains(&(i + 1)) => i + 1,
            _ => i,
        };
        if dest != i {
            cells.move_item(i, dest);
        }
        new_positions.insert(dest);
        if i == active {
            moved_active = dest;
        }
    }
    cells.end_compound();
    drop(m);

    let keep_selection = panel.view.has_multi_select();
    panel.view.clear_selection();
    if keep_selection {
        for &p in &new_positions {
            panel.view.select(p);
        }
    }
    panel.view.set_active(Some(moved_active));
}

/// Convert every selected cell whose type differs from `target`, seeding
/// the replacement from the old cell's record. One compound operation;
/// cells converted to markdown are left unrendered.
pub fn change_cell_type(panel: &mut NotebookPanel, target: CellType) {
    let Some((model, _)) = guard(panel) else {
        return;
    };
    let mut m = model.lock().unwrap();
    let len = m.cells().len();
    let targets = selected_indices(panel, len);

    let cells = m.cells_mut();
    cells.begin_compound(true);
    for &i in &targets {
        let replacement = match cells.get(i) {
            Some(cell) if cell.cell_type() != target => {
                CellModel::with_type(target, &cell.to_record())
            }
            _ => continue,
        };
        cells.set(i, replacement);
    }
    cells.end_compound();
    drop(m);

    panel.view.clear_selection();
}

/// Rewrite each selected cell's leading `#`-run (or leading whitespace) to
/// a level-`level` header prefix and force the cell to markdown. The level
/// clamps to `1..=6`. One compound operation.
pub fn set_markdown_header(panel: &mut NotebookPanel, level: usize) {
    let Some((model, _)) = guard(panel) else {
        return;
    };
    let level = level.clamp(1, 6);
    let mut m = model.lock().unwrap();
    let len = m.cells().len();
    let targets = selected_indices(panel, len);

    let cells = m.cells_mut();
    cells.begin_compound(true);
    for &i in &targets {
        let replacement = match cells.get(i) {
            Some(cell) => {
                let source = replace_header_prefix(cell.source(), level);
                if cell.cell_type() == CellType::Markdown && cell.source() == source {
                    continue;
                }
                let mut cell = CellModel::with_type(CellType::Markdown, &cell.to_record());
                cell.set_source(source);
                cell
            }
            None => continue,
        };
        cells.set(i, replacement);
    }
    cells.end_compound();
}

fn replace_header_prefix(source: &str, level: usize) -> String {
    let rest = source.trim_start_matches('#').trim_start();
    format!("{} {}", "#".repeat(level), rest)
}

/// Serialize the selected cells to the clipboard under the cells tag,
/// replacing any previous clipboard contents. Returns the record count.
fn copy_to_clipboard(panel: &NotebookPanel, clipboard: &mut Clipboard) -> usize {
    let Some((model, _)) = guard(panel) else {
        return 0;
    };
    let m = model.lock().unwrap();
    let len = m.cells().len();
    let records: Vec<Value> = selected_indices(panel, len)
        .into_iter()
        .filter_map(|i| m.cells().get(i))
        .filter_map(|cell| serde_json::to_value(cell.to_record()).ok())
        .collect();
    let count = records.len();

    clipboard.clear();
    clipboard.set_data(CELLS_CLIPBOARD_TYPE, Value::Array(records));
    count
}

pub fn copy_cells(panel: &NotebookPanel, clipboard: &mut Clipboard) {
    copy_to_clipboard(panel, clipboard);
}

/// Copy, then delete in one compound operation. The zero-cell invariant is
/// upheld by the model's placeholder guard.
pub fn cut_cells(panel: &mut NotebookPanel, clipboard: &mut Clipboard) {
    if copy_to_clipboard(panel, clipboard) == 0 {
        return;
    }
    delete_cells(panel);
}

/// Deserialize clipboard records into fresh-identity cells of the recorded
/// types and insert them after the active cell in one compound operation,
/// then select the position after the last pasted cell.
pub fn paste_cells(panel: &mut NotebookPanel, clipboard: &Clipboard) {
    let Some((model, active)) = guard(panel) else {
        return;
    };
    let Some(Value::Array(raw)) = clipboard.get_data(CELLS_CLIPBOARD_TYPE) else {
        return;
    };
    let pasted: Vec<CellModel> = raw
        .iter()
        .filter_map(|value| serde_json::from_value::<CellRecord>(value.clone()).ok())
        .map(|record| CellModel::from_record(&record).with_new_id())
        .collect();
    if pasted.is_empty() {
        return;
    }
    let count = pasted.len();

    let mut m = model.lock().unwrap();
    let cells = m.cells_mut();
    cells.begin_compound(true);
    for (k, cell) in pasted.into_iter().enumerate() {
        cells.insert(active + 1 + k, cell);
    }
    cells.end_compound();
    let len = m.cells().len();
    drop(m);

    panel.view.clear_selection();
    panel.view.set_active(Some((active + count + 1).min(len - 1)));
}

/// Undo the most recent cell-list change, clearing any multi-select first.
pub fn undo(panel: &mut NotebookPanel) {
    let Some((model, _)) = guard(panel) else {
        return;
    };
    panel.view.clear_selection();
    let mut m = model.lock().unwrap();
    m.cells_mut().undo();
    let len = m.cells().len();
    drop(m);
    clamp_active(panel, len);
}

/// Redo the most recently undone change, clearing any multi-select first.
pub fn redo(panel: &mut NotebookPanel) {
    let Some((model, _)) = guard(panel) else {
        return;
    };
    panel.view.clear_selection();
    let mut m = model.lock().unwrap();
    m.cells_mut().redo();
    let len = m.cells().len();
    drop(m);
    clamp_active(panel, len);
}

fn clamp_active(panel: &mut NotebookPanel, len: usize) {
    if let Some(active) = panel.view.active_index() {
        if len == 0 {
            panel.view.set_active(Some(0));
        } else if active >= len {
            panel.view.set_active(Some(len - 1));
        }
    }
}

/// Run the selected cells: markdown renders, raw is untouched, code is
/// submitted to `kernel` (or has its execution state cleared when no
/// kernel is attached).
///
/// Code executions dispatch concurrently — fire-all, not a sequential
/// barrier — while each cell's own start→reply transition stays
/// sequential. The returned aggregate is the AND of all per-cell results:
/// an `error`/`abort` reply or a transport failure makes it `false`
/// without interrupting sibling cells already in flight.
pub async fn run_cells<K: ExecutionHandle>(panel: &mut NotebookPanel, kernel: Option<&K>) -> bool {
    let Some((model, _)) = guard(panel) else {
        return false;
    };

    // Snapshot the code to run in document order; markdown and raw cells
    // complete inline.
    let code_targets: Vec<(CellId, String)> = {
        let mut m = model.lock().unwrap();
        let len = m.cells().len();
        let indices = selected_indices(panel, len);
        let mut code = Vec::new();
        for &i in &indices {
            let Some(cell) = m.cells_mut().get_mut(i) else {
                continue;
            };
            match cell.cell_type() {
                CellType::Markdown => cell.set_rendered(true),
                CellType::Raw => {}
                CellType::Code => {
                    cell.clear_execution();
                    if kernel.is_some() && !cell.source().trim().is_empty() {
                        code.push((cell.id().clone(), cell.source().to_string()));
                    }
                }
            }
        }
        code
    };
    panel.view.clear_selection();

    let Some(kernel) = kernel else {
        return true;
    };
    if code_targets.is_empty() {
        return true;
    }

    debug!("[actions] Dispatching {} execution(s)", code_targets.len());
    let replies = join_all(
        code_targets
            .iter()
            .map(|(_, source)| kernel.execute(source)),
    )
    .await;

    let mut all_ok = true;
    let mut m = model.lock().unwrap();
    for ((cell_id, _), reply) in code_targets.iter().zip(replies) {
        match reply {
            Ok(reply) => {
                if reply.execution_count.is_some() {
                    if let Some(i) = m.find_cell_index(cell_id) {
                        if let Some(cell) = m.cells_mut().get_mut(i) {
                            cell.set_execution_count(reply.execution_count);
                        }
                    }
                }
                for entry in &reply.payload {
                    if entry.source == SET_NEXT_INPUT {
                        apply_set_next_input(&mut m, cell_id, entry);
                    }
                }
                if !reply.is_ok() {
                    all_ok = false;
                }
            }
            Err(e) => {
                warn!("[actions] Execution failed for cell {}: {}", cell_id, e);
                all_ok = false;
            }
        }
    }
    all_ok
}

fn apply_set_next_input(model: &mut NotebookModel, cell_id: &CellId, entry: &PayloadEntry) {
    if entry.replace {
        model.update_cell_source(cell_id, &entry.text);
    } else if let Some(i) = model.find_cell_index(cell_id) {
        model
            .cells_mut()
            .insert(i + 1, CellModel::new_code(entry.text.clone()));
    }
}

/// Run, then move on: if the active cell was the last one, append a fresh
/// code cell and switch to edit mode; otherwise advance the active index.
pub async fn run_and_advance<K: ExecutionHandle>(
    panel: &mut NotebookPanel,
    kernel: Option<&K>,
) -> bool {
    let Some((model, active)) = guard(panel) else {
        return false;
    };
    let result = run_cells(panel, kernel).await;

    let mut m = model.lock().unwrap();
    if active + 1 >= m.cells().len() {
        m.cells_mut().push_back(CellModel::new_code(""));
        let len = m.cells().len();
        drop(m);
        panel.view.set_active(Some(len - 1));
        panel.view.mode = InteractionMode::Edit;
    } else {
        drop(m);
        panel.view.set_active(Some(active + 1));
    }
    panel.view.request_scroll();
    result
}

/// Run, then insert a fresh code cell below the active cell and edit it.
pub async fn run_and_insert<K: ExecutionHandle>(
    panel: &mut NotebookPanel,
    kernel: Option<&K>,
) -> bool {
    let Some((model, active)) = guard(panel) else {
        return false;
    };
    let result = run_cells(panel, kernel).await;

    let mut m = model.lock().unwrap();
    m.cells_mut().insert(active + 1, CellModel::new_code(""));
    drop(m);
    panel.view.set_active(Some(active + 1));
    panel.view.mode = InteractionMode::Edit;
    panel.view.request_scroll();
    result
}
