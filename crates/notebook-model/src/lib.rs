//! Document model core for a notebook editor.
//!
//! The pieces, leaves first:
//!
//! - [`undoable_list`]: a generic transactional list with undo/redo stacks
//!   and compound operations.
//! - [`cell`]: the cell models (code, markdown, raw) and their interchange
//!   records.
//! - [`model`]: the notebook document model owning the cell list, metadata
//!   and format versions, plus the deferred never-empty guard.
//! - [`actions`]: stateless cell operations (split, merge, move, run,
//!   copy/cut/paste, ...) driving the model through compound operations and
//!   coordinating with an asynchronous execution backend.
//!
//! Rendering, kernel transport, and rich-output handling are collaborators
//! supplied by the embedding application, not part of this crate.

pub mod actions;
pub mod cell;
pub mod clipboard;
pub mod execution;
pub mod model;
pub mod undoable_list;
pub mod view;

pub use actions::NotebookPanel;
pub use cell::{CellId, CellMetadata, CellModel, CellRecord, CellType};
pub use clipboard::{Clipboard, CELLS_CLIPBOARD_TYPE};
pub use execution::{ExecuteReply, ExecutionHandle, PayloadEntry, ReplyStatus, SET_NEXT_INPUT};
pub use model::{
    spawn_placeholder_guard, MetadataCursor, ModelEvent, NotebookLoadError, NotebookModel,
    SharedNotebookModel, NBFORMAT, NBFORMAT_MINOR,
};
pub use undoable_list::{ListChangeKind, ListEvent, Snapshot, UndoableList};
pub use view::{InteractionMode, ViewState};
