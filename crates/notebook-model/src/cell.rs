//! Cell models and their interchange records.
//!
//! A cell's type tag is fixed at construction: "changing" a cell's type
//! means building a replacement cell from the old cell's record and setting
//! it in place. The tag dispatch lives in one factory,
//! [`CellModel::from_record`] / [`CellModel::with_type`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use crate::undoable_list::Snapshot;

/// Unique cell identity, a v4 uuid rendered as a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellId(String);

impl CellId {
    pub fn new() -> Self {
        CellId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CellId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CellId {
    fn from(s: &str) -> Self {
        CellId(s.to_string())
    }
}

/// Closed set of cell type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellType {
    Code,
    Markdown,
    Raw,
}

impl CellType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CellType::Code => "code",
            CellType::Markdown => "markdown",
            CellType::Raw => "raw",
        }
    }
}

impl fmt::Display for CellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-cell metadata map.
pub type CellMetadata = HashMap<String, Value>;

/// Interchange record for a single cell.
///
/// A record with no id gets a fresh uuid on deserialize (pre-4.5 notebooks
/// have none). An unknown `cell_type` tag fails only that record's parse;
/// document loading skips such records instead of aborting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cell_type", rename_all = "snake_case")]
pub enum CellRecord {
    Code {
        #[serde(default)]
        id: CellId,
        source: String,
        #[serde(default)]
        metadata: CellMetadata,
        #[serde(default)]
        execution_count: Option<i32>,
        #[serde(default)]
        outputs: Vec<Value>,
    },
    Markdown {
        #[serde(default)]
        id: CellId,
        source: String,
        #[serde(default)]
        metadata: CellMetadata,
    },
    Raw {
        #[serde(default)]
        id: CellId,
        source: String,
        #[serde(default)]
        metadata: CellMetadata,
    },
}

impl CellRecord {
    pub fn cell_type(&self) -> CellType {
        match self {
            CellRecord::Code { .. } => CellType::Code,
            CellRecord::Markdown { .. } => CellType::Markdown,
            CellRecord::Raw { .. } => CellType::Raw,
        }
    }

    pub fn id(&self) -> &CellId {
        match self {
            CellRecord::Code { id, .. } => id,
            CellRecord::Markdown { id, .. } => id,
            CellRecord::Raw { id, .. } => id,
        }
    }

    pub fn source(&self) -> &str {
        match self {
            CellRecord::Code { source, .. } => source,
            CellRecord::Markdown { source, .. } => source,
            CellRecord::Raw { source, .. } => source,
        }
    }

    pub fn metadata(&self) -> &CellMetadata {
        match self {
            CellRecord::Code { metadata, .. } => metadata,
            CellRecord::Markdown { metadata, .. } => metadata,
            CellRecord::Raw { metadata, .. } => metadata,
        }
    }
}

/// In-memory cell model.
///
/// The `rendered` flag on markdown cells is view state and never
/// serialized, so it does not survive a snapshot round-trip.
#[derive(Debug, Clone, PartialEq)]
pub enum CellModel {
    Code {
        id: CellId,
        source: String,
        metadata: CellMetadata,
        execution_count: Option<i32>,
        outputs: Vec<Value>,
    },
    Markdown {
        id: CellId,
        source: String,
        metadata: CellMetadata,
        rendered: bool,
    },
    Raw {
        id: CellId,
        source: String,
        metadata: CellMetadata,
    },
}

impl CellModel {
    pub fn new_code(source: impl Into<String>) -> Self {
        CellModel::Code {
            id: CellId::new(),
            source: source.into(),
            metadata: CellMetadata::new(),
            execution_count: None,
            outputs: Vec::new(),
        }
    }

    pub fn new_markdown(source: impl Into<String>) -> Self {
        CellModel::Markdown {
            id: CellId::new(),
            source: source.into(),
            metadata: CellMetadata::new(),
            rendered: false,
        }
    }

    pub fn new_raw(source: impl Into<String>) -> Self {
        CellModel::Raw {
            id: CellId::new(),
            source: source.into(),
            metadata: CellMetadata::new(),
        }
    }

    /// Build a cell of `target` type seeded from a record's identity,
    /// source and metadata. Execution state carries over only between code
    /// cells; cells built as markdown start unrendered.
    pub fn with_type(target: CellType, record: &CellRecord) -> Self {
        match target {
            CellType::Code => {
                let (execution_count, outputs) = match record {
                    CellRecord::Code {
                        execution_count,
                        outputs,
                        ..
                    } => (*execution_count, outputs.clone()),
                    _ => (None, Vec::new()),
                };
                CellModel::Code {
                    id: record.id().clone(),
                    source: record.source().to_string(),
                    metadata: record.metadata().clone(),
                    execution_count,
                    outputs,
                }
            }
            CellType::Markdown => CellModel::Markdown {
                id: record.id().clone(),
                source: record.source().to_string(),
                metadata: record.metadata().clone(),
                rendered: false,
            },
            CellType::Raw => CellModel::Raw {
                id: record.id().clone(),
                source: record.source().to_string(),
                metadata: record.metadata().clone(),
            },
        }
    }

    /// Reconstruct a cell from its record, keeping the record's type tag.
    pub fn from_record(record: &CellRecord) -> Self {
        Self::with_type(record.cell_type(), record)
    }

    pub fn to_record(&self) -> CellRecord {
        match self {
            CellModel::Code {
                id,
                source,
                metadata,
                execution_count,
                outputs,
            } => CellRecord::Code {
                id: id.clone(),
                source: source.clone(),
                metadata: metadata.clone(),
                execution_count: *execution_count,
                outputs: outputs.clone(),
            },
            CellModel::Markdown {
                id,
                source,
                metadata,
                ..
            } => CellRecord::Markdown {
                id: id.clone(),
                source: source.clone(),
                metadata: metadata.clone(),
            },
            CellModel::Raw {
                id,
                source,
                metadata,
            } => CellRecord::Raw {
                id: id.clone(),
                source: source.clone(),
                metadata: metadata.clone(),
            },
        }
    }

    /// Same cell data under a fresh identity (paste, split halves).
    pub fn with_new_id(mut self) -> Self {
        match &mut self {
            CellModel::Code { id, .. } => *id = CellId::new(),
            CellModel::Markdown { id, .. } => *id = CellId::new(),
            CellModel::Raw { id, .. } => *id = CellId::new(),
        }
        self
    }

    pub fn id(&self) -> &CellId {
        match self {
            CellModel::Code { id, .. } => id,
            CellModel::Markdown { id, .. } => id,
            CellModel::Raw { id, .. } => id,
        }
    }

    pub fn cell_type(&self) -> CellType {
        match self {
            CellModel::Code { .. } => CellType::Code,
            CellModel::Markdown { .. } => CellType::Markdown,
            CellModel::Raw { .. } => CellType::Raw,
        }
    }

    pub fn source(&self) -> &str {
        match self {
            CellModel::Code { source, .. } => source,
            CellModel::Markdown { source, .. } => source,
            CellModel::Raw { source, .. } => source,
        }
    }

    pub fn set_source(&mut self, new_source: impl Into<String>) {
        let new_source = new_source.into();
        match self {
            CellModel::Code { source, .. } => *source = new_source,
            CellModel::Markdown { source, .. } => *source = new_source,
            CellModel::Raw { source, .. } => *source = new_source,
        }
    }

    pub fn metadata(&self) -> &CellMetadata {
        match self {
            CellModel::Code { metadata, .. } => metadata,
            CellModel::Markdown { metadata, .. } => metadata,
            CellModel::Raw { metadata, .. } => metadata,
        }
    }

    pub fn metadata_mut(&mut self) -> &mut CellMetadata {
        match self {
            CellModel::Code { metadata, .. } => metadata,
            CellModel::Markdown { metadata, .. } => metadata,
            CellModel::Raw { metadata, .. } => metadata,
        }
    }

    /// Execution count of a code cell; `None` for other types.
    pub fn execution_count(&self) -> Option<i32> {
        match self {
            CellModel::Code {
                execution_count, ..
            } => *execution_count,
            _ => None,
        }
    }

    /// No-op for non-code cells.
    pub fn set_execution_count(&mut self, count: Option<i32>) {
        if let CellModel::Code {
            execution_count, ..
        } = self
        {
            *execution_count = count;
        }
    }

    /// Outputs of a code cell; empty for other types.
    pub fn outputs(&self) -> &[Value] {
        match self {
            CellModel::Code { outputs, .. } => outputs,
            _ => &[],
        }
    }

    /// No-op for non-code cells.
    pub fn push_output(&mut self, output: Value) {
        if let CellModel::Code { outputs, .. } = self {
            outputs.push(output);
        }
    }

    /// Clear outputs and execution count. No-op for non-code cells.
    pub fn clear_execution(&mut self) {
        if let CellModel::Code {
            outputs,
            execution_count,
            ..
        } = self
        {
            outputs.clear();
            *execution_count = None;
        }
    }

    /// Whether a markdown cell is rendered; `false` for other types.
    pub fn is_rendered(&self) -> bool {
        matches!(self, CellModel::Markdown { rendered: true, .. })
    }

    /// No-op for non-markdown cells.
    pub fn set_rendered(&mut self, value: bool) {
        if let CellModel::Markdown { rendered, .. } = self {
            *rendered = value;
        }
    }
}

impl Snapshot for CellModel {
    type Record = CellRecord;

    fn to_record(&self) -> CellRecord {
        CellModel::to_record(self)
    }

    fn from_record(record: &CellRecord) -> Self {
        CellModel::from_record(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_code_cell_has_empty_execution_state() {
        let cell = CellModel::new_code("x = 1");
        assert_eq!(cell.cell_type(), CellType::Code);
        assert_eq!(cell.source(), "x = 1");
        assert!(cell.execution_count().is_none());
        assert!(cell.outputs().is_empty());
    }

    #[test]
    fn test_new_markdown_cell_starts_unrendered() {
        let cell = CellModel::new_markdown("# Title");
        assert_eq!(cell.cell_type(), CellType::Markdown);
        assert!(!cell.is_rendered());
    }

    #[test]
    fn test_record_round_trip_preserves_code_state() {
        let mut cell = CellModel::new_code("print('hi')");
        cell.set_execution_count(Some(3));
        cell.push_output(serde_json::json!({"output_type": "stream", "text": "hi"}));

        let restored = CellModel::from_record(&cell.to_record());

        assert_eq!(restored, cell);
    }

    #[test]
    fn test_record_round_trip_drops_rendered_flag() {
        let mut cell = CellModel::new_markdown("text");
        cell.set_rendered(true);

        let restored = CellModel::from_record(&cell.to_record());

        assert_eq!(restored.id(), cell.id());
        assert!(!restored.is_rendered());
    }

    #[test]
    fn test_with_type_code_to_markdown_drops_execution_state() {
        let mut cell = CellModel::new_code("1 + 1");
        cell.set_execution_count(Some(7));

        let converted = CellModel::with_type(CellType::Markdown, &cell.to_record());

        assert_eq!(converted.cell_type(), CellType::Markdown);
        assert_eq!(converted.id(), cell.id());
        assert_eq!(converted.source(), "1 + 1");
        assert!(converted.execution_count().is_none());
        assert!(!converted.is_rendered());
    }

    #[test]
    fn test_with_type_markdown_to_code_starts_fresh() {
        let cell = CellModel::new_markdown("note");

        let converted = CellModel::with_type(CellType::Code, &cell.to_record());

        assert_eq!(converted.cell_type(), CellType::Code);
        assert!(converted.execution_count().is_none());
        assert!(converted.outputs().is_empty());
    }

    #[test]
    fn test_with_new_id_changes_identity_only() {
        let cell = CellModel::new_raw("data");
        let copy = cell.clone().with_new_id();

        assert_ne!(copy.id(), cell.id());
        assert_eq!(copy.source(), cell.source());
        assert_eq!(copy.cell_type(), cell.cell_type());
    }

    #[test]
    fn test_clear_execution_resets_code_cell() {
        let mut cell = CellModel::new_code("x");
        cell.set_execution_count(Some(1));
        cell.push_output(serde_json::json!({"output_type": "stream"}));

        cell.clear_execution();

        assert!(cell.execution_count().is_none());
        assert!(cell.outputs().is_empty());
    }

    #[test]
    fn test_record_serialization_shape() {
        let cell = CellModel::new_code("x = 1");
        let json = serde_json::to_value(cell.to_record()).unwrap();

        assert_eq!(json["cell_type"], "code");
        assert_eq!(json["source"], "x = 1");
        assert_eq!(json["execution_count"], Value::Null);
        assert!(json["outputs"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_record_deserializes_without_id() {
        let json = serde_json::json!({
            "cell_type": "markdown",
            "source": "hello",
            "metadata": {}
        });

        let record: CellRecord = serde_json::from_value(json).unwrap();

        assert_eq!(record.cell_type(), CellType::Markdown);
        assert!(!record.id().as_str().is_empty());
    }

    #[test]
    fn test_record_rejects_unknown_cell_type() {
        let json = serde_json::json!({
            "cell_type": "widget",
            "source": "",
            "metadata": {}
        });

        assert!(serde_json::from_value::<CellRecord>(json).is_err());
    }
}
