//! Execution collaborator interface.
//!
//! The kernel itself (transport, wire protocol, lifecycle) lives outside
//! this crate; the model layer only needs "submit source, await a reply".
//! An absent kernel is expressed as `Option<&K>` at the call sites, not as
//! a null-object implementation.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Payload entries with this `source` rewrite the notebook's next input.
pub const SET_NEXT_INPUT: &str = "set_next_input";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyStatus {
    Ok,
    Error,
    Abort,
}

/// One entry of an execute reply's payload list. Only [`SET_NEXT_INPUT`]
/// entries are acted on; anything else passes through untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayloadEntry {
    pub source: String,
    #[serde(default)]
    pub text: String,
    /// Overwrite the originating cell's source instead of inserting a new
    /// cell after it.
    #[serde(default)]
    pub replace: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteReply {
    pub status: ReplyStatus,
    #[serde(default)]
    pub execution_count: Option<i32>,
    #[serde(default)]
    pub payload: Vec<PayloadEntry>,
}

impl ExecuteReply {
    pub fn ok(execution_count: i32) -> Self {
        ExecuteReply {
            status: ReplyStatus::Ok,
            execution_count: Some(execution_count),
            payload: Vec::new(),
        }
    }

    pub fn error() -> Self {
        ExecuteReply {
            status: ReplyStatus::Error,
            execution_count: None,
            payload: Vec::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.status, ReplyStatus::Ok)
    }
}

/// Asynchronous code-execution backend.
pub trait ExecutionHandle {
    /// Submit source for execution and await the reply. Transport failures
    /// surface as errors; a completed-but-failed execution is an `error`
    /// or `abort` status inside the reply.
    fn execute(&self, source: &str) -> impl Future<Output = Result<ExecuteReply>>;
}
