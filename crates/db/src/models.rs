//! Row structs that map 1-to-1 onto database tables.
//!
//! These are *persistence* models: they carry no domain behaviour.
//! Domain types and the snapshot encoding live in the `engine` crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// serialized_workflows
// ---------------------------------------------------------------------------

/// A persisted workflow snapshot row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct SerializedWorkflowRow {
    pub workflow_id: String,
    /// Encoded snapshot (versioned JSON document).
    pub data: String,
    pub last_updated: DateTime<Utc>,
}

/// Outcome of a snapshot write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The row was inserted or replaced.
    Written,
    /// The stored data is byte-identical; nothing was written.
    Unchanged,
    /// The stored row is newer than the write; nothing was written.
    Superseded,
}
