//! Change events and their host-facing record form.

use crate::source::offset::Offset;
use crate::source::schema::{RowImage, RowSchema};
use crate::source::table::TableId;
use crate::{Error, Result};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// DML operation kind recovered from the redo stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Insert,
    Update,
    Delete,
}

impl FromStr for Operation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "INSERT" => Ok(Operation::Insert),
            "UPDATE" => Ok(Operation::Update),
            "DELETE" => Ok(Operation::Delete),
            other => Err(Error::Parse {
                message: format!("unsupported operation {:?}", other),
            }),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Insert => write!(f, "INSERT"),
            Operation::Update => write!(f, "UPDATE"),
            Operation::Delete => write!(f, "DELETE"),
        }
    }
}

/// One committed row change, fully typed against the table's schema.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub table: TableId,
    pub scn: u64,
    pub commit_scn: u64,
    pub row_id: String,
    pub operation: Operation,
    pub timestamp: NaiveDateTime,
    pub sql_redo: String,
    pub before: RowImage,
    pub after: RowImage,
    pub schema: Arc<RowSchema>,
}

impl ChangeEvent {
    /// The resumable position this event advances its table to.
    pub fn offset(&self) -> Offset {
        Offset::new(
            self.scn,
            self.commit_scn,
            Some(self.row_id.clone()),
            Some(self.timestamp),
        )
    }

    /// Flattens the event into the host's record shape: a partition key, a
    /// persisted offset map, and a JSON payload.
    pub fn to_record(&self) -> Result<SourceRecord> {
        let payload = serde_json::to_value(EventPayload {
            table: self.table.qualified_name(),
            operation: self.operation,
            scn: self.scn,
            commit_scn: self.commit_scn,
            row_id: &self.row_id,
            timestamp: self.timestamp,
            before: self.before.to_json(),
            after: self.after.to_json(),
        })?;

        Ok(SourceRecord {
            partition: self.table.qualified_name(),
            offset: self.offset().to_map(),
            schema: self.schema.clone(),
            payload,
        })
    }
}

#[derive(Serialize)]
struct EventPayload<'a> {
    table: String,
    operation: Operation,
    scn: u64,
    commit_scn: u64,
    row_id: &'a str,
    timestamp: NaiveDateTime,
    before: serde_json::Value,
    after: serde_json::Value,
}

/// Host-facing record: one change keyed by its table partition.
#[derive(Debug, Clone)]
pub struct SourceRecord {
    pub partition: String,
    pub offset: HashMap<String, String>,
    pub schema: Arc<RowSchema>,
    pub payload: serde_json::Value,
}
