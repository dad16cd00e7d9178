//! Resumable mining positions.
//!
//! An [`Offset`] captures where in the redo stream a table's delivery has
//! reached. The host persists offsets as flat string-keyed maps, one per
//! table partition; [`Offset::to_map`] and [`Offset::from_map`] round-trip
//! through that shape losslessly.

use crate::{Error, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const FIELD_SCN: &str = "scn";
pub const FIELD_COMMIT_SCN: &str = "commit_scn";
pub const FIELD_ROW_ID: &str = "row_id";
pub const FIELD_TIMESTAMP: &str = "timestamp";

/// Position of the last-delivered change for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offset {
    /// System change number of the change itself.
    pub scn: u64,
    /// SCN of the owning transaction's commit.
    pub commit_scn: u64,
    /// Row identifier within the redo stream.
    pub row_id: Option<String>,
    /// Wall-clock change timestamp.
    pub timestamp: Option<NaiveDateTime>,
}

impl Offset {
    /// "No prior position": resume decisions treat this as SCN 0.
    pub const DEFAULT: Offset = Offset {
        scn: 0,
        commit_scn: 0,
        row_id: None,
        timestamp: None,
    };

    pub fn new(scn: u64, commit_scn: u64, row_id: Option<String>, timestamp: Option<NaiveDateTime>) -> Self {
        Self {
            scn,
            commit_scn,
            row_id,
            timestamp,
        }
    }

    /// Serializes to the host's flat string-keyed persistence shape.
    pub fn to_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert(FIELD_SCN.to_string(), self.scn.to_string());
        map.insert(FIELD_COMMIT_SCN.to_string(), self.commit_scn.to_string());
        if let Some(row_id) = &self.row_id {
            map.insert(FIELD_ROW_ID.to_string(), row_id.clone());
        }
        if let Some(ts) = &self.timestamp {
            let utc: DateTime<Utc> = DateTime::from_naive_utc_and_offset(*ts, Utc);
            map.insert(FIELD_TIMESTAMP.to_string(), utc.to_rfc3339());
        }
        map
    }

    /// Deserializes from the persisted map. An empty map is the default
    /// offset (commit SCN 0, no prior position).
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self> {
        if map.is_empty() {
            return Ok(Offset::DEFAULT);
        }

        let scn = parse_scn(map, FIELD_SCN)?;
        let commit_scn = parse_scn(map, FIELD_COMMIT_SCN)?;
        let row_id = map.get(FIELD_ROW_ID).cloned();
        let timestamp = match map.get(FIELD_TIMESTAMP) {
            None => None,
            Some(raw) => Some(
                DateTime::parse_from_rfc3339(raw)
                    .map_err(|e| Error::InvalidOffset {
                        message: format!("bad {} value {:?}: {}", FIELD_TIMESTAMP, raw, e),
                    })?
                    .naive_utc(),
            ),
        };

        Ok(Offset::new(scn, commit_scn, row_id, timestamp))
    }
}

fn parse_scn(map: &HashMap<String, String>, field: &str) -> Result<u64> {
    match map.get(field) {
        None => Ok(0),
        Some(raw) => raw.parse::<u64>().map_err(|e| Error::InvalidOffset {
            message: format!("bad {} value {:?}: {}", field, raw, e),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_map_is_default_offset() {
        let offset = Offset::from_map(&HashMap::new()).unwrap();
        assert_eq!(offset, Offset::DEFAULT);
        assert_eq!(offset.commit_scn, 0);
    }

    #[test]
    fn test_map_round_trip() {
        let ts = chrono::NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap();
        let offset = Offset::new(12345, 12399, Some("AAAR5eAAFAAAAGDAAC".to_string()), Some(ts));

        let map = offset.to_map();
        let restored = Offset::from_map(&map).unwrap();
        assert_eq!(restored, offset);
    }

    #[test]
    fn test_missing_optional_fields() {
        let mut map = HashMap::new();
        map.insert(FIELD_SCN.to_string(), "7".to_string());
        map.insert(FIELD_COMMIT_SCN.to_string(), "9".to_string());

        let offset = Offset::from_map(&map).unwrap();
        assert_eq!(offset.scn, 7);
        assert_eq!(offset.commit_scn, 9);
        assert!(offset.row_id.is_none());
        assert!(offset.timestamp.is_none());
    }

    #[test]
    fn test_unparsable_scn_is_an_error() {
        let mut map = HashMap::new();
        map.insert(FIELD_SCN.to_string(), "not-a-number".to_string());
        assert!(matches!(
            Offset::from_map(&map),
            Err(Error::InvalidOffset { .. })
        ));
    }
}
