//! The mining session lifecycle: start, poll, close.
//!
//! A session belongs to one task and mines one set of tables. Starting
//! resolves the topology strategy and the start SCN, begins mining, and opens
//! the contents cursor on a background task so the first poll returns
//! immediately. Polling delivers at most one fully-typed change per call.

use crate::config::MinerConfig;
use crate::miner::client::{ConnectionManager, ContentsCursor, ContentsRow, MinerClient, SqlValue};
use crate::miner::dialect::{DialectRegistry, StatementKind, TopologyStrategy};
use crate::source::event::{ChangeEvent, Operation};
use crate::source::offset::Offset;
use crate::source::parser::parse_redo;
use crate::source::schema::SchemaCache;
use crate::source::table::TableId;
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// LogMiner materializes scratch segments under this prefix; redo text
/// referencing them is housekeeping noise, not table changes.
const TEMP_SEGMENT_PREFIX: &str = "ORA_TEMP_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    NotStarted,
    Started,
    Closed,
}

/// Where to begin mining, before consulting the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SeekScn {
    Earliest,
    Current,
    /// A concrete SCN, still subject to clamping at the latest available SCN.
    At(u64),
}

/// Decides the requested start position from configuration and persisted
/// offsets. A configured seek wins over offsets; an unparsable literal falls
/// back to the current SCN; with no seek configured, mining resumes from the
/// smallest persisted commit SCN, or from the earliest available SCN when no
/// table has a position yet.
fn requested_start(seek_scn: Option<&str>, offsets: &BTreeMap<TableId, Offset>) -> SeekScn {
    match seek_scn {
        Some("min") => SeekScn::Earliest,
        Some("current") => SeekScn::Current,
        Some(literal) => match literal.parse::<u64>() {
            Ok(0) => SeekScn::Earliest,
            Ok(scn) => SeekScn::At(scn),
            Err(_) => {
                warn!(seek_scn = literal, "unparsable seek_scn, starting at current SCN");
                SeekScn::Current
            }
        },
        None => {
            let min_commit = offsets.values().map(|o| o.commit_scn).min().unwrap_or(0);
            if min_commit == 0 {
                SeekScn::Earliest
            } else {
                SeekScn::At(min_commit)
            }
        }
    }
}

/// One started mining pass over a fixed table assignment.
pub struct MiningSession {
    manager: Arc<ConnectionManager>,
    registry: Arc<DialectRegistry>,
    config: MinerConfig,
    state: SessionState,
    strategy: TopologyStrategy,
    client: Option<Arc<dyn MinerClient>>,
    cursor: Arc<Mutex<Option<Box<dyn ContentsCursor>>>>,
    open_task: Option<JoinHandle<()>>,
    schemas: SchemaCache,
}

impl MiningSession {
    pub fn new(
        manager: Arc<ConnectionManager>,
        registry: Arc<DialectRegistry>,
        config: MinerConfig,
    ) -> Self {
        Self {
            manager,
            registry,
            config,
            state: SessionState::NotStarted,
            strategy: TopologyStrategy::SingleInstance,
            client: None,
            cursor: Arc::new(Mutex::new(None)),
            open_task: None,
            schemas: SchemaCache::new(),
        }
    }

    pub fn strategy(&self) -> TopologyStrategy {
        self.strategy
    }

    /// Starts mining for the given tables, resuming each from its offset.
    pub async fn start(&mut self, offsets: &BTreeMap<TableId, Offset>) -> Result<()> {
        if self.state != SessionState::NotStarted {
            return Err(Error::Session {
                message: format!("cannot start session in state {:?}", self.state),
            });
        }

        let client = self.manager.client().await?;
        self.strategy = if client.has_container_catalog().await? {
            TopologyStrategy::Multitenant
        } else {
            TopologyStrategy::SingleInstance
        };

        let start_scn = self.resolve_start_scn(&client, offsets).await?;
        info!(start_scn, strategy = %self.strategy, tables = offsets.len(), "starting mining session");

        let start_sql = self.statement(StatementKind::StartMining)?;
        client.execute(&start_sql, &[SqlValue::Number(start_scn)]).await?;

        let (contents_sql, params) = self.contents_query(offsets)?;
        let slot = self.cursor.clone();
        let open_client = client.clone();
        let fetch_size = self.config.fetch_size;
        self.open_task = Some(tokio::spawn(async move {
            match open_client.open_contents(&contents_sql, &params, fetch_size).await {
                Ok(cursor) => {
                    debug!("contents cursor open");
                    *slot.lock().await = Some(cursor);
                }
                Err(e) => {
                    error!(error = %e, "failed to open contents cursor");
                }
            }
        }));

        self.client = Some(client);
        self.state = SessionState::Started;
        Ok(())
    }

    /// Delivers the next committed change, or `None` when nothing is
    /// available yet. Rows whose redo cannot be parsed are logged and
    /// skipped; values that do not fit their declared column type abort the
    /// poll with an error.
    pub async fn poll(&mut self) -> Result<Option<ChangeEvent>> {
        if self.state != SessionState::Started {
            return Err(Error::Session {
                message: format!("cannot poll session in state {:?}", self.state),
            });
        }
        let client = self
            .client
            .clone()
            .ok_or_else(|| Error::Session {
                message: "session started without a client".to_string(),
            })?;

        let mut slot = self.cursor.lock().await;
        let cursor = match slot.as_mut() {
            Some(cursor) => cursor,
            // The open task has not finished yet.
            None => return Ok(None),
        };

        loop {
            let row = match cursor.next_row().await? {
                Some(row) => row,
                None => return Ok(None),
            };

            if row.sql_redo.contains(TEMP_SEGMENT_PREFIX) {
                continue;
            }
            if row.table_name.is_none() {
                debug!(scn = row.scn, "skipping row without a table name");
                continue;
            }

            let row = reassemble(row, cursor).await?;
            let table = row.table()?;

            let operation = match row.operation.parse::<Operation>() {
                Ok(op) => op,
                Err(e) => {
                    error!(table = %table, scn = row.scn, error = %e, "skipping row with unsupported operation");
                    continue;
                }
            };

            let dictionary_sql = self.registry
                .statement(StatementKind::Dictionary, self.strategy)?
                .to_string();
            let schema = self
                .schemas
                .get_or_build(&table, &client, &dictionary_sql)
                .await?;

            let change = match parse_redo(&row.sql_redo) {
                Ok(change) => change,
                Err(e) => {
                    error!(table = %table, scn = row.scn, error = %e, "skipping unparsable redo statement");
                    continue;
                }
            };

            let before = schema.bind(&change.before)?;
            let after = schema.bind(&change.after)?;

            return Ok(Some(ChangeEvent {
                table,
                scn: row.scn,
                commit_scn: row.commit_scn,
                row_id: row.row_id,
                operation,
                timestamp: row.timestamp,
                sql_redo: row.sql_redo,
                before,
                after,
                schema,
            }));
        }
    }

    /// Drops a cached schema so the next poll rereads the dictionary.
    pub fn invalidate_schema(&mut self, table: &TableId) {
        self.schemas.invalidate(table);
    }

    /// Ends the mining pass. Cleanup failures are logged, not surfaced; the
    /// session is closed either way.
    pub async fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }

        if let Some(task) = self.open_task.take() {
            task.abort();
        }
        self.cursor.lock().await.take();

        if self.state == SessionState::Started {
            if let Some(client) = self.client.take() {
                match self.statement(StatementKind::StopMining) {
                    Ok(sql) => {
                        if let Err(e) = client.execute(&sql, &[]).await {
                            warn!(error = %e, "stop mining failed during close");
                        }
                    }
                    Err(e) => warn!(error = %e, "no stop mining statement during close"),
                }
            }
        }

        self.state = SessionState::Closed;
        debug!("mining session closed");
    }

    fn statement(&self, kind: StatementKind) -> Result<String> {
        Ok(self.registry.statement(kind, self.strategy)?.to_string())
    }

    async fn resolve_start_scn(
        &self,
        client: &Arc<dyn MinerClient>,
        offsets: &BTreeMap<TableId, Offset>,
    ) -> Result<u64> {
        match requested_start(self.config.seek_scn.as_deref(), offsets) {
            SeekScn::Earliest => {
                let sql = self.statement(StatementKind::EarliestScn)?;
                client.query_scalar(&sql, &[]).await
            }
            SeekScn::Current => {
                let sql = self.statement(StatementKind::CurrentScn)?;
                client.query_scalar(&sql, &[]).await
            }
            SeekScn::At(scn) => {
                // Requested position may lie beyond what redo retains.
                let sql = self.statement(StatementKind::LatestScn)?;
                client
                    .query_scalar(&sql, &[SqlValue::Number(scn), SqlValue::Number(scn)])
                    .await
            }
        }
    }

    /// Builds the contents query: the registered statement plus one
    /// disjunction arm per assigned table, binding each table's identity and
    /// resume commit SCN.
    fn contents_query(
        &self,
        offsets: &BTreeMap<TableId, Offset>,
    ) -> Result<(String, Vec<SqlValue>)> {
        let base = self.statement(StatementKind::Contents)?;
        if offsets.is_empty() {
            return Ok((base, Vec::new()));
        }

        let arm = "(SRC_CON_NAME = ? AND SEG_OWNER = ? AND TABLE_NAME = ? AND COMMIT_SCN >= ?)";
        let arms = vec![arm; offsets.len()].join(" OR ");
        let sql = format!("{} AND ({})", base, arms);

        let mut params = Vec::with_capacity(offsets.len() * 4);
        for (table, offset) in offsets {
            params.push(SqlValue::from_opt(table.container()));
            params.push(SqlValue::from_opt(table.owner()));
            params.push(SqlValue::from_opt(table.table()));
            params.push(SqlValue::Number(offset.commit_scn));
        }
        Ok((sql, params))
    }
}

/// Concatenates continuation fragments until the flag clears.
async fn reassemble(first: ContentsRow, cursor: &mut Box<dyn ContentsCursor>) -> Result<ContentsRow> {
    if !first.csf {
        return Ok(first);
    }

    let mut row = first;
    let mut redo = std::mem::take(&mut row.sql_redo);
    loop {
        let fragment = cursor.next_row().await?.ok_or_else(|| {
            Error::Database(format!(
                "redo continuation truncated at scn {}",
                row.scn
            ))
        })?;
        redo.push_str(&fragment.sql_redo);
        if !fragment.csf {
            break;
        }
    }
    row.sql_redo = redo;
    row.csf = false;
    Ok(row)
}
