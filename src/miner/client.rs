//! Driver boundary for the mining database.
//!
//! Everything the session needs from the database goes through
//! [`MinerClient`], so the mining logic stays independent of any concrete
//! driver. [`ConnectionManager`] adds liveness probing and single-shot
//! reconnection on top of a [`ClientFactory`].

use crate::config::ConnectionConfig;
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// A bind parameter for a mining statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    Null,
    Text(String),
    Number(u64),
}

impl SqlValue {
    /// Binds an optional name component; absent components bind as NULL.
    pub fn from_opt(value: Option<&str>) -> SqlValue {
        match value {
            Some(v) => SqlValue::Text(v.to_string()),
            None => SqlValue::Null,
        }
    }
}

/// One column definition row from the dictionary query.
#[derive(Debug, Clone)]
pub struct DictionaryRow {
    pub column_name: String,
    pub nullable: bool,
    pub data_type: String,
    pub data_length: u32,
    pub data_scale: u32,
    /// Declared precision; 0 means undeclared.
    pub data_precision: u32,
    pub primary_key: bool,
    pub unique_key: bool,
}

/// One reconstructed change row from the mining view.
#[derive(Debug, Clone)]
pub struct ContentsRow {
    pub scn: u64,
    pub commit_scn: u64,
    pub row_id: String,
    pub src_con_name: Option<String>,
    pub seg_owner: Option<String>,
    pub table_name: Option<String>,
    pub timestamp: NaiveDateTime,
    pub operation: String,
    pub sql_redo: String,
    /// Continuation flag: set when the redo text continues in the next row.
    pub csf: bool,
}

/// Forward-only cursor over the mining view.
#[async_trait]
pub trait ContentsCursor: Send {
    /// Fetches the next row, or `None` when the cursor is exhausted.
    async fn next_row(&mut self) -> Result<Option<ContentsRow>>;
}

/// Operations the mining session performs against the database.
#[async_trait]
pub trait MinerClient: Send + Sync {
    /// Executes a statement that returns no rows.
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<()>;

    /// Runs a query expected to yield a single numeric value.
    async fn query_scalar(&self, sql: &str, params: &[SqlValue]) -> Result<u64>;

    /// Fetches the column dictionary for one table.
    async fn query_dictionary(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<DictionaryRow>>;

    /// Lists tables visible to the mining user, with observed load.
    async fn query_tables(&self, sql: &str) -> Result<Vec<crate::source::table::TableId>>;

    /// Opens a cursor over the mining view with the given fetch size.
    async fn open_contents(
        &self,
        sql: &str,
        params: &[SqlValue],
        fetch_size: u32,
    ) -> Result<Box<dyn ContentsCursor>>;

    /// Cheap liveness probe.
    async fn is_alive(&self) -> bool;

    /// Whether the instance exposes the container-level catalog.
    async fn has_container_catalog(&self) -> Result<bool>;
}

/// Creates connected clients from configuration.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn MinerClient>>;
}

/// Hands out a live client, reconnecting once when the held connection has
/// gone stale.
pub struct ConnectionManager {
    config: ConnectionConfig,
    factory: Arc<dyn ClientFactory>,
    client: Mutex<Option<Arc<dyn MinerClient>>>,
}

impl ConnectionManager {
    pub fn new(config: ConnectionConfig, factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            config,
            factory,
            client: Mutex::new(None),
        }
    }

    /// Returns the held client if it still answers a liveness probe,
    /// otherwise connects a fresh one.
    pub async fn client(&self) -> Result<Arc<dyn MinerClient>> {
        let mut slot = self.client.lock().await;

        if let Some(client) = slot.as_ref() {
            if client.is_alive().await {
                return Ok(client.clone());
            }
            warn!("held connection failed liveness probe, reconnecting");
            *slot = None;
        }

        debug!(url = %self.config.url, "connecting to mining database");
        let connect_timeout = Duration::from_secs(self.config.connect_timeout_secs);
        let client = tokio::time::timeout(connect_timeout, self.factory.connect(&self.config))
            .await
            .map_err(|_| {
                Error::Connection(format!(
                    "connect to {} timed out after {}s",
                    self.config.url, self.config.connect_timeout_secs
                ))
            })??;
        info!(url = %self.config.url, "connected to mining database");
        *slot = Some(client.clone());
        Ok(client)
    }

    /// Drops the held connection. The next [`ConnectionManager::client`] call
    /// reconnects.
    pub async fn close(&self) {
        let mut slot = self.client.lock().await;
        if slot.take().is_some() {
            debug!("connection released");
        }
    }
}

impl ContentsRow {
    /// The table identity this row belongs to, or an error when the view
    /// returned a row with no table name.
    pub fn table(&self) -> Result<crate::source::table::TableId> {
        if self.table_name.is_none() {
            return Err(Error::Database(format!(
                "contents row at scn {} has no table name",
                self.scn
            )));
        }
        Ok(crate::source::table::TableId::new(
            self.src_con_name.as_deref(),
            self.seg_owner.as_deref(),
            self.table_name.as_deref(),
        ))
    }
}
