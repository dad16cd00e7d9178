#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDateTime;
use logminer_capture::config::{ConnectionConfig, MinerConfig, MonitorConfig};
use logminer_capture::miner::client::{
    ClientFactory, ContentsCursor, ContentsRow, DictionaryRow, MinerClient, SqlValue,
};
use logminer_capture::miner::monitor::MonitorContext;
use logminer_capture::source::table::TableId;
use logminer_capture::{Error, Result};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub fn ts() -> NaiveDateTime {
    chrono::NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

pub fn connection_config() -> ConnectionConfig {
    ConnectionConfig {
        url: "jdbc:oracle:thin:@db:1521/ORCLCDB".to_string(),
        username: "miner".to_string(),
        password: "secret".to_string(),
        connect_timeout_secs: 5,
    }
}

pub fn miner_config(seek_scn: Option<&str>) -> MinerConfig {
    MinerConfig {
        seek_scn: seek_scn.map(str::to_string),
        fetch_size: 100,
        include: Vec::new(),
        exclude: Vec::new(),
        max_tasks: 1,
    }
}

pub fn monitor_config(poll_ms: u64, wait_secs: u64) -> MonitorConfig {
    MonitorConfig {
        table_poll_interval_ms: poll_ms,
        table_wait_timeout_secs: wait_secs,
    }
}

pub fn contents_row(table: &str, scn: u64, operation: &str, sql_redo: &str, csf: bool) -> ContentsRow {
    let id = TableId::from_qualified_name(table);
    ContentsRow {
        scn,
        commit_scn: scn + 5,
        row_id: format!("ROW{}", scn),
        src_con_name: id.container().map(str::to_string),
        seg_owner: id.owner().map(str::to_string),
        table_name: id.table().map(str::to_string),
        timestamp: ts(),
        operation: operation.to_string(),
        sql_redo: sql_redo.to_string(),
        csf,
    }
}

pub fn dict_row(name: &str, data_type: &str, scale: u32, precision: u32, nullable: bool) -> DictionaryRow {
    DictionaryRow {
        column_name: name.to_string(),
        nullable,
        data_type: data_type.to_string(),
        data_length: 22,
        data_scale: scale,
        data_precision: precision,
        primary_key: name == "ID",
        unique_key: false,
    }
}

/// Scripted responses for one mock client. Queues are consumed in order; the
/// table queue repeats its last successful snapshot once exhausted.
#[derive(Default)]
pub struct Script {
    pub scalars: VecDeque<u64>,
    pub dictionaries: VecDeque<Vec<DictionaryRow>>,
    pub tables: VecDeque<Result<Vec<TableId>>>,
    pub contents: VecDeque<ContentsRow>,
    pub multitenant: bool,
}

/// Everything the session asked the database for, verbatim.
#[derive(Default)]
pub struct Captured {
    pub executes: Vec<(String, Vec<SqlValue>)>,
    pub scalar_queries: Vec<(String, Vec<SqlValue>)>,
    pub dictionary_queries: Vec<(String, Vec<SqlValue>)>,
    pub contents_opens: Vec<(String, Vec<SqlValue>, u32)>,
}

pub struct MockClient {
    pub script: Mutex<Script>,
    pub captured: Mutex<Captured>,
    last_tables: Mutex<Option<Vec<TableId>>>,
    pub alive: std::sync::atomic::AtomicBool,
}

impl MockClient {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            captured: Mutex::new(Captured::default()),
            last_tables: Mutex::new(None),
            alive: std::sync::atomic::AtomicBool::new(true),
        })
    }
}

struct MockCursor {
    rows: VecDeque<ContentsRow>,
}

#[async_trait]
impl ContentsCursor for MockCursor {
    async fn next_row(&mut self) -> Result<Option<ContentsRow>> {
        Ok(self.rows.pop_front())
    }
}

#[async_trait]
impl MinerClient for MockClient {
    async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<()> {
        self.captured
            .lock()
            .unwrap()
            .executes
            .push((sql.to_string(), params.to_vec()));
        Ok(())
    }

    async fn query_scalar(&self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        self.captured
            .lock()
            .unwrap()
            .scalar_queries
            .push((sql.to_string(), params.to_vec()));
        self.script
            .lock()
            .unwrap()
            .scalars
            .pop_front()
            .ok_or_else(|| Error::Database("scalar script exhausted".to_string()))
    }

    async fn query_dictionary(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<DictionaryRow>> {
        self.captured
            .lock()
            .unwrap()
            .dictionary_queries
            .push((sql.to_string(), params.to_vec()));
        self.script
            .lock()
            .unwrap()
            .dictionaries
            .pop_front()
            .ok_or_else(|| Error::Database("dictionary script exhausted".to_string()))
    }

    async fn query_tables(&self, _sql: &str) -> Result<Vec<TableId>> {
        let next = self.script.lock().unwrap().tables.pop_front();
        match next {
            Some(Ok(tables)) => {
                *self.last_tables.lock().unwrap() = Some(tables.clone());
                Ok(tables)
            }
            Some(Err(e)) => Err(e),
            None => self
                .last_tables
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| Error::Database("table script exhausted".to_string())),
        }
    }

    async fn open_contents(
        &self,
        sql: &str,
        params: &[SqlValue],
        fetch_size: u32,
    ) -> Result<Box<dyn ContentsCursor>> {
        self.captured
            .lock()
            .unwrap()
            .contents_opens
            .push((sql.to_string(), params.to_vec(), fetch_size));
        let rows = std::mem::take(&mut self.script.lock().unwrap().contents);
        Ok(Box::new(MockCursor { rows }))
    }

    async fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn has_container_catalog(&self) -> Result<bool> {
        Ok(self.script.lock().unwrap().multitenant)
    }
}

pub struct MockFactory {
    client: Arc<MockClient>,
    pub connects: AtomicUsize,
}

impl MockFactory {
    pub fn new(client: Arc<MockClient>) -> Arc<Self> {
        Arc::new(Self {
            client,
            connects: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ClientFactory for MockFactory {
    async fn connect(&self, _config: &ConnectionConfig) -> Result<Arc<dyn MinerClient>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(self.client.clone())
    }
}

/// Counts host callbacks issued by the table monitor.
#[derive(Default)]
pub struct RecordingContext {
    pub reconfigurations: AtomicUsize,
    pub errors: AtomicUsize,
}

impl MonitorContext for RecordingContext {
    fn request_reconfiguration(&self) {
        self.reconfigurations.fetch_add(1, Ordering::SeqCst);
    }

    fn raise_error(&self, _error: &Error) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
}
