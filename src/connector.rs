//! Top-level connector tying configuration, discovery and sessions together.
//!
//! The host drives the lifecycle: `new` validates configuration, `start`
//! launches table discovery, `task_assignments` splits the discovered tables
//! across the configured number of mining tasks, and `new_session` hands out
//! one session per task. `stop` tears everything down.

use crate::config::Config;
use crate::miner::client::{ClientFactory, ConnectionManager};
use crate::miner::dialect::DialectRegistry;
use crate::miner::monitor::{DictionaryMonitor, MonitorContext};
use crate::miner::session::MiningSession;
use crate::partition::distribute;
use crate::source::table::{TableFilter, TableId};
use crate::{Error, Result};
use std::sync::Arc;
use tracing::info;

pub struct LogMinerConnector {
    config: Config,
    registry: Arc<DialectRegistry>,
    manager: Arc<ConnectionManager>,
    filter: TableFilter,
    monitor: Option<DictionaryMonitor>,
}

impl LogMinerConnector {
    /// Validates configuration and prepares the connector. No connection is
    /// made until `start`.
    pub fn new(config: Config, factory: Arc<dyn ClientFactory>) -> Result<Self> {
        let filter = TableFilter::from_patterns(&config.miner.include, &config.miner.exclude)?;
        let manager = Arc::new(ConnectionManager::new(config.connection.clone(), factory));
        Ok(Self {
            config,
            registry: Arc::new(DialectRegistry::builtin()),
            manager,
            filter,
            monitor: None,
        })
    }

    /// Replaces the builtin statement set, for operator-supplied overrides.
    pub fn with_registry(mut self, registry: DialectRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    /// Launches table discovery. Must be called before `task_assignments`.
    pub fn start(&mut self, context: Arc<dyn MonitorContext>) {
        if self.monitor.is_some() {
            return;
        }
        info!(max_tasks = self.config.miner.max_tasks, "starting connector");
        self.monitor = Some(DictionaryMonitor::spawn(
            self.config.monitor.clone(),
            self.manager.clone(),
            self.registry.clone(),
            self.filter.clone(),
            context,
        ));
    }

    /// Splits the currently-discovered tables into per-task assignments,
    /// honoring `max_tasks` and balancing observed load.
    pub async fn task_assignments(&self, max_tasks: usize) -> Result<Vec<Vec<TableId>>> {
        let monitor = self.monitor.as_ref().ok_or_else(|| Error::Session {
            message: "connector not started".to_string(),
        })?;
        let tables = monitor.current_tables().await?;
        let max_tasks = max_tasks.min(self.config.miner.max_tasks).max(1);
        Ok(distribute(tables, max_tasks))
    }

    /// A fresh, unstarted mining session for one task assignment.
    pub fn new_session(&self) -> MiningSession {
        MiningSession::new(
            self.manager.clone(),
            self.registry.clone(),
            self.config.miner.clone(),
        )
    }

    /// Stops discovery and releases the held connection.
    pub async fn stop(&mut self) {
        if let Some(mut monitor) = self.monitor.take() {
            monitor.shutdown().await;
        }
        self.manager.close().await;
        info!("connector stopped");
    }
}
