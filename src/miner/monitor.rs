//! Background discovery of mineable tables.
//!
//! The monitor polls the catalog on an interval and publishes the filtered
//! table list through a watch channel. Consumers wait on the channel with a
//! bounded timeout; a change in membership between two cycles asks the host
//! to reconfigure so partitions can be redistributed.

use crate::config::MonitorConfig;
use crate::miner::client::ConnectionManager;
use crate::miner::dialect::{DialectRegistry, StatementKind, TopologyStrategy};
use crate::source::table::{TableFilter, TableId};
use crate::{Error, Result};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Host hooks the monitor calls when the mineable set changes or discovery
/// breaks down.
pub trait MonitorContext: Send + Sync {
    /// The table set changed; task assignments should be rebuilt.
    fn request_reconfiguration(&self);

    /// Discovery failed in a way retrying cannot fix; the host should treat
    /// the monitor as dead.
    fn raise_error(&self, error: &Error);
}

/// Periodically discovers tables and signals membership changes.
pub struct DictionaryMonitor {
    tables: watch::Receiver<Option<Vec<TableId>>>,
    shutdown: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
    wait_timeout: Duration,
}

impl DictionaryMonitor {
    pub fn spawn(
        config: MonitorConfig,
        manager: Arc<ConnectionManager>,
        registry: Arc<DialectRegistry>,
        filter: TableFilter,
        context: Arc<dyn MonitorContext>,
    ) -> Self {
        let (tables_tx, tables_rx) = watch::channel(None);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let interval = Duration::from_millis(config.table_poll_interval_ms);
        let wait_timeout = Duration::from_secs(config.table_wait_timeout_secs);

        let handle = tokio::spawn(run(
            interval, manager, registry, filter, context, tables_tx, shutdown_rx,
        ));

        Self {
            tables: tables_rx,
            shutdown: shutdown_tx,
            handle: Some(handle),
            wait_timeout,
        }
    }

    /// The most recent table snapshot, waiting up to the configured bound for
    /// the first discovery cycle to complete.
    pub async fn current_tables(&self) -> Result<Vec<TableId>> {
        let mut rx = self.tables.clone();
        let populated = tokio::time::timeout(self.wait_timeout, rx.wait_for(|t| t.is_some())).await;
        match populated {
            Ok(Ok(guard)) => Ok(guard.as_ref().cloned().unwrap_or_default()),
            Ok(Err(_)) => Err(Error::Session {
                message: "table monitor stopped before publishing tables".to_string(),
            }),
            Err(_) => Err(Error::Timeout {
                message: format!(
                    "no table snapshot within {:?}",
                    self.wait_timeout
                ),
            }),
        }
    }

    /// Stops the discovery loop and waits for it to finish. Idempotent.
    pub async fn shutdown(&mut self) {
        let _ = self.shutdown.send(true);
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    warn!(error = %e, "table monitor task panicked");
                }
            }
        }
    }
}

async fn run(
    interval: Duration,
    manager: Arc<ConnectionManager>,
    registry: Arc<DialectRegistry>,
    filter: TableFilter,
    context: Arc<dyn MonitorContext>,
    tables_tx: watch::Sender<Option<Vec<TableId>>>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(poll_interval = ?interval, "table monitor started");
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }

        match discover(&manager, &registry, &filter).await {
            Ok(tables) => {
                let changed = {
                    let previous = tables_tx.borrow();
                    match previous.as_ref() {
                        // First population establishes the baseline without
                        // asking for a reconfiguration.
                        None => false,
                        Some(previous) => membership(previous) != membership(&tables),
                    }
                };

                let had_snapshot = tables_tx.borrow().is_some();
                tables_tx.send_replace(Some(tables));

                if changed {
                    info!("mineable table set changed, requesting reconfiguration");
                    context.request_reconfiguration();
                } else if !had_snapshot {
                    debug!("initial table snapshot published");
                }
            }
            Err(e) if is_recoverable(&e) => {
                // Keep the last good snapshot and retry on a fresh
                // connection next cycle.
                warn!(error = %e, "table discovery failed, retrying next cycle");
                manager.close().await;
            }
            Err(e) => {
                error!(error = %e, "table monitor cannot recover");
                context.raise_error(&e);
                break;
            }
        }
    }

    manager.close().await;
    info!("table monitor stopped");
}

async fn discover(
    manager: &Arc<ConnectionManager>,
    registry: &Arc<DialectRegistry>,
    filter: &TableFilter,
) -> Result<Vec<TableId>> {
    let client = manager.client().await?;
    let strategy = if client.has_container_catalog().await? {
        TopologyStrategy::Multitenant
    } else {
        TopologyStrategy::SingleInstance
    };
    let sql = registry.statement(StatementKind::Tables, strategy)?;
    let tables = client.query_tables(sql).await?;
    let tables = filter.apply(tables);
    debug!(count = tables.len(), strategy = %strategy, "discovered mineable tables");
    Ok(tables)
}

fn membership(tables: &[TableId]) -> BTreeSet<&TableId> {
    tables.iter().collect()
}

/// Catalog and connection failures are transient; anything else (missing
/// statement text, configuration) will not heal on retry.
fn is_recoverable(error: &Error) -> bool {
    matches!(error, Error::Database(_) | Error::Connection(_))
}
