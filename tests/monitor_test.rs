mod common;

use common::*;
use logminer_capture::miner::client::ConnectionManager;
use logminer_capture::miner::dialect::DialectRegistry;
use logminer_capture::miner::monitor::DictionaryMonitor;
use logminer_capture::source::table::{TableFilter, TableId};
use logminer_capture::Error;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

fn monitor(
    client: &Arc<MockClient>,
    filter: TableFilter,
    context: &Arc<RecordingContext>,
) -> (DictionaryMonitor, Arc<MockFactory>) {
    let factory = MockFactory::new(client.clone());
    let manager = Arc::new(ConnectionManager::new(connection_config(), factory.clone()));
    let monitor = DictionaryMonitor::spawn(
        monitor_config(100, 5),
        manager,
        Arc::new(DialectRegistry::builtin()),
        filter,
        context.clone(),
    );
    (monitor, factory)
}

fn table(name: &str) -> TableId {
    TableId::from_qualified_name(name)
}

#[tokio::test(start_paused = true)]
async fn test_stable_table_set_never_signals() {
    let client = MockClient::new(Script {
        multitenant: true,
        tables: [Ok(vec![table("DB.HR.EMP"), table("DB.HR.DEPT")])].into(),
        ..Script::default()
    });
    let context = Arc::new(RecordingContext::default());
    let (mut monitor, _factory) = monitor(&client, TableFilter::None, &context);

    let tables = monitor.current_tables().await.unwrap();
    assert_eq!(tables, vec![table("DB.HR.EMP"), table("DB.HR.DEPT")]);

    // Let many discovery cycles run with an unchanged catalog. The first
    // population must not count as a change either.
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(context.reconfigurations.load(Ordering::SeqCst), 0);

    monitor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_membership_change_signals_once() {
    let client = MockClient::new(Script {
        multitenant: true,
        tables: [
            Ok(vec![table("DB.HR.EMP")]),
            Ok(vec![table("DB.HR.EMP"), table("DB.HR.DEPT")]),
        ]
        .into(),
        ..Script::default()
    });
    let context = Arc::new(RecordingContext::default());
    let (mut monitor, _factory) = monitor(&client, TableFilter::None, &context);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(context.reconfigurations.load(Ordering::SeqCst), 1);

    let tables = monitor.current_tables().await.unwrap();
    assert_eq!(tables.len(), 2);

    monitor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_filter_applies_to_discovery() {
    let client = MockClient::new(Script {
        multitenant: true,
        tables: [Ok(vec![table("DB.HR.EMP"), table("DB.SYS.AUD$")])].into(),
        ..Script::default()
    });
    let filter = TableFilter::from_patterns(&["DB\\.HR\\..*".to_string()], &[]).unwrap();
    let context = Arc::new(RecordingContext::default());
    let (mut monitor, _factory) = monitor(&client, filter, &context);

    let tables = monitor.current_tables().await.unwrap();
    assert_eq!(tables, vec![table("DB.HR.EMP")]);

    monitor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_wait_times_out_without_discovery() {
    // Empty script: every discovery cycle fails, no snapshot ever lands.
    let client = MockClient::new(Script::default());
    let context = Arc::new(RecordingContext::default());
    let (mut monitor, _factory) = monitor(&client, TableFilter::None, &context);

    let result = monitor.current_tables().await;
    assert!(matches!(result, Err(Error::Timeout { .. })));
    // Catalog failures are retried, never escalated to the host.
    assert_eq!(context.errors.load(Ordering::SeqCst), 0);

    monitor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_discovery_error_retries_on_fresh_connection() {
    let client = MockClient::new(Script {
        multitenant: true,
        tables: [
            Err(Error::Database("catalog unavailable".to_string())),
            Ok(vec![table("DB.HR.EMP")]),
        ]
        .into(),
        ..Script::default()
    });
    let context = Arc::new(RecordingContext::default());
    let (mut monitor, factory) = monitor(&client, TableFilter::None, &context);

    let tables = monitor.current_tables().await.unwrap();
    assert_eq!(tables, vec![table("DB.HR.EMP")]);
    // A transient catalog failure stays inside the monitor.
    assert_eq!(context.errors.load(Ordering::SeqCst), 0);
    // The failed cycle released its connection; recovery reconnected.
    assert!(factory.connects.load(Ordering::SeqCst) >= 2);

    monitor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_unregistered_statement_stops_the_monitor() {
    // An empty registry cannot heal on retry: the monitor escalates once
    // and stops instead of spinning.
    let client = MockClient::new(Script {
        multitenant: true,
        tables: [Ok(vec![table("DB.HR.EMP")])].into(),
        ..Script::default()
    });
    let factory = MockFactory::new(client.clone());
    let manager = Arc::new(ConnectionManager::new(connection_config(), factory));
    let context = Arc::new(RecordingContext::default());
    let mut monitor = DictionaryMonitor::spawn(
        monitor_config(100, 1),
        manager,
        Arc::new(DialectRegistry::new()),
        TableFilter::None,
        context.clone(),
    );

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(context.errors.load(Ordering::SeqCst), 1);
    assert!(monitor.current_tables().await.is_err());

    monitor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_is_idempotent() {
    let client = MockClient::new(Script {
        tables: [Ok(vec![table("HR.EMP")])].into(),
        ..Script::default()
    });
    let context = Arc::new(RecordingContext::default());
    let (mut monitor, _factory) = monitor(&client, TableFilter::None, &context);

    monitor.current_tables().await.unwrap();
    monitor.shutdown().await;
    monitor.shutdown().await;
}
