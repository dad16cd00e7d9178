//! Mining protocol: statements, driver boundary, session, discovery.

pub mod client;
pub mod dialect;
pub mod monitor;
pub mod session;

pub use client::{ClientFactory, ConnectionManager, ContentsCursor, ContentsRow, DictionaryRow, MinerClient, SqlValue};
pub use dialect::{DialectRegistry, StatementKind, TopologyStrategy};
pub use monitor::{DictionaryMonitor, MonitorContext};
pub use session::MiningSession;
