//! Statement registry keyed by kind and deployment topology.
//!
//! The builtin statements live under `sql/` and are compiled in. Shared
//! statements are registered once; the three catalog-dependent statements
//! carry a multitenant override. Lookup falls back from the strategy-specific
//! entry to the shared one, so an operator-supplied override only has to
//! replace the statements that actually differ.

use crate::{Error, Result};
use std::collections::HashMap;
use std::fmt;

/// The statements the mining session issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    StartMining,
    StopMining,
    CurrentScn,
    EarliestScn,
    LatestScn,
    Contents,
    Dictionary,
    Tables,
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatementKind::StartMining => "start_mining",
            StatementKind::StopMining => "stop_mining",
            StatementKind::CurrentScn => "current_scn",
            StatementKind::EarliestScn => "earliest_scn",
            StatementKind::LatestScn => "latest_scn",
            StatementKind::Contents => "contents",
            StatementKind::Dictionary => "dictionary",
            StatementKind::Tables => "tables",
        };
        write!(f, "{}", name)
    }
}

/// How the target instance exposes its catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopologyStrategy {
    SingleInstance,
    Multitenant,
}

impl fmt::Display for TopologyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopologyStrategy::SingleInstance => write!(f, "single-instance"),
            TopologyStrategy::Multitenant => write!(f, "multitenant"),
        }
    }
}

/// Statement texts for every kind/strategy pair the session can ask for.
#[derive(Debug, Clone)]
pub struct DialectRegistry {
    shared: HashMap<StatementKind, String>,
    overrides: HashMap<(TopologyStrategy, StatementKind), String>,
}

impl DialectRegistry {
    pub fn new() -> Self {
        Self {
            shared: HashMap::new(),
            overrides: HashMap::new(),
        }
    }

    /// The compiled-in statement set.
    pub fn builtin() -> Self {
        let mut registry = Self::new();

        registry.set_shared(StatementKind::StartMining, include_str!("../../sql/start_mining.sql"));
        registry.set_shared(StatementKind::StopMining, include_str!("../../sql/stop_mining.sql"));
        registry.set_shared(StatementKind::CurrentScn, include_str!("../../sql/current_scn.sql"));
        registry.set_shared(StatementKind::EarliestScn, include_str!("../../sql/earliest_scn.sql"));
        registry.set_shared(StatementKind::LatestScn, include_str!("../../sql/latest_scn.sql"));

        registry.set_shared(StatementKind::Contents, include_str!("../../sql/contents.sql"));
        registry.set_shared(StatementKind::Dictionary, include_str!("../../sql/dictionary.sql"));
        registry.set_shared(StatementKind::Tables, include_str!("../../sql/tables.sql"));

        registry.set(
            TopologyStrategy::Multitenant,
            StatementKind::Contents,
            include_str!("../../sql/cdb_contents.sql"),
        );
        registry.set(
            TopologyStrategy::Multitenant,
            StatementKind::Dictionary,
            include_str!("../../sql/cdb_dictionary.sql"),
        );
        registry.set(
            TopologyStrategy::Multitenant,
            StatementKind::Tables,
            include_str!("../../sql/cdb_tables.sql"),
        );

        registry
    }

    /// Registers a statement valid for every strategy.
    pub fn set_shared(&mut self, kind: StatementKind, sql: &str) {
        self.shared.insert(kind, sql.trim().to_string());
    }

    /// Registers a strategy-specific statement, shadowing the shared one.
    pub fn set(&mut self, strategy: TopologyStrategy, kind: StatementKind, sql: &str) {
        self.overrides.insert((strategy, kind), sql.trim().to_string());
    }

    /// Looks up the statement text for a kind under a strategy.
    pub fn statement(&self, kind: StatementKind, strategy: TopologyStrategy) -> Result<&str> {
        self.overrides
            .get(&(strategy, kind))
            .or_else(|| self.shared.get(&kind))
            .map(String::as_str)
            .ok_or_else(|| Error::Statement {
                kind: kind.to_string(),
                strategy: strategy.to_string(),
            })
    }
}

impl Default for DialectRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
