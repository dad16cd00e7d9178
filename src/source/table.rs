//! Table identity and inclusion/exclusion filtering.

use crate::{Error, Result};
use regex::RegexBuilder;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identifies a table visible to the mining session.
///
/// The triple is (container, owner, table); any component may be absent for
/// non-multitenant topologies. Equality, hashing and ordering are structural
/// over the triple only; the observed event count rides along purely as a
/// load metric for partitioning.
#[derive(Debug, Clone)]
pub struct TableId {
    container: Option<String>,
    owner: Option<String>,
    table: Option<String>,
    load: u64,
}

fn normalize(value: Option<&str>) -> Option<String> {
    match value {
        None => None,
        Some("") => None,
        Some(v) => Some(v.to_string()),
    }
}

impl TableId {
    pub fn new(container: Option<&str>, owner: Option<&str>, table: Option<&str>) -> Self {
        Self {
            container: normalize(container),
            owner: normalize(owner),
            table: normalize(table),
            load: 0,
        }
    }

    pub fn with_load(container: Option<&str>, owner: Option<&str>, table: Option<&str>, load: u64) -> Self {
        let mut id = Self::new(container, owner, table);
        id.load = load;
        id
    }

    /// Parses a persisted fully-qualified name. Missing leading components
    /// fill from the right: `"B.C"` has no container, `"C"` only a table name.
    pub fn from_qualified_name(name: &str) -> Self {
        let parts: Vec<&str> = name.split('.').collect();
        match parts.as_slice() {
            [table] => Self::new(None, None, Some(table)),
            [owner, table] => Self::new(None, Some(owner), Some(table)),
            [container, owner, table, ..] => Self::new(Some(container), Some(owner), Some(table)),
            [] => Self::new(None, None, None),
        }
    }

    /// The dotted name used for partition keys, filter matching and persistence.
    pub fn qualified_name(&self) -> String {
        let mut parts = Vec::with_capacity(3);
        if let Some(c) = &self.container {
            parts.push(c.as_str());
        }
        if let Some(o) = &self.owner {
            parts.push(o.as_str());
        }
        if let Some(t) = &self.table {
            parts.push(t.as_str());
        }
        parts.join(".")
    }

    pub fn container(&self) -> Option<&str> {
        self.container.as_deref()
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    pub fn load(&self) -> u64 {
        self.load
    }

    pub fn set_load(&mut self, load: u64) {
        self.load = load;
    }
}

impl PartialEq for TableId {
    fn eq(&self, other: &Self) -> bool {
        self.container == other.container && self.owner == other.owner && self.table == other.table
    }
}

impl Eq for TableId {}

impl Hash for TableId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.container.hash(state);
        self.owner.hash(state);
        self.table.hash(state);
    }
}

impl Ord for TableId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.table
            .cmp(&other.table)
            .then_with(|| self.owner.cmp(&other.owner))
            .then_with(|| self.container.cmp(&other.container))
    }
}

impl PartialOrd for TableId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.qualified_name())
    }
}

/// A set of compiled, anchored patterns matched against table names.
///
/// Patterns match case-insensitively against either the fully-qualified name
/// or the bare table name.
#[derive(Debug, Clone)]
pub struct PatternSet {
    patterns: Vec<regex::Regex>,
}

impl PatternSet {
    pub fn compile(patterns: &[String]) -> Result<Self> {
        let mut compiled = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let regex = RegexBuilder::new(&format!("^(?:{})$", pattern))
                .case_insensitive(true)
                .build()
                .map_err(|e| Error::Config(format!("invalid table pattern {:?}: {}", pattern, e)))?;
            compiled.push(regex);
        }
        Ok(Self { patterns: compiled })
    }

    pub fn matches(&self, table: &TableId) -> bool {
        let qname = table.qualified_name();
        self.patterns.iter().any(|p| {
            p.is_match(&qname) || table.table().map(|t| p.is_match(t)).unwrap_or(false)
        })
    }
}

/// Exactly one of: no filter, inclusion patterns, or exclusion patterns.
#[derive(Debug, Clone)]
pub enum TableFilter {
    None,
    Include(PatternSet),
    Exclude(PatternSet),
}

impl TableFilter {
    /// Builds the filter from configuration. Setting both include and exclude
    /// patterns violates the configuration contract and is a fatal error.
    pub fn from_patterns(include: &[String], exclude: &[String]) -> Result<Self> {
        if !include.is_empty() && !exclude.is_empty() {
            return Err(Error::Config(
                "miner.include and miner.exclude are exclusive".to_string(),
            ));
        }
        if !include.is_empty() {
            return Ok(TableFilter::Include(PatternSet::compile(include)?));
        }
        if !exclude.is_empty() {
            return Ok(TableFilter::Exclude(PatternSet::compile(exclude)?));
        }
        Ok(TableFilter::None)
    }

    pub fn accepts(&self, table: &TableId) -> bool {
        match self {
            TableFilter::None => true,
            TableFilter::Include(set) => set.matches(table),
            TableFilter::Exclude(set) => !set.matches(table),
        }
    }

    /// Applies the filter to a discovered table list, preserving order.
    pub fn apply(&self, tables: Vec<TableId>) -> Vec<TableId> {
        tables.into_iter().filter(|t| self.accepts(t)).collect()
    }
}
