//! Load-aware distribution of tables across mining tasks.

use crate::source::table::TableId;
use tracing::debug;

/// Splits tables into at most `max_groups` groups, balancing observed load.
///
/// Tables are dealt round-robin in ascending load order, so the heaviest
/// tables land on different groups. Group count never exceeds the table
/// count; every input table appears in exactly one group.
pub fn distribute(mut tables: Vec<TableId>, max_groups: usize) -> Vec<Vec<TableId>> {
    let groups = max_groups.min(tables.len());
    if groups == 0 {
        return Vec::new();
    }

    tables.sort_by(|a, b| {
        a.load()
            .cmp(&b.load())
            .then_with(|| a.qualified_name().cmp(&b.qualified_name()))
    });

    let mut assignments: Vec<Vec<TableId>> = vec![Vec::new(); groups];
    for (i, table) in tables.into_iter().enumerate() {
        assignments[i % groups].push(table);
    }

    debug!(
        groups = assignments.len(),
        sizes = ?assignments.iter().map(Vec::len).collect::<Vec<_>>(),
        "distributed tables across mining tasks"
    );
    assignments
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn table(name: &str, load: u64) -> TableId {
        let mut id = TableId::from_qualified_name(name);
        id.set_load(load);
        id
    }

    #[test]
    fn test_even_split() {
        let tables: Vec<TableId> = (0..9).map(|i| table(&format!("HR.T{}", i), i)).collect();
        let groups = distribute(tables, 3);
        assert_eq!(groups.len(), 3);
        assert!(groups.iter().all(|g| g.len() == 3));
    }

    #[test]
    fn test_every_table_assigned_once() {
        let tables: Vec<TableId> = (0..7).map(|i| table(&format!("HR.T{}", i), 7 - i)).collect();
        let input: HashSet<TableId> = tables.iter().cloned().collect();

        let groups = distribute(tables, 3);
        let assigned: Vec<TableId> = groups.into_iter().flatten().collect();
        assert_eq!(assigned.len(), 7);
        assert_eq!(assigned.into_iter().collect::<HashSet<_>>(), input);
    }

    #[test]
    fn test_group_count_never_exceeds_table_count() {
        let tables = vec![table("HR.A", 1), table("HR.B", 2)];
        let groups = distribute(tables, 8);
        assert_eq!(groups.len(), 2);
        assert!(groups.iter().all(|g| g.len() == 1));
    }

    #[test]
    fn test_no_tables_yields_no_groups() {
        assert!(distribute(Vec::new(), 4).is_empty());
    }

    #[test]
    fn test_heavy_tables_spread_across_groups() {
        let tables = vec![
            table("HR.HOT1", 1000),
            table("HR.HOT2", 900),
            table("HR.COLD1", 1),
            table("HR.COLD2", 2),
        ];
        let groups = distribute(tables, 2);

        for group in &groups {
            let heavy = group.iter().filter(|t| t.load() > 100).count();
            assert_eq!(heavy, 1);
        }
    }
}
