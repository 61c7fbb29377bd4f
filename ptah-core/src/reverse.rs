//! Reverse-diff construction: given the diff that produced the *up*
//! migration, build the diff that undoes it, so the same planner and
//! renderer can produce *down* SQL.

use crate::diff::{ColumnChange, EnumDiff, NamedChange, PolicyChange, PolicyRemoval, SchemaDiff};
use crate::live_convert;
use crate::reader::LiveSchema;

/// Split a `"old -> new"` change string and rebuild it as `"new -> old"`.
/// Strings that don't contain the separator are returned unchanged —
/// callers only ever pass values this module itself produced.
fn flip(change: &str) -> String {
    match change.split_once(" -> ") {
        Some((old, new)) => format!("{new} -> {old}"),
        None => change.to_string(),
    }
}

fn flip_changes(changes: &std::collections::HashMap<String, String>) -> std::collections::HashMap<String, String> {
    changes.iter().map(|(k, v)| (k.clone(), flip(v))).collect()
}

fn flip_column_change(c: &ColumnChange) -> ColumnChange {
    ColumnChange {
        column: c.column.clone(),
        changes: flip_changes(&c.changes),
    }
}

fn flip_enum_diff(e: &EnumDiff) -> EnumDiff {
    EnumDiff {
        name: e.name.clone(),
        values_added: e.values_removed.clone(),
        values_removed: e.values_added.clone(),
    }
}

fn flip_named_change(c: &NamedChange) -> NamedChange {
    NamedChange {
        name: c.name.clone(),
        changes: flip_changes(&c.changes),
    }
}

/// Build the reverse of `diff` using `live` (the post-up schema, as read
/// off the database) to resolve table names for policies that were
/// *added* by the forward diff and so must become *removed* entries here.
pub fn reverse(diff: &SchemaDiff, live: &LiveSchema) -> SchemaDiff {
    let policy_table = live_convert::policy_table_lookup(live);

    // Columns the forward diff dropped can't be un-dropped here: their
    // field definitions are gone by the time this runs. Those drops are
    // irreversible within a single migration pair, same as the enum
    // value-removal case the diff engine already reports honestly instead
    // of silently dropping.
    let tables_modified: Vec<_> = diff
        .tables_modified
        .iter()
        .map(|t| crate::diff::TableDiff {
            table_name: t.table_name.clone(),
            columns_added: Vec::new(),
            columns_removed: t.columns_added.iter().map(|f| f.name.clone()).collect(),
            columns_modified: t.columns_modified.iter().map(flip_column_change).collect(),
        })
        .collect();

    SchemaDiff {
        tables_added: Vec::new(),
        tables_removed: diff.tables_added.iter().map(|t| t.name.clone()).collect(),
        tables_modified,

        enums_added: Vec::new(),
        enums_removed: diff.enums_added.iter().map(|e| e.name.clone()).collect(),
        enums_modified: diff.enums_modified.iter().map(flip_enum_diff).collect(),

        indexes_added: Vec::new(),
        indexes_removed: diff.indexes_added.iter().map(|i| i.name.clone()).collect(),

        extensions_added: diff.extensions_removed.clone(),
        extensions_removed: diff.extensions_added.clone(),

        functions_added: Vec::new(),
        functions_removed: diff.functions_added.iter().map(|f| f.name.clone()).collect(),
        functions_modified: diff.functions_modified.iter().map(flip_named_change).collect(),

        policies_added: diff.policies_removed.iter().map(|p| p.policy_name.clone()).collect(),
        policies_removed: diff
            .policies_added
            .iter()
            .map(|name| PolicyRemoval {
                policy_name: name.clone(),
                table_name: policy_table.get(name).cloned().unwrap_or_default(),
            })
            .collect(),
        policies_modified: diff
            .policies_modified
            .iter()
            .map(|c| PolicyChange {
                policy: c.policy.clone(),
                table: c.table.clone(),
                changes: flip_changes(&c.changes),
            })
            .collect(),

        rls_enabled_added: diff.rls_enabled_removed.clone(),
        rls_enabled_removed: diff.rls_enabled_added.clone(),

        roles_added: Vec::new(),
        roles_removed: diff.roles_added.iter().map(|r| r.name.clone()).collect(),
        roles_modified: diff.roles_modified.iter().map(flip_named_change).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Database, RLSPolicy, Table};

    #[test]
    fn swaps_added_and_removed_tables() {
        let mut diff = SchemaDiff::default();
        diff.tables_added.push(Table { name: "users".into(), ..Default::default() });
        diff.tables_removed.push("legacy".into());

        let reversed = reverse(&diff, &LiveSchema::default());
        assert_eq!(reversed.tables_removed, vec!["users"]);
        assert!(reversed.tables_added.is_empty());
    }

    #[test]
    fn rebuilds_change_strings_with_swapped_direction() {
        let mut diff = SchemaDiff::default();
        diff.tables_modified.push(crate::diff::TableDiff {
            table_name: "users".into(),
            columns_added: Vec::new(),
            columns_removed: Vec::new(),
            columns_modified: vec![ColumnChange {
                column: "age".into(),
                changes: [("type".to_string(), "INTEGER -> BIGINT".to_string())].into_iter().collect(),
            }],
        });

        let reversed = reverse(&diff, &LiveSchema::default());
        let change = &reversed.tables_modified[0].columns_modified[0];
        assert_eq!(change.changes.get("type"), Some(&"BIGINT -> INTEGER".to_string()));
    }

    #[test]
    fn resolves_added_policy_table_from_live_schema() {
        let mut diff = SchemaDiff::default();
        diff.policies_added.push("user_iso".into());

        let mut live: Database = Database::default();
        live.rls_policies.push(RLSPolicy {
            name: "user_iso".into(),
            table: "users".into(),
            ..Default::default()
        });

        let reversed = reverse(&diff, &live);
        assert_eq!(reversed.policies_removed[0].table_name, "users");
    }
}
