//! The diff engine: pairs a desired schema against a live one by exact
//! name and emits a typed `SchemaDiff`. No fuzzy matching, no rename
//! inference — every pairing decision here is name equality.

use std::collections::{HashMap, HashSet};

use crate::model::{Database, Enum, Field, Function, Index, Role, Table};

/// Extensions to ignore when computing `extensions_added`/`extensions_removed`.
/// Constructors give "use defaults", "replace defaults", and "extend
/// defaults" semantics; a missing/`None` options value also means defaults.
#[derive(Debug, Clone)]
pub struct CompareOptions {
    pub ignored_extensions: Vec<String>,
}

/// System extensions that exist on effectively every Postgres install and
/// are never meaningful migration targets.
fn default_ignored_extensions() -> Vec<String> {
    vec!["plpgsql".to_string()]
}

impl CompareOptions {
    pub fn defaults() -> Self {
        CompareOptions {
            ignored_extensions: default_ignored_extensions(),
        }
    }

    pub fn replace(ignored_extensions: Vec<String>) -> Self {
        CompareOptions { ignored_extensions }
    }

    pub fn append(additional: Vec<String>) -> Self {
        let mut ignored_extensions = default_ignored_extensions();
        ignored_extensions.extend(additional);
        CompareOptions { ignored_extensions }
    }

    /// `None` selects defaults, mirroring "passing nil selects defaults".
    pub fn or_defaults(options: Option<CompareOptions>) -> Self {
        options.unwrap_or_else(Self::defaults)
    }
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self::defaults()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ColumnChange {
    pub column: String,
    pub changes: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableDiff {
    pub table_name: String,
    pub columns_added: Vec<Field>,
    pub columns_removed: Vec<String>,
    pub columns_modified: Vec<ColumnChange>,
}

impl TableDiff {
    fn is_empty(&self) -> bool {
        self.columns_added.is_empty() && self.columns_removed.is_empty() && self.columns_modified.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct EnumDiff {
    pub name: String,
    pub values_added: Vec<String>,
    pub values_removed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NamedChange {
    pub name: String,
    pub changes: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PolicyRemoval {
    pub policy_name: String,
    pub table_name: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PolicyChange {
    pub policy: String,
    pub table: String,
    pub changes: HashMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct SchemaDiff {
    pub tables_added: Vec<Table>,
    pub tables_removed: Vec<String>,
    pub tables_modified: Vec<TableDiff>,

    pub enums_added: Vec<Enum>,
    pub enums_removed: Vec<String>,
    pub enums_modified: Vec<EnumDiff>,

    pub indexes_added: Vec<Index>,
    pub indexes_removed: Vec<String>,

    pub extensions_added: Vec<String>,
    pub extensions_removed: Vec<String>,

    pub functions_added: Vec<Function>,
    pub functions_removed: Vec<String>,
    pub functions_modified: Vec<NamedChange>,

    pub policies_added: Vec<String>,
    pub policies_removed: Vec<PolicyRemoval>,
    pub policies_modified: Vec<PolicyChange>,

    pub rls_enabled_added: Vec<String>,
    pub rls_enabled_removed: Vec<String>,

    pub roles_added: Vec<Role>,
    pub roles_removed: Vec<String>,
    pub roles_modified: Vec<NamedChange>,
}

impl SchemaDiff {
    pub fn has_changes(&self) -> bool {
        !self.tables_added.is_empty()
            || !self.tables_removed.is_empty()
            || !self.tables_modified.is_empty()
            || !self.enums_added.is_empty()
            || !self.enums_removed.is_empty()
            || !self.enums_modified.is_empty()
            || !self.indexes_added.is_empty()
            || !self.indexes_removed.is_empty()
            || !self.extensions_added.is_empty()
            || !self.extensions_removed.is_empty()
            || !self.functions_added.is_empty()
            || !self.functions_removed.is_empty()
            || !self.functions_modified.is_empty()
            || !self.policies_added.is_empty()
            || !self.policies_removed.is_empty()
            || !self.policies_modified.is_empty()
            || !self.rls_enabled_added.is_empty()
            || !self.rls_enabled_removed.is_empty()
            || !self.roles_added.is_empty()
            || !self.roles_removed.is_empty()
            || !self.roles_modified.is_empty()
    }
}

/// Collapse equivalent type spellings so `INT` and `INTEGER`, `BOOL` and
/// `BOOLEAN`, and case variation in `VARCHAR(n)` don't register as changes.
pub fn normalize_type(raw: &str) -> String {
    let upper = raw.trim().to_uppercase();
    match upper.as_str() {
        "INT" | "INT4" => "INTEGER".to_string(),
        "INT8" => "BIGINT".to_string(),
        "INT2" => "SMALLINT".to_string(),
        "BOOL" => "BOOLEAN".to_string(),
        other => other.to_string(),
    }
}

fn default_value(field: &Field) -> Option<&str> {
    field
        .default_literal
        .as_deref()
        .or(field.default_expression.as_deref())
}

fn diff_columns(desired: &Field, live: &Field) -> Option<ColumnChange> {
    let mut changes = HashMap::new();

    let d_type = normalize_type(&desired.r#type);
    let l_type = normalize_type(&live.r#type);
    if d_type != l_type {
        changes.insert("type".to_string(), format!("{l_type} -> {d_type}"));
    }
    if desired.nullable != live.nullable {
        changes.insert(
            "nullable".to_string(),
            format!("{} -> {}", live.nullable, desired.nullable),
        );
    }
    if desired.primary != live.primary {
        changes.insert(
            "primary".to_string(),
            format!("{} -> {}", live.primary, desired.primary),
        );
    }
    if desired.unique != live.unique {
        changes.insert(
            "unique".to_string(),
            format!("{} -> {}", live.unique, desired.unique),
        );
    }
    if default_value(desired) != default_value(live) {
        changes.insert(
            "default".to_string(),
            format!(
                "{} -> {}",
                default_value(live).unwrap_or(""),
                default_value(desired).unwrap_or("")
            ),
        );
    }
    if desired.check != live.check {
        changes.insert(
            "check".to_string(),
            format!(
                "{} -> {}",
                live.check.as_deref().unwrap_or(""),
                desired.check.as_deref().unwrap_or("")
            ),
        );
    }
    if desired.comment != live.comment {
        changes.insert(
            "comment".to_string(),
            format!(
                "{} -> {}",
                live.comment.as_deref().unwrap_or(""),
                desired.comment.as_deref().unwrap_or("")
            ),
        );
    }

    if changes.is_empty() {
        None
    } else {
        Some(ColumnChange {
            column: desired.name.clone(),
            changes,
        })
    }
}

fn diff_table(table_name: &str, desired: &Database, live: &Database) -> TableDiff {
    let desired_fields: HashMap<&str, &Field> =
        desired.fields_of(table_name).into_iter().map(|f| (f.name.as_str(), f)).collect();
    let live_fields: HashMap<&str, &Field> =
        live.fields_of(table_name).into_iter().map(|f| (f.name.as_str(), f)).collect();

    let mut diff = TableDiff {
        table_name: table_name.to_string(),
        ..Default::default()
    };

    let mut desired_names: Vec<&str> = desired_fields.keys().copied().collect();
    desired_names.sort();
    for name in desired_names {
        match live_fields.get(name) {
            None => diff.columns_added.push((*desired_fields[name]).clone()),
            Some(live_field) => {
                if let Some(change) = diff_columns(desired_fields[name], live_field) {
                    diff.columns_modified.push(change);
                }
            }
        }
    }

    let mut live_names: Vec<&str> = live_fields.keys().copied().collect();
    live_names.sort();
    for name in live_names {
        if !desired_fields.contains_key(name) {
            diff.columns_removed.push(name.to_string());
        }
    }

    diff
}

fn name_set<'a, T>(items: &'a [T], name_of: impl Fn(&'a T) -> &'a str) -> HashSet<&'a str> {
    items.iter().map(name_of).collect()
}

/// Compare a desired schema against a live one, producing a typed diff.
/// `options` controls the extension ignore-filter; `None` uses defaults.
pub fn compare(desired: &Database, live: &Database, options: Option<CompareOptions>) -> SchemaDiff {
    let options = CompareOptions::or_defaults(options);
    let mut diff = SchemaDiff::default();

    let desired_tables = name_set(&desired.tables, |t| t.name.as_str());
    let live_tables = name_set(&live.tables, |t| t.name.as_str());

    let mut added_names: Vec<&str> = desired_tables.difference(&live_tables).copied().collect();
    added_names.sort();
    for name in added_names {
        diff.tables_added.push(desired.table_by_name(name).unwrap().clone());
    }

    let mut removed_names: Vec<&str> = live_tables.difference(&desired_tables).copied().collect();
    removed_names.sort();
    diff.tables_removed = removed_names.into_iter().map(str::to_string).collect();

    let mut common_names: Vec<&str> = desired_tables.intersection(&live_tables).copied().collect();
    common_names.sort();
    for name in common_names {
        let table_diff = diff_table(name, desired, live);
        if !table_diff.is_empty() {
            diff.tables_modified.push(table_diff);
        }
    }

    let desired_enums: HashMap<&str, &Enum> = desired.enums.iter().map(|e| (e.name.as_str(), e)).collect();
    let live_enums: HashMap<&str, &Enum> = live.enums.iter().map(|e| (e.name.as_str(), e)).collect();
    let mut enum_added: Vec<&str> = desired_enums.keys().filter(|n| !live_enums.contains_key(*n)).copied().collect();
    enum_added.sort();
    diff.enums_added = enum_added.into_iter().map(|n| desired_enums[n].clone()).collect();

    let mut enum_removed: Vec<&str> = live_enums.keys().filter(|n| !desired_enums.contains_key(*n)).copied().collect();
    enum_removed.sort();
    diff.enums_removed = enum_removed.into_iter().map(str::to_string).collect();

    let mut enum_common: Vec<&str> = desired_enums.keys().filter(|n| live_enums.contains_key(*n)).copied().collect();
    enum_common.sort();
    for name in enum_common {
        let d = desired_enums[name];
        let l = live_enums[name];
        let values_added: Vec<String> = d.values.iter().filter(|v| !l.values.contains(v)).cloned().collect();
        let values_removed: Vec<String> = l.values.iter().filter(|v| !d.values.contains(v)).cloned().collect();
        if !values_added.is_empty() || !values_removed.is_empty() {
            diff.enums_modified.push(EnumDiff {
                name: name.to_string(),
                values_added,
                values_removed,
            });
        }
    }

    let desired_idx_names = name_set(&desired.indexes, |i| i.name.as_str());
    let live_idx_names = name_set(&live.indexes, |i| i.name.as_str());
    let mut idx_added: Vec<&str> = desired_idx_names.difference(&live_idx_names).copied().collect();
    idx_added.sort();
    diff.indexes_added = idx_added
        .into_iter()
        .map(|n| desired.indexes.iter().find(|i| i.name == n).unwrap().clone())
        .collect();
    let mut idx_removed: Vec<&str> = live_idx_names.difference(&desired_idx_names).copied().collect();
    idx_removed.sort();
    diff.indexes_removed = idx_removed.into_iter().map(str::to_string).collect();

    let ignore: HashSet<&str> = options.ignored_extensions.iter().map(String::as_str).collect();
    let desired_ext: HashSet<&str> = desired
        .extensions
        .iter()
        .map(|e| e.name.as_str())
        .filter(|n| !ignore.contains(n))
        .collect();
    let live_ext: HashSet<&str> = live
        .extensions
        .iter()
        .map(|e| e.name.as_str())
        .filter(|n| !ignore.contains(n))
        .collect();
    let mut ext_added: Vec<&str> = desired_ext.difference(&live_ext).copied().collect();
    ext_added.sort();
    diff.extensions_added = ext_added.into_iter().map(str::to_string).collect();
    let mut ext_removed: Vec<&str> = live_ext.difference(&desired_ext).copied().collect();
    ext_removed.sort();
    diff.extensions_removed = ext_removed.into_iter().map(str::to_string).collect();

    let desired_fn: HashMap<&str, &Function> = desired.functions.iter().map(|f| (f.name.as_str(), f)).collect();
    let live_fn: HashMap<&str, &Function> = live.functions.iter().map(|f| (f.name.as_str(), f)).collect();
    let mut fn_added: Vec<&str> = desired_fn.keys().filter(|n| !live_fn.contains_key(*n)).copied().collect();
    fn_added.sort();
    diff.functions_added = fn_added.into_iter().map(|n| desired_fn[n].clone()).collect();
    let mut fn_removed: Vec<&str> = live_fn.keys().filter(|n| !desired_fn.contains_key(*n)).copied().collect();
    fn_removed.sort();
    diff.functions_removed = fn_removed.into_iter().map(str::to_string).collect();
    let mut fn_common: Vec<&str> = desired_fn.keys().filter(|n| live_fn.contains_key(*n)).copied().collect();
    fn_common.sort();
    for name in fn_common {
        let d = desired_fn[name];
        let l = live_fn[name];
        let mut changes = HashMap::new();
        if d.returns != l.returns {
            changes.insert("returns".to_string(), format!("{} -> {}", l.returns, d.returns));
        }
        if d.body != l.body && !l.body.is_empty() {
            changes.insert("body".to_string(), "modified".to_string());
        }
        if !changes.is_empty() {
            diff.functions_modified.push(NamedChange {
                name: name.to_string(),
                changes,
            });
        }
    }

    let desired_policy_names = name_set(&desired.rls_policies, |p| p.name.as_str());
    let live_policy_names = name_set(&live.rls_policies, |p| p.name.as_str());
    let mut p_added: Vec<&str> = desired_policy_names.difference(&live_policy_names).copied().collect();
    p_added.sort();
    diff.policies_added = p_added.into_iter().map(str::to_string).collect();
    let mut p_removed: Vec<&str> = live_policy_names.difference(&desired_policy_names).copied().collect();
    p_removed.sort();
    diff.policies_removed = p_removed
        .into_iter()
        .map(|n| {
            let table = live.rls_policies.iter().find(|p| p.name == n).map(|p| p.table.clone()).unwrap_or_default();
            PolicyRemoval {
                policy_name: n.to_string(),
                table_name: table,
            }
        })
        .collect();
    let mut p_common: Vec<&str> = desired_policy_names.intersection(&live_policy_names).copied().collect();
    p_common.sort();
    for name in p_common {
        let d = desired.rls_policies.iter().find(|p| p.name == name).unwrap();
        let l = live.rls_policies.iter().find(|p| p.name == name).unwrap();
        let mut changes = HashMap::new();
        if d.using_expression != l.using_expression {
            changes.insert(
                "using".to_string(),
                format!(
                    "{} -> {}",
                    l.using_expression.as_deref().unwrap_or(""),
                    d.using_expression.as_deref().unwrap_or("")
                ),
            );
        }
        if d.to_roles != l.to_roles {
            changes.insert(
                "to_roles".to_string(),
                format!("{} -> {}", l.to_roles.as_deref().unwrap_or(""), d.to_roles.as_deref().unwrap_or("")),
            );
        }
        if !changes.is_empty() {
            diff.policies_modified.push(PolicyChange {
                policy: name.to_string(),
                table: d.table.clone(),
                changes,
            });
        }
    }

    let desired_enabled = name_set(&desired.rls_enabled_tables, |t| t.table.as_str());
    let live_enabled = name_set(&live.rls_enabled_tables, |t| t.table.as_str());
    let mut enabled_added: Vec<&str> = desired_enabled.difference(&live_enabled).copied().collect();
    enabled_added.sort();
    diff.rls_enabled_added = enabled_added.into_iter().map(str::to_string).collect();
    let mut enabled_removed: Vec<&str> = live_enabled.difference(&desired_enabled).copied().collect();
    enabled_removed.sort();
    diff.rls_enabled_removed = enabled_removed.into_iter().map(str::to_string).collect();

    let desired_roles: HashMap<&str, &Role> = desired.roles.iter().map(|r| (r.name.as_str(), r)).collect();
    let live_roles: HashMap<&str, &Role> = live.roles.iter().map(|r| (r.name.as_str(), r)).collect();
    let mut role_added: Vec<&str> = desired_roles.keys().filter(|n| !live_roles.contains_key(*n)).copied().collect();
    role_added.sort();
    diff.roles_added = role_added.into_iter().map(|n| desired_roles[n].clone()).collect();
    let mut role_removed: Vec<&str> = live_roles.keys().filter(|n| !desired_roles.contains_key(*n)).copied().collect();
    role_removed.sort();
    diff.roles_removed = role_removed.into_iter().map(str::to_string).collect();
    let mut role_common: Vec<&str> = desired_roles.keys().filter(|n| live_roles.contains_key(*n)).copied().collect();
    role_common.sort();
    for name in role_common {
        let d = desired_roles[name];
        let l = live_roles[name];
        let mut changes = HashMap::new();
        if d.login != l.login {
            changes.insert("login".to_string(), format!("{} -> {}", l.login, d.login));
        }
        if d.superuser != l.superuser {
            changes.insert("superuser".to_string(), format!("{} -> {}", l.superuser, d.superuser));
        }
        if !changes.is_empty() {
            diff.roles_modified.push(NamedChange {
                name: name.to_string(),
                changes,
            });
        }
    }

    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Table;

    fn table(name: &str) -> Table {
        Table {
            struct_id: name.to_string(),
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn empty_vs_empty_has_no_changes() {
        let diff = compare(&Database::default(), &Database::default(), None);
        assert!(!diff.has_changes());
    }

    #[test]
    fn table_present_only_in_desired_is_added() {
        let mut desired = Database::default();
        desired.tables.push(table("users"));
        let diff = compare(&desired, &Database::default(), None);
        assert_eq!(diff.tables_added.len(), 1);
        assert!(diff.has_changes());
    }

    #[test]
    fn column_type_change_is_normalised_before_comparing() {
        let mut desired = Database::default();
        desired.tables.push(table("users"));
        desired.fields.push(Field::new("users", "age", "INTEGER"));
        let mut live = Database::default();
        live.tables.push(table("users"));
        live.fields.push(Field::new("users", "age", "INT"));

        let diff = compare(&desired, &live, None);
        assert!(diff.tables_modified.is_empty());
    }

    #[test]
    fn column_change_produces_old_arrow_new_string() {
        let mut desired = Database::default();
        desired.tables.push(table("users"));
        let mut f = Field::new("users", "age", "BIGINT");
        f.nullable = false;
        desired.fields.push(f);
        let mut live = Database::default();
        live.tables.push(table("users"));
        live.fields.push(Field::new("users", "age", "INTEGER"));

        let diff = compare(&desired, &live, None);
        let change = &diff.tables_modified[0].columns_modified[0];
        assert_eq!(change.changes.get("type"), Some(&"INTEGER -> BIGINT".to_string()));
        assert_eq!(change.changes.get("nullable"), Some(&"true -> false".to_string()));
    }

    #[test]
    fn ignore_list_semantics() {
        let mut desired = Database::default();
        desired.extensions.push(crate::model::Extension {
            name: "pg_trgm".into(),
            ..Default::default()
        });
        let mut live = Database::default();
        live.extensions.push(crate::model::Extension {
            name: "plpgsql".into(),
            ..Default::default()
        });
        live.extensions.push(crate::model::Extension {
            name: "adminpack".into(),
            ..Default::default()
        });

        let diff = compare(&desired, &live, None);
        assert_eq!(diff.extensions_added, vec!["pg_trgm"]);
        assert_eq!(diff.extensions_removed, vec!["adminpack"]);

        let diff2 = compare(&desired, &live, Some(CompareOptions::append(vec!["adminpack".to_string()])));
        assert!(diff2.extensions_removed.is_empty());

        let diff3 = compare(&desired, &live, Some(CompareOptions::replace(vec![])));
        let mut removed = diff3.extensions_removed.clone();
        removed.sort();
        assert_eq!(removed, vec!["adminpack", "plpgsql"]);
    }

    #[test]
    fn enum_removal_reported_honestly() {
        let mut desired = Database::default();
        desired.enums.push(Enum { name: "status".into(), values: vec!["active".into()] });
        let mut live = Database::default();
        live.enums.push(Enum { name: "status".into(), values: vec!["active".into(), "banned".into()] });

        let diff = compare(&desired, &live, None);
        assert_eq!(diff.enums_modified[0].values_removed, vec!["banned"]);
    }
}
