//! The planner: turns a `SchemaDiff` into an ordered `Vec<Node>` whose
//! rendering realises that diff. Step order follows the fixed 21-step
//! apply order; within a step, objects are emitted in lexicographic name
//! order for deterministic output.

use std::collections::{HashMap, HashSet};

use crate::ast::{AlterTableOp, ConstraintDef, Node, TypeAlteration};
use crate::convert;
use crate::dialect::Dialect;
use crate::diff::SchemaDiff;
use crate::error::ValidationWarning;
use crate::model::{ConstraintType, Database};

/// `GenerateDiff(diff, desired, dialect) -> StatementList`.
pub fn generate(diff: &SchemaDiff, desired: &Database, dialect: Dialect) -> (Vec<Node>, Vec<ValidationWarning>) {
    let mut out = Vec::new();
    let mut warnings = Vec::new();

    // 1. DROP POLICY for removed policies.
    let mut removed_policies = diff.policies_removed.clone();
    removed_policies.sort_by(|a, b| a.policy_name.cmp(&b.policy_name));
    for p in &removed_policies {
        push_or_degrade(
            &mut out,
            dialect,
            dialect.supports_rls(),
            "RLS policy",
            Node::DropPolicy {
                name: p.policy_name.clone(),
                table: p.table_name.clone(),
                if_exists: true,
            },
        );
    }

    // 2. Disable RLS for removed rls-enabled tables.
    let mut rls_removed = diff.rls_enabled_removed.clone();
    rls_removed.sort();
    for table in &rls_removed {
        push_or_degrade(
            &mut out,
            dialect,
            dialect.supports_rls(),
            "row level security",
            Node::AlterTable {
                table: table.clone(),
                op: AlterTableOp::DisableRowLevelSecurity,
            },
        );
    }

    // 3. Index drops.
    let mut idx_removed = diff.indexes_removed.clone();
    idx_removed.sort();
    for name in &idx_removed {
        out.push(Node::DropIndex {
            name: name.clone(),
            if_exists: true,
        });
    }

    // 4. Table drops.
    let mut tables_removed = diff.tables_removed.clone();
    tables_removed.sort();
    for name in &tables_removed {
        out.push(Node::DropTable {
            name: name.clone(),
            if_exists: true,
        });
    }

    // 5. Column drops inside modified tables.
    let mut tables_modified: Vec<_> = diff.tables_modified.iter().collect();
    tables_modified.sort_by(|a, b| a.table_name.cmp(&b.table_name));
    for t in &tables_modified {
        let mut cols = t.columns_removed.clone();
        cols.sort();
        for col in cols {
            out.push(Node::AlterTable {
                table: t.table_name.clone(),
                op: AlterTableOp::DropColumn { name: col },
            });
        }
    }

    // 6. Enum value removals: Postgres can't drop enum values in place.
    let mut enums_modified: Vec<_> = diff.enums_modified.iter().collect();
    enums_modified.sort_by(|a, b| a.name.cmp(&b.name));
    for e in &enums_modified {
        if !e.values_removed.is_empty() {
            warnings.push(ValidationWarning(format!(
                "enum {} lost values {:?}; Postgres cannot drop enum values in place, recreate the type manually",
                e.name, e.values_removed
            )));
            out.push(Node::Comment {
                text: format!(
                    "WARNING: enum {} values {:?} cannot be removed without recreating the type",
                    e.name, e.values_removed
                ),
            });
        }
    }

    // 7. Function drops.
    let mut fn_removed = diff.functions_removed.clone();
    fn_removed.sort();
    for name in &fn_removed {
        push_or_degrade(
            &mut out,
            dialect,
            dialect.supports_functions(),
            "function",
            Node::DropFunction {
                name: name.clone(),
                if_exists: true,
            },
        );
    }

    // 8. Role drops.
    let mut role_removed = diff.roles_removed.clone();
    role_removed.sort();
    for name in &role_removed {
        push_or_degrade(
            &mut out,
            dialect,
            dialect.supports_roles(),
            "role",
            Node::DropRole {
                name: name.clone(),
                if_exists: true,
            },
        );
    }

    // 9. Extension drops, each preceded by a warning comment.
    let mut ext_removed = diff.extensions_removed.clone();
    ext_removed.sort();
    for name in &ext_removed {
        out.push(Node::Comment {
            text: format!("WARNING: dropping extension {name}"),
        });
        if dialect.supports_extensions() {
            out.push(Node::DropExtension {
                name: name.clone(),
                if_exists: true,
            });
        }
    }

    // 10. Extension creations.
    let mut ext_added = diff.extensions_added.clone();
    ext_added.sort();
    for name in &ext_added {
        push_or_degrade(
            &mut out,
            dialect,
            dialect.supports_extensions(),
            "extension",
            Node::CreateExtension {
                name: name.clone(),
                version: None,
                if_not_exists: true,
            },
        );
    }

    // 11. Role creations.
    let mut roles_added = diff.roles_added.clone();
    roles_added.sort_by(|a, b| a.name.cmp(&b.name));
    for role in &roles_added {
        push_or_degrade(
            &mut out,
            dialect,
            dialect.supports_roles(),
            "role",
            Node::CreateRole {
                name: role.name.clone(),
                login: role.login,
                password: role.password.clone(),
                superuser: role.superuser,
                create_db: role.create_db,
                create_role: role.create_role,
                inherit: role.inherit,
                replication: role.replication,
            },
        );
    }

    // 12. Function creations.
    let mut fns_added = diff.functions_added.clone();
    fns_added.sort_by(|a, b| a.name.cmp(&b.name));
    for f in &fns_added {
        push_or_degrade(
            &mut out,
            dialect,
            dialect.supports_functions(),
            "function",
            Node::CreateFunction {
                name: f.name.clone(),
                parameters: f.parameters.clone(),
                returns: f.returns.clone(),
                language: f.language.clone(),
                security: f.security,
                volatility: f.volatility,
                body: f.body.clone(),
            },
        );
    }

    // 13. Enum type creations + value additions on existing types.
    let mut enums_added = diff.enums_added.clone();
    enums_added.sort_by(|a, b| a.name.cmp(&b.name));
    for e in &enums_added {
        push_or_degrade(
            &mut out,
            dialect,
            dialect.supports_enums(),
            "enum type",
            Node::CreateType {
                name: e.name.clone(),
                values: e.values.clone(),
            },
        );
    }
    for e in &enums_modified {
        if e.values_added.is_empty() {
            continue;
        }
        if dialect.supports_enums() {
            let mut values = e.values_added.clone();
            values.sort();
            for value in values {
                out.push(Node::AlterType {
                    name: e.name.clone(),
                    alteration: TypeAlteration::AddValue { value, before: None },
                });
            }
        } else {
            out.push(Node::Comment {
                text: format!("WARNING: enum values {:?} inlined, cannot ALTER TYPE on {dialect}", e.values_added),
            });
        }
    }

    // 14. New tables, with FK-cycle columns split to step 16.
    let cyclic = detect_fk_cycles(diff, desired);
    let mut tables_added = diff.tables_added.clone();
    tables_added.sort_by(|a, b| a.name.cmp(&b.name));
    let mut deferred_fks: Vec<(String, ConstraintDef)> = Vec::new();
    for table in &tables_added {
        let mut node = convert::build_create_table(desired, table, dialect, &mut warnings);
        if cyclic.contains(&table.name) {
            if let Node::CreateTable { ref mut columns, .. } = node {
                for col in columns.iter_mut() {
                    if let Some(fk) = col.foreign.take() {
                        deferred_fks.push((
                            table.name.clone(),
                            ConstraintDef {
                                name: format!("fk_{}_{}", table.name, col.name),
                                r#type: ConstraintType::ForeignKey,
                                columns: vec![col.name.clone()],
                                check_expression: None,
                                foreign: Some(fk),
                                using_method: None,
                                exclude_elements: None,
                                where_condition: None,
                            },
                        ));
                    }
                }
            }
        }
        out.push(node);
    }

    // 15. Column additions/alterations on existing tables.
    for t in &tables_modified {
        let mut added = t.columns_added.clone();
        added.sort_by(|a, b| a.name.cmp(&b.name));
        for field in &added {
            out.push(Node::AlterTable {
                table: t.table_name.clone(),
                op: AlterTableOp::AddColumn(convert::field_to_column_def(field, desired, dialect)),
            });
        }
        let mut modified: Vec<_> = t.columns_modified.clone();
        modified.sort_by(|a, b| a.column.cmp(&b.column));
        for change in &modified {
            if let Some(field) = desired
                .fields_of(&t.table_name)
                .into_iter()
                .find(|f| f.name == change.column)
            {
                out.push(Node::AlterTable {
                    table: t.table_name.clone(),
                    op: AlterTableOp::AlterColumn(convert::field_to_column_def(field, desired, dialect)),
                });
            }
        }
    }

    // 16. Constraint additions: deferred FKs from cyclic new tables, plus
    // constraint additions belonging to already-existing (modified) tables.
    deferred_fks.sort_by(|a, b| a.1.name.cmp(&b.1.name));
    for (table, constraint_def) in deferred_fks {
        out.push(Node::AlterTable {
            table,
            op: AlterTableOp::AddConstraint(constraint_def),
        });
    }
    let mut extra_constraints: Vec<_> = desired
        .constraints
        .iter()
        .filter(|c| tables_modified.iter().any(|t| t.table_name == c.table))
        .collect();
    extra_constraints.sort_by(|a, b| a.name.cmp(&b.name));
    for constraint in extra_constraints {
        let supported = constraint.r#type != Some(ConstraintType::Exclude) || dialect.supports_exclude_constraints();
        push_or_degrade(
            &mut out,
            dialect,
            supported,
            "EXCLUDE constraint",
            Node::AlterTable {
                table: constraint.table.clone(),
                op: AlterTableOp::AddConstraint(convert::constraint_to_def(constraint)),
            },
        );
    }

    // 17. Enable RLS for newly rls-enabled tables.
    let mut rls_added = diff.rls_enabled_added.clone();
    rls_added.sort();
    for table in &rls_added {
        push_or_degrade(
            &mut out,
            dialect,
            dialect.supports_rls(),
            "row level security",
            Node::AlterTable {
                table: table.clone(),
                op: AlterTableOp::EnableRowLevelSecurity,
            },
        );
    }

    // 18. Policy creations.
    let mut policies_added = diff.policies_added.clone();
    policies_added.sort();
    for name in &policies_added {
        if let Some(policy) = desired.rls_policies.iter().find(|p| p.name == *name) {
            push_or_degrade(
                &mut out,
                dialect,
                dialect.supports_rls(),
                "RLS policy",
                Node::CreatePolicy {
                    name: policy.name.clone(),
                    table: policy.table.clone(),
                    policy_for: policy.policy_for,
                    to_roles: policy.to_roles.clone(),
                    using_expression: policy.using_expression.clone(),
                    with_check_expression: policy.with_check_expression.clone(),
                },
            );
        }
    }

    // 19. Index creations.
    let mut idx_added = diff.indexes_added.clone();
    idx_added.sort_by(|a, b| a.name.cmp(&b.name));
    for idx in &idx_added {
        let Some(table_name) = idx.resolved_table_name(desired) else {
            warnings.push(ValidationWarning(format!(
                "index '{}' references unknown struct_id '{}'",
                idx.name, idx.struct_id
            )));
            continue;
        };
        out.push(Node::CreateIndex {
            name: idx.name.clone(),
            table: table_name.to_string(),
            columns: idx.fields.clone(),
            unique: idx.unique,
            r#type: idx.r#type.clone(),
            condition: idx.condition.clone(),
            operator: idx.operator.clone(),
            if_not_exists: true,
        });
    }

    // 20. Role attribute alterations.
    let mut roles_modified = diff.roles_modified.clone();
    roles_modified.sort_by(|a, b| a.name.cmp(&b.name));
    for change in &roles_modified {
        if let Some(role) = desired.roles.iter().find(|r| r.name == change.name) {
            push_or_degrade(
                &mut out,
                dialect,
                dialect.supports_roles(),
                "role",
                Node::AlterRole {
                    name: role.name.clone(),
                    login: role.login,
                    superuser: role.superuser,
                    create_db: role.create_db,
                    create_role: role.create_role,
                    inherit: role.inherit,
                    replication: role.replication,
                },
            );
        }
    }

    // 21. Policy and function modifications: drop + recreate.
    let mut policies_modified = diff.policies_modified.clone();
    policies_modified.sort_by(|a, b| a.policy.cmp(&b.policy));
    for change in &policies_modified {
        if let Some(policy) = desired.rls_policies.iter().find(|p| p.name == change.policy) {
            push_or_degrade(
                &mut out,
                dialect,
                dialect.supports_rls(),
                "RLS policy",
                Node::DropPolicy {
                    name: policy.name.clone(),
                    table: policy.table.clone(),
                    if_exists: true,
                },
            );
            push_or_degrade(
                &mut out,
                dialect,
                dialect.supports_rls(),
                "RLS policy",
                Node::CreatePolicy {
                    name: policy.name.clone(),
                    table: policy.table.clone(),
                    policy_for: policy.policy_for,
                    to_roles: policy.to_roles.clone(),
                    using_expression: policy.using_expression.clone(),
                    with_check_expression: policy.with_check_expression.clone(),
                },
            );
        }
    }
    let mut functions_modified = diff.functions_modified.clone();
    functions_modified.sort_by(|a, b| a.name.cmp(&b.name));
    for change in &functions_modified {
        if let Some(f) = desired.functions.iter().find(|f| f.name == change.name) {
            push_or_degrade(
                &mut out,
                dialect,
                dialect.supports_functions(),
                "function",
                Node::DropFunction {
                    name: f.name.clone(),
                    if_exists: true,
                },
            );
            push_or_degrade(
                &mut out,
                dialect,
                dialect.supports_functions(),
                "function",
                Node::CreateFunction {
                    name: f.name.clone(),
                    parameters: f.parameters.clone(),
                    returns: f.returns.clone(),
                    language: f.language.clone(),
                    security: f.security,
                    volatility: f.volatility,
                    body: f.body.clone(),
                },
            );
        }
    }

    (out, warnings)
}

/// Degrades an object to a warning `Comment` node when the dialect lacks
/// the capability, instead of emitting SQL it can't run. The diff still
/// counts as handled for status purposes either way.
fn push_or_degrade(out: &mut Vec<Node>, dialect: Dialect, supported: bool, kind: &str, node: Node) {
    if supported {
        out.push(node);
    } else {
        out.push(Node::Comment {
            text: format!("WARNING: {kind} not supported on {dialect}"),
        });
    }
}

/// Two newly-added tables cycle if each references the other via a FK.
/// Returns the set of new-table names whose FK columns must be deferred
/// to step 16.
fn detect_fk_cycles(diff: &SchemaDiff, desired: &Database) -> HashSet<String> {
    let added: HashSet<&str> = diff.tables_added.iter().map(|t| t.name.as_str()).collect();
    let mut edges: HashMap<&str, Vec<&str>> = HashMap::new();

    for table in &diff.tables_added {
        let targets: Vec<&str> = desired
            .fields_of(&table.struct_id)
            .into_iter()
            .filter_map(|f| f.foreign.as_deref())
            .map(|r| r.split('(').next().unwrap_or(r).trim())
            .filter(|t| added.contains(t) && *t != table.name)
            .collect();
        edges.insert(table.name.as_str(), targets);
    }

    let mut cyclic = HashSet::new();
    for (&from, targets) in &edges {
        for &to in targets {
            if edges.get(to).map(|back| back.contains(&from)).unwrap_or(false) {
                cyclic.insert(from.to_string());
                cyclic.insert(to.to_string());
            }
        }
    }
    cyclic
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{compare, PolicyRemoval};
    use crate::model::{Field, Table};

    #[test]
    fn empty_diff_produces_empty_plan() {
        let diff = SchemaDiff::default();
        let (nodes, warnings) = generate(&diff, &Database::default(), Dialect::Postgres);
        assert!(nodes.is_empty());
        assert!(warnings.is_empty());
    }

    #[test]
    fn table_drop_precedes_new_table_creation() {
        let mut desired = Database::default();
        desired.tables.push(Table {
            struct_id: "Users".into(),
            name: "users".into(),
            ..Default::default()
        });
        desired.fields.push(Field::new("Users", "id", "INTEGER"));

        let mut diff = SchemaDiff::default();
        diff.tables_added.push(desired.tables[0].clone());
        diff.tables_removed.push("legacy".to_string());

        let (nodes, _) = generate(&diff, &desired, Dialect::Postgres);
        let drop_pos = nodes.iter().position(|n| matches!(n, Node::DropTable { .. })).unwrap();
        let create_pos = nodes.iter().position(|n| matches!(n, Node::CreateTable { .. })).unwrap();
        assert!(drop_pos < create_pos);
    }

    #[test]
    fn rls_policy_removed_degrades_to_warning_on_mysql() {
        let mut diff = SchemaDiff::default();
        diff.policies_removed.push(PolicyRemoval {
            policy_name: "user_iso".into(),
            table_name: "users".into(),
        });
        let (nodes, _) = generate(&diff, &Database::default(), Dialect::MySql);
        assert!(matches!(nodes[0], Node::Comment { .. }));
    }

    #[test]
    fn mutual_fk_new_tables_defer_constraints_to_step_16() {
        let mut desired = Database::default();
        desired.tables.push(Table {
            struct_id: "A".into(),
            name: "a".into(),
            ..Default::default()
        });
        desired.tables.push(Table {
            struct_id: "B".into(),
            name: "b".into(),
            ..Default::default()
        });
        let mut fa = Field::new("A", "b_id", "INTEGER");
        fa.foreign = Some("b(id)".to_string());
        let mut fb = Field::new("B", "a_id", "INTEGER");
        fb.foreign = Some("a(id)".to_string());
        desired.fields.push(fa);
        desired.fields.push(fb);

        let diff = compare(&desired, &Database::default(), None);
        let (nodes, _) = generate(&diff, &desired, Dialect::Postgres);

        for node in &nodes {
            if let Node::CreateTable { name, columns, .. } = node {
                if name == "a" || name == "b" {
                    assert!(columns.iter().all(|c| c.foreign.is_none()));
                }
            }
        }
        let has_add_fk = nodes
            .iter()
            .any(|n| matches!(n, Node::AlterTable { op: AlterTableOp::AddConstraint(_), .. }));
        assert!(has_add_fk);
    }

    #[test]
    fn modified_column_alteration_carries_desired_definition() {
        let mut desired = Database::default();
        desired.tables.push(Table {
            struct_id: "Users".into(),
            name: "users".into(),
            ..Default::default()
        });
        let mut field = Field::new("Users", "age", "BIGINT");
        field.nullable = false;
        desired.fields.push(field);

        let mut live = Database::default();
        live.tables.push(Table {
            struct_id: "Users".into(),
            name: "users".into(),
            ..Default::default()
        });
        live.fields.push(Field::new("Users", "age", "INTEGER"));

        let diff = compare(&desired, &live, None);
        let (nodes, _) = generate(&diff, &desired, Dialect::Postgres);
        let alter = nodes
            .iter()
            .find(|n| matches!(n, Node::AlterTable { op: AlterTableOp::AlterColumn(_), .. }))
            .unwrap();
        if let Node::AlterTable { op: AlterTableOp::AlterColumn(col), .. } = alter {
            assert_eq!(col.r#type, "BIGINT");
            assert!(!col.nullable);
        }
    }
}
