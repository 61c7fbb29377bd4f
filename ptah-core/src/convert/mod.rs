//! Model → AST converter: expands embedded fields, applies dialect
//! overrides, and emits the canonical-order AST statement list for a full
//! desired schema.

pub mod embed;

use crate::ast::{ColumnDef, ConstraintDef, ForeignKeyRef, Node};
use crate::dialect::Dialect;
use crate::error::ValidationWarning;
use crate::model::{ConstraintType, Database, Field, Table};

/// Parsed foreign-key reference: `"table(column)"` -> both parts,
/// `"table"` -> default column `"id"`, empty -> no FK.
pub fn parse_foreign_ref(raw: &str) -> Option<(String, String)> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Some(open) = raw.find('(') {
        if let Some(close) = raw.rfind(')') {
            if close > open {
                let table = raw[..open].trim().to_string();
                let column = raw[open + 1..close].trim().to_string();
                return Some((table, column));
            }
        }
    }
    Some((raw.to_string(), "id".to_string()))
}

fn dialect_key(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::Postgres => "postgres",
        Dialect::MySql => "mysql",
        Dialect::MariaDb => "mariadb",
    }
}

/// Apply dialect-specific attribute overrides to a field in place. A
/// literal default clears any expression default and vice versa, matching
/// the base-model invariant.
fn apply_field_overrides(field: &mut Field, dialect: Dialect) {
    let Some(overrides) = field.overrides.get(dialect_key(dialect)).cloned() else {
        return;
    };
    if let Some(v) = overrides.get("type") {
        field.r#type = v.clone();
    }
    if let Some(v) = overrides.get("check") {
        field.check = Some(v.clone());
    }
    if let Some(v) = overrides.get("comment") {
        field.comment = Some(v.clone());
    }
    if let Some(v) = overrides.get("default") {
        field.set_default_literal(Some(v.clone()));
    }
    if let Some(v) = overrides.get("default_expr") {
        field.set_default_expression(Some(v.clone()));
    }
}

struct TableOverrideResult {
    comment: Option<String>,
    engine: Option<String>,
    options: Vec<(String, String)>,
}

fn apply_table_overrides(table: &Table, dialect: Dialect) -> TableOverrideResult {
    let mut result = TableOverrideResult {
        comment: table.comment.clone(),
        engine: table.engine.clone(),
        options: Vec::new(),
    };
    let Some(overrides) = table.overrides.get(dialect_key(dialect)) else {
        return result;
    };
    for (key, value) in overrides {
        match key.as_str() {
            "comment" => result.comment = Some(value.clone()),
            "engine" => result.engine = Some(value.clone()),
            other => result.options.push((other.to_uppercase(), value.clone())),
        }
    }
    result
}

/// Escape a value for inclusion in a single-quoted SQL string literal.
fn escape_sql_literal(s: &str) -> String {
    s.replace('\'', "''")
}

pub(crate) fn field_to_column_def(field: &Field, db: &Database, dialect: Dialect) -> ColumnDef {
    let mut r#type = field.r#type.clone();

    if dialect.inlines_enums() {
        if let Some(e) = db.enum_by_name(&field.r#type) {
            let values = e
                .values
                .iter()
                .map(|v| format!("'{}'", escape_sql_literal(v)))
                .collect::<Vec<_>>()
                .join(",");
            r#type = format!("ENUM({values})");
        }
    }

    let foreign = field.foreign.as_deref().and_then(parse_foreign_ref).map(|(table, column)| ForeignKeyRef {
        name: field.foreign_key_name.clone(),
        table,
        column,
    });

    ColumnDef {
        name: field.name.clone(),
        r#type,
        nullable: field.nullable,
        primary: field.primary,
        unique: field.unique,
        auto_increment: field.auto_increment,
        default_literal: field.default_literal.clone(),
        default_expression: field.default_expression.clone(),
        check: field.check.clone(),
        comment: field.comment.clone(),
        foreign,
    }
}

/// Gather every concrete field belonging to `struct_id`: directly declared
/// fields plus embedded-field expansion, with dialect overrides applied.
fn resolve_table_fields(
    db: &Database,
    struct_id: &str,
    dialect: Dialect,
    warnings: &mut Vec<ValidationWarning>,
) -> Vec<Field> {
    let mut fields: Vec<Field> = db.fields_of(struct_id).into_iter().cloned().collect();
    let (embedded, embed_warnings) = embed::expand_embedded_fields(db, struct_id);
    warnings.extend(embed_warnings);
    fields.extend(embedded);
    for field in &mut fields {
        apply_field_overrides(field, dialect);
        if let Some(enum_values) = &field.r#enum {
            if let Some(e) = db.enum_by_name(&field.r#type) {
                for v in enum_values {
                    if !e.values.contains(v) {
                        warnings.push(ValidationWarning(format!(
                            "field {}.{} declares enum value '{v}' not present in enum '{}'",
                            struct_id, field.name, e.name
                        )));
                    }
                }
            }
        }
    }
    fields
}

pub(crate) fn build_create_table(
    db: &Database,
    table: &Table,
    dialect: Dialect,
    warnings: &mut Vec<ValidationWarning>,
) -> Node {
    let fields = resolve_table_fields(db, &table.struct_id, dialect, warnings);
    let columns: Vec<ColumnDef> = fields.iter().map(|f| field_to_column_def(f, db, dialect)).collect();

    let overrides = apply_table_overrides(table, dialect);

    let primary_key = if !table.primary_key.is_empty() {
        table.primary_key.clone()
    } else {
        Vec::new()
    };

    let mut constraints = Vec::new();
    for constraint in db.constraints.iter().filter(|c| c.struct_id == table.struct_id) {
        constraints.push(constraint_to_def(constraint));
    }

    Node::CreateTable {
        name: table.name.clone(),
        columns,
        primary_key,
        constraints,
        engine: overrides.engine,
        comment: overrides.comment,
        options: overrides.options,
        if_not_exists: false,
    }
}

pub(crate) fn constraint_to_def(constraint: &crate::model::Constraint) -> ConstraintDef {
    let foreign = if constraint.r#type == Some(ConstraintType::ForeignKey) {
        constraint.columns.first().cloned().map(|column| ForeignKeyRef {
            name: Some(constraint.name.clone()),
            table: constraint.table.clone(),
            column,
        })
    } else {
        None
    };
    ConstraintDef {
        name: constraint.name.clone(),
        r#type: constraint.r#type.unwrap_or(ConstraintType::Check),
        columns: constraint.columns.clone(),
        check_expression: constraint.check_expression.clone(),
        foreign,
        using_method: constraint.using_method.clone(),
        exclude_elements: constraint.exclude_elements.clone(),
        where_condition: constraint.where_condition.clone(),
    }
}

/// Convert the full desired bundle into a canonical-order statement list
/// for `dialect`. Canonical order: enum types, tables, extensions, roles +
/// functions + RLS-enable + RLS-policies (Postgres only), indexes last.
pub fn convert(db: &Database, dialect: Dialect) -> (Node, Vec<ValidationWarning>) {
    let mut warnings = Vec::new();
    let mut nodes = Vec::new();

    if dialect.supports_enums() {
        let mut enums: Vec<&crate::model::Enum> = db.enums.iter().collect();
        enums.sort_by(|a, b| a.name.cmp(&b.name));
        for e in enums {
            nodes.push(Node::CreateType {
                name: e.name.clone(),
                values: e.values.clone(),
            });
        }
    }

    let mut tables: Vec<&Table> = db.tables.iter().collect();
    tables.sort_by(|a, b| a.name.cmp(&b.name));
    for table in tables {
        nodes.push(build_create_table(db, table, dialect, &mut warnings));
    }

    if dialect.supports_extensions() {
        let mut extensions: Vec<&crate::model::Extension> = db.extensions.iter().collect();
        extensions.sort_by(|a, b| a.name.cmp(&b.name));
        for ext in extensions {
            nodes.push(Node::CreateExtension {
                name: ext.name.clone(),
                version: ext.version.clone(),
                if_not_exists: ext.if_not_exists,
            });
        }
    }

    if dialect.supports_roles() {
        let mut roles: Vec<&crate::model::Role> = db.roles.iter().collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        for role in roles {
            nodes.push(Node::CreateRole {
                name: role.name.clone(),
                login: role.login,
                password: role.password.clone(),
                superuser: role.superuser,
                create_db: role.create_db,
                create_role: role.create_role,
                inherit: role.inherit,
                replication: role.replication,
            });
        }
    }

    if dialect.supports_functions() {
        let mut functions: Vec<&crate::model::Function> = db.functions.iter().collect();
        functions.sort_by(|a, b| a.name.cmp(&b.name));
        for f in functions {
            nodes.push(Node::CreateFunction {
                name: f.name.clone(),
                parameters: f.parameters.clone(),
                returns: f.returns.clone(),
                language: f.language.clone(),
                security: f.security,
                volatility: f.volatility,
                body: f.body.clone(),
            });
        }
    }

    if dialect.supports_rls() {
        let mut enabled: Vec<&crate::model::RLSEnabledTable> = db.rls_enabled_tables.iter().collect();
        enabled.sort_by(|a, b| a.table.cmp(&b.table));
        for t in enabled {
            nodes.push(Node::AlterTable {
                table: t.table.clone(),
                op: crate::ast::AlterTableOp::EnableRowLevelSecurity,
            });
        }

        let mut policies: Vec<&crate::model::RLSPolicy> = db.rls_policies.iter().collect();
        policies.sort_by(|a, b| a.name.cmp(&b.name));
        for p in policies {
            nodes.push(Node::CreatePolicy {
                name: p.name.clone(),
                table: p.table.clone(),
                policy_for: p.policy_for,
                to_roles: p.to_roles.clone(),
                using_expression: p.using_expression.clone(),
                with_check_expression: p.with_check_expression.clone(),
            });
        }
    }

    let mut indexes: Vec<&crate::model::Index> = db.indexes.iter().collect();
    indexes.sort_by(|a, b| a.name.cmp(&b.name));
    for idx in indexes {
        let Some(table_name) = idx.resolved_table_name(db) else {
            warnings.push(ValidationWarning(format!(
                "index '{}' references unknown struct_id '{}'",
                idx.name, idx.struct_id
            )));
            continue;
        };
        nodes.push(Node::CreateIndex {
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

    (Node::StatementList(nodes), warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Enum, Table};

    #[test]
    fn parse_foreign_ref_variants() {
        assert_eq!(
            parse_foreign_ref("authors(id)"),
            Some(("authors".into(), "id".into()))
        );
        assert_eq!(parse_foreign_ref("authors"), Some(("authors".into(), "id".into())));
        assert_eq!(parse_foreign_ref(""), None);
    }

    #[test]
    fn enum_inlined_for_mysql_not_postgres() {
        let mut db = Database::default();
        db.enums.push(Enum { name: "status".into(), values: vec!["active".into(), "inactive".into()] });
        db.tables.push(Table { struct_id: "Users".into(), name: "users".into(), ..Default::default() });
        db.fields.push(Field::new("Users", "status", "status"));

        let (pg_ast, _) = convert(&db, Dialect::Postgres);
        let Node::StatementList(pg_nodes) = pg_ast else { unreachable!() };
        assert!(pg_nodes.iter().any(|n| matches!(n, Node::CreateType { name, .. } if name == "status")));

        let (mysql_ast, _) = convert(&db, Dialect::MySql);
        let Node::StatementList(mysql_nodes) = mysql_ast else { unreachable!() };
        assert!(!mysql_nodes.iter().any(|n| matches!(n, Node::CreateType { .. })));
        let create = mysql_nodes
            .iter()
            .find_map(|n| match n {
                Node::CreateTable { columns, .. } => Some(columns),
                _ => None,
            })
            .unwrap();
        let status_col = create.iter().find(|c| c.name == "status").unwrap();
        assert_eq!(status_col.r#type, "ENUM('active','inactive')");
    }

    #[test]
    fn canonical_order_places_indexes_last() {
        let mut db = Database::default();
        db.tables.push(Table { struct_id: "Users".into(), name: "users".into(), ..Default::default() });
        db.fields.push(Field::new("Users", "email", "VARCHAR(255)"));
        db.indexes.push(crate::model::Index {
            name: "idx_users_email".into(),
            struct_id: "Users".into(),
            fields: vec!["email".into()],
            ..Default::default()
        });
        let (ast, _) = convert(&db, Dialect::Postgres);
        let Node::StatementList(nodes) = ast else { unreachable!() };
        let table_pos = nodes.iter().position(|n| matches!(n, Node::CreateTable { .. })).unwrap();
        let index_pos = nodes.iter().position(|n| matches!(n, Node::CreateIndex { .. })).unwrap();
        assert!(table_pos < index_pos);
    }
}
