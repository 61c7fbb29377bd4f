//! PostgreSQL schema introspection.

use async_trait::async_trait;

use crate::db::DbClient;
use crate::error::{PtahError, Result, ValidationWarning};
use crate::model::{
    Constraint, ConstraintType, Enum, Extension, Field, Function, PolicyFor, RLSEnabledTable,
    RLSPolicy, Role, Security, Table, Volatility,
};

use super::exclude_parser;
use super::LiveSchema;

const TABLES_QUERY: &str = "
SELECT c.relname AS table_name, obj_description(c.oid, 'pg_class') AS comment
FROM pg_catalog.pg_class c
JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
WHERE c.relkind = 'r' AND n.nspname = 'public'
ORDER BY c.relname";

const COLUMNS_QUERY: &str = "
SELECT
  c.relname AS table_name,
  a.attname AS column_name,
  format_type(a.atttypid, a.atttypmod) AS data_type,
  NOT a.attnotnull AS nullable,
  pg_get_expr(ad.adbin, ad.adrelid) AS column_default,
  col_description(c.oid, a.attnum) AS comment,
  COALESCE(
    (SELECT true FROM pg_catalog.pg_constraint pk
     WHERE pk.conrelid = c.oid AND pk.contype = 'p' AND a.attnum = ANY(pk.conkey)),
    false
  ) AS is_primary,
  COALESCE(
    (SELECT true FROM pg_catalog.pg_constraint uq
     WHERE uq.conrelid = c.oid AND uq.contype = 'u' AND a.attnum = ANY(uq.conkey)
       AND array_length(uq.conkey, 1) = 1),
    false
  ) AS is_unique
FROM pg_catalog.pg_attribute a
JOIN pg_catalog.pg_class c ON c.oid = a.attrelid
JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
LEFT JOIN pg_catalog.pg_attrdef ad ON ad.adrelid = c.oid AND ad.adnum = a.attnum
WHERE c.relkind = 'r' AND n.nspname = 'public' AND a.attnum > 0 AND NOT a.attisdropped
ORDER BY c.relname, a.attnum";

const INDEXES_QUERY: &str = "
SELECT
  i.relname AS index_name,
  t.relname AS table_name,
  ix.indisunique AS is_unique,
  am.amname AS index_type,
  array_to_string(array_agg(a.attname ORDER BY k.ord), ',') AS columns,
  pg_get_expr(ix.indpred, ix.indrelid) AS condition
FROM pg_catalog.pg_index ix
JOIN pg_catalog.pg_class t ON t.oid = ix.indrelid
JOIN pg_catalog.pg_class i ON i.oid = ix.indexrelid
JOIN pg_catalog.pg_am am ON am.oid = i.relam
JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
JOIN LATERAL unnest(ix.indkey) WITH ORDINALITY AS k(attnum, ord) ON true
JOIN pg_catalog.pg_attribute a ON a.attrelid = t.oid AND a.attnum = k.attnum
WHERE n.nspname = 'public' AND NOT ix.indisprimary
GROUP BY i.relname, t.relname, ix.indisunique, am.amname, ix.indpred, ix.indrelid
ORDER BY i.relname";

const EXCLUDE_CONSTRAINTS_QUERY: &str = "
SELECT con.conname AS name, t.relname AS table_name, pg_get_constraintdef(con.oid) AS definition
FROM pg_catalog.pg_constraint con
JOIN pg_catalog.pg_class t ON t.oid = con.conrelid
JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
WHERE con.contype = 'x' AND n.nspname = 'public'";

const CHECK_CONSTRAINTS_QUERY: &str = "
SELECT con.conname AS name, t.relname AS table_name, pg_get_constraintdef(con.oid) AS definition
FROM pg_catalog.pg_constraint con
JOIN pg_catalog.pg_class t ON t.oid = con.conrelid
JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace
WHERE con.contype = 'c' AND n.nspname = 'public'";

const ENUMS_QUERY: &str = "
SELECT t.typname AS name, array_to_string(array_agg(e.enumlabel ORDER BY e.enumsortorder), ',') AS values
FROM pg_catalog.pg_type t
JOIN pg_catalog.pg_enum e ON e.enumtypid = t.oid
JOIN pg_catalog.pg_namespace n ON n.oid = t.typnamespace
WHERE n.nspname = 'public'
GROUP BY t.typname
ORDER BY t.typname";

const EXTENSIONS_QUERY: &str = "
SELECT extname AS name, extversion AS version
FROM pg_catalog.pg_extension
ORDER BY extname";

const FUNCTIONS_QUERY: &str = "
SELECT
  p.proname AS name,
  pg_get_function_arguments(p.oid) AS parameters,
  pg_get_function_result(p.oid) AS returns,
  l.lanname AS language,
  p.prosecdef AS security_definer,
  p.provolatile AS volatility,
  obj_description(p.oid, 'pg_proc') AS comment
FROM pg_catalog.pg_proc p
JOIN pg_catalog.pg_namespace n ON n.oid = p.pronamespace
JOIN pg_catalog.pg_language l ON l.oid = p.prolang
WHERE n.nspname = 'public'
  AND NOT EXISTS (
    SELECT 1 FROM pg_catalog.pg_depend d
    WHERE d.objid = p.oid AND d.deptype = 'e'
  )
ORDER BY p.proname";

const POLICIES_QUERY: &str = "
SELECT policyname AS name, tablename AS table_name, cmd, roles::text AS roles, qual AS using_expr, with_check
FROM pg_catalog.pg_policies
WHERE schemaname = 'public'
ORDER BY policyname";

const RLS_ENABLED_QUERY: &str = "
SELECT c.relname AS table_name
FROM pg_catalog.pg_class c
JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
WHERE c.relkind = 'r' AND n.nspname = 'public' AND c.relrowsecurity
ORDER BY c.relname";

const ROLES_QUERY: &str = "
SELECT rolname AS name, rolcanlogin AS login, rolsuper AS superuser,
       rolcreatedb AS create_db, rolcreaterole AS create_role,
       rolinherit AS inherit, rolreplication AS replication
FROM pg_catalog.pg_roles
WHERE rolname NOT LIKE 'pg\\_%' AND rolname != current_user
ORDER BY rolname";

pub struct PostgresReader;

#[async_trait]
impl super::SchemaReader for PostgresReader {
    async fn read_schema(
        &self,
        client: &dyn DbClient,
        ledger_table: &str,
    ) -> Result<(LiveSchema, Vec<ValidationWarning>)> {
        let mut db = LiveSchema::default();
        let mut warnings = Vec::new();

        for row in client.query(TABLES_QUERY).await? {
            let name = row
                .get("table_name")
                .ok_or_else(|| PtahError::IntrospectionError("table row missing table_name".into()))?
                .to_string();
            if name == ledger_table {
                continue;
            }
            db.tables.push(Table {
                struct_id: name.clone(),
                name,
                comment: row.get("comment").map(str::to_string),
                ..Default::default()
            });
        }

        for row in client.query(COLUMNS_QUERY).await? {
            let table_name = row.get("table_name").unwrap_or_default().to_string();
            if table_name == ledger_table || db.table_by_name(&table_name).is_none() {
                continue;
            }
            let default = row.get("column_default").map(str::to_string);
            let is_expr_default = default
                .as_deref()
                .map(|d| d.contains('(') || d.eq_ignore_ascii_case("now()"))
                .unwrap_or(false);
            let auto_increment = default
                .as_deref()
                .map(|d| d.starts_with("nextval("))
                .unwrap_or(false);

            let mut field = Field::new(
                table_name,
                row.get("column_name").unwrap_or_default().to_string(),
                row.get("data_type").unwrap_or_default().to_string(),
            );
            field.nullable = row.get_bool("nullable");
            field.primary = row.get_bool("is_primary");
            field.unique = row.get_bool("is_unique");
            field.auto_increment = auto_increment;
            field.comment = row.get("comment").map(str::to_string);
            if !auto_increment {
                if is_expr_default {
                    field.default_expression = default;
                } else {
                    field.default_literal = default;
                }
            }
            db.fields.push(field);
        }

        for row in client.query(INDEXES_QUERY).await? {
            let table_name = row.get("table_name").unwrap_or_default().to_string();
            if table_name == ledger_table {
                continue;
            }
            db.indexes.push(crate::model::Index {
                name: row.get("index_name").unwrap_or_default().to_string(),
                struct_id: table_name.clone(),
                table_name: Some(table_name),
                fields: row
                    .get("columns")
                    .unwrap_or_default()
                    .split(',')
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect(),
                unique: row.get_bool("is_unique"),
                comment: None,
                r#type: row.get("index_type").map(str::to_string),
                condition: row.get("condition").map(str::to_string),
                operator: None,
            });
        }

        for row in client.query(ENUMS_QUERY).await? {
            db.enums.push(Enum {
                name: row.get("name").unwrap_or_default().to_string(),
                values: row
                    .get("values")
                    .unwrap_or_default()
                    .split(',')
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect(),
            });
        }

        for row in client.query(EXTENSIONS_QUERY).await? {
            db.extensions.push(Extension {
                name: row.get("name").unwrap_or_default().to_string(),
                version: row.get("version").map(str::to_string),
                if_not_exists: true,
                comment: None,
            });
        }

        for row in client.query(FUNCTIONS_QUERY).await? {
            let volatility = match row.get("volatility") {
                Some("i") => Volatility::Immutable,
                Some("s") => Volatility::Stable,
                _ => Volatility::Volatile,
            };
            db.functions.push(Function {
                name: row.get("name").unwrap_or_default().to_string(),
                parameters: row.get("parameters").unwrap_or_default().to_string(),
                returns: row.get("returns").unwrap_or_default().to_string(),
                language: row.get("language").unwrap_or_default().to_string(),
                security: if row.get_bool("security_definer") {
                    Security::Definer
                } else {
                    Security::Invoker
                },
                volatility,
                body: String::new(),
                comment: row.get("comment").map(str::to_string),
            });
        }

        for row in client.query(POLICIES_QUERY).await? {
            let policy_for = match row.get("cmd") {
                Some("SELECT") => Some(PolicyFor::Select),
                Some("INSERT") => Some(PolicyFor::Insert),
                Some("UPDATE") => Some(PolicyFor::Update),
                Some("DELETE") => Some(PolicyFor::Delete),
                _ => Some(PolicyFor::All),
            };
            db.rls_policies.push(RLSPolicy {
                name: row.get("name").unwrap_or_default().to_string(),
                table: row.get("table_name").unwrap_or_default().to_string(),
                policy_for,
                to_roles: row.get("roles").map(str::to_string),
                using_expression: row.get("using_expr").map(str::to_string),
                with_check_expression: row.get("with_check").map(str::to_string),
                comment: None,
            });
        }

        for row in client.query(RLS_ENABLED_QUERY).await? {
            db.rls_enabled_tables.push(RLSEnabledTable {
                table: row.get("table_name").unwrap_or_default().to_string(),
                comment: None,
            });
        }

        for row in client.query(ROLES_QUERY).await? {
            db.roles.push(Role {
                name: row.get("name").unwrap_or_default().to_string(),
                login: row.get_bool("login"),
                password: None,
                superuser: row.get_bool("superuser"),
                create_db: row.get_bool("create_db"),
                create_role: row.get_bool("create_role"),
                inherit: row.get_bool("inherit"),
                replication: row.get_bool("replication"),
                comment: None,
            });
        }

        for row in client.query(CHECK_CONSTRAINTS_QUERY).await? {
            let table = row.get("table_name").unwrap_or_default().to_string();
            db.constraints.push(Constraint {
                struct_id: table.clone(),
                table,
                name: row.get("name").unwrap_or_default().to_string(),
                r#type: Some(ConstraintType::Check),
                columns: Vec::new(),
                check_expression: extract_check_expression(row.get("definition").unwrap_or_default()),
                using_method: None,
                exclude_elements: None,
                where_condition: None,
            });
        }

        for row in client.query(EXCLUDE_CONSTRAINTS_QUERY).await? {
            let table = row.get("table_name").unwrap_or_default().to_string();
            let definition = row.get("definition").unwrap_or_default();
            match exclude_parser::parse(definition) {
                Some(parsed) => db.constraints.push(Constraint {
                    struct_id: table.clone(),
                    table,
                    name: row.get("name").unwrap_or_default().to_string(),
                    r#type: Some(ConstraintType::Exclude),
                    columns: Vec::new(),
                    check_expression: None,
                    using_method: Some(parsed.method),
                    exclude_elements: Some(parsed.elements),
                    where_condition: if parsed.where_clause.is_empty() {
                        None
                    } else {
                        Some(parsed.where_clause)
                    },
                }),
                None => warnings.push(ValidationWarning(format!(
                    "could not parse EXCLUDE constraint definition: {definition}"
                ))),
            }
        }

        Ok((db, warnings))
    }
}

fn extract_check_expression(definition: &str) -> Option<String> {
    if let Some(inner) = definition.strip_prefix("CHECK ((").and_then(|s| s.strip_suffix("))")) {
        return Some(inner.to_string());
    }
    if let Some(inner) = definition.strip_prefix("CHECK (").and_then(|s| s.strip_suffix(")")) {
        return Some(inner.to_string());
    }
    Some(definition.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_check_expression_double_paren_form() {
        assert_eq!(
            extract_check_expression("CHECK ((price > (0)::numeric))"),
            Some("price > (0)::numeric".to_string())
        );
    }
}
