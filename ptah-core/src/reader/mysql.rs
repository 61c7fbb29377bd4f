//! MySQL/MariaDB schema introspection via `information_schema`. Both
//! dialects lack enums-as-types, extensions, Postgres-style functions, RLS,
//! and roles, so those collections in the resulting `LiveSchema` stay
//! empty — the diff engine's ignore-filter and the planner's capability
//! table already account for this on the desired side.

use async_trait::async_trait;

use crate::db::DbClient;
use crate::error::{PtahError, Result, ValidationWarning};
use crate::model::{Constraint, ConstraintType, Field, Table};

use super::LiveSchema;

const TABLES_QUERY: &str = "
SELECT TABLE_NAME AS table_name, TABLE_COMMENT AS comment, ENGINE AS engine
FROM INFORMATION_SCHEMA.TABLES
WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE'
ORDER BY TABLE_NAME";

const COLUMNS_QUERY: &str = "
SELECT
  TABLE_NAME AS table_name,
  COLUMN_NAME AS column_name,
  COLUMN_TYPE AS data_type,
  IS_NULLABLE AS nullable,
  COLUMN_DEFAULT AS column_default,
  COLUMN_COMMENT AS comment,
  COLUMN_KEY AS column_key,
  EXTRA AS extra
FROM INFORMATION_SCHEMA.COLUMNS
WHERE TABLE_SCHEMA = DATABASE()
ORDER BY TABLE_NAME, ORDINAL_POSITION";

const INDEXES_QUERY: &str = "
SELECT
  INDEX_NAME AS index_name,
  TABLE_NAME AS table_name,
  NOT NON_UNIQUE AS is_unique,
  GROUP_CONCAT(COLUMN_NAME ORDER BY SEQ_IN_INDEX) AS columns
FROM INFORMATION_SCHEMA.STATISTICS
WHERE TABLE_SCHEMA = DATABASE() AND INDEX_NAME != 'PRIMARY'
GROUP BY INDEX_NAME, TABLE_NAME, NON_UNIQUE
ORDER BY INDEX_NAME";

const CHECK_CONSTRAINTS_QUERY: &str = "
SELECT cc.CONSTRAINT_NAME AS name, tc.TABLE_NAME AS table_name, cc.CHECK_CLAUSE AS definition
FROM INFORMATION_SCHEMA.CHECK_CONSTRAINTS cc
JOIN INFORMATION_SCHEMA.TABLE_CONSTRAINTS tc
  ON tc.CONSTRAINT_NAME = cc.CONSTRAINT_NAME AND tc.TABLE_SCHEMA = cc.CONSTRAINT_SCHEMA
WHERE cc.CONSTRAINT_SCHEMA = DATABASE()";

pub struct MySqlReader;

#[async_trait]
impl super::SchemaReader for MySqlReader {
    async fn read_schema(
        &self,
        client: &dyn DbClient,
        ledger_table: &str,
    ) -> Result<(LiveSchema, Vec<ValidationWarning>)> {
        let mut db = LiveSchema::default();
        let warnings = Vec::new();

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
                comment: row.get("comment").filter(|s| !s.is_empty()).map(str::to_string),
                engine: row.get("engine").map(str::to_string),
                ..Default::default()
            });
        }

        for row in client.query(COLUMNS_QUERY).await? {
            let table_name = row.get("table_name").unwrap_or_default().to_string();
            if table_name == ledger_table || db.table_by_name(&table_name).is_none() {
                continue;
            }
            let extra = row.get("extra").unwrap_or_default();
            let mut field = Field::new(
                table_name,
                row.get("column_name").unwrap_or_default().to_string(),
                row.get("data_type").unwrap_or_default().to_string(),
            );
            field.nullable = row.get("nullable") == Some("YES");
            field.primary = row.get("column_key") == Some("PRI");
            field.unique = row.get("column_key") == Some("UNI");
            field.auto_increment = extra.contains("auto_increment");
            field.comment = row.get("comment").filter(|s| !s.is_empty()).map(str::to_string);
            if !field.auto_increment {
                field.default_literal = row.get("column_default").map(str::to_string);
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
                r#type: None,
                condition: None,
                operator: None,
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
                check_expression: row.get("definition").map(str::to_string),
                using_method: None,
                exclude_elements: None,
                where_condition: None,
            });
        }

        Ok((db, warnings))
    }
}

/// `MariaDbReader` reuses the exact same `information_schema` surface as
/// MySQL; MariaDB is wire- and catalog-compatible for everything this
/// reader queries.
pub type MariaDbReader = MySqlReader;
