//! The migration ledger: `schema_migrations(version, description, applied_at)`.
//! Created on first use; every operation here is idempotent or
//! transaction-scoped by the caller in `runner/mod.rs`.

use chrono::Utc;

use crate::db::DbClient;
use crate::dialect::Dialect;
use crate::error::Result;
use crate::support::format_timestamp_literal;

pub const DEFAULT_LEDGER_TABLE: &str = "schema_migrations";

pub async fn ensure_ledger_table(client: &dyn DbClient, table: &str, dialect: Dialect) -> Result<()> {
    let quoted = dialect.quote_ident(table);
    let ddl = match dialect {
        Dialect::Postgres => format!(
            "CREATE TABLE IF NOT EXISTS {quoted} (version BIGINT PRIMARY KEY, description TEXT NOT NULL, checksum BIGINT NOT NULL, applied_at TIMESTAMP NOT NULL)"
        ),
        Dialect::MySql | Dialect::MariaDb => format!(
            "CREATE TABLE IF NOT EXISTS {quoted} (version BIGINT PRIMARY KEY, description TEXT NOT NULL, checksum BIGINT NOT NULL, applied_at TIMESTAMP NOT NULL)"
        ),
    };
    client.execute(&ddl).await?;
    Ok(())
}

pub async fn current_version(client: &dyn DbClient, table: &str, dialect: Dialect) -> Result<i64> {
    let quoted = dialect.quote_ident(table);
    let row = client
        .query_one(&format!("SELECT COALESCE(MAX(version), 0) AS v FROM {quoted}"))
        .await?;
    Ok(row.get_i64("v").unwrap_or(0))
}

/// `(version, checksum)` for every applied migration, ascending by version.
pub async fn applied_checksums(client: &dyn DbClient, table: &str, dialect: Dialect) -> Result<Vec<(i64, i64)>> {
    let quoted = dialect.quote_ident(table);
    let rows = client
        .query(&format!("SELECT version, checksum FROM {quoted} ORDER BY version ASC"))
        .await?;
    Ok(rows
        .iter()
        .filter_map(|r| Some((r.get_i64("version")?, r.get_i64("checksum")?)))
        .collect())
}

pub async fn record_applied(
    client: &dyn DbClient,
    table: &str,
    dialect: Dialect,
    version: i64,
    description: &str,
    checksum: i64,
) -> Result<()> {
    let quoted = dialect.quote_ident(table);
    let escaped_description = description.replace('\'', "''");
    let ts = format_timestamp_literal(Utc::now());
    client
        .execute(&format!(
            "INSERT INTO {quoted} (version, description, checksum, applied_at) VALUES ({version}, '{escaped_description}', {checksum}, {ts})"
        ))
        .await?;
    Ok(())
}

pub async fn remove_applied(client: &dyn DbClient, table: &str, dialect: Dialect, version: i64) -> Result<()> {
    let quoted = dialect.quote_ident(table);
    client
        .execute(&format!("DELETE FROM {quoted} WHERE version = {version}"))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ledger_table_name() {
        assert_eq!(DEFAULT_LEDGER_TABLE, "schema_migrations");
    }
}
