//! Generator: orchestrates parse -> introspect -> diff -> plan -> render,
//! then writes a timestamped up/down migration file pair.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::db::DbClient;
use crate::dialect::Dialect;
use crate::diff::{compare, CompareOptions};
use crate::error::{PtahError, Result};
use crate::model::Database;
use crate::planner;
use crate::reader::mysql::MySqlReader;
use crate::reader::postgres::PostgresReader;
use crate::reader::SchemaReader;
use crate::render::render_to_sql;
use crate::reverse;
use crate::support::slugify;

/// Everything needed to name and locate a generated migration pair.
pub struct GenerateOptions {
    pub migrations_dir: PathBuf,
    pub ledger_table: String,
    pub name: String,
    pub compare_options: Option<CompareOptions>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFiles {
    pub version: i64,
    pub up_path: PathBuf,
    pub down_path: PathBuf,
}

fn reader_for(dialect: Dialect) -> Box<dyn SchemaReader + Send + Sync> {
    match dialect {
        Dialect::Postgres => Box::new(PostgresReader),
        Dialect::MySql => Box::new(MySqlReader),
        Dialect::MariaDb => Box::new(MySqlReader),
    }
}

/// `GenerateMigration(opts) -> MigrationFiles | nil`. Returns `Ok(None)`
/// for the successful no-op case: no schema changes, or a statement list
/// that renders to nothing once warning comments are stripped.
pub async fn generate_migration(
    desired: &Database,
    client: &dyn DbClient,
    dialect: Dialect,
    opts: &GenerateOptions,
) -> Result<Option<MigrationFiles>> {
    let reader = reader_for(dialect);
    let (live, _warnings) = reader.read_schema(client, &opts.ledger_table).await?;

    let diff = compare(desired, &live, opts.compare_options.clone());
    if !diff.has_changes() {
        return Ok(None);
    }

    let (up_nodes, _) = planner::generate(&diff, desired, dialect);
    let up_sql = render_to_sql(&crate::ast::Node::StatementList(up_nodes), dialect);
    if is_effectively_empty(&up_sql) {
        return Ok(None);
    }

    // The live schema that will exist once `up` has run is, by
    // construction, the desired schema: down-rendering needs to see the
    // post-up world, and that's exactly what `desired` represents.
    let reverse_diff = reverse::reverse(&diff, desired);
    let (down_nodes, _) = planner::generate(&reverse_diff, desired, dialect);
    let down_sql = render_to_sql(&crate::ast::Node::StatementList(down_nodes), dialect);

    let version = next_free_version(&opts.migrations_dir)?;
    let slug = slugify(&opts.name);
    let up_path = opts.migrations_dir.join(format!("{version}_{slug}.up.sql"));
    let down_path = opts.migrations_dir.join(format!("{version}_{slug}.down.sql"));

    std::fs::create_dir_all(&opts.migrations_dir)?;
    std::fs::write(&up_path, migration_file_header(version, "up") + &up_sql + "\n")?;
    std::fs::write(&down_path, migration_file_header(version, "down") + &down_sql + "\n")?;

    Ok(Some(MigrationFiles {
        version,
        up_path,
        down_path,
    }))
}

fn migration_file_header(version: i64, direction: &str) -> String {
    format!("-- Generated migration {version} ({direction})\n\n")
}

/// A statement list is "effectively empty" once warning-comment-only
/// output is stripped: no actual SQL statement survives.
fn is_effectively_empty(sql: &str) -> bool {
    sql.lines()
        .all(|line| line.trim().is_empty() || line.trim_start().starts_with("--"))
}

fn next_free_version(migrations_dir: &Path) -> Result<i64> {
    let mut version = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| PtahError::IoError(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?
        .as_secs() as i64;

    if !migrations_dir.exists() {
        return Ok(version);
    }
    let taken: std::collections::HashSet<i64> = std::fs::read_dir(migrations_dir)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter_map(|name| name.split('_').next().and_then(|v| v.parse::<i64>().ok()))
        .collect();
    while taken.contains(&version) {
        version += 1;
    }
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sql_after_comment_stripping_is_effectively_empty() {
        assert!(is_effectively_empty("-- WARNING: function not supported on mysql\n"));
        assert!(is_effectively_empty("   \n\n"));
        assert!(!is_effectively_empty("CREATE TABLE users (id INTEGER);"));
    }

    #[test]
    fn next_free_version_skips_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let version = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() as i64;
        std::fs::write(dir.path().join(format!("{version}_migration.up.sql")), "").unwrap();
        let next = next_free_version(dir.path()).unwrap();
        assert!(next > version);
    }
}
