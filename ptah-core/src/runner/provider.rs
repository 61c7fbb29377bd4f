//! Migration providers: sources of ordered `{version, description, up, down}`
//! units. An in-memory provider accepts programmatic registration; a
//! filesystem provider walks a directory pairing `NNN_name.up.sql` with
//! `NNN_name.down.sql`.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use async_trait::async_trait;
use regex_lite::Regex;

use crate::db::DbClient;
use crate::error::{PtahError, Result};
use crate::support::title_case_slug;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A function-callback migration body, receiving the connection to run
/// against. Boxed because traits can't yet hold `async fn` fields directly.
pub type MigrationFn = Box<dyn for<'a> Fn(&'a dyn DbClient) -> BoxFuture<'a, Result<()>> + Send + Sync>;

pub enum MigrationBody {
    Sql(String),
    Func(MigrationFn),
}

pub struct Migration {
    pub version: i64,
    pub description: String,
    pub up: MigrationBody,
    pub down: MigrationBody,
    /// CRC32 of the up+down SQL text, compared against the ledger to
    /// detect migration files edited after they were applied. Function
    /// bodies aren't text, so they checksum to 0 — editing a `Func`
    /// migration is undetectable by design and left to the caller.
    pub checksum: i64,
}

fn checksum_of(up: &MigrationBody, down: &MigrationBody) -> i64 {
    let up_text = match up {
        MigrationBody::Sql(s) => s.as_str(),
        MigrationBody::Func(_) => "",
    };
    let down_text = match down {
        MigrationBody::Sql(s) => s.as_str(),
        MigrationBody::Func(_) => "",
    };
    if up_text.is_empty() && down_text.is_empty() {
        return 0;
    }
    crc32fast::hash(format!("{up_text}\u{0}{down_text}").as_bytes()) as i64
}

#[async_trait]
pub trait MigrationProvider {
    /// Must return migrations sorted by version ascending.
    async fn migrations(&self) -> Result<Vec<Migration>>;
}

/// Accepts migrations via programmatic registration, for embedding
/// applications and tests that would rather not touch the filesystem.
#[derive(Default)]
pub struct InMemoryProvider {
    migrations: BTreeMap<i64, Migration>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, migration: Migration) -> &mut Self {
        self.migrations.insert(migration.version, migration);
        self
    }
}

#[async_trait]
impl MigrationProvider for InMemoryProvider {
    async fn migrations(&self) -> Result<Vec<Migration>> {
        Ok(self
            .migrations
            .iter()
            .map(|(&version, m)| Migration {
                version,
                description: m.description.clone(),
                up: clone_body(&m.up),
                down: clone_body(&m.down),
                checksum: m.checksum,
            })
            .collect())
    }
}

fn clone_body(body: &MigrationBody) -> MigrationBody {
    match body {
        MigrationBody::Sql(sql) => MigrationBody::Sql(sql.clone()),
        MigrationBody::Func(_) => {
            panic!("InMemoryProvider cannot clone a function-callback migration body; register SQL bodies for providers read more than once")
        }
    }
}

/// Walks a directory for `<version>_<slug>.up.sql` / `.down.sql` pairs.
pub struct FilesystemProvider {
    dir: PathBuf,
}

impl FilesystemProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FilesystemProvider { dir: dir.into() }
    }
}

fn filename_regex() -> Regex {
    Regex::new(r"^(\d+)_([a-z0-9_]+)\.(up|down)\.sql$").unwrap()
}

#[async_trait]
impl MigrationProvider for FilesystemProvider {
    async fn migrations(&self) -> Result<Vec<Migration>> {
        read_migrations(&self.dir)
    }
}

fn read_migrations(dir: &Path) -> Result<Vec<Migration>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let re = filename_regex();
    let mut ups: BTreeMap<i64, (String, String)> = BTreeMap::new();
    let mut downs: BTreeMap<i64, String> = BTreeMap::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().into_string().unwrap_or_default();
        let Some(caps) = re.captures(&name) else {
            continue;
        };
        let version: i64 = caps[1]
            .parse()
            .map_err(|_| PtahError::ParseError(format!("migration filename '{name}' has an unparseable version")))?;
        let slug = caps[2].to_string();
        let direction = &caps[3];
        let contents = std::fs::read_to_string(entry.path())?;
        if direction == "up" {
            ups.insert(version, (slug, contents));
        } else {
            downs.insert(version, contents);
        }
    }

    let mut migrations = Vec::with_capacity(ups.len());
    for (version, (slug, up_sql)) in ups {
        let Some(down_sql) = downs.remove(&version) else {
            return Err(PtahError::IncompleteMigrationPair {
                version,
                missing: "down",
            });
        };
        let up_body = MigrationBody::Sql(up_sql);
        let down_body = MigrationBody::Sql(down_sql);
        let checksum = checksum_of(&up_body, &down_body);
        migrations.push(Migration {
            version,
            description: title_case_slug(&slug),
            up: up_body,
            down: down_body,
            checksum,
        });
    }

    if let Some((&version, _)) = downs.iter().next() {
        return Err(PtahError::IncompleteMigrationPair {
            version,
            missing: "up",
        });
    }

    migrations.sort_by_key(|m| m.version);
    Ok(migrations)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_provider_returns_registered_sql_migrations_sorted() {
        let mut provider = InMemoryProvider::new();
        provider.register(Migration {
            version: 2,
            description: "second".into(),
            up: MigrationBody::Sql("CREATE TABLE b (id INT);".into()),
            down: MigrationBody::Sql("DROP TABLE b;".into()),
            checksum: 0,
        });
        provider.register(Migration {
            version: 1,
            description: "first".into(),
            up: MigrationBody::Sql("CREATE TABLE a (id INT);".into()),
            down: MigrationBody::Sql("DROP TABLE a;".into()),
            checksum: 0,
        });

        let migrations = provider.migrations().await.unwrap();
        assert_eq!(migrations.iter().map(|m| m.version).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[tokio::test]
    async fn filesystem_provider_pairs_up_and_down_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("1_add_users.up.sql"), "CREATE TABLE users (id INT);").unwrap();
        std::fs::write(dir.path().join("1_add_users.down.sql"), "DROP TABLE users;").unwrap();

        let provider = FilesystemProvider::new(dir.path());
        let migrations = provider.migrations().await.unwrap();
        assert_eq!(migrations.len(), 1);
        assert_eq!(migrations[0].description, "Add Users");
        assert_ne!(migrations[0].checksum, 0);
    }

    #[tokio::test]
    async fn filesystem_provider_checksum_changes_if_file_is_edited() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("1_add_users.up.sql"), "CREATE TABLE users (id INT);").unwrap();
        std::fs::write(dir.path().join("1_add_users.down.sql"), "DROP TABLE users;").unwrap();
        let before = FilesystemProvider::new(dir.path()).migrations().await.unwrap()[0].checksum;

        std::fs::write(dir.path().join("1_add_users.up.sql"), "CREATE TABLE users (id BIGINT);").unwrap();
        let after = FilesystemProvider::new(dir.path()).migrations().await.unwrap()[0].checksum;

        assert_ne!(before, after);
    }

    #[tokio::test]
    async fn filesystem_provider_fails_on_missing_counterpart() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("1_add_users.up.sql"), "CREATE TABLE users (id INT);").unwrap();

        let provider = FilesystemProvider::new(dir.path());
        let result = provider.migrations().await;
        assert!(matches!(result, Err(PtahError::IncompleteMigrationPair { .. })));
    }
}
