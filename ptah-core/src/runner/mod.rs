//! Migration runner: applies provider migrations against a ledger table,
//! one migration per transaction, serialised by an advisory lock where the
//! dialect supports one.

pub mod ledger;
pub mod provider;

use crate::db::DbClient;
use crate::dialect::Dialect;
use crate::error::{PtahError, Result};
use crate::sql_splitter::split_statements;

use provider::{Migration, MigrationBody, MigrationProvider};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    pub current_version: i64,
    pub pending: Vec<i64>,
    pub total: usize,
    pub has_pending: bool,
}

pub struct Runner<'a> {
    client: &'a dyn DbClient,
    dialect: Dialect,
    ledger_table: String,
}

impl<'a> Runner<'a> {
    pub fn new(client: &'a dyn DbClient, dialect: Dialect, ledger_table: impl Into<String>) -> Self {
        Runner {
            client,
            dialect,
            ledger_table: ledger_table.into(),
        }
    }

    pub async fn ensure_ledger(&self) -> Result<()> {
        ledger::ensure_ledger_table(self.client, &self.ledger_table, self.dialect).await
    }

    pub async fn get_current_version(&self) -> Result<i64> {
        ledger::current_version(self.client, &self.ledger_table, self.dialect).await
    }

    async fn run_body(&self, body: &MigrationBody) -> Result<()> {
        match body {
            MigrationBody::Sql(sql) => {
                for statement in split_statements(sql) {
                    self.client.execute(&statement).await?;
                }
                Ok(())
            }
            MigrationBody::Func(f) => f(self.client).await,
        }
    }

    /// Begin -> run body -> write/remove ledger row -> commit. On any
    /// failure, rollback and propagate the error without touching the
    /// ledger.
    async fn apply_one(&self, migration: &Migration, direction: Direction) -> Result<()> {
        self.client.begin().await?;

        let body = match direction {
            Direction::Up => &migration.up,
            Direction::Down => &migration.down,
        };

        if let Err(e) = self.run_body(body).await {
            let _ = self.client.rollback().await;
            return Err(e);
        }

        let ledger_result = match direction {
            Direction::Up => {
                ledger::record_applied(
                    self.client,
                    &self.ledger_table,
                    self.dialect,
                    migration.version,
                    &migration.description,
                    migration.checksum,
                )
                .await
            }
            Direction::Down => ledger::remove_applied(self.client, &self.ledger_table, self.dialect, migration.version).await,
        };

        if let Err(e) = ledger_result {
            let _ = self.client.rollback().await;
            return Err(e);
        }

        self.client.commit().await
    }

    async fn with_lock<T>(&self, f: impl std::future::Future<Output = Result<T>>) -> Result<T> {
        self.client.advisory_lock(&self.ledger_table).await?;
        let result = f.await;
        self.client.advisory_unlock(&self.ledger_table).await?;
        result
    }

    pub async fn migrate_up(&self, provider: &dyn MigrationProvider) -> Result<Vec<i64>> {
        self.ensure_ledger().await?;
        self.with_lock(self.migrate_up_inner(provider)).await
    }

    async fn migrate_up_inner(&self, provider: &dyn MigrationProvider) -> Result<Vec<i64>> {
        let current = self.get_current_version().await?;
        let migrations = provider.migrations().await?;
        let mut applied = Vec::new();
        for migration in migrations.into_iter().filter(|m| m.version > current) {
            let version = migration.version;
            self.apply_one(&migration, Direction::Up).await?;
            applied.push(version);
        }
        Ok(applied)
    }

    pub async fn migrate_down(&self, provider: &dyn MigrationProvider) -> Result<Option<i64>> {
        self.ensure_ledger().await?;
        self.with_lock(self.migrate_down_inner(provider)).await
    }

    async fn migrate_down_inner(&self, provider: &dyn MigrationProvider) -> Result<Option<i64>> {
        let current = self.get_current_version().await?;
        if current == 0 {
            return Ok(None);
        }
        let migrations = provider.migrations().await?;
        let Some(migration) = migrations.into_iter().find(|m| m.version == current) else {
            return Err(PtahError::UnknownVersion(current));
        };
        self.apply_one(&migration, Direction::Down).await?;
        Ok(Some(current))
    }

    pub async fn migrate_down_to(&self, provider: &dyn MigrationProvider, target: i64) -> Result<Vec<i64>> {
        self.ensure_ledger().await?;
        self.with_lock(self.migrate_down_to_inner(provider, target)).await
    }

    async fn migrate_down_to_inner(&self, provider: &dyn MigrationProvider, target: i64) -> Result<Vec<i64>> {
        let migrations = provider.migrations().await?;
        let mut to_apply: Vec<&Migration> = migrations.iter().filter(|m| m.version > target).collect();
        to_apply.sort_by(|a, b| b.version.cmp(&a.version));

        let mut reverted = Vec::new();
        for migration in to_apply {
            let current = self.get_current_version().await?;
            if migration.version != current {
                continue;
            }
            self.apply_one(migration, Direction::Down).await?;
            reverted.push(migration.version);
        }
        Ok(reverted)
    }

    pub async fn migrate_to(&self, provider: &dyn MigrationProvider, target: i64) -> Result<Vec<i64>> {
        let current = self.get_current_version().await?;
        if target >= current {
            self.ensure_ledger().await?;
            self.with_lock(self.migrate_to_up_inner(provider, target)).await
        } else {
            self.migrate_down_to(provider, target).await
        }
    }

    async fn migrate_to_up_inner(&self, provider: &dyn MigrationProvider, target: i64) -> Result<Vec<i64>> {
        let current = self.get_current_version().await?;
        let migrations = provider.migrations().await?;
        let mut applied = Vec::new();
        for migration in migrations.into_iter().filter(|m| m.version > current && m.version <= target) {
            let version = migration.version;
            self.apply_one(&migration, Direction::Up).await?;
            applied.push(version);
        }
        Ok(applied)
    }

    /// Reports current/pending versions and, before doing so, verifies that
    /// every already-applied migration's checksum still matches what's on
    /// disk — catching a migration file edited after it was applied.
    pub async fn get_migration_status(&self, provider: &dyn MigrationProvider) -> Result<MigrationStatus> {
        self.ensure_ledger().await?;
        let current_version = self.get_current_version().await?;
        let migrations = provider.migrations().await?;

        let applied = ledger::applied_checksums(self.client, &self.ledger_table, self.dialect).await?;
        for (version, expected) in applied {
            if let Some(m) = migrations.iter().find(|m| m.version == version) {
                if m.checksum != 0 && expected != m.checksum {
                    return Err(PtahError::ChecksumMismatch {
                        script: format!("{version}_{}", m.description),
                        expected: expected as i32,
                        found: m.checksum as i32,
                    });
                }
            }
        }

        let pending: Vec<i64> = migrations.iter().map(|m| m.version).filter(|&v| v > current_version).collect();
        Ok(MigrationStatus {
            current_version,
            has_pending: !pending.is_empty(),
            total: migrations.len(),
            pending,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Up,
    Down,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Row;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// A tiny in-process `DbClient` fake backed by a ledger table modelled
    /// as a plain `Vec`, enough to exercise the runner's control flow
    /// without a real database.
    #[derive(Default)]
    struct FakeClient {
        ledger: Mutex<Vec<(i64, String)>>,
        executed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DbClient for FakeClient {
        async fn execute(&self, sql: &str) -> Result<u64> {
            let trimmed = sql.trim();
            if let Some(rest) = trimmed.strip_prefix("INSERT INTO") {
                let version: i64 = rest
                    .split("VALUES (")
                    .nth(1)
                    .and_then(|s| s.split(',').next())
                    .and_then(|s| s.trim().parse().ok())
                    .unwrap_or(0);
                self.ledger.lock().unwrap().push((version, "x".to_string()));
            } else if let Some(rest) = trimmed.strip_prefix("DELETE FROM") {
                if let Some(version) = rest.split("version = ").nth(1).and_then(|s| s.trim().parse::<i64>().ok()) {
                    self.ledger.lock().unwrap().retain(|(v, _)| *v != version);
                }
            } else {
                self.executed.lock().unwrap().push(sql.to_string());
            }
            Ok(1)
        }

        async fn query(&self, sql: &str) -> Result<Vec<Row>> {
            if sql.contains("ORDER BY version") {
                return Ok(self
                    .ledger
                    .lock()
                    .unwrap()
                    .iter()
                    .map(|(v, _)| Row::new(vec!["version".into()], vec![Some(v.to_string())]))
                    .collect());
            }
            Ok(Vec::new())
        }

        async fn query_one(&self, _sql: &str) -> Result<Row> {
            let max = self.ledger.lock().unwrap().iter().map(|(v, _)| *v).max().unwrap_or(0);
            Ok(Row::new(vec!["v".into()], vec![Some(max.to_string())]))
        }

        async fn begin(&self) -> Result<()> {
            Ok(())
        }
        async fn commit(&self) -> Result<()> {
            Ok(())
        }
        async fn rollback(&self) -> Result<()> {
            Ok(())
        }
    }

    fn provider_with(versions: &[i64]) -> provider::InMemoryProvider {
        let mut p = provider::InMemoryProvider::new();
        for &v in versions {
            p.register(Migration {
                version: v,
                description: format!("migration {v}"),
                up: MigrationBody::Sql(format!("CREATE TABLE t{v} (id INT);")),
                down: MigrationBody::Sql(format!("DROP TABLE t{v};")),
                checksum: 0,
            });
        }
        p
    }

    #[tokio::test]
    async fn migrate_up_applies_all_pending_in_order() {
        let client = FakeClient::default();
        let runner = Runner::new(&client, Dialect::Postgres, "schema_migrations");
        let provider = provider_with(&[1, 2, 3]);

        let applied = runner.migrate_up(&provider).await.unwrap();
        assert_eq!(applied, vec![1, 2, 3]);
        assert_eq!(runner.get_current_version().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn migrate_down_steps_back_one() {
        let client = FakeClient::default();
        let runner = Runner::new(&client, Dialect::Postgres, "schema_migrations");
        let provider = provider_with(&[1, 2]);

        runner.migrate_up(&provider).await.unwrap();
        let stepped = runner.migrate_down(&provider).await.unwrap();
        assert_eq!(stepped, Some(2));
        assert_eq!(runner.get_current_version().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn status_reports_pending_versions() {
        let client = FakeClient::default();
        let runner = Runner::new(&client, Dialect::Postgres, "schema_migrations");
        let provider = provider_with(&[1, 2, 3]);

        let status = runner.get_migration_status(&provider).await.unwrap();
        assert_eq!(status.pending, vec![1, 2, 3]);
        assert!(status.has_pending);
        assert_eq!(status.total, 3);
    }
}
