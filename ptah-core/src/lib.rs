//! Declarative schema management for Postgres, MySQL, and MariaDB.
//!
//! A desired schema is described as a [`model::Database`] (built from
//! annotation-derived structs via [`annotation_source`]), compared against
//! the live database via [`reader`], and the difference is planned
//! ([`planner`]) and rendered ([`render`]) into dialect-specific SQL. The
//! resulting migration files are tracked and applied by [`runner`] against
//! a ledger table ([`runner::ledger`]).
//!
//! # Quick start
//!
//! ```rust,no_run
//! use ptah_core::config::PtahConfig;
//! use ptah_core::Ptah;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PtahConfig::load(None, &Default::default())?;
//! let ptah = Ptah::connect(config).await?;
//! # Ok(())
//! # }
//! ```

pub mod annotation_source;
pub mod ast;
pub mod config;
pub mod convert;
pub mod db;
pub mod dialect;
pub mod diff;
pub mod error;
pub mod generator;
pub mod live_convert;
pub mod model;
pub mod planner;
pub mod reader;
pub mod render;
pub mod reverse;
pub mod runner;
pub mod sql_splitter;
pub mod support;

use std::sync::Arc;

use config::PtahConfig;
use db::{DbClient, PostgresClient};
use dialect::Dialect;
use error::{PtahError, Result};
use model::Database;
use runner::provider::MigrationProvider;
use runner::{MigrationStatus, Runner};

/// Entry point wiring a loaded config to a live connection. Thin by design:
/// the actual work lives in [`generator`], [`planner`], and [`runner`], each
/// of which also works standalone against any `&dyn DbClient`.
pub struct Ptah {
    pub config: PtahConfig,
    client: Arc<dyn DbClient>,
}

impl Ptah {
    /// Connect using the config's connection string and dialect.
    pub async fn connect(config: PtahConfig) -> Result<Self> {
        let conn_string = config.connection_string()?;
        let client: Arc<dyn DbClient> = match config.migrations.dialect {
            Dialect::Postgres => {
                let pg_client = db::connect_with_config(
                    &conn_string,
                    &config.database.ssl_mode,
                    config.database.connect_retries,
                    config.database.connect_timeout_secs,
                )
                .await?;
                Arc::new(PostgresClient::new(pg_client))
            }
            Dialect::MySql | Dialect::MariaDb => {
                return Err(PtahError::ConfigError(
                    "MySQL/MariaDB wire connections are not provided by this crate; connect with an embedding application's own client and use `Ptah::with_client`".to_string(),
                ))
            }
        };
        Ok(Ptah { config, client })
    }

    /// Wrap an already-connected client (tests, embedding applications,
    /// or any dialect whose driver lives outside this crate).
    pub fn with_client(config: PtahConfig, client: Arc<dyn DbClient>) -> Self {
        Ptah { config, client }
    }

    pub fn dialect(&self) -> Dialect {
        self.config.migrations.dialect
    }

    fn runner(&self) -> Runner<'_> {
        Runner::new(self.client.as_ref(), self.dialect(), self.config.migrations.table.clone())
    }

    /// Diff the desired schema against the live database and write a new
    /// migration file pair into `output_dir`, or `Ok(None)` if there's
    /// nothing to apply.
    pub async fn generate(
        &self,
        desired: &Database,
        name: &str,
        output_dir: impl Into<std::path::PathBuf>,
    ) -> Result<Option<generator::MigrationFiles>> {
        let opts = generator::GenerateOptions {
            migrations_dir: output_dir.into(),
            ledger_table: self.config.migrations.table.clone(),
            name: name.to_string(),
            compare_options: Some(diff::CompareOptions::replace(self.config.migrations.ignored_extensions.clone())),
        };
        generator::generate_migration(desired, self.client.as_ref(), self.dialect(), &opts).await
    }

    /// Apply every pending migration from `provider`.
    pub async fn migrate_up(&self, provider: &dyn MigrationProvider) -> Result<Vec<i64>> {
        self.runner().migrate_up(provider).await
    }

    /// Revert the single most recently applied migration.
    pub async fn migrate_down(&self, provider: &dyn MigrationProvider) -> Result<Option<i64>> {
        self.runner().migrate_down(provider).await
    }

    /// Move to an explicit target version, applying or reverting as needed.
    pub async fn migrate_to(&self, provider: &dyn MigrationProvider, target: i64) -> Result<Vec<i64>> {
        self.runner().migrate_to(provider, target).await
    }

    /// Revert every applied migration above `target`, strictly descending.
    pub async fn migrate_down_to(&self, provider: &dyn MigrationProvider, target: i64) -> Result<Vec<i64>> {
        self.runner().migrate_down_to(provider, target).await
    }

    pub async fn status(&self, provider: &dyn MigrationProvider) -> Result<MigrationStatus> {
        self.runner().get_migration_status(provider).await
    }
}
