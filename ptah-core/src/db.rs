//! Database connection, TLS support, advisory locking, and the `DbClient`
//! trait that everything downstream of the reader/runner is written
//! against. A concrete adapter over `tokio-postgres` is provided for the
//! Postgres dialect; MySQL/MariaDB wire adapters are left to the embedding
//! application (drivers are out of scope), but every query this crate
//! issues against MySQL/MariaDB is written against the same trait.

use async_trait::async_trait;
use fastrand;
use tokio_postgres::Client;

use crate::config::SslMode;
use crate::error::{PtahError, Result};

/// One row of a query result, represented as text so the trait stays
/// dialect-neutral: callers parse columns with `get`/`get_bool`/`get_i64`.
#[derive(Debug, Clone, Default)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Option<String>>,
}

impl Row {
    pub fn new(columns: Vec<String>, values: Vec<Option<String>>) -> Self {
        Row { columns, values }
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.index_of(name).and_then(|i| self.values[i].as_deref())
    }

    pub fn get_bool(&self, name: &str) -> bool {
        matches!(self.get(name), Some("t") | Some("true") | Some("YES") | Some("1"))
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(|v| v.parse().ok())
    }
}

impl From<tokio_postgres::Row> for Row {
    fn from(row: tokio_postgres::Row) -> Self {
        let columns: Vec<String> = row.columns().iter().map(|c| c.name().to_string()).collect();
        let values = (0..row.len())
            .map(|i| row.try_get::<_, Option<String>>(i).unwrap_or(None))
            .collect();
        Row { columns, values }
    }
}

/// The database-access surface every component above the driver boundary
/// is written against: execute, query, query-one, and SQL-level
/// transaction control.
#[async_trait]
pub trait DbClient: Send + Sync {
    async fn execute(&self, sql: &str) -> Result<u64>;
    async fn query(&self, sql: &str) -> Result<Vec<Row>>;
    async fn query_one(&self, sql: &str) -> Result<Row>;
    async fn begin(&self) -> Result<()>;
    async fn commit(&self) -> Result<()>;
    async fn rollback(&self) -> Result<()>;

    /// Best-effort serialisation around the migration runner. Dialects
    /// without an advisory-lock primitive no-op here; callers still must
    /// serialise migration runs externally.
    async fn advisory_lock(&self, _table_name: &str) -> Result<()> {
        Ok(())
    }

    async fn advisory_unlock(&self, _table_name: &str) -> Result<()> {
        Ok(())
    }
}

/// The Postgres adapter: the one concrete `DbClient` this crate ships.
pub struct PostgresClient {
    client: Client,
}

impl PostgresClient {
    pub fn new(client: Client) -> Self {
        PostgresClient { client }
    }
}

#[async_trait]
impl DbClient for PostgresClient {
    async fn execute(&self, sql: &str) -> Result<u64> {
        self.client.execute(sql, &[]).await.map_err(PtahError::from)
    }

    async fn query(&self, sql: &str) -> Result<Vec<Row>> {
        let rows = self.client.query(sql, &[]).await?;
        Ok(rows.into_iter().map(Row::from).collect())
    }

    async fn query_one(&self, sql: &str) -> Result<Row> {
        let row = self.client.query_one(sql, &[]).await?;
        Ok(Row::from(row))
    }

    async fn begin(&self) -> Result<()> {
        self.client.batch_execute("BEGIN").await?;
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        self.client.batch_execute("COMMIT").await?;
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        self.client.batch_execute("ROLLBACK").await?;
        Ok(())
    }

    async fn advisory_lock(&self, table_name: &str) -> Result<()> {
        acquire_advisory_lock(&self.client, table_name).await
    }

    async fn advisory_unlock(&self, table_name: &str) -> Result<()> {
        release_advisory_lock(&self.client, table_name).await
    }
}

/// Build a rustls ClientConfig using the Mozilla CA bundle and ring crypto provider.
fn make_rustls_config() -> rustls::ClientConfig {
    let root_store =
        rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    rustls::ClientConfig::builder_with_provider(std::sync::Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .unwrap()
    .with_root_certificates(root_store)
    .with_no_client_auth()
}

/// Check if a postgres error is a permanent authentication failure that should not be retried.
fn is_permanent_error(e: &tokio_postgres::Error) -> bool {
    if let Some(db_err) = e.as_db_error() {
        let code = db_err.code().code();
        // 28P01 = invalid_password, 28000 = invalid_authorization_specification
        return code == "28P01" || code == "28000";
    }
    false
}

/// Spawn the background connection driver task.
fn spawn_connection_task<F>(connection: F)
where
    F: std::future::Future<Output = std::result::Result<(), tokio_postgres::Error>>
        + Send
        + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            log::error!("Database connection error: {}", e);
        }
    });
}

async fn connect_once(
    conn_string: &str,
    ssl_mode: &SslMode,
    connect_timeout_secs: u32,
) -> std::result::Result<Client, tokio_postgres::Error> {
    let connect_fut = async {
        match ssl_mode {
            SslMode::Disable => {
                let (client, connection) =
                    tokio_postgres::connect(conn_string, tokio_postgres::NoTls).await?;
                spawn_connection_task(connection);
                Ok(client)
            }
            SslMode::Require => {
                let tls_config = make_rustls_config();
                let tls = tokio_postgres_rustls::MakeRustlsConnect::new(tls_config);
                let (client, connection) = tokio_postgres::connect(conn_string, tls).await?;
                spawn_connection_task(connection);
                Ok(client)
            }
            SslMode::Prefer => {
                let tls_config = make_rustls_config();
                let tls = tokio_postgres_rustls::MakeRustlsConnect::new(tls_config);
                match tokio_postgres::connect(conn_string, tls).await {
                    Ok((client, connection)) => {
                        spawn_connection_task(connection);
                        Ok(client)
                    }
                    Err(_) => {
                        log::debug!("TLS connection failed, falling back to plaintext");
                        let (client, connection) =
                            tokio_postgres::connect(conn_string, tokio_postgres::NoTls).await?;
                        spawn_connection_task(connection);
                        Ok(client)
                    }
                }
            }
        }
    };

    if connect_timeout_secs > 0 {
        match tokio::time::timeout(
            std::time::Duration::from_secs(connect_timeout_secs as u64),
            connect_fut,
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(tokio_postgres::Error::__private_api_timeout()),
        }
    } else {
        connect_fut.await
    }
}

/// Connect with sensible defaults: prefer TLS, no retries, a 30s connect timeout.
pub async fn connect(conn_string: &str) -> Result<Client> {
    connect_with_config(conn_string, &SslMode::Prefer, 0, 30).await
}

/// Connect, retrying up to `retries` times with exponential backoff + jitter.
/// Permanent errors (authentication failures) are not retried.
pub async fn connect_with_config(
    conn_string: &str,
    ssl_mode: &SslMode,
    retries: u32,
    connect_timeout_secs: u32,
) -> Result<Client> {
    let mut last_err = None;

    for attempt in 0..=retries {
        if attempt > 0 {
            let base_delay = std::cmp::min(1u64 << attempt, 30);
            let jitter_ms = fastrand::u64(0..1000);
            let delay = std::time::Duration::from_secs(base_delay)
                + std::time::Duration::from_millis(jitter_ms);
            log::info!(
                "Connection attempt failed, retrying; attempt={}, max_attempts={}, delay_ms={}",
                attempt + 1,
                retries + 1,
                delay.as_millis() as u64
            );
            tokio::time::sleep(delay).await;
        }

        match connect_once(conn_string, ssl_mode, connect_timeout_secs).await {
            Ok(client) => {
                if attempt > 0 {
                    log::info!(
                        "Connected successfully after retry; attempt={}, max_attempts={}",
                        attempt + 1,
                        retries + 1
                    );
                }
                return Ok(client);
            }
            Err(e) => {
                if is_permanent_error(&e) {
                    log::error!("Permanent connection error, not retrying: {}", e);
                    return Err(PtahError::ConnectError(crate::error::format_db_error(&e)));
                }
                last_err = Some(e);
            }
        }
    }

    Err(PtahError::ConnectError(
        last_err.map(|e| crate::error::format_db_error(&e)).unwrap_or_default(),
    ))
}

/// Acquire a PostgreSQL advisory lock based on the ledger table name. This
/// gives concurrent runs against the same Postgres database a working
/// serialisation mechanism; non-Postgres dialects have no equivalent and
/// callers there must still serialise externally.
pub async fn acquire_advisory_lock(client: &Client, table_name: &str) -> Result<()> {
    let lock_id = advisory_lock_id(table_name);
    log::info!("Acquiring advisory lock; lock_id={}, table={}", lock_id, table_name);

    client
        .execute("SELECT pg_advisory_lock($1)", &[&lock_id])
        .await
        .map_err(|e| PtahError::LockError(format!("failed to acquire advisory lock: {}", e)))?;

    Ok(())
}

pub async fn release_advisory_lock(client: &Client, table_name: &str) -> Result<()> {
    let lock_id = advisory_lock_id(table_name);
    log::info!("Releasing advisory lock; lock_id={}, table={}", lock_id, table_name);

    client
        .execute("SELECT pg_advisory_unlock($1)", &[&lock_id])
        .await
        .map_err(|e| PtahError::LockError(format!("failed to release advisory lock: {}", e)))?;

    Ok(())
}

/// Compute a stable i64 lock ID from the table name using CRC32 (stable
/// across Rust versions, unlike `DefaultHasher`).
fn advisory_lock_id(table_name: &str) -> i64 {
    crc32fast::hash(table_name.as_bytes()) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advisory_lock_id_is_stable_per_table_name() {
        let id1 = advisory_lock_id("schema_migrations");
        let id2 = advisory_lock_id("schema_migrations");
        assert_eq!(id1, id2);
        assert_ne!(id1, advisory_lock_id("other_table"));
    }

    #[test]
    fn row_reads_columns_by_name() {
        let row = Row::new(
            vec!["name".into(), "nullable".into()],
            vec![Some("id".into()), Some("NO".into())],
        );
        assert_eq!(row.get("name"), Some("id"));
        assert!(!row.get_bool("nullable"));
    }
}
