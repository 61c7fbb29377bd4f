//! Error types for Ptah operations.

use thiserror::Error;

/// Extract the full error message from a tokio_postgres::Error,
/// including the underlying DbError details that Display hides.
pub fn format_db_error(e: &tokio_postgres::Error) -> String {
    // The source chain contains the actual DbError with message/detail/hint
    if let Some(db_err) = e.as_db_error() {
        let mut msg = db_err.message().to_string();
        if let Some(detail) = db_err.detail() {
            msg.push_str(&format!("\n  Detail: {}", detail));
        }
        if let Some(hint) = db_err.hint() {
            msg.push_str(&format!("\n  Hint: {}", hint));
        }
        if let Some(position) = db_err.position() {
            msg.push_str(&format!("\n  Position: {:?}", position));
        }
        return msg;
    }
    // Fallback: walk the source chain
    let mut msg = e.to_string();
    let mut source = std::error::Error::source(e);
    while let Some(s) = source {
        msg.push_str(&format!(": {}", s));
        source = s.source();
    }
    // Append connection-loss context when the connection is closed
    if e.is_closed() {
        msg.push_str("\n  Note: The database connection was closed unexpectedly. This may indicate a network issue or server restart.");
    }
    msg
}

/// All error kinds that Ptah operations can produce (taxonomy by kind, not
/// by type name: several variants below share a "fatal, abort the current
/// operation" shape but are kept distinct so callers can match on cause).
#[derive(Error, Debug)]
pub enum PtahError {
    /// Malformed annotation input or migration filename. Reported with
    /// location when the caller has one (e.g. the offending filename).
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Could not establish or authenticate a database connection.
    #[error("Connect error: {0}")]
    ConnectError(String),

    /// Reading the live schema failed (missing privileges, missing catalogs).
    #[error("Introspection error: {0}")]
    IntrospectionError(String),

    /// An internal invariant was violated while diffing desired vs. live
    /// schema. Should not happen with valid inputs — treated as a bug signal
    /// rather than a user-facing condition.
    #[error("Diff error: {0}")]
    DiffError(String),

    /// An AST node has no rendering on the selected dialect and no
    /// warning-comment fallback applies to it.
    #[error("Render error: {node_kind} is not supported on dialect {dialect}")]
    RenderError { node_kind: String, dialect: String },

    /// The database rejected a statement. Triggers rollback of the
    /// current migration; previously-committed migrations stay applied.
    #[error("Apply error: statement failed: {statement}\n  caused by: {reason}")]
    ApplyError { statement: String, reason: String },

    /// Updating the `schema_migrations` ledger failed. Handled identically
    /// to `ApplyError` by callers (same rollback-and-abort behavior).
    #[error("Ledger error: {0}")]
    LedgerError(String),

    /// A database query or connection operation failed below the level of
    /// the taxonomy above; preserves the tokio-postgres `DbError` detail.
    #[error("Database error: {}", format_db_error(.0))]
    DatabaseError(#[from] tokio_postgres::Error),

    /// A filesystem I/O operation failed (reading migration files, etc.).
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Invalid or missing `PtahConfig` (TOML parse errors, bad dialect string).
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The on-disk checksum of a migration file does not match the ledger.
    #[error("Checksum mismatch for migration {script}: expected {expected}, found {found}")]
    ChecksumMismatch {
        script: String,
        expected: i32,
        found: i32,
    },

    /// A filesystem-backed migration is missing its up or down counterpart.
    #[error("Migration {version} is missing its {missing} file")]
    IncompleteMigrationPair { version: i64, missing: &'static str },

    /// A rollback target does not correspond to any known migration version.
    #[error("No migration found for version {0}")]
    UnknownVersion(i64),

    /// Could not acquire the advisory lock used to serialise concurrent runs
    /// against the same database.
    #[error("Failed to acquire migration lock: {0}")]
    LockError(String),
}

/// A non-fatal finding surfaced during conversion, diffing, or introspection:
/// logged and collected, never propagated as an error (e.g. a field `enum`
/// value outside the referenced enum's values, or an EXCLUDE constraint seen
/// on a dialect that does not support it).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning(pub String);

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Convenience type alias for `Result<T, PtahError>`.
pub type Result<T> = std::result::Result<T, PtahError>;
