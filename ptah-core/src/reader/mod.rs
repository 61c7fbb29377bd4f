//! DB schema reader: per-dialect introspection producing a `LiveSchema`.
//!
//! The live model is semantically identical to the desired [`crate::model::Database`]
//! bundle (same object shapes), so `LiveSchema` is that same type: the
//! reader normalises dialect-specific observed attributes (e.g. an
//! `information_schema` `"YES"`/`"NO"` nullability flag) into the model's
//! plain `bool` fields as it builds the bundle, rather than carrying a
//! second parallel type through the rest of the pipeline.

pub mod exclude_parser;
pub mod mysql;
pub mod postgres;

use async_trait::async_trait;

use crate::db::DbClient;
use crate::error::{Result, ValidationWarning};
use crate::model::Database;

pub type LiveSchema = Database;

/// One per-dialect introspection implementation.
#[async_trait]
pub trait SchemaReader {
    /// Read the full live schema, excluding system tables (notably the
    /// migration ledger table, which the caller names).
    async fn read_schema(
        &self,
        client: &dyn DbClient,
        ledger_table: &str,
    ) -> Result<(LiveSchema, Vec<ValidationWarning>)>;
}
