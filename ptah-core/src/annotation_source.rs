//! Annotation front-end boundary. Parsing schema annotations out of
//! host-language source files is out of scope here; this module only
//! defines the seam an embedding application's parser plugs into and a
//! trivial in-memory source for composing a [`Database`] by hand and for
//! tests, mirroring `runner::provider::InMemoryProvider`'s programmatic
//! registration style.

use crate::error::Result;
use crate::model::{Constraint, Database, EmbeddedField, Enum, Extension, Field, Function, Index, RLSEnabledTable, RLSPolicy, Role, Table};

/// Produces the desired-state [`Database`] bundle. A real implementation
/// would walk host-language source files looking for schema annotations;
/// this crate ships only [`InMemorySource`], which assumes the bundle has
/// already been assembled by the caller.
pub trait AnnotationSource {
    fn load(&self) -> Result<Database>;
}

/// Accepts a schema via programmatic registration rather than parsing it
/// out of source files.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    database: Database,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, table: Table) -> Self {
        self.database.tables.push(table);
        self
    }

    pub fn field(mut self, field: Field) -> Self {
        self.database.fields.push(field);
        self
    }

    pub fn index(mut self, index: Index) -> Self {
        self.database.indexes.push(index);
        self
    }

    pub fn r#enum(mut self, e: Enum) -> Self {
        self.database.enums.push(e);
        self
    }

    pub fn extension(mut self, extension: Extension) -> Self {
        self.database.extensions.push(extension);
        self
    }

    pub fn embedded_field(mut self, embedded: EmbeddedField) -> Self {
        self.database.embedded_fields.push(embedded);
        self
    }

    pub fn function(mut self, function: Function) -> Self {
        self.database.functions.push(function);
        self
    }

    pub fn rls_policy(mut self, policy: RLSPolicy) -> Self {
        self.database.rls_policies.push(policy);
        self
    }

    pub fn rls_enabled_table(mut self, table: RLSEnabledTable) -> Self {
        self.database.rls_enabled_tables.push(table);
        self
    }

    pub fn role(mut self, role: Role) -> Self {
        self.database.roles.push(role);
        self
    }

    pub fn constraint(mut self, constraint: Constraint) -> Self {
        self.database.constraints.push(constraint);
        self
    }
}

impl AnnotationSource for InMemorySource {
    fn load(&self) -> Result<Database> {
        Ok(self.database.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Field;

    #[test]
    fn in_memory_source_returns_what_was_registered() {
        let source = InMemorySource::new().field(Field::new("users", "id", "BIGINT"));
        let db = source.load().unwrap();
        assert_eq!(db.fields.len(), 1);
        assert_eq!(db.fields[0].struct_id, "users");
    }

    #[test]
    fn empty_source_produces_empty_database() {
        let db = InMemorySource::new().load().unwrap();
        assert_eq!(db, Database::default());
    }
}
