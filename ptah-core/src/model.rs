//! The dialect-neutral schema model: the desired-state bundle that the
//! converter expands into AST and the diff engine compares against the
//! live schema. Every cross-reference here is by name; there are no
//! pointer cycles and nothing here is ever mutated once built.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One dialect's worth of attribute overrides for a model object.
/// Keys are attribute names (`type`, `check`, `comment`, `default`,
/// `default_expr`, `engine`, or a free-form table option).
pub type Overrides = HashMap<String, HashMap<String, String>>;

/// The top-level bundle: every schema object keyed by its symbolic name.
/// Order within each `Vec` is preserved from the annotation front-end and
/// used as a tie-break only where the spec doesn't demand lexicographic
/// ordering (the planner re-sorts where it matters).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Database {
    pub tables: Vec<Table>,
    pub fields: Vec<Field>,
    pub indexes: Vec<Index>,
    pub enums: Vec<Enum>,
    pub extensions: Vec<Extension>,
    pub embedded_fields: Vec<EmbeddedField>,
    pub functions: Vec<Function>,
    pub rls_policies: Vec<RLSPolicy>,
    pub rls_enabled_tables: Vec<RLSEnabledTable>,
    pub roles: Vec<Role>,
    pub constraints: Vec<Constraint>,
}

impl Database {
    pub fn fields_of(&self, struct_id: &str) -> Vec<&Field> {
        self.fields.iter().filter(|f| f.struct_id == struct_id).collect()
    }

    pub fn embedded_fields_of(&self, struct_id: &str) -> Vec<&EmbeddedField> {
        self.embedded_fields
            .iter()
            .filter(|e| e.struct_id == struct_id)
            .collect()
    }

    pub fn table_by_name(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn enum_by_name(&self, name: &str) -> Option<&Enum> {
        self.enums.iter().find(|e| e.name == name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Table {
    pub struct_id: String,
    pub name: String,
    pub comment: Option<String>,
    /// Dialect hint for storage engine, e.g. MySQL's `InnoDB`.
    pub engine: Option<String>,
    /// Ordered composite primary key column names; may be empty when the
    /// primary key is instead expressed via a single `Field::primary`.
    pub primary_key: Vec<String>,
    pub overrides: Overrides,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Field {
    pub struct_id: String,
    pub name: String,
    /// Dialect-neutral type name (`"INTEGER"`, `"VARCHAR(255)"`, an enum
    /// name, ...) or an already dialect-specific string supplied verbatim.
    pub r#type: String,
    pub nullable: bool,
    pub primary: bool,
    pub unique: bool,
    pub auto_increment: bool,
    /// Mutually exclusive with `default_expression`; setting one during
    /// override application clears the other.
    pub default_literal: Option<String>,
    pub default_expression: Option<String>,
    pub check: Option<String>,
    pub comment: Option<String>,
    /// Foreign-key reference of the form `"table"` or `"table(column)"`.
    pub foreign: Option<String>,
    pub foreign_key_name: Option<String>,
    /// Optional subset of values this field is expected to hold, validated
    /// (as a warning, not an error) against the referenced enum's values.
    pub r#enum: Option<Vec<String>>,
    pub overrides: Overrides,
}

impl Field {
    pub fn new(struct_id: impl Into<String>, name: impl Into<String>, ty: impl Into<String>) -> Self {
        Field {
            struct_id: struct_id.into(),
            name: name.into(),
            r#type: ty.into(),
            nullable: true,
            ..Default::default()
        }
    }

    /// Enforce the default_literal/default_expression exclusivity invariant:
    /// setting one clears the other.
    pub fn set_default_literal(&mut self, value: Option<String>) {
        self.default_literal = value;
        if self.default_literal.is_some() {
            self.default_expression = None;
        }
    }

    pub fn set_default_expression(&mut self, value: Option<String>) {
        self.default_expression = value;
        if self.default_expression.is_some() {
            self.default_literal = None;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbedMode {
    Inline,
    Json,
    Relation,
    Skip,
    /// Any mode string that isn't one of the above. Carries the original
    /// value so callers can report what was actually seen; `convert::embed`
    /// treats this the same as `Inline`, with a warning.
    Unknown(String),
}

impl<'de> Deserialize<'de> for EmbedMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "inline" => EmbedMode::Inline,
            "json" => EmbedMode::Json,
            "relation" => EmbedMode::Relation,
            "skip" => EmbedMode::Skip,
            _ => EmbedMode::Unknown(raw),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EmbeddedField {
    pub struct_id: String,
    pub embedded_type_id: String,
    pub mode: Option<EmbedMode>,
    /// Column-name prefix, `inline` mode only.
    pub prefix: Option<String>,
    /// Column name, `json` mode only (defaults to `lower(embedded_type_id) + "_data"`).
    pub name: Option<String>,
    /// Column type, `json` mode only (defaults to `"JSONB"`).
    pub r#type: Option<String>,
    pub nullable: bool,
    pub comment: Option<String>,
    /// FK column name, `relation` mode only.
    pub field: Option<String>,
    /// FK target, `relation` mode only.
    pub r#ref: Option<String>,
    pub overrides: Overrides,
}

impl Default for EmbedMode {
    fn default() -> Self {
        EmbedMode::Inline
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Index {
    pub name: String,
    pub struct_id: String,
    /// Explicit table name; wins over resolving `struct_id` against the
    /// table list when present.
    pub table_name: Option<String>,
    pub fields: Vec<String>,
    pub unique: bool,
    pub comment: Option<String>,
    /// PG-only index method (`btree`, `gin`, `gist`, ...).
    pub r#type: Option<String>,
    /// Partial-index `WHERE` clause.
    pub condition: Option<String>,
    /// GIN/GiST operator class.
    pub operator: Option<String>,
}

impl Index {
    pub fn resolved_table_name<'a>(&'a self, db: &'a Database) -> Option<&'a str> {
        if let Some(name) = &self.table_name {
            return Some(name.as_str());
        }
        db.tables
            .iter()
            .find(|t| t.struct_id == self.struct_id)
            .map(|t| t.name.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Enum {
    pub name: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Extension {
    pub name: String,
    pub version: Option<String>,
    pub if_not_exists: bool,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Security {
    Definer,
    Invoker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Volatility {
    Volatile,
    Stable,
    Immutable,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Function {
    pub name: String,
    pub parameters: String,
    pub returns: String,
    pub language: String,
    pub security: Security,
    pub volatility: Volatility,
    pub body: String,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PolicyFor {
    All,
    Select,
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RLSPolicy {
    pub name: String,
    pub table: String,
    pub policy_for: Option<PolicyFor>,
    /// Comma-separated role list, e.g. `"authenticated,service_role"`.
    pub to_roles: Option<String>,
    pub using_expression: Option<String>,
    pub with_check_expression: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RLSEnabledTable {
    pub table: String,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Role {
    pub name: String,
    pub login: bool,
    pub password: Option<String>,
    pub superuser: bool,
    pub create_db: bool,
    pub create_role: bool,
    pub inherit: bool,
    pub replication: bool,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConstraintType {
    Check,
    Unique,
    Exclude,
    #[serde(rename = "FOREIGN_KEY")]
    ForeignKey,
    #[serde(rename = "PRIMARY_KEY")]
    PrimaryKey,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Constraint {
    pub struct_id: String,
    pub table: String,
    pub name: String,
    pub r#type: Option<ConstraintType>,
    pub columns: Vec<String>,
    pub check_expression: Option<String>,
    /// EXCLUDE only: the index access method (`gist`, `gin`, ...).
    pub using_method: Option<String>,
    /// EXCLUDE only: the element list, parens stripped.
    pub exclude_elements: Option<String>,
    /// EXCLUDE only: the WHERE predicate, parens stripped if present.
    pub where_condition: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_literal_clears_expression_and_vice_versa() {
        let mut f = Field::new("t1", "price", "NUMERIC");
        f.set_default_expression(Some("now()".into()));
        f.set_default_literal(Some("'0'".into()));
        assert_eq!(f.default_expression, None);
        assert_eq!(f.default_literal, Some("'0'".into()));

        f.set_default_expression(Some("now()".into()));
        assert_eq!(f.default_literal, None);
    }

    #[test]
    fn index_resolves_table_name_from_struct_id_when_unset() {
        let mut db = Database::default();
        db.tables.push(Table {
            struct_id: "Users".into(),
            name: "users".into(),
            ..Default::default()
        });
        let idx = Index {
            name: "idx_users_email".into(),
            struct_id: "Users".into(),
            ..Default::default()
        };
        assert_eq!(idx.resolved_table_name(&db), Some("users"));
    }

    #[test]
    fn index_table_name_override_wins() {
        let db = Database::default();
        let idx = Index {
            struct_id: "Users".into(),
            table_name: Some("explicit_users".into()),
            ..Default::default()
        };
        assert_eq!(idx.resolved_table_name(&db), Some("explicit_users"));
    }
}
