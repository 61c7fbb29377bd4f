//! The closed statement-node AST that sits between the model/planner and
//! the per-dialect renderers. Nothing here performs I/O; nodes are plain
//! data built by the converter and the planner and consumed by exactly one
//! visitor per dialect.

use crate::model::{ConstraintType, PolicyFor, Security, Volatility};

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub r#type: String,
    pub nullable: bool,
    pub primary: bool,
    pub unique: bool,
    pub auto_increment: bool,
    pub default_literal: Option<String>,
    pub default_expression: Option<String>,
    pub check: Option<String>,
    pub comment: Option<String>,
    pub foreign: Option<ForeignKeyRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKeyRef {
    pub name: Option<String>,
    pub table: String,
    pub column: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AlterTableOp {
    AddColumn(ColumnDef),
    DropColumn { name: String },
    AlterColumn(ColumnDef),
    AddConstraint(ConstraintDef),
    DropConstraint { name: String },
    EnableRowLevelSecurity,
    DisableRowLevelSecurity,
    AddOption { key: String, value: String },
    DropOption { key: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintDef {
    pub name: String,
    pub r#type: ConstraintType,
    pub columns: Vec<String>,
    pub check_expression: Option<String>,
    pub foreign: Option<ForeignKeyRef>,
    pub using_method: Option<String>,
    pub exclude_elements: Option<String>,
    pub where_condition: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeAlteration {
    AddValue { value: String, before: Option<String> },
    RenameValue { old: String, new: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    CreateTable {
        name: String,
        columns: Vec<ColumnDef>,
        primary_key: Vec<String>,
        constraints: Vec<ConstraintDef>,
        engine: Option<String>,
        comment: Option<String>,
        options: Vec<(String, String)>,
        if_not_exists: bool,
    },
    AlterTable {
        table: String,
        op: AlterTableOp,
    },
    DropTable {
        name: String,
        if_exists: bool,
    },
    CreateIndex {
        name: String,
        table: String,
        columns: Vec<String>,
        unique: bool,
        r#type: Option<String>,
        condition: Option<String>,
        operator: Option<String>,
        if_not_exists: bool,
    },
    DropIndex {
        name: String,
        if_exists: bool,
    },
    CreateType {
        name: String,
        values: Vec<String>,
    },
    DropType {
        name: String,
        if_exists: bool,
    },
    AlterType {
        name: String,
        alteration: TypeAlteration,
    },
    CreateExtension {
        name: String,
        version: Option<String>,
        if_not_exists: bool,
    },
    DropExtension {
        name: String,
        if_exists: bool,
    },
    CreateFunction {
        name: String,
        parameters: String,
        returns: String,
        language: String,
        security: Security,
        volatility: Volatility,
        body: String,
    },
    DropFunction {
        name: String,
        if_exists: bool,
    },
    CreatePolicy {
        name: String,
        table: String,
        policy_for: Option<PolicyFor>,
        to_roles: Option<String>,
        using_expression: Option<String>,
        with_check_expression: Option<String>,
    },
    DropPolicy {
        name: String,
        table: String,
        if_exists: bool,
    },
    CreateRole {
        name: String,
        login: bool,
        password: Option<String>,
        superuser: bool,
        create_db: bool,
        create_role: bool,
        inherit: bool,
        replication: bool,
    },
    AlterRole {
        name: String,
        login: bool,
        superuser: bool,
        create_db: bool,
        create_role: bool,
        inherit: bool,
        replication: bool,
    },
    DropRole {
        name: String,
        if_exists: bool,
    },
    Comment {
        text: String,
    },
    StatementList(Vec<Node>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statement_list_flattens_for_equality() {
        let a = Node::StatementList(vec![Node::Comment { text: "x".into() }]);
        let b = Node::StatementList(vec![Node::Comment { text: "x".into() }]);
        assert_eq!(a, b);
    }
}
