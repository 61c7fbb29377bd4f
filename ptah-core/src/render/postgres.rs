//! PostgreSQL renderer. Supports the full AST node set.

use crate::ast::{AlterTableOp, ConstraintDef, ForeignKeyRef, Node, TypeAlteration};
use crate::model::{ConstraintType, PolicyFor, Security, Volatility};

use super::render_column_body;

fn quote(ident: &str) -> String {
    crate::dialect::Dialect::Postgres.quote_ident(ident)
}

fn auto_increment_type(declared: &str) -> Option<&'static str> {
    let upper = declared.to_uppercase();
    if upper.contains("BIGINT") {
        Some("BIGSERIAL")
    } else if upper.contains("SMALLINT") {
        Some("SMALLSERIAL")
    } else {
        Some("SERIAL")
    }
}

fn render_fk_clause(fk: &ForeignKeyRef) -> String {
    format!("REFERENCES {}({})", quote(&fk.table), quote(&fk.column))
}

fn render_constraint(c: &ConstraintDef) -> String {
    match c.r#type {
        ConstraintType::Check => format!(
            "CONSTRAINT {} CHECK ({})",
            quote(&c.name),
            c.check_expression.clone().unwrap_or_default()
        ),
        ConstraintType::Unique => format!(
            "CONSTRAINT {} UNIQUE ({})",
            quote(&c.name),
            c.columns.iter().map(|s| quote(s)).collect::<Vec<_>>().join(", ")
        ),
        ConstraintType::Exclude => format!(
            "CONSTRAINT {} EXCLUDE USING {} ({}){}",
            quote(&c.name),
            c.using_method.clone().unwrap_or_else(|| "gist".to_string()),
            c.exclude_elements.clone().unwrap_or_default(),
            c.where_condition
                .as_ref()
                .map(|w| format!(" WHERE ({w})"))
                .unwrap_or_default()
        ),
        ConstraintType::ForeignKey => {
            let fk = c.foreign.as_ref();
            format!(
                "CONSTRAINT {} FOREIGN KEY ({}) {}",
                quote(&c.name),
                c.columns.iter().map(|s| quote(s)).collect::<Vec<_>>().join(", "),
                fk.map(render_fk_clause).unwrap_or_default()
            )
        }
        ConstraintType::PrimaryKey => format!(
            "CONSTRAINT {} PRIMARY KEY ({})",
            quote(&c.name),
            c.columns.iter().map(|s| quote(s)).collect::<Vec<_>>().join(", ")
        ),
    }
}

pub(super) fn render_node(node: &Node) -> Vec<String> {
    match node {
        Node::CreateTable {
            name,
            columns,
            primary_key,
            constraints,
            engine: _engine,
            comment,
            options: _options,
            if_not_exists,
        } => {
            let mut lines: Vec<String> = columns
                .iter()
                .map(|c| {
                    let mut body = render_column_body(c, quote, auto_increment_type, "");
                    if let Some(fk) = &c.foreign {
                        body.push(' ');
                        body.push_str(&render_fk_clause(fk));
                    }
                    body
                })
                .collect();
            if primary_key.len() >= 2 {
                lines.push(format!(
                    "PRIMARY KEY ({})",
                    primary_key.iter().map(|c| quote(c)).collect::<Vec<_>>().join(", ")
                ));
            }
            for c in constraints {
                lines.push(render_constraint(c));
            }
            let ine = if *if_not_exists { "IF NOT EXISTS " } else { "" };
            let mut stmts = vec![format!(
                "CREATE TABLE {ine}{} (\n  {}\n)",
                quote(name),
                lines.join(",\n  ")
            )];
            if let Some(comment) = comment {
                stmts.push(format!(
                    "COMMENT ON TABLE {} IS '{}'",
                    quote(name),
                    comment.replace('\'', "''")
                ));
            }
            stmts
        }
        Node::AlterTable { table, op } => vec![render_alter(table, op)],
        Node::DropTable { name, if_exists } => {
            let ie = if *if_exists { "IF EXISTS " } else { "" };
            vec![format!("DROP TABLE {ie}{}", quote(name))]
        }
        Node::CreateIndex {
            name,
            table,
            columns,
            unique,
            r#type,
            condition,
            operator,
            if_not_exists,
        } => {
            let unique_kw = if *unique { "UNIQUE " } else { "" };
            let ine = if *if_not_exists { "IF NOT EXISTS " } else { "" };
            let using = r#type
                .as_ref()
                .map(|t| format!(" USING {t}"))
                .unwrap_or_default();
            let cols = columns
                .iter()
                .map(|c| {
                    if let Some(op) = operator {
                        format!("{} {}", quote(c), op)
                    } else {
                        quote(c)
                    }
                })
                .collect::<Vec<_>>()
                .join(", ");
            let where_clause = condition
                .as_ref()
                .map(|c| format!(" WHERE ({c})"))
                .unwrap_or_default();
            vec![format!(
                "CREATE {unique_kw}INDEX {ine}{}{using} ON {} ({cols}){where_clause}",
                quote(name),
                quote(table)
            )]
        }
        Node::DropIndex { name, if_exists } => {
            let ie = if *if_exists { "IF EXISTS " } else { "" };
            vec![format!("DROP INDEX {ie}{}", quote(name))]
        }
        Node::CreateType { name, values } => {
            let vals = values
                .iter()
                .map(|v| format!("'{}'", v.replace('\'', "''")))
                .collect::<Vec<_>>()
                .join(", ");
            vec![format!("CREATE TYPE {} AS ENUM ({vals})", quote(name))]
        }
        Node::DropType { name, if_exists } => {
            let ie = if *if_exists { "IF EXISTS " } else { "" };
            vec![format!("DROP TYPE {ie}{}", quote(name))]
        }
        Node::AlterType { name, alteration } => match alteration {
            TypeAlteration::AddValue { value, before } => {
                let pos = before
                    .as_ref()
                    .map(|b| format!(" BEFORE '{}'", b.replace('\'', "''")))
                    .unwrap_or_default();
                vec![format!(
                    "ALTER TYPE {} ADD VALUE '{}'{pos}",
                    quote(name),
                    value.replace('\'', "''")
                )]
            }
            TypeAlteration::RenameValue { old, new } => vec![format!(
                "ALTER TYPE {} RENAME VALUE '{}' TO '{}'",
                quote(name),
                old.replace('\'', "''"),
                new.replace('\'', "''")
            )],
        },
        Node::CreateExtension {
            name,
            version,
            if_not_exists,
        } => {
            let ine = if *if_not_exists { "IF NOT EXISTS " } else { "" };
            let ver = version
                .as_ref()
                .map(|v| format!(" VERSION '{v}'"))
                .unwrap_or_default();
            vec![format!("CREATE EXTENSION {ine}{}{ver}", quote(name))]
        }
        Node::DropExtension { name, if_exists } => {
            let ie = if *if_exists { "IF EXISTS " } else { "" };
            vec![format!("DROP EXTENSION {ie}{}", quote(name))]
        }
        Node::CreateFunction {
            name,
            parameters,
            returns,
            language,
            security,
            volatility,
            body,
        } => {
            let sec = match security {
                Security::Definer => "SECURITY DEFINER",
                Security::Invoker => "SECURITY INVOKER",
            };
            let vol = match volatility {
                Volatility::Volatile => "VOLATILE",
                Volatility::Stable => "STABLE",
                Volatility::Immutable => "IMMUTABLE",
            };
            vec![format!(
                "CREATE OR REPLACE FUNCTION {}({parameters}) RETURNS {returns} LANGUAGE {language} {vol} {sec} AS $$\n{body}\n$$",
                quote(name)
            )]
        }
        Node::DropFunction { name, if_exists } => {
            let ie = if *if_exists { "IF EXISTS " } else { "" };
            vec![format!("DROP FUNCTION {ie}{}", quote(name))]
        }
        Node::CreatePolicy {
            name,
            table,
            policy_for,
            to_roles,
            using_expression,
            with_check_expression,
        } => {
            let for_clause = match policy_for {
                Some(PolicyFor::All) | None => "ALL".to_string(),
                Some(PolicyFor::Select) => "SELECT".to_string(),
                Some(PolicyFor::Insert) => "INSERT".to_string(),
                Some(PolicyFor::Update) => "UPDATE".to_string(),
                Some(PolicyFor::Delete) => "DELETE".to_string(),
            };
            let roles = to_roles
                .as_ref()
                .map(|r| format!(" TO {r}"))
                .unwrap_or_default();
            let using = using_expression
                .as_ref()
                .map(|u| format!(" USING ({u})"))
                .unwrap_or_default();
            let check = with_check_expression
                .as_ref()
                .map(|c| format!(" WITH CHECK ({c})"))
                .unwrap_or_default();
            vec![format!(
                "CREATE POLICY {} ON {} FOR {for_clause}{roles}{using}{check}",
                quote(name),
                quote(table)
            )]
        }
        Node::DropPolicy {
            name,
            table,
            if_exists,
        } => {
            let ie = if *if_exists { "IF EXISTS " } else { "" };
            vec![format!("DROP POLICY {ie}{} ON {}", quote(name), quote(table))]
        }
        Node::CreateRole {
            name,
            login,
            password,
            superuser,
            create_db,
            create_role,
            inherit,
            replication,
        } => {
            let mut attrs = vec![if *login { "LOGIN" } else { "NOLOGIN" }.to_string()];
            attrs.push(if *superuser { "SUPERUSER" } else { "NOSUPERUSER" }.to_string());
            attrs.push(if *create_db { "CREATEDB" } else { "NOCREATEDB" }.to_string());
            attrs.push(if *create_role { "CREATEROLE" } else { "NOCREATEROLE" }.to_string());
            attrs.push(if *inherit { "INHERIT" } else { "NOINHERIT" }.to_string());
            attrs.push(if *replication { "REPLICATION" } else { "NOREPLICATION" }.to_string());
            if let Some(pw) = password {
                attrs.push(format!("PASSWORD '{}'", pw.replace('\'', "''")));
            }
            vec![format!("CREATE ROLE {} WITH {}", quote(name), attrs.join(" "))]
        }
        Node::AlterRole {
            name,
            login,
            superuser,
            create_db,
            create_role,
            inherit,
            replication,
        } => {
            let mut attrs = vec![if *login { "LOGIN" } else { "NOLOGIN" }.to_string()];
            attrs.push(if *superuser { "SUPERUSER" } else { "NOSUPERUSER" }.to_string());
            attrs.push(if *create_db { "CREATEDB" } else { "NOCREATEDB" }.to_string());
            attrs.push(if *create_role { "CREATEROLE" } else { "NOCREATEROLE" }.to_string());
            attrs.push(if *inherit { "INHERIT" } else { "NOINHERIT" }.to_string());
            attrs.push(if *replication { "REPLICATION" } else { "NOREPLICATION" }.to_string());
            vec![format!("ALTER ROLE {} WITH {}", quote(name), attrs.join(" "))]
        }
        Node::DropRole { name, if_exists } => {
            let ie = if *if_exists { "IF EXISTS " } else { "" };
            vec![format!("DROP ROLE {ie}{}", quote(name))]
        }
        Node::Comment { text } => vec![format!("-- {text}")],
        Node::StatementList(_) => Vec::new(),
    }
}

fn render_alter(table: &str, op: &AlterTableOp) -> String {
    let t = quote(table);
    match op {
        AlterTableOp::AddColumn(col) => {
            let mut body = render_column_body(col, quote, auto_increment_type, "");
            if let Some(fk) = &col.foreign {
                body.push(' ');
                body.push_str(&render_fk_clause(fk));
            }
            format!("ALTER TABLE {t} ADD COLUMN {body}")
        }
        AlterTableOp::DropColumn { name } => format!("ALTER TABLE {t} DROP COLUMN {}", quote(name)),
        AlterTableOp::AlterColumn(col) => {
            format!(
                "ALTER TABLE {t} ALTER COLUMN {} TYPE {}",
                quote(&col.name),
                col.r#type
            )
        }
        AlterTableOp::AddConstraint(c) => format!("ALTER TABLE {t} ADD {}", render_constraint(c)),
        AlterTableOp::DropConstraint { name } => {
            format!("ALTER TABLE {t} DROP CONSTRAINT {}", quote(name))
        }
        AlterTableOp::EnableRowLevelSecurity => format!("ALTER TABLE {t} ENABLE ROW LEVEL SECURITY"),
        AlterTableOp::DisableRowLevelSecurity => {
            format!("ALTER TABLE {t} DISABLE ROW LEVEL SECURITY")
        }
        AlterTableOp::AddOption { key, value } => format!("ALTER TABLE {t} SET ({key} = {value})"),
        AlterTableOp::DropOption { key } => format!("ALTER TABLE {t} RESET ({key})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ColumnDef;

    #[test]
    fn create_table_renders_columns_and_pk() {
        let node = Node::CreateTable {
            name: "users".into(),
            columns: vec![ColumnDef {
                name: "id".into(),
                r#type: "INTEGER".into(),
                nullable: false,
                primary: true,
                unique: false,
                auto_increment: true,
                default_literal: None,
                default_expression: None,
                check: None,
                comment: None,
                foreign: None,
            }],
            primary_key: vec![],
            constraints: vec![],
            engine: None,
            comment: None,
            options: vec![],
            if_not_exists: false,
        };
        let sql = render_node(&node).join(";\n");
        assert!(sql.contains("CREATE TABLE \"users\""));
        assert!(sql.contains("SERIAL"));
        assert!(sql.contains("PRIMARY KEY"));
    }

    #[test]
    fn drop_policy_includes_table() {
        let node = Node::DropPolicy {
            name: "user_iso".into(),
            table: "users".into(),
            if_exists: false,
        };
        assert_eq!(render_node(&node), vec!["DROP POLICY \"user_iso\" ON \"users\""]);
    }
}
