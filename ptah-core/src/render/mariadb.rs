//! MariaDB renderer. Shares MySQL's capability gaps (no enums, extensions,
//! functions, RLS, roles, or EXCLUDE constraints) but quotes and names
//! itself distinctly in warning comments.

use crate::ast::{AlterTableOp, ConstraintDef, ForeignKeyRef, Node};
use crate::model::ConstraintType;

use super::{render_column_body, warning_comment};

const DIALECT_NAME: &str = "MariaDB";

fn quote(ident: &str) -> String {
    crate::dialect::Dialect::MariaDb.quote_ident(ident)
}

fn auto_increment_type(_declared: &str) -> Option<&'static str> {
    None
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
        ConstraintType::Exclude => warning_comment("EXCLUDE constraints", DIALECT_NAME),
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

fn render_column(col: &crate::ast::ColumnDef) -> String {
    let mut body = render_column_body(col, quote, auto_increment_type, "AUTO_INCREMENT");
    if let Some(fk) = &col.foreign {
        body.push(' ');
        body.push_str(&render_fk_clause(fk));
    }
    body
}

pub(super) fn render_node(node: &Node) -> Vec<String> {
    match node {
        Node::CreateTable {
            name,
            columns,
            primary_key,
            constraints,
            engine,
            comment,
            options,
            if_not_exists,
        } => {
            let mut lines: Vec<String> = columns.iter().map(render_column).collect();
            if primary_key.len() >= 2 {
                lines.push(format!(
                    "PRIMARY KEY ({})",
                    primary_key.iter().map(|c| quote(c)).collect::<Vec<_>>().join(", ")
                ));
            }
            for c in constraints {
                if c.r#type == ConstraintType::Exclude {
                    continue;
                }
                lines.push(render_constraint(c));
            }
            let ine = if *if_not_exists { "IF NOT EXISTS " } else { "" };
            let mut suffix = Vec::new();
            suffix.push(format!("ENGINE={}", engine.clone().unwrap_or_else(|| "InnoDB".to_string())));
            if let Some(comment) = comment {
                suffix.push(format!("COMMENT='{}'", comment.replace('\'', "''")));
            }
            for (k, v) in options {
                suffix.push(format!("{k}={v}"));
            }
            let mut stmts = vec![format!(
                "CREATE TABLE {ine}{} (\n  {}\n) {}",
                quote(name),
                lines.join(",\n  "),
                suffix.join(" ")
            )];
            let exclude_count = constraints.iter().filter(|c| c.r#type == ConstraintType::Exclude).count();
            for _ in 0..exclude_count {
                stmts.push(warning_comment("EXCLUDE constraints", DIALECT_NAME));
            }
            stmts
        }
        Node::AlterTable { table, op } => render_alter(table, op),
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
            operator: _operator,
            if_not_exists: _,
        } => {
            let unique_kw = if *unique { "UNIQUE " } else { "" };
            let cols = columns.iter().map(|c| quote(c)).collect::<Vec<_>>().join(", ");
            let mut stmts = vec![format!("CREATE {unique_kw}INDEX {} ON {} ({cols})", quote(name), quote(table))];
            if r#type.is_some() {
                stmts.push(warning_comment("index access method (USING gin/gist)", DIALECT_NAME));
            }
            if condition.is_some() {
                stmts.push(warning_comment("partial index WHERE clause", DIALECT_NAME));
            }
            stmts
        }
        Node::DropIndex { name, .. } => vec![format!("DROP INDEX {}", quote(name))],
        Node::CreateType { .. } | Node::DropType { .. } | Node::AlterType { .. } => Vec::new(),
        Node::CreateExtension { .. } => vec![warning_comment("extensions", DIALECT_NAME)],
        Node::DropExtension { .. } => vec![warning_comment("extensions", DIALECT_NAME)],
        Node::CreateFunction { .. } => vec![warning_comment("PostgreSQL-style functions", DIALECT_NAME)],
        Node::DropFunction { .. } => Vec::new(),
        Node::CreatePolicy { .. } => vec![warning_comment("row-level security policies", DIALECT_NAME)],
        Node::DropPolicy { .. } => Vec::new(),
        Node::CreateRole { .. } => vec![warning_comment("role management", DIALECT_NAME)],
        Node::AlterRole { .. } => vec![warning_comment("role management", DIALECT_NAME)],
        Node::DropRole { .. } => Vec::new(),
        Node::Comment { text } => vec![format!("-- {text}")],
        Node::StatementList(_) => Vec::new(),
    }
}

fn render_alter(table: &str, op: &AlterTableOp) -> Vec<String> {
    let t = quote(table);
    match op {
        AlterTableOp::AddColumn(col) => vec![format!("ALTER TABLE {t} ADD COLUMN {}", render_column(col))],
        AlterTableOp::DropColumn { name } => vec![format!("ALTER TABLE {t} DROP COLUMN {}", quote(name))],
        AlterTableOp::AlterColumn(col) => vec![format!(
            "ALTER TABLE {t} MODIFY COLUMN {}",
            render_column(col)
        )],
        AlterTableOp::AddConstraint(c) => {
            if c.r#type == ConstraintType::Exclude {
                vec![warning_comment("EXCLUDE constraints", DIALECT_NAME)]
            } else {
                vec![format!("ALTER TABLE {t} ADD {}", render_constraint(c))]
            }
        }
        AlterTableOp::DropConstraint { name } => {
            vec![format!("ALTER TABLE {t} DROP CONSTRAINT {}", quote(name))]
        }
        AlterTableOp::EnableRowLevelSecurity | AlterTableOp::DisableRowLevelSecurity => {
            vec![warning_comment("row-level security", DIALECT_NAME)]
        }
        AlterTableOp::AddOption { key, value } => vec![format!("ALTER TABLE {t} {key}={value}")],
        AlterTableOp::DropOption { key } => vec![format!("ALTER TABLE {t} {key}=DEFAULT")],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_role_emits_warning_only() {
        let node = Node::CreateRole {
            name: "app_user".into(),
            login: true,
            password: None,
            superuser: false,
            create_db: false,
            create_role: false,
            inherit: true,
            replication: false,
        };
        let rendered = render_node(&node);
        assert_eq!(rendered.len(), 1);
        assert!(rendered[0].contains("MariaDB"));
    }
}
