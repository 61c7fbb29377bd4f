//! Per-dialect rendering: translates AST nodes into SQL text. Rendering is
//! pure — no I/O, no state beyond the output buffer built up for one call.

pub mod mariadb;
pub mod mysql;
pub mod postgres;

use crate::ast::Node;
use crate::dialect::Dialect;

/// Render a full AST (typically a `Node::StatementList`) into the ordered
/// sequence of SQL statement strings for `dialect`. Nodes with no rendering
/// on this dialect either produce nothing (silently folded elsewhere, e.g.
/// enum types inlined into column definitions) or a single `-- WARNING`
/// comment line, per each visitor's own capability table.
pub fn render(node: &Node, dialect: Dialect) -> Vec<String> {
    let mut out = Vec::new();
    render_into(node, dialect, &mut out);
    out
}

/// Join a rendered statement list the way migration files expect:
/// semicolon-terminated statements, one per line.
pub fn render_to_sql(node: &Node, dialect: Dialect) -> String {
    render(node, dialect)
        .into_iter()
        .map(|s| format!("{s};"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_into(node: &Node, dialect: Dialect, out: &mut Vec<String>) {
    if let Node::StatementList(nodes) = node {
        for n in nodes {
            render_into(n, dialect, out);
        }
        return;
    }
    let rendered = match dialect {
        Dialect::Postgres => postgres::render_node(node),
        Dialect::MySql => mysql::render_node(node),
        Dialect::MariaDb => mariadb::render_node(node),
    };
    out.extend(rendered);
}

/// Shared helper: render a column definition's inline fragment (everything
/// after the column name) the way all three dialects structure it, given a
/// dialect-specific type substitution for auto-increment and an identifier
/// quoting function.
pub(crate) fn render_column_body(
    col: &crate::ast::ColumnDef,
    quote: impl Fn(&str) -> String,
    auto_increment_type: impl Fn(&str) -> Option<&'static str>,
    auto_increment_suffix: &str,
) -> String {
    let mut parts = Vec::new();
    let ty = if col.auto_increment {
        auto_increment_type(&col.r#type)
            .map(|s| s.to_string())
            .unwrap_or_else(|| col.r#type.clone())
    } else {
        col.r#type.clone()
    };
    parts.push(format!("{} {}", quote(&col.name), ty));
    if col.auto_increment && !auto_increment_suffix.is_empty() {
        parts.push(auto_increment_suffix.to_string());
    }
    if !col.nullable {
        parts.push("NOT NULL".to_string());
    }
    if col.primary {
        parts.push("PRIMARY KEY".to_string());
    }
    if col.unique {
        parts.push("UNIQUE".to_string());
    }
    if let Some(lit) = &col.default_literal {
        parts.push(format!("DEFAULT {lit}"));
    } else if let Some(expr) = &col.default_expression {
        parts.push(format!("DEFAULT {expr}"));
    }
    if let Some(check) = &col.check {
        parts.push(format!("CHECK ({check})"));
    }
    parts.join(" ")
}

pub(crate) fn warning_comment(what: &str, dialect_name: &str) -> String {
    format!("-- WARNING: {what} not supported in {dialect_name}")
}
