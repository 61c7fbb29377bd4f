//! Parser for Postgres `pg_get_constraintdef()` output on EXCLUDE
//! constraints, tolerant of nested parentheses in both the element list
//! and the `WHERE` clause.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedExclude {
    pub method: String,
    pub elements: String,
    pub where_clause: String,
}

const PREFIX: &str = "EXCLUDE USING ";

/// Parse `"EXCLUDE USING <method> (<elements>) [WHERE (<expr>)]"`. Returns
/// `None` if `def` does not start with the expected prefix.
pub fn parse(def: &str) -> Option<ParsedExclude> {
    let def = def.trim();
    let rest = def.strip_prefix(PREFIX)?;

    let method_end = rest.find(|c: char| c.is_whitespace() || c == '(')?;
    let method = rest[..method_end].to_string();
    let rest = rest[method_end..].trim_start();

    let rest = rest.strip_prefix('(')?;
    let (elements, after) = scan_balanced(rest)?;

    let mut where_clause = String::new();
    let tail = after.trim_start();
    if let Some(expr) = tail.strip_prefix("WHERE") {
        let expr = expr.trim_start();
        if let Some(inner) = expr.strip_prefix('(') {
            if let Some((captured, _)) = scan_balanced(inner) {
                where_clause = captured;
            }
        } else {
            where_clause = expr.trim_end_matches(')').trim().to_string();
        }
    }

    Some(ParsedExclude {
        method,
        elements,
        where_clause,
    })
}

/// Given a string starting just after an opening `(`, scan forward tracking
/// paren depth and return `(contents_before_matching_close, rest_after_it)`.
fn scan_balanced(s: &str) -> Option<(String, &str)> {
    let mut depth = 1i32;
    for (idx, ch) in s.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some((s[..idx].to_string(), &s[idx + 1..]));
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_with_where_clause() {
        let parsed = parse(
            "EXCLUDE USING gist (room_id WITH =, during WITH &&) WHERE (is_active = true)",
        )
        .unwrap();
        assert_eq!(parsed.method, "gist");
        assert_eq!(parsed.elements, "room_id WITH =, during WITH &&");
        assert_eq!(parsed.where_clause, "is_active = true");
    }

    #[test]
    fn parses_without_where_clause() {
        let parsed = parse("EXCLUDE USING gist (room_id WITH =)").unwrap();
        assert_eq!(parsed.where_clause, "");
    }

    #[test]
    fn tolerates_nested_parens_in_elements() {
        let parsed =
            parse("EXCLUDE USING gist (daterange(start, end, '[]') WITH &&)").unwrap();
        assert_eq!(parsed.elements, "daterange(start, end, '[]') WITH &&");
    }

    #[test]
    fn rejects_non_exclude_input() {
        assert!(parse("CHECK (price > 0)").is_none());
    }
}
