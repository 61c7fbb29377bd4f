//! Comment- and string-aware SQL statement splitter. Splits on unquoted
//! semicolons; never splits inside a string/identifier literal or a
//! comment. Modelled explicitly as a small lexer state machine, the one
//! place in this crate where that's unavoidable.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Default,
    SingleQuote,
    DoubleQuote,
    Backtick,
    LineComment,
    BlockComment,
    /// Postgres dollar-quoting: `$tag$ ... $tag$`. Holds the byte length of
    /// the opening tag (including both `$`s) so we know how far to look
    /// back when checking for the matching close tag.
    DollarQuote,
}

/// Split `sql` into trimmed, non-empty statements on unquoted semicolons.
/// Respects single-quoted strings (with `''` escaping and Postgres
/// `E'...'` escape strings), double-quoted identifiers, backtick
/// identifiers (MySQL/MariaDB), `--` line comments, `/* */` block comments
/// (nesting is not tracked — the first `*/` closes), and Postgres
/// dollar-quoted strings (`$$...$$` / `$tag$...$tag$`).
pub fn split_statements(sql: &str) -> Vec<String> {
    let bytes = sql.as_bytes();
    let len = bytes.len();
    let mut state = State::Default;
    let mut start = 0usize;
    let mut i = 0usize;
    let mut out = Vec::new();
    let mut dollar_tag: Vec<u8> = Vec::new();

    while i < len {
        let b = bytes[i];
        match state {
            State::Default => match b {
                b'\'' => {
                    state = State::SingleQuote;
                    i += 1;
                }
                b'"' => {
                    state = State::DoubleQuote;
                    i += 1;
                }
                b'`' => {
                    state = State::Backtick;
                    i += 1;
                }
                b'-' if bytes.get(i + 1) == Some(&b'-') => {
                    state = State::LineComment;
                    i += 2;
                }
                b'/' if bytes.get(i + 1) == Some(&b'*') => {
                    state = State::BlockComment;
                    i += 2;
                }
                b'$' => {
                    if let Some(tag_len) = dollar_tag_len(&bytes[i..]) {
                        dollar_tag = bytes[i..i + tag_len].to_vec();
                        state = State::DollarQuote;
                        i += tag_len;
                    } else {
                        i += 1;
                    }
                }
                b';' => {
                    let stmt = sql[start..i].trim();
                    if !stmt.is_empty() {
                        out.push(stmt.to_string());
                    }
                    i += 1;
                    start = i;
                }
                _ => i += 1,
            },
            State::SingleQuote => match b {
                b'\'' => {
                    if bytes.get(i + 1) == Some(&b'\'') {
                        i += 2;
                    } else {
                        state = State::Default;
                        i += 1;
                    }
                }
                b'\\' if bytes.get(i + 1).is_some() => {
                    // Backslash-escaping inside E'...' escape strings.
                    i += 2;
                }
                _ => i += 1,
            },
            State::DoubleQuote => match b {
                b'"' => {
                    if bytes.get(i + 1) == Some(&b'"') {
                        i += 2;
                    } else {
                        state = State::Default;
                        i += 1;
                    }
                }
                _ => i += 1,
            },
            State::Backtick => match b {
                b'`' => {
                    if bytes.get(i + 1) == Some(&b'`') {
                        i += 2;
                    } else {
                        state = State::Default;
                        i += 1;
                    }
                }
                _ => i += 1,
            },
            State::LineComment => match b {
                b'\n' => {
                    state = State::Default;
                    i += 1;
                }
                _ => i += 1,
            },
            State::BlockComment => {
                if b == b'*' && bytes.get(i + 1) == Some(&b'/') {
                    state = State::Default;
                    i += 2;
                } else {
                    i += 1;
                }
            }
            State::DollarQuote => {
                if b == b'$' && bytes[i..].starts_with(&dollar_tag[..]) {
                    state = State::Default;
                    i += dollar_tag.len();
                } else {
                    i += 1;
                }
            }
        }
    }

    let tail = sql[start..].trim();
    if !tail.is_empty() {
        out.push(tail.to_string());
    }
    out
}

/// Recognise a `$$` or `$tag$` opening delimiter at the start of `s`,
/// returning its byte length including both dollar signs.
fn dollar_tag_len(s: &[u8]) -> Option<usize> {
    if s.first() != Some(&b'$') {
        return None;
    }
    let mut i = 1;
    while i < s.len() && (s[i].is_ascii_alphanumeric() || s[i] == b'_') {
        i += 1;
    }
    if s.get(i) == Some(&b'$') {
        Some(i + 1)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_unquoted_semicolons() {
        let stmts = split_statements("SELECT 1; SELECT 2;");
        assert_eq!(stmts, vec!["SELECT 1", "SELECT 2"]);
    }

    #[test]
    fn string_literal_semicolon_is_not_a_split_point() {
        let stmts = split_statements("INSERT INTO t VALUES (';');");
        assert_eq!(stmts, vec!["INSERT INTO t VALUES (';')"]);
    }

    #[test]
    fn escaped_quote_inside_string_does_not_close_early() {
        let stmts = split_statements("INSERT INTO t VALUES ('it''s'); SELECT 1;");
        assert_eq!(stmts.len(), 2);
    }

    #[test]
    fn line_comment_semicolon_is_ignored() {
        let stmts = split_statements("SELECT 1; -- comment with ; inside\nSELECT 2;");
        assert_eq!(stmts, vec!["SELECT 1", "-- comment with ; inside\nSELECT 2"]);
    }

    #[test]
    fn block_comment_semicolon_is_ignored() {
        let stmts = split_statements("SELECT 1; /* a ; b */ SELECT 2;");
        assert_eq!(stmts.len(), 2);
    }

    #[test]
    fn backtick_identifier_semicolon_is_ignored() {
        let stmts = split_statements("SELECT * FROM `weird;table`;");
        assert_eq!(stmts, vec!["SELECT * FROM `weird;table`"]);
    }

    #[test]
    fn dollar_quoted_function_body_is_one_statement() {
        let sql = "CREATE FUNCTION f() RETURNS int LANGUAGE sql AS $$ SELECT 1; SELECT 2; $$;";
        let stmts = split_statements(sql);
        assert_eq!(stmts.len(), 1);
    }

    #[test]
    fn tagged_dollar_quote_is_respected() {
        let sql = "DO $body$ BEGIN RAISE NOTICE 'hi;'; END; $body$;";
        let stmts = split_statements(sql);
        assert_eq!(stmts.len(), 1);
    }

    #[test]
    fn idempotent_up_to_whitespace() {
        let sql = "SELECT 1; SELECT 2; SELECT 3;";
        let first = split_statements(sql);
        let rejoined = first.join(";");
        let second = split_statements(&rejoined);
        assert_eq!(first, second);
    }

    #[test]
    fn empty_statements_are_skipped() {
        let stmts = split_statements("SELECT 1;; ;SELECT 2;");
        assert_eq!(stmts, vec!["SELECT 1", "SELECT 2"]);
    }
}
