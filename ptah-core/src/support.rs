//! Small cross-cutting helpers shared by the converter, renderer, and
//! runner: identifier validation and ledger timestamp formatting.

use chrono::{DateTime, Utc};

use crate::error::{PtahError, Result};

/// Validate that a SQL identifier contains only safe characters, as
/// defense-in-depth on top of dialect-aware quoting. Rejects anything
/// outside `[a-zA-Z0-9_]` before it is interpolated into generated SQL
/// text outside of the quoted-identifier path.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(PtahError::ParseError("identifier cannot be empty".to_string()));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(PtahError::ParseError(format!(
            "identifier '{name}' contains invalid characters; only [a-zA-Z0-9_] are allowed"
        )));
    }
    Ok(())
}

/// Format a timestamp as the ledger's `'YYYY-MM-DD HH:MM:SS'` literal,
/// identical across all three dialects.
pub fn format_timestamp_literal(ts: DateTime<Utc>) -> String {
    format!("'{}'", ts.format("%Y-%m-%d %H:%M:%S"))
}

/// snake_case a migration name for use in generated filenames: lowercase,
/// non-alphanumeric runs collapsed to a single underscore, trimmed.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_was_sep = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_was_sep = false;
        } else if !last_was_sep && !slug.is_empty() {
            slug.push('_');
            last_was_sep = true;
        }
    }
    while slug.ends_with('_') {
        slug.pop();
    }
    slug
}

/// Reverse of `slugify`'s intent for display: underscores to spaces, title-cased.
pub fn title_case_slug(slug: &str) -> String {
    slug.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_identifier_rejects_punctuation() {
        assert!(validate_identifier("users").is_ok());
        assert!(validate_identifier("users;drop").is_err());
        assert!(validate_identifier("").is_err());
    }

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("Add Users Table!!"), "add_users_table");
        assert_eq!(slugify("  leading space"), "leading_space");
    }

    #[test]
    fn title_case_slug_round_trips_display_form() {
        assert_eq!(title_case_slug("add_users_table"), "Add Users Table");
    }
}
