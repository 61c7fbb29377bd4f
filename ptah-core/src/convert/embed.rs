//! Embedded-field expansion: turns `EmbeddedField` directives into concrete
//! `Field`s on the host struct, recursively for `inline` mode.

use crate::error::ValidationWarning;
use crate::model::{Database, EmbedMode, EmbeddedField, Field};

/// Expand every embedded field declared on `struct_id`, returning the
/// concrete fields it contributes plus any warnings raised along the way
/// (e.g. an unrecognised mode, or a `relation` directive missing its
/// `field`/`ref`).
pub fn expand_embedded_fields(
    db: &Database,
    struct_id: &str,
) -> (Vec<Field>, Vec<ValidationWarning>) {
    let mut out = Vec::new();
    let mut warnings = Vec::new();
    for embedded in db.embedded_fields_of(struct_id) {
        expand_one(db, struct_id, embedded, "", &mut out, &mut warnings);
    }
    (out, warnings)
}

fn expand_one(
    db: &Database,
    host_struct_id: &str,
    embedded: &EmbeddedField,
    inherited_prefix: &str,
    out: &mut Vec<Field>,
    warnings: &mut Vec<ValidationWarning>,
) {
    // A missing `mode` defaults to inline without a warning; an explicit
    // but unrecognised mode string also behaves as inline, but is worth
    // telling the caller about.
    let mode = match &embedded.mode {
        None => EmbedMode::Inline,
        Some(EmbedMode::Unknown(raw)) => {
            warnings.push(ValidationWarning(format!(
                "embedded field '{host_struct_id}.{}' has unrecognised mode '{raw}'; treating as inline",
                embedded.embedded_type_id
            )));
            EmbedMode::Inline
        }
        Some(m) => m.clone(),
    };

    match mode {
        EmbedMode::Skip => {}
        EmbedMode::Unknown(_) => unreachable!("resolved above"),
        EmbedMode::Inline => {
            let prefix = format!(
                "{inherited_prefix}{}",
                embedded.prefix.as_deref().unwrap_or("")
            );
            for field in db.fields_of(&embedded.embedded_type_id) {
                let mut field = field.clone();
                field.struct_id = host_struct_id.to_string();
                field.name = format!("{prefix}{}", field.name);
                out.push(field);
            }
            // Recurse into any embedded fields the embedded type itself has.
            for nested in db.embedded_fields_of(&embedded.embedded_type_id) {
                expand_one(db, host_struct_id, nested, &prefix, out, warnings);
            }
        }
        EmbedMode::Json => {
            let name = embedded
                .name
                .clone()
                .unwrap_or_else(|| format!("{}_data", embedded.embedded_type_id.to_lowercase()));
            let r#type = embedded.r#type.clone().unwrap_or_else(|| "JSONB".to_string());
            let mut field = Field::new(host_struct_id, name, r#type);
            field.nullable = embedded.nullable;
            field.comment = embedded.comment.clone();
            field.overrides = embedded.overrides.clone();
            out.push(field);
        }
        EmbedMode::Relation => {
            let (Some(field_name), Some(reference)) = (&embedded.field, &embedded.r#ref) else {
                return;
            };
            let upper = reference.to_uppercase();
            let r#type = if upper.contains("UUID") || upper.contains("VARCHAR") || upper.contains("TEXT") {
                "VARCHAR(36)".to_string()
            } else {
                "INTEGER".to_string()
            };
            let mut field = Field::new(host_struct_id, field_name.clone(), r#type);
            field.nullable = embedded.nullable;
            field.comment = embedded.comment.clone();
            field.foreign = Some(reference.clone());
            field.foreign_key_name = Some(format!("fk_{host_struct_id}_{field_name}"));
            field.overrides = embedded.overrides.clone();
            out.push(field);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Table;

    fn struct_field(struct_id: &str, name: &str, ty: &str) -> Field {
        Field::new(struct_id, name, ty)
    }

    #[test]
    fn inline_prefixes_columns_and_recurses() {
        let mut db = Database::default();
        db.tables.push(Table { struct_id: "Post".into(), name: "posts".into(), ..Default::default() });
        db.fields.push(struct_field("Address", "street", "TEXT"));
        db.fields.push(struct_field("Author", "name", "TEXT"));
        db.embedded_fields.push(EmbeddedField {
            struct_id: "Author".into(),
            embedded_type_id: "Address".into(),
            mode: Some(EmbedMode::Inline),
            prefix: Some("addr_".into()),
            ..Default::default()
        });
        db.embedded_fields.push(EmbeddedField {
            struct_id: "Post".into(),
            embedded_type_id: "Author".into(),
            mode: Some(EmbedMode::Inline),
            prefix: Some("author_".into()),
            ..Default::default()
        });

        let (fields, warnings) = expand_embedded_fields(&db, "Post");
        assert!(warnings.is_empty());
        let names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
        assert!(names.contains(&"author_name"));
        assert!(names.contains(&"author_addr_street"));
    }

    #[test]
    fn json_mode_defaults_name_and_type() {
        let mut db = Database::default();
        db.embedded_fields.push(EmbeddedField {
            struct_id: "Post".into(),
            embedded_type_id: "Metadata".into(),
            mode: Some(EmbedMode::Json),
            nullable: true,
            ..Default::default()
        });
        let (fields, _) = expand_embedded_fields(&db, "Post");
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].name, "metadata_data");
        assert_eq!(fields[0].r#type, "JSONB");
    }

    #[test]
    fn relation_mode_infers_varchar_for_uuid_ref() {
        let mut db = Database::default();
        db.embedded_fields.push(EmbeddedField {
            struct_id: "Post".into(),
            embedded_type_id: "Author".into(),
            mode: Some(EmbedMode::Relation),
            field: Some("author_id".into()),
            r#ref: Some("authors(uuid)".into()),
            ..Default::default()
        });
        let (fields, _) = expand_embedded_fields(&db, "Post");
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].r#type, "VARCHAR(36)");
        assert_eq!(fields[0].foreign_key_name.as_deref(), Some("fk_Post_author_id"));
    }

    #[test]
    fn relation_mode_infers_integer_by_default() {
        let mut db = Database::default();
        db.embedded_fields.push(EmbeddedField {
            struct_id: "Post".into(),
            embedded_type_id: "Author".into(),
            mode: Some(EmbedMode::Relation),
            field: Some("author_id".into()),
            r#ref: Some("authors".into()),
            ..Default::default()
        });
        let (fields, _) = expand_embedded_fields(&db, "Post");
        assert_eq!(fields[0].r#type, "INTEGER");
    }

    #[test]
    fn relation_mode_skips_silently_without_field_or_ref() {
        let mut db = Database::default();
        db.embedded_fields.push(EmbeddedField {
            struct_id: "Post".into(),
            embedded_type_id: "Author".into(),
            mode: Some(EmbedMode::Relation),
            ..Default::default()
        });
        let (fields, warnings) = expand_embedded_fields(&db, "Post");
        assert!(fields.is_empty());
        assert!(warnings.is_empty());
    }

    #[test]
    fn missing_mode_defaults_to_inline_without_a_warning() {
        let mut db = Database::default();
        db.fields.push(struct_field("Address", "street", "TEXT"));
        db.embedded_fields.push(EmbeddedField {
            struct_id: "Post".into(),
            embedded_type_id: "Address".into(),
            mode: None,
            ..Default::default()
        });
        let (fields, warnings) = expand_embedded_fields(&db, "Post");
        assert!(warnings.is_empty());
        assert_eq!(fields[0].name, "street");
    }

    #[test]
    fn unrecognised_mode_string_behaves_as_inline_with_a_warning() {
        let mut db = Database::default();
        db.fields.push(struct_field("Address", "street", "TEXT"));
        db.embedded_fields.push(EmbeddedField {
            struct_id: "Post".into(),
            embedded_type_id: "Address".into(),
            mode: Some(EmbedMode::Unknown("eager".into())),
            ..Default::default()
        });
        let (fields, warnings) = expand_embedded_fields(&db, "Post");
        assert_eq!(fields[0].name, "street");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].0.contains("eager"));
    }

    #[test]
    fn skip_mode_emits_nothing() {
        let mut db = Database::default();
        db.embedded_fields.push(EmbeddedField {
            struct_id: "Post".into(),
            embedded_type_id: "Author".into(),
            mode: Some(EmbedMode::Skip),
            ..Default::default()
        });
        let (fields, _) = expand_embedded_fields(&db, "Post");
        assert!(fields.is_empty());
    }
}
