//! Field type resolution: declared kind string to storage kind + constraints.

use crate::error::SchemaError;
use crate::schema::descriptor::{FieldDefault, FieldDescriptor, StorageKind};
use crate::schema::types::FieldSpec;
use serde_json::Value;

/// Resolve one declared field. Unknown kinds are rejected, never defaulted.
pub fn resolve_field(entity: &str, name: &str, spec: &FieldSpec) -> Result<FieldDescriptor, SchemaError> {
    let storage = match spec.kind.as_str() {
        "text" => StorageKind::Text,
        "number" => StorageKind::Number,
        "boolean" => StorageKind::Boolean,
        "date" => StorageKind::Date,
        "list" => StorageKind::List,
        other => {
            return Err(SchemaError::InvalidFieldKind {
                entity: entity.to_string(),
                field: name.to_string(),
                kind: other.to_string(),
            })
        }
    };

    let default = match &spec.default {
        None => None,
        Some(Value::String(s)) if s == "now" => {
            if storage != StorageKind::Date {
                return Err(SchemaError::InvalidDefault {
                    entity: entity.to_string(),
                    field: name.to_string(),
                    reason: format!("default \"now\" is only valid for date fields, not {}", storage.name()),
                });
            }
            Some(FieldDefault::Now)
        }
        Some(v) => {
            if !storage.accepts(v) {
                return Err(SchemaError::InvalidDefault {
                    entity: entity.to_string(),
                    field: name.to_string(),
                    reason: format!("default value does not match declared kind {}", storage.name()),
                });
            }
            Some(FieldDefault::Literal(v.clone()))
        }
    };

    Ok(FieldDescriptor {
        name: name.to_string(),
        storage,
        required: spec.required,
        unique: spec.unique,
        default,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(kind: &str, default: Option<Value>) -> FieldSpec {
        FieldSpec {
            kind: kind.into(),
            required: false,
            unique: false,
            default,
        }
    }

    #[test]
    fn resolves_all_five_kinds() {
        for (kind, storage) in [
            ("text", StorageKind::Text),
            ("number", StorageKind::Number),
            ("boolean", StorageKind::Boolean),
            ("date", StorageKind::Date),
            ("list", StorageKind::List),
        ] {
            let f = resolve_field("items", "f", &spec(kind, None)).unwrap();
            assert_eq!(f.storage, storage);
        }
    }

    #[test]
    fn unknown_kind_is_a_hard_error() {
        let err = resolve_field("items", "f", &spec("String", None)).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidFieldKind { ref kind, .. } if kind == "String"));
    }

    #[test]
    fn now_default_valid_only_for_date() {
        let f = resolve_field("items", "when", &spec("date", Some("now".into()))).unwrap();
        assert_eq!(f.default, Some(FieldDefault::Now));

        let err = resolve_field("items", "name", &spec("text", Some("now".into()))).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidDefault { .. }));
    }

    #[test]
    fn literal_default_must_match_kind() {
        let err = resolve_field("items", "stock", &spec("number", Some("ten".into()))).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidDefault { .. }));

        let f = resolve_field("items", "stock", &spec("number", Some(serde_json::json!(10)))).unwrap();
        assert_eq!(f.default, Some(FieldDefault::Literal(serde_json::json!(10))));
    }

    #[test]
    fn carries_constraint_flags() {
        let f = resolve_field(
            "items",
            "sku",
            &FieldSpec {
                kind: "text".into(),
                required: true,
                unique: true,
                default: None,
            },
        )
        .unwrap();
        assert!(f.required);
        assert!(f.unique);
    }
}
