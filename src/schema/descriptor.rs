//! Compiled, immutable entity descriptors.

use chrono::{DateTime, Utc};
use serde_json::Value;

/// Closed set of storage kinds. Unknown declared kinds never reach this enum;
/// the resolver rejects them at compile time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageKind {
    Text,
    Number,
    Boolean,
    Date,
    List,
}

impl StorageKind {
    /// Whether a JSON value is acceptable for this kind.
    pub fn accepts(&self, v: &Value) -> bool {
        match self {
            StorageKind::Text | StorageKind::Date => v.is_string(),
            StorageKind::Number => v.is_number(),
            StorageKind::Boolean => v.is_boolean(),
            StorageKind::List => v.is_array(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StorageKind::Text => "text",
            StorageKind::Number => "number",
            StorageKind::Boolean => "boolean",
            StorageKind::Date => "date",
            StorageKind::List => "list",
        }
    }
}

/// Resolved default for a field.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldDefault {
    Literal(Value),
    /// Current timestamp at create time. Only valid for date fields.
    Now,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub storage: StorageKind,
    pub required: bool,
    pub unique: bool,
    pub default: Option<FieldDefault>,
}

/// Compiled entity. Immutable: a schema update produces a fresh descriptor and
/// never mutates one that requests may still hold.
#[derive(Clone, Debug)]
pub struct EntityDescriptor {
    /// Declared entity name, as written in the schema document.
    pub entity: String,
    /// Canonical model name: entity name with the first character upper-cased.
    pub model: String,
    pub route: String,
    /// Fields in a stable, name-sorted order.
    pub fields: Vec<FieldDescriptor>,
    pub compiled_at: DateTime<Utc>,
}

impl EntityDescriptor {
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Names of text-kind fields, the only ones searched by `list`.
    pub fn text_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|f| f.storage == StorageKind::Text)
            .map(|f| f.name.as_str())
    }
}

/// First character upper-cased, rest untouched.
pub fn canonical_model_name(entity: &str) -> String {
    let mut chars = entity.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_name_upcases_first_char_only() {
        assert_eq!(canonical_model_name("items"), "Items");
        assert_eq!(canonical_model_name("Items"), "Items");
        assert_eq!(canonical_model_name("orderLines"), "OrderLines");
        assert_eq!(canonical_model_name(""), "");
    }

    #[test]
    fn accepts_checks_json_type_per_kind() {
        assert!(StorageKind::Text.accepts(&Value::String("x".into())));
        assert!(!StorageKind::Text.accepts(&serde_json::json!(1)));
        assert!(StorageKind::Number.accepts(&serde_json::json!(1.5)));
        assert!(StorageKind::Boolean.accepts(&serde_json::json!(true)));
        assert!(StorageKind::List.accepts(&serde_json::json!([1, 2])));
        assert!(!StorageKind::List.accepts(&serde_json::json!({})));
    }
}
