//! Raw schema document types matching the JSON wire shape.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Top-level schema document: entity name (case-sensitive, unique) to its
/// configuration. BTreeMap keeps compilation order deterministic.
pub type SchemaDocument = BTreeMap<String, EntityConfig>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityConfig {
    /// Route prefix for the generated endpoints. Must begin with '/'.
    pub route: String,
    /// Field name to spec. JSON object keys make names unique by construction.
    pub fields: BTreeMap<String, FieldSpec>,
}

/// One declared field. `kind` stays a raw string here; the resolver maps it to
/// a closed [`crate::schema::StorageKind`] and rejects anything unrecognized.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub kind: String,
    // Falsy flags are omitted on output so an accepted document reads back
    // structurally equal to what was submitted.
    #[serde(default, skip_serializing_if = "is_false")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub unique: bool,
    /// Literal default, or the string "now" (valid only for kind=date).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

fn is_false(v: &bool) -> bool {
    !v
}
