//! List query semantics shared by both backends: case-insensitive substring
//! search over text fields, stable sort with id tiebreak, 1-based pagination.

use crate::schema::EntityDescriptor;
use crate::store::StoredRecord;
use serde_json::Value;
use std::cmp::Ordering;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Normalized list parameters. `page` is 1-based; both page and limit are
/// already clamped to >= 1 by the caller.
#[derive(Clone, Debug)]
pub struct ListQuery {
    pub page: u32,
    pub limit: u32,
    pub search: Option<String>,
    pub sort: SortKey,
    pub order: SortOrder,
}

impl ListQuery {
    pub fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.limit as u64
    }
}

/// What to sort by. `Field` names a declared field; unknown names are
/// normalized away before a query reaches a backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SortKey {
    /// Creation order, most recent first unless the caller flips the order.
    CreatedAt,
    UpdatedAt,
    Id,
    Field(String),
}

/// Map a raw `sortBy` value onto a sort key. Unknown fields fall back to the
/// default creation order so both backends agree on the result.
pub fn resolve_sort(descriptor: &EntityDescriptor, sort_by: Option<&str>) -> (SortKey, Option<SortOrder>) {
    match sort_by {
        None | Some("") => (SortKey::CreatedAt, Some(SortOrder::Desc)),
        Some("createdAt") => (SortKey::CreatedAt, None),
        Some("updatedAt") => (SortKey::UpdatedAt, None),
        Some("id") => (SortKey::Id, None),
        Some(f) if descriptor.field(f).is_some() => (SortKey::Field(f.to_string()), None),
        Some(other) => {
            tracing::debug!(field = other, "ignoring unknown sort field");
            (SortKey::CreatedAt, Some(SortOrder::Desc))
        }
    }
}

/// Whether a record matches a search term: case-insensitive substring match
/// against any text-kind field. Other kinds are excluded from search.
pub fn matches_search(record: &StoredRecord, descriptor: &EntityDescriptor, term_lower: &str) -> bool {
    descriptor.text_fields().any(|name| {
        record
            .fields
            .get(name)
            .and_then(Value::as_str)
            .map(|s| s.to_lowercase().contains(term_lower))
            .unwrap_or(false)
    })
}

/// Apply search, sort, and pagination in memory. Returns the page plus the
/// total matching count before pagination. Out-of-range pages yield an empty
/// list with the total still accurate.
pub fn filter_sort_page(
    mut records: Vec<StoredRecord>,
    descriptor: &EntityDescriptor,
    query: &ListQuery,
) -> (Vec<StoredRecord>, u64) {
    if let Some(term) = query.search.as_deref().filter(|t| !t.is_empty()) {
        let term_lower = term.to_lowercase();
        records.retain(|r| matches_search(r, descriptor, &term_lower));
    }
    let total = records.len() as u64;

    records.sort_by(|a, b| {
        let ord = match &query.sort {
            SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
            SortKey::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            SortKey::Id => a.id.cmp(&b.id),
            SortKey::Field(f) => compare_json(
                a.fields.get(f).unwrap_or(&Value::Null),
                b.fields.get(f).unwrap_or(&Value::Null),
            ),
        };
        let ord = match query.order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        };
        // Deterministic pagination: ties always break by id ascending.
        ord.then_with(|| a.id.cmp(&b.id))
    });

    let start = query.offset().min(records.len() as u64) as usize;
    let end = (start + query.limit as usize).min(records.len());
    (records[start..end].to_vec(), total)
}

/// Total order over JSON values, mirroring PostgreSQL's jsonb ordering
/// (null < string < number < boolean < array < object) so the two backends
/// paginate identically.
pub fn compare_json(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::String(_) => 1,
            Value::Number(_) => 2,
            Value::Bool(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }
    match (a, b) {
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ if rank(a) == rank(b) => a.to_string().cmp(&b.to_string()),
        _ => rank(a).cmp(&rank(b)),
    }
}
