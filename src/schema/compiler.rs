//! Entity descriptor compilation: validate configs, resolve fields, detect
//! document-level collisions.

use crate::error::SchemaError;
use crate::schema::descriptor::{canonical_model_name, EntityDescriptor};
use crate::schema::resolver::resolve_field;
use crate::schema::types::{EntityConfig, SchemaDocument};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;

/// Compile one entity. Fail-fast: the first invalid field aborts compilation,
/// no partial descriptor escapes.
pub fn compile_entity(entity: &str, config: &EntityConfig) -> Result<EntityDescriptor, SchemaError> {
    if entity.is_empty() {
        return Err(SchemaError::InvalidEntityConfig {
            entity: entity.to_string(),
            reason: "entity name must not be empty".into(),
        });
    }
    if config.route.is_empty() {
        return Err(SchemaError::InvalidEntityConfig {
            entity: entity.to_string(),
            reason: "route must not be empty".into(),
        });
    }
    if !config.route.starts_with('/') {
        return Err(SchemaError::InvalidEntityConfig {
            entity: entity.to_string(),
            reason: format!("route '{}' must begin with '/'", config.route),
        });
    }
    if config.fields.is_empty() {
        return Err(SchemaError::InvalidEntityConfig {
            entity: entity.to_string(),
            reason: "at least one field is required".into(),
        });
    }

    let mut fields = Vec::with_capacity(config.fields.len());
    for (name, spec) in &config.fields {
        fields.push(resolve_field(entity, name, spec)?);
    }

    Ok(EntityDescriptor {
        entity: entity.to_string(),
        model: canonical_model_name(entity),
        route: config.route.clone(),
        fields,
        compiled_at: Utc::now(),
    })
}

/// Compile a whole document. Rejects duplicate route prefixes and entity names
/// whose canonical model names collide; a collision must surface instead of
/// letting a later entity evict an earlier model.
pub fn compile_document(doc: &SchemaDocument) -> Result<Vec<Arc<EntityDescriptor>>, SchemaError> {
    let mut by_model: HashMap<String, &str> = HashMap::new();
    let mut by_route: HashMap<&str, &str> = HashMap::new();
    let mut descriptors = Vec::with_capacity(doc.len());

    for (entity, config) in doc {
        let descriptor = compile_entity(entity, config)?;
        if let Some(first) = by_model.insert(descriptor.model.clone(), entity.as_str()) {
            return Err(SchemaError::ModelNameCollision {
                model: descriptor.model,
                first: first.to_string(),
                second: entity.clone(),
            });
        }
        if let Some(first) = by_route.insert(config.route.as_str(), entity.as_str()) {
            return Err(SchemaError::InvalidEntityConfig {
                entity: entity.clone(),
                reason: format!("route '{}' is already used by entity '{}'", config.route, first),
            });
        }
        descriptors.push(Arc::new(descriptor));
    }

    Ok(descriptors)
}
