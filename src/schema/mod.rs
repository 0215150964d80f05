//! Schema document types, field type resolution, and entity compilation.

pub mod compiler;
pub mod descriptor;
pub mod resolver;
pub mod types;

pub use compiler::{compile_document, compile_entity};
pub use descriptor::{EntityDescriptor, FieldDefault, FieldDescriptor, StorageKind};
pub use types::{EntityConfig, FieldSpec, SchemaDocument};
