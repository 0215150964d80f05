//! Protean SDK: schema-driven dynamic CRUD backend library.
//!
//! A declarative schema document compiles into typed entity descriptors and a
//! live set of CRUD endpoints, swapped atomically on every schema update.
//! Records live in PostgreSQL when it is reachable and in an in-process
//! fallback store when it is not, behind one query contract.

pub mod error;
pub mod handlers;
pub mod model;
pub mod persist;
pub mod registry;
pub mod response;
pub mod routes;
pub mod schema;
pub mod state;
pub mod store;

pub use error::{AppError, SchemaError};
pub use model::{ModelCache, ModelHandle};
pub use registry::{RouteTable, SchemaRegistry, SubmitOutcome};
pub use routes::app_router;
pub use schema::{compile_document, compile_entity, EntityDescriptor, SchemaDocument};
pub use state::AppState;
pub use store::{DataAccess, MemoryStore, PgStore};
