//! Request handlers: dynamic entity CRUD and schema management.

pub mod entity;
pub mod schema;
