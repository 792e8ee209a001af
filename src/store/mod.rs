//! Persistence layer: libSQL-backed storage for sessions, observations,
//! summaries and shared facts.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::*;
