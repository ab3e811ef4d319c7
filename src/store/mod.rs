//! Persistence layer: the delivery tracker table on libSQL.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::{Database, EmailStatus, TrackedEmail};
