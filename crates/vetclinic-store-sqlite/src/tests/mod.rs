//! Tests for `SqliteStore` and for the core services running on it, against
//! an in-memory database.

mod conversations;
mod store;
