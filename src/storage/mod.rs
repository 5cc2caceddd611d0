//! Storage Layer - the SQLite engine behind every session
//!
//! The engine is consumed as a black box through a small contract:
//! - open an empty database or a serialized image
//! - export the current image
//! - execute SQL text, returning the last result set
//! - stream rows of a query
//!
//! Catalog introspection is issued as plain SQL (see [`schema`]).

pub mod schema;
pub mod sqlite;

pub use sqlite::{Database, ResultSet};
