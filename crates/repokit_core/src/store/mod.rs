//! Persistence collaborator contract.
//!
//! # Responsibility
//! - Execute composed queries and row writes for the repository layer.
//! - Keep SQL generation out of the repository core.
//!
//! # Invariants
//! - Stores never apply scopes or criteria; they run exactly what they get.

mod sqlite;

use crate::error::RepoResult;
use crate::model::{Attributes, Record};
use crate::query::{Columns, QueryBuilder};
use rusqlite::types::Value;

pub use sqlite::{compile_select, SqliteStore};

/// Storage operations a repository delegates to.
pub trait EntityStore {
    /// Returns rows matching `query`, in query order.
    fn select(&self, query: &QueryBuilder, columns: &Columns) -> RepoResult<Vec<Record>>;

    /// Counts rows matching `query`, ignoring ordering and window.
    fn count(&self, query: &QueryBuilder) -> RepoResult<u64>;

    fn exists(&self, query: &QueryBuilder) -> RepoResult<bool>;

    /// Inserts one row and returns its primary key value.
    fn insert(&self, table: &str, primary_key: &str, attributes: &Attributes) -> RepoResult<Value>;

    /// Updates one row by key and returns the number of changed rows.
    fn update(
        &self,
        table: &str,
        primary_key: &str,
        key: &Value,
        attributes: &Attributes,
    ) -> RepoResult<usize>;

    /// Deletes rows by key and returns the number removed.
    fn delete(&self, table: &str, primary_key: &str, keys: &[Value]) -> RepoResult<usize>;
}
