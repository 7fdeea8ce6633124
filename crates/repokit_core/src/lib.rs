//! Generic repository layer over SQLite.
//!
//! A `Repository` wraps one model type and exposes CRUD, filtering,
//! pagination and deferred query composition (scopes and criteria). Every
//! terminal call resets the repository to a clean state.

pub mod config;
pub mod container;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod query;
pub mod repo;
pub mod store;

pub use config::{ConfigError, RepositoryConfig};
pub use container::{provision_criteria, provision_model, Container, Instance};
pub use db::{open_db, open_db_in_memory, DbError, Migration};
pub use error::{NotFoundError, ProvisioningError, RepoError, RepoResult, RepositoryError};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::{
    Attributes, HandleOutcome, KeyType, MassAssignment, MethodContext, Model, ModelMethod, Record,
    Relation, RelationKind,
};
pub use query::{Boolean, Columns, Direction, EntityHandle, HandleMethod, Operator, QueryBuilder};
pub use repo::{
    Criteria, CriteriaDescriptor, DeleteTarget, Paginated, Repository, RepositoryDefinition,
    RepositoryState, Scope, ScopeSummary,
};
pub use store::{EntityStore, SqliteStore};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
