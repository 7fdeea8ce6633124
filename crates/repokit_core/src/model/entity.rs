//! Entity capability contract.
//!
//! # Responsibility
//! - Describe how one persisted entity type maps onto storage.
//! - Enumerate the relations and named methods a repository may reach
//!   through the entity, instead of resolving them dynamically.
//!
//! # Invariants
//! - `table` and every column named here must be plain SQL identifiers.
//! - An empty `fillable` list means guarded writes assign nothing.

use crate::error::RepoResult;
use crate::model::record::Record;
use crate::query::builder::QueryBuilder;
use crate::store::EntityStore;
use rusqlite::types::Value;

/// How primary key values are produced on insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyType {
    /// SQLite rowid alias, assigned by storage.
    #[default]
    Integer,
    /// Random v4 UUID text, assigned on create when the caller omits it.
    Uuid,
}

/// Whether bulk attribute writes respect the model's `fillable` whitelist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MassAssignment {
    /// Drop attributes missing from `Model::fillable`.
    #[default]
    Guarded,
    /// Write every provided attribute.
    Forced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    HasMany,
    HasOne,
    BelongsTo,
}

/// Eager-loadable association between two models.
///
/// For `HasMany`/`HasOne`, `foreign_key` lives on the related table and
/// points at `local_key` on this one. For `BelongsTo`, `foreign_key` lives on
/// this table and points at `local_key` on the related one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub name: &'static str,
    pub kind: RelationKind,
    /// Container binding id of the related model.
    pub related: &'static str,
    pub foreign_key: &'static str,
    pub local_key: &'static str,
}

impl Relation {
    pub fn has_many(
        name: &'static str,
        related: &'static str,
        foreign_key: &'static str,
    ) -> Self {
        Self {
            name,
            kind: RelationKind::HasMany,
            related,
            foreign_key,
            local_key: "id",
        }
    }

    pub fn has_one(name: &'static str, related: &'static str, foreign_key: &'static str) -> Self {
        Self {
            kind: RelationKind::HasOne,
            ..Self::has_many(name, related, foreign_key)
        }
    }

    pub fn belongs_to(
        name: &'static str,
        related: &'static str,
        foreign_key: &'static str,
    ) -> Self {
        Self {
            kind: RelationKind::BelongsTo,
            ..Self::has_many(name, related, foreign_key)
        }
    }
}

/// Inputs available to a model method besides the live query.
pub struct MethodContext<'a> {
    pub store: &'a dyn EntityStore,
    pub args: &'a [Value],
}

/// What a model method or forwarded builder call hands back.
#[derive(Debug, Clone)]
pub enum HandleOutcome {
    /// A further narrowed query; the repository adopts it.
    Chain(QueryBuilder),
    /// Already materialized rows; adoptable by scopes only.
    Resolved(Vec<Record>),
    /// A plain value, never adoptable as a handle.
    Value(Value),
}

/// Named capability a model exposes to scopes and forwarded calls.
pub type ModelMethod = fn(&MethodContext<'_>, QueryBuilder) -> RepoResult<HandleOutcome>;

/// Capability contract every persisted entity type satisfies.
pub trait Model: Send + Sync {
    fn table(&self) -> &str;

    fn primary_key(&self) -> &str {
        "id"
    }

    fn key_type(&self) -> KeyType {
        KeyType::Integer
    }

    /// Columns writable through guarded mass assignment.
    fn fillable(&self) -> &[&str] {
        &[]
    }

    /// Whether `created_at`/`updated_at` epoch-ms columns are maintained.
    fn uses_timestamps(&self) -> bool {
        false
    }

    fn relation(&self, _name: &str) -> Option<Relation> {
        None
    }

    fn method(&self, _name: &str) -> Option<ModelMethod> {
        None
    }
}
