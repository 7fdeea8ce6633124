//! Entity model contract and row representation.
//!
//! # Responsibility
//! - Define the capability set a persisted entity type must provide.
//! - Define the row/attribute shapes exchanged with entity stores.
//!
//! # Invariants
//! - Every record carries its primary key under `Model::primary_key`.

pub mod entity;
pub mod record;

pub use entity::{
    HandleOutcome, KeyType, MassAssignment, MethodContext, Model, ModelMethod, Relation,
    RelationKind,
};
pub use record::{Attributes, Record};
