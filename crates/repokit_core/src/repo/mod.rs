//! Repository layer: pending scopes/criteria, query composition and the
//! stateful repository core.
//!
//! # Responsibility
//! - Accumulate deferred query logic until a terminal call.
//! - Apply boot, scopes and criteria in a fixed order, then delegate to the
//!   store.
//! - Reset to a clean state after every terminal call.
//!
//! # Invariants
//! - Criteria ids are resolved at apply time, never when queued.
//! - Repository APIs return semantic errors (`NotFound`, `Repository`) in
//!   addition to DB transport errors.

mod accumulator;
mod composer;
mod criteria;
mod eager;
mod repository;

pub use accumulator::{Scope, ScopeAction, ScopeFn, ScopeSummary};
pub use criteria::{Criteria, CriteriaDescriptor};
pub use repository::{
    DeleteTarget, PageResolver, Paginated, Repository, RepositoryDefinition, RepositoryState,
};
