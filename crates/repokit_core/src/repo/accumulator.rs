//! Pending scopes and criteria queued before a terminal call.
//!
//! # Invariants
//! - Both queues are FIFO; draining yields insertion order.
//! - Nothing here applies anything; `Repository` drains during apply.

use crate::error::RepoResult;
use crate::query::Boolean;
use crate::repo::criteria::CriteriaDescriptor;
use crate::repo::repository::Repository;
use std::collections::VecDeque;
use std::fmt::{Debug, Formatter};

/// Scope body receiving the live repository.
pub type ScopeFn = dyn for<'r> FnOnce(&mut Repository<'r>) -> RepoResult<()>;

pub enum ScopeAction {
    Closure(Box<ScopeFn>),
    /// Name of a builder method or model method, invoked without args.
    Named(String),
}

/// A queued scope plus how its predicates join the ones before it.
pub struct Scope {
    pub action: ScopeAction,
    pub mode: Boolean,
}

impl Scope {
    pub fn closure<F>(body: F) -> Self
    where
        F: for<'r> FnOnce(&mut Repository<'r>) -> RepoResult<()> + 'static,
    {
        Self {
            action: ScopeAction::Closure(Box::new(body)),
            mode: Boolean::And,
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            action: ScopeAction::Named(name.into()),
            mode: Boolean::And,
        }
    }

    /// Joins this scope's predicates with `OR` instead of `AND`.
    pub fn or(mut self) -> Self {
        self.mode = Boolean::Or;
        self
    }

    pub fn summary(&self) -> ScopeSummary {
        ScopeSummary {
            name: match &self.action {
                ScopeAction::Closure(_) => None,
                ScopeAction::Named(name) => Some(name.clone()),
            },
            mode: self.mode,
        }
    }
}

impl Debug for Scope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("name", &self.summary().name)
            .field("mode", &self.mode)
            .finish()
    }
}

impl From<&str> for Scope {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}

/// Read-only view of a queued scope. Closures have no name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeSummary {
    pub name: Option<String>,
    pub mode: Boolean,
}

#[derive(Debug, Default)]
pub(crate) struct Accumulator {
    scopes: VecDeque<Scope>,
    criteria: VecDeque<CriteriaDescriptor>,
}

impl Accumulator {
    pub(crate) fn add_scope(&mut self, scope: Scope) {
        self.scopes.push_back(scope);
    }

    pub(crate) fn add_criteria(&mut self, descriptor: CriteriaDescriptor) {
        self.criteria.push_back(descriptor);
    }

    pub(crate) fn next_scope(&mut self) -> Option<Scope> {
        self.scopes.pop_front()
    }

    pub(crate) fn next_criteria(&mut self) -> Option<CriteriaDescriptor> {
        self.criteria.pop_front()
    }

    pub(crate) fn list_scopes(&self) -> Vec<ScopeSummary> {
        self.scopes.iter().map(Scope::summary).collect()
    }

    pub(crate) fn list_criteria(&self) -> Vec<CriteriaDescriptor> {
        self.criteria.iter().cloned().collect()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.scopes.is_empty() && self.criteria.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.scopes.clear();
        self.criteria.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::{Accumulator, Scope, ScopeSummary};
    use crate::query::Boolean;
    use crate::repo::criteria::CriteriaDescriptor;
    use rusqlite::types::Value;

    #[test]
    fn queues_drain_in_insertion_order() {
        let mut accumulator = Accumulator::default();
        accumulator.add_scope(Scope::named("first"));
        accumulator.add_scope(Scope::closure(|_| Ok(())).or());
        accumulator.add_scope(Scope::from("third"));

        assert_eq!(
            accumulator.list_scopes(),
            vec![
                ScopeSummary {
                    name: Some("first".to_string()),
                    mode: Boolean::And,
                },
                ScopeSummary {
                    name: None,
                    mode: Boolean::Or,
                },
                ScopeSummary {
                    name: Some("third".to_string()),
                    mode: Boolean::And,
                },
            ]
        );

        let drained: Vec<_> = std::iter::from_fn(|| accumulator.next_scope())
            .map(|scope| scope.summary().name)
            .collect();
        assert_eq!(
            drained,
            vec![Some("first".to_string()), None, Some("third".to_string())]
        );
    }

    #[test]
    fn clear_empties_both_queues() {
        let mut accumulator = Accumulator::default();
        accumulator.add_scope(Scope::named("active"));
        accumulator.add_criteria(CriteriaDescriptor::new("min_age", vec![Value::Integer(3)]));
        assert!(!accumulator.is_empty());

        accumulator.clear();
        assert!(accumulator.is_empty());
        assert!(accumulator.list_criteria().is_empty());
    }
}
