//! Query composition: immediate conditions, forwarded calls and the apply
//! phase that drains boot, scopes and criteria.
//!
//! # Invariants
//! - Conditions from one `filter` call are validated before any is pushed.
//! - Boot runs first, then scopes, then criteria. Scopes and criteria queued
//!   during apply run in the same pass.
//! - Predicates added by boot, a scope or a criteria narrow everything built
//!   before them as one unit.

use crate::container::provision_criteria;
use crate::error::{RepoResult, RepositoryError};
use crate::model::{HandleOutcome, MethodContext, Record};
use crate::query::{
    Boolean, Columns, EntityHandle, HandleMethod, Predicate, QueryBuilder, WhereEntry,
};
use crate::repo::accumulator::{Scope, ScopeAction};
use crate::repo::criteria::CriteriaDescriptor;
use crate::repo::eager::eager_load;
use crate::repo::repository::Repository;
use log::debug;
use rusqlite::types::Value;
use std::sync::Arc;

impl<'s> Repository<'s> {
    /// Forwards `method` to the live handle or to a model-declared method.
    ///
    /// # Errors
    /// - `UnknownMethod` when neither exposes `method`.
    /// - `NotChainable` when the capability returns something other than a
    ///   query.
    pub fn call(&mut self, method: &str, args: &[Value]) -> RepoResult<&mut Self> {
        if let Some(builder_method) = HandleMethod::parse(method) {
            self.handle
                .narrow(method, |query| builder_method.invoke(query, args))?;
            return Ok(self);
        }

        let Some(model_method) = self.model.method(method) else {
            return Err(RepositoryError::UnknownMethod {
                method: method.to_string(),
                model: self.model.table().to_string(),
            }
            .into());
        };
        let query = self.handle.query_mut(method)?.clone();
        let context = MethodContext {
            store: self.store,
            args,
        };
        match model_method(&context, query)? {
            HandleOutcome::Chain(query) => {
                self.handle = EntityHandle::Query(query);
                Ok(self)
            }
            HandleOutcome::Resolved(_) | HandleOutcome::Value(_) => {
                Err(RepositoryError::NotChainable {
                    method: method.to_string(),
                    repository: self.definition.name().to_string(),
                }
                .into())
            }
        }
    }

    pub(crate) fn apply_conditions<I>(&mut self, entries: I, boolean: Boolean) -> RepoResult<()>
    where
        I: IntoIterator<Item = WhereEntry>,
    {
        let query = self.handle.query_mut("filter")?;
        let predicates = entries
            .into_iter()
            .map(|entry| entry.into_predicate(boolean))
            .collect::<Result<Vec<Predicate>, RepositoryError>>()?;
        for predicate in predicates {
            query.push(predicate);
        }
        Ok(())
    }

    /// Runs boot, then drains scopes and criteria in queue order.
    pub(crate) fn apply_pending(&mut self) -> RepoResult<()> {
        self.applying = true;
        if self.boot {
            let definition = Arc::clone(&self.definition);
            self.within_group(Boolean::And, |repo| definition.boot(repo))?;
        }

        loop {
            if let Some(scope) = self.pending.next_scope() {
                self.apply_scope(scope)?;
            } else if let Some(descriptor) = self.pending.next_criteria() {
                self.apply_criteria(descriptor)?;
            } else {
                break;
            }
        }
        Ok(())
    }

    fn apply_scope(&mut self, scope: Scope) -> RepoResult<()> {
        self.within_group(scope.mode, |repo| match scope.action {
            ScopeAction::Closure(body) => body(repo),
            ScopeAction::Named(name) => repo.invoke_named(&name),
        })
    }

    /// Runs `body` and joins whatever predicates it added to the existing
    /// ones as a single `boolean` unit.
    fn within_group(
        &mut self,
        boolean: Boolean,
        body: impl FnOnce(&mut Self) -> RepoResult<()>,
    ) -> RepoResult<()> {
        let before = self.handle.as_query().map(QueryBuilder::predicate_count);
        body(self)?;
        if let (Some(before), EntityHandle::Query(query)) = (before, &mut self.handle) {
            query.group_from(before, boolean);
        }
        Ok(())
    }

    /// Resolves a named scope against the builder methods, then the model's.
    fn invoke_named(&mut self, name: &str) -> RepoResult<()> {
        if let Some(builder_method) = HandleMethod::parse(name) {
            self.handle
                .narrow(name, |query| builder_method.invoke(query, &[]))?;
            return Ok(());
        }

        let Some(model_method) = self.model.method(name) else {
            return Err(RepositoryError::UnknownScope {
                scope: name.to_string(),
                model: self.model.table().to_string(),
            }
            .into());
        };
        let query = self.handle.query_mut(name)?.clone();
        let context = MethodContext {
            store: self.store,
            args: &[],
        };
        match model_method(&context, query)? {
            HandleOutcome::Chain(query) => self.handle = EntityHandle::Query(query),
            HandleOutcome::Resolved(rows) => self.handle = EntityHandle::Resolved(rows),
            HandleOutcome::Value(_) => {
                return Err(RepositoryError::NotChainable {
                    method: name.to_string(),
                    repository: self.definition.name().to_string(),
                }
                .into())
            }
        }
        Ok(())
    }

    fn apply_criteria(&mut self, descriptor: CriteriaDescriptor) -> RepoResult<()> {
        debug!(
            "event=criteria_apply module=repo status=start class_id={} args={}",
            descriptor.class_id,
            descriptor.args.len()
        );
        let criteria = provision_criteria(self.container, &descriptor.class_id, &descriptor.args)?;
        self.within_group(Boolean::And, |repo| criteria.apply(repo))
    }

    /// Selects rows for `query` and eager-loads its requested relations.
    pub(crate) fn load(&self, query: &QueryBuilder, columns: &Columns) -> RepoResult<Vec<Record>> {
        let mut records = self.store.select(query, columns)?;
        if !query.eager().is_empty() {
            eager_load(
                self.store,
                self.container,
                self.model.as_ref(),
                &mut records,
                query.eager(),
            )?;
        }
        Ok(records)
    }
}
