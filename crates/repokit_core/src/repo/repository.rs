//! Repository core: chaining state, terminal operations and reset.
//!
//! # Responsibility
//! - Bind one model type and expose CRUD, read and pagination operations.
//! - Run boot hook, scopes and criteria before each composed terminal call.
//! - Return to a clean state after every terminal call.
//!
//! # Invariants
//! - After any terminal call, success or failure, pending scopes and criteria
//!   are empty, boot is enabled and the handle is a fresh query.
//! - The handle is never absent; it is either a query or resolved rows.
//! - One repository serves one logical caller at a time. It holds no locks;
//!   concurrent callers use separate instances.

use crate::config::RepositoryConfig;
use crate::container::{provision_model, Container};
use crate::error::{NotFoundError, RepoError, RepoResult};
use crate::model::{Attributes, KeyType, MassAssignment, Model, Record};
use crate::query::{Boolean, Columns, EntityHandle, QueryBuilder, WhereEntry};
use crate::repo::accumulator::{Accumulator, Scope, ScopeSummary};
use crate::repo::criteria::CriteriaDescriptor;
use crate::store::EntityStore;
use log::{debug, error};
use rusqlite::types::Value;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Per-repository definition: which model it serves and its boot hook.
pub trait RepositoryDefinition: Send + Sync {
    /// Name used in misuse errors.
    fn name(&self) -> &str;

    /// Container binding id of the served model.
    fn model(&self) -> &str;

    /// Runs before scopes and criteria on each composed terminal call,
    /// unless disabled with `without_boot`.
    fn boot(&self, _repository: &mut Repository<'_>) -> RepoResult<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryState {
    /// Fresh handle, nothing queued, boot enabled.
    Idle,
    /// Chaining calls have changed something since the last reset.
    Configuring,
    /// Boot, scopes or criteria are being applied.
    Applying,
}

/// Which rows `Repository::delete` removes.
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteTarget {
    /// Bulk delete by key, bypassing scopes.
    Ids(Vec<Value>),
    /// Locate through `find` (fail on missing), then delete.
    Id(Value),
    /// Delete the first row of the composed query, if one is composed.
    FirstMatch,
}

impl From<i64> for DeleteTarget {
    fn from(value: i64) -> Self {
        Self::Id(Value::Integer(value))
    }
}

impl From<String> for DeleteTarget {
    fn from(value: String) -> Self {
        Self::Id(Value::Text(value))
    }
}

impl From<&str> for DeleteTarget {
    fn from(value: &str) -> Self {
        Self::Id(Value::Text(value.to_string()))
    }
}

/// `delete(())` deletes the first composed match.
impl From<()> for DeleteTarget {
    fn from(_: ()) -> Self {
        Self::FirstMatch
    }
}

impl From<Value> for DeleteTarget {
    fn from(value: Value) -> Self {
        Self::Id(value)
    }
}

impl From<Vec<Value>> for DeleteTarget {
    fn from(values: Vec<Value>) -> Self {
        Self::Ids(values)
    }
}

impl From<Vec<i64>> for DeleteTarget {
    fn from(values: Vec<i64>) -> Self {
        Self::Ids(values.into_iter().map(Value::Integer).collect())
    }
}

impl From<Option<Value>> for DeleteTarget {
    fn from(value: Option<Value>) -> Self {
        value.map_or(Self::FirstMatch, Self::Id)
    }
}

/// One page of results plus pagination metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Paginated {
    pub items: Vec<Record>,
    pub total: u64,
    pub per_page: u32,
    pub current_page: u32,
    pub last_page: u32,
    pub page_name: String,
}

impl Paginated {
    pub fn has_more_pages(&self) -> bool {
        self.current_page < self.last_page
    }
}

/// Reads the current page number for a cursor name.
pub type PageResolver = dyn Fn(&str) -> Option<u32> + Send + Sync;

pub struct Repository<'s> {
    pub(crate) store: &'s dyn EntityStore,
    pub(crate) container: &'s Container,
    pub(crate) definition: Arc<dyn RepositoryDefinition>,
    pub(crate) config: RepositoryConfig,
    page_resolver: Option<Arc<PageResolver>>,
    pub(crate) model: Arc<dyn Model>,
    pub(crate) handle: EntityHandle,
    pub(crate) pending: Accumulator,
    pub(crate) boot: bool,
    pub(crate) applying: bool,
}

impl<'s> Repository<'s> {
    /// Builds a repository with default configuration.
    ///
    /// # Errors
    /// - `ProvisioningError` when the definition's model id does not resolve
    ///   to a model.
    pub fn new(
        store: &'s dyn EntityStore,
        container: &'s Container,
        definition: impl RepositoryDefinition + 'static,
    ) -> RepoResult<Self> {
        Self::with_config(store, container, definition, RepositoryConfig::default())
    }

    pub fn with_config(
        store: &'s dyn EntityStore,
        container: &'s Container,
        definition: impl RepositoryDefinition + 'static,
        config: RepositoryConfig,
    ) -> RepoResult<Self> {
        let definition: Arc<dyn RepositoryDefinition> = Arc::new(definition);
        let model = provision_model(container, definition.model())?;
        Ok(Self {
            store,
            container,
            handle: EntityHandle::fresh(model.as_ref()),
            model,
            definition,
            config,
            page_resolver: None,
            pending: Accumulator::default(),
            boot: true,
            applying: false,
        })
    }

    /// Installs the source of current page numbers for `paginate`.
    pub fn set_page_resolver<F>(&mut self, resolver: F)
    where
        F: Fn(&str) -> Option<u32> + Send + Sync + 'static,
    {
        self.page_resolver = Some(Arc::new(resolver));
    }

    pub fn name(&self) -> &str {
        self.definition.name()
    }

    pub fn model(&self) -> &dyn Model {
        self.model.as_ref()
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub fn state(&self) -> RepositoryState {
        if self.applying {
            RepositoryState::Applying
        } else if !self.pending.is_empty() || !self.boot || !self.handle.is_pristine() {
            RepositoryState::Configuring
        } else {
            RepositoryState::Idle
        }
    }

    pub fn handle(&self) -> &EntityHandle {
        &self.handle
    }

    /// Replaces the live handle. Scopes and criteria use this to adopt
    /// a handle they built themselves.
    pub fn set_handle(&mut self, handle: EntityHandle) {
        self.handle = handle;
    }

    /// Borrows the live query for in-place narrowing.
    pub fn query_mut(&mut self, operation: &str) -> RepoResult<&mut QueryBuilder> {
        Ok(self.handle.query_mut(operation)?)
    }

    pub fn boot_enabled(&self) -> bool {
        self.boot
    }

    pub fn list_scopes(&self) -> Vec<ScopeSummary> {
        self.pending.list_scopes()
    }

    pub fn list_criteria(&self) -> Vec<CriteriaDescriptor> {
        self.pending.list_criteria()
    }

    // ----- chaining -----

    /// Narrows the live query now with each entry joined by `boolean`.
    ///
    /// Entries are `(column, value)` for equality or
    /// `(column, operator, value)`. Nothing is applied when any entry is
    /// invalid.
    pub fn filter<I, E>(&mut self, entries: I, boolean: Boolean) -> RepoResult<&mut Self>
    where
        I: IntoIterator<Item = E>,
        E: Into<WhereEntry>,
    {
        self.apply_conditions(entries.into_iter().map(Into::into), boolean)?;
        Ok(self)
    }

    /// Equality shorthand for `filter([(attribute, value)], Boolean::And)`.
    pub fn find_by(&mut self, attribute: &str, value: impl Into<Value>) -> RepoResult<&mut Self> {
        self.filter([(attribute, value.into())], Boolean::And)
    }

    /// Requests eager loading of the named relations.
    pub fn with<I, S>(&mut self, relations: I) -> RepoResult<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.handle
            .narrow("with", |query| Ok(query.with_relations(relations)))?;
        Ok(self)
    }

    /// Random order, limited to `take` rows (config default when `None`).
    pub fn random(&mut self, take: Option<u32>) -> RepoResult<&mut Self> {
        let take = take.unwrap_or(self.config.random_take);
        self.handle
            .narrow("random", |query| Ok(query.in_random_order().take(take)))?;
        Ok(self)
    }

    pub fn scope(&mut self, scope: impl Into<Scope>) -> &mut Self {
        self.pending.add_scope(scope.into());
        self
    }

    pub fn scopes<I>(&mut self, scopes: I) -> &mut Self
    where
        I: IntoIterator<Item = Scope>,
    {
        for scope in scopes {
            self.pending.add_scope(scope);
        }
        self
    }

    /// Queues a criteria class with constructor args; resolved when applied.
    pub fn criteria(&mut self, class_id: impl Into<String>, args: Vec<Value>) -> &mut Self {
        self.pending
            .add_criteria(CriteriaDescriptor::new(class_id, args));
        self
    }

    pub fn with_boot(&mut self) -> &mut Self {
        self.boot = true;
        self
    }

    pub fn without_boot(&mut self) -> &mut Self {
        self.boot = false;
        self
    }

    // ----- terminal reads -----

    /// First row of the composed query.
    ///
    /// # Errors
    /// - `NotFound` when `fail` is set and nothing matches.
    pub fn first(&mut self, columns: &[&str], fail: bool) -> RepoResult<Option<Record>> {
        self.terminal("first", true, |repo| {
            let columns = Columns::from_slice(columns)?;
            let found = repo.fetch_first(&columns)?;
            repo.require(found, fail, None)
        })
    }

    /// Row with primary key `id` within the composed query.
    pub fn find(
        &mut self,
        id: impl Into<Value>,
        columns: &[&str],
        fail: bool,
    ) -> RepoResult<Option<Record>> {
        let id = id.into();
        self.terminal("find", true, |repo| {
            let columns = Columns::from_slice(columns)?;
            let found = repo.fetch_by_key(&id, &columns)?;
            repo.require(found, fail, Some(id))
        })
    }

    /// Every row of the composed query, in query order.
    pub fn get(&mut self, columns: &[&str]) -> RepoResult<Vec<Record>> {
        self.terminal("get", true, |repo| {
            let columns = Columns::from_slice(columns)?;
            repo.fetch_all(&columns)
        })
    }

    pub fn all(&mut self, columns: &[&str]) -> RepoResult<Vec<Record>> {
        self.get(columns)
    }

    pub fn exists(&mut self) -> RepoResult<bool> {
        self.terminal("exists", true, |repo| match &repo.handle {
            EntityHandle::Query(query) => repo.store.exists(query),
            EntityHandle::Resolved(rows) => Ok(!rows.is_empty()),
        })
    }

    /// One page of the composed query.
    ///
    /// `per_page` and `page_name` fall back to configuration; the page number
    /// comes from the page resolver and defaults to 1.
    pub fn paginate(
        &mut self,
        per_page: Option<u32>,
        columns: &[&str],
        page_name: Option<&str>,
    ) -> RepoResult<Paginated> {
        self.terminal("paginate", true, |repo| {
            let columns = Columns::from_slice(columns)?;
            let per_page = repo.config.page_size(per_page);
            let page_name = page_name
                .unwrap_or(repo.config.page_name.as_str())
                .to_string();
            let current_page = repo
                .page_resolver
                .as_ref()
                .and_then(|resolver| resolver(&page_name))
                .unwrap_or(1)
                .max(1);
            let offset = (current_page - 1).saturating_mul(per_page);

            let (items, total) = match &repo.handle {
                EntityHandle::Query(query) => {
                    let total = repo.store.count(&query.unwindowed())?;
                    let page = query.clone().window(per_page, offset);
                    (repo.load(&page, &columns)?, total)
                }
                EntityHandle::Resolved(rows) => {
                    let items = rows
                        .iter()
                        .skip(offset as usize)
                        .take(per_page as usize)
                        .cloned()
                        .map(|record| record.project(columns.as_list()))
                        .collect();
                    (items, rows.len() as u64)
                }
            };

            let last_page = u32::try_from(total.div_ceil(u64::from(per_page)))
                .unwrap_or(u32::MAX)
                .max(1);
            Ok(Paginated {
                items,
                total,
                per_page,
                current_page,
                last_page,
                page_name,
            })
        })
    }

    // ----- terminal writes -----

    /// Inserts one row. Boot, scopes and criteria do not apply.
    pub fn create(
        &mut self,
        attributes: Attributes,
        assignment: MassAssignment,
    ) -> RepoResult<Record> {
        self.terminal("create", false, |repo| {
            let model = Arc::clone(&repo.model);
            let mut attributes = repo.assignable(attributes, assignment);

            if model.uses_timestamps() {
                let now = now_millis();
                for column in ["created_at", "updated_at"] {
                    if !attributes.contains(column) {
                        attributes.insert(column, now);
                    }
                }
            }
            if model.key_type() == KeyType::Uuid && !attributes.contains(model.primary_key()) {
                attributes.insert(model.primary_key(), Uuid::new_v4().to_string());
            }

            let key = repo
                .store
                .insert(model.table(), model.primary_key(), &attributes)?;
            repo.reload(model.as_ref(), key)
        })
    }

    /// Locates `id` through `find` (fail on missing) and writes `attributes`.
    pub fn update(
        &mut self,
        id: impl Into<Value>,
        attributes: Attributes,
        assignment: MassAssignment,
    ) -> RepoResult<Record> {
        let id = id.into();
        self.terminal("update", false, |repo| {
            let existing = repo
                .find(id.clone(), &["*"], true)?
                .ok_or_else(|| NotFoundError::new(repo.model.table(), Some(id.clone())))?;

            let model = Arc::clone(&repo.model);
            let current_key = existing
                .get(model.primary_key())
                .cloned()
                .unwrap_or(id);
            let mut attributes = repo.assignable(attributes, assignment);
            if attributes.is_empty() {
                return Ok(existing);
            }
            if model.uses_timestamps() && !attributes.contains("updated_at") {
                attributes.insert("updated_at", now_millis());
            }

            repo.store.update(
                model.table(),
                model.primary_key(),
                &current_key,
                &attributes,
            )?;
            let key = attributes
                .get(model.primary_key())
                .cloned()
                .unwrap_or(current_key);
            repo.reload(model.as_ref(), key)
        })
    }

    /// Deletes rows and returns how many were removed.
    ///
    /// `FirstMatch` only deletes when something was composed (a narrowed
    /// query or queued scopes/criteria); a fresh repository deletes nothing.
    pub fn delete(&mut self, target: impl Into<DeleteTarget>) -> RepoResult<usize> {
        let target = target.into();
        self.terminal("delete", false, |repo| match target {
            DeleteTarget::Ids(ids) => {
                let model = Arc::clone(&repo.model);
                repo.store.delete(model.table(), model.primary_key(), &ids)
            }
            DeleteTarget::Id(id) => {
                let record = repo
                    .find(id.clone(), &["*"], true)?
                    .ok_or_else(|| NotFoundError::new(repo.model.table(), Some(id.clone())))?;
                repo.delete_record(&record)
            }
            DeleteTarget::FirstMatch => {
                let composed = match &repo.handle {
                    EntityHandle::Query(query) => {
                        !query.is_pristine() || !repo.pending.is_empty()
                    }
                    EntityHandle::Resolved(_) => false,
                };
                if !composed {
                    debug!(
                        "event=repo_delete module=repo status=skipped reason=nothing_composed table={}",
                        repo.model.table()
                    );
                    return Ok(0);
                }
                let record = repo
                    .first(&["*"], true)?
                    .ok_or_else(|| NotFoundError::new(repo.model.table(), None))?;
                repo.delete_record(&record)
            }
        })
    }

    // ----- internals -----

    /// Runs one terminal operation and always resets afterwards.
    fn terminal<T>(
        &mut self,
        operation: &'static str,
        compose: bool,
        body: impl FnOnce(&mut Self) -> RepoResult<T>,
    ) -> RepoResult<T> {
        let started_at = Instant::now();
        let applied = if compose {
            self.apply_pending()
        } else {
            Ok(())
        };
        let result = match applied {
            Ok(()) => body(self),
            Err(err) => Err(err),
        };
        let reset = self.reset();

        let result = match (result, reset) {
            (Err(err), _) => Err(err),
            (Ok(_), Err(err)) => Err(err),
            (Ok(value), Ok(())) => Ok(value),
        };

        match &result {
            Ok(_) => debug!(
                "event=repo_terminal module=repo status=ok op={} table={} duration_ms={}",
                operation,
                self.model.table(),
                started_at.elapsed().as_millis()
            ),
            Err(RepoError::NotFound(_)) => debug!(
                "event=repo_terminal module=repo status=not_found op={} table={} duration_ms={}",
                operation,
                self.model.table(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=repo_terminal module=repo status=error op={} table={} duration_ms={} error={}",
                operation,
                self.model.table(),
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }

    /// Clears queued state and provisions a fresh model and handle.
    fn reset(&mut self) -> RepoResult<()> {
        self.pending.clear();
        self.boot = true;
        self.applying = false;
        self.handle = EntityHandle::fresh(self.model.as_ref());

        let model = provision_model(self.container, self.definition.model())?;
        self.handle = EntityHandle::fresh(model.as_ref());
        self.model = model;
        Ok(())
    }

    fn require(
        &self,
        found: Option<Record>,
        fail: bool,
        key: Option<Value>,
    ) -> RepoResult<Option<Record>> {
        match found {
            None if fail => Err(NotFoundError::new(self.model.table(), key).into()),
            found => Ok(found),
        }
    }

    fn fetch_first(&self, columns: &Columns) -> RepoResult<Option<Record>> {
        match &self.handle {
            EntityHandle::Query(query) => {
                let rows = self.load(&query.clone().take(1), columns)?;
                Ok(rows.into_iter().next())
            }
            EntityHandle::Resolved(rows) => Ok(rows
                .first()
                .cloned()
                .map(|record| record.project(columns.as_list()))),
        }
    }

    fn fetch_by_key(&self, key: &Value, columns: &Columns) -> RepoResult<Option<Record>> {
        let primary_key = self.model.primary_key();
        match &self.handle {
            EntityHandle::Query(query) => {
                let query = query.clone().where_key(key.clone()).take(1);
                Ok(self.load(&query, columns)?.into_iter().next())
            }
            EntityHandle::Resolved(rows) => Ok(rows
                .iter()
                .find(|record| record.get(primary_key) == Some(key))
                .cloned()
                .map(|record| record.project(columns.as_list()))),
        }
    }

    fn fetch_all(&self, columns: &Columns) -> RepoResult<Vec<Record>> {
        match &self.handle {
            EntityHandle::Query(query) => self.load(query, columns),
            EntityHandle::Resolved(rows) => Ok(rows
                .iter()
                .cloned()
                .map(|record| record.project(columns.as_list()))
                .collect()),
        }
    }

    /// Re-reads one row by key, bypassing scopes and criteria.
    fn reload(&self, model: &dyn Model, key: Value) -> RepoResult<Record> {
        let query = QueryBuilder::for_model(model).where_key(key.clone()).take(1);
        self.store
            .select(&query, &Columns::All)?
            .into_iter()
            .next()
            .ok_or_else(|| NotFoundError::new(model.table(), Some(key)).into())
    }

    fn delete_record(&self, record: &Record) -> RepoResult<usize> {
        let primary_key = self.model.primary_key();
        let key = record.get(primary_key).cloned().ok_or_else(|| {
            RepoError::InvalidData(format!(
                "row from `{}` has no `{}` column",
                self.model.table(),
                primary_key
            ))
        })?;
        self.store.delete(self.model.table(), primary_key, &[key])
    }

    fn assignable(&self, mut attributes: Attributes, assignment: MassAssignment) -> Attributes {
        if assignment == MassAssignment::Guarded {
            let fillable = self.model.fillable();
            let before = attributes.len();
            attributes.retain(|column| fillable.contains(&column));
            let dropped = before - attributes.len();
            if dropped > 0 {
                debug!(
                    "event=mass_assignment module=repo status=filtered table={} dropped={}",
                    self.model.table(),
                    dropped
                );
            }
        }
        attributes
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
