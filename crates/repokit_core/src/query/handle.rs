//! Live entity handle and the builder capabilities reachable by name.
//!
//! # Responsibility
//! - Distinguish a chainable query from already materialized rows.
//! - Enumerate the builder methods a repository may forward by name.
//!
//! # Invariants
//! - Only `EntityHandle::Query` accepts narrowing.
//! - `HandleMethod` names are stable snake_case strings.

use crate::error::RepositoryError;
use crate::model::{Model, Record};
use crate::query::builder::{Direction, QueryBuilder};
use rusqlite::types::Value;

const DEFAULT_TIMESTAMP_COLUMN: &str = "created_at";

/// What the repository currently composes against.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityHandle {
    Query(QueryBuilder),
    Resolved(Vec<Record>),
}

impl EntityHandle {
    pub fn fresh(model: &dyn Model) -> Self {
        Self::Query(QueryBuilder::for_model(model))
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }

    /// True for a query nothing has narrowed yet.
    pub fn is_pristine(&self) -> bool {
        match self {
            Self::Query(query) => query.is_pristine(),
            Self::Resolved(_) => false,
        }
    }

    pub fn as_query(&self) -> Option<&QueryBuilder> {
        match self {
            Self::Query(query) => Some(query),
            Self::Resolved(_) => None,
        }
    }

    /// Borrows the query for narrowing, naming `operation` when resolved.
    pub fn query_mut(&mut self, operation: &str) -> Result<&mut QueryBuilder, RepositoryError> {
        match self {
            Self::Query(query) => Ok(query),
            Self::Resolved(_) => Err(RepositoryError::HandleResolved {
                operation: operation.to_string(),
            }),
        }
    }

    /// Applies a consuming builder step in place.
    ///
    /// The handle is left untouched when the step fails.
    pub fn narrow(
        &mut self,
        operation: &str,
        step: impl FnOnce(QueryBuilder) -> Result<QueryBuilder, RepositoryError>,
    ) -> Result<(), RepositoryError> {
        let query = self.query_mut(operation)?;
        *query = step(query.clone())?;
        Ok(())
    }
}

/// Builder capability reachable through `Repository::call`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HandleMethod {
    OrderBy,
    OrderByDesc,
    Latest,
    Oldest,
    Take,
    Skip,
    WhereIn,
    WhereNotIn,
    WhereNull,
    WhereNotNull,
    InRandomOrder,
}

const HANDLE_METHODS: &[HandleMethod] = &[
    HandleMethod::OrderBy,
    HandleMethod::OrderByDesc,
    HandleMethod::Latest,
    HandleMethod::Oldest,
    HandleMethod::Take,
    HandleMethod::Skip,
    HandleMethod::WhereIn,
    HandleMethod::WhereNotIn,
    HandleMethod::WhereNull,
    HandleMethod::WhereNotNull,
    HandleMethod::InRandomOrder,
];

impl HandleMethod {
    pub fn all() -> &'static [HandleMethod] {
        HANDLE_METHODS
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OrderBy => "order_by",
            Self::OrderByDesc => "order_by_desc",
            Self::Latest => "latest",
            Self::Oldest => "oldest",
            Self::Take => "take",
            Self::Skip => "skip",
            Self::WhereIn => "where_in",
            Self::WhereNotIn => "where_not_in",
            Self::WhereNull => "where_null",
            Self::WhereNotNull => "where_not_null",
            Self::InRandomOrder => "in_random_order",
        }
    }

    /// Exact-match lookup; method names are case sensitive.
    pub fn parse(name: &str) -> Option<Self> {
        HANDLE_METHODS
            .iter()
            .copied()
            .find(|method| method.as_str() == name)
    }

    /// Runs this method against `query` with positional `args`.
    pub fn invoke(self, query: QueryBuilder, args: &[Value]) -> Result<QueryBuilder, RepositoryError> {
        match self {
            Self::OrderBy => {
                let column = self.text_arg(args, 0)?;
                let direction = match args.get(1) {
                    None => Direction::Asc,
                    Some(Value::Text(text)) if text.eq_ignore_ascii_case("asc") => Direction::Asc,
                    Some(Value::Text(text)) if text.eq_ignore_ascii_case("desc") => {
                        Direction::Desc
                    }
                    Some(_) => return Err(self.bad_args("direction must be `asc` or `desc`")),
                };
                query.order_by(column, direction)
            }
            Self::OrderByDesc => query.order_by(self.text_arg(args, 0)?, Direction::Desc),
            Self::Latest => query.order_by(self.column_or_default(args)?, Direction::Desc),
            Self::Oldest => query.order_by(self.column_or_default(args)?, Direction::Asc),
            Self::Take => Ok(query.take(self.count_arg(args)?)),
            Self::Skip => Ok(query.skip(self.count_arg(args)?)),
            Self::WhereIn => query.where_in(self.text_arg(args, 0)?, args[1..].to_vec()),
            Self::WhereNotIn => query.where_not_in(self.text_arg(args, 0)?, args[1..].to_vec()),
            Self::WhereNull => query.where_null(self.text_arg(args, 0)?),
            Self::WhereNotNull => query.where_not_null(self.text_arg(args, 0)?),
            Self::InRandomOrder => Ok(query.in_random_order()),
        }
    }

    fn text_arg(self, args: &[Value], index: usize) -> Result<&str, RepositoryError> {
        match args.get(index) {
            Some(Value::Text(text)) => Ok(text.as_str()),
            _ => Err(self.bad_args(&format!("argument {index} must be a column name"))),
        }
    }

    fn column_or_default(self, args: &[Value]) -> Result<&str, RepositoryError> {
        if args.is_empty() {
            Ok(DEFAULT_TIMESTAMP_COLUMN)
        } else {
            self.text_arg(args, 0)
        }
    }

    fn count_arg(self, args: &[Value]) -> Result<u32, RepositoryError> {
        match args.first() {
            Some(Value::Integer(value)) => {
                u32::try_from(*value).map_err(|_| self.bad_args("count must be non-negative"))
            }
            _ => Err(self.bad_args("argument 0 must be an integer count")),
        }
    }

    fn bad_args(self, reason: &str) -> RepositoryError {
        RepositoryError::InvalidArguments {
            method: self.as_str().to_string(),
            reason: reason.to_string(),
        }
    }
}
