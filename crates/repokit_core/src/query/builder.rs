//! Chainable query state for one entity table.
//!
//! # Responsibility
//! - Accumulate predicates, ordering, window and eager-load names.
//! - Stay storage-agnostic; `store` compiles this into SQL.
//!
//! # Invariants
//! - A builder never changes table once created.
//! - `is_pristine` is true only for a builder nothing has narrowed.

use crate::error::RepositoryError;
use crate::model::Model;
use crate::query::predicate::{Boolean, Operator, Predicate, PredicateKind};
use crate::query::validate_identifier;
use rusqlite::types::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Order {
    Column { column: String, direction: Direction },
    Random,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryBuilder {
    table: String,
    primary_key: String,
    predicates: Vec<Predicate>,
    orders: Vec<Order>,
    limit: Option<u32>,
    offset: Option<u32>,
    eager: Vec<String>,
}

impl QueryBuilder {
    pub fn new(table: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            primary_key: primary_key.into(),
            ..Self::default()
        }
    }

    pub fn for_model(model: &dyn Model) -> Self {
        Self::new(model.table(), model.primary_key())
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    pub fn offset(&self) -> Option<u32> {
        self.offset
    }

    /// Relation names requested for eager loading, in request order.
    pub fn eager(&self) -> &[String] {
        &self.eager
    }

    pub fn is_pristine(&self) -> bool {
        self.predicates.is_empty()
            && self.orders.is_empty()
            && self.limit.is_none()
            && self.offset.is_none()
            && self.eager.is_empty()
    }

    pub fn push(&mut self, predicate: Predicate) {
        self.predicates.push(predicate);
    }

    pub fn where_eq(self, column: &str, value: impl Into<Value>) -> Result<Self, RepositoryError> {
        self.where_op(column, Operator::Eq, value)
    }

    pub fn where_op(
        mut self,
        column: &str,
        operator: Operator,
        value: impl Into<Value>,
    ) -> Result<Self, RepositoryError> {
        self.push(Predicate::compare(column, operator, value, Boolean::And)?);
        Ok(self)
    }

    pub fn or_where_eq(
        mut self,
        column: &str,
        value: impl Into<Value>,
    ) -> Result<Self, RepositoryError> {
        self.push(Predicate::compare(column, Operator::Eq, value, Boolean::Or)?);
        Ok(self)
    }

    pub fn where_in(mut self, column: &str, values: Vec<Value>) -> Result<Self, RepositoryError> {
        self.push(Predicate::in_list(column, values, false, Boolean::And)?);
        Ok(self)
    }

    pub fn where_not_in(
        mut self,
        column: &str,
        values: Vec<Value>,
    ) -> Result<Self, RepositoryError> {
        self.push(Predicate::in_list(column, values, true, Boolean::And)?);
        Ok(self)
    }

    pub fn where_null(mut self, column: &str) -> Result<Self, RepositoryError> {
        self.push(Predicate::null(column, false, Boolean::And)?);
        Ok(self)
    }

    pub fn where_not_null(mut self, column: &str) -> Result<Self, RepositoryError> {
        self.push(Predicate::null(column, true, Boolean::And)?);
        Ok(self)
    }

    /// Narrows to one primary key value. The key column came from the model.
    pub fn where_key(mut self, key: impl Into<Value>) -> Self {
        self.predicates.push(Predicate {
            boolean: Boolean::And,
            kind: PredicateKind::Compare {
                column: self.primary_key.clone(),
                operator: Operator::Eq,
                value: key.into(),
            },
        });
        self
    }

    pub fn order_by(mut self, column: &str, direction: Direction) -> Result<Self, RepositoryError> {
        self.orders.push(Order::Column {
            column: validate_identifier(column)?.to_string(),
            direction,
        });
        Ok(self)
    }

    pub fn in_random_order(mut self) -> Self {
        self.orders.push(Order::Random);
        self
    }

    pub fn take(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn skip(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_relations<I, S>(mut self, relations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for relation in relations {
            let relation = relation.into();
            if !self.eager.contains(&relation) {
                self.eager.push(relation);
            }
        }
        self
    }

    /// Same filter, no ordering or window. Used for counting.
    pub fn unwindowed(&self) -> Self {
        Self {
            orders: Vec::new(),
            limit: None,
            offset: None,
            ..self.clone()
        }
    }

    /// Replaces the window with an explicit page slice.
    pub fn window(mut self, limit: u32, offset: u32) -> Self {
        self.limit = Some(limit);
        self.offset = if offset == 0 { None } else { Some(offset) };
        self
    }

    pub(crate) fn predicate_count(&self) -> usize {
        self.predicates.len()
    }

    /// Joins every predicate added at or after `from` as one unit.
    ///
    /// A single predicate just takes `boolean`; several are wrapped in a group.
    /// When more than one predicate precedes `from`, those are bracketed too.
    pub(crate) fn group_from(&mut self, from: usize, boolean: Boolean) {
        if from >= self.predicates.len() {
            return;
        }
        let mut tail = self.predicates.split_off(from);
        if from > 1 {
            let head = std::mem::take(&mut self.predicates);
            self.predicates.push(Predicate::group(head, Boolean::And));
        }
        if tail.len() == 1 {
            let mut single = tail.remove(0);
            single.boolean = boolean;
            self.predicates.push(single);
        } else {
            self.predicates.push(Predicate::group(tail, boolean));
        }
    }
}
