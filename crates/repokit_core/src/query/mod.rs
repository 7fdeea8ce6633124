//! Query composition primitives.
//!
//! # Responsibility
//! - Model predicates, ordering and windows as plain data.
//! - Represent the repository's live entity handle as a closed sum type.
//!
//! # Invariants
//! - Every column or table name stored here passed `validate_identifier`.
//! - Nothing in this module talks to storage.

pub mod builder;
pub mod handle;
pub mod predicate;

use crate::error::RepositoryError;
use once_cell::sync::Lazy;
use regex::Regex;

pub use builder::{Direction, Order, QueryBuilder};
pub use handle::{EntityHandle, HandleMethod};
pub use predicate::{Boolean, Operator, Predicate, PredicateKind, WhereEntry};

static IDENTIFIER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex must compile")
});

/// Rejects anything that is not a bare SQL identifier.
pub fn validate_identifier(value: &str) -> Result<&str, RepositoryError> {
    if IDENTIFIER_RE.is_match(value) {
        Ok(value)
    } else {
        Err(RepositoryError::InvalidIdentifier(value.to_string()))
    }
}

/// Column selection for reads. `["*"]` and `[]` both select every column.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Columns {
    #[default]
    All,
    Only(Vec<String>),
}

impl Columns {
    pub fn from_slice(columns: &[&str]) -> Result<Self, RepositoryError> {
        if columns.is_empty() || columns.iter().any(|column| *column == "*") {
            return Ok(Self::All);
        }
        let mut selected = Vec::with_capacity(columns.len());
        for column in columns {
            selected.push(validate_identifier(column)?.to_string());
        }
        Ok(Self::Only(selected))
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::All => None,
            Self::Only(columns) => Some(columns.as_slice()),
        }
    }
}
