//! Where-clause building blocks.

use crate::error::RepositoryError;
use crate::query::validate_identifier;
use rusqlite::types::Value;

/// How a predicate joins the ones before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Boolean {
    #[default]
    And,
    Or,
}

impl Boolean {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
    NotLike,
}

impl Operator {
    /// Parses the operator spellings accepted in condition triples.
    pub fn parse(value: &str) -> Result<Self, RepositoryError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "=" | "==" => Ok(Self::Eq),
            "!=" | "<>" => Ok(Self::NotEq),
            "<" => Ok(Self::Lt),
            "<=" => Ok(Self::Lte),
            ">" => Ok(Self::Gt),
            ">=" => Ok(Self::Gte),
            "like" => Ok(Self::Like),
            "not like" => Ok(Self::NotLike),
            _ => Err(RepositoryError::InvalidOperator(value.to_string())),
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PredicateKind {
    Compare {
        column: String,
        operator: Operator,
        value: Value,
    },
    In {
        column: String,
        values: Vec<Value>,
        negated: bool,
    },
    Null {
        column: String,
        negated: bool,
    },
    Group(Vec<Predicate>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub boolean: Boolean,
    pub kind: PredicateKind,
}

impl Predicate {
    pub fn compare(
        column: &str,
        operator: Operator,
        value: impl Into<Value>,
        boolean: Boolean,
    ) -> Result<Self, RepositoryError> {
        Ok(Self {
            boolean,
            kind: PredicateKind::Compare {
                column: validate_identifier(column)?.to_string(),
                operator,
                value: value.into(),
            },
        })
    }

    pub fn in_list(
        column: &str,
        values: Vec<Value>,
        negated: bool,
        boolean: Boolean,
    ) -> Result<Self, RepositoryError> {
        Ok(Self {
            boolean,
            kind: PredicateKind::In {
                column: validate_identifier(column)?.to_string(),
                values,
                negated,
            },
        })
    }

    pub fn null(column: &str, negated: bool, boolean: Boolean) -> Result<Self, RepositoryError> {
        Ok(Self {
            boolean,
            kind: PredicateKind::Null {
                column: validate_identifier(column)?.to_string(),
                negated,
            },
        })
    }

    pub fn group(predicates: Vec<Predicate>, boolean: Boolean) -> Self {
        Self {
            boolean,
            kind: PredicateKind::Group(predicates),
        }
    }
}

/// One caller-supplied condition.
///
/// Built from `(column, value)` for equality or `(column, operator, value)`
/// for an explicit comparison; the shape is decided per entry.
#[derive(Debug, Clone, PartialEq)]
pub enum WhereEntry {
    Equals {
        column: String,
        value: Value,
    },
    Compare {
        column: String,
        operator: String,
        value: Value,
    },
}

impl WhereEntry {
    pub fn into_predicate(self, boolean: Boolean) -> Result<Predicate, RepositoryError> {
        match self {
            Self::Equals { column, value } => {
                Predicate::compare(&column, Operator::Eq, value, boolean)
            }
            Self::Compare {
                column,
                operator,
                value,
            } => Predicate::compare(&column, Operator::parse(&operator)?, value, boolean),
        }
    }
}

impl<K, V> From<(K, V)> for WhereEntry
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from((column, value): (K, V)) -> Self {
        Self::Equals {
            column: column.into(),
            value: value.into(),
        }
    }
}

impl<K, O, V> From<(K, O, V)> for WhereEntry
where
    K: Into<String>,
    O: Into<String>,
    V: Into<Value>,
{
    fn from((column, operator, value): (K, O, V)) -> Self {
        Self::Compare {
            column: column.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }
}
