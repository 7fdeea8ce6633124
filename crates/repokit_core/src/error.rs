//! Error taxonomy shared by the repository layer.
//!
//! # Responsibility
//! - Separate misconfiguration (`ProvisioningError`), missing single results
//!   (`NotFoundError`) and API misuse (`RepositoryError`).
//! - Carry storage failures through unchanged so callers see the root cause.
//!
//! # Invariants
//! - No variant wraps another repository error; nested sources stay reachable
//!   through `Error::source`.

use crate::db::DbError;
use rusqlite::types::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Top-level error returned by every repository operation.
#[derive(Debug)]
pub enum RepoError {
    Provisioning(ProvisioningError),
    NotFound(NotFoundError),
    Repository(RepositoryError),
    Db(DbError),
    InvalidData(String),
}

impl RepoError {
    /// Returns whether this error is a recoverable missing-result signal.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Provisioning(err) => write!(f, "{err}"),
            Self::NotFound(err) => write!(f, "{err}"),
            Self::Repository(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Provisioning(err) => Some(err),
            Self::NotFound(err) => Some(err),
            Self::Repository(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<ProvisioningError> for RepoError {
    fn from(value: ProvisioningError) -> Self {
        Self::Provisioning(value)
    }
}

impl From<NotFoundError> for RepoError {
    fn from(value: NotFoundError) -> Self {
        Self::NotFound(value)
    }
}

impl From<RepositoryError> for RepoError {
    fn from(value: RepositoryError) -> Self {
        Self::Repository(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// A type identifier resolved to something that cannot serve its role.
///
/// Always fatal: the binding table is wrong, retrying cannot help.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisioningError {
    InvalidBinding(String),
    DuplicateBinding(String),
    Unbound(String),
    Construction { type_id: String, reason: String },
    NotAModel { type_id: String, found: &'static str },
    NotACriteria { class_id: String, found: &'static str },
}

impl Display for ProvisioningError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidBinding(id) => write!(f, "binding id is invalid: `{id}`"),
            Self::DuplicateBinding(id) => write!(f, "binding already registered: `{id}`"),
            Self::Unbound(id) => write!(f, "no binding registered for `{id}`"),
            Self::Construction { type_id, reason } => {
                write!(f, "failed to construct `{type_id}`: {reason}")
            }
            Self::NotAModel { type_id, found } => write!(
                f,
                "class `{type_id}` must resolve to a model, resolved to {found}"
            ),
            Self::NotACriteria { class_id, found } => write!(
                f,
                "class `{class_id}` must resolve to a criteria, resolved to {found}"
            ),
        }
    }
}

impl Error for ProvisioningError {}

/// A single-result lookup asked for fail-on-missing and found nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct NotFoundError {
    pub table: String,
    pub key: Option<Value>,
}

impl NotFoundError {
    pub fn new(table: impl Into<String>, key: Option<Value>) -> Self {
        Self {
            table: table.into(),
            key,
        }
    }
}

impl Display for NotFoundError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.key {
            Some(key) => write!(
                f,
                "no query results for `{}` with key {}",
                self.table,
                describe_value(key)
            ),
            None => write!(f, "no query results for `{}`", self.table),
        }
    }
}

impl Error for NotFoundError {}

/// Caller asked the repository or its live handle for something it cannot do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    UnknownMethod { method: String, model: String },
    NotChainable { method: String, repository: String },
    UnknownScope { scope: String, model: String },
    UnknownRelation { relation: String, model: String },
    HandleResolved { operation: String },
    InvalidOperator(String),
    InvalidIdentifier(String),
    InvalidArguments { method: String, reason: String },
}

impl Display for RepositoryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownMethod { method, model } => {
                write!(f, "method `{method}` does not exist on model `{model}`")
            }
            Self::NotChainable { method, repository } => write!(
                f,
                "method `{method}` can not be called in repository `{repository}`"
            ),
            Self::UnknownScope { scope, model } => {
                write!(f, "scope `{scope}` is not callable on model `{model}`")
            }
            Self::UnknownRelation { relation, model } => {
                write!(f, "relation `{relation}` is not defined on model `{model}`")
            }
            Self::HandleResolved { operation } => write!(
                f,
                "`{operation}` requires a query; the entity handle is already resolved"
            ),
            Self::InvalidOperator(operator) => write!(f, "unsupported operator `{operator}`"),
            Self::InvalidIdentifier(value) => write!(f, "invalid sql identifier `{value}`"),
            Self::InvalidArguments { method, reason } => {
                write!(f, "invalid arguments for `{method}`: {reason}")
            }
        }
    }
}

impl Error for RepositoryError {}

pub(crate) fn describe_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Integer(number) => number.to_string(),
        Value::Real(number) => number.to_string(),
        Value::Text(text) => format!("`{text}`"),
        Value::Blob(bytes) => format!("<{} bytes>", bytes.len()),
    }
}
