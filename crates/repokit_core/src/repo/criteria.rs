//! Criteria: reusable query logic resolved through the container.

use crate::error::RepoResult;
use crate::repo::repository::Repository;
use rusqlite::types::Value;

/// One unit of encapsulated query logic.
///
/// Implementations narrow the repository's live handle as a side effect;
/// failures come from the narrowing they perform.
pub trait Criteria {
    fn apply(&self, repository: &mut Repository<'_>) -> RepoResult<()>;
}

/// Queued criteria reference. The class id is only resolved at apply time.
#[derive(Debug, Clone, PartialEq)]
pub struct CriteriaDescriptor {
    pub class_id: String,
    pub args: Vec<Value>,
}

impl CriteriaDescriptor {
    pub fn new(class_id: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            class_id: class_id.into(),
            args,
        }
    }
}
