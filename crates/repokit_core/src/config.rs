//! Repository defaults.
//!
//! # Responsibility
//! - Hold the defaults used when callers omit pagination/random arguments.
//! - Load those defaults from JSON and reject inconsistent values.
//!
//! # Invariants
//! - `1 <= per_page <= max_per_page`.
//! - `page_name` is non-empty.

use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

const DEFAULT_PER_PAGE: u32 = 15;
const DEFAULT_MAX_PER_PAGE: u32 = 100;
const DEFAULT_PAGE_NAME: &str = "page";
const DEFAULT_RANDOM_TAKE: u32 = 15;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RepositoryConfig {
    /// Page size used by `paginate(None, ..)`.
    pub per_page: u32,
    /// Upper bound applied to every requested page size.
    pub max_per_page: u32,
    /// Cursor name used by `paginate(.., None)`.
    pub page_name: String,
    /// Row count used by `random(None)`.
    pub random_take: u32,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            per_page: DEFAULT_PER_PAGE,
            max_per_page: DEFAULT_MAX_PER_PAGE,
            page_name: DEFAULT_PAGE_NAME.to_string(),
            random_take: DEFAULT_RANDOM_TAKE,
        }
    }
}

impl RepositoryConfig {
    /// Parses and validates a JSON object. Missing keys take defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_per_page == 0 {
            return Err(ConfigError::Invalid(
                "max_per_page must be greater than zero".to_string(),
            ));
        }
        if self.per_page == 0 || self.per_page > self.max_per_page {
            return Err(ConfigError::Invalid(format!(
                "per_page must be within 1..={}, got {}",
                self.max_per_page, self.per_page
            )));
        }
        if self.page_name.trim().is_empty() {
            return Err(ConfigError::Invalid("page_name cannot be empty".to_string()));
        }
        Ok(())
    }

    /// Clamps a requested page size into the configured bounds.
    pub fn page_size(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.per_page)
            .clamp(1, self.max_per_page.max(1))
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "invalid repository config: {err}"),
            Self::Invalid(message) => write!(f, "invalid repository config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}
