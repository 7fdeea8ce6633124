//! Provisioning collaborator: named factories for models and criteria.
//!
//! # Responsibility
//! - Map type identifiers to factories producing typed instances.
//! - Check that a resolved instance satisfies the role it is needed for.
//!
//! # Invariants
//! - Binding ids are trimmed, non-empty and unique.
//! - Resolution is lazy: a factory only runs when `make` is called.

mod provisioner;

use crate::error::ProvisioningError;
use crate::model::Model;
use crate::repo::Criteria;
use rusqlite::types::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

pub use provisioner::{provision_criteria, provision_model};

/// Something a factory produced.
pub enum Instance {
    Model(Arc<dyn Model>),
    Criteria(Box<dyn Criteria>),
    /// Any other registered service, described by a short label.
    Service(&'static str),
}

impl Instance {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Model(_) => "a model",
            Self::Criteria(_) => "a criteria",
            Self::Service(_) => "a service",
        }
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Model(model) => write!(f, "Instance::Model({})", model.table()),
            Self::Criteria(_) => write!(f, "Instance::Criteria"),
            Self::Service(label) => write!(f, "Instance::Service({label})"),
        }
    }
}

pub type Factory = Box<dyn Fn(&[Value]) -> Result<Instance, String> + Send + Sync>;

/// Registry of named factories.
#[derive(Default)]
pub struct Container {
    bindings: BTreeMap<String, Factory>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one factory under `id`.
    pub fn bind<F>(&mut self, id: &str, factory: F) -> Result<(), ProvisioningError>
    where
        F: Fn(&[Value]) -> Result<Instance, String> + Send + Sync + 'static,
    {
        let id = id.trim();
        if id.is_empty() {
            return Err(ProvisioningError::InvalidBinding(id.to_string()));
        }
        if self.bindings.contains_key(id) {
            return Err(ProvisioningError::DuplicateBinding(id.to_string()));
        }
        self.bindings.insert(id.to_string(), Box::new(factory));
        Ok(())
    }

    /// Registers a model type built with `Default` on every resolution.
    pub fn bind_model<M>(&mut self, id: &str) -> Result<(), ProvisioningError>
    where
        M: Model + Default + 'static,
    {
        self.bind(id, |_| Ok(Instance::Model(Arc::new(M::default()))))
    }

    /// Registers a criteria factory receiving the queued constructor args.
    pub fn bind_criteria<C, F>(&mut self, id: &str, build: F) -> Result<(), ProvisioningError>
    where
        C: Criteria + 'static,
        F: Fn(&[Value]) -> Result<C, String> + Send + Sync + 'static,
    {
        self.bind(id, move |args| {
            build(args).map(|criteria| Instance::Criteria(Box::new(criteria)))
        })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.bindings.contains_key(id.trim())
    }

    /// Returns sorted binding ids.
    pub fn ids(&self) -> Vec<String> {
        self.bindings.keys().cloned().collect()
    }

    /// Runs the factory bound to `id`.
    pub fn make(&self, id: &str, args: &[Value]) -> Result<Instance, ProvisioningError> {
        let id = id.trim();
        let factory = self
            .bindings
            .get(id)
            .ok_or_else(|| ProvisioningError::Unbound(id.to_string()))?;
        factory(args).map_err(|reason| ProvisioningError::Construction {
            type_id: id.to_string(),
            reason,
        })
    }
}
