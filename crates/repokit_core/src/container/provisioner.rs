//! Role checks on top of `Container::make`.

use crate::container::{Container, Instance};
use crate::error::ProvisioningError;
use crate::model::Model;
use crate::repo::Criteria;
use log::error;
use rusqlite::types::Value;
use std::sync::Arc;

/// Resolves `type_id` and requires the result to be a model.
pub fn provision_model(
    container: &Container,
    type_id: &str,
) -> Result<Arc<dyn Model>, ProvisioningError> {
    let result = match container.make(type_id, &[])? {
        Instance::Model(model) => Ok(model),
        other => Err(ProvisioningError::NotAModel {
            type_id: type_id.to_string(),
            found: other.kind(),
        }),
    };
    if let Err(err) = &result {
        error!(
            "event=provision module=container status=error role=model type_id={} error={}",
            type_id, err
        );
    }
    result
}

/// Resolves `class_id` with constructor `args` and requires a criteria.
pub fn provision_criteria(
    container: &Container,
    class_id: &str,
    args: &[Value],
) -> Result<Box<dyn Criteria>, ProvisioningError> {
    let result = match container.make(class_id, args)? {
        Instance::Criteria(criteria) => Ok(criteria),
        other => Err(ProvisioningError::NotACriteria {
            class_id: class_id.to_string(),
            found: other.kind(),
        }),
    };
    if let Err(err) = &result {
        error!(
            "event=provision module=container status=error role=criteria class_id={} error={}",
            class_id, err
        );
    }
    result
}
