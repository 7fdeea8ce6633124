//! Eager loading of model relations after a select.
//!
//! # Invariants
//! - One `IN` query per relation name, regardless of how many parents.
//! - Related rows keep the related model's primary key order.

use crate::container::{provision_model, Container};
use crate::error::{RepoResult, RepositoryError};
use crate::model::{Model, Record, Relation, RelationKind};
use crate::query::{Columns, Direction, QueryBuilder};
use crate::store::EntityStore;
use log::debug;
use rusqlite::types::Value;

/// Attaches every relation in `names` to each of `records`.
///
/// # Errors
/// - `UnknownRelation` when `model` declares no relation with a given name.
/// - `ProvisioningError` when the related model id does not resolve.
pub(crate) fn eager_load(
    store: &dyn EntityStore,
    container: &Container,
    model: &dyn Model,
    records: &mut [Record],
    names: &[String],
) -> RepoResult<()> {
    for name in names {
        let relation = model
            .relation(name)
            .ok_or_else(|| RepositoryError::UnknownRelation {
                relation: name.clone(),
                model: model.table().to_string(),
            })?;
        load_relation(store, container, &relation, records)?;
    }
    Ok(())
}

fn load_relation(
    store: &dyn EntityStore,
    container: &Container,
    relation: &Relation,
    records: &mut [Record],
) -> RepoResult<()> {
    // Parent column holding the join value, and the related column it matches.
    let (parent_column, related_column) = match relation.kind {
        RelationKind::HasMany | RelationKind::HasOne => (relation.local_key, relation.foreign_key),
        RelationKind::BelongsTo => (relation.foreign_key, relation.local_key),
    };

    let mut keys: Vec<Value> = Vec::new();
    for record in records.iter() {
        match record.get(parent_column) {
            Some(Value::Null) | None => {}
            Some(value) if keys.contains(value) => {}
            Some(value) => keys.push(value.clone()),
        }
    }

    let related_rows = if keys.is_empty() {
        Vec::new()
    } else {
        let related_model = provision_model(container, relation.related)?;
        let query = QueryBuilder::for_model(related_model.as_ref())
            .where_in(related_column, keys)?
            .order_by(related_model.primary_key(), Direction::Asc)?;
        store.select(&query, &Columns::All)?
    };

    debug!(
        "event=eager_load module=repo status=ok relation={} parents={} rows={}",
        relation.name,
        records.len(),
        related_rows.len()
    );

    for record in records.iter_mut() {
        let mut matched: Vec<Record> = match record.get(parent_column) {
            Some(Value::Null) | None => Vec::new(),
            Some(parent_value) => related_rows
                .iter()
                .filter(|row| row.get(related_column) == Some(parent_value))
                .cloned()
                .collect(),
        };
        if relation.kind != RelationKind::HasMany {
            matched.truncate(1);
        }
        record.relations.insert(relation.name.to_string(), matched);
    }
    Ok(())
}
