//! Record-level CRUD over a persistent container.
//!
//! `RecordStore` is a facade: every operation goes through the bound
//! container's view context. Storage failures are logged and reported as
//! `false` / `None`; the only error returned is `NotInitialized`.
//!
//! Inserts and updates walk the entity's *declared* attributes and assign
//! each one from the supplied map, so any declared attribute missing from
//! the map is set to null. An update with a partial map clears everything
//! it does not mention.

use crate::container::PersistentContainer;
use crate::context::ManagedContext;
use crate::error::{Result, StoreError};
use crate::predicate::Predicate;
use crate::types::{AttributeMap, ObjectId, Record, Value};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Record-level facade over an application-owned container.
#[derive(Debug, Default)]
pub struct RecordStore {
    container: RwLock<Option<Arc<PersistentContainer>>>,
}

impl RecordStore {
    /// An unbound store. Call `initialize` before any data operation.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store bound to `container`.
    pub fn with_container(container: Arc<PersistentContainer>) -> Self {
        Self {
            container: RwLock::new(Some(container)),
        }
    }

    /// Bind the working container. Calling again replaces the binding.
    pub fn initialize(&self, container: Arc<PersistentContainer>) {
        let name = container.name().to_string();
        let previous = self.container.write().replace(container);
        if let Some(previous) = previous {
            warn!(previous = previous.name(), current = %name, "record store re-initialized");
        } else {
            debug!(container = %name, "record store initialized");
        }
    }

    /// The bound container, if any.
    pub fn container(&self) -> Option<Arc<PersistentContainer>> {
        self.container.read().clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.container.read().is_some()
    }

    /// Insert a new object of `entity` with `attributes`, optionally saving.
    ///
    /// Returns `None` if the entity is unknown or the requested save fails.
    /// A failed save drops the new object from the view context; other
    /// pending changes stay as they were.
    pub fn add(
        &self,
        entity: &str,
        attributes: &AttributeMap,
        commit_now: bool,
    ) -> Result<Option<Record>> {
        let container = self.bound()?;
        let mut ctx = container.view_context();

        let id = match ctx.insert(entity) {
            Ok(id) => id,
            Err(e) => {
                warn!(entity, error = %e, "add failed");
                return Ok(None);
            }
        };

        if let Err(e) = assign_attributes(&mut ctx, id, attributes) {
            warn!(entity, error = %e, "add failed to assign attributes");
            discard_insert(&mut ctx, id);
            return Ok(None);
        }

        if commit_now && !commit(&mut ctx, "add") {
            discard_insert(&mut ctx, id);
            return Ok(None);
        }

        match ctx.record(id) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!(entity, error = %e, "added object not readable");
                Ok(None)
            }
        }
    }

    /// All objects of `entity` matching `predicate` (every object if `None`).
    ///
    /// `Some(vec![])` means nothing matched; `None` means the query failed.
    pub fn fetch(&self, entity: &str, predicate: Option<&Predicate>) -> Result<Option<Vec<Record>>> {
        let container = self.bound()?;
        let ctx = container.view_context();

        match ctx.fetch(entity, predicate) {
            Ok(records) => Ok(Some(records)),
            Err(e) => {
                warn!(entity, error = %e, "fetch failed");
                Ok(None)
            }
        }
    }

    /// Replace the declared attributes of `record` from `attributes`.
    ///
    /// Declared attributes absent from the map become null. `record` is
    /// refreshed with the assigned values. Returns `false` if the object is
    /// gone from the context or a requested save does not commit.
    pub fn update(
        &self,
        record: &mut Record,
        attributes: &AttributeMap,
        commit_now: bool,
    ) -> Result<bool> {
        let container = self.bound()?;
        let mut ctx = container.view_context();

        if let Err(e) = assign_attributes(&mut ctx, record.id, attributes) {
            warn!(id = %record.id, entity = %record.entity, error = %e, "update failed");
            return Ok(false);
        }

        if let Ok(values) = ctx.values(record.id) {
            record.attributes = values;
        }

        Ok(commit_if_pending(&mut ctx, commit_now, "update"))
    }

    /// Mark `record` for removal, optionally saving.
    pub fn delete(&self, record: &Record, commit_now: bool) -> Result<bool> {
        let container = self.bound()?;
        let mut ctx = container.view_context();

        if let Err(e) = ctx.delete(record.id) {
            warn!(id = %record.id, entity = %record.entity, error = %e, "delete failed");
            return Ok(false);
        }

        Ok(commit_if_pending(&mut ctx, commit_now, "delete"))
    }

    /// Delete every object of `entity` matching `predicate`, then save once
    /// if `commit_now`.
    ///
    /// A failed query is logged and deletes nothing; the result then only
    /// reflects the requested save.
    pub fn delete_all(
        &self,
        entity: &str,
        predicate: Option<&Predicate>,
        commit_now: bool,
    ) -> Result<bool> {
        let container = self.bound()?;
        let mut ctx = container.view_context();

        match ctx.fetch(entity, predicate) {
            Ok(records) => {
                for record in &records {
                    if let Err(e) = ctx.delete(record.id) {
                        warn!(id = %record.id, entity, error = %e, "delete-all skipped object");
                    }
                }
                debug!(entity, deleted = records.len(), "delete-all");
            }
            Err(e) => warn!(entity, error = %e, "delete-all fetch failed"),
        }

        Ok(commit_if_pending(&mut ctx, commit_now, "delete_all"))
    }

    /// Commit all pending changes in the view context.
    ///
    /// `false` when nothing is pending or the commit fails.
    pub fn save(&self) -> Result<bool> {
        let container = self.bound()?;
        let mut ctx = container.view_context();
        Ok(commit(&mut ctx, "save"))
    }

    fn bound(&self) -> Result<Arc<PersistentContainer>> {
        self.container.read().clone().ok_or(StoreError::NotInitialized)
    }
}

/// Assign every declared attribute of the object from `attributes`,
/// defaulting to null.
fn assign_attributes(
    ctx: &mut ManagedContext,
    id: ObjectId,
    attributes: &AttributeMap,
) -> Result<()> {
    let entity = ctx.entity_of(id)?;
    let declared: Vec<String> = ctx
        .model()
        .require_entity(&entity)?
        .attribute_names()
        .map(String::from)
        .collect();

    for key in attributes.keys().filter(|k| !declared.contains(k)) {
        debug!(entity = %entity, attribute = %key, "ignoring undeclared attribute");
    }

    for key in &declared {
        let value = attributes.get(key).cloned().unwrap_or(Value::Null);
        ctx.set_value(id, key, value)?;
    }
    Ok(())
}

/// Commit for a mutating operation. Nothing pending is not a failure.
fn commit_if_pending(ctx: &mut ManagedContext, commit_now: bool, operation: &str) -> bool {
    if commit_now && ctx.has_changes() {
        commit(ctx, operation)
    } else {
        true
    }
}

/// Drop an unsaved insert after a failed add.
fn discard_insert(ctx: &mut ManagedContext, id: ObjectId) {
    if let Err(e) = ctx.delete(id) {
        warn!(id = %id, error = %e, "failed to discard rejected insert");
    }
}

/// Save the context, logging failures. `false` if nothing was pending.
fn commit(ctx: &mut ManagedContext, operation: &str) -> bool {
    if !ctx.has_changes() {
        return false;
    }

    match ctx.save() {
        Ok(count) => {
            debug!(operation, changes = count, "committed");
            true
        }
        Err(e) => {
            error!(operation, error = %e, "commit failed");
            false
        }
    }
}
