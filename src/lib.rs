//! # Entity Store
//!
//! Record-level create / fetch / update / delete by entity name over an
//! application-owned persistence container.
//!
//! ## Core Concepts
//!
//! - **Model**: entities and their declared attributes, supplied by the application
//! - **Container**: model + backing store + the shared view context
//! - **Context**: scratchpad of unsaved inserts, updates and deletes
//! - **RecordStore**: convenience facade bound once to a container
//!
//! ## Example
//!
//! ```ignore
//! use entity_store::{attributes, AttributeType, EntityDescription, Model,
//!     PersistentContainer, RecordStore};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let model = Model::new().with_entity(
//!     EntityDescription::new("Task")
//!         .attribute("title", AttributeType::String)
//!         .attribute("done", AttributeType::Boolean),
//! );
//!
//! let store = RecordStore::new();
//! store.initialize(Arc::new(PersistentContainer::in_memory(model)));
//!
//! let task = store.add("Task", &attributes([("title", json!("buy milk")),
//!     ("done", json!(false))]), true)?;
//! ```

pub mod backend;
pub mod container;
pub mod context;
pub mod error;
pub mod predicate;
pub mod record_store;
pub mod schema;
pub mod types;

// Re-exports
pub use backend::{ChangeSet, FileStore, MemoryStore, PersistentStore, StoredObject};
pub use container::{ContainerConfig, PersistentContainer, StoreLocation};
pub use context::{ManagedContext, ObjectState};
pub use error::{Result, StoreError};
pub use predicate::Predicate;
pub use record_store::RecordStore;
pub use schema::{AttributeDescription, AttributeType, EntityDescription, Model};
pub use types::*;
