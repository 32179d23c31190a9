//! Host adapters
//!
//! The engine never owns the host's state store, entity registry or publishing
//! layer. It talks to them through the traits below; `memory` provides
//! in-process implementations used by the CLI and tests.

mod memory;

pub use memory::{MemoryRegistry, MemoryStateStore, RecordingPublisher};

use crate::error::ComfortError;
use crate::types::PublishedIndex;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// Read access to current source states
pub trait StateStore {
    /// Raw state of an entity, `None` when the entity does not exist
    fn state(&self, entity_id: &str) -> Option<String>;
}

impl<T: StateStore + ?Sized> StateStore for RwLock<T> {
    fn state(&self, entity_id: &str) -> Option<String> {
        match self.read() {
            Ok(store) => store.state(entity_id),
            Err(poisoned) => poisoned.into_inner().state(entity_id),
        }
    }
}

/// A persisted entity record in the host registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub entity_id: String,
    /// Integration that owns the entity
    pub platform: String,
    pub unique_id: String,
    #[serde(default)]
    pub config_entry_id: Option<String>,
}

/// The host entity registry
pub trait EntityRegistry {
    fn get(&self, entity_id: &str) -> Option<RegistryEntry>;

    fn find_by_unique_id(&self, unique_id: &str) -> Option<RegistryEntry>;

    /// Add a new entry; fails when the entity id is already taken
    fn register(&mut self, entry: RegistryEntry) -> Result<(), ComfortError>;

    fn entries_for_config_entry(&self, config_entry_id: &str) -> Vec<RegistryEntry>;

    /// Rewrite the unique id of an existing entry, keeping its entity id
    fn update_unique_id(&mut self, entity_id: &str, unique_id: &str) -> Result<(), ComfortError>;

    /// Stable identifier of a source entity, if the registry knows it
    fn unique_id_of(&self, entity_id: &str) -> Option<String> {
        self.get(entity_id).map(|entry| entry.unique_id)
    }
}

/// Sink for published index states
pub trait Publisher {
    fn publish(&mut self, index: &PublishedIndex);

    /// Remove a published entity state, called at group teardown
    fn retract(&mut self, entity_id: &str);
}
