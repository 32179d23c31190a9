//! In-memory host adapters

use super::{EntityRegistry, Publisher, RegistryEntry, StateStore};
use crate::error::ComfortError;
use crate::types::PublishedIndex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// State store backed by a map of entity id → raw state
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    states: HashMap<String, String>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, entity_id: &str, state: &str) {
        self.states.insert(entity_id.to_string(), state.to_string());
    }

    /// Remove an entity entirely
    pub fn remove(&mut self, entity_id: &str) -> Option<String> {
        self.states.remove(entity_id)
    }
}

impl StateStore for MemoryStateStore {
    fn state(&self, entity_id: &str) -> Option<String> {
        self.states.get(entity_id).cloned()
    }
}

/// Registry kept in memory, serializable as a JSON list of entries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<RegistryEntry>", into = "Vec<RegistryEntry>")]
pub struct MemoryRegistry {
    entries: BTreeMap<String, RegistryEntry>,
}

impl From<Vec<RegistryEntry>> for MemoryRegistry {
    fn from(entries: Vec<RegistryEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|entry| (entry.entity_id.clone(), entry))
                .collect(),
        }
    }
}

impl From<MemoryRegistry> for Vec<RegistryEntry> {
    fn from(registry: MemoryRegistry) -> Self {
        registry.entries.into_values().collect()
    }
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.values()
    }

    /// Entity id registered for (platform, unique id)
    pub fn entity_id_for(&self, platform: &str, unique_id: &str) -> Option<String> {
        self.entries
            .values()
            .find(|e| e.platform == platform && e.unique_id == unique_id)
            .map(|e| e.entity_id.clone())
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl EntityRegistry for MemoryRegistry {
    fn get(&self, entity_id: &str) -> Option<RegistryEntry> {
        self.entries.get(entity_id).cloned()
    }

    fn find_by_unique_id(&self, unique_id: &str) -> Option<RegistryEntry> {
        self.entries
            .values()
            .find(|e| e.unique_id == unique_id)
            .cloned()
    }

    fn register(&mut self, entry: RegistryEntry) -> Result<(), ComfortError> {
        if self.entries.contains_key(&entry.entity_id) {
            return Err(ComfortError::IdentifierConflict(format!(
                "entity id {} is already registered",
                entry.entity_id
            )));
        }
        self.entries.insert(entry.entity_id.clone(), entry);
        Ok(())
    }

    fn entries_for_config_entry(&self, config_entry_id: &str) -> Vec<RegistryEntry> {
        self.entries
            .values()
            .filter(|e| e.config_entry_id.as_deref() == Some(config_entry_id))
            .cloned()
            .collect()
    }

    fn update_unique_id(&mut self, entity_id: &str, unique_id: &str) -> Result<(), ComfortError> {
        let entry = self.entries.get_mut(entity_id).ok_or_else(|| {
            ComfortError::Migration(format!("entity {entity_id} is not registered"))
        })?;
        entry.unique_id = unique_id.to_string();
        Ok(())
    }
}

/// Publisher that records the latest state per entity plus full history
#[derive(Debug, Clone, Default)]
pub struct RecordingPublisher {
    latest: BTreeMap<String, PublishedIndex>,
    history: Vec<PublishedIndex>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest published record for an entity
    pub fn get(&self, entity_id: &str) -> Option<&PublishedIndex> {
        self.latest.get(entity_id)
    }

    /// Latest state string for an entity
    pub fn state_of(&self, entity_id: &str) -> Option<String> {
        self.get(entity_id).map(|index| index.state.as_state_string())
    }

    pub fn current(&self) -> impl Iterator<Item = &PublishedIndex> {
        self.latest.values()
    }

    pub fn history(&self) -> &[PublishedIndex] {
        &self.history
    }

    /// Drain recorded history, keeping the latest states
    pub fn take_history(&mut self) -> Vec<PublishedIndex> {
        std::mem::take(&mut self.history)
    }

    pub fn len(&self) -> usize {
        self.latest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.latest.is_empty()
    }
}

impl Publisher for RecordingPublisher {
    fn publish(&mut self, index: &PublishedIndex) {
        self.latest.insert(index.entity_id.clone(), index.clone());
        self.history.push(index.clone());
    }

    fn retract(&mut self, entity_id: &str) {
        self.latest.remove(entity_id);
    }
}
