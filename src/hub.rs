//! Host facade
//!
//! `ComfortHub` owns every configured group and maps the host lifecycle onto
//! them: setup, unload, reload, source state changes and poll ticks. Groups
//! are keyed by their configuration entry id and never share mutable state.

use crate::adapters::{EntityRegistry, Publisher, RegistryEntry, StateStore};
use crate::cache::MeasurementCache;
use crate::config::ThermalGroup;
use crate::coordinator::{GroupCoordinator, IndexIdentity, SubscriptionHandle};
use crate::error::ComfortError;
use crate::identity::{IdentityManager, MigrationReport, PLATFORM};
use crate::types::{Kind, PublishedIndex};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Entity id prefix of published indices
pub const ENTITY_DOMAIN: &str = "sensor";

/// Multi-group engine
#[derive(Default)]
pub struct ComfortHub {
    groups: BTreeMap<String, GroupCoordinator>,
    pinned_roots: BTreeMap<String, String>,
}

impl ComfortHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set up a group: resolve its root, register its identifiers and run
    /// the first computation.
    ///
    /// Fails without touching the registry when the root cannot be resolved
    /// or an identifier belongs to another platform.
    pub fn setup_group(
        &mut self,
        group: ThermalGroup,
        registry: &mut dyn EntityRegistry,
        store: &dyn StateStore,
        publisher: &mut dyn Publisher,
        now: DateTime<Utc>,
    ) -> Result<SubscriptionHandle, ComfortError> {
        if self.groups.contains_key(&group.entry_id) {
            return Err(ComfortError::InvalidConfig(format!(
                "entry {} is already set up",
                group.entry_id
            )));
        }

        let root_id = self.resolve_root(&group, &*registry)?;
        let identities = register_identities(&group, &root_id, registry)?;

        let mut coordinator = GroupCoordinator::new(group, root_id.clone(), identities, now);
        coordinator.start(store, publisher, now);
        let handle = coordinator.handle();

        let entry_id = coordinator.group().entry_id.clone();
        info!(
            entry_id = %entry_id,
            group = %coordinator.group().name,
            root_id = %root_id,
            kinds = coordinator.group().enabled_kinds.len(),
            "group set up"
        );
        self.pinned_roots.insert(entry_id.clone(), root_id);
        self.groups.insert(entry_id, coordinator);
        Ok(handle)
    }

    /// Tear down a group and retract its published entities.
    ///
    /// Entities that another group still publishes under the same root stay.
    /// The root stays pinned so a later reload keeps its identifiers.
    pub fn unload_group(
        &mut self,
        entry_id: &str,
        publisher: &mut dyn Publisher,
    ) -> Result<(), ComfortError> {
        let mut coordinator = self
            .groups
            .remove(entry_id)
            .ok_or_else(|| ComfortError::GroupNotFound(entry_id.to_string()))?;
        let shared: BTreeSet<String> = self
            .groups
            .values()
            .flat_map(|group| group.identities().values())
            .map(|identity| identity.entity_id.clone())
            .collect();
        coordinator.teardown_retaining(publisher, &shared);
        info!(entry_id, group = %coordinator.group().name, "group unloaded");
        Ok(())
    }

    /// Unload and forget a group, including its pinned root
    pub fn remove_group(
        &mut self,
        entry_id: &str,
        publisher: &mut dyn Publisher,
    ) -> Result<(), ComfortError> {
        self.unload_group(entry_id, publisher)?;
        self.pinned_roots.remove(entry_id);
        Ok(())
    }

    /// Apply a configuration update as a full unload and setup
    pub fn reload_group(
        &mut self,
        group: ThermalGroup,
        registry: &mut dyn EntityRegistry,
        store: &dyn StateStore,
        publisher: &mut dyn Publisher,
        now: DateTime<Utc>,
    ) -> Result<SubscriptionHandle, ComfortError> {
        if self.groups.contains_key(&group.entry_id) {
            self.unload_group(&group.entry_id, publisher)?;
        }
        self.setup_group(group, registry, store, publisher, now)
    }

    /// Route a source state change to every group listening to it
    pub fn handle_state_change(
        &mut self,
        entity_id: &str,
        store: &dyn StateStore,
        publisher: &mut dyn Publisher,
        now: DateTime<Utc>,
    ) -> Vec<PublishedIndex> {
        let mut published = Vec::new();
        for group in self.groups.values_mut() {
            published.extend(group.on_source_event(entity_id, store, publisher, now));
        }
        published
    }

    /// Run every poll that is due at `now`
    pub fn tick(
        &mut self,
        store: &dyn StateStore,
        publisher: &mut dyn Publisher,
        now: DateTime<Utc>,
    ) -> Vec<PublishedIndex> {
        let mut published = Vec::new();
        for group in self.groups.values_mut() {
            published.extend(group.on_poll_tick(store, publisher, now));
        }
        published
    }

    /// Earliest pending poll across all groups
    pub fn next_poll(&self) -> Option<DateTime<Utc>> {
        self.groups
            .values()
            .filter_map(|group| group.poll_schedule().map(|s| s.next_due()))
            .min()
    }

    /// Migrate persisted identifiers of one configuration entry
    pub fn migrate_entry(
        &self,
        registry: &mut dyn EntityRegistry,
        entry_id: &str,
        from_version: u32,
    ) -> Result<MigrationReport, ComfortError> {
        IdentityManager::migrate_entry(registry, entry_id, from_version)
    }

    /// Pin the root of an entry, e.g. from persisted host data before setup
    pub fn pin_root(&mut self, entry_id: &str, root_id: &str) {
        self.pinned_roots
            .insert(entry_id.to_string(), root_id.to_string());
    }

    pub fn pinned_root(&self, entry_id: &str) -> Option<&str> {
        self.pinned_roots.get(entry_id).map(String::as_str)
    }

    pub fn group(&self, entry_id: &str) -> Option<&GroupCoordinator> {
        self.groups.get(entry_id)
    }

    pub fn groups(&self) -> impl Iterator<Item = &GroupCoordinator> {
        self.groups.values()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Measurement caches of all groups, keyed by entry id
    pub fn save_caches(&self) -> BTreeMap<String, MeasurementCache> {
        self.groups
            .iter()
            .map(|(entry_id, group)| (entry_id.clone(), group.cache().clone()))
            .collect()
    }

    /// Write the cache of every group to `<dir>/<entry_id>.json`
    pub fn save_caches_to(&self, dir: &Path) -> Result<(), ComfortError> {
        fs::create_dir_all(dir)?;
        for (entry_id, group) in &self.groups {
            group.cache().save_to_path(&cache_file(dir, entry_id))?;
        }
        Ok(())
    }

    /// Restore caches written by [`ComfortHub::save_caches_to`].
    ///
    /// Groups without a cache file keep their current cache. Returns the
    /// number of groups restored.
    pub fn restore_caches_from(&mut self, dir: &Path) -> Result<usize, ComfortError> {
        let mut restored = 0;
        for (entry_id, group) in self.groups.iter_mut() {
            let path = cache_file(dir, entry_id);
            if !path.exists() {
                continue;
            }
            group.restore_cache(MeasurementCache::load_from_path(&path)?);
            restored += 1;
        }
        info!(dir = %dir.display(), restored, "restored measurement caches");
        Ok(restored)
    }

    /// Restore a saved cache into a group that is set up
    pub fn restore_cache(
        &mut self,
        entry_id: &str,
        cache: MeasurementCache,
    ) -> Result<(), ComfortError> {
        let group = self
            .groups
            .get_mut(entry_id)
            .ok_or_else(|| ComfortError::GroupNotFound(entry_id.to_string()))?;
        group.restore_cache(cache);
        Ok(())
    }

    fn resolve_root(
        &self,
        group: &ThermalGroup,
        registry: &dyn EntityRegistry,
    ) -> Result<String, ComfortError> {
        if group.explicit_root_id.is_none() {
            if let Some(pinned) = self.pinned_roots.get(&group.entry_id) {
                return Ok(pinned.clone());
            }
        }
        IdentityManager::root_id(
            group.explicit_root_id.as_deref(),
            &group.temperature_source,
            &group.humidity_source,
            registry,
        )
    }
}

fn cache_file(dir: &Path, entry_id: &str) -> PathBuf {
    dir.join(format!("{entry_id}.json"))
}

/// Resolve or register the identifier of every enabled kind.
///
/// Identifiers already registered by this platform are reused as is.
fn register_identities(
    group: &ThermalGroup,
    root_id: &str,
    registry: &mut dyn EntityRegistry,
) -> Result<BTreeMap<Kind, IndexIdentity>, ComfortError> {
    let mut identities = BTreeMap::new();
    let mut new_entries = Vec::new();
    let mut taken = BTreeSet::new();

    for kind in &group.enabled_kinds {
        let identifier = IdentityManager::index_id(root_id, *kind);
        let entity_id = match registry.find_by_unique_id(&identifier) {
            Some(existing) if existing.platform == PLATFORM => existing.entity_id,
            Some(existing) => {
                return Err(ComfortError::IdentifierConflict(format!(
                    "{identifier} is already used by {} ({})",
                    existing.entity_id, existing.platform
                )))
            }
            None => {
                let entity_id = free_entity_id(&group.name, *kind, &*registry, &taken);
                new_entries.push(RegistryEntry {
                    entity_id: entity_id.clone(),
                    platform: PLATFORM.to_string(),
                    unique_id: identifier.clone(),
                    config_entry_id: Some(group.entry_id.clone()),
                });
                entity_id
            }
        };
        taken.insert(entity_id.clone());
        identities.insert(
            *kind,
            IndexIdentity {
                identifier,
                entity_id,
            },
        );
    }

    for entry in new_entries {
        registry.register(entry)?;
    }
    Ok(identities)
}

/// `sensor.<slug(name)>_<token>`, suffixed `_2`, `_3`, ... while taken
fn free_entity_id(
    name: &str,
    kind: Kind,
    registry: &dyn EntityRegistry,
    taken: &BTreeSet<String>,
) -> String {
    let base = format!("{ENTITY_DOMAIN}.{}_{}", slugify(name), kind.as_str());
    let is_free = |candidate: &str| registry.get(candidate).is_none() && !taken.contains(candidate);

    if is_free(&base) {
        return base;
    }
    (2u32..)
        .map(|n| format!("{base}_{n}"))
        .find(|candidate| is_free(candidate))
        .unwrap_or(base)
}

/// Lowercase ASCII slug with single underscores between words
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    let slug = slug.trim_end_matches('_');
    if slug.is_empty() {
        PLATFORM.to_string()
    } else {
        slug.to_string()
    }
}
