//! Identity management
//!
//! Every published index is identified by `root + kind token`, with no
//! separator. The root is either configured explicitly or derived once from
//! the stable identifiers of the temperature and humidity sources.
//!
//! Schema version 1 used a few kind tokens that were later renamed; the
//! migration rewrites them in persisted identifiers and keeps the root
//! untouched, so entity history survives.

use crate::adapters::EntityRegistry;
use crate::error::ComfortError;
use crate::types::{Kind, LegacyKind};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Platform name under which index entities are registered
pub const PLATFORM: &str = "thermal_comfort";

/// Current identifier schema version
pub const SCHEMA_VERSION: u32 = 2;

/// Separator between the two source identifiers of a derived root
pub const ROOT_SEPARATOR: &str = "-";

/// One rewritten identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierChange {
    pub entity_id: String,
    pub old_identifier: String,
    pub new_identifier: String,
}

/// Result of migrating one configuration entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationReport {
    pub config_entry_id: String,
    pub from_version: u32,
    pub to_version: u32,
    pub changes: Vec<IdentifierChange>,
}

/// Identity manager for root and per-index identifiers
pub struct IdentityManager;

impl IdentityManager {
    /// Root identifier of a group.
    ///
    /// An explicit id wins; otherwise the stable ids of both mandatory
    /// sources are looked up and joined with [`ROOT_SEPARATOR`].
    pub fn root_id(
        explicit: Option<&str>,
        temperature_source: &str,
        humidity_source: &str,
        registry: &dyn EntityRegistry,
    ) -> Result<String, ComfortError> {
        if let Some(explicit) = explicit {
            return Ok(explicit.to_string());
        }

        let temperature = registry.unique_id_of(temperature_source).ok_or_else(|| {
            ComfortError::UnresolvableSource(format!(
                "{temperature_source} has no stable identifier and no unique_id is configured"
            ))
        })?;
        let humidity = registry.unique_id_of(humidity_source).ok_or_else(|| {
            ComfortError::UnresolvableSource(format!(
                "{humidity_source} has no stable identifier and no unique_id is configured"
            ))
        })?;

        Ok(format!("{temperature}{ROOT_SEPARATOR}{humidity}"))
    }

    /// Permanent identifier of one index of a group
    pub fn index_id(root: &str, kind: Kind) -> String {
        format!("{root}{}", kind.as_str())
    }

    /// Rewrite an identifier ending in a legacy kind token.
    ///
    /// Returns `None` when the identifier is already canonical or carries no
    /// legacy token. Canonical tokens are checked first because
    /// `summer_simmer_index` itself ends in the legacy `simmer_index`.
    pub fn migrate(old_id: &str) -> Option<String> {
        if Kind::ALL.iter().any(|kind| old_id.ends_with(kind.as_str())) {
            return None;
        }
        LegacyKind::ALL.iter().find_map(|legacy| {
            old_id
                .strip_suffix(legacy.as_str())
                .map(|root| Self::index_id(root, legacy.canonical()))
        })
    }

    /// Migrate every registry entry of a configuration entry to the current
    /// schema version.
    ///
    /// An entry with nothing to rewrite still advances to [`SCHEMA_VERSION`].
    pub fn migrate_entry(
        registry: &mut dyn EntityRegistry,
        config_entry_id: &str,
        from_version: u32,
    ) -> Result<MigrationReport, ComfortError> {
        if from_version > SCHEMA_VERSION {
            return Err(ComfortError::Migration(format!(
                "entry {config_entry_id} has schema version {from_version}, newer than supported {SCHEMA_VERSION}"
            )));
        }

        let mut changes = Vec::new();
        if from_version < SCHEMA_VERSION {
            for entry in registry.entries_for_config_entry(config_entry_id) {
                if entry.platform != PLATFORM {
                    continue;
                }
                let Some(new_identifier) = Self::migrate(&entry.unique_id) else {
                    continue;
                };
                if let Some(existing) = registry.find_by_unique_id(&new_identifier) {
                    warn!(
                        entity_id = %entry.entity_id,
                        existing = %existing.entity_id,
                        identifier = %new_identifier,
                        "skipping migration, identifier already in use"
                    );
                    continue;
                }
                registry.update_unique_id(&entry.entity_id, &new_identifier)?;
                changes.push(IdentifierChange {
                    entity_id: entry.entity_id,
                    old_identifier: entry.unique_id,
                    new_identifier,
                });
            }
        }

        info!(
            config_entry_id,
            from_version,
            to_version = SCHEMA_VERSION,
            rewritten = changes.len(),
            "migrated configuration entry"
        );

        Ok(MigrationReport {
            config_entry_id: config_entry_id.to_string(),
            from_version,
            to_version: SCHEMA_VERSION,
            changes,
        })
    }
}
