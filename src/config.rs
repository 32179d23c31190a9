//! Configuration
//!
//! Groups are configured as JSON. Global options apply to every group that
//! does not set its own value:
//!
//! ```json
//! {
//!   "sensor_types": ["dew_point", "heat_index"],
//!   "poll": false,
//!   "groups": [
//!     {
//!       "name": "Living room",
//!       "temperature_sensor": "sensor.living_room_temperature",
//!       "humidity_sensor": "sensor.living_room_humidity",
//!       "unique_id": "living_room"
//!     }
//!   ]
//! }
//! ```

use crate::error::ComfortError;
use crate::types::{InputRole, Kind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;
use uuid::Uuid;

pub const DEFAULT_NAME: &str = "Thermal Comfort";

/// Default poll interval in seconds
pub const DEFAULT_SCAN_INTERVAL_SECS: u64 = 30;

pub const MIN_SCAN_INTERVAL_SECS: u64 = 1;

/// Top-level configuration: global defaults plus groups
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComfortConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor_types: Option<Vec<Kind>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_interval: Option<u64>,
    #[serde(default)]
    pub groups: Vec<GroupConfig>,
}

/// Configuration of one group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupConfig {
    #[serde(default = "default_name")]
    pub name: String,
    pub temperature_sensor: String,
    pub humidity_sensor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pressure_sensor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor_types: Option<Vec<Kind>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_interval: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_id: Option<String>,
}

fn default_name() -> String {
    DEFAULT_NAME.to_string()
}

/// When a group recomputes besides source change events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    Push,
    PushAndPoll { interval: Duration },
}

impl UpdateMode {
    pub fn poll_interval(&self) -> Option<Duration> {
        match self {
            UpdateMode::Push => None,
            UpdateMode::PushAndPoll { interval } => Some(*interval),
        }
    }
}

/// A finalized, validated group
#[derive(Debug, Clone, PartialEq)]
pub struct ThermalGroup {
    pub entry_id: String,
    pub name: String,
    pub temperature_source: String,
    pub humidity_source: String,
    pub pressure_source: Option<String>,
    pub enabled_kinds: BTreeSet<Kind>,
    pub update_mode: UpdateMode,
    pub explicit_root_id: Option<String>,
}

impl ThermalGroup {
    /// Configured sources with their roles
    pub fn sources(&self) -> Vec<(InputRole, &str)> {
        let mut sources = vec![
            (InputRole::Temperature, self.temperature_source.as_str()),
            (InputRole::Humidity, self.humidity_source.as_str()),
        ];
        if let Some(pressure) = &self.pressure_source {
            sources.push((InputRole::Pressure, pressure.as_str()));
        }
        sources
    }

    pub fn has_pressure(&self) -> bool {
        self.pressure_source.is_some()
    }

    pub fn source_for(&self, role: InputRole) -> Option<&str> {
        match role {
            InputRole::Temperature => Some(&self.temperature_source),
            InputRole::Humidity => Some(&self.humidity_source),
            InputRole::Pressure => self.pressure_source.as_deref(),
        }
    }
}

impl GroupConfig {
    pub fn new(name: &str, temperature_sensor: &str, humidity_sensor: &str) -> Self {
        Self {
            name: name.to_string(),
            temperature_sensor: temperature_sensor.to_string(),
            humidity_sensor: humidity_sensor.to_string(),
            pressure_sensor: None,
            sensor_types: None,
            poll: None,
            scan_interval: None,
            unique_id: None,
            entry_id: None,
        }
    }

    pub fn with_unique_id(mut self, unique_id: &str) -> Self {
        self.unique_id = Some(unique_id.to_string());
        self
    }

    pub fn with_entry_id(mut self, entry_id: &str) -> Self {
        self.entry_id = Some(entry_id.to_string());
        self
    }

    pub fn with_sensor_types(mut self, kinds: &[Kind]) -> Self {
        self.sensor_types = Some(kinds.to_vec());
        self
    }

    pub fn with_pressure_sensor(mut self, pressure_sensor: &str) -> Self {
        self.pressure_sensor = Some(pressure_sensor.to_string());
        self
    }

    pub fn with_poll(mut self, scan_interval: u64) -> Self {
        self.poll = Some(true);
        self.scan_interval = Some(scan_interval);
        self
    }

    /// Check the group on its own
    pub fn validate(&self) -> Result<(), ComfortError> {
        if self.name.trim().is_empty() {
            return Err(ComfortError::InvalidConfig("name must not be empty".to_string()));
        }
        if self.temperature_sensor.trim().is_empty() {
            return Err(self.invalid("temperature_sensor must not be empty"));
        }
        if self.humidity_sensor.trim().is_empty() {
            return Err(self.invalid("humidity_sensor must not be empty"));
        }
        if self.temperature_sensor == self.humidity_sensor {
            return Err(self.invalid("temperature_sensor and humidity_sensor must differ"));
        }
        if let Some(pressure) = &self.pressure_sensor {
            if pressure.trim().is_empty() {
                return Err(self.invalid("pressure_sensor must not be empty"));
            }
        }
        if let Some(unique_id) = &self.unique_id {
            if unique_id.trim().is_empty() {
                return Err(self.invalid("unique_id must not be empty"));
            }
        }
        if let Some(kinds) = &self.sensor_types {
            if kinds.is_empty() {
                return Err(self.invalid("sensor_types must list at least one kind"));
            }
        }
        if let Some(interval) = self.scan_interval {
            if interval < MIN_SCAN_INTERVAL_SECS {
                return Err(self.invalid(&format!(
                    "scan_interval must be at least {MIN_SCAN_INTERVAL_SECS} second"
                )));
            }
        }
        Ok(())
    }

    /// Apply global options and defaults, producing a finalized group.
    ///
    /// A missing `entry_id` is replaced by a fresh random one.
    pub fn resolve(&self, globals: &ComfortConfig) -> Result<ThermalGroup, ComfortError> {
        self.validate()?;

        let kinds = self
            .sensor_types
            .as_ref()
            .or(globals.sensor_types.as_ref());
        let enabled_kinds: BTreeSet<Kind> = match kinds {
            Some(kinds) => kinds.iter().copied().collect(),
            None => Kind::ALL.iter().copied().collect(),
        };

        let poll = self.poll.or(globals.poll).unwrap_or(false);
        let scan_interval = self
            .scan_interval
            .or(globals.scan_interval)
            .unwrap_or(DEFAULT_SCAN_INTERVAL_SECS);
        let update_mode = if poll {
            UpdateMode::PushAndPoll {
                interval: Duration::from_secs(scan_interval),
            }
        } else {
            UpdateMode::Push
        };

        Ok(ThermalGroup {
            entry_id: self
                .entry_id
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            name: self.name.clone(),
            temperature_source: self.temperature_sensor.clone(),
            humidity_source: self.humidity_sensor.clone(),
            pressure_source: self.pressure_sensor.clone(),
            enabled_kinds,
            update_mode,
            explicit_root_id: self.unique_id.clone(),
        })
    }

    fn invalid(&self, message: &str) -> ComfortError {
        ComfortError::InvalidConfig(format!("group {:?}: {message}", self.name))
    }
}

impl ComfortConfig {
    pub fn from_json(json: &str) -> Result<Self, ComfortError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, ComfortError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validate global options and every group
    pub fn validate(&self) -> Result<(), ComfortError> {
        if let Some(kinds) = &self.sensor_types {
            if kinds.is_empty() {
                return Err(ComfortError::InvalidConfig(
                    "global sensor_types must list at least one kind".to_string(),
                ));
            }
        }
        if let Some(interval) = self.scan_interval {
            if interval < MIN_SCAN_INTERVAL_SECS {
                return Err(ComfortError::InvalidConfig(format!(
                    "global scan_interval must be at least {MIN_SCAN_INTERVAL_SECS} second"
                )));
            }
        }

        let mut entry_ids = BTreeSet::new();
        for group in &self.groups {
            group.validate()?;
            if let Some(entry_id) = &group.entry_id {
                if !entry_ids.insert(entry_id.as_str()) {
                    return Err(ComfortError::InvalidConfig(format!(
                        "duplicate entry_id {entry_id:?}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Resolve every group against the global options
    pub fn resolve(&self) -> Result<Vec<ThermalGroup>, ComfortError> {
        self.validate()?;
        self.groups.iter().map(|group| group.resolve(self)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let json = r#"{
            "groups": [{
                "temperature_sensor": "sensor.t",
                "humidity_sensor": "sensor.h"
            }]
        }"#;
        let config = ComfortConfig::from_json(json).unwrap();
        let groups = config.resolve().unwrap();

        assert_eq!(groups.len(), 1);
        let group = &groups[0];
        assert_eq!(group.name, "Thermal Comfort");
        assert_eq!(group.update_mode, UpdateMode::Push);
        assert_eq!(group.enabled_kinds.len(), Kind::ALL.len());
        assert!(Uuid::parse_str(&group.entry_id).is_ok());
        assert_eq!(group.explicit_root_id, None);
    }

    #[test]
    fn test_poll_interval_defaults_to_thirty_seconds() {
        let mut group = GroupConfig::new("g", "sensor.t", "sensor.h");
        group.poll = Some(true);
        let resolved = group.resolve(&ComfortConfig::default()).unwrap();
        assert_eq!(
            resolved.update_mode.poll_interval(),
            Some(Duration::from_secs(DEFAULT_SCAN_INTERVAL_SECS))
        );
    }

    #[test]
    fn test_global_sensor_types_apply_to_groups_without_their_own() {
        let json = r#"{
            "sensor_types": ["absolute_humidity"],
            "groups": [
                {
                    "name": "test_thermal_comfort",
                    "temperature_sensor": "sensor.t",
                    "humidity_sensor": "sensor.h",
                    "sensor_types": ["dew_point_perception", "absolute_humidity"],
                    "unique_id": "unique_thermal_comfort_id"
                },
                {
                    "name": "test_thermal_comfort2",
                    "temperature_sensor": "sensor.t",
                    "humidity_sensor": "sensor.h",
                    "unique_id": "unique_thermal_comfort_id2"
                }
            ]
        }"#;
        let groups = ComfortConfig::from_json(json).unwrap().resolve().unwrap();
        let total: usize = groups.iter().map(|g| g.enabled_kinds.len()).sum();
        assert_eq!(total, 3);
        assert!(groups[0].enabled_kinds.contains(&Kind::DewPointPerception));
        assert_eq!(
            groups[1].enabled_kinds.iter().copied().collect::<Vec<_>>(),
            vec![Kind::AbsoluteHumidity]
        );
    }

    #[test]
    fn test_legacy_kind_tokens_accepted() {
        let json = r#"{
            "groups": [{
                "temperature_sensor": "sensor.t",
                "humidity_sensor": "sensor.h",
                "sensor_types": ["thermal_perception", "simmer_index"]
            }]
        }"#;
        let groups = ComfortConfig::from_json(json).unwrap().resolve().unwrap();
        let kinds: Vec<Kind> = groups[0].enabled_kinds.iter().copied().collect();
        assert_eq!(kinds, vec![Kind::DewPointPerception, Kind::SummerSimmerIndex]);
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let json = r#"{
            "groups": [{
                "temperature_sensor": "sensor.t",
                "humidity_sensor": "sensor.h",
                "sensor_types": ["wind_chill"]
            }]
        }"#;
        assert!(matches!(
            ComfortConfig::from_json(json),
            Err(ComfortError::JsonError(_))
        ));
    }

    #[test]
    fn test_validation_errors() {
        let same = GroupConfig::new("g", "sensor.x", "sensor.x");
        assert!(matches!(same.validate(), Err(ComfortError::InvalidConfig(_))));

        let mut zero = GroupConfig::new("g", "sensor.t", "sensor.h");
        zero.scan_interval = Some(0);
        assert!(zero.validate().is_err());

        let empty_kinds = GroupConfig::new("g", "sensor.t", "sensor.h").with_sensor_types(&[]);
        assert!(empty_kinds.validate().is_err());

        let mut blank_id = GroupConfig::new("g", "sensor.t", "sensor.h");
        blank_id.unique_id = Some("  ".to_string());
        assert!(blank_id.validate().is_err());
    }

    #[test]
    fn test_duplicate_entry_ids_rejected() {
        let config = ComfortConfig {
            groups: vec![
                GroupConfig::new("a", "sensor.t", "sensor.h").with_entry_id("e1"),
                GroupConfig::new("b", "sensor.t", "sensor.h").with_entry_id("e1"),
            ],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_pressure_source_listed() {
        let group = GroupConfig::new("g", "sensor.t", "sensor.h")
            .with_pressure_sensor("sensor.p")
            .resolve(&ComfortConfig::default())
            .unwrap();
        assert!(group.has_pressure());
        assert_eq!(group.sources().len(), 3);
        assert_eq!(group.source_for(InputRole::Pressure), Some("sensor.p"));
    }

    #[test]
    fn test_json_roundtrip_keeps_groups() {
        let config = ComfortConfig {
            poll: Some(true),
            groups: vec![GroupConfig::new("g", "sensor.t", "sensor.h").with_unique_id("root")],
            ..Default::default()
        };
        let restored = ComfortConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(restored, config);
    }
}
