//! Measurement cache
//!
//! Each group keeps the latest measurement per input role and, separately,
//! the last valid one. The last valid measurement is never discarded; it is
//! what a restarted group falls back on while a source is missing.

use crate::error::ComfortError;
use crate::types::{InputRole, Inputs, Measurement, Validity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Per-group measurement cache
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasurementCache {
    latest: BTreeMap<InputRole, Measurement>,
    last_valid: BTreeMap<InputRole, Measurement>,
}

impl MeasurementCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a freshly sanitized measurement
    pub fn record(&mut self, role: InputRole, measurement: Measurement) {
        if measurement.is_valid() {
            self.last_valid.insert(role, measurement.clone());
        }
        self.latest.insert(role, measurement);
    }

    pub fn latest(&self, role: InputRole) -> Option<&Measurement> {
        self.latest.get(&role)
    }

    pub fn last_valid(&self, role: InputRole) -> Option<&Measurement> {
        self.last_valid.get(&role)
    }

    /// Validity of the latest measurement; roles never seen count as missing
    pub fn validity(&self, role: InputRole) -> Validity {
        self.latest
            .get(&role)
            .map(|m| m.validity)
            .unwrap_or(Validity::Missing)
    }

    /// Inputs built from the latest measurements, if all of `roles` are valid
    pub fn current_inputs(&self, roles: &[InputRole]) -> Option<Inputs> {
        Self::inputs_from(&self.latest, roles)
    }

    /// Inputs built from the last valid measurements
    pub fn last_valid_inputs(&self, roles: &[InputRole]) -> Option<Inputs> {
        Self::inputs_from(&self.last_valid, roles)
    }

    fn inputs_from(
        measurements: &BTreeMap<InputRole, Measurement>,
        roles: &[InputRole],
    ) -> Option<Inputs> {
        let value = |role: InputRole| {
            measurements
                .get(&role)
                .filter(|m| m.is_valid())
                .and_then(|m| m.value)
        };

        let mut inputs = Inputs::new(value(InputRole::Temperature)?, value(InputRole::Humidity)?);
        if roles.contains(&InputRole::Pressure) {
            inputs.pressure = Some(value(InputRole::Pressure)?);
        }
        Some(inputs)
    }

    /// Load a cache from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize the cache to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, ComfortError> {
        Ok(Self::from_json(&fs::read_to_string(path)?)?)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), ComfortError> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
