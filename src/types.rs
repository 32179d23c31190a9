//! Core types for the Thermal Comfort engine
//!
//! This module defines the data structures that flow through a recompute:
//! raw source roles, sanitized measurements, index results and the records
//! handed to the host publishing layer.

use crate::error::ComfortError;
use crate::perception::Category;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// State token published when an index cannot be computed
pub const UNKNOWN_STATE: &str = "unknown";

/// Supported index kinds.
///
/// The serialized form is the canonical token that also ends every
/// per-index identifier, so variant names must never be renamed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    AbsoluteHumidity,
    DewPoint,
    #[serde(alias = "thermal_perception")]
    DewPointPerception,
    FrostPoint,
    FrostRisk,
    HeatIndex,
    Humidex,
    HumidexPerception,
    MoistAirEnthalpy,
    RelativeStrainPerception,
    SummerScharlauPerception,
    #[serde(alias = "simmer_index")]
    SummerSimmerIndex,
    #[serde(alias = "simmer_zone")]
    SummerSimmerPerception,
    ThomsDiscomfortPerception,
    WinterScharlauPerception,
}

impl Kind {
    /// Every kind, in token order
    pub const ALL: [Kind; 15] = [
        Kind::AbsoluteHumidity,
        Kind::DewPoint,
        Kind::DewPointPerception,
        Kind::FrostPoint,
        Kind::FrostRisk,
        Kind::HeatIndex,
        Kind::Humidex,
        Kind::HumidexPerception,
        Kind::MoistAirEnthalpy,
        Kind::RelativeStrainPerception,
        Kind::SummerScharlauPerception,
        Kind::SummerSimmerIndex,
        Kind::SummerSimmerPerception,
        Kind::ThomsDiscomfortPerception,
        Kind::WinterScharlauPerception,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::AbsoluteHumidity => "absolute_humidity",
            Kind::DewPoint => "dew_point",
            Kind::DewPointPerception => "dew_point_perception",
            Kind::FrostPoint => "frost_point",
            Kind::FrostRisk => "frost_risk",
            Kind::HeatIndex => "heat_index",
            Kind::Humidex => "humidex",
            Kind::HumidexPerception => "humidex_perception",
            Kind::MoistAirEnthalpy => "moist_air_enthalpy",
            Kind::RelativeStrainPerception => "relative_strain_perception",
            Kind::SummerScharlauPerception => "summer_scharlau_perception",
            Kind::SummerSimmerIndex => "summer_simmer_index",
            Kind::SummerSimmerPerception => "summer_simmer_perception",
            Kind::ThomsDiscomfortPerception => "thoms_discomfort_perception",
            Kind::WinterScharlauPerception => "winter_scharlau_perception",
        }
    }

    /// Human readable name, e.g. "Dew point perception"
    pub fn display_name(&self) -> String {
        let spaced = self.as_str().replace('_', " ");
        let mut chars = spaced.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Kind {
    type Err = ComfortError;

    /// Parse a canonical token, accepting legacy tokens as aliases
    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let token = token.trim();
        if let Some(kind) = Kind::ALL.iter().find(|k| k.as_str() == token) {
            return Ok(*kind);
        }
        LegacyKind::ALL
            .iter()
            .find(|l| l.as_str() == token)
            .map(|l| l.canonical())
            .ok_or_else(|| ComfortError::UnknownKind(token.to_string()))
    }
}

/// Kind tokens from schema version 1, superseded by canonical kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegacyKind {
    ThermalPerception,
    SimmerIndex,
    SimmerZone,
}

impl LegacyKind {
    pub const ALL: [LegacyKind; 3] = [
        LegacyKind::ThermalPerception,
        LegacyKind::SimmerIndex,
        LegacyKind::SimmerZone,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LegacyKind::ThermalPerception => "thermal_perception",
            LegacyKind::SimmerIndex => "simmer_index",
            LegacyKind::SimmerZone => "simmer_zone",
        }
    }

    pub fn canonical(&self) -> Kind {
        match self {
            LegacyKind::ThermalPerception => Kind::DewPointPerception,
            LegacyKind::SimmerIndex => Kind::SummerSimmerIndex,
            LegacyKind::SimmerZone => Kind::SummerSimmerPerception,
        }
    }
}

/// Physical role a source plays within a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputRole {
    Temperature,
    Humidity,
    Pressure,
}

impl InputRole {
    /// Attribute name under which the raw value is published
    pub fn attribute(&self) -> &'static str {
        match self {
            InputRole::Temperature => "temperature",
            InputRole::Humidity => "humidity",
            InputRole::Pressure => "pressure",
        }
    }
}

/// Validity tag attached to every measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Validity {
    /// Parsed, finite and inside the physical domain
    Valid,
    /// Source exists but reports something unusable
    Invalid,
    /// Source entity does not exist
    Missing,
}

/// A sanitized, timestamped reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Parsed value, present only when valid
    pub value: Option<f64>,
    pub timestamp: DateTime<Utc>,
    pub validity: Validity,
}

impl Measurement {
    pub fn valid(value: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            value: Some(value),
            timestamp,
            validity: Validity::Valid,
        }
    }

    pub fn invalid(timestamp: DateTime<Utc>) -> Self {
        Self {
            value: None,
            timestamp,
            validity: Validity::Invalid,
        }
    }

    pub fn missing(timestamp: DateTime<Utc>) -> Self {
        Self {
            value: None,
            timestamp,
            validity: Validity::Missing,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.validity == Validity::Valid
    }
}

/// Valid input values handed to the index formulas
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Inputs {
    /// Air temperature (°C)
    pub temperature: f64,
    /// Relative humidity (%)
    pub humidity: f64,
    /// Station pressure (hPa), when a pressure source is configured
    pub pressure: Option<f64>,
}

impl Inputs {
    pub fn new(temperature: f64, humidity: f64) -> Self {
        Self {
            temperature,
            humidity,
            pressure: None,
        }
    }

    pub fn with_pressure(mut self, pressure: f64) -> Self {
        self.pressure = Some(pressure);
        self
    }

    pub fn get(&self, role: InputRole) -> Option<f64> {
        match role {
            InputRole::Temperature => Some(self.temperature),
            InputRole::Humidity => Some(self.humidity),
            InputRole::Pressure => self.pressure,
        }
    }
}

/// Outcome of a single index computation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexResult {
    pub numeric_value: Option<f64>,
    /// False when the raw inputs lie outside the range the formula is meant for
    pub domain_ok: bool,
}

impl IndexResult {
    pub fn value(value: f64) -> Self {
        Self {
            numeric_value: Some(value),
            domain_ok: true,
        }
    }

    pub fn bounded(value: f64, domain_ok: bool) -> Self {
        Self {
            numeric_value: Some(value),
            domain_ok,
        }
    }

    /// No value exists for these inputs
    pub fn undefined() -> Self {
        Self {
            numeric_value: None,
            domain_ok: false,
        }
    }
}

/// Current state of a published index
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishedState {
    Numeric(f64),
    Category(Category),
    Unknown,
}

impl PublishedState {
    /// Host-facing state string: numeric value, category token or "unknown"
    pub fn as_state_string(&self) -> String {
        match self {
            PublishedState::Numeric(value) => format_state(*value),
            PublishedState::Category(category) => category.token().to_string(),
            PublishedState::Unknown => UNKNOWN_STATE.to_string(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, PublishedState::Unknown)
    }
}

/// One published index of a group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedIndex {
    /// Permanent per-index identifier (root + kind token)
    pub identifier: String,
    /// Host entity id, e.g. `sensor.living_room_dew_point`
    pub entity_id: String,
    pub kind: Kind,
    pub state: PublishedState,
    pub attributes: BTreeMap<String, f64>,
}

impl PublishedIndex {
    pub fn unknown(identifier: &str, entity_id: &str, kind: Kind) -> Self {
        Self {
            identifier: identifier.to_string(),
            entity_id: entity_id.to_string(),
            kind,
            state: PublishedState::Unknown,
            attributes: BTreeMap::new(),
        }
    }
}

/// Render a numeric state with 15 significant digits in shortest form.
///
/// `29.6025` stays `29.6025`, `0` becomes `0.0`.
pub fn format_state(value: f64) -> String {
    let rounded = format!("{value:.14e}").parse::<f64>().unwrap_or(value);
    format!("{rounded:?}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tokens_roundtrip_through_from_str() {
        for kind in Kind::ALL {
            assert_eq!(kind.as_str().parse::<Kind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_legacy_tokens_parse_as_canonical() {
        assert_eq!("thermal_perception".parse::<Kind>().unwrap(), Kind::DewPointPerception);
        assert_eq!("simmer_index".parse::<Kind>().unwrap(), Kind::SummerSimmerIndex);
        assert_eq!("simmer_zone".parse::<Kind>().unwrap(), Kind::SummerSimmerPerception);
        assert!("frost".parse::<Kind>().is_err());
    }

    #[test]
    fn test_kind_serde_uses_tokens_and_aliases() {
        let json = serde_json::to_string(&Kind::ThomsDiscomfortPerception).unwrap();
        assert_eq!(json, "\"thoms_discomfort_perception\"");

        let kind: Kind = serde_json::from_str("\"simmer_zone\"").unwrap();
        assert_eq!(kind, Kind::SummerSimmerPerception);
    }

    #[test]
    fn test_display_name() {
        assert_eq!(Kind::DewPointPerception.display_name(), "Dew point perception");
        assert_eq!(Kind::Humidex.display_name(), "Humidex");
    }

    #[test]
    fn test_format_state() {
        assert_eq!(format_state(29.6025), "29.6025");
        assert_eq!(format_state(0.0), "0.0");
        assert_eq!(format_state(13.875322467201265), "13.8753224672013");
        assert_eq!(format_state(-6.812618227495705), "-6.8126182274957");
    }

    #[test]
    fn test_unknown_state_string() {
        assert_eq!(PublishedState::Unknown.as_state_string(), "unknown");
        assert!(PublishedState::Unknown.is_unknown());
        assert!(!PublishedState::Numeric(1.0).is_unknown());
    }
}
