//! Perception classification
//!
//! Maps index values onto ordered perception bands. Bands are literal
//! threshold tables scanned from the most extreme band inward; the first
//! band whose lower bound the value meets wins.
//!
//! Relative strain and both Scharlau indices are only meaningful for part of
//! the temperature/humidity plane. Outside it they classify as
//! [`Category::OutsideCalculableRange`] while their numeric value is still
//! published.

use crate::formulas::IndexLibrary;
use crate::index;
use crate::types::{IndexResult, Inputs, Kind};
use serde::{Deserialize, Serialize};

/// Absolute humidity (g/m³) separating dry from moist frost conditions
pub const FROST_RISK_HUMIDITY_LIMIT: f64 = 2.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DewPointPerception {
    Dry,
    VeryComfortable,
    Comfortable,
    OkButHumid,
    SomewhatUncomfortable,
    QuiteUncomfortable,
    ExtremelyUncomfortable,
    SeverelyHigh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrostRisk {
    None,
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HumidexPerception {
    Comfortable,
    NoticableDiscomfort,
    EvidentDiscomfort,
    GreatDiscomfort,
    DangerousDiscomfort,
    HeatStroke,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummerSimmerPerception {
    Cool,
    SlightlyCool,
    Comfortable,
    SlightlyWarm,
    IncreasingDiscomfort,
    ExtremelyWarm,
    DangerOfHeatstroke,
    ExtremeDangerOfHeatstroke,
    CirculatoryCollapseImminent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelativeStrainPerception {
    Comfortable,
    SlightDiscomfort,
    Discomfort,
    SignificantDiscomfort,
    ExtremeDiscomfort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScharlauPerception {
    HighlyUncomfortable,
    ModeratelyUncomfortable,
    SlightlyUncomfortable,
    Comfortable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThomsDiscomfortPerception {
    NoDiscomfort,
    LessThanHalf,
    MoreThanHalf,
    Most,
    Everyone,
    Dangerous,
}

/// A classification outcome of any perception kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    DewPoint(DewPointPerception),
    FrostRisk(FrostRisk),
    Humidex(HumidexPerception),
    SummerSimmer(SummerSimmerPerception),
    RelativeStrain(RelativeStrainPerception),
    Scharlau(ScharlauPerception),
    ThomsDiscomfort(ThomsDiscomfortPerception),
    OutsideCalculableRange,
}

impl Category {
    /// Host-facing state token
    pub fn token(&self) -> &'static str {
        match self {
            Category::DewPoint(p) => match p {
                DewPointPerception::Dry => "dry",
                DewPointPerception::VeryComfortable => "very_comfortable",
                DewPointPerception::Comfortable => "comfortable",
                DewPointPerception::OkButHumid => "ok_but_humid",
                DewPointPerception::SomewhatUncomfortable => "somewhat_uncomfortable",
                DewPointPerception::QuiteUncomfortable => "quite_uncomfortable",
                DewPointPerception::ExtremelyUncomfortable => "extremely_uncomfortable",
                DewPointPerception::SeverelyHigh => "severely_high",
            },
            Category::FrostRisk(r) => match r {
                FrostRisk::None => "no_risk",
                FrostRisk::Low => "unlikely",
                FrostRisk::Medium => "probable",
                FrostRisk::High => "high",
            },
            Category::Humidex(p) => match p {
                HumidexPerception::Comfortable => "comfortable",
                HumidexPerception::NoticableDiscomfort => "noticable_discomfort",
                HumidexPerception::EvidentDiscomfort => "evident_discomfort",
                HumidexPerception::GreatDiscomfort => "great_discomfort",
                HumidexPerception::DangerousDiscomfort => "dangerous_discomfort",
                HumidexPerception::HeatStroke => "heat_stroke",
            },
            Category::SummerSimmer(p) => match p {
                SummerSimmerPerception::Cool => "cool",
                SummerSimmerPerception::SlightlyCool => "slightly_cool",
                SummerSimmerPerception::Comfortable => "comfortable",
                SummerSimmerPerception::SlightlyWarm => "slightly_warm",
                SummerSimmerPerception::IncreasingDiscomfort => "increasing_discomfort",
                SummerSimmerPerception::ExtremelyWarm => "extremely_warm",
                SummerSimmerPerception::DangerOfHeatstroke => "danger_of_heatstroke",
                SummerSimmerPerception::ExtremeDangerOfHeatstroke => {
                    "extreme_danger_of_heatstroke"
                }
                SummerSimmerPerception::CirculatoryCollapseImminent => {
                    "circulatory_collapse_imminent"
                }
            },
            Category::RelativeStrain(p) => match p {
                RelativeStrainPerception::Comfortable => "comfortable",
                RelativeStrainPerception::SlightDiscomfort => "slight_discomfort",
                RelativeStrainPerception::Discomfort => "discomfort",
                RelativeStrainPerception::SignificantDiscomfort => "significant_discomfort",
                RelativeStrainPerception::ExtremeDiscomfort => "extreme_discomfort",
            },
            Category::Scharlau(p) => match p {
                ScharlauPerception::Comfortable => "comfortable",
                ScharlauPerception::SlightlyUncomfortable => "slightly_uncomfortable",
                ScharlauPerception::ModeratelyUncomfortable => "moderately_uncomfortable",
                ScharlauPerception::HighlyUncomfortable => "highly_uncomfortable",
            },
            Category::ThomsDiscomfort(p) => match p {
                ThomsDiscomfortPerception::NoDiscomfort => "no_discomfort",
                ThomsDiscomfortPerception::LessThanHalf => "less_than_half",
                ThomsDiscomfortPerception::MoreThanHalf => "more_than_half",
                ThomsDiscomfortPerception::Most => "most",
                ThomsDiscomfortPerception::Everyone => "everyone",
                ThomsDiscomfortPerception::Dangerous => "dangerous",
            },
            Category::OutsideCalculableRange => "outside_calculable_range",
        }
    }
}

const DEW_POINT_BANDS: [(f64, DewPointPerception); 7] = [
    (26.0, DewPointPerception::SeverelyHigh),
    (24.0, DewPointPerception::ExtremelyUncomfortable),
    (21.0, DewPointPerception::QuiteUncomfortable),
    (18.0, DewPointPerception::SomewhatUncomfortable),
    (16.0, DewPointPerception::OkButHumid),
    (13.0, DewPointPerception::Comfortable),
    (10.0, DewPointPerception::VeryComfortable),
];

// Heat stroke starts strictly above 54, see `humidex_perception`.
const HUMIDEX_BANDS: [(f64, HumidexPerception); 4] = [
    (45.0, HumidexPerception::DangerousDiscomfort),
    (40.0, HumidexPerception::GreatDiscomfort),
    (35.0, HumidexPerception::EvidentDiscomfort),
    (30.0, HumidexPerception::NoticableDiscomfort),
];

const SUMMER_SIMMER_BANDS: [(f64, SummerSimmerPerception); 8] = [
    (65.6, SummerSimmerPerception::CirculatoryCollapseImminent),
    (51.7, SummerSimmerPerception::ExtremeDangerOfHeatstroke),
    (44.4, SummerSimmerPerception::DangerOfHeatstroke),
    (37.8, SummerSimmerPerception::ExtremelyWarm),
    (32.8, SummerSimmerPerception::IncreasingDiscomfort),
    (28.3, SummerSimmerPerception::SlightlyWarm),
    (25.0, SummerSimmerPerception::Comfortable),
    (21.1, SummerSimmerPerception::SlightlyCool),
];

const RELATIVE_STRAIN_BANDS: [(f64, RelativeStrainPerception); 4] = [
    (0.45, RelativeStrainPerception::ExtremeDiscomfort),
    (0.35, RelativeStrainPerception::SignificantDiscomfort),
    (0.25, RelativeStrainPerception::Discomfort),
    (0.15, RelativeStrainPerception::SlightDiscomfort),
];

const SCHARLAU_BANDS: [(f64, ScharlauPerception); 3] = [
    (0.0, ScharlauPerception::Comfortable),
    (-1.0, ScharlauPerception::SlightlyUncomfortable),
    (-3.0, ScharlauPerception::ModeratelyUncomfortable),
];

const THOMS_DISCOMFORT_BANDS: [(f64, ThomsDiscomfortPerception); 5] = [
    (32.0, ThomsDiscomfortPerception::Dangerous),
    (29.0, ThomsDiscomfortPerception::Everyone),
    (27.0, ThomsDiscomfortPerception::Most),
    (24.0, ThomsDiscomfortPerception::MoreThanHalf),
    (21.0, ThomsDiscomfortPerception::LessThanHalf),
];

/// One row of the frost risk table. A row matches when the temperature and
/// frost point are at or below its limits and the humidity condition holds.
struct FrostRiskRule {
    max_temperature: f64,
    max_frost_point: f64,
    /// Whether the row applies to humid or to dry air
    humid: bool,
    risk: FrostRisk,
}

const FROST_RISK_RULES: [FrostRiskRule; 3] = [
    FrostRiskRule {
        max_temperature: 1.0,
        max_frost_point: 0.0,
        humid: false,
        risk: FrostRisk::Low,
    },
    FrostRiskRule {
        max_temperature: 1.0,
        max_frost_point: 0.0,
        humid: true,
        risk: FrostRisk::High,
    },
    FrostRiskRule {
        max_temperature: 4.0,
        max_frost_point: 0.5,
        humid: true,
        risk: FrostRisk::Medium,
    },
];

fn band<C: Copy>(value: f64, bands: &[(f64, C)], floor: C) -> C {
    bands
        .iter()
        .find(|(lower, _)| value >= *lower)
        .map(|(_, category)| *category)
        .unwrap_or(floor)
}

pub fn dew_point_perception(dew_point: f64) -> DewPointPerception {
    band(dew_point, &DEW_POINT_BANDS, DewPointPerception::Dry)
}

pub fn humidex_perception(humidex: f64) -> HumidexPerception {
    if humidex > 54.0 {
        return HumidexPerception::HeatStroke;
    }
    band(humidex, &HUMIDEX_BANDS, HumidexPerception::Comfortable)
}

pub fn summer_simmer_perception(index: f64) -> SummerSimmerPerception {
    band(index, &SUMMER_SIMMER_BANDS, SummerSimmerPerception::Cool)
}

/// Classify an already rounded relative strain index
pub fn relative_strain_perception(index: f64) -> RelativeStrainPerception {
    band(index, &RELATIVE_STRAIN_BANDS, RelativeStrainPerception::Comfortable)
}

/// Classify an unrounded Scharlau index
pub fn scharlau_perception(index: f64) -> ScharlauPerception {
    band(index, &SCHARLAU_BANDS, ScharlauPerception::HighlyUncomfortable)
}

/// Classify an already rounded Thom's discomfort index
pub fn thoms_discomfort_perception(index: f64) -> ThomsDiscomfortPerception {
    band(index, &THOMS_DISCOMFORT_BANDS, ThomsDiscomfortPerception::NoDiscomfort)
}

/// Frost risk from ambient temperature, frost point and absolute humidity jointly
pub fn frost_risk(temperature: f64, frost_point: f64, absolute_humidity: f64) -> FrostRisk {
    let humid = absolute_humidity > FROST_RISK_HUMIDITY_LIMIT;
    FROST_RISK_RULES
        .iter()
        .find(|rule| {
            temperature <= rule.max_temperature
                && frost_point <= rule.max_frost_point
                && rule.humid == humid
        })
        .map(|rule| rule.risk)
        .unwrap_or(FrostRisk::None)
}

/// Whether the raw inputs lie in the range a bounded index is defined for
pub fn input_domain_ok(kind: Kind, inputs: &Inputs) -> bool {
    let t = inputs.temperature;
    let h = inputs.humidity;
    match kind {
        Kind::RelativeStrainPerception => (26.0..=35.0).contains(&t),
        Kind::SummerScharlauPerception => (17.0..=39.0).contains(&t) && h >= 30.0,
        Kind::WinterScharlauPerception => (-5.0..=6.0).contains(&t) && h >= 40.0,
        _ => true,
    }
}

/// Perception classifier
pub struct PerceptionClassifier;

impl PerceptionClassifier {
    /// Classify a computed index.
    ///
    /// Returns `None` for numeric kinds that carry no category, and for
    /// results without a value.
    pub fn classify(kind: Kind, result: &IndexResult, inputs: &Inputs) -> Option<Category> {
        let classify = index::definition(kind).classify?;
        let value = result.numeric_value?;
        if !result.domain_ok || !input_domain_ok(kind, inputs) {
            return Some(Category::OutsideCalculableRange);
        }
        Some(classify(value, inputs))
    }

    pub(crate) fn classify_dew_point(dew_point: f64, _inputs: &Inputs) -> Category {
        Category::DewPoint(dew_point_perception(dew_point))
    }

    pub(crate) fn classify_frost_risk(frost_point: f64, inputs: &Inputs) -> Category {
        let absolute_humidity = IndexLibrary::absolute_humidity(inputs.temperature, inputs.humidity);
        Category::FrostRisk(frost_risk(inputs.temperature, frost_point, absolute_humidity))
    }

    pub(crate) fn classify_humidex(humidex: f64, _inputs: &Inputs) -> Category {
        Category::Humidex(humidex_perception(humidex))
    }

    pub(crate) fn classify_summer_simmer(index: f64, _inputs: &Inputs) -> Category {
        Category::SummerSimmer(summer_simmer_perception(index))
    }

    pub(crate) fn classify_relative_strain(index: f64, _inputs: &Inputs) -> Category {
        Category::RelativeStrain(relative_strain_perception(index))
    }

    // Scharlau bands apply to the unrounded index; the published value is rounded.
    pub(crate) fn classify_summer_scharlau(_index: f64, inputs: &Inputs) -> Category {
        let index = IndexLibrary::summer_scharlau_index(inputs.temperature, inputs.humidity);
        Category::Scharlau(scharlau_perception(index))
    }

    pub(crate) fn classify_winter_scharlau(_index: f64, inputs: &Inputs) -> Category {
        let index = IndexLibrary::winter_scharlau_index(inputs.temperature, inputs.humidity);
        Category::Scharlau(scharlau_perception(index))
    }

    pub(crate) fn classify_thoms_discomfort(index: f64, _inputs: &Inputs) -> Category {
        Category::ThomsDiscomfort(thoms_discomfort_perception(index))
    }
}
