//! Index definitions
//!
//! A static table with one record per [`Kind`]: which inputs it needs, how to
//! compute it and, for perception kinds, how to classify the result and under
//! which attribute the underlying index value is published.

use crate::formulas::{round2, IndexLibrary, STANDARD_PRESSURE_HPA};
use crate::perception::{input_domain_ok, Category, PerceptionClassifier};
use crate::types::{IndexResult, InputRole, Inputs, Kind};

pub type ComputeFn = fn(&Inputs) -> IndexResult;
/// Classifies the computed value of a perception kind
pub type ClassifyFn = fn(f64, &Inputs) -> Category;

/// Static description of one index kind
pub struct IndexDefinition {
    pub kind: Kind,
    /// Inputs that must be valid for the index to be computed
    pub required: &'static [InputRole],
    /// Inputs used when the group configures a source for them
    pub optional: &'static [InputRole],
    pub compute: ComputeFn,
    pub classify: Option<ClassifyFn>,
    /// Attribute carrying the underlying index value of a perception kind
    pub attribute: Option<&'static str>,
}

impl IndexDefinition {
    /// Run the compute function of `kind`
    pub fn compute_for(kind: Kind, inputs: &Inputs) -> IndexResult {
        (definition(kind).compute)(inputs)
    }

    pub fn is_perception(&self) -> bool {
        self.classify.is_some()
    }

    /// Inputs this kind reads for a group, given whether a pressure source exists
    pub fn inputs(&self, has_pressure: bool) -> Vec<InputRole> {
        let mut roles = self.required.to_vec();
        if has_pressure {
            roles.extend(self.optional.iter().copied());
        }
        roles
    }
}

const TEMPERATURE_HUMIDITY: &[InputRole] = &[InputRole::Temperature, InputRole::Humidity];
const NO_INPUTS: &[InputRole] = &[];
const PRESSURE: &[InputRole] = &[InputRole::Pressure];

// Ordered like `Kind`, so `kind as usize` indexes the table.
static DEFINITIONS: [IndexDefinition; 15] = [
    numeric(Kind::AbsoluteHumidity, compute_absolute_humidity),
    numeric(Kind::DewPoint, compute_dew_point),
    perception(
        Kind::DewPointPerception,
        compute_dew_point,
        PerceptionClassifier::classify_dew_point,
        "dew_point",
    ),
    numeric(Kind::FrostPoint, compute_frost_point),
    perception(
        Kind::FrostRisk,
        compute_frost_point,
        PerceptionClassifier::classify_frost_risk,
        "frost_point",
    ),
    numeric(Kind::HeatIndex, compute_heat_index),
    numeric(Kind::Humidex, compute_humidex),
    perception(
        Kind::HumidexPerception,
        compute_humidex,
        PerceptionClassifier::classify_humidex,
        "humidex",
    ),
    IndexDefinition {
        kind: Kind::MoistAirEnthalpy,
        required: TEMPERATURE_HUMIDITY,
        optional: PRESSURE,
        compute: compute_moist_air_enthalpy,
        classify: None,
        attribute: None,
    },
    perception(
        Kind::RelativeStrainPerception,
        compute_relative_strain,
        PerceptionClassifier::classify_relative_strain,
        "relative_strain_index",
    ),
    perception(
        Kind::SummerScharlauPerception,
        compute_summer_scharlau,
        PerceptionClassifier::classify_summer_scharlau,
        "summer_scharlau_index",
    ),
    numeric(Kind::SummerSimmerIndex, compute_summer_simmer),
    perception(
        Kind::SummerSimmerPerception,
        compute_summer_simmer,
        PerceptionClassifier::classify_summer_simmer,
        "summer_simmer_index",
    ),
    perception(
        Kind::ThomsDiscomfortPerception,
        compute_thoms_discomfort,
        PerceptionClassifier::classify_thoms_discomfort,
        "thoms_discomfort_index",
    ),
    perception(
        Kind::WinterScharlauPerception,
        compute_winter_scharlau,
        PerceptionClassifier::classify_winter_scharlau,
        "winter_scharlau_index",
    ),
];

/// Look up the definition of a kind
pub fn definition(kind: Kind) -> &'static IndexDefinition {
    &DEFINITIONS[kind as usize]
}

/// All definitions in kind order
pub fn definitions() -> &'static [IndexDefinition] {
    &DEFINITIONS
}

const fn numeric(kind: Kind, compute: ComputeFn) -> IndexDefinition {
    IndexDefinition {
        kind,
        required: TEMPERATURE_HUMIDITY,
        optional: NO_INPUTS,
        compute,
        classify: None,
        attribute: None,
    }
}

const fn perception(
    kind: Kind,
    compute: ComputeFn,
    classify: ClassifyFn,
    attribute: &'static str,
) -> IndexDefinition {
    IndexDefinition {
        kind,
        required: TEMPERATURE_HUMIDITY,
        optional: NO_INPUTS,
        compute,
        classify: Some(classify),
        attribute: Some(attribute),
    }
}

fn compute_absolute_humidity(inputs: &Inputs) -> IndexResult {
    IndexResult::value(IndexLibrary::absolute_humidity(inputs.temperature, inputs.humidity))
}

fn compute_dew_point(inputs: &Inputs) -> IndexResult {
    IndexResult::value(IndexLibrary::dew_point(inputs.temperature, inputs.humidity))
}

fn compute_frost_point(inputs: &Inputs) -> IndexResult {
    IndexResult::value(IndexLibrary::frost_point(inputs.temperature, inputs.humidity))
}

fn compute_heat_index(inputs: &Inputs) -> IndexResult {
    IndexResult::value(IndexLibrary::heat_index(inputs.temperature, inputs.humidity))
}

fn compute_humidex(inputs: &Inputs) -> IndexResult {
    IndexResult::value(IndexLibrary::humidex(inputs.temperature, inputs.humidity))
}

fn compute_summer_simmer(inputs: &Inputs) -> IndexResult {
    IndexResult::value(IndexLibrary::summer_simmer_index(inputs.temperature, inputs.humidity))
}

fn compute_moist_air_enthalpy(inputs: &Inputs) -> IndexResult {
    let pressure = inputs.pressure.unwrap_or(STANDARD_PRESSURE_HPA);
    match IndexLibrary::moist_air_enthalpy(inputs.temperature, inputs.humidity, pressure) {
        Some(enthalpy) => IndexResult::value(enthalpy),
        None => IndexResult::undefined(),
    }
}

fn compute_relative_strain(inputs: &Inputs) -> IndexResult {
    let index = IndexLibrary::relative_strain_index(inputs.temperature, inputs.humidity);
    IndexResult::bounded(
        round2(index),
        input_domain_ok(Kind::RelativeStrainPerception, inputs),
    )
}

fn compute_summer_scharlau(inputs: &Inputs) -> IndexResult {
    let index = IndexLibrary::summer_scharlau_index(inputs.temperature, inputs.humidity);
    IndexResult::bounded(
        round2(index),
        input_domain_ok(Kind::SummerScharlauPerception, inputs),
    )
}

fn compute_winter_scharlau(inputs: &Inputs) -> IndexResult {
    let index = IndexLibrary::winter_scharlau_index(inputs.temperature, inputs.humidity);
    IndexResult::bounded(
        round2(index),
        input_domain_ok(Kind::WinterScharlauPerception, inputs),
    )
}

fn compute_thoms_discomfort(inputs: &Inputs) -> IndexResult {
    let index = IndexLibrary::thoms_discomfort_index(inputs.temperature, inputs.humidity);
    IndexResult::value(round2(index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_matches_kind_order() {
        for (position, kind) in Kind::ALL.iter().enumerate() {
            assert_eq!(DEFINITIONS[position].kind, *kind);
            assert_eq!(definition(*kind).kind, *kind);
        }
    }

    #[test]
    fn test_perception_kinds_carry_attribute() {
        for def in definitions() {
            assert_eq!(def.is_perception(), def.attribute.is_some(), "{}", def.kind);
        }
        assert!(definition(Kind::FrostRisk).is_perception());
        assert!(!definition(Kind::SummerSimmerIndex).is_perception());
    }

    #[test]
    fn test_only_enthalpy_reads_pressure() {
        for def in definitions() {
            let reads_pressure = def.inputs(true).contains(&InputRole::Pressure);
            assert_eq!(reads_pressure, def.kind == Kind::MoistAirEnthalpy);
            assert!(!def.inputs(false).contains(&InputRole::Pressure));
        }
    }

    #[test]
    fn test_out_of_domain_still_has_value() {
        let result = IndexDefinition::compute_for(
            Kind::RelativeStrainPerception,
            &Inputs::new(25.0, 50.0),
        );
        assert_eq!(result.numeric_value, Some(0.09));
        assert!(!result.domain_ok);
    }

    #[test]
    fn test_enthalpy_uses_configured_pressure() {
        let standard = IndexDefinition::compute_for(Kind::MoistAirEnthalpy, &Inputs::new(25.0, 50.0));
        let low = IndexDefinition::compute_for(
            Kind::MoistAirEnthalpy,
            &Inputs::new(25.0, 50.0).with_pressure(1000.0),
        );
        assert!(low.numeric_value.unwrap() > standard.numeric_value.unwrap());
    }
}
