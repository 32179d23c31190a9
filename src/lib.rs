//! Thermal Comfort - thermal comfort index engine
//!
//! Derives comfort indices (dew point, heat index, humidex, frost risk,
//! summer simmer, moist air enthalpy, Scharlau and Thom's indices) and their
//! perception categories from live temperature, humidity and optional
//! pressure readings, and keeps every published index under a stable
//! identifier across reloads and schema migrations.
//!
//! Data flow: raw source state → sanitizer → measurement cache → index
//! formulas → perception classifier → published index.
//!
//! ## Modules
//!
//! - **Computation**: `sanitizer`, `formulas`, `perception`, `index`
//! - **Groups**: `config`, `cache`, `coordinator`, `hub`, `identity`
//! - **Host boundary**: `adapters`, `encoder`, and `driver` (feature `runtime`)

pub mod adapters;
pub mod cache;
pub mod config;
pub mod coordinator;
pub mod encoder;
pub mod error;
pub mod formulas;
pub mod hub;
pub mod identity;
pub mod index;
pub mod perception;
pub mod sanitizer;
pub mod types;

#[cfg(feature = "runtime")]
pub mod driver;

pub use config::{ComfortConfig, GroupConfig, ThermalGroup, UpdateMode};
pub use coordinator::{GroupCoordinator, SubscriptionHandle, Trigger};
pub use encoder::RecordEncoder;
pub use error::ComfortError;
pub use formulas::IndexLibrary;
pub use hub::ComfortHub;
pub use identity::{IdentityManager, SCHEMA_VERSION};
pub use perception::{Category, PerceptionClassifier};
pub use sanitizer::ValueSanitizer;
pub use types::{InputRole, Inputs, Kind, Measurement, PublishedIndex, PublishedState, Validity};

#[cfg(feature = "runtime")]
pub use driver::GroupDriver;

/// Engine version embedded in every encoded batch
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for encoded batches
pub const PRODUCER_NAME: &str = "thermal-comfort";

/// Compute and classify one kind from plain values.
///
/// Returns the host state string: a numeric value, a category token, or
/// "unknown" when a value is not a valid reading.
pub fn compute_state(kind: Kind, temperature: f64, humidity: f64, pressure: Option<f64>) -> String {
    let now = chrono::Utc::now();
    let value = |role, value| ValueSanitizer::sanitize_value(role, value, now).value;

    let (Some(temperature), Some(humidity)) = (
        value(InputRole::Temperature, temperature),
        value(InputRole::Humidity, humidity),
    ) else {
        return types::UNKNOWN_STATE.to_string();
    };
    let mut inputs = Inputs::new(temperature, humidity);
    if let Some(pressure) = pressure {
        match value(InputRole::Pressure, pressure) {
            Some(pressure) => inputs = inputs.with_pressure(pressure),
            None => return types::UNKNOWN_STATE.to_string(),
        }
    }

    let result = index::IndexDefinition::compute_for(kind, &inputs);
    match PerceptionClassifier::classify(kind, &result, &inputs) {
        Some(category) => category.token().to_string(),
        None => result
            .numeric_value
            .map(types::format_state)
            .unwrap_or_else(|| types::UNKNOWN_STATE.to_string()),
    }
}
