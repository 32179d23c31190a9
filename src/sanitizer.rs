//! Reading sanitization
//!
//! This module turns raw source states into typed measurements.
//! - Absent source → Missing
//! - Sentinel, non-numeric or non-finite states → Invalid
//! - Values outside the physical domain of their role → Invalid

use crate::types::{InputRole, Measurement};
use chrono::{DateTime, Utc};

/// Host states that mean "no reading right now"
pub const SENTINEL_STATES: [&str; 2] = ["unavailable", "unknown"];

/// Absolute zero (°C)
pub const ABSOLUTE_ZERO_C: f64 = -273.15;

/// Sanitizer for converting raw source states to measurements
pub struct ValueSanitizer;

impl ValueSanitizer {
    /// Sanitize one raw state.
    ///
    /// `raw` is `None` when the source entity does not exist at all.
    pub fn sanitize(role: InputRole, raw: Option<&str>, now: DateTime<Utc>) -> Measurement {
        let Some(raw) = raw else {
            return Measurement::missing(now);
        };

        let trimmed = raw.trim();
        if SENTINEL_STATES
            .iter()
            .any(|sentinel| trimmed.eq_ignore_ascii_case(sentinel))
        {
            return Measurement::invalid(now);
        }

        match trimmed.parse::<f64>() {
            Ok(value) => Self::sanitize_value(role, value, now),
            Err(_) => Measurement::invalid(now),
        }
    }

    /// Sanitize an already numeric reading
    pub fn sanitize_value(role: InputRole, value: f64, now: DateTime<Utc>) -> Measurement {
        if value.is_finite() && in_physical_domain(role, value) {
            Measurement::valid(value, now)
        } else {
            Measurement::invalid(now)
        }
    }
}

/// Physical domain per role.
///
/// Humidity of exactly 0 % and temperature of exactly absolute zero are
/// rejected: the formulas are singular there.
fn in_physical_domain(role: InputRole, value: f64) -> bool {
    match role {
        InputRole::Temperature => value > ABSOLUTE_ZERO_C,
        InputRole::Humidity => value > 0.0 && value <= 100.0,
        InputRole::Pressure => value > 0.0,
    }
}
