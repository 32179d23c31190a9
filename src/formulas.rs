//! Index formulas
//!
//! Pure meteorological formulas over valid inputs:
//! - Humidity derived quantities (absolute humidity, dew point, frost point)
//! - Heat stress indices (heat index, humidex, summer simmer)
//! - Moist air enthalpy
//! - Bounded comfort indices (relative strain, Scharlau, Thom)
//!
//! Temperatures are °C, humidity is % and pressure is hPa. Operation order
//! follows the published constants exactly; reordering changes the last digits.

use std::f64::consts::LN_10;

/// Standard atmosphere (hPa)
pub const STANDARD_PRESSURE_HPA: f64 = 1013.25;

/// Index formula library
pub struct IndexLibrary;

impl IndexLibrary {
    /// Absolute humidity (g/m³)
    pub fn absolute_humidity(temperature: f64, humidity: f64) -> f64 {
        let mut abs_humidity = 6.112;
        abs_humidity *= ((17.67 * temperature) / (243.5 + temperature)).exp();
        abs_humidity *= humidity;
        abs_humidity *= 2.1674;
        abs_humidity /= temperature + 273.15;
        abs_humidity
    }

    /// Dew point (°C)
    pub fn dew_point(temperature: f64, humidity: f64) -> f64 {
        let a0 = 373.15 / (273.15 + temperature);
        let mut sum = -7.90298 * (a0 - 1.0);
        sum += 5.02808 * log10(a0);
        sum += -1.3816e-7 * (10f64.powf(11.344 * (1.0 - 1.0 / a0)) - 1.0);
        sum += 8.1328e-3 * (10f64.powf(-3.49149 * (a0 - 1.0)) - 1.0);
        sum += log10(1013.246);
        let vapor_pressure = 10f64.powf(sum - 3.0) * humidity;
        let td = (vapor_pressure / 0.61078).ln();
        (241.88 * td) / (17.558 - td)
    }

    /// Frost point (°C), derived from the dew point
    pub fn frost_point(temperature: f64, humidity: f64) -> f64 {
        let dew_point = Self::dew_point(temperature, humidity);
        let t = temperature + 273.15;
        let td = dew_point + 273.15;
        (td + (2671.02 / ((2954.61 / t) + 2.193665 * t.ln() - 13.3448)) - t) - 273.15
    }

    /// Heat index (°C), computed in Fahrenheit internally
    pub fn heat_index(temperature: f64, humidity: f64) -> f64 {
        let f = celsius_to_fahrenheit(temperature);
        let mut hi = 0.5 * (f + 61.0 + ((f - 68.0) * 1.2) + (humidity * 0.094));

        if hi > 79.0 {
            hi = -42.379 + 2.04901523 * f;
            hi += 10.14333127 * humidity;
            hi += -0.22475541 * f * humidity;
            hi += -0.00683783 * f.powf(2.0);
            hi += -0.05481717 * humidity.powf(2.0);
            hi += 0.00122874 * f.powf(2.0) * humidity;
            hi += 0.00085282 * f * humidity.powf(2.0);
            hi += -0.00000199 * f.powf(2.0) * humidity.powf(2.0);

            if humidity < 13.0 && (80.0..=112.0).contains(&f) {
                hi -= ((13.0 - humidity) * 0.25) * ((17.0 - (f - 95.0).abs()) * 0.05882).sqrt();
            } else if humidity > 85.0 && (80.0..=87.0).contains(&f) {
                hi += ((humidity - 85.0) * 0.1) * ((87.0 - f) * 0.2);
            }
        }

        fahrenheit_to_celsius(hi)
    }

    /// Humidex
    pub fn humidex(temperature: f64, humidity: f64) -> f64 {
        let dew_point = Self::dew_point(temperature, humidity);
        let e = 6.11 * (5417.7530 * ((1.0 / 273.16) - (1.0 / (dew_point + 273.15)))).exp();
        let h = 0.5555 * (e - 10.0);
        temperature + h
    }

    /// Summer simmer index (°C). Evaluated for every temperature.
    pub fn summer_simmer_index(temperature: f64, humidity: f64) -> f64 {
        let f = celsius_to_fahrenheit(temperature);
        let si = 1.98 * (f - (0.55 - 0.0055 * humidity) * (f - 58.0)) - 56.83;
        fahrenheit_to_celsius(si)
    }

    /// Moist air enthalpy (kJ/kg).
    ///
    /// `None` when the vapor pressure reaches the total pressure, where the
    /// humidity ratio is undefined.
    pub fn moist_air_enthalpy(temperature: f64, humidity: f64, pressure_hpa: f64) -> Option<f64> {
        let saturation = saturation_vapor_pressure(temperature);
        let vapor = humidity / 100.0 * saturation;
        let dry_air = pressure_hpa * 100.0 - vapor;
        if dry_air <= 0.0 {
            return None;
        }
        let humidity_ratio = 0.621945 * vapor / dry_air;
        Some(1.006 * temperature + humidity_ratio * (2501.0 + 1.86 * temperature))
    }

    /// Relative strain index, unrounded
    pub fn relative_strain_index(temperature: f64, humidity: f64) -> f64 {
        let vp = 6.112 * 10f64.powf(7.5 * temperature / (237.7 + temperature));
        let e = humidity * vp / 100.0;
        (temperature - 21.0) / (58.0 - e)
    }

    /// Summer Scharlau index, unrounded
    pub fn summer_scharlau_index(temperature: f64, humidity: f64) -> f64 {
        let tc = -17.089 * humidity.ln() + 94.979;
        tc - temperature
    }

    /// Winter Scharlau index, unrounded
    pub fn winter_scharlau_index(temperature: f64, humidity: f64) -> f64 {
        let tc = (0.0003 * humidity) + (0.1497 * humidity) - 7.7133;
        temperature - tc
    }

    /// Thom's discomfort index, unrounded, using the Stull wet-bulb estimate
    pub fn thoms_discomfort_index(temperature: f64, humidity: f64) -> f64 {
        let t = temperature;
        let h = humidity;
        let wet_bulb = t * (0.151977 * (h + 8.313659).powf(0.5)).atan() + (t + h).atan()
            - (h - 1.676331).atan()
            + (0.00391838 * h).powf(1.5) * (0.023101 * h).atan()
            - 4.686035;
        0.5 * (t + wet_bulb)
    }
}

/// Round to two decimals, the precision bounded indices are published at
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn log10(value: f64) -> f64 {
    value.ln() / LN_10
}

fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    (celsius * 1.8) + 32.0
}

fn fahrenheit_to_celsius(fahrenheit: f64) -> f64 {
    (fahrenheit - 32.0) / 1.8
}

/// Saturation vapor pressure (Pa), Hyland-Wexler over water and ice
fn saturation_vapor_pressure(temperature: f64) -> f64 {
    let t = temperature + 273.15;
    if t >= 273.15 {
        (-5.8002206e3 / t
            + 1.3914993
            + -4.8640239e-2 * t
            + 4.1764768e-5 * t.powf(2.0)
            + -1.4452093e-8 * t.powf(3.0)
            + 6.5459673 * t.ln())
        .exp()
    } else {
        (-5.6745359e3 / t
            + 6.3925247
            + -9.677843e-3 * t
            + 6.2215701e-7 * t.powf(2.0)
            + 2.0747825e-9 * t.powf(3.0)
            + -9.484024e-13 * t.powf(4.0)
            + 4.1635019 * t.ln())
        .exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::format_state;

    fn state(value: f64) -> String {
        format_state(value)
    }

    #[test]
    fn test_absolute_humidity() {
        assert_eq!(state(IndexLibrary::absolute_humidity(25.0, 50.0)), "11.5128065738593");
        assert_eq!(state(IndexLibrary::absolute_humidity(15.0, 50.0)), "6.40873986839343");
        assert_eq!(state(IndexLibrary::absolute_humidity(15.0, 25.0)), "3.20436993419671");
    }

    #[test]
    fn test_dew_point() {
        assert_eq!(state(IndexLibrary::dew_point(25.0, 50.0)), "13.8753224672013");
        assert_eq!(state(IndexLibrary::dew_point(15.0, 50.0)), "4.67503901377299");
        assert_eq!(state(IndexLibrary::dew_point(15.0, 25.0)), "-4.86267786296348");
    }

    #[test]
    fn test_dew_point_at_zero_celsius() {
        assert_eq!(state(IndexLibrary::dew_point(0.0, 50.0)), "-9.18867399785112");
    }

    #[test]
    fn test_dew_point_saturated_air() {
        let dp = IndexLibrary::dew_point(20.0, 100.0);
        assert!(dp.is_finite());
        assert!((dp - 20.0).abs() < 0.1);
    }

    #[test]
    fn test_frost_point() {
        assert_eq!(state(IndexLibrary::frost_point(25.0, 50.0)), "10.4218508495602");
        assert_eq!(state(IndexLibrary::frost_point(15.0, 50.0)), "2.72509864924086");
        assert_eq!(state(IndexLibrary::frost_point(15.0, 25.0)), "-6.8126182274957");
        assert_eq!(IndexLibrary::frost_point(25.0, 50.0), 10.421850849560201);
        assert_eq!(IndexLibrary::frost_point(0.0, 57.7), -7.346077951913912);
    }

    #[test]
    fn test_heat_index() {
        assert_eq!(state(IndexLibrary::heat_index(25.0, 50.0)), "24.8611111111111");
        assert_eq!(state(IndexLibrary::heat_index(15.0, 50.0)), "13.8611111111111");
        assert_eq!(state(IndexLibrary::heat_index(15.0, 25.0)), "13.2083333333333");
        // full regression with the dry-air adjustment
        assert_eq!(state(IndexLibrary::heat_index(28.0, 12.0)), "26.5451914107181");
    }

    #[test]
    fn test_heat_index_simple_band_skips_adjustments() {
        // 27 °C / 5 % averages to 78.595 °F, below the regression threshold
        assert_eq!(IndexLibrary::heat_index(27.0, 5.0), 25.88611111111111);
        assert_eq!(state(IndexLibrary::heat_index(27.0, 5.0)), "25.8861111111111");
    }

    #[test]
    fn test_humidex() {
        assert_eq!(state(IndexLibrary::humidex(25.0, 50.0)), "28.2925656121491");
        assert_eq!(state(IndexLibrary::humidex(15.0, 50.0)), "14.18042805384");
        assert_eq!(state(IndexLibrary::humidex(15.0, 25.0)), "11.8124622223777");
        assert_eq!(state(IndexLibrary::humidex(28.0, 12.0)), "24.9644772432578");
        assert_eq!(state(IndexLibrary::humidex(35.95, 70.0)), "54.0070687092117");
    }

    #[test]
    fn test_summer_simmer_index() {
        assert_eq!(state(IndexLibrary::summer_simmer_index(25.0, 50.0)), "29.6025");
        assert_eq!(state(IndexLibrary::summer_simmer_index(15.0, 50.0)), "15.2475");
        assert_eq!(state(IndexLibrary::summer_simmer_index(25.0, 35.0)), "27.87825");
        assert_eq!(state(IndexLibrary::summer_simmer_index(40.0, 45.0)), "49.7435");
    }

    #[test]
    fn test_summer_simmer_index_has_no_cold_shortcut() {
        let value = IndexLibrary::summer_simmer_index(0.0, 50.0);
        assert_eq!(state(value), "-6.28499999999999");
    }

    #[test]
    fn test_moist_air_enthalpy() {
        let p = STANDARD_PRESSURE_HPA;
        let enthalpy = |t, h| IndexLibrary::moist_air_enthalpy(t, h, p).map(state);
        assert_eq!(enthalpy(25.0, 50.0).as_deref(), Some("50.3219588021847"));
        assert_eq!(enthalpy(20.77, 60.82).as_deref(), Some("44.4961886780509"));
    }

    #[test]
    fn test_moist_air_enthalpy_below_freezing_and_low_pressure() {
        let cold = IndexLibrary::moist_air_enthalpy(-5.0, 50.0, STANDARD_PRESSURE_HPA).unwrap();
        assert_eq!(state(cold), "-1.95153555192761");

        let low = IndexLibrary::moist_air_enthalpy(25.0, 50.0, 1000.0).unwrap();
        assert_eq!(state(low), "50.6608574725528");
    }

    #[test]
    fn test_moist_air_enthalpy_undefined_when_vapor_exceeds_pressure() {
        assert_eq!(IndexLibrary::moist_air_enthalpy(25.0, 50.0, 1.0), None);
        assert_eq!(IndexLibrary::moist_air_enthalpy(25.0, 50.0, 15.0), None);
        assert!(IndexLibrary::moist_air_enthalpy(25.0, 50.0, 16.0).is_some());
    }

    #[test]
    fn test_relative_strain_index() {
        assert_eq!(round2(IndexLibrary::relative_strain_index(25.0, 50.0)), 0.09);
        assert_eq!(round2(IndexLibrary::relative_strain_index(35.01, 50.0)), 0.47);
        assert_eq!(round2(IndexLibrary::relative_strain_index(26.0, 70.0)), 0.14);
        assert_eq!(round2(IndexLibrary::relative_strain_index(31.5, 75.0)), 0.45);
    }

    #[test]
    fn test_scharlau_indices() {
        assert_eq!(round2(IndexLibrary::summer_scharlau_index(25.0, 50.0)), 3.13);
        assert_eq!(round2(IndexLibrary::summer_scharlau_index(36.31, 31.0)), -0.01);
        assert_eq!(round2(IndexLibrary::winter_scharlau_index(25.0, 50.0)), 25.21);
        assert_eq!(round2(IndexLibrary::winter_scharlau_index(-0.07, 71.0)), -3.01);
    }

    #[test]
    fn test_thoms_discomfort_index() {
        assert_eq!(round2(IndexLibrary::thoms_discomfort_index(25.0, 50.0)), 20.94);
        assert_eq!(round2(IndexLibrary::thoms_discomfort_index(25.06, 50.05)), 21.0);
        assert_eq!(round2(IndexLibrary::thoms_discomfort_index(35.2, 75.1)), 32.0);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(3.1264), 3.13);
        assert_eq!(round2(-1.0028), -1.0);
        assert_eq!(round2(0.0046), 0.0);
    }
}
