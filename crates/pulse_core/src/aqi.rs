//! Índice de qualidade do ar (AQI/EPA) a partir do PM2.5.
//!
//! Interpolação linear em seis segmentos de breakpoints oficiais:
//!
//! | PM2.5 (µg/m³) | AQI     |
//! |---------------|---------|
//! | 0.0–12.0      | 0–50    |
//! | 12.1–35.4     | 51–100  |
//! | 35.5–55.4     | 101–150 |
//! | 55.5–150.4    | 151–200 |
//! | 150.5–250.4   | 201–300 |
//! | 250.5–500.4   | 301–500 |
//!
//! O resultado é **truncado** (não arredondado). Acima de 500.4 o último
//! segmento é extrapolado.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Um segmento: `(c_low, c_high, i_low, i_high)`.
type Breakpoint = (f64, f64, f64, f64);

const BREAKPOINTS: [Breakpoint; 6] = [
    (0.0, 12.0, 0.0, 50.0),
    (12.1, 35.4, 51.0, 100.0),
    (35.5, 55.4, 101.0, 150.0),
    (55.5, 150.4, 151.0, 200.0),
    (150.5, 250.4, 201.0, 300.0),
    (250.5, 500.4, 301.0, 500.0),
];

/// Faixa de risco do AQI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AqiCategory {
    Good,
    Moderate,
    UnhealthyForSensitive,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

impl AqiCategory {
    /// Faixa correspondente a um AQI inteiro.
    pub fn from_aqi(aqi: i32) -> Self {
        match aqi {
            i32::MIN..=50 => AqiCategory::Good,
            51..=100 => AqiCategory::Moderate,
            101..=150 => AqiCategory::UnhealthyForSensitive,
            151..=200 => AqiCategory::Unhealthy,
            201..=300 => AqiCategory::VeryUnhealthy,
            _ => AqiCategory::Hazardous,
        }
    }

    /// Rótulo oficial da EPA.
    pub fn label(self) -> &'static str {
        match self {
            AqiCategory::Good => "Good",
            AqiCategory::Moderate => "Moderate",
            AqiCategory::UnhealthyForSensitive => "Unhealthy for Sensitive Groups",
            AqiCategory::Unhealthy => "Unhealthy",
            AqiCategory::VeryUnhealthy => "Very Unhealthy",
            AqiCategory::Hazardous => "Hazardous",
        }
    }
}

impl fmt::Display for AqiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// AQI calculado para uma leitura.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AqiResult {
    pub value: i32,
    pub category: AqiCategory,
}

/// AQI inteiro (truncado) para uma concentração de PM2.5.
pub fn aqi_pm25(pm25: f64) -> i32 {
    let (c_low, c_high, i_low, i_high) = BREAKPOINTS
        .iter()
        .copied()
        .find(|&(_, c_high, _, _)| pm25 <= c_high)
        .unwrap_or(BREAKPOINTS[BREAKPOINTS.len() - 1]);

    let aqi = (i_high - i_low) / (c_high - c_low) * (pm25 - c_low) + i_low;
    aqi.trunc() as i32
}

/// AQI + faixa.
pub fn calculate(pm25: f64) -> AqiResult {
    let value = aqi_pm25(pm25);
    AqiResult {
        value,
        category: AqiCategory::from_aqi(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worked_example_truncates() {
        // 50/12 * 4.5 = 18.75
        assert_eq!(aqi_pm25(4.5), 18);
        assert_eq!(calculate(4.5).category, AqiCategory::Good);
    }

    #[test]
    fn breakpoint_edges() {
        assert_eq!(aqi_pm25(0.0), 0);
        assert_eq!(aqi_pm25(12.0), 50);
        assert_eq!(aqi_pm25(12.1), 51);
        assert_eq!(aqi_pm25(35.4), 100);
        assert_eq!(aqi_pm25(35.5), 101);
        assert_eq!(aqi_pm25(55.4), 150);
        assert_eq!(aqi_pm25(55.5), 151);
        assert_eq!(aqi_pm25(150.4), 200);
        assert_eq!(aqi_pm25(150.5), 201);
        assert_eq!(aqi_pm25(250.4), 300);
        assert_eq!(aqi_pm25(250.5), 301);
        assert_eq!(aqi_pm25(500.4), 500);
    }

    #[test]
    fn gap_between_segments_stays_in_lower_band() {
        // 12.05 cai no segundo segmento com Cvalue < Clow
        assert_eq!(aqi_pm25(12.05), 50);
        assert_eq!(aqi_pm25(35.45), 100);
    }

    #[test]
    fn above_scale_extrapolates() {
        assert_eq!(aqi_pm25(600.0), 579);
        assert_eq!(aqi_pm25(1000.0), 897);
        assert_eq!(calculate(1000.0).category, AqiCategory::Hazardous);
    }

    #[test]
    fn monotonic_over_the_domain() {
        let mut last = aqi_pm25(0.0);
        for step in 1..=6000 {
            let pm25 = step as f64 * 0.1;
            let aqi = aqi_pm25(pm25);
            assert!(aqi >= last, "AQI caiu em {pm25}: {aqi} < {last}");
            last = aqi;
        }
    }

    #[test]
    fn categories() {
        assert_eq!(AqiCategory::from_aqi(0), AqiCategory::Good);
        assert_eq!(AqiCategory::from_aqi(50), AqiCategory::Good);
        assert_eq!(AqiCategory::from_aqi(51), AqiCategory::Moderate);
        assert_eq!(AqiCategory::from_aqi(100), AqiCategory::Moderate);
        assert_eq!(AqiCategory::from_aqi(150), AqiCategory::UnhealthyForSensitive);
        assert_eq!(AqiCategory::from_aqi(200), AqiCategory::Unhealthy);
        assert_eq!(AqiCategory::from_aqi(300), AqiCategory::VeryUnhealthy);
        assert_eq!(AqiCategory::from_aqi(301), AqiCategory::Hazardous);
        assert_eq!(
            AqiCategory::UnhealthyForSensitive.label(),
            "Unhealthy for Sensitive Groups"
        );
    }

    #[test]
    fn moderate_band_starts_right_after_twelve() {
        let result = calculate(12.1);
        assert!((51..=100).contains(&result.value));
        assert_eq!(result.category, AqiCategory::Moderate);
    }
}
