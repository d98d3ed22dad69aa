//! Water Model: consumption and stress-weighted impact.

use serde::{Deserialize, Serialize};

use crate::params::{RegionProfile, WaterStress};

/// `facility_kwh * wue` (liters).
#[must_use]
pub fn water_usage_liters(facility_kwh: f64, wue: f64) -> f64 {
    facility_kwh * wue
}

/// Water usage weighted by regional stress.
#[must_use]
pub fn water_impact_score(water_liters: f64, stress: WaterStress) -> f64 {
    water_liters * stress.multiplier()
}

/// Water consumed by a workload and its stress-weighted impact.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaterFootprint {
    pub usage_liters: f64,
    pub stress: WaterStress,
    pub impact_score: f64,
}

impl WaterFootprint {
    /// Footprint of `facility_kwh` drawn in `region`.
    #[must_use]
    pub fn new(facility_kwh: f64, region: &RegionProfile) -> Self {
        let usage_liters = water_usage_liters(facility_kwh, region.wue);
        Self {
            usage_liters,
            stress: region.water_stress,
            impact_score: water_impact_score(usage_liters, region.water_stress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_and_impact() {
        let region = RegionProfile {
            region: "r".to_string(),
            carbon_intensity: 100.0,
            pue: 1.2,
            wue: 1.8,
            water_stress: WaterStress::High,
        };
        let footprint = WaterFootprint::new(10.0, &region);
        assert!((footprint.usage_liters - 18.0).abs() < 1e-12);
        assert!((footprint.impact_score - 36.0).abs() < 1e-12);
        assert_eq!(footprint.stress, WaterStress::High);
    }

    #[test]
    fn test_numeric_stress_index() {
        assert!((water_impact_score(30.0, WaterStress::Index(4.5)) - 45.0).abs() < 1e-12);
        assert!((water_impact_score(30.0, WaterStress::Index(3.0)) - 30.0).abs() < 1e-12);
    }
}
