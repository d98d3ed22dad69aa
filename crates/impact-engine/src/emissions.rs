//! Emissions Model: operational, embodied and amortized training emissions.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::energy::HOURS_PER_MONTH;
use crate::params::{HardwareProfile, TrainingFootprint};
use crate::usage::Amortization;

const GRAMS_PER_KG: f64 = 1000.0;

/// Facility energy: IT energy scaled by data-center overhead (kWh).
#[must_use]
pub fn facility_energy_kwh(energy_kwh: f64, pue: f64) -> f64 {
    energy_kwh * pue
}

/// `energy_kwh * pue * carbon_intensity` (gCO2e).
#[must_use]
pub fn operational_g(energy_kwh: f64, pue: f64, carbon_intensity: f64) -> f64 {
    facility_energy_kwh(energy_kwh, pue) * carbon_intensity
}

/// Hardware manufacturing carbon attributed to a usage window (gCO2e).
///
/// `total_embodied_kg / lifecycle_hours * duration * utilization *
/// server_count * 1000`.
#[must_use]
pub fn embodied_g(hardware: &HardwareProfile, amortization: &Amortization, server_count: f64) -> f64 {
    let lifecycle_hours = hardware.lifecycle_hours();
    if lifecycle_hours <= 0.0 {
        warn!(
            resource_id = %hardware.resource_id,
            "Hardware lifecycle is zero, embodied emissions not amortized"
        );
        return 0.0;
    }
    hardware.total_embodied_kg() / lifecycle_hours
        * amortization.duration_hours
        * amortization.utilization
        * server_count
        * GRAMS_PER_KG
}

/// Storage manufacturing carbon attributed to a usage window (gCO2e).
///
/// `storage_gb * kg_per_gb_month * duration / 730 * utilization * 1000`.
#[must_use]
pub fn storage_embodied_g(
    storage_gb: f64,
    kg_per_gb_month: f64,
    amortization: &Amortization,
) -> f64 {
    storage_gb
        * kg_per_gb_month
        * (amortization.duration_hours / HOURS_PER_MONTH)
        * amortization.utilization
        * GRAMS_PER_KG
}

/// Training emissions allocated to `tokens` (gCO2e). Zero without a footprint.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn training_g(training: Option<&TrainingFootprint>, tokens: i64) -> f64 {
    let Some(training) = training else {
        return 0.0;
    };
    if training.expected_inferences <= 0.0 {
        warn!("Training footprint has no expected inferences, skipping amortization");
        return 0.0;
    }
    training.total_emissions_g / training.expected_inferences * tokens as f64
}

/// Share of each component in the total, in percent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EmissionShares {
    pub operational_pct: f64,
    pub embodied_pct: f64,
    pub training_pct: f64,
}

/// Emissions components and their sum (gCO2e).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EmissionsBreakdown {
    pub operational_g: f64,
    pub embodied_g: f64,
    pub training_g: f64,
    /// Always `operational_g + embodied_g + training_g`.
    pub total_g: f64,
}

impl EmissionsBreakdown {
    #[must_use]
    pub fn new(operational_g: f64, embodied_g: f64, training_g: f64) -> Self {
        Self {
            operational_g,
            embodied_g,
            training_g,
            total_g: operational_g + embodied_g + training_g,
        }
    }

    /// Component percentages. All zero when the total is zero.
    #[must_use]
    pub fn shares(&self) -> EmissionShares {
        if self.total_g <= 0.0 {
            return EmissionShares::default();
        }
        EmissionShares {
            operational_pct: self.operational_g / self.total_g * 100.0,
            embodied_pct: self.embodied_g / self.total_g * 100.0,
            training_pct: self.training_g / self.total_g * 100.0,
        }
    }

    #[must_use]
    pub fn total_kg(&self) -> f64 {
        self.total_g / GRAMS_PER_KG
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Embodied;

    fn hardware(kg: f64, years: f64) -> HardwareProfile {
        HardwareProfile {
            resource_id: "box".to_string(),
            power_draw_watts: Some(100.0),
            embodied: Embodied::Total { kg },
            lifecycle_years: years,
            server_count: 1.0,
        }
    }

    #[test]
    fn test_operational() {
        assert!((operational_g(4.0, 1.15, 240.0) - 1104.0).abs() < 1e-9);
        assert!((operational_g(0.00025, 1.2, 360.0) - 0.108).abs() < 1e-12);
    }

    #[test]
    fn test_embodied_amortization() {
        // A tenth of a year is 876 hours, so 1 kg per hour.
        let profile = hardware(876.0, 0.1);
        let grams = embodied_g(&profile, &Amortization::new(2.0, 0.5), 1.0);
        assert!((grams - 1000.0).abs() < 1e-9);

        let doubled = embodied_g(&profile, &Amortization::new(2.0, 0.5), 2.0);
        assert!((doubled - 2000.0).abs() < 1e-9);
    }

    #[test]
    fn test_embodied_zero_lifecycle() {
        let profile = hardware(876.0, 0.0);
        assert!(embodied_g(&profile, &Amortization::dedicated(1.0), 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_storage_embodied_scales_with_window() {
        let month = storage_embodied_g(100.0, 0.1, &Amortization::dedicated(730.0));
        assert!((month - 10_000.0).abs() < 1e-9);

        let half_shared = storage_embodied_g(100.0, 0.1, &Amortization::new(365.0, 0.5));
        assert!((half_shared - 2_500.0).abs() < 1e-9);
    }

    #[test]
    fn test_training_amortization() {
        let training = TrainingFootprint {
            total_emissions_g: 6.5e8,
            expected_inferences: 1.8e10,
        };
        let grams = training_g(Some(&training), 1500);
        assert!((grams - 6.5e8 / 1.8e10 * 1500.0).abs() < 1e-12);
        assert!(training_g(None, 1500).abs() < 1e-12);

        let broken = TrainingFootprint {
            total_emissions_g: 1.0,
            expected_inferences: 0.0,
        };
        assert!(training_g(Some(&broken), 10).abs() < 1e-12);
    }

    #[test]
    fn test_breakdown_total_and_shares() {
        let breakdown = EmissionsBreakdown::new(60.0, 30.0, 10.0);
        assert!((breakdown.total_g - 100.0).abs() < 1e-12);
        assert!((breakdown.total_kg() - 0.1).abs() < 1e-12);

        let shares = breakdown.shares();
        assert!((shares.operational_pct - 60.0).abs() < 1e-9);
        assert!((shares.embodied_pct - 30.0).abs() < 1e-9);
        assert!((shares.training_pct - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_total_shares() {
        let shares = EmissionsBreakdown::new(0.0, 0.0, 0.0).shares();
        assert_eq!(shares, EmissionShares::default());
    }
}
