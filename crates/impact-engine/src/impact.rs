//! Impact Aggregator: one result record per calculation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::ScoreConfig;
use crate::cost::CommitmentCosts;
use crate::emissions::{EmissionShares, EmissionsBreakdown};
use crate::params::WaterStress;
use crate::usage::ResourceType;
use crate::water::WaterFootprint;

/// Miles driven by an average passenger car per kgCO2e.
pub const CAR_MILES_PER_KG: f64 = 2.5;
/// Smartphone charges per kgCO2e.
pub const SMARTPHONE_CHARGES_PER_KG: f64 = 112.5;
/// kgCO2e absorbed by one tree in a month.
pub const KG_PER_TREE_MONTH: f64 = 20.0;
/// Passenger flight miles per kgCO2e.
pub const FLIGHT_MILES_PER_KG: f64 = 2.2;

/// Real-world equivalents of an emissions total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Equivalents {
    pub car_miles: f64,
    pub smartphone_charges: f64,
    pub tree_months: f64,
    pub flight_miles: f64,
}

impl Equivalents {
    #[must_use]
    pub fn from_kg(total_kg: f64) -> Self {
        Self {
            car_miles: total_kg * CAR_MILES_PER_KG,
            smartphone_charges: total_kg * SMARTPHONE_CHARGES_PER_KG,
            tree_months: total_kg / KG_PER_TREE_MONTH,
            flight_miles: total_kg * FLIGHT_MILES_PER_KG,
        }
    }

    /// Name to value map.
    #[must_use]
    pub fn as_map(&self) -> BTreeMap<String, f64> {
        BTreeMap::from([
            ("car_miles".to_string(), self.car_miles),
            ("smartphone_charges".to_string(), self.smartphone_charges),
            ("tree_months".to_string(), self.tree_months),
            ("flight_miles".to_string(), self.flight_miles),
        ])
    }
}

/// Equivalents of `total_emissions_kg`, keyed by name.
#[must_use]
pub fn get_equivalents(total_emissions_kg: f64) -> BTreeMap<String, f64> {
    Equivalents::from_kg(total_emissions_kg).as_map()
}

fn normalized(value: f64, threshold: f64) -> f64 {
    (value / threshold * 100.0).clamp(0.0, 100.0)
}

/// Weighted 0-100 score over carbon, embodied carbon and water impact.
///
/// Each component is scaled against its threshold and capped at 100 before
/// weighting. NaN inputs score 0.
#[must_use]
pub fn composite_score(emissions: &EmissionsBreakdown, water_impact: f64, score: &ScoreConfig) -> f64 {
    let carbon_kg = (emissions.operational_g + emissions.training_g) / 1000.0;
    let embodied_kg = emissions.embodied_g / 1000.0;

    let weighted = score.carbon_weight * normalized(carbon_kg, score.carbon_threshold_kg)
        + score.embodied_weight * normalized(embodied_kg, score.embodied_threshold_kg)
        + score.water_weight * normalized(water_impact, score.water_threshold_liters);

    if weighted.is_nan() {
        0.0
    } else {
        weighted.clamp(0.0, 100.0)
    }
}

/// Full footprint of one usage record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactResult {
    pub resource_type: ResourceType,
    pub resource_id: String,
    pub region: String,
    /// IT energy before PUE (kWh).
    pub energy_kwh: f64,
    /// Energy including data-center overhead (kWh).
    pub facility_energy_kwh: f64,
    pub operational_emissions_g: f64,
    pub embodied_emissions_g: f64,
    pub training_emissions_g: f64,
    pub total_emissions_g: f64,
    pub shares: EmissionShares,
    pub water_usage_liters: f64,
    pub water_stress_level: WaterStress,
    pub water_impact_score: f64,
    /// Weighted impact score in `[0, 100]`.
    pub composite_score: f64,
    /// On-demand price (USD).
    pub cost_usd: f64,
    pub commitment_costs: CommitmentCosts,
    pub environmental_equivalents: Equivalents,
}

/// Inputs the aggregator merges into an [`ImpactResult`].
#[derive(Debug, Clone)]
pub struct ImpactParts {
    pub resource_type: ResourceType,
    pub resource_id: String,
    pub region: String,
    pub energy_kwh: f64,
    pub facility_energy_kwh: f64,
    pub emissions: EmissionsBreakdown,
    pub water: WaterFootprint,
    pub cost: CommitmentCosts,
}

impl ImpactResult {
    /// Merge model outputs and derive the score and equivalents.
    #[must_use]
    pub fn aggregate(parts: ImpactParts, score: &ScoreConfig) -> Self {
        let ImpactParts {
            resource_type,
            resource_id,
            region,
            energy_kwh,
            facility_energy_kwh,
            emissions,
            water,
            cost,
        } = parts;

        Self {
            resource_type,
            resource_id,
            region,
            energy_kwh,
            facility_energy_kwh,
            operational_emissions_g: emissions.operational_g,
            embodied_emissions_g: emissions.embodied_g,
            training_emissions_g: emissions.training_g,
            total_emissions_g: emissions.total_g,
            shares: emissions.shares(),
            water_usage_liters: water.usage_liters,
            water_stress_level: water.stress,
            water_impact_score: water.impact_score,
            composite_score: composite_score(&emissions, water.impact_score, score),
            cost_usd: cost.on_demand_usd,
            commitment_costs: cost,
            environmental_equivalents: Equivalents::from_kg(emissions.total_kg()),
        }
    }

    #[must_use]
    pub fn total_emissions_kg(&self) -> f64 {
        self.total_emissions_g / 1000.0
    }

    /// Whether every numeric field is finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        [
            self.energy_kwh,
            self.facility_energy_kwh,
            self.total_emissions_g,
            self.water_usage_liters,
            self.water_impact_score,
            self.cost_usd,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}
