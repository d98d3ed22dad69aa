#![allow(clippy::doc_markdown)] // Allow product names like SageMaker, DynamoDB without backticks

//! Environmental and cost footprint estimation for cloud workloads.
//!
//! This crate turns resource usage (instance hours, inference tokens, storage,
//! serverless invocations) into a single impact record covering:
//!
//! - **Energy** - IT energy and facility energy after PUE
//! - **Emissions** - operational, embodied hardware and amortized model training
//! - **Water** - consumption and stress-weighted impact
//! - **Cost** - on-demand USD price
//!
//! and compares alternatives (regions, models, instance types) by ranking,
//! savings and cost vs carbon Pareto selection.
//!
//! ## Quick Start
//!
//! ```rust
//! use impact_engine::{CandidateKind, ImpactEngine, Metric, UsageRecord};
//!
//! # fn main() -> impact_engine::Result<()> {
//! let engine = ImpactEngine::builtin();
//!
//! // Ten hours of one m5.large in Virginia, hardware amortized over the run
//! let footprint = engine.calculate_compute_footprint("m5.large", "us-east-1", 10.0, 1)?;
//! println!(
//!     "{:.1} g CO2e, {:.2} L water, ${:.2}",
//!     footprint.total_emissions_g, footprint.water_usage_liters, footprint.cost_usd
//! );
//!
//! // The three cleanest regions for the same workload
//! let usage = UsageRecord::compute("m5.large", "us-east-1", 10.0);
//! let lowest = engine.find_lowest(CandidateKind::Region, &usage, 3)?;
//! for ranked in &lowest.ranked {
//!     println!(
//!         "{}. {} saves {:.1}% vs the worst region",
//!         ranked.rank, ranked.candidate, ranked.savings_percentage
//!     );
//! }
//! assert_eq!(lowest.ranked.len(), 3);
//! assert_eq!(lowest.metric, Metric::TotalEmissions);
//! # Ok(())
//! # }
//! ```
//!
//! ## Parameter Tables
//!
//! Region and model factors come from CSV tables in a data directory
//! (`region_carbon_intensity.csv`, `region_pue.csv`, `region_water_usage.csv`,
//! `region_water_stress.csv`, `model_energy_consumption.csv`,
//! `model_training_footprint.csv`, plus optional hardware and pricing tables).
//! Missing tables and missing keys fall back to configured defaults with a
//! warning; see [`params::ParameterStore`].
//!
//! ```rust,ignore
//! use impact_engine::{EngineConfig, ImpactEngine};
//!
//! let config = EngineConfig::from_file("impact.toml")?.with_data_dir("data/tables");
//! let engine = ImpactEngine::from_config(&config)?;
//! for table in engine.store().missing_tables() {
//!     eprintln!("using defaults for {table}");
//! }
//! ```

pub mod compare;
pub mod config;
pub mod cost;
pub mod emissions;
pub mod energy;
pub mod engine;
pub mod error;
pub mod impact;
pub mod params;
pub mod usage;
pub mod water;

pub use compare::{
    Baseline, CandidateKind, ComparisonResult, Metric, RankedCandidate, SavingsReport,
};
pub use config::{EngineConfig, RegionDefaults, ScoreConfig};
pub use cost::CommitmentCosts;
pub use emissions::{EmissionShares, EmissionsBreakdown};
pub use engine::{CandidateSpec, ImpactEngine};
pub use error::{ImpactError, Result, SkippedCandidate};
pub use impact::{get_equivalents, Equivalents, ImpactResult};
pub use params::{ParameterStore, RegionProfile, TableKind, WaterStress};
pub use usage::{Amortization, ResourceType, UsageRecord};
pub use water::WaterFootprint;
