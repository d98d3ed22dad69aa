//! Parameter Store: region, model, hardware and price factors.
//!
//! ## Quick Start
//!
//! ```rust
//! use impact_engine::config::RegionDefaults;
//! use impact_engine::params::ParameterStore;
//!
//! let store = ParameterStore::builtin(RegionDefaults::default())?;
//!
//! // Known regions use table values, unknown regions use defaults.
//! let nordic = store.region("eu-north-1");
//! let unknown = store.region("xx-nowhere-1");
//! assert!(nordic.carbon_intensity < unknown.carbon_intensity);
//! assert_eq!(store.fallback_count(), 4);
//! # Ok::<(), impact_engine::ImpactError>(())
//! ```

pub mod builtin;
mod profiles;
mod store;
pub mod tables;

pub use profiles::{
    BillOfMaterials, CpuClass, Embodied, EnergyRate, GpuKind, HardwareProfile, ModelPrice,
    ModelProfile, RegionProfile, TrainingFootprint, WaterStress, DEFAULT_LIFECYCLE_YEARS,
    STRESS_INDEX_BASELINE,
};
pub use store::{LoadReport, ParameterStore};
pub use tables::{TableKind, TableStatus};
