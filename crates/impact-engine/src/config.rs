//! Engine configuration.
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration:
//!
//! ```toml
//! data_dir = "data"
//! parallel = true
//!
//! [defaults]
//! carbon_intensity = 380.0
//! pue = 1.2
//!
//! [score]
//! carbon_weight = 0.5
//! embodied_weight = 0.3
//! water_weight = 0.2
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ImpactError, Result};
use crate::params::WaterStress;

/// Fallback grid intensity when a region has no table entry (gCO2e/kWh).
pub const DEFAULT_CARBON_INTENSITY: f64 = 380.0;
/// Fallback power usage effectiveness.
pub const DEFAULT_PUE: f64 = 1.2;
/// Fallback water usage effectiveness (L/kWh).
pub const DEFAULT_WUE: f64 = 1.8;

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory holding the CSV parameter tables. `None` uses built-in data.
    pub data_dir: Option<PathBuf>,
    /// Values used when a region is missing from a table.
    pub defaults: RegionDefaults,
    /// Composite score weights and thresholds.
    pub score: ScoreConfig,
    /// Evaluate batch candidates on the rayon thread pool.
    pub parallel: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            defaults: RegionDefaults::default(),
            score: ScoreConfig::default(),
            parallel: true,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid TOML or fails validation.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(contents).map_err(|e| ImpactError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ImpactError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&contents)
    }

    /// Set the table directory.
    #[must_use]
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    /// Enable or disable parallel batch evaluation.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Check defaults and score settings.
    ///
    /// # Errors
    ///
    /// Returns a validation error describing the first bad field.
    pub fn validate(&self) -> Result<()> {
        self.defaults.validate()?;
        self.score.validate()
    }
}

/// Region factors applied when a table has no entry for a region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionDefaults {
    /// Grid carbon intensity (gCO2e/kWh).
    pub carbon_intensity: f64,
    /// Power usage effectiveness.
    pub pue: f64,
    /// Water usage effectiveness (L/kWh).
    pub wue: f64,
    /// Water stress level.
    pub water_stress: WaterStress,
}

impl Default for RegionDefaults {
    fn default() -> Self {
        Self {
            carbon_intensity: DEFAULT_CARBON_INTENSITY,
            pue: DEFAULT_PUE,
            wue: DEFAULT_WUE,
            water_stress: WaterStress::Medium,
        }
    }
}

impl RegionDefaults {
    /// Check that every factor is finite and non-negative, and that PUE is
    /// at least 1.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the first bad factor.
    pub fn validate(&self) -> Result<()> {
        if !(self.carbon_intensity.is_finite() && self.carbon_intensity >= 0.0) {
            return Err(ImpactError::validation(
                "default carbon_intensity must be a non-negative number",
            ));
        }
        if !(self.pue.is_finite() && self.pue >= 1.0) {
            return Err(ImpactError::validation("default pue must be >= 1.0"));
        }
        if !(self.wue.is_finite() && self.wue >= 0.0) {
            return Err(ImpactError::validation(
                "default wue must be a non-negative number",
            ));
        }
        Ok(())
    }
}

/// Weights and normalisation thresholds for the composite score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreConfig {
    /// Weight of operational (plus training) emissions.
    pub carbon_weight: f64,
    /// Weight of embodied emissions.
    pub embodied_weight: f64,
    /// Weight of stress-weighted water usage.
    pub water_weight: f64,
    /// Operational emissions (kg) that map to a full score of 100.
    pub carbon_threshold_kg: f64,
    /// Embodied emissions (kg) that map to a full score of 100.
    pub embodied_threshold_kg: f64,
    /// Stress-weighted water (liters) that maps to a full score of 100.
    pub water_threshold_liters: f64,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            carbon_weight: 0.5,
            embodied_weight: 0.3,
            water_weight: 0.2,
            carbon_threshold_kg: 10.0,
            embodied_threshold_kg: 10.0,
            water_threshold_liters: 1000.0,
        }
    }
}

impl ScoreConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        let weights = [self.carbon_weight, self.embodied_weight, self.water_weight];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(ImpactError::validation(
                "score weights must be non-negative numbers",
            ));
        }
        let sum: f64 = weights.iter().sum();
        if (sum - 1.0).abs() > 1e-9 {
            return Err(ImpactError::validation(format!(
                "score weights must sum to 1.0, got {sum}"
            )));
        }

        let thresholds = [
            self.carbon_threshold_kg,
            self.embodied_threshold_kg,
            self.water_threshold_liters,
        ];
        if thresholds.iter().any(|t| !t.is_finite() || *t <= 0.0) {
            return Err(ImpactError::validation("score thresholds must be positive"));
        }
        Ok(())
    }
}
