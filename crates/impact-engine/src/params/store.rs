//! The parameter store.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

use super::builtin::{
    self, DEFAULT_ENERGY_RATE, DEFAULT_HOURLY_USD, DEFAULT_KEY, DEFAULT_MODEL_PRICE,
};
use super::profiles::{
    EnergyRate, HardwareProfile, ModelPrice, ModelProfile, RegionProfile, TrainingFootprint,
    WaterStress,
};
use super::tables::{self, ParsedTable, TableKind, TableStatus};
use crate::config::RegionDefaults;
use crate::error::{ImpactError, Result};

/// Per-table load outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadReport {
    pub tables: BTreeMap<TableKind, TableStatus>,
}

impl LoadReport {
    /// Status of one table. Tables never touched report `Missing`.
    #[must_use]
    pub fn status(&self, kind: TableKind) -> TableStatus {
        self.tables.get(&kind).copied().unwrap_or(TableStatus::Missing)
    }

    /// Tables whose lookups will always fall back to defaults.
    #[must_use]
    pub fn missing_tables(&self) -> Vec<TableKind> {
        TableKind::ALL
            .into_iter()
            .filter(|kind| self.status(*kind).is_unavailable())
            .collect()
    }

    /// Malformed rows dropped across all tables.
    #[must_use]
    pub fn skipped_rows(&self) -> usize {
        self.tables
            .values()
            .map(|status| match status {
                TableStatus::Loaded { skipped, .. } | TableStatus::Empty { skipped } => *skipped,
                TableStatus::Missing | TableStatus::Builtin { .. } => 0,
            })
            .sum()
    }
}

/// Region, model, hardware and price parameters.
///
/// Tables are loaded once and never change afterwards. Every lookup is total:
/// a missing key resolves to a default, is logged, and bumps
/// [`ParameterStore::fallback_count`]. The only lookup that can fail is
/// [`ParameterStore::model`], when the model energy table has no rows at all.
#[derive(Debug)]
pub struct ParameterStore {
    defaults: RegionDefaults,
    carbon_intensity: BTreeMap<String, f64>,
    pue: BTreeMap<String, f64>,
    wue: BTreeMap<String, f64>,
    water_stress: BTreeMap<String, WaterStress>,
    model_energy: BTreeMap<String, EnergyRate>,
    model_training: BTreeMap<String, TrainingFootprint>,
    hardware: BTreeMap<String, HardwareProfile>,
    instance_pricing: BTreeMap<String, f64>,
    model_pricing: BTreeMap<String, ModelPrice>,
    report: LoadReport,
    fallbacks: AtomicU64,
}

impl ParameterStore {
    /// A store with no table rows. Region lookups return `defaults`; model
    /// lookups fail until a model energy row is added.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `defaults` holds a negative or
    /// non-finite factor, or a PUE below 1.
    pub fn empty(defaults: RegionDefaults) -> Result<Self> {
        defaults.validate()?;
        Ok(Self::blank(defaults))
    }

    fn blank(defaults: RegionDefaults) -> Self {
        Self {
            defaults,
            carbon_intensity: BTreeMap::new(),
            pue: BTreeMap::new(),
            wue: BTreeMap::new(),
            water_stress: BTreeMap::new(),
            model_energy: BTreeMap::new(),
            model_training: BTreeMap::new(),
            hardware: BTreeMap::new(),
            instance_pricing: BTreeMap::new(),
            model_pricing: BTreeMap::new(),
            report: LoadReport::default(),
            fallbacks: AtomicU64::new(0),
        }
    }

    /// The built-in reference data set.
    ///
    /// # Errors
    ///
    /// Returns a validation error for invalid `defaults`, as
    /// [`ParameterStore::empty`].
    pub fn builtin(defaults: RegionDefaults) -> Result<Self> {
        defaults.validate()?;
        Ok(Self::with_builtin_rows(defaults))
    }

    fn with_builtin_rows(defaults: RegionDefaults) -> Self {
        let mut store = Self::blank(defaults);
        for &(region, intensity, pue, wue, stress) in builtin::REGIONS {
            store.carbon_intensity.insert(region.to_string(), intensity);
            store.pue.insert(region.to_string(), pue);
            store.wue.insert(region.to_string(), wue);
            store.water_stress.insert(region.to_string(), stress);
        }
        for &(id, input, output) in builtin::MODEL_ENERGY {
            store
                .model_energy
                .insert(id.to_string(), EnergyRate::new(input, output));
        }
        for (id, training) in builtin::training_footprints() {
            store.model_training.insert(id.to_string(), training);
        }
        store.install_builtin_hardware_and_prices();

        for kind in TableKind::ALL {
            let rows = store.row_count(kind);
            store.report.tables.insert(kind, TableStatus::Builtin { rows });
        }
        debug!(
            regions = store.carbon_intensity.len(),
            models = store.model_energy.len(),
            "Using built-in parameters"
        );
        store
    }

    /// Load tables from `dir`.
    ///
    /// Missing or empty region/model tables are recorded in the load report
    /// and logged; lookups against them use defaults. Missing hardware and
    /// pricing tables fall back to the built-in reference data.
    ///
    /// # Errors
    ///
    /// Returns a validation error for invalid `defaults`, and a table error
    /// if a table file exists but cannot be read.
    pub fn load(dir: impl AsRef<Path>, defaults: RegionDefaults) -> Result<Self> {
        defaults.validate()?;
        let dir = dir.as_ref();
        let mut store = Self::blank(defaults);

        store.carbon_intensity = store.take(
            TableKind::CarbonIntensity,
            tables::read_table(dir, TableKind::CarbonIntensity, |f| {
                tables::parse_region_values(TableKind::CarbonIntensity, f)
            })?,
        );
        store.pue = store.take(
            TableKind::Pue,
            tables::read_table(dir, TableKind::Pue, |f| {
                tables::parse_region_values(TableKind::Pue, f)
            })?,
        );
        store.wue = store.take(
            TableKind::WaterUsage,
            tables::read_table(dir, TableKind::WaterUsage, |f| {
                tables::parse_region_values(TableKind::WaterUsage, f)
            })?,
        );
        store.water_stress = store.take(
            TableKind::WaterStress,
            tables::read_table(dir, TableKind::WaterStress, tables::parse_water_stress)?,
        );
        store.model_energy = store.take(
            TableKind::ModelEnergy,
            tables::read_table(dir, TableKind::ModelEnergy, tables::parse_model_energy)?,
        );
        store.model_training = store.take(
            TableKind::ModelTraining,
            tables::read_table(dir, TableKind::ModelTraining, tables::parse_model_training)?,
        );

        let hardware =
            tables::read_table(dir, TableKind::HardwareProfiles, tables::parse_hardware)?;
        let instance_pricing =
            tables::read_table(dir, TableKind::InstancePricing, tables::parse_instance_pricing)?;
        let model_pricing =
            tables::read_table(dir, TableKind::ModelPricing, tables::parse_model_pricing)?;

        store.install_builtin_hardware_and_prices();
        if let Some(table) = hardware {
            store.report.tables.insert(TableKind::HardwareProfiles, table.status());
            store.hardware = table.rows;
        }
        if let Some(table) = instance_pricing {
            store.report.tables.insert(TableKind::InstancePricing, table.status());
            store.instance_pricing = table.rows;
        }
        if let Some(table) = model_pricing {
            store.report.tables.insert(TableKind::ModelPricing, table.status());
            store.model_pricing = table.rows;
        }
        for kind in [
            TableKind::HardwareProfiles,
            TableKind::InstancePricing,
            TableKind::ModelPricing,
        ] {
            if !store.report.tables.contains_key(&kind) {
                let rows = store.row_count(kind);
                store.report.tables.insert(kind, TableStatus::Builtin { rows });
            }
        }

        let missing = store.report.missing_tables();
        if missing.is_empty() {
            info!(dir = %dir.display(), "Parameter tables loaded");
        } else {
            warn!(dir = %dir.display(), ?missing, "Parameter tables loaded with missing tables");
        }
        Ok(store)
    }

    fn take<V>(&mut self, kind: TableKind, table: Option<ParsedTable<V>>) -> BTreeMap<String, V> {
        match table {
            Some(table) => {
                self.report.tables.insert(kind, table.status());
                table.rows
            }
            None => {
                self.report.tables.insert(kind, TableStatus::Missing);
                BTreeMap::new()
            }
        }
    }

    fn install_builtin_hardware_and_prices(&mut self) {
        self.hardware = builtin::hardware_profiles()
            .map(|profile| (profile.resource_id.clone(), profile))
            .collect();
        self.instance_pricing = builtin::INSTANCE_PRICING
            .iter()
            .map(|&(id, usd)| (id.to_string(), usd))
            .collect();
        self.model_pricing = builtin::MODEL_PRICING
            .iter()
            .map(|&(id, input, output)| {
                (
                    id.to_string(),
                    ModelPrice {
                        input_usd_per_1k: input,
                        output_usd_per_1k: output,
                    },
                )
            })
            .collect();
    }

    fn row_count(&self, kind: TableKind) -> usize {
        match kind {
            TableKind::CarbonIntensity => self.carbon_intensity.len(),
            TableKind::Pue => self.pue.len(),
            TableKind::WaterUsage => self.wue.len(),
            TableKind::WaterStress => self.water_stress.len(),
            TableKind::ModelEnergy => self.model_energy.len(),
            TableKind::ModelTraining => self.model_training.len(),
            TableKind::HardwareProfiles => self.hardware.len(),
            TableKind::InstancePricing => self.instance_pricing.len(),
            TableKind::ModelPricing => self.model_pricing.len(),
        }
    }

    /// Mark a table as populated after a programmatic insert.
    fn touch(&mut self, kind: TableKind) {
        let rows = self.row_count(kind);
        let status = match self.report.status(kind) {
            TableStatus::Builtin { .. } => TableStatus::Builtin { rows },
            TableStatus::Loaded { skipped, .. } | TableStatus::Empty { skipped } => {
                TableStatus::Loaded { rows, skipped }
            }
            TableStatus::Missing => TableStatus::Loaded { rows, skipped: 0 },
        };
        self.report.tables.insert(kind, status);
    }

    /// Add or replace all four factors for a region.
    #[must_use]
    pub fn with_region(mut self, profile: RegionProfile) -> Self {
        let region = profile.region;
        self.carbon_intensity
            .insert(region.clone(), profile.carbon_intensity);
        self.pue.insert(region.clone(), profile.pue);
        self.wue.insert(region.clone(), profile.wue);
        self.water_stress.insert(region, profile.water_stress);
        for kind in [
            TableKind::CarbonIntensity,
            TableKind::Pue,
            TableKind::WaterUsage,
            TableKind::WaterStress,
        ] {
            self.touch(kind);
        }
        self
    }

    /// Add or replace a model's energy rate.
    #[must_use]
    pub fn with_model(mut self, model_id: impl Into<String>, energy: EnergyRate) -> Self {
        self.model_energy.insert(model_id.into(), energy);
        self.touch(TableKind::ModelEnergy);
        self
    }

    /// Add or replace a model's training footprint.
    #[must_use]
    pub fn with_training(mut self, model_id: impl Into<String>, training: TrainingFootprint) -> Self {
        self.model_training.insert(model_id.into(), training);
        self.touch(TableKind::ModelTraining);
        self
    }

    /// Add or replace a hardware profile.
    #[must_use]
    pub fn with_hardware(mut self, profile: HardwareProfile) -> Self {
        self.hardware.insert(profile.resource_id.clone(), profile);
        self.touch(TableKind::HardwareProfiles);
        self
    }

    /// Add or replace an instance's hourly price.
    #[must_use]
    pub fn with_instance_price(mut self, instance_type: impl Into<String>, hourly_usd: f64) -> Self {
        self.instance_pricing.insert(instance_type.into(), hourly_usd);
        self.touch(TableKind::InstancePricing);
        self
    }

    /// Add or replace a model's token price.
    #[must_use]
    pub fn with_model_price(mut self, model_id: impl Into<String>, price: ModelPrice) -> Self {
        self.model_pricing.insert(model_id.into(), price);
        self.touch(TableKind::ModelPricing);
        self
    }

    fn fallback(&self) {
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    /// Defaults applied to unknown regions.
    #[must_use]
    pub fn defaults(&self) -> &RegionDefaults {
        &self.defaults
    }

    /// Resolve a region. Each factor falls back to the configured default
    /// independently.
    pub fn region(&self, region: &str) -> RegionProfile {
        let defaults = &self.defaults;
        let carbon_intensity = self.lookup_region(
            "carbon_intensity",
            &self.carbon_intensity,
            region,
            defaults.carbon_intensity,
        );
        let pue = self.lookup_region("pue", &self.pue, region, defaults.pue);
        let wue = self.lookup_region("wue", &self.wue, region, defaults.wue);
        let water_stress = self.lookup_region(
            "water_stress",
            &self.water_stress,
            region,
            defaults.water_stress,
        );

        RegionProfile {
            region: region.to_string(),
            carbon_intensity,
            pue,
            wue,
            water_stress,
        }
    }

    fn lookup_region<V: Copy + std::fmt::Debug>(
        &self,
        factor: &str,
        table: &BTreeMap<String, V>,
        region: &str,
        default: V,
    ) -> V {
        if let Some(value) = table.get(region) {
            return *value;
        }
        self.fallback();
        warn!(region, factor, ?default, "Region not found, using default");
        default
    }

    /// Resolve a model: exact id, then the table's `default` row, then the
    /// built-in default rate.
    ///
    /// # Errors
    ///
    /// Returns [`ImpactError::UnknownResource`] if the model energy table is empty.
    pub fn model(&self, model_id: &str) -> Result<ModelProfile> {
        if self.model_energy.is_empty() {
            return Err(ImpactError::unknown(format!(
                "model energy table is empty, cannot resolve {model_id}"
            )));
        }

        let energy = match self.model_energy.get(model_id) {
            Some(rate) => *rate,
            None => {
                self.fallback();
                if let Some(rate) = self.model_energy.get(DEFAULT_KEY) {
                    warn!(model_id, "Model not found, using table default row");
                    *rate
                } else {
                    warn!(model_id, "Model not found, using built-in default rate");
                    DEFAULT_ENERGY_RATE
                }
            }
        };

        let training = self
            .model_training
            .get(model_id)
            .or_else(|| self.model_training.get(DEFAULT_KEY))
            .copied();
        if training.is_none() {
            debug!(model_id, "No training footprint for model");
        }

        Ok(ModelProfile {
            model_id: model_id.to_string(),
            energy,
            training,
        })
    }

    /// Resolve hardware: exact id, else the default GPU server profile.
    pub fn hardware(&self, resource_id: &str) -> HardwareProfile {
        if let Some(profile) = self.hardware.get(resource_id) {
            return profile.clone();
        }
        self.fallback();
        warn!(resource_id, "Hardware profile not found, using default server profile");
        builtin::default_hardware(resource_id)
    }

    /// Average draw of an instance type (W). Unknown types are estimated from
    /// their size suffix.
    pub fn instance_power(&self, instance_type: &str) -> f64 {
        if let Some(watts) = self
            .hardware
            .get(instance_type)
            .and_then(|profile| profile.power_draw_watts)
        {
            return watts;
        }
        self.fallback();
        let watts = builtin::estimate_instance_watts(instance_type);
        warn!(instance_type, watts, "Power draw not found, using estimate");
        watts
    }

    /// Hourly on-demand price of an instance type (USD).
    pub fn hourly_price(&self, instance_type: &str) -> f64 {
        if let Some(usd) = self.instance_pricing.get(instance_type) {
            return *usd;
        }
        if let Some(usd) = self.instance_pricing.get(DEFAULT_KEY) {
            return *usd;
        }
        self.fallback();
        debug!(instance_type, "Instance price not found, using default");
        DEFAULT_HOURLY_USD
    }

    /// Token price of a model.
    pub fn model_price(&self, model_id: &str) -> ModelPrice {
        if let Some(price) = self
            .model_pricing
            .get(model_id)
            .or_else(|| self.model_pricing.get(DEFAULT_KEY))
        {
            return *price;
        }
        self.fallback();
        debug!(model_id, "Model price not found, using default");
        DEFAULT_MODEL_PRICE
    }

    /// Regions with a carbon intensity row, sorted.
    pub fn regions(&self) -> Vec<String> {
        self.carbon_intensity.keys().cloned().collect()
    }

    /// Model ids with an energy row, sorted, excluding the `default` row.
    pub fn models(&self) -> Vec<String> {
        self.model_energy
            .keys()
            .filter(|id| id.as_str() != DEFAULT_KEY)
            .cloned()
            .collect()
    }

    /// Instance types with a known power draw, sorted.
    pub fn instance_types(&self) -> Vec<String> {
        self.hardware
            .values()
            .filter(|profile| profile.power_draw_watts.is_some())
            .map(|profile| profile.resource_id.clone())
            .collect()
    }

    /// Sizes of one instance family known to the hardware or pricing
    /// tables, smallest first. Sizes off the ladder (such as `metal`) are
    /// left out.
    pub fn instance_family(&self, family: &str) -> Vec<String> {
        let powered = self
            .hardware
            .values()
            .filter(|profile| profile.power_draw_watts.is_some())
            .map(|profile| profile.resource_id.as_str());
        let mut sizes: Vec<(u32, &str)> = powered
            .chain(self.instance_pricing.keys().map(String::as_str))
            .filter_map(|id| {
                let (known, size) = builtin::instance_family(id)?;
                if known != family {
                    return None;
                }
                Some((builtin::size_rank(size)?, id))
            })
            .collect();
        sizes.sort_unstable();
        sizes.dedup();
        sizes.into_iter().map(|(_, id)| id.to_string()).collect()
    }

    /// Per-table load outcome.
    #[must_use]
    pub fn load_report(&self) -> &LoadReport {
        &self.report
    }

    /// Tables that are missing or empty.
    pub fn missing_tables(&self) -> Vec<TableKind> {
        self.report.missing_tables()
    }

    /// Number of lookups that resolved to a default since construction.
    pub fn fallback_count(&self) -> u64 {
        self.fallbacks.load(Ordering::Relaxed)
    }
}

impl Default for ParameterStore {
    /// The built-in data set with the canonical region defaults.
    fn default() -> Self {
        Self::with_builtin_rows(RegionDefaults::default())
    }
}
