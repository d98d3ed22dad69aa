//! CSV parsing for parameter tables.
//!
//! Every table is a header row followed by data rows. Column order matters
//! only as a fallback: key and value columns are first looked up by header
//! name, then by position.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

use super::profiles::{
    Embodied, EnergyRate, HardwareProfile, ModelPrice, TrainingFootprint, WaterStress,
    DEFAULT_LIFECYCLE_YEARS,
};
use crate::error::{ImpactError, Result};

const KEY_ALIASES: &[&str] = &["region", "model_id", "model", "instance_type", "resource_id"];

/// Identifies one backing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    CarbonIntensity,
    Pue,
    WaterUsage,
    WaterStress,
    ModelEnergy,
    ModelTraining,
    HardwareProfiles,
    InstancePricing,
    ModelPricing,
}

impl TableKind {
    /// All tables in load order.
    pub const ALL: [Self; 9] = [
        Self::CarbonIntensity,
        Self::Pue,
        Self::WaterUsage,
        Self::WaterStress,
        Self::ModelEnergy,
        Self::ModelTraining,
        Self::HardwareProfiles,
        Self::InstancePricing,
        Self::ModelPricing,
    ];

    /// Table name without extension.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::CarbonIntensity => "region_carbon_intensity",
            Self::Pue => "region_pue",
            Self::WaterUsage => "region_water_usage",
            Self::WaterStress => "region_water_stress",
            Self::ModelEnergy => "model_energy_consumption",
            Self::ModelTraining => "model_training_footprint",
            Self::HardwareProfiles => "hardware_profiles",
            Self::InstancePricing => "instance_pricing",
            Self::ModelPricing => "model_pricing",
        }
    }

    /// File name inside the data directory.
    #[must_use]
    pub fn file_name(self) -> String {
        format!("{}.csv", self.name())
    }

    /// Tables whose absence falls back to built-in reference data.
    #[must_use]
    pub fn has_builtin_fallback(self) -> bool {
        matches!(
            self,
            Self::HardwareProfiles | Self::InstancePricing | Self::ModelPricing
        )
    }
}

impl std::fmt::Display for TableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Outcome of loading one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TableStatus {
    /// At least one row was loaded.
    Loaded { rows: usize, skipped: usize },
    /// The source exists but produced no usable rows.
    Empty { skipped: usize },
    /// The source does not exist.
    Missing,
    /// Built-in reference data is in use.
    Builtin { rows: usize },
}

impl TableStatus {
    /// Whether lookups against this table will always use defaults.
    #[must_use]
    pub fn is_unavailable(self) -> bool {
        matches!(self, Self::Empty { .. } | Self::Missing)
    }
}

/// Rows parsed from one table, keyed by the first column.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTable<V> {
    pub rows: BTreeMap<String, V>,
    /// Rows dropped because they were malformed.
    pub skipped: usize,
}

impl<V> Default for ParsedTable<V> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            skipped: 0,
        }
    }
}

impl<V> ParsedTable<V> {
    /// Status for a table that was read from a source.
    #[must_use]
    pub fn status(&self) -> TableStatus {
        if self.rows.is_empty() {
            TableStatus::Empty {
                skipped: self.skipped,
            }
        } else {
            TableStatus::Loaded {
                rows: self.rows.len(),
                skipped: self.skipped,
            }
        }
    }
}

/// Lower-cased header names with alias lookup.
struct Columns {
    names: Vec<String>,
}

impl Columns {
    fn new(headers: &csv::StringRecord) -> Self {
        Self {
            names: headers.iter().map(|h| h.trim().to_ascii_lowercase()).collect(),
        }
    }

    fn key(&self) -> usize {
        self.names
            .iter()
            .position(|n| KEY_ALIASES.contains(&n.as_str()))
            .unwrap_or(0)
    }

    /// Find a column by exact alias, then by alias fragment, then by position.
    fn find(&self, aliases: &[&str], fallback: usize, key: usize) -> usize {
        let candidates = || self.names.iter().enumerate().filter(|(i, _)| *i != key);
        candidates()
            .find(|(_, n)| aliases.contains(&n.as_str()))
            .or_else(|| candidates().find(|(_, n)| aliases.iter().any(|a| n.contains(a))))
            .map_or(fallback, |(i, _)| i)
    }

    fn name(&self, index: usize) -> &str {
        self.names.get(index).map_or("", String::as_str)
    }
}

/// Scale factor from a model energy header's unit to kWh per million tokens.
fn energy_scale(header: &str) -> f64 {
    let kwh = header.contains("kwh");
    let per_thousand = header.contains("1k") || header.contains("thousand");
    let per_million = header.contains("million") || header.contains("1m");

    if per_thousand {
        if kwh {
            1000.0
        } else {
            1.0
        }
    } else if per_million {
        if kwh {
            1.0
        } else {
            1e-3
        }
    } else if header.contains("per_token") {
        if kwh {
            1e6
        } else {
            1e3
        }
    } else {
        1.0
    }
}

fn parse_number(record: &csv::StringRecord, index: usize) -> Option<f64> {
    record
        .get(index)
        .and_then(|cell| cell.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v >= 0.0)
}

fn optional_number(record: &csv::StringRecord, index: usize) -> Option<Option<f64>> {
    match record.get(index).map(str::trim) {
        None | Some("") => Some(None),
        Some(_) => parse_number(record, index).map(Some),
    }
}

/// Shared row loop: reads the header, resolves columns, parses each row.
fn parse_rows<R, V, F>(kind: TableKind, reader: R, mut parse_row: F) -> Result<ParsedTable<V>>
where
    R: Read,
    F: FnMut(&Columns, usize, &csv::StringRecord) -> Option<V>,
{
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader.headers().map_err(|e| ImpactError::Table {
        table: kind.to_string(),
        detail: e.to_string(),
    })?;
    let columns = Columns::new(headers);
    let key = columns.key();

    let mut table = ParsedTable::default();
    for (line, result) in csv_reader.records().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!(table = %kind, line = line + 2, error = %e, "Skipping unreadable row");
                table.skipped += 1;
                continue;
            }
        };

        let id = record.get(key).map(str::trim).unwrap_or_default();
        if id.is_empty() {
            if record.iter().any(|cell| !cell.trim().is_empty()) {
                warn!(table = %kind, line = line + 2, "Skipping row without key");
                table.skipped += 1;
            }
            continue;
        }

        match parse_row(&columns, key, &record) {
            Some(value) => {
                if table.rows.insert(id.to_string(), value).is_some() {
                    debug!(table = %kind, key = id, "Duplicate key, keeping last row");
                }
            }
            None => {
                warn!(table = %kind, line = line + 2, key = id, "Skipping malformed row");
                table.skipped += 1;
            }
        }
    }

    Ok(table)
}

/// Parse a `region, <value>` table of non-negative numbers.
///
/// # Errors
///
/// Returns an error if the header row cannot be read.
pub fn parse_region_values<R: Read>(kind: TableKind, reader: R) -> Result<ParsedTable<f64>> {
    let aliases: &[&str] = match kind {
        TableKind::CarbonIntensity => &["carbon_intensity", "intensity", "gco2e"],
        TableKind::Pue => &["pue"],
        TableKind::WaterUsage => &["wue", "water_usage", "l_kwh", "liters"],
        _ => &[],
    };
    parse_rows(kind, reader, |columns, key, record| {
        let value = parse_number(record, columns.find(aliases, 1, key))?;
        // PUE below 1 would mean the facility generates power.
        (kind != TableKind::Pue || value >= 1.0).then_some(value)
    })
}

/// Parse a `region, <stress>` table with categorical or numeric cells.
///
/// # Errors
///
/// Returns an error if the header row cannot be read.
pub fn parse_water_stress<R: Read>(reader: R) -> Result<ParsedTable<WaterStress>> {
    parse_rows(TableKind::WaterStress, reader, |columns, key, record| {
        let index = columns.find(&["water_stress", "stress"], 1, key);
        record.get(index).and_then(WaterStress::parse)
    })
}

/// Parse a `model_id, input, output` energy table, normalising units.
///
/// # Errors
///
/// Returns an error if the header row cannot be read.
pub fn parse_model_energy<R: Read>(reader: R) -> Result<ParsedTable<EnergyRate>> {
    parse_rows(TableKind::ModelEnergy, reader, |columns, key, record| {
        let input = columns.find(&["input"], 1, key);
        let output = columns.find(&["output"], 2, key);
        let input_scale = energy_scale(columns.name(input));
        let output_scale = energy_scale(columns.name(output));
        Some(EnergyRate::new(
            parse_number(record, input)? * input_scale,
            parse_number(record, output)? * output_scale,
        ))
    })
}

/// Parse a `model_id, total_emissions_gco2e, expected_inferences` table.
///
/// # Errors
///
/// Returns an error if the header row cannot be read.
pub fn parse_model_training<R: Read>(reader: R) -> Result<ParsedTable<TrainingFootprint>> {
    parse_rows(TableKind::ModelTraining, reader, |columns, key, record| {
        let emissions = columns.find(&["total_emissions_gco2e", "emissions"], 1, key);
        let inferences = columns.find(&["expected_inferences", "inferences"], 2, key);
        Some(TrainingFootprint {
            total_emissions_g: parse_number(record, emissions)?,
            expected_inferences: parse_number(record, inferences)?,
        })
    })
}

/// Parse a `resource_id, power_draw_watts, embodied_kgco2e, lifecycle_years,
/// server_count` table. Power, lifecycle and server count may be blank.
///
/// # Errors
///
/// Returns an error if the header row cannot be read.
pub fn parse_hardware<R: Read>(reader: R) -> Result<ParsedTable<HardwareProfile>> {
    parse_rows(TableKind::HardwareProfiles, reader, |columns, key, record| {
        let power = columns.find(&["power_draw_watts", "power", "watts"], 1, key);
        let embodied = columns.find(&["embodied_kgco2e", "embodied"], 2, key);
        let lifecycle = columns.find(&["lifecycle_years", "lifecycle", "lifespan"], 3, key);
        let servers = columns.find(&["server_count", "servers"], 4, key);

        let lifecycle_years = optional_number(record, lifecycle)?.unwrap_or(DEFAULT_LIFECYCLE_YEARS);
        if lifecycle_years <= 0.0 {
            return None;
        }
        Some(HardwareProfile {
            resource_id: record.get(key).unwrap_or_default().trim().to_string(),
            power_draw_watts: optional_number(record, power)?,
            embodied: Embodied::Total {
                kg: parse_number(record, embodied)?,
            },
            lifecycle_years,
            server_count: optional_number(record, servers)?.unwrap_or(1.0),
        })
    })
}

/// Parse an `instance_type, hourly_usd` table.
///
/// # Errors
///
/// Returns an error if the header row cannot be read.
pub fn parse_instance_pricing<R: Read>(reader: R) -> Result<ParsedTable<f64>> {
    parse_rows(TableKind::InstancePricing, reader, |columns, key, record| {
        parse_number(record, columns.find(&["hourly_usd", "price", "usd"], 1, key))
    })
}

/// Parse a `model_id, input_usd_per_1k, output_usd_per_1k` table.
///
/// # Errors
///
/// Returns an error if the header row cannot be read.
pub fn parse_model_pricing<R: Read>(reader: R) -> Result<ParsedTable<ModelPrice>> {
    parse_rows(TableKind::ModelPricing, reader, |columns, key, record| {
        Some(ModelPrice {
            input_usd_per_1k: parse_number(record, columns.find(&["input"], 1, key))?,
            output_usd_per_1k: parse_number(record, columns.find(&["output"], 2, key))?,
        })
    })
}

/// Read one table file from `dir`.
///
/// A missing file is not an error: it yields `None` so the caller can record
/// the table as missing and fall back to defaults.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or its header is broken.
pub fn read_table<V>(
    dir: &Path,
    kind: TableKind,
    parse: impl FnOnce(std::fs::File) -> Result<ParsedTable<V>>,
) -> Result<Option<ParsedTable<V>>> {
    let path = dir.join(kind.file_name());
    let file = match std::fs::File::open(&path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(table = %kind, path = %path.display(), "Table file not found");
            return Ok(None);
        }
        Err(e) => {
            return Err(ImpactError::Table {
                table: kind.to_string(),
                detail: format!("{}: {e}", path.display()),
            })
        }
    };

    let table = parse(file)?;
    if table.rows.is_empty() {
        warn!(table = %kind, skipped = table.skipped, "Table loaded with no usable rows");
    } else {
        info!(table = %kind, rows = table.rows.len(), skipped = table.skipped, "Loaded table");
    }
    Ok(Some(table))
}
