//! Parameter profiles resolved by the store.

use serde::{Deserialize, Serialize};

/// Embodied carbon of a small server CPU (kgCO2e).
pub const CPU_SMALL_KG: f64 = 320.0;
/// Embodied carbon of a medium server CPU (kgCO2e).
pub const CPU_MEDIUM_KG: f64 = 720.0;
/// Embodied carbon of a large server CPU (kgCO2e).
pub const CPU_LARGE_KG: f64 = 1250.0;
/// Embodied carbon of an NVIDIA A10G (kgCO2e).
pub const GPU_A10G_KG: f64 = 1450.0;
/// Embodied carbon of an NVIDIA A100 (kgCO2e).
pub const GPU_A100_KG: f64 = 2850.0;
/// Embodied carbon of an NVIDIA H100 (kgCO2e).
pub const GPU_H100_KG: f64 = 3750.0;
/// Embodied carbon per 16 GB memory module (kgCO2e).
pub const MEMORY_MODULE_KG: f64 = 7.5;
/// Size of one memory module in GB.
pub const MEMORY_MODULE_GB: f64 = 16.0;
/// Embodied carbon per TB of SSD (kgCO2e).
pub const SSD_PER_TB_KG: f64 = 85.0;
/// Embodied carbon of chassis, PSU, board and the rest (kgCO2e).
pub const CHASSIS_KG: f64 = 650.0;
/// Default hardware lifecycle in years.
pub const DEFAULT_LIFECYCLE_YEARS: f64 = 4.0;

// ============================================================================
// Water stress
// ============================================================================

/// Baseline used to normalise numeric stress indices into multipliers.
pub const STRESS_INDEX_BASELINE: f64 = 3.0;

/// Regional water stress, either categorical or a numeric index (1-5).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StressRepr", into = "StressRepr")]
pub enum WaterStress {
    Low,
    Medium,
    High,
    VeryHigh,
    /// Numeric stress index, usually on a 1-5 scale.
    Index(f64),
}

impl WaterStress {
    /// Parse a table cell. Numbers become [`WaterStress::Index`].
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if let Ok(index) = value.parse::<f64>() {
            return (index.is_finite() && index >= 0.0).then_some(Self::Index(index));
        }

        let normalized: String = value
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "low" => Some(Self::Low),
            "medium" | "moderate" => Some(Self::Medium),
            "high" => Some(Self::High),
            "veryhigh" | "extremelyhigh" | "extreme" => Some(Self::VeryHigh),
            _ => None,
        }
    }

    /// Multiplier applied to water usage to obtain the water impact score.
    #[must_use]
    pub fn multiplier(self) -> f64 {
        match self {
            Self::Low => 1.0,
            Self::Medium => 1.5,
            Self::High => 2.0,
            Self::VeryHigh => 3.0,
            Self::Index(index) => index / STRESS_INDEX_BASELINE,
        }
    }
}

impl std::fmt::Display for WaterStress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "Low"),
            Self::Medium => write!(f, "Medium"),
            Self::High => write!(f, "High"),
            Self::VeryHigh => write!(f, "Very High"),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum StressRepr {
    Index(f64),
    Label(String),
}

impl TryFrom<StressRepr> for WaterStress {
    type Error = String;

    fn try_from(repr: StressRepr) -> Result<Self, Self::Error> {
        match repr {
            StressRepr::Index(index) if index.is_finite() && index >= 0.0 => {
                Ok(Self::Index(index))
            }
            StressRepr::Index(index) => Err(format!("invalid water stress index: {index}")),
            StressRepr::Label(label) => {
                Self::parse(&label).ok_or_else(|| format!("unknown water stress level: {label}"))
            }
        }
    }
}

impl From<WaterStress> for StressRepr {
    fn from(stress: WaterStress) -> Self {
        match stress {
            WaterStress::Index(index) => Self::Index(index),
            other => Self::Label(other.to_string()),
        }
    }
}

// ============================================================================
// Region
// ============================================================================

/// Resolved factors for one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionProfile {
    /// Region code (e.g. `us-east-1`).
    pub region: String,
    /// Grid carbon intensity (gCO2e/kWh).
    pub carbon_intensity: f64,
    /// Power usage effectiveness (>= 1).
    pub pue: f64,
    /// Water usage effectiveness (L/kWh).
    pub wue: f64,
    /// Water stress level.
    pub water_stress: WaterStress,
}

// ============================================================================
// Model
// ============================================================================

/// Per-token energy draw, normalised to kWh per million tokens.
///
/// kWh per million tokens and Wh per thousand tokens are the same number.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergyRate {
    pub input_kwh_per_million: f64,
    pub output_kwh_per_million: f64,
}

impl EnergyRate {
    #[must_use]
    pub fn new(input_kwh_per_million: f64, output_kwh_per_million: f64) -> Self {
        Self {
            input_kwh_per_million,
            output_kwh_per_million,
        }
    }
}

/// One-time training footprint of a model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingFootprint {
    /// Total training emissions (gCO2e).
    pub total_emissions_g: f64,
    /// Expected lifetime inference volume the footprint is spread across.
    pub expected_inferences: f64,
}

/// Resolved factors for one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelProfile {
    /// Model id that was requested.
    pub model_id: String,
    /// Energy draw per token.
    pub energy: EnergyRate,
    /// Training footprint, when known.
    pub training: Option<TrainingFootprint>,
}

// ============================================================================
// Hardware
// ============================================================================

/// CPU size class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CpuClass {
    Small,
    Medium,
    Large,
}

impl CpuClass {
    #[must_use]
    pub fn embodied_kg(self) -> f64 {
        match self {
            Self::Small => CPU_SMALL_KG,
            Self::Medium => CPU_MEDIUM_KG,
            Self::Large => CPU_LARGE_KG,
        }
    }
}

/// Accelerator type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GpuKind {
    A10g,
    A100,
    H100,
}

impl GpuKind {
    #[must_use]
    pub fn embodied_kg(self) -> f64 {
        match self {
            Self::A10g => GPU_A10G_KG,
            Self::A100 => GPU_A100_KG,
            Self::H100 => GPU_H100_KG,
        }
    }
}

/// Server bill of materials used to estimate embodied carbon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BillOfMaterials {
    pub gpu: GpuKind,
    pub gpu_count: u32,
    pub cpu: CpuClass,
    pub memory_gb: f64,
    pub storage_tb: f64,
}

impl BillOfMaterials {
    /// Total embodied carbon of one server (kgCO2e).
    #[must_use]
    pub fn total_kg(&self) -> f64 {
        let gpu = self.gpu.embodied_kg() * f64::from(self.gpu_count);
        let memory = MEMORY_MODULE_KG * (self.memory_gb / MEMORY_MODULE_GB);
        let storage = SSD_PER_TB_KG * self.storage_tb;
        gpu + self.cpu.embodied_kg() + memory + storage + CHASSIS_KG
    }
}

/// Source of embodied carbon for a piece of hardware.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Embodied {
    /// A single lifecycle total (kgCO2e).
    Total { kg: f64 },
    /// Component breakdown.
    Components(BillOfMaterials),
}

impl Embodied {
    #[must_use]
    pub fn total_kg(&self) -> f64 {
        match self {
            Self::Total { kg } => *kg,
            Self::Components(bom) => bom.total_kg(),
        }
    }
}

/// Hardware behind an instance type or a hosted model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardwareProfile {
    /// Instance type or model id.
    pub resource_id: String,
    /// Average power draw, when known (W).
    pub power_draw_watts: Option<f64>,
    /// Embodied carbon.
    pub embodied: Embodied,
    /// Usable lifetime in years.
    pub lifecycle_years: f64,
    /// Servers (or fraction of a server) attributed to one unit of the resource.
    pub server_count: f64,
}

impl HardwareProfile {
    /// Lifecycle expressed in hours.
    #[must_use]
    pub fn lifecycle_hours(&self) -> f64 {
        self.lifecycle_years * 365.0 * 24.0
    }

    /// Total embodied carbon (kgCO2e).
    #[must_use]
    pub fn total_embodied_kg(&self) -> f64 {
        self.embodied.total_kg()
    }
}

// ============================================================================
// Pricing
// ============================================================================

/// On-demand price for a model, per thousand tokens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPrice {
    pub input_usd_per_1k: f64,
    pub output_usd_per_1k: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stress_parse_categories() {
        assert_eq!(WaterStress::parse("Low"), Some(WaterStress::Low));
        assert_eq!(WaterStress::parse(" medium "), Some(WaterStress::Medium));
        assert_eq!(WaterStress::parse("Very High"), Some(WaterStress::VeryHigh));
        assert_eq!(WaterStress::parse("very_high"), Some(WaterStress::VeryHigh));
        assert_eq!(WaterStress::parse("Unknown"), None);
    }

    #[test]
    fn test_stress_parse_numeric() {
        assert_eq!(WaterStress::parse("4.5"), Some(WaterStress::Index(4.5)));
        assert_eq!(WaterStress::parse("-1"), None);
    }

    #[test]
    fn test_stress_multipliers() {
        assert!((WaterStress::Low.multiplier() - 1.0).abs() < 1e-12);
        assert!((WaterStress::Medium.multiplier() - 1.5).abs() < 1e-12);
        assert!((WaterStress::High.multiplier() - 2.0).abs() < 1e-12);
        assert!((WaterStress::VeryHigh.multiplier() - 3.0).abs() < 1e-12);
        assert!((WaterStress::Index(4.5).multiplier() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_stress_serde_both_encodings() {
        let label: WaterStress = serde_json::from_str("\"Very High\"").unwrap();
        assert_eq!(label, WaterStress::VeryHigh);
        let index: WaterStress = serde_json::from_str("2.5").unwrap();
        assert_eq!(index, WaterStress::Index(2.5));

        assert_eq!(
            serde_json::to_string(&WaterStress::High).unwrap(),
            "\"High\""
        );
        assert!(serde_json::from_str::<WaterStress>("\"soggy\"").is_err());
    }

    #[test]
    fn test_bill_of_materials_total() {
        let bom = BillOfMaterials {
            gpu: GpuKind::A100,
            gpu_count: 8,
            cpu: CpuClass::Large,
            memory_gb: 1024.0,
            storage_tb: 4.0,
        };
        // 8*2850 + 1250 + 64*7.5 + 4*85 + 650
        let expected = 22_800.0 + 1250.0 + 480.0 + 340.0 + 650.0;
        assert!((bom.total_kg() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_lifecycle_hours() {
        let profile = HardwareProfile {
            resource_id: "m5.large".to_string(),
            power_draw_watts: Some(100.0),
            embodied: Embodied::Total { kg: 400.0 },
            lifecycle_years: 4.0,
            server_count: 1.0,
        };
        assert!((profile.lifecycle_hours() - 35_040.0).abs() < 1e-9);
        assert!((profile.total_embodied_kg() - 400.0).abs() < 1e-9);
    }
}
