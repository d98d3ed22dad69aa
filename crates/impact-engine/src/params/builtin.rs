//! Built-in reference data.
//!
//! Used when no data directory is configured, and for the optional hardware
//! and pricing tables when their files are absent.

use super::profiles::{
    BillOfMaterials, CpuClass, Embodied, EnergyRate, GpuKind, HardwareProfile, ModelPrice,
    TrainingFootprint, WaterStress, DEFAULT_LIFECYCLE_YEARS,
};

/// Energy rate used when a model has no row and the table has no `default` row.
pub const DEFAULT_ENERGY_RATE: EnergyRate = EnergyRate {
    input_kwh_per_million: 0.05,
    output_kwh_per_million: 0.15,
};

/// Price used when a model has no row and the table has no `default` row.
pub const DEFAULT_MODEL_PRICE: ModelPrice = ModelPrice {
    input_usd_per_1k: 0.0005,
    output_usd_per_1k: 0.0015,
};

/// Hourly price for instance types without a pricing row (USD).
pub const DEFAULT_HOURLY_USD: f64 = 0.05;

/// Estimated draw per vCPU for instance types without a power figure (W).
pub const WATTS_PER_VCPU: f64 = 25.0;

/// Draw assumed when an instance id has no recognisable size suffix (W).
pub const DEFAULT_INSTANCE_WATTS: f64 = 100.0;

/// Embodied carbon per watt of rated draw for instances with no embodied figure.
const EMBODIED_KG_PER_WATT: f64 = 4.0;

/// Row key that provides table-level defaults.
pub const DEFAULT_KEY: &str = "default";

/// `(region, carbon intensity, pue, wue, water stress)`.
pub const REGIONS: &[(&str, f64, f64, f64, WaterStress)] = &[
    ("us-east-1", 379.1, 1.20, 1.8, WaterStress::Medium),
    ("us-east-2", 429.0, 1.15, 1.9, WaterStress::Medium),
    ("us-west-1", 204.0, 1.25, 2.1, WaterStress::High),
    ("us-west-2", 136.3, 1.18, 1.7, WaterStress::Medium),
    ("ca-central-1", 128.9, 1.19, 1.4, WaterStress::Low),
    ("sa-east-1", 142.9, 1.28, 1.9, WaterStress::Low),
    ("eu-west-1", 316.0, 1.15, 1.5, WaterStress::Low),
    ("eu-west-2", 231.0, 1.22, 1.9, WaterStress::Medium),
    ("eu-west-3", 51.2, 1.17, 1.6, WaterStress::Low),
    ("eu-central-1", 311.0, 1.20, 1.6, WaterStress::Medium),
    ("eu-north-1", 8.6, 1.07, 1.1, WaterStress::Low),
    ("ap-northeast-1", 506.0, 1.20, 1.8, WaterStress::High),
    ("ap-southeast-1", 408.0, 1.25, 2.5, WaterStress::Medium),
    ("ap-southeast-2", 700.3, 1.24, 2.2, WaterStress::High),
    ("ap-south-1", 708.0, 1.26, 2.7, WaterStress::VeryHigh),
];

/// `(model id, input kWh/1M tokens, output kWh/1M tokens)`.
pub const MODEL_ENERGY: &[(&str, f64, f64)] = &[
    ("anthropic.claude-3-opus-20240229-v1:0", 0.08, 0.24),
    ("anthropic.claude-3-sonnet-20240229-v1:0", 0.05, 0.15),
    ("anthropic.claude-3-haiku-20240307-v1:0", 0.03, 0.09),
    ("anthropic.claude-2.1", 0.06, 0.18),
    ("anthropic.claude-2.0", 0.06, 0.18),
    ("anthropic.claude-instant-1.2", 0.03, 0.09),
    ("amazon.titan-text-express-v1:0", 0.04, 0.12),
    ("amazon.titan-text-lite-v1:0", 0.02, 0.06),
    ("meta.llama3-70b-instruct-v1:0", 0.05, 0.15),
    (DEFAULT_KEY, 0.05, 0.15),
];

/// `(model id, total training gCO2e, expected lifetime inference tokens)`.
pub const MODEL_TRAINING: &[(&str, f64, f64)] = &[
    ("anthropic.claude-3-sonnet-20240229-v1:0", 6.5e8, 1.8e10),
    ("anthropic.claude-3-haiku-20240307-v1:0", 2.6e8, 2.0e10),
];

/// `(instance type, power draw W)`.
pub const INSTANCE_POWER: &[(&str, f64)] = &[
    ("t2.micro", 5.0),
    ("t2.small", 10.0),
    ("t2.medium", 20.0),
    ("t2.large", 40.0),
    ("t3.micro", 5.0),
    ("t3.small", 10.0),
    ("t3.medium", 20.0),
    ("t3.large", 35.0),
    ("m5.large", 100.0),
    ("m5.xlarge", 200.0),
    ("m5.2xlarge", 400.0),
    ("m5.4xlarge", 750.0),
    ("m6i.large", 80.0),
    ("m6i.xlarge", 160.0),
    ("m6i.2xlarge", 320.0),
    ("m6i.4xlarge", 640.0),
    ("c5.large", 85.0),
    ("c5.xlarge", 170.0),
    ("c5.2xlarge", 340.0),
    ("c5.4xlarge", 680.0),
    ("c6i.large", 80.0),
    ("c6i.xlarge", 155.0),
    ("c6i.2xlarge", 310.0),
    ("c6i.4xlarge", 620.0),
    ("r5.large", 120.0),
    ("r5.xlarge", 230.0),
    ("r5.2xlarge", 450.0),
    ("r5.4xlarge", 870.0),
    ("r6i.large", 110.0),
    ("r6i.xlarge", 210.0),
    ("r6i.2xlarge", 420.0),
    ("r6i.4xlarge", 840.0),
    ("i3.large", 150.0),
    ("i3.xlarge", 300.0),
    ("i3.2xlarge", 600.0),
    ("i3.4xlarge", 1200.0),
    ("p3.2xlarge", 650.0),
    ("p3.8xlarge", 2500.0),
    ("p3.16xlarge", 5000.0),
    ("g4dn.xlarge", 300.0),
    ("g4dn.2xlarge", 450.0),
    ("g4dn.4xlarge", 750.0),
];

/// `(resource id, embodied kgCO2e, lifecycle years)`.
const INSTANCE_EMBODIED: &[(&str, f64, f64)] = &[
    ("t2.micro", 150.0, 4.0),
    ("t3.medium", 250.0, 4.0),
    ("m5.large", 400.0, 4.0),
    ("c5.xlarge", 600.0, 4.0),
    ("r5.large", 450.0, 4.0),
    ("p3.2xlarge", 2500.0, 3.0),
    ("db.t3.micro", 200.0, 4.0),
    ("db.t3.small", 300.0, 4.0),
    ("db.r5.large", 600.0, 4.0),
    ("db.r5.xlarge", 900.0, 4.0),
    ("ml.t3.medium", 300.0, 4.0),
    ("ml.c5.xlarge", 700.0, 4.0),
    ("ml.p3.2xlarge", 3000.0, 3.0),
];

/// `(instance type, USD per hour)`.
pub const INSTANCE_PRICING: &[(&str, f64)] = &[
    ("t3.nano", 0.0052),
    ("t3.micro", 0.0104),
    ("t3.small", 0.0208),
    ("t3.medium", 0.0416),
    ("t3.large", 0.0832),
    ("t3.xlarge", 0.1664),
    ("m5.large", 0.096),
    ("m5.xlarge", 0.192),
    ("m5.2xlarge", 0.384),
    ("m5.4xlarge", 0.768),
    ("c5.large", 0.085),
    ("c5.xlarge", 0.17),
    ("c5.2xlarge", 0.34),
    ("c5.4xlarge", 0.68),
    ("r5.large", 0.126),
    ("r5.xlarge", 0.252),
    ("r5.2xlarge", 0.504),
    ("r5.4xlarge", 1.008),
    ("p3.2xlarge", 3.06),
];

/// `(model id, input USD/1K tokens, output USD/1K tokens)`.
pub const MODEL_PRICING: &[(&str, f64, f64)] = &[
    ("anthropic.claude-3-opus-20240229-v1:0", 0.0015, 0.0075),
    ("anthropic.claude-3-sonnet-20240229-v1:0", 0.0008, 0.0024),
    ("anthropic.claude-3-haiku-20240307-v1:0", 0.00025, 0.00125),
];

/// `(storage family, embodied kgCO2e per GB-month)`, matched by substring of
/// the lowercased resource id in this order.
pub const STORAGE_EMBODIED_KG_PER_GB_MONTH: &[(&str, f64)] = &[
    ("s3", 0.05),
    ("ebs", 0.1),
    ("network", 0.05),
];

/// Embodied factor for storage ids that match no family (kgCO2e per GB-month).
pub const DEFAULT_STORAGE_EMBODIED_KG_PER_GB_MONTH: f64 = 0.08;

/// Embodied factor for a storage resource id.
#[must_use]
pub fn storage_embodied_kg_per_gb_month(resource_id: &str) -> f64 {
    let id = resource_id.to_lowercase();
    STORAGE_EMBODIED_KG_PER_GB_MONTH
        .iter()
        .find(|(family, _)| id.contains(family))
        .map_or(DEFAULT_STORAGE_EMBODIED_KG_PER_GB_MONTH, |&(_, kg)| kg)
}

/// Server bill of materials used for models and unknown hardware.
pub const DEFAULT_BILL_OF_MATERIALS: BillOfMaterials = BillOfMaterials {
    gpu: GpuKind::A10g,
    gpu_count: 2,
    cpu: CpuClass::Medium,
    memory_gb: 256.0,
    storage_tb: 1.0,
};

/// Share of a default server attributed to one unit of an unknown resource.
pub const DEFAULT_SERVER_COUNT: f64 = 0.2;

/// `(model id, bill of materials, server count)`.
const MODEL_HARDWARE: &[(&str, BillOfMaterials, f64)] = &[
    (
        "anthropic.claude-3-opus-20240229-v1:0",
        BillOfMaterials {
            gpu: GpuKind::A100,
            gpu_count: 8,
            cpu: CpuClass::Large,
            memory_gb: 1024.0,
            storage_tb: 4.0,
        },
        1.0,
    ),
    (
        "anthropic.claude-3-sonnet-20240229-v1:0",
        BillOfMaterials {
            gpu: GpuKind::A100,
            gpu_count: 4,
            cpu: CpuClass::Medium,
            memory_gb: 512.0,
            storage_tb: 2.0,
        },
        0.5,
    ),
    (
        "anthropic.claude-3-haiku-20240307-v1:0",
        DEFAULT_BILL_OF_MATERIALS,
        DEFAULT_SERVER_COUNT,
    ),
];

/// Hardware profile used for ids with no hardware row.
#[must_use]
pub fn default_hardware(resource_id: &str) -> HardwareProfile {
    HardwareProfile {
        resource_id: resource_id.to_string(),
        power_draw_watts: None,
        embodied: Embodied::Components(DEFAULT_BILL_OF_MATERIALS),
        lifecycle_years: DEFAULT_LIFECYCLE_YEARS,
        server_count: DEFAULT_SERVER_COUNT,
    }
}

/// Built-in hardware profiles: instance types first, then model servers.
pub fn hardware_profiles() -> impl Iterator<Item = HardwareProfile> {
    let instances = INSTANCE_POWER.iter().map(|&(id, watts)| {
        let (kg, lifecycle_years) = INSTANCE_EMBODIED
            .iter()
            .find(|(known, _, _)| *known == id)
            .map_or((watts * EMBODIED_KG_PER_WATT, DEFAULT_LIFECYCLE_YEARS), |&(_, kg, years)| {
                (kg, years)
            });
        HardwareProfile {
            resource_id: id.to_string(),
            power_draw_watts: Some(watts),
            embodied: Embodied::Total { kg },
            lifecycle_years,
            server_count: 1.0,
        }
    });

    // Managed instance classes with embodied data but no published draw.
    let managed = INSTANCE_EMBODIED
        .iter()
        .filter(|(id, _, _)| !INSTANCE_POWER.iter().any(|(known, _)| known == id))
        .map(|&(id, kg, lifecycle_years)| HardwareProfile {
            resource_id: id.to_string(),
            power_draw_watts: None,
            embodied: Embodied::Total { kg },
            lifecycle_years,
            server_count: 1.0,
        });

    let models = MODEL_HARDWARE
        .iter()
        .map(|&(id, bom, server_count)| HardwareProfile {
            resource_id: id.to_string(),
            power_draw_watts: None,
            embodied: Embodied::Components(bom),
            lifecycle_years: DEFAULT_LIFECYCLE_YEARS,
            server_count,
        });

    instances.chain(managed).chain(models)
}

/// Estimate the vCPU count of an instance type from its size suffix.
///
/// `m5.large` is 2 vCPUs, `m5.xlarge` 4, `m5.8xlarge` 32. Returns `None`
/// when the id has no recognisable size.
#[must_use]
pub fn estimate_vcpus(instance_type: &str) -> Option<u32> {
    let size = instance_type.rsplit('.').next()?;
    if size == instance_type {
        return None;
    }
    match size {
        "nano" | "micro" | "small" => Some(1),
        "medium" | "large" => Some(2),
        "xlarge" => Some(4),
        "metal" => Some(96),
        _ => {
            let multiplier: u32 = size.strip_suffix("xlarge")?.parse().ok()?;
            multiplier.checked_mul(4)
        }
    }
}

/// Split an instance type into family and size: `m5.xlarge` is `("m5", "xlarge")`.
#[must_use]
pub fn instance_family(instance_type: &str) -> Option<(&str, &str)> {
    instance_type
        .rsplit_once('.')
        .filter(|(family, size)| !family.is_empty() && !size.is_empty())
}

/// Position of a size suffix on the ladder
/// `nano < micro < small < medium < large < xlarge < 2xlarge < ...`.
///
/// `None` for `metal` and anything unrecognised.
#[must_use]
pub fn size_rank(size: &str) -> Option<u32> {
    match size {
        "nano" => Some(1),
        "micro" => Some(2),
        "small" => Some(3),
        "medium" => Some(4),
        "large" => Some(5),
        "xlarge" => Some(8),
        _ => {
            let multiplier: u32 = size.strip_suffix("xlarge")?.parse().ok()?;
            multiplier.checked_mul(8)
        }
    }
}

/// Estimated draw for an instance type with no power figure (W).
#[must_use]
pub fn estimate_instance_watts(instance_type: &str) -> f64 {
    estimate_vcpus(instance_type).map_or(DEFAULT_INSTANCE_WATTS, |vcpus| {
        f64::from(vcpus) * WATTS_PER_VCPU
    })
}

/// Training footprints as profile values.
pub fn training_footprints() -> impl Iterator<Item = (&'static str, TrainingFootprint)> {
    MODEL_TRAINING.iter().map(|&(id, total_emissions_g, expected_inferences)| {
        (
            id,
            TrainingFootprint {
                total_emissions_g,
                expected_inferences,
            },
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_vcpus() {
        assert_eq!(estimate_vcpus("t3.micro"), Some(1));
        assert_eq!(estimate_vcpus("m5.large"), Some(2));
        assert_eq!(estimate_vcpus("m5.xlarge"), Some(4));
        assert_eq!(estimate_vcpus("c7g.16xlarge"), Some(64));
        assert_eq!(estimate_vcpus("custom"), None);
        assert_eq!(estimate_vcpus("x.weird"), None);
    }

    #[test]
    fn test_instance_family_and_size_ladder() {
        assert_eq!(instance_family("m5.xlarge"), Some(("m5", "xlarge")));
        assert_eq!(instance_family("db.r5.large"), Some(("db.r5", "large")));
        assert_eq!(instance_family("custom"), None);

        let ladder = ["nano", "micro", "small", "medium", "large", "xlarge", "2xlarge", "16xlarge"];
        let ranks: Vec<u32> = ladder.iter().map(|size| size_rank(size).unwrap()).collect();
        assert!(ranks.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(size_rank("metal"), None);
        assert_eq!(size_rank("huge"), None);
    }

    #[test]
    fn test_estimate_instance_watts() {
        assert!((estimate_instance_watts("m7i.2xlarge") - 200.0).abs() < 1e-9);
        assert!((estimate_instance_watts("mystery") - DEFAULT_INSTANCE_WATTS).abs() < 1e-9);
    }

    #[test]
    fn test_default_hardware_bill_of_materials() {
        let profile = default_hardware("unknown");
        // 2*1450 + 720 + 16*7.5 + 85 + 650
        assert!((profile.total_embodied_kg() - 4475.0).abs() < 1e-9);
        assert!((profile.server_count - DEFAULT_SERVER_COUNT).abs() < 1e-12);
        assert!(profile.power_draw_watts.is_none());
    }

    #[test]
    fn test_hardware_profiles_merge_power_and_embodied() {
        let profiles: Vec<_> = hardware_profiles().collect();

        let m5 = profiles.iter().find(|p| p.resource_id == "m5.large").unwrap();
        assert_eq!(m5.power_draw_watts, Some(100.0));
        assert!((m5.total_embodied_kg() - 400.0).abs() < 1e-9);

        let p3 = profiles.iter().find(|p| p.resource_id == "p3.2xlarge").unwrap();
        assert!((p3.lifecycle_years - 3.0).abs() < 1e-12);

        let c6i = profiles.iter().find(|p| p.resource_id == "c6i.large").unwrap();
        assert!((c6i.total_embodied_kg() - 320.0).abs() < 1e-9);

        let rds = profiles.iter().find(|p| p.resource_id == "db.r5.large").unwrap();
        assert!(rds.power_draw_watts.is_none());

        let opus = profiles
            .iter()
            .find(|p| p.resource_id.contains("claude-3-opus"))
            .unwrap();
        assert!((opus.server_count - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_storage_embodied_families() {
        assert!((storage_embodied_kg_per_gb_month("my-s3-bucket") - 0.05).abs() < 1e-12);
        assert!((storage_embodied_kg_per_gb_month("EBS-gp3-data") - 0.1).abs() < 1e-12);
        assert!((storage_embodied_kg_per_gb_month("network-egress") - 0.05).abs() < 1e-12);
        let unmatched = storage_embodied_kg_per_gb_month("efs-share");
        assert!((unmatched - DEFAULT_STORAGE_EMBODIED_KG_PER_GB_MONTH).abs() < 1e-12);
    }

    #[test]
    fn test_model_energy_has_default_row() {
        assert!(MODEL_ENERGY.iter().any(|(id, _, _)| *id == DEFAULT_KEY));
    }
}
