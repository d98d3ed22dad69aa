//! Energy Model: usage to IT energy (kWh), before PUE.

use tracing::debug;

use crate::error::Result;
use crate::params::{EnergyRate, ParameterStore};
use crate::usage::{ResourceType, UsageRecord};

/// Storage energy per GB-month (kWh).
pub const STORAGE_KWH_PER_GB_MONTH: f64 = 0.001;
/// Hours in an average month.
pub const HOURS_PER_MONTH: f64 = 730.0;
/// Serverless draw per GB of allocated memory (W).
pub const SERVERLESS_WATTS_PER_GB: f64 = 10.0;
/// Energy per metered request (kWh).
pub const KWH_PER_REQUEST: f64 = 1e-7;
/// Container draw per vCPU (W).
pub const CONTAINER_WATTS_PER_VCPU: f64 = 8.0;
/// Draw assumed for unrecognised resource types (W).
pub const OTHER_WATTS: f64 = 20.0;

const TOKENS_PER_MILLION: f64 = 1_000_000.0;
const SECONDS_PER_HOUR: f64 = 3600.0;

/// `power_watts / 1000 * hours * count`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn compute_kwh(power_watts: f64, hours: f64, count: i64) -> f64 {
    power_watts / 1000.0 * hours * count as f64
}

/// Token energy at a per-million rate.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn inference_kwh(rate: &EnergyRate, input_tokens: i64, output_tokens: i64) -> f64 {
    (input_tokens as f64 / TOKENS_PER_MILLION) * rate.input_kwh_per_million
        + (output_tokens as f64 / TOKENS_PER_MILLION) * rate.output_kwh_per_million
}

#[must_use]
pub fn storage_kwh(storage_gb: f64, hours: f64) -> f64 {
    storage_gb * STORAGE_KWH_PER_GB_MONTH * (hours / HOURS_PER_MONTH)
}

#[must_use]
pub fn serverless_kwh(gb_seconds: f64) -> f64 {
    gb_seconds * SERVERLESS_WATTS_PER_GB / (1000.0 * SECONDS_PER_HOUR)
}

#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn requests_kwh(requests: i64) -> f64 {
    requests as f64 * KWH_PER_REQUEST
}

#[must_use]
pub fn container_kwh(vcpu_hours: f64) -> f64 {
    vcpu_hours * CONTAINER_WATTS_PER_VCPU / 1000.0
}

#[must_use]
pub fn other_kwh(hours: f64) -> f64 {
    hours * OTHER_WATTS / 1000.0
}

/// IT energy consumed by a usage record (kWh, before PUE).
///
/// Compute power comes from the hardware table; inference rates come from
/// the model table. Serverless records also pay for their invocations.
///
/// # Errors
///
/// Returns an error only when an inference record needs the model table and
/// that table is empty.
pub fn compute_energy(usage: &UsageRecord, store: &ParameterStore) -> Result<f64> {
    let kwh = match usage.resource_type {
        ResourceType::Compute => {
            let watts = store.instance_power(&usage.resource_id);
            compute_kwh(watts, usage.hours, usage.count)
        }
        ResourceType::Inference => {
            let model = store.model(&usage.resource_id)?;
            inference_kwh(&model.energy, usage.input_tokens, usage.output_tokens)
        }
        ResourceType::Storage => storage_kwh(usage.storage_gb, usage.hours),
        ResourceType::Serverless => {
            serverless_kwh(usage.gb_seconds) + requests_kwh(usage.requests)
        }
        ResourceType::Requests => requests_kwh(usage.requests),
        ResourceType::Container => container_kwh(usage.vcpu_hours),
        ResourceType::Other => other_kwh(usage.hours),
    };

    debug!(
        resource_type = %usage.resource_type,
        resource_id = %usage.resource_id,
        kwh,
        "Computed energy"
    );
    Ok(kwh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegionDefaults;
    use crate::params::{Embodied, HardwareProfile};

    #[test]
    fn test_compute_kwh() {
        assert!((compute_kwh(200.0, 10.0, 2) - 4.0).abs() < 1e-12);
        assert!(compute_kwh(200.0, 0.0, 2).abs() < 1e-12);
    }

    #[test]
    fn test_inference_kwh() {
        // 0.1 Wh and 0.3 Wh per 1K tokens are 0.1 and 0.3 kWh per 1M tokens.
        let rate = EnergyRate::new(0.1, 0.3);
        assert!((inference_kwh(&rate, 1000, 500) - 0.00025).abs() < 1e-15);
    }

    #[test]
    fn test_fixed_rate_formulas() {
        assert!((storage_kwh(1000.0, 730.0) - 1.0).abs() < 1e-12);
        assert!((serverless_kwh(360_000.0) - 1.0).abs() < 1e-12);
        assert!((requests_kwh(10_000_000) - 1.0).abs() < 1e-12);
        assert!((container_kwh(125.0) - 1.0).abs() < 1e-12);
        assert!((other_kwh(50.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_compute_energy_dispatch() {
        let store = ParameterStore::empty(RegionDefaults::default()).unwrap()
            .with_model("m", EnergyRate::new(0.1, 0.3))
            .with_hardware(HardwareProfile {
                resource_id: "big.box".to_string(),
                power_draw_watts: Some(200.0),
                embodied: Embodied::Total { kg: 1000.0 },
                lifecycle_years: 4.0,
                server_count: 1.0,
            });

        let compute = UsageRecord::compute("big.box", "r", 10.0).with_count(2);
        assert!((compute_energy(&compute, &store).unwrap() - 4.0).abs() < 1e-12);

        let inference = UsageRecord::inference("m", "r", 1000, 500);
        assert!((compute_energy(&inference, &store).unwrap() - 0.00025).abs() < 1e-15);

        let lambda = UsageRecord::serverless("fn", "r", 360_000.0, 10_000_000);
        assert!((compute_energy(&lambda, &store).unwrap() - 2.0).abs() < 1e-12);

        let other = UsageRecord::new(ResourceType::from("satellite"), "x", "r").with_hours(50.0);
        assert!((compute_energy(&other, &store).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_inference_without_model_table_fails() {
        let store = ParameterStore::empty(RegionDefaults::default()).unwrap();
        let usage = UsageRecord::inference("m", "r", 1, 1);
        assert!(compute_energy(&usage, &store).is_err());
    }
}
