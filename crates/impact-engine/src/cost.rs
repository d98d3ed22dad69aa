//! Cost Model: on-demand price of a usage record (USD), and what the same
//! usage would cost under a reserved or savings-plan commitment.

use serde::{Deserialize, Serialize};

use crate::params::{ModelPrice, ParameterStore};
use crate::usage::{ResourceType, UsageRecord};

/// Storage price per GB-month.
pub const STORAGE_USD_PER_GB_MONTH: f64 = 0.023;
/// Serverless price per GB-second.
pub const SERVERLESS_USD_PER_GB_SECOND: f64 = 0.000_016_666_7;
/// Price per million metered requests.
pub const USD_PER_MILLION_REQUESTS: f64 = 0.20;
/// Container price per vCPU-hour.
pub const CONTAINER_USD_PER_VCPU_HOUR: f64 = 0.040_48;

/// Reserved-instance price as a fraction of on-demand.
pub const RESERVED_PRICE_FACTOR: f64 = 0.6;
/// Savings-plan price as a fraction of on-demand, for instances.
pub const SAVINGS_PLAN_PRICE_FACTOR: f64 = 0.7;
/// Compute savings-plan price as a fraction of on-demand, for serverless.
pub const SERVERLESS_SAVINGS_PLAN_FACTOR: f64 = 0.85;

const HOURS_PER_MONTH: f64 = 730.0;

/// Source of unit prices.
pub trait PriceBook {
    /// Hourly on-demand price of an instance type.
    fn hourly_usd(&self, instance_type: &str) -> f64;

    /// Per-thousand-token price of a model.
    fn model_price(&self, model_id: &str) -> ModelPrice;
}

impl PriceBook for ParameterStore {
    fn hourly_usd(&self, instance_type: &str) -> f64 {
        self.hourly_price(instance_type)
    }

    fn model_price(&self, model_id: &str) -> ModelPrice {
        ParameterStore::model_price(self, model_id)
    }
}

#[allow(clippy::cast_precision_loss)]
fn requests_usd(requests: i64) -> f64 {
    requests as f64 / 1_000_000.0 * USD_PER_MILLION_REQUESTS
}

/// Price of a usage record. Resource types without a price model cost 0.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn cost_usd(usage: &UsageRecord, prices: &impl PriceBook) -> f64 {
    match usage.resource_type {
        ResourceType::Compute => {
            prices.hourly_usd(&usage.resource_id) * usage.hours * usage.count as f64
        }
        ResourceType::Inference => {
            let price = prices.model_price(&usage.resource_id);
            usage.input_tokens as f64 / 1000.0 * price.input_usd_per_1k
                + usage.output_tokens as f64 / 1000.0 * price.output_usd_per_1k
        }
        ResourceType::Storage => {
            usage.storage_gb * STORAGE_USD_PER_GB_MONTH * (usage.hours / HOURS_PER_MONTH)
        }
        ResourceType::Serverless => {
            usage.gb_seconds * SERVERLESS_USD_PER_GB_SECOND + requests_usd(usage.requests)
        }
        ResourceType::Requests => requests_usd(usage.requests),
        ResourceType::Container => usage.vcpu_hours * CONTAINER_USD_PER_VCPU_HOUR,
        ResourceType::Other => 0.0,
    }
}

/// On-demand price with the commitment alternatives AWS offers for it.
///
/// A `None` alternative means the resource type has no such commitment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CommitmentCosts {
    pub on_demand_usd: f64,
    pub reserved_usd: Option<f64>,
    pub savings_plan_usd: Option<f64>,
}

impl CommitmentCosts {
    /// A price with no commitment alternatives.
    #[must_use]
    pub fn on_demand(on_demand_usd: f64) -> Self {
        Self {
            on_demand_usd,
            reserved_usd: None,
            savings_plan_usd: None,
        }
    }

    /// Cheapest of on-demand and the available commitments.
    #[must_use]
    pub fn lowest_usd(&self) -> f64 {
        [self.reserved_usd, self.savings_plan_usd]
            .into_iter()
            .flatten()
            .fold(self.on_demand_usd, f64::min)
    }

    /// What the cheapest commitment saves over on-demand (USD).
    #[must_use]
    pub fn max_savings_usd(&self) -> f64 {
        self.on_demand_usd - self.lowest_usd()
    }
}

/// Reserved-instance price of a usage record, for compute only.
#[must_use]
pub fn reserved_cost_usd(usage: &UsageRecord, prices: &impl PriceBook) -> Option<f64> {
    match usage.resource_type {
        ResourceType::Compute => Some(cost_usd(usage, prices) * RESERVED_PRICE_FACTOR),
        _ => None,
    }
}

/// Savings-plan price of a usage record, for compute and serverless.
#[must_use]
pub fn savings_plan_cost_usd(usage: &UsageRecord, prices: &impl PriceBook) -> Option<f64> {
    let factor = match usage.resource_type {
        ResourceType::Compute => SAVINGS_PLAN_PRICE_FACTOR,
        ResourceType::Serverless => SERVERLESS_SAVINGS_PLAN_FACTOR,
        _ => return None,
    };
    Some(cost_usd(usage, prices) * factor)
}

/// On-demand price plus its commitment alternatives.
#[must_use]
pub fn commitment_costs(usage: &UsageRecord, prices: &impl PriceBook) -> CommitmentCosts {
    CommitmentCosts {
        on_demand_usd: cost_usd(usage, prices),
        reserved_usd: reserved_cost_usd(usage, prices),
        savings_plan_usd: savings_plan_cost_usd(usage, prices),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FlatPrices;

    impl PriceBook for FlatPrices {
        fn hourly_usd(&self, _instance_type: &str) -> f64 {
            0.5
        }

        fn model_price(&self, _model_id: &str) -> ModelPrice {
            ModelPrice {
                input_usd_per_1k: 0.001,
                output_usd_per_1k: 0.002,
            }
        }
    }

    #[test]
    fn test_compute_cost() {
        let usage = UsageRecord::compute("any", "r", 10.0).with_count(2);
        assert!((cost_usd(&usage, &FlatPrices) - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_inference_cost() {
        let usage = UsageRecord::inference("any", "r", 2000, 1000);
        assert!((cost_usd(&usage, &FlatPrices) - 0.004).abs() < 1e-12);
    }

    #[test]
    fn test_fixed_rate_costs() {
        let storage = UsageRecord::storage("bucket", "r", 100.0, 730.0);
        assert!((cost_usd(&storage, &FlatPrices) - 2.3).abs() < 1e-9);

        let lambda = UsageRecord::serverless("fn", "r", 0.0, 5_000_000);
        assert!((cost_usd(&lambda, &FlatPrices) - 1.0).abs() < 1e-12);

        let other = UsageRecord::new(ResourceType::Other, "x", "r").with_hours(5.0);
        assert!(cost_usd(&other, &FlatPrices).abs() < 1e-12);
    }

    #[test]
    fn test_store_price_book() {
        let store = ParameterStore::default();
        let usage = UsageRecord::compute("m5.large", "us-east-1", 10.0);
        assert!((cost_usd(&usage, &store) - 0.96).abs() < 1e-12);
    }

    #[test]
    fn test_compute_commitment_discounts() {
        let usage = UsageRecord::compute("any", "r", 100.0);
        let costs = commitment_costs(&usage, &FlatPrices);
        assert!((costs.on_demand_usd - 50.0).abs() < 1e-12);
        assert!((costs.reserved_usd.unwrap() - 30.0).abs() < 1e-12);
        assert!((costs.savings_plan_usd.unwrap() - 35.0).abs() < 1e-12);
        assert!((costs.lowest_usd() - 30.0).abs() < 1e-12);
        assert!((costs.max_savings_usd() - 20.0).abs() < 1e-12);
    }

    #[test]
    fn test_commitments_by_resource_type() {
        let lambda = UsageRecord::serverless("fn", "r", 0.0, 5_000_000);
        assert!(reserved_cost_usd(&lambda, &FlatPrices).is_none());
        assert!((savings_plan_cost_usd(&lambda, &FlatPrices).unwrap() - 0.85).abs() < 1e-12);

        let storage = UsageRecord::storage("bucket", "r", 100.0, 730.0);
        let costs = commitment_costs(&storage, &FlatPrices);
        assert_eq!(costs, CommitmentCosts::on_demand(costs.on_demand_usd));
        assert!(costs.max_savings_usd().abs() < 1e-12);

        let tokens = UsageRecord::inference("any", "r", 2000, 1000);
        assert!(savings_plan_cost_usd(&tokens, &FlatPrices).is_none());
    }
}
