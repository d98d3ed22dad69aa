//! Resource usage records.

use serde::{Deserialize, Serialize};

use crate::error::{ImpactError, Result};

/// Utilization assumed for shared-tenancy hardware.
pub const DEFAULT_UTILIZATION: f64 = 0.05;

/// Kind of resource a usage record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    /// Hourly instances (EC2).
    Compute,
    /// Token-metered model calls (Bedrock).
    Inference,
    /// Object and block storage.
    Storage,
    /// Function invocations (Lambda).
    Serverless,
    /// Request-metered services (DynamoDB).
    Requests,
    /// Container tasks (ECS, EKS, Fargate).
    Container,
    /// Anything else. Charged at a minimal default draw.
    Other,
}

impl ResourceType {
    /// Parse a service or resource-type name. Never fails: unrecognised
    /// names map to [`ResourceType::Other`].
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "ec2" | "compute" => Self::Compute,
            "bedrock" | "inference" | "sagemaker" => Self::Inference,
            "s3" | "ebs" | "efs" | "glacier" | "storage" => Self::Storage,
            "lambda" | "serverless" => Self::Serverless,
            "dynamodb" | "requests" => Self::Requests,
            "ecs" | "eks" | "fargate" | "container" => Self::Container,
            _ => Self::Other,
        }
    }
}

impl From<&str> for ResourceType {
    fn from(name: &str) -> Self {
        Self::parse(name)
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Compute => "compute",
            Self::Inference => "inference",
            Self::Storage => "storage",
            Self::Serverless => "serverless",
            Self::Requests => "requests",
            Self::Container => "container",
            Self::Other => "other",
        };
        write!(f, "{name}")
    }
}

/// Window and share used to amortize embodied and training emissions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Amortization {
    /// Hours of hardware time attributed to the workload.
    pub duration_hours: f64,
    /// Fraction of the hardware the workload occupies (0-1).
    pub utilization: f64,
}

impl Amortization {
    #[must_use]
    pub fn new(duration_hours: f64, utilization: f64) -> Self {
        Self {
            duration_hours,
            utilization,
        }
    }

    /// Shared-tenancy amortization at [`DEFAULT_UTILIZATION`].
    #[must_use]
    pub fn shared(duration_hours: f64) -> Self {
        Self::new(duration_hours, DEFAULT_UTILIZATION)
    }

    /// Dedicated hardware for the whole window.
    #[must_use]
    pub fn dedicated(duration_hours: f64) -> Self {
        Self::new(duration_hours, 1.0)
    }

    fn validate(&self) -> Result<()> {
        check_quantity("duration_hours", self.duration_hours)?;
        if !(0.0..=1.0).contains(&self.utilization) {
            return Err(ImpactError::validation(format!(
                "utilization must be between 0 and 1, got {}",
                self.utilization
            )));
        }
        Ok(())
    }
}

/// One resource's usage over a period.
///
/// Only the quantity fields relevant to `resource_type` are read; the rest
/// stay at zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub resource_type: ResourceType,
    /// Instance type, model id, bucket name, function name, ...
    pub resource_id: String,
    pub region: String,
    /// Running hours (compute, storage, other).
    #[serde(default)]
    pub hours: f64,
    /// Number of identical instances.
    #[serde(default = "default_count")]
    pub count: i64,
    #[serde(default)]
    pub input_tokens: i64,
    #[serde(default)]
    pub output_tokens: i64,
    #[serde(default)]
    pub storage_gb: f64,
    /// Memory-seconds of serverless execution.
    #[serde(default)]
    pub gb_seconds: f64,
    #[serde(default)]
    pub requests: i64,
    #[serde(default)]
    pub vcpu_hours: f64,
    /// Present when embodied and training emissions should be included.
    #[serde(default)]
    pub amortization: Option<Amortization>,
}

fn default_count() -> i64 {
    1
}

impl UsageRecord {
    /// Empty record of the given type.
    #[must_use]
    pub fn new(
        resource_type: ResourceType,
        resource_id: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            resource_type,
            resource_id: resource_id.into(),
            region: region.into(),
            hours: 0.0,
            count: 1,
            input_tokens: 0,
            output_tokens: 0,
            storage_gb: 0.0,
            gb_seconds: 0.0,
            requests: 0,
            vcpu_hours: 0.0,
            amortization: None,
        }
    }

    /// A single instance running for `hours`.
    #[must_use]
    pub fn compute(instance_type: impl Into<String>, region: impl Into<String>, hours: f64) -> Self {
        Self::new(ResourceType::Compute, instance_type, region).with_hours(hours)
    }

    /// Model calls with the given token counts.
    #[must_use]
    pub fn inference(
        model_id: impl Into<String>,
        region: impl Into<String>,
        input_tokens: i64,
        output_tokens: i64,
    ) -> Self {
        Self::new(ResourceType::Inference, model_id, region).with_tokens(input_tokens, output_tokens)
    }

    /// `storage_gb` held for `hours`.
    #[must_use]
    pub fn storage(
        resource_id: impl Into<String>,
        region: impl Into<String>,
        storage_gb: f64,
        hours: f64,
    ) -> Self {
        let mut record = Self::new(ResourceType::Storage, resource_id, region).with_hours(hours);
        record.storage_gb = storage_gb;
        record
    }

    /// Serverless execution time plus invocations.
    #[must_use]
    pub fn serverless(
        resource_id: impl Into<String>,
        region: impl Into<String>,
        gb_seconds: f64,
        requests: i64,
    ) -> Self {
        let mut record = Self::new(ResourceType::Serverless, resource_id, region);
        record.gb_seconds = gb_seconds;
        record.requests = requests;
        record
    }

    /// Container vCPU time.
    #[must_use]
    pub fn container(resource_id: impl Into<String>, region: impl Into<String>, vcpu_hours: f64) -> Self {
        let mut record = Self::new(ResourceType::Container, resource_id, region);
        record.vcpu_hours = vcpu_hours;
        record
    }

    #[must_use]
    pub fn with_hours(mut self, hours: f64) -> Self {
        self.hours = hours;
        self
    }

    #[must_use]
    pub fn with_count(mut self, count: i64) -> Self {
        self.count = count;
        self
    }

    #[must_use]
    pub fn with_tokens(mut self, input_tokens: i64, output_tokens: i64) -> Self {
        self.input_tokens = input_tokens;
        self.output_tokens = output_tokens;
        self
    }

    #[must_use]
    pub fn with_requests(mut self, requests: i64) -> Self {
        self.requests = requests;
        self
    }

    #[must_use]
    pub fn with_amortization(mut self, amortization: Amortization) -> Self {
        self.amortization = Some(amortization);
        self
    }

    /// Same usage against another resource id.
    #[must_use]
    pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = resource_id.into();
        self
    }

    /// Same usage in another region.
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Total tokens processed.
    pub fn total_tokens(&self) -> i64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }

    /// Reject negative or non-finite quantities.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        check_quantity("hours", self.hours)?;
        check_quantity("storage_gb", self.storage_gb)?;
        check_quantity("gb_seconds", self.gb_seconds)?;
        check_quantity("vcpu_hours", self.vcpu_hours)?;
        check_count("count", self.count)?;
        check_count("input_tokens", self.input_tokens)?;
        check_count("output_tokens", self.output_tokens)?;
        check_count("requests", self.requests)?;
        if let Some(amortization) = &self.amortization {
            amortization.validate()?;
        }
        Ok(())
    }
}

fn check_quantity(field: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ImpactError::validation(format!(
            "{field} must be a non-negative number, got {value}"
        )))
    }
}

fn check_count(field: &str, value: i64) -> Result<()> {
    if value >= 0 {
        Ok(())
    } else {
        Err(ImpactError::validation(format!(
            "{field} must be non-negative, got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_type_parsing_is_total() {
        assert_eq!(ResourceType::from("EC2"), ResourceType::Compute);
        assert_eq!(ResourceType::from("bedrock"), ResourceType::Inference);
        assert_eq!(ResourceType::from("s3"), ResourceType::Storage);
        assert_eq!(ResourceType::from("Lambda"), ResourceType::Serverless);
        assert_eq!(ResourceType::from("dynamodb"), ResourceType::Requests);
        assert_eq!(ResourceType::from("fargate"), ResourceType::Container);
        assert_eq!(ResourceType::from("quantum-annealer"), ResourceType::Other);
        assert_eq!(ResourceType::Container.to_string(), "container");
    }

    #[test]
    fn test_builders() {
        let usage = UsageRecord::compute("m5.large", "us-east-1", 10.0).with_count(3);
        assert_eq!(usage.resource_type, ResourceType::Compute);
        assert_eq!(usage.count, 3);
        assert!(usage.amortization.is_none());

        let usage = UsageRecord::inference("m", "us-east-1", 1000, 500)
            .with_amortization(Amortization::shared(1.0));
        assert_eq!(usage.total_tokens(), 1500);
        assert!((usage.amortization.unwrap().utilization - DEFAULT_UTILIZATION).abs() < 1e-12);
    }

    #[test]
    fn test_negative_inputs_rejected() {
        let usage = UsageRecord::compute("m5.large", "us-east-1", -1.0);
        assert!(matches!(usage.validate(), Err(ImpactError::Validation(_))));

        let usage = UsageRecord::inference("m", "us-east-1", -5, 0);
        let err = usage.validate().unwrap_err();
        assert!(err.to_string().contains("input_tokens"));

        let usage = UsageRecord::compute("m5.large", "us-east-1", 1.0).with_count(-2);
        assert!(usage.validate().is_err());

        let usage = UsageRecord::compute("m5.large", "us-east-1", f64::NAN);
        assert!(usage.validate().is_err());
    }

    #[test]
    fn test_utilization_bounds() {
        let usage = UsageRecord::inference("m", "us-east-1", 1, 1)
            .with_amortization(Amortization::new(1.0, 1.5));
        assert!(usage.validate().is_err());

        let usage = UsageRecord::inference("m", "us-east-1", 1, 1)
            .with_amortization(Amortization::dedicated(2.0));
        assert!(usage.validate().is_ok());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let usage: UsageRecord = serde_json::from_str(
            r#"{"resource_type":"compute","resource_id":"m5.large","region":"us-east-1","hours":2.0}"#,
        )
        .unwrap();
        assert_eq!(usage.count, 1);
        assert_eq!(usage.input_tokens, 0);
        assert!((usage.hours - 2.0).abs() < 1e-12);
    }
}
