//! `ImpactEngine`: the entry points callers use.
//!
//! The engine owns a shared, immutable [`ParameterStore`] and runs the full
//! pipeline (energy, emissions, water, cost, aggregation) per usage record.
//! Batch operations fan out over candidates and hand the results to the
//! comparison functions.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::compare::{
    evaluate, pareto_front, rank_by, Baseline, CandidateKind, ComparisonResult, Metric,
    SavingsReport,
};
use crate::config::{EngineConfig, ScoreConfig};
use crate::cost::commitment_costs;
use crate::emissions::{
    embodied_g, facility_energy_kwh, operational_g, storage_embodied_g, training_g,
    EmissionsBreakdown,
};
use crate::energy::{compute_energy, inference_kwh};
use crate::error::{ImpactError, Result};
use crate::impact::{self, ImpactParts, ImpactResult};
use crate::params::{builtin, ParameterStore, TrainingFootprint};
use crate::usage::{Amortization, ResourceType, UsageRecord};
use crate::water::WaterFootprint;

/// One resource placed in one region, as considered by [`ImpactEngine::pareto_optimal`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CandidateSpec {
    pub resource_id: String,
    pub region: String,
}

impl CandidateSpec {
    pub fn new(resource_id: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            region: region.into(),
        }
    }
}

impl std::fmt::Display for CandidateSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.resource_id, self.region)
    }
}

/// Footprint calculator over a loaded parameter store.
///
/// Cloning is cheap; clones share the same store.
#[derive(Debug, Clone)]
pub struct ImpactEngine {
    store: Arc<ParameterStore>,
    score: ScoreConfig,
    parallel: bool,
}

impl ImpactEngine {
    /// Engine over `store` with default score settings and parallel batches.
    pub fn new(store: ParameterStore) -> Self {
        Self {
            store: Arc::new(store),
            score: ScoreConfig::default(),
            parallel: true,
        }
    }

    /// Engine over the built-in reference data set.
    pub fn builtin() -> Self {
        Self::new(ParameterStore::default())
    }

    /// Build an engine from configuration.
    ///
    /// Tables are read from `data_dir` when set, otherwise the built-in data
    /// set is used.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or a table exists
    /// but cannot be read.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        config.validate()?;
        let store = match &config.data_dir {
            Some(dir) => ParameterStore::load(dir, config.defaults.clone())?,
            None => ParameterStore::builtin(config.defaults.clone())?,
        };
        info!(
            data_dir = ?config.data_dir,
            parallel = config.parallel,
            missing_tables = store.missing_tables().len(),
            "Impact engine ready"
        );
        Ok(Self {
            store: Arc::new(store),
            score: config.score.clone(),
            parallel: config.parallel,
        })
    }

    /// Replace the score settings.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the weights or thresholds are invalid.
    pub fn with_score(mut self, score: ScoreConfig) -> Result<Self> {
        score.validate()?;
        self.score = score;
        Ok(self)
    }

    /// Enable or disable parallel batch evaluation.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn store(&self) -> &ParameterStore {
        &self.store
    }

    pub fn score_config(&self) -> &ScoreConfig {
        &self.score
    }

    /// Full footprint of one usage record.
    ///
    /// Embodied and training emissions are only included when the record
    /// carries an amortization window. Compute and inference records are
    /// charged for their hardware, storage records per GB-month of capacity.
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad quantities, a blank resource id or
    /// region, or a non-finite result, and `UnknownResource` when inference
    /// usage meets an empty model table.
    #[instrument(skip(self, usage), fields(
        resource_type = %usage.resource_type,
        resource_id = %usage.resource_id,
        region = %usage.region
    ))]
    pub fn calculate(&self, usage: &UsageRecord) -> Result<ImpactResult> {
        usage.validate()?;
        if usage.resource_id.trim().is_empty() {
            return Err(ImpactError::validation("resource_id must not be empty"));
        }
        if usage.region.trim().is_empty() {
            return Err(ImpactError::validation("region must not be empty"));
        }

        let model = match usage.resource_type {
            ResourceType::Inference => Some(self.store.model(&usage.resource_id)?),
            _ => None,
        };
        let energy_kwh = match &model {
            Some(model) => inference_kwh(&model.energy, usage.input_tokens, usage.output_tokens),
            None => compute_energy(usage, &self.store)?,
        };

        let region = self.store.region(&usage.region);
        let facility_kwh = facility_energy_kwh(energy_kwh, region.pue);
        let operational = operational_g(energy_kwh, region.pue, region.carbon_intensity);

        let training = model.as_ref().and_then(|m| m.training.as_ref());
        let (embodied, training) = match &usage.amortization {
            Some(window) => self.amortized_g(usage, window, training),
            None => (0.0, 0.0),
        };

        let emissions = EmissionsBreakdown::new(operational, embodied, training);
        let result = ImpactResult::aggregate(
            ImpactParts {
                resource_type: usage.resource_type,
                resource_id: usage.resource_id.clone(),
                region: usage.region.clone(),
                energy_kwh,
                facility_energy_kwh: facility_kwh,
                emissions,
                water: WaterFootprint::new(facility_kwh, &region),
                cost: commitment_costs(usage, &*self.store),
            },
            &self.score,
        );

        if !result.is_finite() {
            return Err(ImpactError::validation(format!(
                "footprint of {} in {} is not finite",
                usage.resource_id, usage.region
            )));
        }

        debug!(
            total_g = result.total_emissions_g,
            water_l = result.water_usage_liters,
            cost_usd = result.cost_usd,
            "Calculated footprint"
        );
        Ok(result)
    }

    fn amortized_g(
        &self,
        usage: &UsageRecord,
        window: &Amortization,
        training: Option<&TrainingFootprint>,
    ) -> (f64, f64) {
        match usage.resource_type {
            ResourceType::Compute => {
                let hardware = self.store.hardware(&usage.resource_id);
                let servers = usage.count as f64 * hardware.server_count;
                (embodied_g(&hardware, window, servers), 0.0)
            }
            ResourceType::Inference => {
                let hardware = self.store.hardware(&usage.resource_id);
                (
                    embodied_g(&hardware, window, hardware.server_count),
                    training_g(training, usage.total_tokens()),
                )
            }
            ResourceType::Storage => {
                let kg_per_gb = builtin::storage_embodied_kg_per_gb_month(&usage.resource_id);
                (storage_embodied_g(usage.storage_gb, kg_per_gb, window), 0.0)
            }
            other => {
                debug!(resource_type = %other, "No hardware attribution for resource type");
                (0.0, 0.0)
            }
        }
    }

    /// Footprint of `count` instances running for `hours`, with embodied
    /// carbon amortized over the same window.
    ///
    /// # Errors
    ///
    /// See [`ImpactEngine::calculate`].
    #[instrument(skip(self), fields(resource_id = %resource_id, region = %region))]
    pub fn calculate_compute_footprint(
        &self,
        resource_id: &str,
        region: &str,
        hours: f64,
        count: i64,
    ) -> Result<ImpactResult> {
        let usage = UsageRecord::compute(resource_id, region, hours)
            .with_count(count)
            .with_amortization(Amortization::dedicated(hours));
        self.calculate(&usage)
    }

    /// Operational footprint of one batch of inference tokens.
    ///
    /// # Errors
    ///
    /// See [`ImpactEngine::calculate`].
    #[instrument(skip(self), fields(model_id = %model_id, region = %region))]
    pub fn calculate_inference_footprint(
        &self,
        model_id: &str,
        region: &str,
        input_tokens: i64,
        output_tokens: i64,
    ) -> Result<ImpactResult> {
        self.calculate(&UsageRecord::inference(model_id, region, input_tokens, output_tokens))
    }

    /// Inference footprint including amortized hardware and training
    /// emissions.
    ///
    /// # Errors
    ///
    /// See [`ImpactEngine::calculate`]. Utilization outside `[0, 1]` is a
    /// validation error.
    #[instrument(skip(self), fields(model_id = %model_id, region = %region))]
    pub fn calculate_total_impact(
        &self,
        model_id: &str,
        region: &str,
        input_tokens: i64,
        output_tokens: i64,
        duration_hours: f64,
        utilization: f64,
    ) -> Result<ImpactResult> {
        let usage = UsageRecord::inference(model_id, region, input_tokens, output_tokens)
            .with_amortization(Amortization::new(duration_hours, utilization));
        self.calculate(&usage)
    }

    /// Rank `candidates` by `metric`, with savings against the worst one.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `candidates` is empty or the usage
    /// template is invalid. Failures of individual candidates are reported in
    /// [`ComparisonResult::skipped`].
    #[instrument(
        skip(self, candidates, usage),
        fields(kind = %kind, metric = %metric, candidates = candidates.len())
    )]
    pub fn compare_candidates(
        &self,
        kind: CandidateKind,
        candidates: &[String],
        usage: &UsageRecord,
        metric: Metric,
    ) -> Result<ComparisonResult> {
        self.compare(kind, candidates, usage, metric, Baseline::Worst, None)
    }

    /// Rank `candidates` with savings against the named `baseline` candidate.
    ///
    /// # Errors
    ///
    /// As [`ImpactEngine::compare_candidates`], plus a validation error when
    /// the baseline could not be evaluated.
    #[instrument(
        skip(self, candidates, usage),
        fields(kind = %kind, metric = %metric, baseline = %baseline)
    )]
    pub fn compare_against(
        &self,
        kind: CandidateKind,
        candidates: &[String],
        usage: &UsageRecord,
        metric: Metric,
        baseline: &str,
    ) -> Result<ComparisonResult> {
        self.compare(
            kind,
            candidates,
            usage,
            metric,
            Baseline::Candidate(baseline.to_string()),
            None,
        )
    }

    /// The `limit` lowest-emission candidates of every known `kind`.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a zero `limit` and `UnknownResource`
    /// when the store knows no candidates of this kind.
    pub fn find_lowest(
        &self,
        kind: CandidateKind,
        usage: &UsageRecord,
        limit: usize,
    ) -> Result<ComparisonResult> {
        self.find_lowest_by(kind, usage, limit, Metric::default())
    }

    /// [`ImpactEngine::find_lowest`] ranked by an explicit metric.
    ///
    /// # Errors
    ///
    /// See [`ImpactEngine::find_lowest`].
    #[instrument(skip(self, usage), fields(kind = %kind, metric = %metric))]
    pub fn find_lowest_by(
        &self,
        kind: CandidateKind,
        usage: &UsageRecord,
        limit: usize,
        metric: Metric,
    ) -> Result<ComparisonResult> {
        if limit == 0 {
            return Err(ImpactError::validation("limit must be positive"));
        }
        let candidates = match kind {
            CandidateKind::Region => self.store.regions(),
            CandidateKind::Model => self.store.models(),
            CandidateKind::InstanceType => self.store.instance_types(),
        };
        if candidates.is_empty() {
            return Err(ImpactError::unknown(format!("no {kind} candidates are known")));
        }
        self.compare(kind, &candidates, usage, metric, Baseline::Worst, Some(limit))
    }

    fn compare(
        &self,
        kind: CandidateKind,
        candidates: &[String],
        usage: &UsageRecord,
        metric: Metric,
        baseline: Baseline,
        limit: Option<usize>,
    ) -> Result<ComparisonResult> {
        if candidates.is_empty() {
            return Err(ImpactError::validation("candidate list is empty"));
        }
        usage.validate()?;

        let mut seen = BTreeSet::new();
        let unique: Vec<String> = candidates
            .iter()
            .filter(|c| seen.insert(c.as_str()))
            .cloned()
            .collect();
        if unique.len() < candidates.len() {
            warn!(
                duplicates = candidates.len() - unique.len(),
                "Ignoring duplicate candidates"
            );
        }

        let (evaluated, skipped) = evaluate(&unique, self.parallel, |candidate: &String| {
            self.calculate(&kind.apply(usage, candidate))
        });
        ComparisonResult::build(kind, metric, evaluated, skipped, baseline, limit)
    }

    /// Candidates not dominated on cost and total emissions, cheapest first.
    ///
    /// Each candidate replaces the resource id and region of `usage`.
    /// Repeated candidates are evaluated once.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `candidates` is empty or the usage
    /// template is invalid. Candidates that fail to calculate are logged and
    /// left out.
    #[instrument(skip(self, candidates, usage), fields(candidates = candidates.len()))]
    pub fn pareto_optimal(
        &self,
        candidates: &[CandidateSpec],
        usage: &UsageRecord,
    ) -> Result<Vec<ImpactResult>> {
        if candidates.is_empty() {
            return Err(ImpactError::validation("candidate list is empty"));
        }
        usage.validate()?;

        let mut seen = BTreeSet::new();
        let unique: Vec<CandidateSpec> = candidates
            .iter()
            .filter(|spec| seen.insert(*spec))
            .cloned()
            .collect();
        if unique.len() < candidates.len() {
            warn!(
                duplicates = candidates.len() - unique.len(),
                "Ignoring duplicate candidates"
            );
        }

        let (evaluated, skipped) = evaluate(&unique, self.parallel, |spec: &CandidateSpec| {
            let record = usage
                .clone()
                .with_resource_id(spec.resource_id.clone())
                .with_region(spec.region.clone());
            self.calculate(&record)
        });

        let front = pareto_front(
            &evaluated,
            |(_, result)| result.cost_usd,
            |(_, result)| result.total_emissions_g,
        );
        let optimal: Vec<(String, ImpactResult)> =
            front.into_iter().map(|i| evaluated[i].clone()).collect();

        let ordered = rank_by(
            optimal,
            |(label, _)| label.as_str(),
            |(_, result)| result.cost_usd,
        );
        debug!(
            optimal = ordered.len(),
            skipped = skipped.len(),
            "Selected Pareto-optimal candidates"
        );
        Ok(ordered.into_iter().map(|(_, result)| result).collect())
    }

    /// What switching from `current` to `target` saves.
    ///
    /// # Errors
    ///
    /// Returns any error from calculating either side.
    #[instrument(skip(self, usage), fields(kind = %kind, current = %current, target = %target))]
    pub fn calculate_savings(
        &self,
        kind: CandidateKind,
        current: &str,
        target: &str,
        usage: &UsageRecord,
        metric: Metric,
    ) -> Result<SavingsReport> {
        let current_result = self.calculate(&kind.apply(usage, current))?;
        let target_result = self.calculate(&kind.apply(usage, target))?;
        Ok(SavingsReport::new(
            kind,
            metric,
            (current.to_string(), current_result),
            (target.to_string(), target_result),
        ))
    }

    /// What moving a compute workload one size down within its instance
    /// family would save.
    ///
    /// Family members come from the hardware and pricing tables. The result
    /// is empty when no smaller size is known or the id has no family and
    /// size, such as `custom` or `m5.metal`.
    ///
    /// # Errors
    ///
    /// Returns a validation error for non-compute usage, and any error from
    /// calculating the current instance.
    #[instrument(
        skip(self, usage),
        fields(resource_id = %usage.resource_id, region = %usage.region)
    )]
    pub fn rightsizing_options(&self, usage: &UsageRecord) -> Result<Vec<SavingsReport>> {
        if usage.resource_type != ResourceType::Compute {
            return Err(ImpactError::validation(format!(
                "rightsizing needs compute usage, got {}",
                usage.resource_type
            )));
        }
        let current = self.calculate(usage)?;
        let Some(smaller) = self.next_size_down(&usage.resource_id) else {
            debug!("No smaller size in the instance family");
            return Ok(Vec::new());
        };

        let kind = CandidateKind::InstanceType;
        let (evaluated, _) = evaluate(&[smaller], self.parallel, |candidate: &String| {
            self.calculate(&kind.apply(usage, candidate))
        });
        Ok(evaluated
            .into_iter()
            .map(|target| {
                SavingsReport::new(
                    kind,
                    Metric::Cost,
                    (usage.resource_id.clone(), current.clone()),
                    target,
                )
            })
            .collect())
    }

    fn next_size_down(&self, instance_type: &str) -> Option<String> {
        let (family, size) = builtin::instance_family(instance_type)?;
        let rank = builtin::size_rank(size)?;
        self.store
            .instance_family(family)
            .into_iter()
            .rev()
            .find(|id| {
                builtin::instance_family(id)
                    .and_then(|(_, size)| builtin::size_rank(size))
                    .is_some_and(|known| known < rank)
            })
    }

    /// Real-world equivalents of an emissions total in kg.
    pub fn get_equivalents(&self, total_emissions_kg: f64) -> BTreeMap<String, f64> {
        impact::get_equivalents(total_emissions_kg)
    }
}

impl Default for ImpactEngine {
    fn default() -> Self {
        Self::builtin()
    }
}
