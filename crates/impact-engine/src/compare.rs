//! Comparison Engine: ranking, savings and Pareto selection.
//!
//! Everything here is a pure function over already computed results. The
//! engine runs the calculations and hands them to [`ComparisonResult::build`].

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ImpactError, Result, SkippedCandidate};
use crate::impact::ImpactResult;
use crate::usage::{ResourceType, UsageRecord};

/// Quantity a comparison ranks by. Lower is better for all of them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    #[default]
    TotalEmissions,
    OperationalEmissions,
    Energy,
    WaterUsage,
    WaterImpact,
    CompositeScore,
    Cost,
}

impl Metric {
    /// Read this metric from a result.
    #[must_use]
    pub fn value(self, result: &ImpactResult) -> f64 {
        match self {
            Self::TotalEmissions => result.total_emissions_g,
            Self::OperationalEmissions => result.operational_emissions_g,
            Self::Energy => result.energy_kwh,
            Self::WaterUsage => result.water_usage_liters,
            Self::WaterImpact => result.water_impact_score,
            Self::CompositeScore => result.composite_score,
            Self::Cost => result.cost_usd,
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::TotalEmissions => "total_emissions",
            Self::OperationalEmissions => "operational_emissions",
            Self::Energy => "energy",
            Self::WaterUsage => "water_usage",
            Self::WaterImpact => "water_impact",
            Self::CompositeScore => "composite_score",
            Self::Cost => "cost",
        };
        write!(f, "{name}")
    }
}

/// What varies between candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateKind {
    Region,
    Model,
    InstanceType,
}

impl CandidateKind {
    /// The usage record for one candidate.
    ///
    /// Model candidates are always inference usage and instance candidates
    /// always compute usage, whatever the template says.
    #[must_use]
    pub fn apply(self, usage: &UsageRecord, candidate: &str) -> UsageRecord {
        let mut record = usage.clone();
        match self {
            Self::Region => record.region = candidate.to_string(),
            Self::Model => {
                record.resource_type = ResourceType::Inference;
                record.resource_id = candidate.to_string();
            }
            Self::InstanceType => {
                record.resource_type = ResourceType::Compute;
                record.resource_id = candidate.to_string();
            }
        }
        record
    }
}

impl std::fmt::Display for CandidateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Region => write!(f, "region"),
            Self::Model => write!(f, "model"),
            Self::InstanceType => write!(f, "instance_type"),
        }
    }
}

/// `(baseline - value) / baseline * 100`, or 0 when `baseline` is not positive.
#[must_use]
pub fn savings_percentage(value: f64, baseline: f64) -> f64 {
    if baseline > 0.0 {
        (baseline - value) / baseline * 100.0
    } else {
        0.0
    }
}

/// Sort ascending by `metric`, breaking ties by `id`. NaN sorts last.
pub fn rank_by<T>(
    mut items: Vec<T>,
    id: impl Fn(&T) -> &str,
    metric: impl Fn(&T) -> f64,
) -> Vec<T> {
    items.sort_by(|a, b| {
        metric(a)
            .total_cmp(&metric(b))
            .then_with(|| id(a).cmp(id(b)))
    });
    items
}

/// Indices of the items no other item dominates.
///
/// `j` dominates `i` when `cost(j) <= cost(i)` and `carbon(j) < carbon(i)`.
/// Items equal on both axes do not dominate each other.
pub fn pareto_front<T>(
    items: &[T],
    cost: impl Fn(&T) -> f64,
    carbon: impl Fn(&T) -> f64,
) -> Vec<usize> {
    let points: Vec<(f64, f64)> = items
        .iter()
        .map(|item| (cost(item), carbon(item)))
        .collect();
    (0..points.len())
        .filter(|&i| {
            let (cost_i, carbon_i) = points[i];
            !points
                .iter()
                .enumerate()
                .any(|(j, &(cost_j, carbon_j))| {
                    j != i && cost_j <= cost_i && carbon_j < carbon_i
                })
        })
        .collect()
}

/// Run `compute` once per candidate, optionally on the rayon pool.
///
/// Failures are logged and returned as skipped entries. Both outputs keep
/// the input order and identify candidates by their `Display` form.
pub fn evaluate<C, F>(
    candidates: &[C],
    parallel: bool,
    compute: F,
) -> (Vec<(String, ImpactResult)>, Vec<SkippedCandidate>)
where
    C: std::fmt::Display + Sync,
    F: Fn(&C) -> Result<ImpactResult> + Sync,
{
    let outcomes: Vec<(String, Result<ImpactResult>)> = if parallel {
        candidates
            .par_iter()
            .map(|candidate| (candidate.to_string(), compute(candidate)))
            .collect()
    } else {
        candidates
            .iter()
            .map(|candidate| (candidate.to_string(), compute(candidate)))
            .collect()
    };

    let mut evaluated = Vec::with_capacity(outcomes.len());
    let mut skipped = Vec::new();
    for (candidate, outcome) in outcomes {
        match outcome {
            Ok(result) => evaluated.push((candidate, result)),
            Err(e) => {
                warn!(candidate = %candidate, error = %e, "Skipping candidate");
                skipped.push(SkippedCandidate::new(candidate, &e));
            }
        }
    }
    (evaluated, skipped)
}

/// Reference point for savings percentages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "candidate", rename_all = "snake_case")]
pub enum Baseline {
    /// The highest metric value among all evaluated candidates.
    Worst,
    /// A named candidate.
    Candidate(String),
}

/// One ranked candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub candidate: String,
    /// 1-based position in the full ranking.
    pub rank: usize,
    pub metric_value: f64,
    /// Savings relative to the baseline.
    pub savings_percentage: f64,
    pub result: ImpactResult,
}

/// Ranked candidates plus baseline, Pareto subset and skipped candidates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub kind: CandidateKind,
    pub metric: Metric,
    pub baseline: Baseline,
    pub baseline_value: f64,
    /// Ascending by metric, ties by candidate id.
    pub ranked: Vec<RankedCandidate>,
    /// Candidates on the cost vs total emissions front, in rank order.
    pub pareto_optimal: Vec<String>,
    pub skipped: Vec<SkippedCandidate>,
}

impl ComparisonResult {
    /// Rank evaluated candidates and annotate savings.
    ///
    /// The baseline and the Pareto front are computed over every evaluated
    /// candidate; `limit` only truncates `ranked`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a named baseline was not evaluated.
    pub fn build(
        kind: CandidateKind,
        metric: Metric,
        evaluated: Vec<(String, ImpactResult)>,
        skipped: Vec<SkippedCandidate>,
        baseline: Baseline,
        limit: Option<usize>,
    ) -> Result<Self> {
        let baseline_value = match &baseline {
            Baseline::Worst => evaluated
                .iter()
                .map(|(_, result)| metric.value(result))
                .filter(|v| !v.is_nan())
                .max_by(f64::total_cmp)
                .unwrap_or(0.0),
            Baseline::Candidate(id) => evaluated
                .iter()
                .find(|(candidate, _)| candidate == id)
                .map(|(_, result)| metric.value(result))
                .ok_or_else(|| {
                    ImpactError::validation(format!(
                        "baseline {id} is not among the evaluated candidates"
                    ))
                })?,
        };

        let front = pareto_front(
            &evaluated,
            |(_, result)| result.cost_usd,
            |(_, result)| result.total_emissions_g,
        );
        let mut pareto_optimal: Vec<String> =
            front.iter().map(|&i| evaluated[i].0.clone()).collect();

        let ordered = rank_by(
            evaluated,
            |(candidate, _)| candidate.as_str(),
            |(_, result)| metric.value(result),
        );
        pareto_optimal.sort_by_key(|id| ordered.iter().position(|(candidate, _)| candidate == id));

        let ranked = ordered
            .into_iter()
            .take(limit.unwrap_or(usize::MAX))
            .enumerate()
            .map(|(index, (candidate, result))| {
                let metric_value = metric.value(&result);
                RankedCandidate {
                    candidate,
                    rank: index + 1,
                    metric_value,
                    savings_percentage: savings_percentage(metric_value, baseline_value),
                    result,
                }
            })
            .collect::<Vec<_>>();

        debug!(
            kind = %kind,
            metric = %metric,
            ranked = ranked.len(),
            skipped = skipped.len(),
            "Built comparison"
        );

        Ok(Self {
            kind,
            metric,
            baseline,
            baseline_value,
            ranked,
            pareto_optimal,
            skipped,
        })
    }

    /// Lowest-impact candidate.
    #[must_use]
    pub fn best(&self) -> Option<&RankedCandidate> {
        self.ranked.first()
    }

    /// Look up a ranked candidate by id.
    #[must_use]
    pub fn get(&self, candidate: &str) -> Option<&RankedCandidate> {
        self.ranked.iter().find(|r| r.candidate == candidate)
    }

    /// Candidate ids in rank order.
    #[must_use]
    pub fn candidates(&self) -> Vec<&str> {
        self.ranked.iter().map(|r| r.candidate.as_str()).collect()
    }
}

/// Effect of switching from one candidate to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavingsReport {
    pub kind: CandidateKind,
    pub metric: Metric,
    pub current: String,
    pub target: String,
    pub current_value: f64,
    pub target_value: f64,
    /// `current_value - target_value`. Negative when the target is worse.
    pub absolute_savings: f64,
    /// Savings relative to the current value.
    pub savings_percentage: f64,
    /// Total emissions avoided (kgCO2e).
    pub emissions_saved_kg: f64,
    pub cost_saved_usd: f64,
    pub current_result: ImpactResult,
    pub target_result: ImpactResult,
}

impl SavingsReport {
    #[must_use]
    pub fn new(
        kind: CandidateKind,
        metric: Metric,
        current: (String, ImpactResult),
        target: (String, ImpactResult),
    ) -> Self {
        let (current, current_result) = current;
        let (target, target_result) = target;
        let current_value = metric.value(&current_result);
        let target_value = metric.value(&target_result);
        Self {
            kind,
            metric,
            current,
            target,
            current_value,
            target_value,
            absolute_savings: current_value - target_value,
            savings_percentage: savings_percentage(target_value, current_value),
            emissions_saved_kg: current_result.total_emissions_kg()
                - target_result.total_emissions_kg(),
            cost_saved_usd: current_result.cost_usd - target_result.cost_usd,
            current_result,
            target_result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScoreConfig;
    use crate::cost::CommitmentCosts;
    use crate::emissions::EmissionsBreakdown;
    use crate::impact::ImpactParts;
    use crate::params::{RegionProfile, WaterStress};
    use crate::water::WaterFootprint;

    fn result(id: &str, emissions_g: f64, cost_usd: f64) -> ImpactResult {
        let region = RegionProfile {
            region: id.to_string(),
            carbon_intensity: 0.0,
            pue: 1.0,
            wue: 0.0,
            water_stress: WaterStress::Low,
        };
        ImpactResult::aggregate(
            ImpactParts {
                resource_type: ResourceType::Compute,
                resource_id: "box".to_string(),
                region: id.to_string(),
                energy_kwh: 1.0,
                facility_energy_kwh: 1.0,
                emissions: EmissionsBreakdown::new(emissions_g, 0.0, 0.0),
                water: WaterFootprint::new(1.0, &region),
                cost: CommitmentCosts::on_demand(cost_usd),
            },
            &ScoreConfig::default(),
        )
    }

    fn evaluated(points: &[(&str, f64, f64)]) -> Vec<(String, ImpactResult)> {
        points
            .iter()
            .map(|&(id, g, usd)| (id.to_string(), result(id, g, usd)))
            .collect()
    }

    #[test]
    fn test_savings_percentage() {
        assert!((savings_percentage(100.0, 700.0) - 85.714_285_714_285_71).abs() < 1e-9);
        assert!(savings_percentage(5.0, 0.0).abs() < 1e-12);
        assert!(savings_percentage(700.0, 700.0).abs() < 1e-12);
        assert!(savings_percentage(800.0, 700.0) < 0.0);
    }

    #[test]
    fn test_rank_by_breaks_ties_by_id() {
        let items = vec![("c", 2.0), ("b", 1.0), ("a", 2.0), ("d", f64::NAN)];
        let ranked = rank_by(items, |(id, _)| *id, |(_, v)| *v);
        let ids: Vec<&str> = ranked.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec!["b", "a", "c", "d"]);
    }

    #[test]
    fn test_pareto_front() {
        // (cost, carbon)
        let points = [(1.0, 10.0), (2.0, 5.0), (3.0, 6.0), (1.0, 10.0), (0.5, 20.0)];
        let front = pareto_front(&points, |p| p.0, |p| p.1);
        assert_eq!(front, vec![0, 1, 3, 4]);
    }

    #[test]
    fn test_pareto_cheaper_with_equal_carbon_is_not_dominance() {
        let points = [(1.0, 5.0), (2.0, 5.0)];
        assert_eq!(pareto_front(&points, |p| p.0, |p| p.1), vec![0, 1]);
    }

    #[test]
    fn test_build_against_worst() {
        let comparison = ComparisonResult::build(
            CandidateKind::Region,
            Metric::TotalEmissions,
            evaluated(&[("high", 700.0, 1.0), ("low", 100.0, 2.0), ("mid", 300.0, 3.0)]),
            Vec::new(),
            Baseline::Worst,
            None,
        )
        .unwrap();

        assert_eq!(comparison.candidates(), vec!["low", "mid", "high"]);
        assert!((comparison.baseline_value - 700.0).abs() < 1e-12);
        let best = comparison.best().unwrap();
        assert_eq!(best.rank, 1);
        assert!((best.savings_percentage - 600.0 / 7.0).abs() < 1e-9);
        assert!(comparison.get("high").unwrap().savings_percentage.abs() < 1e-12);
        // mid costs more and emits more than low
        assert_eq!(comparison.pareto_optimal, vec!["low", "high"]);
    }

    #[test]
    fn test_limit_keeps_full_set_baseline() {
        let comparison = ComparisonResult::build(
            CandidateKind::Region,
            Metric::TotalEmissions,
            evaluated(&[("a", 100.0, 1.0), ("b", 200.0, 1.0), ("c", 400.0, 1.0)]),
            Vec::new(),
            Baseline::Worst,
            Some(1),
        )
        .unwrap();
        assert_eq!(comparison.ranked.len(), 1);
        assert!((comparison.ranked[0].savings_percentage - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_named_baseline() {
        let points = evaluated(&[("a", 100.0, 1.0), ("b", 200.0, 1.0)]);
        let comparison = ComparisonResult::build(
            CandidateKind::Model,
            Metric::TotalEmissions,
            points.clone(),
            Vec::new(),
            Baseline::Candidate("b".to_string()),
            None,
        )
        .unwrap();
        assert!((comparison.get("a").unwrap().savings_percentage - 50.0).abs() < 1e-9);

        let missing = ComparisonResult::build(
            CandidateKind::Model,
            Metric::TotalEmissions,
            points,
            Vec::new(),
            Baseline::Candidate("zzz".to_string()),
            None,
        );
        assert!(matches!(missing, Err(ImpactError::Validation(_))));
    }

    #[test]
    fn test_evaluate_isolates_failures() {
        let candidates = vec!["ok".to_string(), "bad".to_string(), "fine".to_string()];
        for parallel in [false, true] {
            let (evaluated, skipped) = evaluate(&candidates, parallel, |candidate: &String| {
                if candidate == "bad" {
                    Err(ImpactError::validation("broken candidate"))
                } else {
                    Ok(result(candidate, 1.0, 1.0))
                }
            });
            let ids: Vec<&str> = evaluated.iter().map(|(id, _)| id.as_str()).collect();
            assert_eq!(ids, vec!["ok", "fine"]);
            assert_eq!(skipped.len(), 1);
            assert_eq!(skipped[0].candidate, "bad");
        }
    }

    #[test]
    fn test_candidate_kind_apply() {
        let usage = UsageRecord::compute("m5.large", "us-east-1", 1.0);
        let moved = CandidateKind::Region.apply(&usage, "eu-north-1");
        assert_eq!(moved.region, "eu-north-1");
        assert_eq!(moved.resource_id, "m5.large");

        let model = CandidateKind::Model.apply(&usage, "m");
        assert_eq!(model.resource_type, ResourceType::Inference);
        assert_eq!(model.resource_id, "m");
    }

    #[test]
    fn test_savings_report() {
        let report = SavingsReport::new(
            CandidateKind::Region,
            Metric::TotalEmissions,
            ("current".to_string(), result("current", 2000.0, 3.0)),
            ("target".to_string(), result("target", 500.0, 2.0)),
        );
        assert!((report.absolute_savings - 1500.0).abs() < 1e-9);
        assert!((report.savings_percentage - 75.0).abs() < 1e-9);
        assert!((report.emissions_saved_kg - 1.5).abs() < 1e-9);
        assert!((report.cost_saved_usd - 1.0).abs() < 1e-12);
    }
}
