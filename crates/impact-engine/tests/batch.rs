//! Integration tests for batch comparisons: per-candidate failure isolation,
//! parallel vs sequential evaluation, and Pareto selection.

use impact_engine::params::{Embodied, EnergyRate, HardwareProfile, ParameterStore, RegionProfile};
use impact_engine::{
    CandidateKind, CandidateSpec, ImpactEngine, ImpactError, Metric, RegionDefaults,
    UsageRecord, WaterStress,
};

fn region(name: &str, intensity: f64) -> RegionProfile {
    RegionProfile {
        region: name.to_string(),
        carbon_intensity: intensity,
        pue: 1.1,
        wue: 1.5,
        water_stress: WaterStress::Low,
    }
}

fn hardware(id: &str, watts: f64) -> HardwareProfile {
    HardwareProfile {
        resource_id: id.to_string(),
        power_draw_watts: Some(watts),
        embodied: Embodied::Total { kg: 1000.0 },
        lifecycle_years: 4.0,
        server_count: 1.0,
    }
}

fn store() -> ParameterStore {
    ParameterStore::empty(RegionDefaults::default()).unwrap()
        .with_region(region("green-1", 50.0))
        .with_region(region("brown-1", 600.0))
        .with_model("fast", EnergyRate::new(0.02, 0.06))
        .with_model("big", EnergyRate::new(0.2, 0.6))
        .with_hardware(hardware("small.box", 50.0))
        .with_hardware(hardware("large.box", 400.0))
        .with_instance_price("small.box", 0.10)
        .with_instance_price("large.box", 0.05)
}

fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(ToString::to_string).collect()
}

mod isolation_tests {
    use super::*;

    #[test]
    fn test_blank_candidate_is_skipped() {
        let engine = ImpactEngine::new(store());
        let usage = UsageRecord::compute("small.box", "green-1", 10.0);
        let comparison = engine
            .compare_candidates(
                CandidateKind::Region,
                &ids(&["brown-1", " ", "green-1"]),
                &usage,
                Metric::TotalEmissions,
            )
            .unwrap();

        assert_eq!(comparison.candidates(), vec!["green-1", "brown-1"]);
        assert_eq!(comparison.skipped.len(), 1);
        assert_eq!(comparison.skipped[0].candidate, " ");
        assert!(comparison.skipped[0].reason.contains("region"));
    }

    #[test]
    fn test_empty_model_table_skips_every_model() {
        let engine = ImpactEngine::new(ParameterStore::empty(RegionDefaults::default()).unwrap());
        let usage = UsageRecord::inference("template", "us-east-1", 100, 100);
        let comparison = engine
            .compare_candidates(
                CandidateKind::Model,
                &ids(&["a", "b"]),
                &usage,
                Metric::TotalEmissions,
            )
            .unwrap();

        assert!(comparison.ranked.is_empty());
        assert_eq!(comparison.skipped.len(), 2);
        assert!(comparison.pareto_optimal.is_empty());
    }

    #[test]
    fn test_invalid_template_fails_the_whole_call() {
        let engine = ImpactEngine::new(store());
        let usage = UsageRecord::compute("small.box", "green-1", -5.0);
        let result = engine.compare_candidates(
            CandidateKind::Region,
            &ids(&["green-1"]),
            &usage,
            Metric::TotalEmissions,
        );
        assert!(matches!(result, Err(ImpactError::Validation(_))));
    }

    #[test]
    fn test_duplicate_candidates_are_ranked_once() {
        let engine = ImpactEngine::new(store());
        let usage = UsageRecord::compute("small.box", "green-1", 10.0);
        let comparison = engine
            .compare_candidates(
                CandidateKind::Region,
                &ids(&["green-1", "brown-1", "green-1"]),
                &usage,
                Metric::TotalEmissions,
            )
            .unwrap();
        assert_eq!(comparison.ranked.len(), 2);
    }
}

mod ordering_tests {
    use super::*;

    #[test]
    fn test_parallel_matches_sequential() {
        let usage = UsageRecord::inference("template", "green-1", 50_000, 10_000);
        let candidates = ids(&["big", "fast", "unlisted"]);

        let parallel = ImpactEngine::new(store())
            .with_parallel(true)
            .compare_candidates(CandidateKind::Model, &candidates, &usage, Metric::Energy)
            .unwrap();
        let sequential = ImpactEngine::new(store())
            .with_parallel(false)
            .compare_candidates(CandidateKind::Model, &candidates, &usage, Metric::Energy)
            .unwrap();

        assert_eq!(parallel, sequential);
        assert_eq!(parallel.best().unwrap().candidate, "fast");
    }

    #[test]
    fn test_ties_break_by_candidate_id() {
        let engine = ImpactEngine::new(store());
        // Unknown regions all resolve to the same defaults.
        let usage = UsageRecord::compute("small.box", "green-1", 1.0);
        let comparison = engine
            .compare_candidates(
                CandidateKind::Region,
                &ids(&["zz-1", "aa-1", "mm-1"]),
                &usage,
                Metric::TotalEmissions,
            )
            .unwrap();
        assert_eq!(comparison.candidates(), vec!["aa-1", "mm-1", "zz-1"]);
    }

    #[test]
    fn test_instance_comparison_by_cost() {
        let engine = ImpactEngine::new(store());
        let usage = UsageRecord::compute("template", "green-1", 100.0);
        let comparison = engine
            .compare_candidates(
                CandidateKind::InstanceType,
                &ids(&["small.box", "large.box"]),
                &usage,
                Metric::Cost,
            )
            .unwrap();

        assert_eq!(comparison.candidates(), vec!["large.box", "small.box"]);
        // large.box is cheaper, small.box is cleaner: both are on the front.
        assert_eq!(comparison.pareto_optimal.len(), 2);
    }
}

mod pareto_tests {
    use super::*;

    #[test]
    fn test_front_over_instances_and_regions() {
        let engine = ImpactEngine::new(store());
        let usage = UsageRecord::compute("template", "green-1", 100.0);
        let candidates = vec![
            CandidateSpec::new("small.box", "green-1"),
            CandidateSpec::new("small.box", "brown-1"),
            CandidateSpec::new("large.box", "green-1"),
            CandidateSpec::new("large.box", "brown-1"),
        ];

        let front = engine.pareto_optimal(&candidates, &usage).unwrap();
        let labels: Vec<String> = front
            .iter()
            .map(|r| format!("{}@{}", r.resource_id, r.region))
            .collect();

        // brown-1 placements cost the same as green-1 but emit more.
        assert_eq!(labels, vec!["large.box@green-1", "small.box@green-1"]);
        assert!(front[0].cost_usd <= front[1].cost_usd);
    }

    #[test]
    fn test_failed_candidates_are_left_out() {
        let engine = ImpactEngine::new(store());
        let usage = UsageRecord::compute("template", "green-1", 10.0);
        let candidates = vec![
            CandidateSpec::new("", "green-1"),
            CandidateSpec::new("small.box", "green-1"),
        ];

        let front = engine.pareto_optimal(&candidates, &usage).unwrap();
        assert_eq!(front.len(), 1);
        assert_eq!(front[0].resource_id, "small.box");
    }

    #[test]
    fn test_repeated_candidates_appear_once() {
        let engine = ImpactEngine::new(store());
        let usage = UsageRecord::compute("template", "green-1", 10.0);
        let candidates = vec![
            CandidateSpec::new("small.box", "green-1"),
            CandidateSpec::new("small.box", "green-1"),
            CandidateSpec::new("small.box", "brown-1"),
        ];

        let front = engine.pareto_optimal(&candidates, &usage).unwrap();
        assert_eq!(front.len(), 1);
        assert_eq!(front[0].region, "green-1");
    }
}
