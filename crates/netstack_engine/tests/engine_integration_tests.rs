//! Integration tests for handing synthesized plans to engines.

use netstack_core::{resolve_validated, ResolvedPlan, StackConfig, SubnetSpec, Synthesizer};
use netstack_engine::{hand_off, EngineError, MockEngine, PlanFileEngine, PlanFormat, ProvisioningEngine};
use tempfile::tempdir;

#[tokio::test]
async fn test_hand_off_applies_in_plan_order() {
    let synthesis = Synthesizer::new(StackConfig::default()).synthesize().unwrap();
    let engine = MockEngine::new();

    let report = hand_off(&engine, &synthesis).await.unwrap();
    let expected: Vec<String> = synthesis.plan().names().iter().map(|n| n.to_string()).collect();
    assert_eq!(report.applied, expected);
    assert_eq!(report.applied[0], "vpc");
    assert_eq!(engine.apply_count(), 1);
}

#[tokio::test]
async fn test_engine_failure_propagates() {
    let synthesis = Synthesizer::new(StackConfig::default()).synthesize().unwrap();
    let engine = MockEngine::new().simulate_failure_at("service", "cluster not ready");

    let err = hand_off(&engine, &synthesis).await.unwrap_err();
    match err {
        EngineError::ApplyFailed { node, reason } => {
            assert_eq!(node, "service");
            assert_eq!(reason, "cluster not ready");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_plan_file_engine_writes_reloadable_json() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("out").join("plan.json");
    let synthesis = Synthesizer::new(StackConfig::default()).synthesize().unwrap();

    let engine = PlanFileEngine::for_path(&path).unwrap();
    assert_eq!(engine.format(), PlanFormat::Json);
    let report = hand_off(&engine, &synthesis).await.unwrap();
    assert_eq!(report.engine, "plan-file");

    let loaded = ResolvedPlan::from_file(&path).unwrap();
    assert_eq!(&loaded, synthesis.plan());
    let graph = loaded.into_graph().unwrap();
    assert!(resolve_validated(&graph).is_ok());
}

#[tokio::test]
async fn test_plan_file_engine_writes_yaml() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("plan.yaml");
    let config = StackConfig::default().with_layout(vec![SubnetSpec::public(24), SubnetSpec::public(24)]);
    let synthesis = Synthesizer::new(config).synthesize().unwrap();

    let engine = PlanFileEngine::new(&path, PlanFormat::Yaml);
    engine.apply(synthesis.plan()).await.unwrap();

    let loaded = ResolvedPlan::from_file(&path).unwrap();
    assert_eq!(loaded.names(), synthesis.plan().names());
}

#[tokio::test]
async fn test_engines_are_object_safe() {
    let dir = tempdir().unwrap();
    let synthesis = Synthesizer::new(StackConfig::default()).synthesize().unwrap();
    let engines: Vec<Box<dyn ProvisioningEngine>> = vec![
        Box::new(MockEngine::new()),
        Box::new(PlanFileEngine::new(dir.path().join("plan.json"), PlanFormat::Json)),
    ];

    for engine in &engines {
        let report = hand_off(engine.as_ref(), &synthesis).await.unwrap();
        assert_eq!(report.len(), synthesis.plan().len());
    }
}
