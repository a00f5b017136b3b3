//! Mock provisioning engine for testing.
//!
//! Captures every plan it receives so tests can assert on what would have
//! been provisioned, without talking to any provider.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use netstack_core::ResolvedPlan;

use crate::engine::{ApplyReport, ProvisioningEngine};
use crate::error::{EngineError, EngineResult};

/// Failure the mock should report instead of applying.
#[derive(Debug, Clone)]
enum SimulatedFailure {
    Reject(String),
    FailAt { node: String, reason: String },
}

#[derive(Clone)]
pub struct MockEngine {
    name: String,
    /// Plans received, oldest first.
    captured: Arc<RwLock<Vec<ResolvedPlan>>>,
    failure: Arc<RwLock<Option<SimulatedFailure>>>,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            captured: Arc::new(RwLock::new(Vec::new())),
            failure: Arc::new(RwLock::new(None)),
        }
    }

    /// Reject every plan with the given message.
    pub fn simulate_rejection(self, message: impl Into<String>) -> Self {
        *self.failure.write() = Some(SimulatedFailure::Reject(message.into()));
        self
    }

    /// Fail when reaching `node`; steps before it still count as applied.
    pub fn simulate_failure_at(self, node: impl Into<String>, reason: impl Into<String>) -> Self {
        *self.failure.write() = Some(SimulatedFailure::FailAt {
            node: node.into(),
            reason: reason.into(),
        });
        self
    }

    pub fn clear_failure(&self) {
        *self.failure.write() = None;
    }

    /// All plans received so far.
    pub fn plans(&self) -> Vec<ResolvedPlan> {
        self.captured.read().clone()
    }

    pub fn last_plan(&self) -> Option<ResolvedPlan> {
        self.captured.read().last().cloned()
    }

    pub fn apply_count(&self) -> usize {
        self.captured.read().len()
    }

    pub fn clear(&self) {
        self.captured.write().clear();
    }
}

#[async_trait]
impl ProvisioningEngine for MockEngine {
    fn name(&self) -> &str {
        &self.name
    }

    async fn apply(&self, plan: &ResolvedPlan) -> EngineResult<ApplyReport> {
        self.captured.write().push(plan.clone());

        match self.failure.read().clone() {
            Some(SimulatedFailure::Reject(message)) => Err(EngineError::Rejected(message)),
            Some(SimulatedFailure::FailAt { node, reason }) => {
                let reached = plan.steps().iter().any(|step| step.name().as_str() == node);
                if reached {
                    Err(EngineError::ApplyFailed { node, reason })
                } else {
                    Ok(ApplyReport::for_plan(&self.name, plan))
                }
            }
            None => {
                debug!("Mock engine accepted {} step(s)", plan.len());
                Ok(ApplyReport::for_plan(&self.name, plan))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netstack_core::{StackConfig, Synthesizer};

    fn plan() -> ResolvedPlan {
        Synthesizer::new(StackConfig::default()).synthesize().unwrap().into_plan()
    }

    #[tokio::test]
    async fn test_mock_captures_plans() {
        let engine = MockEngine::new();
        let plan = plan();

        let report = engine.apply(&plan).await.unwrap();
        assert_eq!(report.engine, "mock");
        assert_eq!(report.len(), plan.len());
        assert_eq!(engine.apply_count(), 1);
        assert_eq!(engine.last_plan().as_ref(), Some(&plan));
    }

    #[tokio::test]
    async fn test_mock_rejection() {
        let engine = MockEngine::new().simulate_rejection("quota exceeded");
        let err = engine.apply(&plan()).await.unwrap_err();
        assert!(matches!(err, EngineError::Rejected(ref m) if m == "quota exceeded"));
        assert_eq!(engine.apply_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_failure_at_node() {
        let engine = MockEngine::new().simulate_failure_at("nat-gateway", "no capacity");
        let err = engine.apply(&plan()).await.unwrap_err();
        assert!(matches!(err, EngineError::ApplyFailed { ref node, .. } if node == "nat-gateway"));

        engine.clear_failure();
        assert!(engine.apply(&plan()).await.is_ok());
        assert_eq!(engine.plans().len(), 2);
    }

    #[tokio::test]
    async fn test_mock_clones_share_state() {
        let engine = MockEngine::new();
        let handle = engine.clone();
        engine.apply(&plan()).await.unwrap();
        assert_eq!(handle.apply_count(), 1);

        handle.clear();
        assert_eq!(engine.apply_count(), 0);
    }
}
