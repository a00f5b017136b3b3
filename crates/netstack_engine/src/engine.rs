//! Provisioning engine trait and hand-off.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use netstack_core::{ResolvedPlan, Synthesis};

use crate::error::EngineResult;

/// Outcome of applying a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyReport {
    /// Engine that applied the plan
    pub engine: String,
    /// Node names in the order they were applied
    pub applied: Vec<String>,
}

impl ApplyReport {
    /// Report every step of `plan` as applied, in plan order.
    pub fn for_plan(engine: impl Into<String>, plan: &ResolvedPlan) -> Self {
        Self {
            engine: engine.into(),
            applied: plan.steps().iter().map(|node| node.name().to_string()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.applied.len()
    }

    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Something that can create the resources of a plan.
#[async_trait]
pub trait ProvisioningEngine: Send + Sync {
    /// Short engine identifier used in logs and reports.
    fn name(&self) -> &str;

    /// Create every resource of the plan, in plan order.
    async fn apply(&self, plan: &ResolvedPlan) -> EngineResult<ApplyReport>;
}

/// Hand a finished synthesis to an engine.
///
/// Only a [`Synthesis`] is accepted, so the engine never sees a graph that
/// skipped validation or ordering.
pub async fn hand_off(engine: &dyn ProvisioningEngine, synthesis: &Synthesis) -> EngineResult<ApplyReport> {
    let plan = synthesis.plan();
    info!("Handing {} step(s) to engine '{}'", plan.len(), engine.name());

    let report = engine.apply(plan).await?;
    info!("Engine '{}' applied {} step(s)", report.engine, report.len());
    Ok(report)
}
