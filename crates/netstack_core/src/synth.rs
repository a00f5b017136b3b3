//! Synthesis pipeline.
//!
//! configuration → network → security → service → validation → resolution.
//! A [`Synthesis`] only exists when every stage succeeded, so a partial or
//! unvalidated plan can never leave this module.

use tracing::info;

use crate::config::StackConfig;
use crate::error::{StackError, StackResult};
use crate::graph::ResourceGraph;
use crate::network::{NetworkTopology, NetworkTopologyBuilder};
use crate::resolver::{DependencyResolver, ResolvedPlan};
use crate::security::{SecurityPolicy, SecurityPolicyBuilder};
use crate::service::{ServiceTopology, ServiceTopologyBuilder};
use crate::validator::{GraphValidator, ValidationReport};

/// Names of the key nodes each builder produced.
#[derive(Debug, Clone)]
pub struct StackOutputs {
    pub network: NetworkTopology,
    pub security: SecurityPolicy,
    pub service: ServiceTopology,
}

/// A validated graph and its creation order.
#[derive(Debug, Clone)]
pub struct Synthesis {
    graph: ResourceGraph,
    outputs: StackOutputs,
    plan: ResolvedPlan,
}

impl Synthesis {
    pub fn graph(&self) -> &ResourceGraph {
        &self.graph
    }

    pub fn outputs(&self) -> &StackOutputs {
        &self.outputs
    }

    pub fn plan(&self) -> &ResolvedPlan {
        &self.plan
    }

    pub fn into_plan(self) -> ResolvedPlan {
        self.plan
    }
}

pub struct Synthesizer {
    config: StackConfig,
}

impl Synthesizer {
    pub fn new(config: StackConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StackConfig {
        &self.config
    }

    /// Run the three builders. Any construction error aborts.
    pub fn build_graph(&self) -> StackResult<(ResourceGraph, StackOutputs)> {
        self.config.validate()?;

        let mut graph = ResourceGraph::new();
        let network = NetworkTopologyBuilder::new(&self.config).build(&mut graph)?;
        let security = SecurityPolicyBuilder::new(self.config.listener_port, self.config.service_port)
            .build(&mut graph, &network)?;
        let service = ServiceTopologyBuilder::new(&self.config).build(&mut graph, &network, &security)?;

        info!("Stack '{}' declares {} node(s)", self.config.name, graph.len());
        Ok((
            graph,
            StackOutputs {
                network,
                security,
                service,
            },
        ))
    }

    /// Build and validate without resolving.
    pub fn validate(&self) -> StackResult<ValidationReport> {
        let (graph, _) = self.build_graph()?;
        Ok(GraphValidator::validate(&graph))
    }

    /// Full pipeline. Fails with every violation if validation is not clean.
    pub fn synthesize(&self) -> StackResult<Synthesis> {
        let (graph, outputs) = self.build_graph()?;

        let report = GraphValidator::validate(&graph);
        if !report.is_clean() {
            return Err(StackError::Validation(report));
        }

        let plan = DependencyResolver::resolve(&graph)?;
        Ok(Synthesis { graph, outputs, plan })
    }
}

/// Validate and resolve an externally supplied graph, e.g. one rebuilt from a plan file.
pub fn resolve_validated(graph: &ResourceGraph) -> StackResult<ResolvedPlan> {
    let report = GraphValidator::validate(graph);
    if !report.is_clean() {
        return Err(StackError::Validation(report));
    }
    DependencyResolver::resolve(graph)
}
