//! Dependency resolution.
//!
//! Orders a graph so every node comes after the nodes it depends on.
//! Ties between independent nodes go to the one declared first.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, HashMap};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{StackError, StackResult};
use crate::graph::ResourceGraph;
use crate::model::{NodeRef, ResourceKind, ResourceNode};
use crate::validator::{Invariant, ValidationReport};

/// Nodes in creation order, ready for a provisioning engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPlan {
    steps: Vec<ResourceNode>,
}

impl ResolvedPlan {
    pub fn steps(&self) -> &[ResourceNode] {
        &self.steps
    }

    pub fn names(&self) -> Vec<&NodeRef> {
        self.steps.iter().map(ResourceNode::name).collect()
    }

    pub fn position(&self, name: &NodeRef) -> Option<usize> {
        self.steps.iter().position(|node| node.name() == name)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Node count per kind.
    pub fn summary(&self) -> BTreeMap<ResourceKind, usize> {
        let mut summary = BTreeMap::new();
        for node in &self.steps {
            *summary.entry(node.kind()).or_insert(0) += 1;
        }
        summary
    }

    /// Steps that come before something they depend on.
    ///
    /// A plan produced by [`DependencyResolver`] is always clean; a plan read
    /// back from disk may have been reordered.
    pub fn order_report(&self) -> ValidationReport {
        let positions: HashMap<&NodeRef, usize> = self
            .steps
            .iter()
            .enumerate()
            .map(|(index, node)| (node.name(), index))
            .collect();

        let mut report = ValidationReport::new();
        for (index, node) in self.steps.iter().enumerate() {
            for dependency in node.required_dependencies() {
                // undeclared names are the validator's concern
                let Some(&dep_index) = positions.get(dependency) else {
                    continue;
                };
                if dep_index > index {
                    report.add(
                        node.name(),
                        Invariant::PlanOrder,
                        format!(
                            "step {} comes before its dependency '{}' at step {}",
                            index + 1,
                            dependency,
                            dep_index + 1
                        ),
                    );
                }
            }
        }
        report
    }

    /// Rebuild the graph the plan was resolved from.
    pub fn into_graph(self) -> StackResult<ResourceGraph> {
        ResourceGraph::from_nodes(self.steps)
    }

    /// Load a plan previously written as JSON or YAML.
    pub fn from_file(path: &Path) -> StackResult<Self> {
        let content = fs::read_to_string(path)?;
        let plan = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            _ => serde_json::from_str(&content)?,
        };
        Ok(plan)
    }
}

/// Topological sort over a resource graph.
pub struct DependencyResolver;

impl DependencyResolver {
    pub fn resolve(graph: &ResourceGraph) -> StackResult<ResolvedPlan> {
        let nodes = graph.nodes();
        let mut pending: Vec<usize> = vec![0; nodes.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];

        for (index, node) in nodes.iter().enumerate() {
            for dependency in node.required_dependencies() {
                let Some(dep_index) = graph.position(dependency) else {
                    return Err(StackError::UnknownDependency {
                        node: node.name().to_string(),
                        dependency: dependency.to_string(),
                    });
                };
                pending[index] += 1;
                dependents[dep_index].push(index);
            }
        }

        // Min-heap on declaration index keeps the order stable across runs.
        let mut ready: BinaryHeap<Reverse<usize>> = pending
            .iter()
            .enumerate()
            .filter(|(_, count)| **count == 0)
            .map(|(index, _)| Reverse(index))
            .collect();

        let mut order = Vec::with_capacity(nodes.len());
        while let Some(Reverse(index)) = ready.pop() {
            order.push(index);
            for &dependent in &dependents[index] {
                pending[dependent] -= 1;
                if pending[dependent] == 0 {
                    ready.push(Reverse(dependent));
                }
            }
        }

        if order.len() != nodes.len() {
            let stuck: Vec<String> = pending
                .iter()
                .enumerate()
                .filter(|(_, count)| **count > 0)
                .map(|(index, _)| nodes[index].name().to_string())
                .collect();
            debug!("Unresolvable nodes: {:?}", stuck);
            return Err(StackError::Cycle(stuck));
        }

        info!("Resolved creation order for {} node(s)", order.len());
        Ok(ResolvedPlan {
            steps: order.into_iter().map(|index| nodes[index].clone()).collect(),
        })
    }
}
