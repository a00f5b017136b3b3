//! The resource graph: owner of every declared node.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{StackError, StackResult};
use crate::model::{NodeRef, ResourceKind, ResourceNode};

/// Declared nodes in declaration order, indexed by logical name.
///
/// Nodes can be added but never changed or removed.
#[derive(Debug, Clone, Default)]
pub struct ResourceGraph {
    nodes: Vec<ResourceNode>,
    index: HashMap<NodeRef, usize>,
}

impl ResourceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a graph from plan descriptors, e.g. a previously emitted plan.
    pub fn from_nodes(nodes: impl IntoIterator<Item = ResourceNode>) -> StackResult<Self> {
        let mut graph = Self::new();
        for node in nodes {
            let actual = node.attributes().kind();
            if node.kind() != actual {
                return Err(StackError::KindMismatch {
                    node: node.name().to_string(),
                    declared: node.kind().to_string(),
                    actual: actual.to_string(),
                });
            }
            graph.insert(node)?;
        }
        Ok(graph)
    }

    /// Declare a node. Names must be unique.
    pub fn insert(&mut self, node: ResourceNode) -> StackResult<NodeRef> {
        let name = node.name().clone();
        if self.index.contains_key(&name) {
            return Err(StackError::DuplicateNode(name.to_string()));
        }

        debug!("Declared {} '{}'", node.kind(), name);
        self.index.insert(name.clone(), self.nodes.len());
        self.nodes.push(node);
        Ok(name)
    }

    pub fn extend(&mut self, nodes: impl IntoIterator<Item = ResourceNode>) -> StackResult<Vec<NodeRef>> {
        nodes.into_iter().map(|node| self.insert(node)).collect()
    }

    pub fn get(&self, name: &NodeRef) -> Option<&ResourceNode> {
        self.index.get(name).map(|&i| &self.nodes[i])
    }

    /// Look a name up, requiring a specific kind.
    pub fn get_kind(&self, name: &NodeRef, kind: ResourceKind) -> Option<&ResourceNode> {
        self.get(name).filter(|node| node.kind() == kind)
    }

    pub fn contains(&self, name: &NodeRef) -> bool {
        self.index.contains_key(name)
    }

    /// Declaration index of a node.
    pub fn position(&self, name: &NodeRef) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn nodes(&self) -> &[ResourceNode] {
        &self.nodes
    }

    pub fn of_kind(&self, kind: ResourceKind) -> impl Iterator<Item = &ResourceNode> {
        self.nodes.iter().filter(move |node| node.kind() == kind)
    }

    pub fn count(&self, kind: ResourceKind) -> usize {
        self.of_kind(kind).count()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn into_nodes(self) -> Vec<ResourceNode> {
        self.nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Attributes;

    fn vpc() -> ResourceNode {
        ResourceNode::new(
            "vpc",
            Attributes::Vpc {
                cidr: "10.0.0.0/16".parse().unwrap(),
                max_azs: 2,
            },
        )
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut graph = ResourceGraph::new();
        let name = graph.insert(vpc()).unwrap();
        graph
            .insert(ResourceNode::new("igw", Attributes::InternetGateway))
            .unwrap();

        assert_eq!(graph.len(), 2);
        assert_eq!(graph.position(&name), Some(0));
        assert!(graph.get_kind(&name, ResourceKind::Vpc).is_some());
        assert!(graph.get_kind(&name, ResourceKind::Subnet).is_none());
        assert_eq!(graph.count(ResourceKind::InternetGateway), 1);
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let mut graph = ResourceGraph::new();
        graph.insert(vpc()).unwrap();
        let err = graph.insert(vpc()).unwrap_err();
        assert!(matches!(err, StackError::DuplicateNode(ref n) if n == "vpc"));
    }

    #[test]
    fn test_from_nodes_checks_kind_agreement() {
        let mut json = serde_json::to_value(vpc()).unwrap();
        json["kind"] = serde_json::Value::from("subnet");
        let node: ResourceNode = serde_json::from_value(json).unwrap();

        let err = ResourceGraph::from_nodes(vec![node]).unwrap_err();
        assert!(matches!(err, StackError::KindMismatch { .. }));
    }
}
