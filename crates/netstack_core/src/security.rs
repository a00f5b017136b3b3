//! Security policy builder.
//!
//! Encodes the allowed traffic graph: internet → load balancer → service.

use tracing::info;

use crate::error::StackResult;
use crate::graph::ResourceGraph;
use crate::model::{Attributes, IngressSource, NodeRef, PortRange, Protocol, ResourceNode};
use crate::network::NetworkTopology;

pub const ALB_SECURITY_GROUP: &str = "alb-sg";
pub const SERVICE_SECURITY_GROUP: &str = "service-sg";

#[derive(Debug, Clone)]
pub struct SecurityPolicy {
    pub alb_group: NodeRef,
    pub service_group: NodeRef,
}

pub struct SecurityPolicyBuilder {
    listener_port: u16,
    service_port: u16,
}

impl Default for SecurityPolicyBuilder {
    fn default() -> Self {
        Self::new(80, 8000)
    }
}

impl SecurityPolicyBuilder {
    pub fn new(listener_port: u16, service_port: u16) -> Self {
        Self {
            listener_port,
            service_port,
        }
    }

    pub fn build(&self, graph: &mut ResourceGraph, network: &NetworkTopology) -> StackResult<SecurityPolicy> {
        info!(
            "Building security policy: internet -> :{} -> :{}",
            self.listener_port, self.service_port
        );

        let alb_group = self.declare_group(graph, network, ALB_SECURITY_GROUP, "Security group for public ALB")?;
        self.declare_ingress(
            graph,
            &alb_group,
            IngressSource::any_ipv4(),
            self.listener_port,
            "Allow HTTP traffic",
        )?;

        let service_group = self.declare_group(graph, network, SERVICE_SECURITY_GROUP, "Security group for ECS")?;
        self.declare_ingress(
            graph,
            &service_group,
            IngressSource::SecurityGroup {
                group: alb_group.clone(),
            },
            self.service_port,
            "Allow HTTP traffic from ALB",
        )?;

        Ok(SecurityPolicy {
            alb_group,
            service_group,
        })
    }

    fn declare_group(
        &self,
        graph: &mut ResourceGraph,
        network: &NetworkTopology,
        name: &str,
        description: &str,
    ) -> StackResult<NodeRef> {
        graph.insert(ResourceNode::new(
            name,
            Attributes::SecurityGroup {
                vpc: network.vpc.clone(),
                description: description.to_string(),
                allow_all_outbound: true,
            },
        ))
    }

    fn declare_ingress(
        &self,
        graph: &mut ResourceGraph,
        group: &NodeRef,
        source: IngressSource,
        port: u16,
        description: &str,
    ) -> StackResult<NodeRef> {
        graph.insert(ResourceNode::new(
            format!("{}-ingress-{}", group, port),
            Attributes::IngressRule {
                security_group: group.clone(),
                source,
                ports: PortRange::single(port),
                protocol: Protocol::Tcp,
                description: description.to_string(),
            },
        ))
    }
}

/// Ingress rules owned by a security group, in declaration order.
pub fn ingress_rules<'g>(
    graph: &'g ResourceGraph,
    group: &'g NodeRef,
) -> impl Iterator<Item = (&'g IngressSource, &'g PortRange)> + 'g {
    graph.nodes().iter().filter_map(move |node| match node.attributes() {
        Attributes::IngressRule {
            security_group,
            source,
            ports,
            ..
        } if security_group == group => Some((source, ports)),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StackConfig;
    use crate::model::ResourceKind;
    use crate::network::NetworkTopologyBuilder;

    fn build(listener: u16, service: u16) -> (ResourceGraph, SecurityPolicy) {
        let mut graph = ResourceGraph::new();
        let config = StackConfig::default();
        let network = NetworkTopologyBuilder::new(&config).build(&mut graph).unwrap();
        let policy = SecurityPolicyBuilder::new(listener, service)
            .build(&mut graph, &network)
            .unwrap();
        (graph, policy)
    }

    #[test]
    fn test_two_groups_with_one_rule_each() {
        let (graph, policy) = build(80, 8000);
        assert_eq!(graph.count(ResourceKind::SecurityGroup), 2);
        assert_eq!(graph.count(ResourceKind::IngressRule), 2);
        assert_eq!(policy.alb_group.as_str(), ALB_SECURITY_GROUP);
        assert_eq!(policy.service_group.as_str(), SERVICE_SECURITY_GROUP);
    }

    #[test]
    fn test_alb_admits_listener_port_from_anywhere() {
        let (graph, policy) = build(8080, 8000);
        let rules: Vec<_> = ingress_rules(&graph, &policy.alb_group).collect();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].0, &IngressSource::any_ipv4());
        assert!(rules[0].1.contains(8080));
    }

    #[test]
    fn test_service_only_admits_the_alb_group() {
        let (graph, policy) = build(80, 3000);
        let rules: Vec<_> = ingress_rules(&graph, &policy.service_group).collect();
        assert!(!rules.is_empty());
        assert!(rules.iter().all(|(source, _)| !source.is_ip_range()));
        assert!(rules.iter().all(|(_, ports)| ports.contains(3000)));
    }

    #[test]
    fn test_groups_allow_all_outbound() {
        let (graph, _) = build(80, 8000);
        assert!(graph.of_kind(ResourceKind::SecurityGroup).all(|node| matches!(
            node.attributes(),
            Attributes::SecurityGroup {
                allow_all_outbound: true,
                ..
            }
        )));
    }
}
