//! Graph validation.
//!
//! Walks a finished [`ResourceGraph`] and reports every broken structural
//! invariant. Nothing short-circuits: a caller gets all violations in one pass.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::graph::ResourceGraph;
use crate::model::{Attributes, IngressSource, NodeRef, ResourceKind, ResourceNode, SubnetRole};
use crate::security::ingress_rules;
use crate::service::task_containers;

/// Structural rules checked by the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Invariant {
    DanglingReference,
    UndeclaredDependency,
    ReferenceKind,
    NatInPublicSubnet,
    RouteTableRole,
    SubnetAssociation,
    DefaultRoute,
    IngressSource,
    AlbIngress,
    ServiceIngress,
    LoadBalancerPlacement,
    TargetPortMismatch,
    DesiredCount,
    PlanOrder,
}

impl Invariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Invariant::DanglingReference => "dangling_reference",
            Invariant::UndeclaredDependency => "undeclared_dependency",
            Invariant::ReferenceKind => "reference_kind",
            Invariant::NatInPublicSubnet => "nat_in_public_subnet",
            Invariant::RouteTableRole => "route_table_role",
            Invariant::SubnetAssociation => "subnet_association",
            Invariant::DefaultRoute => "default_route",
            Invariant::IngressSource => "ingress_source",
            Invariant::AlbIngress => "alb_ingress",
            Invariant::ServiceIngress => "service_ingress",
            Invariant::LoadBalancerPlacement => "load_balancer_placement",
            Invariant::TargetPortMismatch => "target_port_mismatch",
            Invariant::DesiredCount => "desired_count",
            Invariant::PlanOrder => "plan_order",
        }
    }
}

impl fmt::Display for Invariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One broken rule on one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub node: String,
    pub invariant: Invariant,
    pub reason: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.invariant, self.node, self.reason)
    }
}

/// Every violation found in one validation pass. Empty means safe to resolve.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, node: &NodeRef, invariant: Invariant, reason: impl Into<String>) {
        self.violations.push(Violation {
            node: node.to_string(),
            invariant,
            reason: reason.into(),
        });
    }

    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Append the violations of another pass.
    pub fn extend(&mut self, other: ValidationReport) {
        self.violations.extend(other.violations);
    }

    pub fn with_invariant(&self, invariant: Invariant) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(move |v| v.invariant == invariant)
    }

    pub fn for_node<'a>(&'a self, node: &'a str) -> impl Iterator<Item = &'a Violation> {
        self.violations.iter().filter(move |v| v.node == node)
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for violation in &self.violations {
            writeln!(f, "{}", violation)?;
        }
        Ok(())
    }
}

/// Validator for resource graphs.
pub struct GraphValidator;

impl GraphValidator {
    pub fn validate(graph: &ResourceGraph) -> ValidationReport {
        let mut report = ValidationReport::new();

        Self::check_references(graph, &mut report);
        Self::check_nat_placement(graph, &mut report);
        Self::check_route_tables(graph, &mut report);
        Self::check_ingress_sources(graph, &mut report);
        Self::check_traffic_graph(graph, &mut report);
        Self::check_target_groups(graph, &mut report);
        Self::check_services(graph, &mut report);

        if report.is_clean() {
            info!("Validated {} node(s): no violations", graph.len());
        } else {
            for violation in &report.violations {
                warn!("{}", violation);
            }
            info!("Validated {} node(s): {} violation(s)", graph.len(), report.len());
        }
        report
    }

    fn check_references(graph: &ResourceGraph, report: &mut ValidationReport) {
        for node in graph.nodes() {
            let mut dangling: Vec<&NodeRef> = Vec::new();

            for dependency in node.depends_on() {
                if !graph.contains(dependency) && !dangling.contains(&dependency) {
                    dangling.push(dependency);
                }
            }

            for reference in node.attributes().references() {
                match graph.get(reference.target) {
                    None => {
                        if !dangling.contains(&reference.target) {
                            dangling.push(reference.target);
                        }
                    }
                    Some(target) if !reference.expected.contains(&target.kind()) => {
                        report.add(
                            node.name(),
                            Invariant::ReferenceKind,
                            format!(
                                "{} '{}' is a {}, expected {}",
                                reference.field,
                                reference.target,
                                target.kind(),
                                reference
                                    .expected
                                    .iter()
                                    .map(|k| k.as_str())
                                    .collect::<Vec<_>>()
                                    .join(" or ")
                            ),
                        );
                    }
                    Some(_) => {}
                }
            }

            for name in dangling {
                report.add(
                    node.name(),
                    Invariant::DanglingReference,
                    format!("depends on '{}', which is not declared", name),
                );
            }

            for name in node.undeclared_references() {
                report.add(
                    node.name(),
                    Invariant::UndeclaredDependency,
                    format!("references '{}' without listing it in depends_on", name),
                );
            }
        }
    }

    fn check_nat_placement(graph: &ResourceGraph, report: &mut ValidationReport) {
        for node in graph.of_kind(ResourceKind::NatGateway) {
            let Attributes::NatGateway { subnet, .. } = node.attributes() else {
                continue;
            };
            let role = graph.get_kind(subnet, ResourceKind::Subnet).and_then(ResourceNode::role);
            if role == Some(SubnetRole::Private) {
                report.add(
                    node.name(),
                    Invariant::NatInPublicSubnet,
                    format!("placed in private subnet '{}'", subnet),
                );
            }
        }
    }

    fn check_route_tables(graph: &ResourceGraph, report: &mut ValidationReport) {
        let mut associations: HashMap<&NodeRef, usize> = HashMap::new();

        for node in graph.of_kind(ResourceKind::RouteAssociation) {
            let Attributes::RouteAssociation { subnet, route_table } = node.attributes() else {
                continue;
            };
            *associations.entry(subnet).or_default() += 1;

            let subnet_role = graph.get_kind(subnet, ResourceKind::Subnet).and_then(ResourceNode::role);
            let table_role = graph
                .get_kind(route_table, ResourceKind::RouteTable)
                .and_then(ResourceNode::role);
            if let (Some(subnet_role), Some(table_role)) = (subnet_role, table_role) {
                if subnet_role != table_role {
                    report.add(
                        node.name(),
                        Invariant::RouteTableRole,
                        format!(
                            "{} subnet '{}' is associated with {} route table '{}'",
                            subnet_role, subnet, table_role, route_table
                        ),
                    );
                }
            }
        }

        for subnet in graph.of_kind(ResourceKind::Subnet) {
            let count = associations.get(subnet.name()).copied().unwrap_or(0);
            if count != 1 {
                report.add(
                    subnet.name(),
                    Invariant::SubnetAssociation,
                    format!("has {} route table associations, expected exactly 1", count),
                );
            }
        }

        for table in graph.of_kind(ResourceKind::RouteTable) {
            let Some(role) = table.role() else {
                continue;
            };
            let has_default = graph.of_kind(ResourceKind::Route).any(|route| {
                matches!(
                    route.attributes(),
                    Attributes::Route { route_table, destination, target }
                        if route_table == table.name()
                            && destination.is_any()
                            && target.gateway_kind() == role.egress_kind()
                )
            });
            if !has_default {
                let expected = match role {
                    SubnetRole::Public => "an internet gateway",
                    SubnetRole::Private => "a NAT gateway",
                };
                report.add(
                    table.name(),
                    Invariant::DefaultRoute,
                    format!("{} route table has no 0.0.0.0/0 route through {}", role, expected),
                );
            }
        }
    }

    fn check_ingress_sources(graph: &ResourceGraph, report: &mut ValidationReport) {
        for node in graph.of_kind(ResourceKind::IngressRule) {
            let Attributes::IngressRule {
                security_group,
                source: IngressSource::SecurityGroup { group },
                ..
            } = node.attributes()
            else {
                continue;
            };
            if group == security_group {
                report.add(
                    node.name(),
                    Invariant::IngressSource,
                    format!("'{}' admits itself as its own source", security_group),
                );
            }
        }
    }

    fn check_traffic_graph(graph: &ResourceGraph, report: &mut ValidationReport) {
        let mut alb_groups: Vec<&NodeRef> = Vec::new();

        for lb in graph.of_kind(ResourceKind::LoadBalancer) {
            let Attributes::LoadBalancer {
                security_group,
                subnets,
                ..
            } = lb.attributes()
            else {
                continue;
            };
            alb_groups.push(security_group);

            for subnet in subnets {
                if graph.get_kind(subnet, ResourceKind::Subnet).and_then(ResourceNode::role) == Some(SubnetRole::Private) {
                    report.add(
                        lb.name(),
                        Invariant::LoadBalancerPlacement,
                        format!("placed in private subnet '{}'", subnet),
                    );
                }
            }

            for listener in graph.of_kind(ResourceKind::Listener) {
                let Attributes::Listener {
                    load_balancer,
                    port,
                    ..
                } = listener.attributes()
                else {
                    continue;
                };
                if load_balancer != lb.name() {
                    continue;
                }
                let open = ingress_rules(graph, security_group).any(|(source, ports)| {
                    matches!(source, IngressSource::Cidr { cidr } if cidr.is_any()) && ports.contains(*port)
                });
                if !open {
                    report.add(
                        security_group,
                        Invariant::AlbIngress,
                        format!("does not admit listener port {} from 0.0.0.0/0", port),
                    );
                }
            }
        }

        for service in graph.of_kind(ResourceKind::Service) {
            let Attributes::Service {
                security_group,
                task_definition,
                ..
            } = service.attributes()
            else {
                continue;
            };

            for (source, ports) in ingress_rules(graph, security_group) {
                if let IngressSource::Cidr { cidr } = source {
                    report.add(
                        security_group,
                        Invariant::ServiceIngress,
                        format!("admits raw range {} on port {}; only the load balancer group may reach the service", cidr, ports),
                    );
                }
            }

            let container_ports = task_containers(graph, task_definition).flat_map(|node| match node.attributes() {
                Attributes::Container { port_mappings, .. } => port_mappings.iter().map(|m| m.container_port).collect::<Vec<_>>(),
                _ => Vec::new(),
            });
            for port in container_ports {
                let reachable = ingress_rules(graph, security_group).any(|(source, ports)| {
                    matches!(source, IngressSource::SecurityGroup { group } if alb_groups.contains(&group))
                        && ports.contains(port)
                });
                if !reachable {
                    report.add(
                        security_group,
                        Invariant::ServiceIngress,
                        format!("does not admit container port {} from the load balancer group", port),
                    );
                }
            }
        }
    }

    fn check_target_groups(graph: &ResourceGraph, report: &mut ValidationReport) {
        for node in graph.of_kind(ResourceKind::TargetGroup) {
            let Attributes::TargetGroup {
                target,
                container_name,
                container_port,
                ..
            } = node.attributes()
            else {
                continue;
            };

            let containers: Vec<&ResourceNode> = match graph.get(target).map(|t| t.attributes()) {
                Some(Attributes::Service { task_definition, .. }) => task_containers(graph, task_definition).collect(),
                Some(Attributes::Container { .. }) => graph.get(target).into_iter().collect(),
                // missing or mistyped targets are reported by check_references
                _ => continue,
            };

            let mut published = Vec::new();
            for container in containers {
                if let Attributes::Container {
                    name,
                    port_mappings,
                    ..
                } = container.attributes()
                {
                    if name == container_name {
                        published.extend(port_mappings.iter().map(|m| m.container_port));
                    }
                }
            }

            if published.is_empty() {
                report.add(
                    node.name(),
                    Invariant::TargetPortMismatch,
                    format!("target '{}' has no container named '{}'", target, container_name),
                );
            } else if !published.contains(container_port) {
                report.add(
                    node.name(),
                    Invariant::TargetPortMismatch,
                    format!(
                        "advertises port {} but container '{}' only maps {:?}",
                        container_port, container_name, published
                    ),
                );
            }
        }
    }

    fn check_services(graph: &ResourceGraph, report: &mut ValidationReport) {
        for node in graph.of_kind(ResourceKind::Service) {
            if let Attributes::Service { desired_count, .. } = node.attributes() {
                if *desired_count < 1 {
                    report.add(node.name(), Invariant::DesiredCount, "desired count must be at least 1");
                }
            }
        }
    }
}
