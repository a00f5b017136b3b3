//! Resource node model.
//!
//! Every declarable resource is a [`ResourceNode`]: a logical name, a
//! [`ResourceKind`], a kind-specific [`Attributes`] bag and an ordered list
//! of dependency references. References are logical names only; the
//! [`ResourceGraph`](crate::graph::ResourceGraph) owns every node.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cidr::Ipv4Cidr;

/// Weak reference to another node, by logical name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeRef(String);

impl NodeRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeRef {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for NodeRef {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Resource kinds this stack can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Vpc,
    Subnet,
    InternetGateway,
    GatewayAttachment,
    ElasticIp,
    NatGateway,
    RouteTable,
    Route,
    RouteAssociation,
    SecurityGroup,
    IngressRule,
    Repository,
    Cluster,
    TaskDefinition,
    Container,
    LoadBalancer,
    Listener,
    TargetGroup,
    Service,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Vpc => "vpc",
            ResourceKind::Subnet => "subnet",
            ResourceKind::InternetGateway => "internet_gateway",
            ResourceKind::GatewayAttachment => "gateway_attachment",
            ResourceKind::ElasticIp => "elastic_ip",
            ResourceKind::NatGateway => "nat_gateway",
            ResourceKind::RouteTable => "route_table",
            ResourceKind::Route => "route",
            ResourceKind::RouteAssociation => "route_association",
            ResourceKind::SecurityGroup => "security_group",
            ResourceKind::IngressRule => "ingress_rule",
            ResourceKind::Repository => "repository",
            ResourceKind::Cluster => "cluster",
            ResourceKind::TaskDefinition => "task_definition",
            ResourceKind::Container => "container",
            ResourceKind::LoadBalancer => "load_balancer",
            ResourceKind::Listener => "listener",
            ResourceKind::TargetGroup => "target_group",
            ResourceKind::Service => "service",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Subnet role, which decides the default route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubnetRole {
    Public,
    Private,
}

impl SubnetRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubnetRole::Public => "public",
            SubnetRole::Private => "private",
        }
    }

    /// Kind of gateway the role's default route must target.
    pub fn egress_kind(&self) -> ResourceKind {
        match self {
            SubnetRole::Public => ResourceKind::InternetGateway,
            SubnetRole::Private => ResourceKind::NatGateway,
        }
    }
}

impl fmt::Display for SubnetRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    Tcp,
    Http,
}

/// Inclusive port range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortRange {
    pub from: u16,
    pub to: u16,
}

impl PortRange {
    pub fn single(port: u16) -> Self {
        Self {
            from: port,
            to: port,
        }
    }

    pub fn contains(&self, port: u16) -> bool {
        self.from <= port && port <= self.to
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.from == self.to {
            write!(f, "{}", self.from)
        } else {
            write!(f, "{}-{}", self.from, self.to)
        }
    }
}

/// Where an ingress rule admits traffic from: an address range or a peer group, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IngressSource {
    Cidr { cidr: Ipv4Cidr },
    SecurityGroup { group: NodeRef },
}

impl IngressSource {
    pub fn any_ipv4() -> Self {
        IngressSource::Cidr {
            cidr: Ipv4Cidr::any(),
        }
    }

    pub fn is_ip_range(&self) -> bool {
        matches!(self, IngressSource::Cidr { .. })
    }
}

/// Gateway a route sends traffic to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RouteTarget {
    InternetGateway { gateway: NodeRef },
    NatGateway { gateway: NodeRef },
}

impl RouteTarget {
    pub fn gateway(&self) -> &NodeRef {
        match self {
            RouteTarget::InternetGateway { gateway } | RouteTarget::NatGateway { gateway } => gateway,
        }
    }

    pub fn gateway_kind(&self) -> ResourceKind {
        match self {
            RouteTarget::InternetGateway { .. } => ResourceKind::InternetGateway,
            RouteTarget::NatGateway { .. } => ResourceKind::NatGateway,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    pub container_port: u16,
    pub host_port: u16,
    pub protocol: Protocol,
}

impl PortMapping {
    /// Same port on both sides, as `awsvpc` networking requires.
    pub fn tcp(port: u16) -> Self {
        Self {
            container_port: port,
            host_port: port,
            protocol: Protocol::Tcp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub path: String,
    pub interval_secs: u32,
    pub timeout_secs: u32,
    pub healthy_threshold: u32,
    pub unhealthy_threshold: u32,
}

impl HealthCheck {
    pub fn http(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            interval_secs: 30,
            timeout_secs: 5,
            healthy_threshold: 5,
            unhealthy_threshold: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoadBalancerScheme {
    InternetFacing,
    Internal,
}

/// Kind-specific attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Attributes {
    Vpc {
        cidr: Ipv4Cidr,
        max_azs: u8,
    },
    Subnet {
        vpc: NodeRef,
        cidr: Ipv4Cidr,
        role: SubnetRole,
        availability_zone: u8,
    },
    InternetGateway,
    GatewayAttachment {
        vpc: NodeRef,
        internet_gateway: NodeRef,
    },
    ElasticIp,
    NatGateway {
        subnet: NodeRef,
        allocation: NodeRef,
    },
    RouteTable {
        vpc: NodeRef,
        role: SubnetRole,
    },
    Route {
        route_table: NodeRef,
        destination: Ipv4Cidr,
        target: RouteTarget,
    },
    RouteAssociation {
        subnet: NodeRef,
        route_table: NodeRef,
    },
    SecurityGroup {
        vpc: NodeRef,
        description: String,
        allow_all_outbound: bool,
    },
    IngressRule {
        security_group: NodeRef,
        source: IngressSource,
        ports: PortRange,
        protocol: Protocol,
        description: String,
    },
    Repository {
        registry: String,
        repository_name: String,
    },
    Cluster {
        cluster_name: String,
        vpc: NodeRef,
    },
    TaskDefinition {
        family: String,
        cpu: u32,
        memory_mib: u32,
    },
    Container {
        task_definition: NodeRef,
        name: String,
        repository: NodeRef,
        image: String,
        port_mappings: Vec<PortMapping>,
        essential: bool,
    },
    LoadBalancer {
        scheme: LoadBalancerScheme,
        security_group: NodeRef,
        subnets: Vec<NodeRef>,
    },
    Listener {
        load_balancer: NodeRef,
        port: u16,
        protocol: Protocol,
    },
    TargetGroup {
        listener: NodeRef,
        protocol: Protocol,
        port: u16,
        health_check: HealthCheck,
        target: NodeRef,
        container_name: String,
        container_port: u16,
    },
    Service {
        cluster: NodeRef,
        task_definition: NodeRef,
        security_group: NodeRef,
        subnets: Vec<NodeRef>,
        desired_count: u32,
        assign_public_ip: bool,
    },
}

/// A reference held in an attribute field, with the kinds it may point to.
#[derive(Debug, Clone, Copy)]
pub struct TypedRef<'a> {
    pub field: &'static str,
    pub target: &'a NodeRef,
    pub expected: &'static [ResourceKind],
}

impl Attributes {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Attributes::Vpc { .. } => ResourceKind::Vpc,
            Attributes::Subnet { .. } => ResourceKind::Subnet,
            Attributes::InternetGateway => ResourceKind::InternetGateway,
            Attributes::GatewayAttachment { .. } => ResourceKind::GatewayAttachment,
            Attributes::ElasticIp => ResourceKind::ElasticIp,
            Attributes::NatGateway { .. } => ResourceKind::NatGateway,
            Attributes::RouteTable { .. } => ResourceKind::RouteTable,
            Attributes::Route { .. } => ResourceKind::Route,
            Attributes::RouteAssociation { .. } => ResourceKind::RouteAssociation,
            Attributes::SecurityGroup { .. } => ResourceKind::SecurityGroup,
            Attributes::IngressRule { .. } => ResourceKind::IngressRule,
            Attributes::Repository { .. } => ResourceKind::Repository,
            Attributes::Cluster { .. } => ResourceKind::Cluster,
            Attributes::TaskDefinition { .. } => ResourceKind::TaskDefinition,
            Attributes::Container { .. } => ResourceKind::Container,
            Attributes::LoadBalancer { .. } => ResourceKind::LoadBalancer,
            Attributes::Listener { .. } => ResourceKind::Listener,
            Attributes::TargetGroup { .. } => ResourceKind::TargetGroup,
            Attributes::Service { .. } => ResourceKind::Service,
        }
    }

    /// Every reference carried by the attributes, in field order.
    pub fn references(&self) -> Vec<TypedRef<'_>> {
        use ResourceKind as K;

        fn r<'a>(field: &'static str, target: &'a NodeRef, expected: &'static [ResourceKind]) -> TypedRef<'a> {
            TypedRef {
                field,
                target,
                expected,
            }
        }

        match self {
            Attributes::Vpc { .. }
            | Attributes::InternetGateway
            | Attributes::ElasticIp
            | Attributes::Repository { .. }
            | Attributes::TaskDefinition { .. } => Vec::new(),
            Attributes::Subnet { vpc, .. } => vec![r("vpc", vpc, &[K::Vpc])],
            Attributes::GatewayAttachment {
                vpc,
                internet_gateway,
            } => vec![
                r("vpc", vpc, &[K::Vpc]),
                r("internet_gateway", internet_gateway, &[K::InternetGateway]),
            ],
            Attributes::NatGateway { subnet, allocation } => vec![
                r("subnet", subnet, &[K::Subnet]),
                r("allocation", allocation, &[K::ElasticIp]),
            ],
            Attributes::RouteTable { vpc, .. } => vec![r("vpc", vpc, &[K::Vpc])],
            Attributes::Route {
                route_table,
                target,
                ..
            } => {
                let gateway_kind: &'static [ResourceKind] = match target {
                    RouteTarget::InternetGateway { .. } => &[K::InternetGateway],
                    RouteTarget::NatGateway { .. } => &[K::NatGateway],
                };
                vec![
                    r("route_table", route_table, &[K::RouteTable]),
                    r("target", target.gateway(), gateway_kind),
                ]
            }
            Attributes::RouteAssociation {
                subnet,
                route_table,
            } => vec![
                r("subnet", subnet, &[K::Subnet]),
                r("route_table", route_table, &[K::RouteTable]),
            ],
            Attributes::SecurityGroup { vpc, .. } => vec![r("vpc", vpc, &[K::Vpc])],
            Attributes::IngressRule {
                security_group,
                source,
                ..
            } => {
                let mut refs = vec![r("security_group", security_group, &[K::SecurityGroup])];
                if let IngressSource::SecurityGroup { group } = source {
                    refs.push(r("source", group, &[K::SecurityGroup]));
                }
                refs
            }
            Attributes::Cluster { vpc, .. } => vec![r("vpc", vpc, &[K::Vpc])],
            Attributes::Container {
                task_definition,
                repository,
                ..
            } => vec![
                r("task_definition", task_definition, &[K::TaskDefinition]),
                r("repository", repository, &[K::Repository]),
            ],
            Attributes::LoadBalancer {
                security_group,
                subnets,
                ..
            } => {
                let mut refs = vec![r("security_group", security_group, &[K::SecurityGroup])];
                refs.extend(subnets.iter().map(|s| r("subnets", s, &[K::Subnet])));
                refs
            }
            Attributes::Listener { load_balancer, .. } => {
                vec![r("load_balancer", load_balancer, &[K::LoadBalancer])]
            }
            Attributes::TargetGroup {
                listener, target, ..
            } => vec![
                r("listener", listener, &[K::Listener]),
                r("target", target, &[K::Service, K::Container]),
            ],
            Attributes::Service {
                cluster,
                task_definition,
                security_group,
                subnets,
                ..
            } => {
                let mut refs = vec![
                    r("cluster", cluster, &[K::Cluster]),
                    r("task_definition", task_definition, &[K::TaskDefinition]),
                    r("security_group", security_group, &[K::SecurityGroup]),
                ];
                refs.extend(subnets.iter().map(|s| r("subnets", s, &[K::Subnet])));
                refs
            }
        }
    }
}

/// A declared resource.
///
/// Immutable once built; the only way to add edges is [`ResourceNode::with_dependency`]
/// before the node is inserted into a graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceNode {
    name: NodeRef,
    kind: ResourceKind,
    attributes: Attributes,
    depends_on: Vec<NodeRef>,
}

impl ResourceNode {
    /// Create a node whose dependencies are the references in its attributes.
    pub fn new(name: impl Into<NodeRef>, attributes: Attributes) -> Self {
        let mut depends_on: Vec<NodeRef> = Vec::new();
        for reference in attributes.references() {
            if !depends_on.contains(reference.target) {
                depends_on.push(reference.target.clone());
            }
        }

        Self {
            name: name.into(),
            kind: attributes.kind(),
            attributes,
            depends_on,
        }
    }

    /// Add an ordering edge that no attribute field expresses.
    pub fn with_dependency(mut self, dependency: impl Into<NodeRef>) -> Self {
        let dependency = dependency.into();
        if !self.depends_on.contains(&dependency) {
            self.depends_on.push(dependency);
        }
        self
    }

    pub fn name(&self) -> &NodeRef {
        &self.name
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn depends_on(&self) -> &[NodeRef] {
        &self.depends_on
    }

    /// Declared dependencies plus every attribute reference, without duplicates.
    ///
    /// Ordering must use this rather than `depends_on` alone, since a node
    /// loaded from a plan file may list fewer edges than its attributes imply.
    pub fn required_dependencies(&self) -> Vec<&NodeRef> {
        let mut required: Vec<&NodeRef> = self.depends_on.iter().collect();
        for reference in self.attributes.references() {
            if !required.contains(&reference.target) {
                required.push(reference.target);
            }
        }
        required
    }

    /// Attribute references missing from `depends_on`.
    pub fn undeclared_references(&self) -> Vec<&NodeRef> {
        let mut missing: Vec<&NodeRef> = Vec::new();
        for reference in self.attributes.references() {
            if !self.depends_on.contains(reference.target) && !missing.contains(&reference.target) {
                missing.push(reference.target);
            }
        }
        missing
    }

    /// Role of a subnet or route table node.
    pub fn role(&self) -> Option<SubnetRole> {
        match &self.attributes {
            Attributes::Subnet { role, .. } | Attributes::RouteTable { role, .. } => Some(*role),
            _ => None,
        }
    }
}
