//! Network topology builder.
//!
//! Declares the VPC, its subnets, the internet and NAT egress paths, one
//! route table per subnet role with its default route, and one route
//! association per subnet.

use tracing::{debug, info};

use crate::cidr::{CidrAllocator, Ipv4Cidr};
use crate::config::StackConfig;
use crate::error::{StackError, StackResult};
use crate::graph::ResourceGraph;
use crate::model::{Attributes, NodeRef, ResourceNode, RouteTarget, SubnetRole};

pub const VPC: &str = "vpc";
pub const INTERNET_GATEWAY: &str = "internet-gateway";
pub const GATEWAY_ATTACHMENT: &str = "internet-gateway-attachment";
pub const NAT_EIP: &str = "nat-eip";
pub const NAT_GATEWAY: &str = "nat-gateway";

/// Names of the network nodes later builders wire into.
#[derive(Debug, Clone)]
pub struct NetworkTopology {
    pub vpc: NodeRef,
    pub public_subnets: Vec<NodeRef>,
    pub private_subnets: Vec<NodeRef>,
    pub internet_gateway: NodeRef,
    pub nat_gateway: Option<NodeRef>,
    pub public_route_table: NodeRef,
    pub private_route_table: Option<NodeRef>,
}

impl NetworkTopology {
    /// Subnets the service tasks run in: private when available.
    pub fn workload_subnets(&self) -> &[NodeRef] {
        if self.private_subnets.is_empty() {
            &self.public_subnets
        } else {
            &self.private_subnets
        }
    }
}

/// Builds the network layer of a stack.
pub struct NetworkTopologyBuilder<'a> {
    config: &'a StackConfig,
}

impl<'a> NetworkTopologyBuilder<'a> {
    pub fn new(config: &'a StackConfig) -> Self {
        Self { config }
    }

    pub fn build(&self, graph: &mut ResourceGraph) -> StackResult<NetworkTopology> {
        let config = self.config;
        if config.subnets_with_role(SubnetRole::Public).next().is_none() {
            return Err(StackError::construction(
                NAT_GATEWAY,
                "at least one public subnet is required to host the NAT gateway and load balancer",
            ));
        }

        info!(
            "Building network topology: {} across {} AZ(s), {} subnet(s)",
            config.cidr,
            config.az_count,
            config.subnet_layout.len()
        );

        let vpc = graph.insert(ResourceNode::new(
            VPC,
            Attributes::Vpc {
                cidr: config.cidr,
                max_azs: config.az_count,
            },
        ))?;

        let subnets = self.declare_subnets(graph, &vpc)?;
        let pick = |role: SubnetRole| -> Vec<NodeRef> {
            subnets
                .iter()
                .filter(|(_, r)| *r == role)
                .map(|(name, _)| name.clone())
                .collect()
        };
        let public_subnets = pick(SubnetRole::Public);
        let private_subnets = pick(SubnetRole::Private);

        let internet_gateway = graph.insert(ResourceNode::new(INTERNET_GATEWAY, Attributes::InternetGateway))?;
        let attachment = graph.insert(ResourceNode::new(
            GATEWAY_ATTACHMENT,
            Attributes::GatewayAttachment {
                vpc: vpc.clone(),
                internet_gateway: internet_gateway.clone(),
            },
        ))?;

        let mut tables = Vec::new();

        let public_route_table = self.declare_route_table(
            graph,
            &vpc,
            SubnetRole::Public,
            RouteTarget::InternetGateway {
                gateway: internet_gateway.clone(),
            },
            Some(&attachment),
        )?;
        tables.push((public_route_table.clone(), SubnetRole::Public));

        let (nat_gateway, private_route_table) = if private_subnets.is_empty() {
            debug!("No private subnets; omitting NAT gateway and private route table");
            (None, None)
        } else {
            let allocation = graph.insert(ResourceNode::new(NAT_EIP, Attributes::ElasticIp))?;
            // The NAT gateway always lives in the first public subnet.
            let nat = graph.insert(ResourceNode::new(
                NAT_GATEWAY,
                Attributes::NatGateway {
                    subnet: public_subnets[0].clone(),
                    allocation,
                },
            ))?;

            let table = self.declare_route_table(
                graph,
                &vpc,
                SubnetRole::Private,
                RouteTarget::NatGateway { gateway: nat.clone() },
                None,
            )?;
            tables.push((table.clone(), SubnetRole::Private));
            (Some(nat), Some(table))
        };

        graph.extend(associate_route_tables(&subnets, &tables)?)?;

        Ok(NetworkTopology {
            vpc,
            public_subnets,
            private_subnets,
            internet_gateway,
            nat_gateway,
            public_route_table,
            private_route_table,
        })
    }

    fn declare_subnets(&self, graph: &mut ResourceGraph, vpc: &NodeRef) -> StackResult<Vec<(NodeRef, SubnetRole)>> {
        let config = self.config;
        let mut allocator = CidrAllocator::new(config.cidr);
        let mut public_seen = 0usize;
        let mut private_seen = 0usize;
        let mut subnets = Vec::with_capacity(config.subnet_layout.len());

        for spec in &config.subnet_layout {
            let seen = match spec.role {
                SubnetRole::Public => &mut public_seen,
                SubnetRole::Private => &mut private_seen,
            };
            let ordinal = *seen;
            *seen += 1;

            let name = spec
                .name
                .as_ref()
                .map(|n| n.to_lowercase())
                .unwrap_or_else(|| format!("{}-subnet-{}", spec.role, ordinal + 1));

            let cidr = allocator
                .allocate(spec.cidr_mask)
                .map_err(|e| StackError::construction(&name, e.to_string()))?;

            let subnet = graph.insert(ResourceNode::new(
                name,
                Attributes::Subnet {
                    vpc: vpc.clone(),
                    cidr,
                    role: spec.role,
                    availability_zone: (ordinal % config.az_count.max(1) as usize) as u8,
                },
            ))?;
            subnets.push((subnet, spec.role));
        }

        debug!("Declared {} subnet(s)", subnets.len());
        Ok(subnets)
    }

    fn declare_route_table(
        &self,
        graph: &mut ResourceGraph,
        vpc: &NodeRef,
        role: SubnetRole,
        target: RouteTarget,
        after: Option<&NodeRef>,
    ) -> StackResult<NodeRef> {
        let table = graph.insert(ResourceNode::new(
            format!("{}-route-table", role),
            Attributes::RouteTable {
                vpc: vpc.clone(),
                role,
            },
        ))?;

        let mut route = ResourceNode::new(
            format!("{}-default-route", role),
            Attributes::Route {
                route_table: table.clone(),
                destination: Ipv4Cidr::any(),
                target,
            },
        );
        if let Some(dependency) = after {
            route = route.with_dependency(dependency.clone());
        }
        graph.insert(route)?;

        Ok(table)
    }
}

/// Map every subnet to the single route table of its role.
///
/// Fails if a role has no table, or more than one.
pub fn associate_route_tables(
    subnets: &[(NodeRef, SubnetRole)],
    tables: &[(NodeRef, SubnetRole)],
) -> StackResult<Vec<ResourceNode>> {
    subnets
        .iter()
        .map(|(subnet, role)| {
            let mut matching = tables.iter().filter(|(_, r)| r == role);
            let table = match (matching.next(), matching.next()) {
                (Some((table, _)), None) => table,
                (None, _) => {
                    return Err(StackError::construction(
                        subnet.as_str(),
                        format!("no {} route table to associate with", role),
                    ))
                }
                (Some(_), Some(_)) => {
                    return Err(StackError::construction(
                        subnet.as_str(),
                        format!("more than one {} route table", role),
                    ))
                }
            };

            Ok(ResourceNode::new(
                format!("{}-association", subnet),
                Attributes::RouteAssociation {
                    subnet: subnet.clone(),
                    route_table: table.clone(),
                },
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SubnetSpec;
    use crate::model::ResourceKind;

    fn build(config: &StackConfig) -> StackResult<(ResourceGraph, NetworkTopology)> {
        let mut graph = ResourceGraph::new();
        let network = NetworkTopologyBuilder::new(config).build(&mut graph)?;
        Ok((graph, network))
    }

    #[test]
    fn test_reference_layout() {
        let (graph, network) = build(&StackConfig::default()).unwrap();

        assert_eq!(graph.count(ResourceKind::Subnet), 4);
        assert_eq!(graph.count(ResourceKind::NatGateway), 1);
        assert_eq!(graph.count(ResourceKind::RouteTable), 2);
        assert_eq!(graph.count(ResourceKind::Route), 2);
        assert_eq!(graph.count(ResourceKind::RouteAssociation), 4);
        assert_eq!(network.public_subnets, vec![NodeRef::from("public01"), NodeRef::from("public02")]);
        assert_eq!(network.workload_subnets(), network.private_subnets.as_slice());
    }

    #[test]
    fn test_subnet_cidrs_and_azs() {
        let (graph, _) = build(&StackConfig::default()).unwrap();
        let subnets: Vec<_> = graph
            .of_kind(ResourceKind::Subnet)
            .map(|node| match node.attributes() {
                Attributes::Subnet {
                    cidr,
                    availability_zone,
                    ..
                } => (cidr.to_string(), *availability_zone),
                _ => unreachable!(),
            })
            .collect();

        assert_eq!(
            subnets,
            vec![
                ("10.0.0.0/24".to_string(), 0),
                ("10.0.1.0/24".to_string(), 1),
                ("10.0.2.0/24".to_string(), 0),
                ("10.0.3.0/24".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_nat_gateway_sits_in_first_public_subnet() {
        let (graph, network) = build(&StackConfig::default()).unwrap();
        let nat = graph.get(network.nat_gateway.as_ref().unwrap()).unwrap();
        match nat.attributes() {
            Attributes::NatGateway { subnet, .. } => assert_eq!(subnet, &network.public_subnets[0]),
            _ => panic!("expected NAT gateway attributes"),
        }
    }

    #[test]
    fn test_public_route_waits_for_gateway_attachment() {
        let (graph, _) = build(&StackConfig::default()).unwrap();
        let route = graph.get(&NodeRef::from("public-default-route")).unwrap();
        assert!(route.depends_on().contains(&NodeRef::from(GATEWAY_ATTACHMENT)));
        assert!(route.depends_on().contains(&NodeRef::from(INTERNET_GATEWAY)));
    }

    #[test]
    fn test_zero_private_subnets_omits_nat_path() {
        let config = StackConfig::default().with_layout(vec![SubnetSpec::public(24), SubnetSpec::public(24)]);
        let (graph, network) = build(&config).unwrap();

        assert!(network.nat_gateway.is_none());
        assert!(network.private_route_table.is_none());
        assert_eq!(graph.count(ResourceKind::NatGateway), 0);
        assert_eq!(graph.count(ResourceKind::ElasticIp), 0);
        assert_eq!(graph.count(ResourceKind::RouteTable), 1);
        assert_eq!(network.workload_subnets(), network.public_subnets.as_slice());
    }

    #[test]
    fn test_zero_public_subnets_is_a_construction_error() {
        let config = StackConfig::default().with_layout(vec![SubnetSpec::private(24)]);
        let err = build(&config).unwrap_err();
        assert!(matches!(err, StackError::Construction { ref node, .. } if node == NAT_GATEWAY));
    }

    #[test]
    fn test_default_subnet_names() {
        let config = StackConfig::default().with_layout(vec![
            SubnetSpec::public(24),
            SubnetSpec::private(24),
            SubnetSpec::public(24),
        ]);
        let (_, network) = build(&config).unwrap();
        assert_eq!(
            network.public_subnets,
            vec![NodeRef::from("public-subnet-1"), NodeRef::from("public-subnet-2")]
        );
        assert_eq!(network.private_subnets, vec![NodeRef::from("private-subnet-1")]);
    }

    #[test]
    fn test_hundreds_of_subnets_per_role() {
        let mut layout: Vec<SubnetSpec> = (0..300).map(|_| SubnetSpec::public(28)).collect();
        layout.push(SubnetSpec::private(28));
        let config = StackConfig::default().with_az_count(3).with_layout(layout);
        assert!(config.validate().is_ok());

        let (graph, network) = build(&config).unwrap();
        assert_eq!(network.public_subnets.len(), 300);
        assert_eq!(network.public_subnets[299].as_str(), "public-subnet-300");

        let last = graph.get(&network.public_subnets[299]).unwrap();
        match last.attributes() {
            Attributes::Subnet { availability_zone, .. } => assert_eq!(*availability_zone, 2),
            _ => panic!("expected subnet attributes"),
        }
    }

    #[test]
    fn test_associate_route_tables_is_pure() {
        let subnets = vec![
            (NodeRef::from("a"), SubnetRole::Public),
            (NodeRef::from("b"), SubnetRole::Private),
        ];
        let tables = vec![
            (NodeRef::from("pub"), SubnetRole::Public),
            (NodeRef::from("prv"), SubnetRole::Private),
        ];

        let associations = associate_route_tables(&subnets, &tables).unwrap();
        assert_eq!(associations.len(), 2);
        assert_eq!(associations[1].name().as_str(), "b-association");
        assert_eq!(associations[1].depends_on(), &[NodeRef::from("b"), NodeRef::from("prv")]);
    }

    #[test]
    fn test_associate_route_tables_requires_one_table_per_role() {
        let subnets = vec![(NodeRef::from("a"), SubnetRole::Private)];
        let public_only = vec![(NodeRef::from("pub"), SubnetRole::Public)];
        assert!(associate_route_tables(&subnets, &public_only).is_err());

        let doubled = vec![
            (NodeRef::from("p1"), SubnetRole::Private),
            (NodeRef::from("p2"), SubnetRole::Private),
        ];
        assert!(associate_route_tables(&subnets, &doubled).is_err());
    }
}
