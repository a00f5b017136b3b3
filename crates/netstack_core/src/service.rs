//! Service topology builder.
//!
//! Declares the image repository, cluster, task definition and container,
//! the internet-facing load balancer with its listener, the Fargate service,
//! and the target group that attaches the service to the listener.

use tracing::{debug, info};

use crate::config::StackConfig;
use crate::error::{StackError, StackResult};
use crate::graph::ResourceGraph;
use crate::model::{
    Attributes, HealthCheck, LoadBalancerScheme, NodeRef, PortMapping, Protocol, ResourceKind, ResourceNode,
};
use crate::network::NetworkTopology;
use crate::security::SecurityPolicy;

pub const REPOSITORY: &str = "repository";
pub const CLUSTER: &str = "cluster";
pub const TASK_DEFINITION: &str = "task-definition";
pub const LOAD_BALANCER: &str = "load-balancer";
pub const SERVICE: &str = "service";
pub const TARGET_GROUP: &str = "target-group";

#[derive(Debug, Clone)]
pub struct ServiceTopology {
    pub repository: NodeRef,
    pub cluster: NodeRef,
    pub task_definition: NodeRef,
    pub container: NodeRef,
    pub load_balancer: NodeRef,
    pub listener: NodeRef,
    pub service: NodeRef,
    pub target_group: NodeRef,
}

pub struct ServiceTopologyBuilder<'a> {
    config: &'a StackConfig,
}

impl<'a> ServiceTopologyBuilder<'a> {
    pub fn new(config: &'a StackConfig) -> Self {
        Self { config }
    }

    pub fn build(
        &self,
        graph: &mut ResourceGraph,
        network: &NetworkTopology,
        security: &SecurityPolicy,
    ) -> StackResult<ServiceTopology> {
        let config = self.config;
        info!(
            "Building service topology: {} x {} ({} cpu / {} MiB) on :{}",
            config.desired_count,
            config.image.uri(),
            config.cpu,
            config.memory_mib,
            config.service_port
        );

        let repository = graph.insert(ResourceNode::new(
            REPOSITORY,
            Attributes::Repository {
                registry: config.image.registry.clone(),
                repository_name: config.image.repository.clone(),
            },
        ))?;

        let cluster = graph.insert(ResourceNode::new(
            CLUSTER,
            Attributes::Cluster {
                cluster_name: format!("{}-cluster", config.name),
                vpc: network.vpc.clone(),
            },
        ))?;

        let task_definition = graph.insert(ResourceNode::new(
            TASK_DEFINITION,
            Attributes::TaskDefinition {
                family: format!("{}-task", config.name),
                cpu: config.cpu,
                memory_mib: config.memory_mib,
            },
        ))?;

        let container = graph.insert(ResourceNode::new(
            format!("{}-container", config.container_name),
            Attributes::Container {
                task_definition: task_definition.clone(),
                name: config.container_name.clone(),
                repository: repository.clone(),
                image: config.image.uri(),
                port_mappings: vec![PortMapping::tcp(config.service_port)],
                essential: true,
            },
        ))?;

        let load_balancer = graph.insert(ResourceNode::new(
            LOAD_BALANCER,
            Attributes::LoadBalancer {
                scheme: LoadBalancerScheme::InternetFacing,
                security_group: security.alb_group.clone(),
                subnets: network.public_subnets.clone(),
            },
        ))?;

        let listener = graph.insert(ResourceNode::new(
            format!("listener-{}", config.listener_port),
            Attributes::Listener {
                load_balancer: load_balancer.clone(),
                port: config.listener_port,
                protocol: Protocol::Http,
            },
        ))?;

        // Tasks only get a public IP when there is no NAT path to pull images through.
        let assign_public_ip = network.private_subnets.is_empty();
        let service = graph.insert(
            ResourceNode::new(
                SERVICE,
                Attributes::Service {
                    cluster: cluster.clone(),
                    task_definition: task_definition.clone(),
                    security_group: security.service_group.clone(),
                    subnets: network.workload_subnets().to_vec(),
                    desired_count: config.desired_count,
                    assign_public_ip,
                },
            )
            .with_dependency(container.clone()),
        )?;

        let target_group = self.attach_service(
            graph,
            &listener,
            &service,
            &config.container_name,
            config.service_port,
        )?;

        Ok(ServiceTopology {
            repository,
            cluster,
            task_definition,
            container,
            load_balancer,
            listener,
            service,
            target_group,
        })
    }

    /// Declare the target group that forwards listener traffic to the service.
    ///
    /// Fails unless the service's task definition has a container publishing the port.
    pub(crate) fn attach_service(
        &self,
        graph: &mut ResourceGraph,
        listener: &NodeRef,
        service: &NodeRef,
        container_name: &str,
        container_port: u16,
    ) -> StackResult<NodeRef> {
        let config = self.config;

        let task_definition = match graph.get(service).map(|node| node.attributes()) {
            Some(Attributes::Service { task_definition, .. }) => task_definition.clone(),
            _ => return Err(StackError::construction(TARGET_GROUP, format!("'{}' is not a service", service))),
        };

        if find_port_mapping(graph, &task_definition, container_name, container_port).is_none() {
            return Err(StackError::construction(
                TARGET_GROUP,
                format!(
                    "no container '{}' in '{}' publishes port {}",
                    container_name, task_definition, container_port
                ),
            ));
        }

        debug!(
            "Attaching '{}' to '{}' via {}:{}",
            service, listener, container_name, container_port
        );

        graph.insert(ResourceNode::new(
            TARGET_GROUP,
            Attributes::TargetGroup {
                listener: listener.clone(),
                protocol: Protocol::Http,
                port: config.listener_port,
                health_check: HealthCheck::http(&config.health_check_path),
                target: service.clone(),
                container_name: container_name.to_string(),
                container_port,
            },
        ))
    }
}

/// Containers registered in a task definition.
pub fn task_containers<'g>(
    graph: &'g ResourceGraph,
    task_definition: &'g NodeRef,
) -> impl Iterator<Item = &'g ResourceNode> + 'g {
    graph.of_kind(ResourceKind::Container).filter(move |node| {
        matches!(
            node.attributes(),
            Attributes::Container { task_definition: td, .. } if td == task_definition
        )
    })
}

/// Find the port mapping a target would route to.
pub fn find_port_mapping<'g>(
    graph: &'g ResourceGraph,
    task_definition: &'g NodeRef,
    container_name: &str,
    container_port: u16,
) -> Option<&'g PortMapping> {
    task_containers(graph, task_definition)
        .filter_map(|node| match node.attributes() {
            Attributes::Container {
                name,
                port_mappings,
                ..
            } if name == container_name => Some(port_mappings),
            _ => None,
        })
        .flatten()
        .find(|mapping| mapping.container_port == container_port)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SubnetSpec;
    use crate::network::NetworkTopologyBuilder;
    use crate::security::SecurityPolicyBuilder;

    fn build(config: &StackConfig) -> (ResourceGraph, NetworkTopology, ServiceTopology) {
        let mut graph = ResourceGraph::new();
        let network = NetworkTopologyBuilder::new(config).build(&mut graph).unwrap();
        let security = SecurityPolicyBuilder::new(config.listener_port, config.service_port)
            .build(&mut graph, &network)
            .unwrap();
        let service = ServiceTopologyBuilder::new(config)
            .build(&mut graph, &network, &security)
            .unwrap();
        (graph, network, service)
    }

    #[test]
    fn test_declares_every_service_resource() {
        let (graph, _, topology) = build(&StackConfig::default());
        for kind in [
            ResourceKind::Repository,
            ResourceKind::Cluster,
            ResourceKind::TaskDefinition,
            ResourceKind::Container,
            ResourceKind::LoadBalancer,
            ResourceKind::Listener,
            ResourceKind::Service,
            ResourceKind::TargetGroup,
        ] {
            assert_eq!(graph.count(kind), 1, "expected one {}", kind);
        }
        assert_eq!(topology.listener.as_str(), "listener-80");
        assert_eq!(topology.container.as_str(), "app-container");
    }

    #[test]
    fn test_target_group_matches_container_port() {
        let config = StackConfig::default().with_ports(8080, 3000);
        let (graph, _, topology) = build(&config);

        match graph.get(&topology.target_group).unwrap().attributes() {
            Attributes::TargetGroup {
                port,
                container_port,
                target,
                health_check,
                ..
            } => {
                assert_eq!(*port, 8080);
                assert_eq!(*container_port, 3000);
                assert_eq!(target, &topology.service);
                assert_eq!(health_check.path, "/");
            }
            _ => panic!("expected target group attributes"),
        }
        assert!(find_port_mapping(&graph, &topology.task_definition, "app", 3000).is_some());
        assert!(find_port_mapping(&graph, &topology.task_definition, "app", 8080).is_none());
    }

    #[test]
    fn test_attach_fails_fast_on_unpublished_port() {
        let config = StackConfig::default();
        let mut graph = ResourceGraph::new();
        let network = NetworkTopologyBuilder::new(&config).build(&mut graph).unwrap();
        let security = SecurityPolicyBuilder::new(config.listener_port, config.service_port)
            .build(&mut graph, &network)
            .unwrap();

        let builder = ServiceTopologyBuilder::new(&config);
        let topology = builder.build(&mut graph, &network, &security).unwrap();
        let declared = graph.len();

        let err = builder
            .attach_service(&mut graph, &topology.listener, &topology.service, "app", 9000)
            .unwrap_err();
        match err {
            StackError::Construction { node, reason } => {
                assert_eq!(node, TARGET_GROUP);
                assert!(reason.contains("9000"));
            }
            other => panic!("expected construction error, got {other}"),
        }

        let err = builder
            .attach_service(&mut graph, &topology.listener, &topology.service, "sidecar", 8000)
            .unwrap_err();
        assert!(matches!(err, StackError::Construction { ref node, .. } if node == TARGET_GROUP));
        assert_eq!(graph.len(), declared);
    }

    #[test]
    fn test_target_group_is_declared_after_service_and_listener() {
        let (graph, _, topology) = build(&StackConfig::default());
        let tg = graph.get(&topology.target_group).unwrap();
        assert!(tg.depends_on().contains(&topology.service));
        assert!(tg.depends_on().contains(&topology.listener));
    }

    #[test]
    fn test_service_runs_privately_behind_the_alb() {
        let (graph, network, topology) = build(&StackConfig::default());
        match graph.get(&topology.service).unwrap().attributes() {
            Attributes::Service {
                subnets,
                assign_public_ip,
                security_group,
                ..
            } => {
                assert_eq!(subnets, &network.private_subnets);
                assert!(!*assign_public_ip);
                assert_eq!(security_group.as_str(), "service-sg");
            }
            _ => panic!("expected service attributes"),
        }
    }

    #[test]
    fn test_public_only_layout_gives_tasks_a_public_ip() {
        let config = StackConfig::default().with_layout(vec![SubnetSpec::public(24), SubnetSpec::public(24)]);
        let (graph, network, topology) = build(&config);
        match graph.get(&topology.service).unwrap().attributes() {
            Attributes::Service {
                subnets,
                assign_public_ip,
                ..
            } => {
                assert_eq!(subnets, &network.public_subnets);
                assert!(*assign_public_ip);
            }
            _ => panic!("expected service attributes"),
        }
    }

    #[test]
    fn test_load_balancer_uses_public_subnets() {
        let (graph, network, topology) = build(&StackConfig::default());
        match graph.get(&topology.load_balancer).unwrap().attributes() {
            Attributes::LoadBalancer {
                subnets,
                scheme,
                security_group,
            } => {
                assert_eq!(subnets, &network.public_subnets);
                assert_eq!(*scheme, LoadBalancerScheme::InternetFacing);
                assert_eq!(security_group.as_str(), "alb-sg");
            }
            _ => panic!("expected load balancer attributes"),
        }
    }
}
