//! # netstack_core
//!
//! Dependency-ordered resource graph for a VPC-hosted, load-balanced
//! container service.
//!
//! This crate declares every resource of the stack as a typed node with
//! named dependencies, checks the structural invariants of the finished
//! graph, and orders it into a creation plan. It performs no I/O against
//! any cloud provider; executing the plan is left to a provisioning engine.
//!
//! ## Features
//!
//! - VPC, subnet, gateway and route table layout from a small configuration
//! - Security groups encoding internet → load balancer → service
//! - Registry, cluster, task definition, load balancer and service wiring
//! - Validation that reports every violation in one pass
//! - Deterministic topological ordering with cycle detection
//!
//! ## Example
//!
//! ```rust,no_run
//! use netstack_core::{StackConfig, Synthesizer};
//!
//! let config = StackConfig::new("shop").with_ports(80, 8000);
//! let synthesis = Synthesizer::new(config).synthesize().unwrap();
//!
//! for node in synthesis.plan().steps() {
//!     println!("{} {}", node.kind(), node.name());
//! }
//! ```

pub mod cidr;
pub mod config;
pub mod error;
pub mod graph;
pub mod model;
pub mod network;
pub mod resolver;
pub mod security;
pub mod service;
pub mod synth;
pub mod validator;

pub use cidr::{CidrAllocator, Ipv4Cidr};
pub use config::{ImageSource, StackConfig, SubnetSpec};
pub use error::{ErrorKind, StackError, StackResult};
pub use graph::ResourceGraph;
pub use model::{
    Attributes, HealthCheck, IngressSource, LoadBalancerScheme, NodeRef, PortMapping, PortRange, Protocol,
    ResourceKind, ResourceNode, RouteTarget, SubnetRole,
};
pub use network::{associate_route_tables, NetworkTopology, NetworkTopologyBuilder};
pub use resolver::{DependencyResolver, ResolvedPlan};
pub use security::{SecurityPolicy, SecurityPolicyBuilder};
pub use service::{ServiceTopology, ServiceTopologyBuilder};
pub use synth::{resolve_validated, StackOutputs, Synthesis, Synthesizer};
pub use validator::{GraphValidator, Invariant, ValidationReport, Violation};
