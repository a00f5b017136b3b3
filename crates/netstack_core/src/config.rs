//! Stack configuration.
//!
//! The input document for one synthesis run. Field names are camelCase in
//! every serialized form (YAML, JSON, TOML).

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cidr::{CidrAllocator, Ipv4Cidr};
use crate::error::{StackError, StackResult};
use crate::model::SubnetRole;

/// Upper bound on availability zones a stack may span.
pub const MAX_AZ_COUNT: u8 = 6;

/// One subnet in the layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubnetSpec {
    /// Logical name; defaults to `<role>-subnet-<n>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub role: SubnetRole,
    pub cidr_mask: u8,
}

impl SubnetSpec {
    pub fn public(cidr_mask: u8) -> Self {
        Self {
            name: None,
            role: SubnetRole::Public,
            cidr_mask,
        }
    }

    pub fn private(cidr_mask: u8) -> Self {
        Self {
            name: None,
            role: SubnetRole::Private,
            cidr_mask,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Container image source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSource {
    pub registry: String,
    pub repository: String,
    #[serde(default = "default_tag")]
    pub tag: String,
}

fn default_tag() -> String {
    "latest".to_string()
}

impl ImageSource {
    pub fn new(registry: impl Into<String>, repository: impl Into<String>) -> Self {
        Self {
            registry: registry.into(),
            repository: repository.into(),
            tag: default_tag(),
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn uri(&self) -> String {
        format!("{}/{}:{}", self.registry, self.repository, self.tag)
    }
}

impl Default for ImageSource {
    fn default() -> Self {
        Self::new("ecr", "app")
    }
}

/// Complete declarative input for one stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StackConfig {
    /// Stack name, used in cluster and task family names.
    pub name: String,
    pub cidr: Ipv4Cidr,
    pub az_count: u8,
    pub subnet_layout: Vec<SubnetSpec>,
    pub listener_port: u16,
    pub service_port: u16,
    pub image: ImageSource,
    pub container_name: String,
    pub cpu: u32,
    #[serde(rename = "memoryMiB")]
    pub memory_mib: u32,
    pub desired_count: u32,
    pub health_check_path: String,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            name: "app".to_string(),
            cidr: Ipv4Cidr::new(std::net::Ipv4Addr::new(10, 0, 0, 0), 16)
                .unwrap_or_else(|_| Ipv4Cidr::any()),
            az_count: 2,
            subnet_layout: vec![
                SubnetSpec::public(24).named("Public01"),
                SubnetSpec::public(24).named("Public02"),
                SubnetSpec::private(24).named("Private01"),
                SubnetSpec::private(24).named("Private02"),
            ],
            listener_port: 80,
            service_port: 8000,
            image: ImageSource::default(),
            container_name: "app".to_string(),
            cpu: 256,
            memory_mib: 512,
            desired_count: 1,
            health_check_path: "/".to_string(),
        }
    }
}

impl StackConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_cidr(mut self, cidr: Ipv4Cidr) -> Self {
        self.cidr = cidr;
        self
    }

    pub fn with_az_count(mut self, az_count: u8) -> Self {
        self.az_count = az_count;
        self
    }

    pub fn with_layout(mut self, layout: Vec<SubnetSpec>) -> Self {
        self.subnet_layout = layout;
        self
    }

    pub fn with_ports(mut self, listener_port: u16, service_port: u16) -> Self {
        self.listener_port = listener_port;
        self.service_port = service_port;
        self
    }

    pub fn with_image(mut self, image: ImageSource) -> Self {
        self.image = image;
        self
    }

    pub fn with_task_size(mut self, cpu: u32, memory_mib: u32) -> Self {
        self.cpu = cpu;
        self.memory_mib = memory_mib;
        self
    }

    pub fn with_desired_count(mut self, desired_count: u32) -> Self {
        self.desired_count = desired_count;
        self
    }

    pub fn with_health_check_path(mut self, path: impl Into<String>) -> Self {
        self.health_check_path = path.into();
        self
    }

    pub fn subnets_with_role(&self, role: SubnetRole) -> impl Iterator<Item = &SubnetSpec> {
        self.subnet_layout.iter().filter(move |s| s.role == role)
    }

    /// Load configuration from a YAML, JSON or TOML file.
    pub fn from_file(path: &Path) -> StackResult<Self> {
        debug!("Loading stack configuration from {:?}", path);
        let content = fs::read_to_string(path)?;

        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&content)?,
            Some("toml") => toml::from_str(&content)?,
            _ => serde_yaml::from_str(&content)?,
        };
        Ok(config)
    }

    /// Save configuration as YAML.
    pub fn to_file(&self, path: &Path) -> StackResult<()> {
        let content = serde_yaml::to_string(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Check field ranges before any builder runs.
    pub fn validate(&self) -> StackResult<()> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push("name cannot be empty".to_string());
        }

        if self.az_count == 0 || self.az_count > MAX_AZ_COUNT {
            errors.push(format!(
                "azCount must be between 1 and {}, got {}",
                MAX_AZ_COUNT, self.az_count
            ));
        }

        let mut allocator = CidrAllocator::new(self.cidr);
        for spec in &self.subnet_layout {
            if let Err(e) = allocator.allocate(spec.cidr_mask) {
                errors.push(match e {
                    StackError::InvalidConfig(msg) => msg,
                    other => other.to_string(),
                });
                break;
            }
        }

        if self.listener_port == 0 {
            errors.push("listenerPort must be between 1 and 65535".to_string());
        }
        if self.service_port == 0 {
            errors.push("servicePort must be between 1 and 65535".to_string());
        }

        if self.desired_count == 0 {
            errors.push("desiredCount must be at least 1".to_string());
        }

        if !is_valid_fargate_size(self.cpu, self.memory_mib) {
            errors.push(format!(
                "cpu {} with memoryMiB {} is not a supported Fargate task size",
                self.cpu, self.memory_mib
            ));
        }

        if !self.health_check_path.starts_with('/') {
            errors.push(format!(
                "healthCheckPath must start with '/', got '{}'",
                self.health_check_path
            ));
        }

        if self.image.repository.trim().is_empty() {
            errors.push("image.repository cannot be empty".to_string());
        }
        if self.container_name.trim().is_empty() {
            errors.push("containerName cannot be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(StackError::InvalidConfig(errors.join("; ")))
        }
    }
}

/// Fargate CPU units / memory (MiB) combinations.
pub fn is_valid_fargate_size(cpu: u32, memory_mib: u32) -> bool {
    let gib = |n: u32| n * 1024;
    match cpu {
        256 => matches!(memory_mib, 512 | 1024 | 2048),
        512 => (gib(1)..=gib(4)).contains(&memory_mib) && memory_mib % 1024 == 0,
        1024 => (gib(2)..=gib(8)).contains(&memory_mib) && memory_mib % 1024 == 0,
        2048 => (gib(4)..=gib(16)).contains(&memory_mib) && memory_mib % 1024 == 0,
        4096 => (gib(8)..=gib(30)).contains(&memory_mib) && memory_mib % 1024 == 0,
        _ => false,
    }
}
