//! Engine that hands the plan off as a document on disk.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use netstack_core::ResolvedPlan;

use crate::engine::{ApplyReport, ProvisioningEngine};
use crate::error::{EngineError, EngineResult};

/// Serialization format of a written plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanFormat {
    #[default]
    Json,
    Yaml,
}

impl PlanFormat {
    /// Pick the format from a file extension.
    pub fn from_path(path: &Path) -> EngineResult<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(PlanFormat::Json),
            Some("yaml") | Some("yml") => Ok(PlanFormat::Yaml),
            other => Err(EngineError::UnsupportedFormat(other.unwrap_or("").to_string())),
        }
    }

    pub fn render(&self, plan: &ResolvedPlan) -> EngineResult<String> {
        Ok(match self {
            PlanFormat::Json => serde_json::to_string_pretty(plan)?,
            PlanFormat::Yaml => serde_yaml::to_string(plan)?,
        })
    }
}

impl std::str::FromStr for PlanFormat {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(PlanFormat::Json),
            "yaml" | "yml" => Ok(PlanFormat::Yaml),
            other => Err(EngineError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Writes the plan descriptors to a file instead of provisioning them.
pub struct PlanFileEngine {
    path: PathBuf,
    format: PlanFormat,
}

impl PlanFileEngine {
    pub fn new(path: impl Into<PathBuf>, format: PlanFormat) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }

    /// Infer the format from the file extension.
    pub fn for_path(path: impl Into<PathBuf>) -> EngineResult<Self> {
        let path = path.into();
        let format = PlanFormat::from_path(&path)?;
        Ok(Self { path, format })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> PlanFormat {
        self.format
    }
}

#[async_trait]
impl ProvisioningEngine for PlanFileEngine {
    fn name(&self) -> &str {
        "plan-file"
    }

    async fn apply(&self, plan: &ResolvedPlan) -> EngineResult<ApplyReport> {
        let content = self.format.render(plan)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, content).await?;

        info!("Wrote {} step(s) to {}", plan.len(), self.path.display());
        Ok(ApplyReport::for_plan(self.name(), plan))
    }
}
