//! Validate command - Report every invariant violation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use netstack_core::{
    DependencyResolver, GraphValidator, ResolvedPlan, StackConfig, StackError, Synthesizer, ValidationReport,
};

#[derive(Args)]
#[command(group(clap::ArgGroup::new("input").required(true).args(["config", "plan"])))]
pub struct ValidateArgs {
    /// Stack configuration to build and validate
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Previously written plan to re-validate
    #[arg(short, long)]
    plan: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

pub async fn execute(args: ValidateArgs) -> Result<()> {
    let report = match (&args.config, &args.plan) {
        (Some(path), _) => {
            info!("Validating configuration {}", path.display());
            let config = StackConfig::from_file(path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?;
            Synthesizer::new(config).validate()?
        }
        (None, Some(path)) => {
            info!("Validating plan {}", path.display());
            let plan = ResolvedPlan::from_file(path)
                .with_context(|| format!("Failed to load plan {}", path.display()))?;
            let order = plan.order_report();
            let graph = plan.into_graph()?;

            let mut report = GraphValidator::validate(&graph);
            report.extend(order);
            if report.is_clean() {
                DependencyResolver::resolve(&graph)?;
            }
            report
        }
        (None, None) => anyhow::bail!("Either --config or --plan is required"),
    };

    print_report(&report, args.json)?;

    if !report.is_clean() {
        return Err(StackError::Validation(report).into());
    }
    Ok(())
}

fn print_report(report: &ValidationReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    if report.is_clean() {
        println!("✅ All invariants hold");
    } else {
        println!("❌ {} violation(s):", report.len());
        for violation in &report.violations {
            println!("   - {}", violation);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use netstack_core::Invariant;
    use tempfile::tempdir;

    fn plan_args(plan: PathBuf) -> ValidateArgs {
        ValidateArgs {
            config: None,
            plan: Some(plan),
            json: false,
        }
    }

    #[tokio::test]
    async fn test_synthesized_plan_validates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plan.json");
        let synthesis = Synthesizer::new(StackConfig::default()).synthesize().unwrap();
        std::fs::write(&path, serde_json::to_string(synthesis.plan()).unwrap()).unwrap();

        assert!(execute(plan_args(path)).await.is_ok());
    }

    #[tokio::test]
    async fn test_reordered_plan_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plan.json");
        let synthesis = Synthesizer::new(StackConfig::default()).synthesize().unwrap();

        let mut json = serde_json::to_value(synthesis.plan()).unwrap();
        let steps = json["steps"].as_array_mut().unwrap();
        let vpc = steps.remove(0);
        steps.push(vpc);
        std::fs::write(&path, serde_json::to_string(&json).unwrap()).unwrap();

        let err = execute(plan_args(path)).await.unwrap_err();
        match err.downcast_ref::<StackError>() {
            Some(StackError::Validation(report)) => {
                assert!(report.with_invariant(Invariant::PlanOrder).count() > 0);
                assert!(report.for_node("public01").count() > 0);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
