//! Synth command - Build, validate and order a stack.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use netstack_core::{StackConfig, Synthesis, Synthesizer};
use netstack_engine::{hand_off, PlanFileEngine, PlanFormat};

#[derive(Args)]
pub struct SynthArgs {
    /// Stack configuration (YAML, JSON or TOML)
    #[arg(short, long, env = "NETSTACK_CONFIG")]
    config: PathBuf,

    /// Write the plan to this file
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Plan format; inferred from the output extension when omitted
    #[arg(short, long)]
    format: Option<PlanFormat>,
}

pub async fn execute(args: SynthArgs) -> Result<()> {
    info!("Synthesizing stack from {}", args.config.display());

    let config = StackConfig::from_file(&args.config)
        .with_context(|| format!("Failed to load configuration {}", args.config.display()))?;
    let synthesis = Synthesizer::new(config).synthesize()?;

    print_plan(&synthesis);

    if let Some(out) = args.out {
        let engine = match args.format {
            Some(format) => PlanFileEngine::new(out, format),
            None => PlanFileEngine::for_path(out)?,
        };
        let report = hand_off(&engine, &synthesis).await?;
        println!();
        println!("✅ Plan with {} step(s) written to {}", report.len(), engine.path().display());
    }

    Ok(())
}

fn print_plan(synthesis: &Synthesis) {
    let plan = synthesis.plan();

    println!("📦 Resources:");
    for (kind, count) in plan.summary() {
        println!("   {:<20} {}", kind, count);
    }

    println!();
    println!("📋 Creation order:");
    for (index, node) in plan.steps().iter().enumerate() {
        println!("   {:>3}. {:<20} {}", index + 1, node.kind(), node.name());
    }
}
