//! Init command - Write the default configuration.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use netstack_core::StackConfig;

#[derive(Args)]
pub struct InitArgs {
    /// Where to write the configuration
    #[arg(short, long, default_value = "netstack.yaml")]
    out: PathBuf,

    /// Stack name
    #[arg(short, long)]
    name: Option<String>,

    /// Overwrite an existing file
    #[arg(short, long)]
    force: bool,
}

pub async fn execute(args: InitArgs) -> Result<()> {
    if args.out.exists() && !args.force {
        anyhow::bail!(
            "{} already exists. Use --force to overwrite.",
            args.out.display()
        );
    }

    let config = match args.name {
        Some(name) => StackConfig::new(name),
        None => StackConfig::default(),
    };

    info!("Writing default configuration for '{}'", config.name);
    config
        .to_file(&args.out)
        .with_context(|| format!("Failed to write {}", args.out.display()))?;

    println!("✅ Configuration written to {}", args.out.display());
    println!();
    println!("Next steps:");
    println!("  netstack synth --config {} --out plan.json", args.out.display());

    Ok(())
}
