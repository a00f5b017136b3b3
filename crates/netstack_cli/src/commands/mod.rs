//! CLI command definitions.

use clap::{Parser, Subcommand};

pub mod init;
pub mod synth;
pub mod validate;

/// netstack - dependency-ordered VPC, load balancer and container service stacks
#[derive(Parser)]
#[command(name = "netstack")]
#[command(version, about = "netstack - dependency-ordered network and service stacks")]
#[command(long_about = r#"
netstack declares a VPC, its subnets and gateways, the security groups in
front of a load-balanced container service, and the service itself as a
typed resource graph. The graph is validated and ordered into a creation
plan for a provisioning engine.

COMMANDS:
  synth     → Build, validate and order a stack from a configuration file
  validate  → Report every invariant violation of a configuration or plan
  init      → Write the default configuration

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Validation failure
  4 - Construction failure
  5 - Dependency cycle
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Synthesize the creation plan for a stack
    Synth(synth::SynthArgs),

    /// Validate a stack configuration or a written plan
    Validate(validate::ValidateArgs),

    /// Write the default stack configuration
    Init(init::InitArgs),
}
