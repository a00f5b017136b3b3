//! netstack CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Validation failure
//! - 4: Construction failure
//! - 5: Dependency cycle

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use netstack_core::{ErrorKind, StackError};
use netstack_engine::EngineError;

mod commands;

use commands::{Cli, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const VALIDATION_FAILURE: u8 = 3;
    pub const CONSTRUCTION_FAILURE: u8 = 4;
    pub const CYCLE: u8 = 5;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        "netstack=debug"
    } else if cli.quiet {
        "netstack=warn"
    } else {
        "netstack=info"
    };
    let mut filter = EnvFilter::from_default_env();
    for directive in [level, "warn"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    let log_result = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    if log_result.is_err() {
        // Logging already initialized, continue
    }

    let result = match cli.command {
        Commands::Synth(args) => commands::synth::execute(args).await,
        Commands::Validate(args) => commands::validate::execute(args).await,
        Commands::Init(args) => commands::init::execute(args).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(categorize_error(&e))
        }
    }
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    if let Some(stack) = e.downcast_ref::<StackError>() {
        return match stack.kind() {
            ErrorKind::Invariant => ExitCodes::VALIDATION_FAILURE,
            ErrorKind::Construction => ExitCodes::CONSTRUCTION_FAILURE,
            ErrorKind::Cycle => ExitCodes::CYCLE,
            ErrorKind::Io => ExitCodes::GENERAL_ERROR,
        };
    }

    match e.downcast_ref::<EngineError>() {
        Some(EngineError::UnsupportedFormat(_)) => ExitCodes::INVALID_ARGS,
        _ => ExitCodes::GENERAL_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netstack_core::ValidationReport;

    #[test]
    fn test_stack_errors_map_to_exit_codes() {
        let validation = anyhow::Error::new(StackError::Validation(ValidationReport::new()));
        assert_eq!(categorize_error(&validation), ExitCodes::VALIDATION_FAILURE);

        let cycle = anyhow::Error::new(StackError::Cycle(vec!["a".to_string()]));
        assert_eq!(categorize_error(&cycle), ExitCodes::CYCLE);

        let config = anyhow::Error::new(StackError::InvalidConfig("bad".to_string()));
        assert_eq!(categorize_error(&config), ExitCodes::CONSTRUCTION_FAILURE);
    }

    #[test]
    fn test_context_keeps_exit_code() {
        let err = anyhow::Error::new(StackError::Cycle(Vec::new())).context("Failed to resolve plan");
        assert_eq!(categorize_error(&err), ExitCodes::CYCLE);
    }

    #[test]
    fn test_other_errors() {
        let format = anyhow::Error::new(EngineError::UnsupportedFormat("xml".to_string()));
        assert_eq!(categorize_error(&format), ExitCodes::INVALID_ARGS);
        assert_eq!(categorize_error(&anyhow::anyhow!("boom")), ExitCodes::GENERAL_ERROR);
    }
}
