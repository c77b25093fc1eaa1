//! CLI for the rox resilient operation executor.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rox_core::breaker::BreakerRegistry;
use rox_core::config;
use rox_core::executor::Executor;
use std::path::PathBuf;
use std::sync::Arc;

use commands::{run_copy, run_fetch, run_policy};

/// Top-level CLI for rox.
#[derive(Debug, Parser)]
#[command(name = "rox")]
#[command(about = "rox: run file and network operations with bounded retry and circuit breaking", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Copy a file, retrying transient failures under the file policy.
    Copy {
        /// Source file.
        src: PathBuf,
        /// Destination file (replaced atomically).
        dst: PathBuf,
    },

    /// GET a URL, retrying transient failures under the network policy.
    Fetch {
        /// HTTP/HTTPS URL.
        url: String,
        /// Write the body here instead of stdout.
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
        /// Extra request header, "Name: value". May be repeated.
        #[arg(short = 'H', long = "header", value_name = "HEADER")]
        header: Vec<String>,
    },

    /// Show the effective retry policies and breaker settings.
    Policy,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let policies = cfg.effective()?;
        let executor = Executor::new(Arc::new(BreakerRegistry::new(policies.breaker)));

        match cli.command {
            CliCommand::Copy { src, dst } => run_copy(&executor, &policies.file, &src, &dst).await?,
            CliCommand::Fetch {
                url,
                output,
                header,
            } => {
                run_fetch(&executor, &policies.network, &url, output.as_deref(), &header).await?;
            }
            CliCommand::Policy => run_policy(&policies)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
