//! FaaS CLI - run demo workloads against a configured invoker topology
//!
//! - `faas run` registers a built-in action and dispatches a batch
//! - `faas topology` prints the invoker tree built from a config file
//! - `faas policies` lists the distribution policies

use clap::{Parser, Subcommand};
use faas_observability::{init_tracing, TracingConfig};
use faas_types::{FaasConfig, PolicyKind};
use std::ffi::OsString;
use std::path::PathBuf;
use tracing::debug;

mod commands;
mod error;

pub use commands::{DemoAction, OutputFormat, RunArgs};
pub use error::{CliError, CliResult};

/// FaaS CLI application
#[derive(Parser)]
#[command(name = "faas")]
#[command(about = "FaaS invocation scheduler CLI", long_about = None)]
#[command(version)]
struct Cli {
    /// Topology configuration file (TOML)
    #[arg(short, long, env = "FAAS_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text", global = true)]
    output: OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Dispatch a batch of invocations of a built-in action
    Run(RunArgs),

    /// Print the invoker tree
    Topology,

    /// List distribution policies
    Policies,
}

/// Run using the current process arguments.
pub async fn run() -> CliResult<()> {
    run_with_args(std::env::args_os()).await
}

/// Run using the provided argument iterator.
pub async fn run_with_args<I, T>(args: I) -> CliResult<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    let config = match cli.config.as_deref() {
        Some(path) => FaasConfig::load(path)?,
        None => commands::demo_config(),
    };

    let mut tracing_config = TracingConfig::from(&config.tracing);
    if cli.verbose {
        tracing_config = tracing_config.with_log_level("debug").with_thread_names();
    }
    if let Err(e) = init_tracing(&tracing_config) {
        debug!(error = %e, "Keeping existing tracing subscriber");
    }

    let report = match cli.command {
        Commands::Run(args) => commands::run(config, args, cli.output).await?,
        Commands::Topology => commands::topology(&config, cli.output)?,
        Commands::Policies => commands::policies(&PolicyKind::ALL, cli.output)?,
    };
    println!("{}", report);
    Ok(())
}
