//! Reqgraph CLI entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "reqgraph")]
#[command(about = "Requirement diagram engine with undoable edits", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay an operation script (YAML or JSON) and print the final state
    Run {
        /// Script file; `.yaml`/`.yml` are read as YAML, anything else as JSON
        script: PathBuf,

        /// Write the final diagram state here instead of stdout
        #[arg(long)]
        state_out: Option<PathBuf>,

        /// Engine config (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Start from a saved diagram state instead of an empty one
        #[arg(long)]
        state_in: Option<PathBuf>,
    },
    /// Load a saved diagram state and report what it needed repaired
    Check {
        state: PathBuf,
    },
    /// Show version
    Version,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays machine readable
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "reqgraph={log_level},reqgraph_core={log_level}"
        )))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Run {
            script,
            state_out,
            config,
            state_in,
        } => commands::run(&script, config.as_deref(), state_in.as_deref(), state_out.as_deref()),
        Commands::Check { state } => commands::check(&state),
        Commands::Version => {
            println!("reqgraph v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
