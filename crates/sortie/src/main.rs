//! Sortie - autonomous mission runner

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{init_command, run_command, state_command, supervise_command, thoughts_command};
use sortie_config::ProviderKind;

/// Sortie - give it a mission, it works until a proof command passes
#[derive(Parser)]
#[command(name = "sortie")]
#[command(about = "◆ Autonomous mission runner with self-correcting shell execution")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of ~/.sortie/config.json
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one mission to a terminal state
    Run(MissionArgs),
    /// Run a mission under review, retrying with the reviewer's feedback
    Supervise {
        #[command(flatten)]
        mission: MissionArgs,
        /// Maximum attempts
        #[arg(long)]
        retries: Option<u32>,
    },
    /// Initialize config
    Init,
    /// Print the state manifest
    State {
        /// Manifest file
        #[arg(long)]
        state: Option<PathBuf>,
    },
    /// Print the most recent thoughts
    Thoughts {
        /// Number of lines
        #[arg(short = 'n', long, default_value_t = 20)]
        lines: usize,
        /// Thought log file
        #[arg(long)]
        log: Option<PathBuf>,
    },
}

/// Options shared by `run` and `supervise`
#[derive(Args, Debug, Clone)]
pub struct MissionArgs {
    /// Mission text, or a path to a file containing it
    pub mission: String,
    /// Model identifier
    #[arg(short, long)]
    pub model: Option<String>,
    /// Persona file for the decision source
    #[arg(short, long)]
    pub persona: Option<PathBuf>,
    /// Backend: gemini, openai or openrouter
    #[arg(long)]
    pub provider: Option<ProviderKind>,
    /// Iteration ceiling
    #[arg(long)]
    pub max_iterations: Option<u32>,
    /// State manifest file
    #[arg(long)]
    pub state: Option<PathBuf>,
    /// Thought log file
    #[arg(long)]
    pub log: Option<PathBuf>,
    /// Directory commands run in and discovery searches
    #[arg(short = 'C', long)]
    pub workdir: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config;
    let result = match cli.command {
        Commands::Run(args) => run_command(args, config).await,
        Commands::Supervise { mission, retries } => {
            supervise_command(mission, retries, config).await
        }
        Commands::Init => init_command().await.map(|_| 0),
        Commands::State { state } => state_command(state, config).await.map(|_| 0),
        Commands::Thoughts { lines, log } => thoughts_command(lines, log, config).await.map(|_| 0),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    }
}
