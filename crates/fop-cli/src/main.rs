mod cmd;
mod output;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "fop",
    about = "Field-of-play engine for weightlifting competitions",
    version,
    propagate_version = true
)]
struct Cli {
    /// Competition config file (defaults apply when omitted)
    #[arg(long, global = true, env = "FOP_CONFIG")]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one engine per platform behind the HTTP surface
    Serve {
        /// Roster YAML file; updated as lifts are recorded
        #[arg(long, env = "FOP_ROSTER")]
        roster: PathBuf,
        /// Port to listen on
        #[arg(long, default_value = "8080")]
        port: u16,
    },

    /// Print the lifting order of a group
    Order {
        /// Roster YAML file
        #[arg(long, env = "FOP_ROSTER")]
        roster: PathBuf,
        /// Group name
        #[arg(long)]
        group: String,
    },

    /// Create or validate the competition config
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Serve { roster, port } => cmd::serve::run(config, &roster, port),
        Commands::Order { roster, group } => cmd::order::run(config, &roster, &group, cli.json),
        Commands::Config { subcommand } => cmd::config::run(config, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
