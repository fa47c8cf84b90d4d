use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

mod commands;

#[derive(Parser)]
#[command(
    name = "driverobot",
    about = "Drive robot — inspect webhook subscription and token cache state",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Path to robot.toml
    #[arg(short, long, default_value = "robot.toml", global = true)]
    config: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text", global = true)]
    format: Format,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Format {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// List every persisted subscription record
    Subscriptions,
    /// Show the subscription record for one user
    Show {
        #[arg(short, long)]
        user: String,
    },
    /// Show a user's cached token resources and last write time (no secrets)
    TokenCache {
        #[arg(short, long)]
        user: String,
    },
    /// Validate the configuration file
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn,driverobot=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = driverobot_core::RobotConfig::from_file(&cli.config)?;

    match cli.command {
        Commands::CheckConfig => commands::config::check(&cli.config, &config, cli.format),
        Commands::Subscriptions => commands::state::subscriptions(&config, cli.format).await,
        Commands::Show { user } => commands::state::show(&config, &user, cli.format).await,
        Commands::TokenCache { user } => {
            commands::state::token_cache(&config, &user, cli.format).await
        }
    }
}
