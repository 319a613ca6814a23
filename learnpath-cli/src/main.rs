use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use learnpath_observe::init_tracing;

mod commands;
mod config;

use config::ConfigLoader;

#[derive(Parser)]
#[command(name = "learnpath", about = "Grounded learning plans and quizzes")]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage configuration
    Config(commands::config::ConfigArgs),
    /// Load skills, prerequisites and resources into the database
    Seed(commands::seed::SeedArgs),
    /// Run the gateway or one of the services
    Serve(commands::serve::ServeArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ConfigLoader::load()?;

    let service = match &cli.command {
        Commands::Serve(args) => args.role.service_name(),
        _ => "learnpath-cli",
    };
    let mut logging = config.logging.clone().for_service(service);
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    let _guard = init_tracing(logging).context("failed to initialise logging")?;

    match cli.command {
        Commands::Config(args) => commands::config::run(args, &config),
        Commands::Seed(args) => commands::seed::run(args, &config).await,
        Commands::Serve(args) => commands::serve::run(args, config).await,
    }
}
