//! lms-session CLI binary entry point.

use clap::Parser;
use lms_session::cli::{session, Cli, Commands};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match session::resolve_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(2);
        }
    };

    let result = match &cli.command {
        Commands::Login(args) => session::handle_login(&config, &args.username).await,
        Commands::Status => session::handle_status(&config).await,
        Commands::Refresh => session::handle_refresh(&config).await,
        Commands::Logout => session::handle_logout(&config).await,
        Commands::Watch => session::handle_watch(&config).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
