//! allegro-billing binary entry point.

use allegro_billing::cli::{Cli, Commands};
use allegro_billing::error::BillingError;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("allegro_billing={default_level}")));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result: Result<(), BillingError> = match cli.command {
        Commands::Run(args) => allegro_billing::cli::run::handle_run(args).await.map(|_| ()),
        Commands::Auth(args) => allegro_billing::cli::auth::handle(&args.config, args.command).await,
    };

    if let Err(e) = result {
        tracing::debug!(category = ?e.category(), "Run failed");
        eprintln!("Error: {e}");
        std::process::exit(e.exit_code());
    }
}
