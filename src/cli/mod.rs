//! CLI entry point for the extractor.

pub mod auth;
pub mod run;

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::auth::DeviceGrant;
use crate::config::ExtractorConfig;
use crate::error::BillingError;

/// Allegro billing extractor
#[derive(Parser, Debug)]
#[command(
    name = "allegro-billing",
    version,
    about = "Incremental Allegro billing-entry extractor"
)]
pub struct Cli {
    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Authenticate, fetch billing entries and write the output table
    Run(RunArgs),
    /// Credential management
    Auth(AuthArgs),
}

/// Options shared by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "ALLEGRO_CONFIG")]
    pub config: Option<PathBuf>,

    /// State profile (one stored credential per profile)
    #[arg(long)]
    pub profile: Option<String>,
}

impl ConfigArgs {
    /// Load the configuration file and environment, applying `--profile`.
    pub fn load(&self) -> Result<ExtractorConfig, BillingError> {
        let mut config = ExtractorConfig::load(self.config.as_deref())?;
        if let Some(profile) = &self.profile {
            config.profile = profile.clone();
        }
        Ok(config)
    }
}

/// Print the verification URL for the operator.
pub fn print_grant(grant: &DeviceGrant) {
    eprintln!("🔗 Open: {}", grant.verification_uri_complete);
    if let Some(code) = &grant.user_code {
        eprintln!("📋 Code: {code}");
    }
    eprintln!("⏳ Waiting for authorization...");
}

/// Arguments for `allegro-billing run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Run the device authorization flow even if a refresh token is stored
    #[arg(long)]
    pub manual_auth: bool,

    /// Fetch yesterday only
    #[arg(long, conflicts_with_all = ["from", "to"])]
    pub daily: bool,

    /// First day to fetch (YYYY-MM-DD)
    #[arg(long, requires = "to")]
    pub from: Option<NaiveDate>,

    /// Last day to fetch (YYYY-MM-DD)
    #[arg(long, requires = "from")]
    pub to: Option<NaiveDate>,
}

/// Arguments for the `auth` subcommand group.
#[derive(Args, Debug)]
pub struct AuthArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(subcommand)]
    pub command: AuthCommands,
}

/// Auth subcommands.
#[derive(Subcommand, Debug)]
pub enum AuthCommands {
    /// Run the device authorization flow and store the credential
    Login,
    /// Exchange the stored refresh token for a new credential
    Refresh,
    /// Show stored credential and last fetch
    Status,
    /// Remove stored state
    Logout,
}
