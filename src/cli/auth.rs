//! CLI auth command handlers for login, refresh, status, and logout.

use std::sync::Arc;

use super::{print_grant, AuthCommands, ConfigArgs};
use crate::auth::{AuthError, AuthMode, FileTokenStore, TokenStore, TokenStoreConfig};
use crate::config::ExtractorConfig;
use crate::error::BillingError;
use crate::extractor::Extractor;
use crate::util::lock::RunLock;

/// Dispatch an `allegro-billing auth` subcommand.
pub async fn handle(config_args: &ConfigArgs, command: AuthCommands) -> Result<(), BillingError> {
    match command {
        AuthCommands::Login => handle_login(&config_args.load()?).await,
        AuthCommands::Refresh => handle_refresh(&config_args.load()?).await,
        AuthCommands::Status => handle_status(&state_only_config(config_args)?),
        AuthCommands::Logout => handle_logout(&state_only_config(config_args)?),
    }
}

/// Handle `allegro-billing auth login`.
pub async fn handle_login(config: &ExtractorConfig) -> Result<(), BillingError> {
    let _lock = RunLock::acquire(&config.paths.state_dir, &config.profile)?;
    let extractor = Extractor::builder(config)
        .prompt(Arc::new(print_grant))
        .build()?;
    extractor.authenticate(AuthMode::Manual).await?;
    println!("✅ Authorized profile '{}'", config.profile);
    Ok(())
}

/// Handle `allegro-billing auth refresh`.
pub async fn handle_refresh(config: &ExtractorConfig) -> Result<(), BillingError> {
    let _lock = RunLock::acquire(&config.paths.state_dir, &config.profile)?;
    let extractor = Extractor::from_config(config)?;
    let stored = extractor.store().load(extractor.profile())?;
    let refresh_token = stored
        .credential
        .as_ref()
        .and_then(|c| c.usable_refresh_token())
        .ok_or_else(|| {
            AuthError::UnusableCredential(
                "no stored refresh token, run `allegro-billing auth login`".to_string(),
            )
        })?;
    let credential = extractor.credentials().refresh(refresh_token).await?;
    extractor
        .store()
        .save_credential(extractor.profile(), &credential)?;
    println!("✅ Refreshed credential for profile '{}'", config.profile);
    Ok(())
}

/// Handle `allegro-billing auth status`.
pub fn handle_status(config: &ExtractorConfig) -> Result<(), BillingError> {
    let store = file_store(config);
    let state = store.load(&config.profile)?;

    println!("🔐 Profile '{}' ({})\n", config.profile, store.base_dir().display());
    match &state.credential {
        Some(credential) if credential.usable_refresh_token().is_some() => {
            let since = credential
                .obtained_at
                .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "unknown".to_string());
            println!("  Credential: ✅ stored (obtained {since})");
        }
        Some(_) => println!("  Credential: ⚠️  stored without refresh token"),
        None => println!("  Credential: ❌ none, next run starts device authorization"),
    }
    match &state.last_fetch {
        Some(fetch) => println!(
            "  Last fetch: {}..={} ({} entries, completed {})",
            fetch.window_start,
            fetch.window_end,
            fetch.entries,
            fetch.completed_at.format("%Y-%m-%d %H:%M")
        ),
        None => println!("  Last fetch: never"),
    }
    Ok(())
}

/// Handle `allegro-billing auth logout`.
pub fn handle_logout(config: &ExtractorConfig) -> Result<(), BillingError> {
    let _lock = RunLock::acquire(&config.paths.state_dir, &config.profile)?;
    file_store(config).clear(&config.profile)?;
    println!("✅ Cleared stored state for profile '{}'", config.profile);
    Ok(())
}

/// Status and logout only touch local state, so client credentials are optional.
fn state_only_config(args: &ConfigArgs) -> Result<ExtractorConfig, BillingError> {
    let mut config = match &args.config {
        Some(path) => ExtractorConfig::from_file(path)?,
        None => ExtractorConfig::default(),
    };
    let _ = dotenvy::dotenv();
    config.apply_env_overrides(|key| std::env::var(key).ok())?;
    if let Some(profile) = &args.profile {
        config.profile = profile.clone();
    }
    Ok(config)
}

fn file_store(config: &ExtractorConfig) -> FileTokenStore {
    FileTokenStore::new(TokenStoreConfig::new(config.paths.state_dir.clone()))
}
