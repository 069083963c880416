//! End-to-end run: credentials, fetch, normalize, write, checkpoint.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};

use crate::auth::{
    AuthMode, Credential, CredentialManager, DeviceAuthClient, FetchCheckpoint, FileTokenStore, GrantPrompt,
    OAuthContext, TokenRefresher, TokenStore, TokenStoreConfig,
};
use crate::billing::{normalize, DateWindow, PaginatedFetcher, WindowPolicy};
use crate::config::ExtractorConfig;
use crate::error::BillingError;
use crate::output::{CsvTableWriter, TableWriter};
use crate::util::pause::Pause;

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub window: DateWindow,
    pub entries: usize,
    pub output: PathBuf,
}

/// Per-run overrides layered over the configuration.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub mode: AuthMode,
    pub policy: WindowPolicy,
    pub today: NaiveDate,
}

impl RunOptions {
    pub fn from_config(config: &ExtractorConfig, today: NaiveDate) -> Self {
        Self {
            mode: config.auth_mode(),
            policy: config.window_policy(),
            today,
        }
    }
}

/// Wires the credential lifecycle to the billing fetch.
pub struct Extractor {
    profile: String,
    table: String,
    entry_types: BTreeSet<String>,
    store: Arc<dyn TokenStore>,
    credentials: CredentialManager,
    fetcher: PaginatedFetcher,
    writer: Box<dyn TableWriter>,
}

impl Extractor {
    pub fn new(
        config: &ExtractorConfig,
        store: Arc<dyn TokenStore>,
        credentials: CredentialManager,
        fetcher: PaginatedFetcher,
        writer: Box<dyn TableWriter>,
    ) -> Self {
        Self {
            profile: config.profile.clone(),
            table: config.paths.table.clone(),
            entry_types: config.entry_type_filter(),
            store,
            credentials,
            fetcher,
            writer,
        }
    }

    /// Build every collaborator from `config`.
    pub fn from_config(config: &ExtractorConfig) -> Result<Self, BillingError> {
        Self::builder(config).build()
    }

    pub fn builder(config: &ExtractorConfig) -> ExtractorBuilder<'_> {
        ExtractorBuilder {
            config,
            store: None,
            pause: None,
            prompt: None,
        }
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    pub fn credentials(&self) -> &CredentialManager {
        &self.credentials
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    /// Obtain a credential and commit it before anything else can fail.
    pub async fn authenticate(&self, mode: AuthMode) -> Result<Credential, BillingError> {
        let stored = self.store.load(&self.profile)?;
        let credential = self
            .credentials
            .obtain(stored.credential.as_ref(), mode)
            .await?;
        self.store.save_credential(&self.profile, &credential)?;
        tracing::info!(profile = %self.profile, "Credential saved");
        Ok(credential)
    }

    #[tracing::instrument(skip_all, fields(profile = %self.profile, today = %options.today))]
    pub async fn run(&self, options: RunOptions) -> Result<RunSummary, BillingError> {
        let window = options.policy.resolve(options.today)?;
        let credential = self.authenticate(options.mode).await?;

        tracing::info!(
            start = %window.start(),
            end = %window.end(),
            days = window.len_days(),
            "Fetching billing entries"
        );
        let entries = self
            .fetcher
            .fetch(&window, &credential.access_token, &self.entry_types)
            .await?;

        let rows = normalize(&entries, Utc::now());
        let output = self.writer.write(&self.table, &rows)?;

        self.store.record_fetch(
            &self.profile,
            &FetchCheckpoint {
                window_start: window.start(),
                window_end: window.end(),
                entries: rows.len(),
                completed_at: Utc::now(),
            },
        )?;

        Ok(RunSummary {
            window,
            entries: rows.len(),
            output,
        })
    }
}

/// Assembles an [`Extractor`] with optional test or UI seams.
pub struct ExtractorBuilder<'a> {
    config: &'a ExtractorConfig,
    store: Option<Arc<dyn TokenStore>>,
    pause: Option<Arc<dyn Pause>>,
    prompt: Option<GrantPrompt>,
}

impl ExtractorBuilder<'_> {
    pub fn store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn pause(mut self, pause: Arc<dyn Pause>) -> Self {
        self.pause = Some(pause);
        self
    }

    pub fn prompt(mut self, prompt: GrantPrompt) -> Self {
        self.prompt = Some(prompt);
        self
    }

    pub fn build(self) -> Result<Extractor, BillingError> {
        let config = self.config;
        let ctx = OAuthContext::new(
            config.client_id.clone(),
            config.client_secret.clone(),
            config.request_timeout(),
        )?
        .with_device_code_url(config.endpoints.device_code_url.clone())
        .with_token_url(config.endpoints.token_url.clone())
        .with_redirect_uri(config.endpoints.redirect_uri.clone());

        let mut device =
            DeviceAuthClient::new(ctx.clone()).with_poll_options(config.poll_options());
        if let Some(pause) = self.pause {
            device = device.with_pause(pause);
        }
        let mut credentials = CredentialManager::new(device, TokenRefresher::new(ctx))
            .with_fallback_to_device(config.refresh_fallback_to_device);
        if let Some(prompt) = self.prompt {
            credentials = credentials.with_prompt(prompt);
        }

        let fetcher = PaginatedFetcher::new(config.request_timeout())?
            .with_base_url(config.endpoints.api_base_url.clone())
            .with_retry(config.retry_policy())
            .with_day_order(config.day_order);

        let store = self.store.unwrap_or_else(|| {
            Arc::new(FileTokenStore::new(TokenStoreConfig::new(
                config.paths.state_dir.clone(),
            )))
        });
        let writer = Box::new(CsvTableWriter::new(config.paths.output_dir.clone()));

        Ok(Extractor::new(config, store, credentials, fetcher, writer))
    }
}
