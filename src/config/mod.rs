//! Configuration system (layered: env > TOML file > defaults).

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::auth::client::{DEFAULT_DEVICE_CODE_URL, DEFAULT_REDIRECT_URI, DEFAULT_TOKEN_URL};
use crate::auth::{AuthMode, PollOptions, TokenStoreConfig, UnknownErrorPolicy};
use crate::billing::fetcher::DEFAULT_API_BASE_URL;
use crate::billing::{DayOrder, WindowPolicy};
use crate::error::BillingError;
use crate::util::retry::RetryPolicy;

pub const DEFAULT_TABLE: &str = "billing_entries";

/// Environment variables read by [`ExtractorConfig::apply_env_overrides`].
pub const ENV_VARS: [&str; 8] = [
    "ALLEGRO_CLIENT_ID",
    "ALLEGRO_CLIENT_SECRET",
    "ALLEGRO_ENTRY_TYPES",
    "ALLEGRO_DAILY_LOAD",
    "ALLEGRO_MANUAL_AUTH",
    "ALLEGRO_BACKFILL_DAYS",
    "ALLEGRO_STATE_DIR",
    "ALLEGRO_OUTPUT_DIR",
];

/// Everything a run needs to know.
///
/// # Example
/// ```
/// use allegro_billing::config::ExtractorConfig;
///
/// let config = ExtractorConfig::from_toml_str(r#"
///     client_id = "id"
///     client_secret = "secret"
///     entry_types = ["SUC", "LIS"]
///     daily_load = true
/// "#).unwrap();
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractorConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Billing type ids to include; empty means all types.
    pub entry_types: Vec<String>,
    /// Fetch yesterday only instead of a backfill.
    pub daily_load: bool,
    pub backfill_start: Option<NaiveDate>,
    /// Takes precedence over `backfill_start`.
    pub backfill_days: Option<u32>,
    pub manual_auth: bool,
    pub refresh_fallback_to_device: bool,
    pub profile: String,
    pub day_order: DayOrder,
    pub endpoints: EndpointConfig,
    pub http: HttpConfig,
    pub device_flow: DeviceFlowConfig,
    pub paths: PathConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EndpointConfig {
    pub device_code_url: String,
    pub token_url: String,
    pub api_base_url: String,
    pub redirect_uri: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
    pub request_timeout_secs: u64,
    pub retry_max_attempts: u32,
    pub retry_initial_backoff_ms: u64,
    pub retry_max_backoff_ms: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeviceFlowConfig {
    pub max_attempts: Option<u32>,
    pub max_wait_secs: Option<u64>,
    pub unknown_error: UnknownErrorPolicy,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathConfig {
    pub state_dir: PathBuf,
    pub output_dir: PathBuf,
    pub table: String,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            entry_types: Vec::new(),
            daily_load: false,
            backfill_start: None,
            backfill_days: None,
            manual_auth: false,
            refresh_fallback_to_device: false,
            profile: "default".to_string(),
            day_order: DayOrder::default(),
            endpoints: EndpointConfig::default(),
            http: HttpConfig::default(),
            device_flow: DeviceFlowConfig::default(),
            paths: PathConfig::default(),
        }
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            device_code_url: DEFAULT_DEVICE_CODE_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            request_timeout_secs: 30,
            retry_max_attempts: retry.max_attempts,
            retry_initial_backoff_ms: retry.initial_backoff.as_millis() as u64,
            retry_max_backoff_ms: retry.max_backoff.as_millis() as u64,
        }
    }
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            state_dir: TokenStoreConfig::default_dir(),
            output_dir: PathBuf::from("out/tables"),
            table: DEFAULT_TABLE.to_string(),
        }
    }
}

impl fmt::Debug for ExtractorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractorConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .field("entry_types", &self.entry_types)
            .field("daily_load", &self.daily_load)
            .field("backfill_start", &self.backfill_start)
            .field("backfill_days", &self.backfill_days)
            .field("manual_auth", &self.manual_auth)
            .field("refresh_fallback_to_device", &self.refresh_fallback_to_device)
            .field("profile", &self.profile)
            .field("day_order", &self.day_order)
            .field("endpoints", &self.endpoints)
            .field("http", &self.http)
            .field("device_flow", &self.device_flow)
            .field("paths", &self.paths)
            .finish()
    }
}

impl ExtractorConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, BillingError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, BillingError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            BillingError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Load the file (if any), then `.env` and process environment overrides,
    /// then validate.
    pub fn load(path: Option<&Path>) -> Result<Self, BillingError> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from `lookup` (normally the process environment).
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), BillingError> {
        if let Some(value) = lookup("ALLEGRO_CLIENT_ID") {
            self.client_id = value;
        }
        if let Some(value) = lookup("ALLEGRO_CLIENT_SECRET") {
            self.client_secret = value;
        }
        if let Some(value) = lookup("ALLEGRO_ENTRY_TYPES") {
            self.entry_types = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(value) = lookup("ALLEGRO_DAILY_LOAD") {
            self.daily_load = parse_flag("ALLEGRO_DAILY_LOAD", &value)?;
        }
        if let Some(value) = lookup("ALLEGRO_MANUAL_AUTH") {
            self.manual_auth = parse_flag("ALLEGRO_MANUAL_AUTH", &value)?;
        }
        if let Some(value) = lookup("ALLEGRO_BACKFILL_DAYS") {
            let days = value.trim().parse::<u32>().map_err(|e| {
                BillingError::Configuration(format!("ALLEGRO_BACKFILL_DAYS: {e}"))
            })?;
            self.backfill_days = Some(days);
        }
        if let Some(value) = lookup("ALLEGRO_STATE_DIR") {
            self.paths.state_dir = PathBuf::from(value);
        }
        if let Some(value) = lookup("ALLEGRO_OUTPUT_DIR") {
            self.paths.output_dir = PathBuf::from(value);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), BillingError> {
        if self.client_id.trim().is_empty() {
            return Err(BillingError::Configuration("client_id is required".into()));
        }
        if self.client_secret.trim().is_empty() {
            return Err(BillingError::Configuration(
                "client_secret is required".into(),
            ));
        }
        if self.backfill_days == Some(0) {
            return Err(BillingError::Configuration(
                "backfill_days must be at least 1".into(),
            ));
        }
        if self.http.request_timeout_secs == 0 {
            return Err(BillingError::Configuration(
                "http.request_timeout_secs must be positive".into(),
            ));
        }
        if self.device_flow.max_attempts == Some(0) {
            return Err(BillingError::Configuration(
                "device_flow.max_attempts must be at least 1".into(),
            ));
        }
        if self.paths.table.trim().is_empty() {
            return Err(BillingError::Configuration("paths.table is required".into()));
        }
        Ok(())
    }

    pub fn auth_mode(&self) -> AuthMode {
        AuthMode::from_manual_flag(self.manual_auth)
    }

    pub fn window_policy(&self) -> WindowPolicy {
        if self.daily_load {
            return WindowPolicy::DailyIncremental;
        }
        if let Some(days) = self.backfill_days {
            return WindowPolicy::LastDays(days);
        }
        match self.backfill_start {
            Some(since) => WindowPolicy::FullBackfill { since },
            None => WindowPolicy::full_backfill(),
        }
    }

    pub fn entry_type_filter(&self) -> BTreeSet<String> {
        self.entry_types.iter().cloned().collect()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.http.request_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.http.retry_max_attempts.max(1),
            initial_backoff: Duration::from_millis(self.http.retry_initial_backoff_ms),
            max_backoff: Duration::from_millis(self.http.retry_max_backoff_ms),
            ..RetryPolicy::default()
        }
    }

    pub fn poll_options(&self) -> PollOptions {
        PollOptions::builder()
            .maybe_max_attempts(self.device_flow.max_attempts)
            .maybe_max_wait(self.device_flow.max_wait_secs.map(Duration::from_secs))
            .unknown_error(self.device_flow.unknown_error)
            .retry(self.retry_policy())
            .build()
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, BillingError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(BillingError::Configuration(format!(
            "{key}: expected a boolean, got {other:?}"
        ))),
    }
}
