use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::device_code::{DeviceAuthClient, DeviceGrant};
use super::error::AuthError;
use super::refresh::TokenRefresher;
use super::token::Credential;

/// Callback invoked with a fresh grant so the operator can open the URL.
pub type GrantPrompt = Arc<dyn Fn(&DeviceGrant) + Send + Sync>;

/// How a run acquires its credential.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AuthMode {
    /// Refresh when a refresh token is stored, device flow otherwise.
    #[default]
    Auto,
    /// Always run the device flow.
    Manual,
}

impl AuthMode {
    pub fn from_manual_flag(manual: bool) -> Self {
        if manual {
            Self::Manual
        } else {
            Self::Auto
        }
    }
}

/// Chooses between the device flow and a refresh exchange and hands back a
/// single usable credential.
pub struct CredentialManager {
    device: DeviceAuthClient,
    refresher: TokenRefresher,
    fallback_to_device: bool,
    prompt: Option<GrantPrompt>,
}

impl CredentialManager {
    pub fn new(device: DeviceAuthClient, refresher: TokenRefresher) -> Self {
        Self {
            device,
            refresher,
            fallback_to_device: false,
            prompt: None,
        }
    }

    /// Run the device flow when the server rejects the stored refresh token.
    ///
    /// Off by default: a rejected refresh ends the run.
    pub fn with_fallback_to_device(mut self, enabled: bool) -> Self {
        self.fallback_to_device = enabled;
        self
    }

    pub fn with_prompt(mut self, prompt: GrantPrompt) -> Self {
        self.prompt = Some(prompt);
        self
    }

    pub async fn obtain(
        &self,
        stored: Option<&Credential>,
        mode: AuthMode,
    ) -> Result<Credential, AuthError> {
        let refresh_token = stored.and_then(Credential::usable_refresh_token);
        match (mode, refresh_token) {
            (AuthMode::Manual, _) => {
                tracing::info!("Manual authorization requested");
                self.authorize_device().await
            }
            (AuthMode::Auto, None) => {
                tracing::info!("No stored refresh token, starting device authorization");
                self.authorize_device().await
            }
            (AuthMode::Auto, Some(token)) => match self.refresher.refresh(token).await {
                Ok(credential) => Ok(credential),
                Err(err @ AuthError::RefreshRejected { .. }) if self.fallback_to_device => {
                    tracing::warn!(error = %err, "Falling back to device authorization");
                    self.authorize_device().await
                }
                Err(err) => Err(err),
            },
        }
    }

    /// Request a device code, surface the verification URL, then poll.
    pub async fn authorize_device(&self) -> Result<Credential, AuthError> {
        let grant = self.device.request_device_code().await?;
        tracing::info!(
            url = %grant.verification_uri_complete,
            interval_secs = grant.interval,
            "Open this address in a browser to authorize the application"
        );
        if let Some(prompt) = &self.prompt {
            prompt(&grant);
        }
        self.device.poll_for_token(&grant).await
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<Credential, AuthError> {
        self.refresher.refresh(refresh_token).await
    }
}
