use std::sync::Arc;
use std::time::Duration;

use bon::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::client::{OAuthContext, DEVICE_CODE_GRANT};
use super::error::AuthError;
use super::token::{parse_error_code, Credential, TokenResponse};
use crate::util::pause::{Pause, TokioPause};
use crate::util::retry::RetryPolicy;

const DEFAULT_INTERVAL_SECS: u64 = 5;
const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Device-authorization grant returned by the device-code endpoint.
///
/// # Example
/// ```
/// use allegro_billing::auth::DeviceGrant;
///
/// let grant = DeviceGrant {
///     device_code: "dev-123".to_string(),
///     verification_uri_complete: "https://allegro.pl/skojarz-aplikacje?code=ABC".to_string(),
///     interval: 5,
///     user_code: None,
///     expires_in: None,
/// };
/// assert_eq!(grant.interval, 5);
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceGrant {
    pub device_code: String,
    pub verification_uri_complete: String,
    #[serde(
        default = "default_interval",
        deserialize_with = "deserialize_interval"
    )]
    pub interval: u64,
    #[serde(default)]
    pub user_code: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Outcome of a single device-code poll.
#[derive(Debug, Clone)]
pub enum DeviceCodePoll {
    Authorized { credential: Credential },
    Pending,
    SlowDown,
    Denied,
    Unrecognized { code: String },
}

/// What to do when the token endpoint answers with an error code that is
/// neither `authorization_pending`, `slow_down` nor `access_denied`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UnknownErrorPolicy {
    /// Keep polling at the current interval.
    #[default]
    Continue,
    /// Stop with [`AuthError::UnexpectedPollError`].
    Fail,
}

/// Bounds and policies for the device-code polling loop.
///
/// The default waits indefinitely, like an operator who never gives up.
#[derive(Debug, Clone, Default, Builder)]
pub struct PollOptions {
    pub max_attempts: Option<u32>,
    pub max_wait: Option<Duration>,
    #[builder(default)]
    pub unknown_error: UnknownErrorPolicy,
    /// Retry applied to each individual request, not to the loop.
    #[builder(default)]
    pub retry: RetryPolicy,
}

/// Client for the OAuth device-authorization handshake.
pub struct DeviceAuthClient {
    ctx: OAuthContext,
    pause: Arc<dyn Pause>,
    options: PollOptions,
}

impl DeviceAuthClient {
    pub fn new(ctx: OAuthContext) -> Self {
        Self {
            ctx,
            pause: Arc::new(TokioPause),
            options: PollOptions::default(),
        }
    }

    pub fn with_pause(mut self, pause: Arc<dyn Pause>) -> Self {
        self.pause = pause;
        self
    }

    pub fn with_poll_options(mut self, options: PollOptions) -> Self {
        self.options = options;
        self
    }

    /// Ask the authorization server for a device code.
    pub async fn request_device_code(&self) -> Result<DeviceGrant, AuthError> {
        let ctx = &self.ctx;
        let resp = self
            .options
            .retry
            .execute(|| async move {
                let resp = ctx
                    .post_form(&ctx.device_code_url, &[("client_id", ctx.client_id.as_str())])
                    .await?;
                if resp.status().is_server_error() {
                    return Err(AuthError::Server {
                        status: resp.status().as_u16(),
                    });
                }
                Ok(resp)
            })
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AuthError::Protocol(format!(
                "Device code request failed with status {status}"
            )));
        }
        let body = resp.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| AuthError::Protocol(format!("Malformed device code response: {e}")))
    }

    /// Exchange the device code once and classify the answer.
    pub async fn poll_once(&self, device_code: &str) -> Result<DeviceCodePoll, AuthError> {
        let resp = self
            .ctx
            .post_form(
                &self.ctx.token_url,
                &[("grant_type", DEVICE_CODE_GRANT), ("device_code", device_code)],
            )
            .await?;
        let status = resp.status();
        let body = resp.text().await?;

        if status.is_server_error() {
            return Err(AuthError::Server {
                status: status.as_u16(),
            });
        }
        if status.is_client_error() {
            let code = parse_error_code(&body).ok_or_else(|| {
                AuthError::Protocol(format!(
                    "Token endpoint returned {status} without an error code"
                ))
            })?;
            return Ok(match code.as_str() {
                "authorization_pending" => DeviceCodePoll::Pending,
                "slow_down" => DeviceCodePoll::SlowDown,
                "access_denied" => DeviceCodePoll::Denied,
                _ => DeviceCodePoll::Unrecognized { code },
            });
        }
        if !status.is_success() {
            return Err(AuthError::Protocol(format!(
                "Token endpoint returned unexpected status {status}"
            )));
        }
        let payload: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| AuthError::Protocol(format!("Malformed token response: {e}")))?;
        Ok(DeviceCodePoll::Authorized {
            credential: payload.into_credential()?,
        })
    }

    /// Sleep, poll, repeat until the grant is approved or denied.
    ///
    /// The interval is at least one second and `slow_down` doubles it.
    /// Polling stops at [`PollOptions::max_wait`], or at the grant's
    /// `expires_in` when no wait is configured.
    pub async fn poll_for_token(&self, grant: &DeviceGrant) -> Result<Credential, AuthError> {
        let started = tokio::time::Instant::now();
        let mut interval = Duration::from_secs(grant.interval).max(MIN_INTERVAL);
        let max_wait = self
            .options
            .max_wait
            .or_else(|| grant.expires_in.map(Duration::from_secs));
        let mut attempts: u32 = 0;

        loop {
            if let Some(max_attempts) = self.options.max_attempts {
                if attempts >= max_attempts {
                    return Err(AuthError::PollLimitExceeded { attempts });
                }
            }
            if let Some(max_wait) = max_wait {
                if started.elapsed() + interval > max_wait {
                    return Err(AuthError::PollLimitExceeded { attempts });
                }
            }

            self.pause.pause(interval).await;
            attempts += 1;

            let poll = self
                .options
                .retry
                .execute(|| self.poll_once(&grant.device_code))
                .await?;

            match poll {
                DeviceCodePoll::Authorized { credential } => {
                    tracing::info!(attempts, "Device authorization granted");
                    return Ok(credential);
                }
                DeviceCodePoll::Pending => {
                    tracing::debug!(attempts, "Authorization pending");
                }
                DeviceCodePoll::SlowDown => {
                    interval *= 2;
                    tracing::info!(
                        interval_secs = interval.as_secs(),
                        "Server asked to slow down"
                    );
                }
                DeviceCodePoll::Denied => {
                    tracing::warn!(attempts, "Device authorization denied");
                    return Err(AuthError::Denied);
                }
                DeviceCodePoll::Unrecognized { code } => match self.options.unknown_error {
                    UnknownErrorPolicy::Continue => {
                        tracing::warn!(code = %code, "Ignoring unrecognized device flow error");
                    }
                    UnknownErrorPolicy::Fail => {
                        return Err(AuthError::UnexpectedPollError(code));
                    }
                },
            }
        }
    }
}

fn default_interval() -> u64 {
    DEFAULT_INTERVAL_SECS
}

fn deserialize_interval<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(value) => Ok(value),
        Raw::Text(text) => text
            .trim()
            .parse::<u64>()
            .map_err(|e| serde::de::Error::custom(format!("invalid interval: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grant_accepts_numeric_and_string_interval() {
        let numeric: DeviceGrant = serde_json::from_str(
            r#"{"device_code":"d","verification_uri_complete":"https://x","interval":5}"#,
        )
        .unwrap();
        let text: DeviceGrant = serde_json::from_str(
            r#"{"device_code":"d","verification_uri_complete":"https://x","interval":"7"}"#,
        )
        .unwrap();
        assert_eq!(numeric.interval, 5);
        assert_eq!(text.interval, 7);
    }

    #[test]
    fn grant_defaults_missing_interval() {
        let grant: DeviceGrant =
            serde_json::from_str(r#"{"device_code":"d","verification_uri_complete":"https://x"}"#)
                .unwrap();
        assert_eq!(grant.interval, DEFAULT_INTERVAL_SECS);
    }

    #[test]
    fn grant_without_device_code_is_rejected() {
        let parsed = serde_json::from_str::<DeviceGrant>(r#"{"interval":5}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn unknown_error_policy_parses_from_text() {
        assert_eq!(
            "fail".parse::<UnknownErrorPolicy>().unwrap(),
            UnknownErrorPolicy::Fail
        );
        assert_eq!(UnknownErrorPolicy::default().to_string(), "continue");
    }

    #[test]
    fn poll_options_builder_sets_bounds() {
        let options = PollOptions::builder()
            .max_attempts(3)
            .unknown_error(UnknownErrorPolicy::Fail)
            .build();
        assert_eq!(options.max_attempts, Some(3));
        assert!(options.max_wait.is_none());
        assert_eq!(options.unknown_error, UnknownErrorPolicy::Fail);
    }
}
