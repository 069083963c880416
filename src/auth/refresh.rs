use super::client::OAuthContext;
use super::error::AuthError;
use super::token::{parse_error_code, Credential, TokenResponse};

/// Exchanges a refresh token for a new credential pair.
///
/// The server rotates refresh tokens, so a refresh token must not be used
/// again after one successful exchange. Requests are never retried for the
/// same reason.
#[derive(Debug, Clone)]
pub struct TokenRefresher {
    ctx: OAuthContext,
}

impl TokenRefresher {
    pub fn new(ctx: OAuthContext) -> Self {
        Self { ctx }
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<Credential, AuthError> {
        let resp = self
            .ctx
            .post_form(
                &self.ctx.token_url,
                &[
                    ("grant_type", "refresh_token"),
                    ("refresh_token", refresh_token),
                    ("redirect_uri", self.ctx.redirect_uri.as_str()),
                ],
            )
            .await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            let code = parse_error_code(&body);
            tracing::warn!(
                status = status.as_u16(),
                code = code.as_deref().unwrap_or("unknown"),
                "Refresh token rejected"
            );
            return Err(AuthError::RefreshRejected {
                status: status.as_u16(),
                code,
            });
        }

        let payload: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| AuthError::Protocol(format!("Malformed refresh response: {e}")))?;
        let credential = payload.into_credential()?;
        tracing::info!("Access token refreshed");
        Ok(credential)
    }
}
