use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::AuthError;

/// Bearer credential pair issued by the token endpoint.
///
/// No expiry is tracked; an access token is known to be stale only when the
/// API rejects it.
///
/// # Example
/// ```
/// use allegro_billing::auth::Credential;
///
/// let credential = Credential::new("access", "refresh");
/// assert!(credential.ensure_usable().is_ok());
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obtained_at: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            obtained_at: Some(Utc::now()),
        }
    }

    /// Refresh token, if one is present and non-blank.
    pub fn usable_refresh_token(&self) -> Option<&str> {
        let token = self.refresh_token.trim();
        (!token.is_empty()).then_some(token)
    }

    pub fn ensure_usable(&self) -> Result<(), AuthError> {
        if self.access_token.trim().is_empty() {
            return Err(AuthError::UnusableCredential(
                "access token is empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"[redacted]")
            .field("refresh_token", &"[redacted]")
            .field("obtained_at", &self.obtained_at)
            .finish()
    }
}

/// Successful token endpoint payload.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
}

impl TokenResponse {
    pub(crate) fn into_credential(self) -> Result<Credential, AuthError> {
        let credential = Credential::new(self.access_token, self.refresh_token);
        credential.ensure_usable()?;
        Ok(credential)
    }
}

/// Error payload shared by the device and token endpoints.
#[derive(Debug, Deserialize)]
pub(crate) struct OAuthErrorResponse {
    pub error: String,
}

pub(crate) fn parse_error_code(body: &str) -> Option<String> {
    serde_json::from_str::<OAuthErrorResponse>(body)
        .ok()
        .map(|payload| payload.error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_redacts_tokens() {
        let credential = Credential::new("secret-access", "secret-refresh");
        let rendered = format!("{credential:?}");
        assert!(!rendered.contains("secret-access"));
        assert!(!rendered.contains("secret-refresh"));
    }

    #[test]
    fn blank_refresh_token_is_not_usable() {
        let credential = Credential::new("access", "  ");
        assert_eq!(credential.usable_refresh_token(), None);
    }

    #[test]
    fn empty_access_token_is_rejected() {
        let response = TokenResponse {
            access_token: String::new(),
            refresh_token: "refresh".to_string(),
        };
        assert!(matches!(
            response.into_credential(),
            Err(AuthError::UnusableCredential(_))
        ));
    }

    #[test]
    fn parse_error_code_reads_error_field() {
        assert_eq!(
            parse_error_code(r#"{"error":"slow_down","error_description":"x"}"#).as_deref(),
            Some("slow_down")
        );
        assert_eq!(parse_error_code("<html>"), None);
    }
}
