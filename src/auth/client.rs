use std::fmt;
use std::time::Duration;

use super::error::AuthError;

pub const DEFAULT_DEVICE_CODE_URL: &str = "https://allegro.pl/auth/oauth/device";
pub const DEFAULT_TOKEN_URL: &str = "https://allegro.pl/auth/oauth/token";
pub const DEFAULT_REDIRECT_URI: &str = "www.example.com";
pub const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Immutable client identity and endpoints shared by the OAuth calls.
///
/// # Example
/// ```no_run
/// use std::time::Duration;
/// use allegro_billing::auth::OAuthContext;
///
/// let ctx = OAuthContext::new("client-id", "client-secret", Duration::from_secs(30))?
///     .with_token_url("http://localhost:9999/token");
/// # Ok::<(), allegro_billing::auth::AuthError>(())
/// ```
#[derive(Clone)]
pub struct OAuthContext {
    pub(crate) http: reqwest::Client,
    pub(crate) client_id: String,
    pub(crate) client_secret: String,
    pub(crate) device_code_url: String,
    pub(crate) token_url: String,
    pub(crate) redirect_uri: String,
}

impl OAuthContext {
    /// Build a context whose HTTP client times out after `request_timeout`
    /// and never follows redirects.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            http,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            device_code_url: DEFAULT_DEVICE_CODE_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
        })
    }

    pub fn with_device_code_url(mut self, url: impl Into<String>) -> Self {
        self.device_code_url = url.into();
        self
    }

    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = uri.into();
        self
    }

    /// POST a form to `url` with client-credential basic auth.
    pub(crate) async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
    ) -> Result<reqwest::Response, AuthError> {
        let resp = self
            .http
            .post(url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .header("Accept", "application/json")
            .form(form)
            .send()
            .await?;
        Ok(resp)
    }
}

impl fmt::Debug for OAuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthContext")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .field("device_code_url", &self.device_code_url)
            .field("token_url", &self.token_url)
            .field("redirect_uri", &self.redirect_uri)
            .finish()
    }
}
