#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use allegro_billing::auth::{
    AuthError, Credential, DeviceAuthClient, DeviceGrant, FetchCheckpoint, OAuthContext, PollOptions,
    StoredState, TokenStore,
};
use allegro_billing::util::pause::Pause;
use allegro_billing::util::retry::RetryPolicy;
use async_trait::async_trait;
use serde_json::{json, Value};
use wiremock::MockServer;

pub const CLIENT_ID: &str = "client-id";
pub const CLIENT_SECRET: &str = "client-secret";

#[derive(Default)]
pub struct InMemoryTokenStore {
    states: Mutex<HashMap<String, StoredState>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, profile: &str, credential: Credential) {
        self.states
            .lock()
            .expect("store lock poisoned")
            .entry(profile.to_string())
            .or_default()
            .credential = Some(credential);
    }

    pub fn get(&self, profile: &str) -> StoredState {
        self.states
            .lock()
            .expect("store lock poisoned")
            .get(profile)
            .cloned()
            .unwrap_or_default()
    }
}

impl TokenStore for InMemoryTokenStore {
    fn load(&self, profile: &str) -> Result<StoredState, AuthError> {
        Ok(self.get(profile))
    }

    fn save_credential(&self, profile: &str, credential: &Credential) -> Result<(), AuthError> {
        self.seed(profile, credential.clone());
        Ok(())
    }

    fn record_fetch(&self, profile: &str, checkpoint: &FetchCheckpoint) -> Result<(), AuthError> {
        self.states
            .lock()
            .expect("store lock poisoned")
            .entry(profile.to_string())
            .or_default()
            .last_fetch = Some(checkpoint.clone());
        Ok(())
    }

    fn clear(&self, profile: &str) -> Result<(), AuthError> {
        self.states
            .lock()
            .expect("store lock poisoned")
            .remove(profile);
        Ok(())
    }
}

/// Records every requested pause and returns immediately.
#[derive(Default)]
pub struct RecordingPause {
    pauses: Mutex<Vec<Duration>>,
}

impl RecordingPause {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn recorded(&self) -> Vec<Duration> {
        self.pauses.lock().expect("pause lock poisoned").clone()
    }
}

#[async_trait]
impl Pause for RecordingPause {
    async fn pause(&self, duration: Duration) {
        self.pauses
            .lock()
            .expect("pause lock poisoned")
            .push(duration);
    }
}

pub fn oauth_context(server: &MockServer) -> OAuthContext {
    OAuthContext::new(CLIENT_ID, CLIENT_SECRET, Duration::from_secs(5))
        .expect("build oauth context")
        .with_device_code_url(format!("{}/auth/oauth/device", server.uri()))
        .with_token_url(format!("{}/auth/oauth/token", server.uri()))
}

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(5),
        multiplier: 2.0,
    }
}

pub fn device_client(
    server: &MockServer,
    pause: Arc<RecordingPause>,
    options: PollOptions,
) -> DeviceAuthClient {
    DeviceAuthClient::new(oauth_context(server))
        .with_pause(pause)
        .with_poll_options(options)
}

pub fn grant_body(device_code: &str, interval: u64) -> Value {
    json!({
        "device_code": device_code,
        "user_code": "ABCD-EFGH",
        "verification_uri": "https://allegro.pl/skojarz-aplikacje",
        "verification_uri_complete": format!("https://allegro.pl/skojarz-aplikacje?code={device_code}"),
        "expires_in": 3600,
        "interval": interval
    })
}

pub fn grant(device_code: &str, interval: u64) -> DeviceGrant {
    serde_json::from_value(grant_body(device_code, interval)).expect("grant json")
}

pub fn token_body(access_token: &str, refresh_token: &str) -> Value {
    json!({
        "access_token": access_token,
        "token_type": "bearer",
        "refresh_token": refresh_token,
        "expires_in": 43199,
        "scope": "allegro_api",
        "jti": "jti-1"
    })
}

pub fn oauth_error(code: &str) -> Value {
    json!({ "error": code, "error_description": format!("{code} description") })
}
