//! OAuth device-code flow, refresh exchange and credential storage.

pub mod client;
pub mod device_code;
pub mod error;
pub mod manager;
pub mod refresh;
pub mod store;
pub mod token;

pub use client::OAuthContext;
pub use device_code::{DeviceAuthClient, DeviceCodePoll, DeviceGrant, PollOptions, UnknownErrorPolicy};
pub use error::AuthError;
pub use manager::{AuthMode, CredentialManager, GrantPrompt};
pub use refresh::TokenRefresher;
pub use store::{FetchCheckpoint, FileTokenStore, StoredState, TokenStore, TokenStoreConfig};
pub use token::Credential;
