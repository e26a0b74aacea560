//! API credential loading
//!
//! Keys are held in `Zeroizing` strings so they are wiped from memory when
//! the client is dropped, and never printed by `Debug`.

use std::env;
use zeroize::Zeroizing;

pub const API_KEY_VAR: &str = "BYBIT_API_KEY";
pub const API_SECRET_VAR: &str = "BYBIT_API_SECRET";

/// Error type for secret loading operations
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SecretError {
    #[error("Environment variable not set: {0}")]
    EnvVarNotSet(String),

    #[error("Secret validation failed: {0}")]
    ValidationFailed(String),
}

/// Key pair used to sign private requests
#[derive(Clone)]
pub struct ApiCredentials {
    api_key: Zeroizing<String>,
    api_secret: Zeroizing<String>,
}

impl ApiCredentials {
    pub fn new(api_key: &str, api_secret: &str) -> Result<Self, SecretError> {
        validate_secret(api_key, API_KEY_VAR)?;
        validate_secret(api_secret, API_SECRET_VAR)?;
        Ok(Self {
            api_key: Zeroizing::new(api_key.to_string()),
            api_secret: Zeroizing::new(api_secret.to_string()),
        })
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn api_secret(&self) -> &str {
        &self.api_secret
    }
}

impl std::fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("api_key", &"<redacted>")
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// Load the exchange key pair from the environment
pub fn load_credentials() -> Result<ApiCredentials, SecretError> {
    let api_key = load_from_env(API_KEY_VAR)?;
    let api_secret = load_from_env(API_SECRET_VAR)?;
    ApiCredentials::new(&api_key, &api_secret)
}

/// Load a secret from environment variable (wrapped in Zeroizing)
fn load_from_env(env_var_name: &str) -> Result<Zeroizing<String>, SecretError> {
    env::var(env_var_name)
        .map(Zeroizing::new)
        .map_err(|_| SecretError::EnvVarNotSet(env_var_name.to_string()))
}

fn validate_secret(secret: &str, name: &str) -> Result<(), SecretError> {
    if secret.trim().is_empty() {
        return Err(SecretError::ValidationFailed(format!("{} is empty", name)));
    }
    if secret.chars().any(char::is_whitespace) {
        return Err(SecretError::ValidationFailed(format!(
            "{} contains whitespace",
            name
        )));
    }
    Ok(())
}
