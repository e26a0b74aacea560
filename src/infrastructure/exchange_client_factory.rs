//! Exchange Client Factory
//!
//! Chooses the live or the dry-run gateway once at startup. The rest of the
//! bot only ever sees `Arc<dyn ExchangeGateway>`.

use crate::config::TradingConfig;
use crate::domain::errors::GatewayError;
use crate::domain::repositories::exchange_gateway::ExchangeGateway;
use crate::infrastructure::bybit_client::{BybitClient, BybitConfig};
use crate::infrastructure::simulated_client::SimulatedClient;
use crate::secrets::{load_credentials, ApiCredentials, SecretError};
use std::sync::Arc;
use tracing::{info, warn};

/// Factory for creating the exchange gateway
pub struct ExchangeClientFactory;

impl ExchangeClientFactory {
    /// Build the gateway from configuration and credentials in the environment
    pub fn create(config: &TradingConfig) -> Result<Arc<dyn ExchangeGateway>, GatewayError> {
        let credentials = match load_credentials() {
            Ok(creds) => Some(creds),
            Err(SecretError::EnvVarNotSet(var)) => {
                warn!("{} not set, private endpoints are unavailable", var);
                None
            }
            Err(e) => {
                warn!("Ignoring API credentials: {}", e);
                None
            }
        };
        Self::create_with(config, credentials)
    }

    /// Build the gateway from explicit credentials
    ///
    /// Live trading without credentials is downgraded to a dry run.
    pub fn create_with(
        config: &TradingConfig,
        credentials: Option<ApiCredentials>,
    ) -> Result<Arc<dyn ExchangeGateway>, GatewayError> {
        let dry_run = if !config.dry_run && credentials.is_none() {
            warn!("Live trading requested without API credentials, forcing dry run");
            true
        } else {
            config.dry_run
        };

        let client = BybitClient::new(
            BybitConfig::new(config.network, config.request_timeout),
            credentials,
        )?;

        if dry_run {
            if !client.has_credentials() {
                info!(
                    "Dry run uses paper equity of {:.2}",
                    config.dry_run_equity
                );
            }
            Ok(Arc::new(SimulatedClient::new(client, config.dry_run_equity)))
        } else {
            Ok(Arc::new(client))
        }
    }
}
