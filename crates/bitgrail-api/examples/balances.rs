//! Fetch account balances.
//!
//! Keys come from `BITGRAIL_PUBLIC_KEY` / `BITGRAIL_PRIVATE_KEY` unless a
//! config file is given via `BITGRAIL_CONFIG`.
//!
//! ```text
//! BITGRAIL_PUBLIC_KEY=... BITGRAIL_PRIVATE_KEY=... cargo run --example balances
//! ```

use anyhow::Result;
use bitgrail_api::{BitGrailClient, ClientConfig, CredentialsConfig, KeySource};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    bitgrail_telemetry::init_logging()?;

    let mut config = match std::env::var("BITGRAIL_CONFIG") {
        Ok(path) => {
            info!(config_path = %path, "Loading configuration");
            ClientConfig::from_file(&path)?
        }
        Err(_) => ClientConfig::default(),
    };

    if config.credentials.is_none() {
        config.credentials = Some(CredentialsConfig {
            public_key: KeySource::Env {
                var_name: "BITGRAIL_PUBLIC_KEY".to_string(),
            },
            private_key: KeySource::Env {
                var_name: "BITGRAIL_PRIVATE_KEY".to_string(),
            },
        });
    }

    let client = BitGrailClient::from_config(&config)?;

    match client.balances().await {
        Ok(balances) => info!(%balances, "Balances fetched"),
        Err(e) => error!(status = ?e.status(), error = %e, "Balances call failed"),
    }

    if let Some(record) = client.last_call() {
        info!(
            method = %record.method,
            status = record.http_status,
            nonce = record.nonce,
            "Last call"
        );
    }

    Ok(())
}
