//! Configuration types.
//!
//! All tenant-independent settings come from the environment; the
//! messaging transport is explicit configuration handed to the
//! dispatcher, never a default baked into dispatch code.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Orchestrator-wide configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Address the HTTP server binds to.
    pub bind_addr: String,
    /// Path of the local libSQL database file.
    pub db_path: String,
    /// Country code prefixed onto local-format phone numbers.
    pub default_country_code: String,
    /// Deadline applied to every outbound call so one slow downstream
    /// rule cannot stall the whole batch.
    pub outbound_timeout: Duration,
    pub transport: TransportConfig,
}

/// Outbound messaging transport endpoint + credentials.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Base URL; messages go to `{endpoint}/send`.
    pub endpoint: String,
    /// Bearer token for the transport API.
    pub api_token: SecretString,
}

impl OrchestratorConfig {
    /// Read configuration from the environment.
    ///
    /// The transport endpoint and token are required; everything else
    /// has a sensible default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_addr =
            std::env::var("HOOKFLOW_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let db_path = std::env::var("HOOKFLOW_DB_PATH")
            .unwrap_or_else(|_| "./data/hookflow.db".to_string());

        let default_country_code =
            std::env::var("HOOKFLOW_DEFAULT_COUNTRY_CODE").unwrap_or_else(|_| "55".to_string());
        if default_country_code.is_empty() || !default_country_code.chars().all(|c| c.is_ascii_digit()) {
            return Err(ConfigError::InvalidValue {
                key: "HOOKFLOW_DEFAULT_COUNTRY_CODE".into(),
                message: format!("expected digits, got {default_country_code:?}"),
            });
        }

        let outbound_timeout_secs: u64 = std::env::var("HOOKFLOW_OUTBOUND_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        let endpoint = std::env::var("HOOKFLOW_TRANSPORT_ENDPOINT")
            .map_err(|_| ConfigError::MissingEnvVar("HOOKFLOW_TRANSPORT_ENDPOINT".into()))?;
        let api_token = std::env::var("HOOKFLOW_TRANSPORT_TOKEN")
            .map_err(|_| ConfigError::MissingEnvVar("HOOKFLOW_TRANSPORT_TOKEN".into()))?;

        Ok(Self {
            bind_addr,
            db_path,
            default_country_code,
            outbound_timeout: Duration::from_secs(outbound_timeout_secs),
            transport: TransportConfig {
                endpoint: endpoint.trim_end_matches('/').to_string(),
                api_token: SecretString::from(api_token),
            },
        })
    }
}
