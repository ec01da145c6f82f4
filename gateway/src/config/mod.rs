//! Configuration module for the bridge gateway
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use vocera_bridge::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use crate::core::translator::ProtocolMode;
use crate::core::upstream::UpstreamSettings;
use crate::utils::derive_webhook_url;

mod env;
mod merge;
mod validation;
mod yaml;

pub use yaml::YamlConfig;

/// Default upstream agent endpoint
pub const DEFAULT_UPSTREAM_URL: &str = "ws://127.0.0.1:8080/llm-websocket";

/// Default base URL of the interact REST API
pub const DEFAULT_INTERACT_BASE_URL: &str = "https://general-runtime.voiceflow.com";

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Server configuration
///
/// Secret fields are zeroized when the configuration is dropped.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub tls: Option<TlsConfig>,

    // Upstream agent
    pub upstream_url: String,
    pub upstream_append_call_id: bool,
    pub upstream_connect_timeout_ms: u64,
    pub upstream_send_retry_delay_ms: u64,

    // Call-started webhook
    pub webhook_enabled: bool,
    /// Explicit webhook URL; derived from the upstream URL when unset
    pub webhook_url: Option<String>,
    pub webhook_from_number: String,

    pub protocol: ProtocolMode,

    // Interact REST variant; the route is disabled without an API key
    pub interact_api_key: Option<String>,
    pub interact_version_id: String,
    pub interact_base_url: String,

    /// Global cap on concurrent sessions
    pub max_sessions: Option<usize>,
}

/// Implement Drop to zeroize all secret fields when ServerConfig is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.interact_api_key {
            key.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults
    ///
    /// The `.env` file is loaded in `main` before this is called, so its values
    /// are visible here unless overridden by real environment variables.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = env::load_from_env()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if TLS is enabled
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Check if the interact REST route should be served
    pub fn has_interact(&self) -> bool {
        self.interact_api_key
            .as_deref()
            .is_some_and(|key| !key.is_empty())
    }

    /// Connection settings for upstream links
    pub fn upstream_settings(&self) -> UpstreamSettings {
        UpstreamSettings {
            base_url: self.upstream_url.clone(),
            append_call_id: self.upstream_append_call_id,
            connect_timeout: Duration::from_millis(self.upstream_connect_timeout_ms),
            send_retry_delay: Duration::from_millis(self.upstream_send_retry_delay_ms),
        }
    }

    /// Webhook endpoint to notify, or `None` when webhooks are disabled
    pub fn webhook_target(&self) -> Result<Option<String>, String> {
        if !self.webhook_enabled {
            return Ok(None);
        }
        match &self.webhook_url {
            Some(url) => Ok(Some(url.clone())),
            None => derive_webhook_url(&self.upstream_url)
                .map(Some)
                .map_err(|e| format!("Cannot derive webhook URL: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::translator::TurnDriver;

    fn test_config() -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8765,
            tls: None,
            upstream_url: "wss://agent.example.com/llm-websocket".to_string(),
            upstream_append_call_id: true,
            upstream_connect_timeout_ms: 2000,
            upstream_send_retry_delay_ms: 250,
            webhook_enabled: false,
            webhook_url: None,
            webhook_from_number: String::new(),
            protocol: ProtocolMode::default(),
            interact_api_key: None,
            interact_version_id: "production".to_string(),
            interact_base_url: DEFAULT_INTERACT_BASE_URL.to_string(),
            max_sessions: None,
        }
    }

    #[test]
    fn test_address() {
        assert_eq!(test_config().address(), "127.0.0.1:8765");
    }

    #[test]
    fn test_upstream_settings() {
        let settings = test_config().upstream_settings();
        assert_eq!(settings.base_url, "wss://agent.example.com/llm-websocket");
        assert_eq!(settings.connect_timeout, Duration::from_millis(2000));
        assert_eq!(settings.send_retry_delay, Duration::from_millis(250));
        assert!(settings.append_call_id);
    }

    #[test]
    fn test_webhook_target() {
        let mut config = test_config();
        assert_eq!(config.webhook_target().unwrap(), None);

        config.webhook_enabled = true;
        assert_eq!(
            config.webhook_target().unwrap().as_deref(),
            Some("https://agent.example.com/webhook")
        );

        config.webhook_url = Some("https://hooks.example.com/calls".to_string());
        assert_eq!(
            config.webhook_target().unwrap().as_deref(),
            Some("https://hooks.example.com/calls")
        );
    }

    #[test]
    fn test_has_interact() {
        let mut config = test_config();
        assert!(!config.has_interact());
        config.interact_api_key = Some(String::new());
        assert!(!config.has_interact());
        config.interact_api_key = Some("VF.DM.key".to_string());
        assert!(config.has_interact());
    }

    #[test]
    fn test_protocol_default() {
        assert_eq!(test_config().protocol.driver, TurnDriver::Downstream);
    }
}
