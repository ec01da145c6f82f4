use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present in
/// the file override environment variables.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 8765
///   tls:
///     enabled: true
///     cert_path: "/etc/bridge/cert.pem"
///     key_path: "/etc/bridge/key.pem"
///
/// upstream:
///   url: "wss://agent.example.com/llm-websocket"
///   append_call_id: true
///   connect_timeout_ms: 10000
///   send_retry_delay_ms: 1000
///
/// webhook:
///   enabled: true
///   url: "https://agent.example.com/webhook"
///   from_number: "+15550100"
///
/// protocol:
///   driver: "downstream"
///   response_ids: "user_turns"
///   transcript_field: "transcript"
///
/// interact:
///   api_key: "VF.DM.xxxx"
///   version_id: "production"
///   base_url: "https://general-runtime.voiceflow.com"
///
/// security:
///   max_sessions: 500
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub upstream: Option<UpstreamYaml>,
    pub webhook: Option<WebhookYaml>,
    pub protocol: Option<ProtocolYaml>,
    pub interact: Option<InteractYaml>,
    pub security: Option<SecurityYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls: Option<TlsYaml>,
}

/// TLS configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub enabled: Option<bool>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

/// Upstream agent configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct UpstreamYaml {
    pub url: Option<String>,
    pub append_call_id: Option<bool>,
    pub connect_timeout_ms: Option<u64>,
    pub send_retry_delay_ms: Option<u64>,
}

/// Webhook configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct WebhookYaml {
    pub enabled: Option<bool>,
    pub url: Option<String>,
    pub from_number: Option<String>,
}

/// Protocol mode from YAML; values are parsed during merge
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ProtocolYaml {
    pub driver: Option<String>,
    pub response_ids: Option<String>,
    pub transcript_field: Option<String>,
}

/// Interact REST API configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct InteractYaml {
    pub api_key: Option<String>,
    pub version_id: Option<String>,
    pub base_url: Option<String>,
}

/// Security configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    pub max_sessions: Option<usize>,
}

impl YamlConfig {
    /// Load YAML configuration from a file
    ///
    /// # Errors
    /// Returns an error if:
    /// - The file cannot be read
    /// - The YAML is malformed
    /// - Required fields have invalid types
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}
