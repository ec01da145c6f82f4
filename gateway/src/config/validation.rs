//! Configuration validation logic

use super::ServerConfig;
use crate::utils::{parse_http_url, parse_ws_url};

/// Validate a fully merged configuration
pub fn validate(config: &ServerConfig) -> Result<(), String> {
    validate_upstream(config)?;
    validate_webhook(config)?;
    validate_interact(config)?;
    validate_tls(config)?;

    if config.max_sessions == Some(0) {
        return Err("MAX_SESSIONS must be greater than zero when set".to_string());
    }
    Ok(())
}

fn validate_upstream(config: &ServerConfig) -> Result<(), String> {
    parse_ws_url(&config.upstream_url)
        .map_err(|e| format!("Invalid UPSTREAM_URL '{}': {e}", config.upstream_url))?;

    if config.upstream_connect_timeout_ms == 0 {
        return Err("UPSTREAM_CONNECT_TIMEOUT_MS must be greater than zero".to_string());
    }
    Ok(())
}

fn validate_webhook(config: &ServerConfig) -> Result<(), String> {
    if let Some(url) = &config.webhook_url {
        parse_http_url(url).map_err(|e| format!("Invalid WEBHOOK_URL '{url}': {e}"))?;
    }
    config.webhook_target().map(|_| ())
}

fn validate_interact(config: &ServerConfig) -> Result<(), String> {
    if !config.has_interact() {
        return Ok(());
    }
    parse_http_url(&config.interact_base_url)
        .map_err(|e| format!("Invalid INTERACT_BASE_URL '{}': {e}", config.interact_base_url))?;
    Ok(())
}

fn validate_tls(config: &ServerConfig) -> Result<(), String> {
    let Some(tls) = &config.tls else {
        return Ok(());
    };
    if tls.cert_path.as_os_str().is_empty() || tls.key_path.as_os_str().is_empty() {
        return Err("TLS certificate and key paths must not be empty".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_INTERACT_BASE_URL, DEFAULT_UPSTREAM_URL, TlsConfig};
    use crate::core::translator::ProtocolMode;
    use std::path::PathBuf;

    fn valid_config() -> ServerConfig {
        ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 8765,
            tls: None,
            upstream_url: DEFAULT_UPSTREAM_URL.to_string(),
            upstream_append_call_id: true,
            upstream_connect_timeout_ms: 10_000,
            upstream_send_retry_delay_ms: 1_000,
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
    fn test_valid_config() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_rejects_http_upstream() {
        let mut config = valid_config();
        config.upstream_url = "http://agent.example.com".to_string();
        let err = validate(&config).unwrap_err();
        assert!(err.contains("UPSTREAM_URL"));
    }

    #[test]
    fn test_rejects_ws_webhook() {
        let mut config = valid_config();
        config.webhook_enabled = true;
        config.webhook_url = Some("ws://hooks.example.com".to_string());
        assert!(validate(&config).unwrap_err().contains("WEBHOOK_URL"));
    }

    #[test]
    fn test_rejects_bad_interact_url_only_when_enabled() {
        let mut config = valid_config();
        config.interact_base_url = "ftp://runtime.example.com".to_string();
        assert!(validate(&config).is_ok());

        config.interact_api_key = Some("key".to_string());
        assert!(validate(&config).unwrap_err().contains("INTERACT_BASE_URL"));
    }

    #[test]
    fn test_rejects_zero_limits() {
        let mut config = valid_config();
        config.max_sessions = Some(0);
        assert!(validate(&config).is_err());

        let mut config = valid_config();
        config.upstream_connect_timeout_ms = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_rejects_empty_tls_paths() {
        let mut config = valid_config();
        config.tls = Some(TlsConfig {
            cert_path: PathBuf::new(),
            key_path: PathBuf::from("/k.pem"),
        });
        assert!(validate(&config).is_err());
    }
}
