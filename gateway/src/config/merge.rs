//! Merging YAML overrides onto the environment-derived configuration

use std::path::PathBuf;

use super::env::load_from_env;
use super::yaml::YamlConfig;
use super::{ServerConfig, TlsConfig};

/// Start from environment variables (with defaults) and apply YAML values on top
pub fn merge_config(
    yaml: Option<YamlConfig>,
) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let mut config = load_from_env()?;
    let Some(yaml) = yaml else {
        return Ok(config);
    };

    if let Some(server) = yaml.server {
        if let Some(host) = server.host {
            config.host = host;
        }
        if let Some(port) = server.port {
            config.port = port;
        }
        if let Some(tls) = server.tls {
            match tls.enabled {
                Some(false) => config.tls = None,
                Some(true) => {
                    let cert_path = tls
                        .cert_path
                        .ok_or("server.tls.enabled is true but cert_path is missing")?;
                    let key_path = tls
                        .key_path
                        .ok_or("server.tls.enabled is true but key_path is missing")?;
                    config.tls = Some(TlsConfig {
                        cert_path: PathBuf::from(cert_path),
                        key_path: PathBuf::from(key_path),
                    });
                }
                None => {}
            }
        }
    }

    if let Some(upstream) = yaml.upstream {
        if let Some(url) = upstream.url {
            config.upstream_url = url;
        }
        if let Some(append) = upstream.append_call_id {
            config.upstream_append_call_id = append;
        }
        if let Some(timeout) = upstream.connect_timeout_ms {
            config.upstream_connect_timeout_ms = timeout;
        }
        if let Some(delay) = upstream.send_retry_delay_ms {
            config.upstream_send_retry_delay_ms = delay;
        }
    }

    if let Some(webhook) = yaml.webhook {
        if let Some(enabled) = webhook.enabled {
            config.webhook_enabled = enabled;
        }
        if webhook.url.is_some() {
            config.webhook_url = webhook.url;
        }
        if let Some(from_number) = webhook.from_number {
            config.webhook_from_number = from_number;
        }
    }

    if let Some(protocol) = yaml.protocol {
        if let Some(driver) = protocol.driver {
            config.protocol.driver = driver.parse()?;
        }
        if let Some(response_ids) = protocol.response_ids {
            config.protocol.response_ids = response_ids.parse()?;
        }
        if let Some(field) = protocol.transcript_field {
            config.protocol.transcript_field = field.parse()?;
        }
    }

    if let Some(interact) = yaml.interact {
        if interact.api_key.is_some() {
            config.interact_api_key = interact.api_key;
        }
        if let Some(version_id) = interact.version_id {
            config.interact_version_id = version_id;
        }
        if let Some(base_url) = interact.base_url {
            config.interact_base_url = base_url;
        }
    }

    if let Some(security) = yaml.security
        && security.max_sessions.is_some()
    {
        config.max_sessions = security.max_sessions;
    }

    Ok(config)
}
