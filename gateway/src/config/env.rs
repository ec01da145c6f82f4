//! Environment variable loading

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use super::{DEFAULT_INTERACT_BASE_URL, DEFAULT_UPSTREAM_URL, ServerConfig, TlsConfig};
use crate::core::translator::ProtocolMode;

/// Read an environment variable, treating empty values as unset
pub(crate) fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

pub(crate) fn parse_bool(name: &str, value: &str) -> Result<bool, String> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(format!("Invalid boolean for {name}: '{other}'")),
    }
}

fn parse_env<T>(name: &str) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_var(name)
        .map(|value| {
            value
                .trim()
                .parse::<T>()
                .map_err(|e| format!("Invalid value for {name}: '{value}' ({e})"))
        })
        .transpose()
}

fn env_bool(name: &str) -> Result<Option<bool>, String> {
    env_var(name).map(|value| parse_bool(name, &value)).transpose()
}

/// Build a configuration from environment variables and defaults
pub fn load_from_env() -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let tls_enabled = env_bool("TLS_ENABLED")?.unwrap_or(false);
    let tls = if tls_enabled {
        let cert_path = env_var("TLS_CERT_PATH")
            .ok_or("TLS_ENABLED is set but TLS_CERT_PATH is missing")?;
        let key_path =
            env_var("TLS_KEY_PATH").ok_or("TLS_ENABLED is set but TLS_KEY_PATH is missing")?;
        Some(TlsConfig {
            cert_path: PathBuf::from(cert_path),
            key_path: PathBuf::from(key_path),
        })
    } else {
        None
    };

    let protocol = ProtocolMode {
        driver: parse_env("PROTOCOL_DRIVER")?.unwrap_or_default(),
        response_ids: parse_env("RESPONSE_ID_STRATEGY")?.unwrap_or_default(),
        transcript_field: parse_env("TRANSCRIPT_FIELD")?.unwrap_or_default(),
    };

    Ok(ServerConfig {
        host: env_var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
        port: parse_env("PORT")?.unwrap_or(8765),
        tls,
        upstream_url: env_var("UPSTREAM_URL").unwrap_or_else(|| DEFAULT_UPSTREAM_URL.to_string()),
        upstream_append_call_id: env_bool("UPSTREAM_APPEND_CALL_ID")?.unwrap_or(true),
        upstream_connect_timeout_ms: parse_env("UPSTREAM_CONNECT_TIMEOUT_MS")?.unwrap_or(10_000),
        upstream_send_retry_delay_ms: parse_env("UPSTREAM_SEND_RETRY_DELAY_MS")?
            .unwrap_or(1_000),
        webhook_enabled: env_bool("WEBHOOK_ENABLED")?.unwrap_or(false),
        webhook_url: env_var("WEBHOOK_URL"),
        webhook_from_number: env_var("WEBHOOK_FROM_NUMBER").unwrap_or_default(),
        protocol,
        interact_api_key: env_var("INTERACT_API_KEY"),
        interact_version_id: env_var("INTERACT_VERSION_ID")
            .unwrap_or_else(|| "production".to_string()),
        interact_base_url: env_var("INTERACT_BASE_URL")
            .unwrap_or_else(|| DEFAULT_INTERACT_BASE_URL.to_string()),
        max_sessions: parse_env("MAX_SESSIONS")?,
    })
}
