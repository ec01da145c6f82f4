//! URL helpers for upstream and webhook endpoints

use thiserror::Error;
use url::Url;

/// Errors that can occur while deriving endpoint URLs
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Invalid URL format: {0}")]
    InvalidFormat(#[from] url::ParseError),

    #[error("Unsupported URL scheme '{scheme}', expected one of: {expected}")]
    UnsupportedScheme { scheme: String, expected: String },

    #[error("URL cannot carry path segments: {0}")]
    CannotBeABase(String),
}

/// Parse `raw` and require a WebSocket scheme
pub fn parse_ws_url(raw: &str) -> Result<Url, UrlError> {
    parse_with_schemes(raw, &["ws", "wss"])
}

/// Parse `raw` and require an HTTP scheme
pub fn parse_http_url(raw: &str) -> Result<Url, UrlError> {
    parse_with_schemes(raw, &["http", "https"])
}

fn parse_with_schemes(raw: &str, schemes: &[&str]) -> Result<Url, UrlError> {
    let url = Url::parse(raw)?;
    if !schemes.contains(&url.scheme()) {
        return Err(UrlError::UnsupportedScheme {
            scheme: url.scheme().to_string(),
            expected: schemes.join(", "),
        });
    }
    Ok(url)
}

/// Build the upstream URL for one call.
///
/// With `append_call_id` the call id becomes the last path segment of the base
/// URL (`ws://host/llm-websocket` -> `ws://host/llm-websocket/<call_id>`).
pub fn session_upstream_url(
    base: &str,
    call_id: &str,
    append_call_id: bool,
) -> Result<String, UrlError> {
    let mut url = parse_ws_url(base)?;
    if append_call_id {
        url.path_segments_mut()
            .map_err(|_| UrlError::CannotBeABase(base.to_string()))?
            .pop_if_empty()
            .push(call_id);
    }
    Ok(url.to_string())
}

/// Derive the webhook endpoint served next to an upstream agent:
/// same host and port, `http` for `ws` and `https` for `wss`, path `/webhook`.
pub fn derive_webhook_url(upstream: &str) -> Result<String, UrlError> {
    let mut url = parse_ws_url(upstream)?;
    let scheme = if url.scheme() == "wss" { "https" } else { "http" };
    url.set_scheme(scheme)
        .map_err(|_| UrlError::UnsupportedScheme {
            scheme: url.scheme().to_string(),
            expected: "ws, wss".to_string(),
        })?;
    url.set_path("/webhook");
    url.set_query(None);
    url.set_fragment(None);
    Ok(url.to_string())
}
