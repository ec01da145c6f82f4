pub mod endpoints;
pub use endpoints::{
    UrlError, derive_webhook_url, parse_http_url, parse_ws_url, session_upstream_url,
};

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch
pub fn epoch_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or_default()
}
