//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check endpoint
//! - `bridge` - Downstream client WebSocket paired with an upstream agent link
//! - `interact` - Downstream client WebSocket backed by the interact REST API

pub mod api;
pub mod bridge;
pub mod interact;

// Re-export commonly used handlers for convenient access
pub use bridge::bridge_handler;
pub use interact::interact_handler;
