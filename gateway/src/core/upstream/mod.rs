//! Upstream agent connections.
//!
//! - `base`: error type, link state machine, event sink trait
//! - `link`: shared handle to one connection (state, writer queue, close)
//! - `connector`: URL building and the per-link connection task

pub mod base;
pub mod connector;
pub mod link;

pub use base::{
    CloseReason, LinkState, UpstreamError, UpstreamEvents, UpstreamId, UpstreamResult,
};
pub use connector::{UpstreamConnector, UpstreamSettings};
pub use link::UpstreamLink;
