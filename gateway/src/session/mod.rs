//! Session pairing between downstream clients and upstream agent links.
//!
//! - `downstream`: handle to a client connection owned by its axum handler
//! - `registry`: two-way session index and per-session state
//! - `coordinator`: connect/disconnect cascades and message dispatch

pub mod coordinator;
pub mod downstream;
pub mod registry;

pub use coordinator::{CoordinatorError, SHUTDOWN_REASON, SessionCoordinator};
pub use downstream::{DownstreamHandle, DownstreamRoute};
pub use registry::{RegistryError, Session, SessionId, SessionRegistry};
