//! Client for the request/response "interact" agent API.
//!
//! Used by the `/interact` route as an alternative to the streaming
//! WebSocket agent: every client utterance is one HTTP round trip that
//! returns a list of traces.

pub mod client;
pub mod messages;

pub use client::{InteractClient, InteractError, InteractResult};
pub use messages::{
    Action, CONVERSATION_ENDED, DEFAULT_GREETING, FALLBACK_REPLY, InteractReply, Trace,
    TraceOutcome,
};
