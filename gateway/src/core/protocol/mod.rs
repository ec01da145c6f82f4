//! Wire formats for both sides of the bridge.

pub mod retell;
pub mod vocera;

pub use retell::{
    CallConfig, ContentDelta, ResponseRequired, RetellInbound, RetellOutbound, RetellResponse,
    TranscriptPayload, TurnRequestKind,
};
pub use vocera::{FunctionCallData, FunctionCallResultData, VoceraInbound, VoceraOutbound};
