//! Upstream (Retell-style agent) wire messages.
//!
//! Inbound frames are discriminated by `response_type` and, for frames where
//! the agent drives the turn, by `interaction_type`. Anything without a known
//! discriminator is treated as a content delta.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::assembler::ResponseId;
use crate::core::transcript::Turn;

// =============================================================================
// Inbound (agent -> gateway)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ToolCallInvocation {
    pub tool_call_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ToolCallResult {
    pub tool_call_id: String,
    #[serde(default)]
    pub content: String,
}

/// Streamed fragment of an agent response
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ContentDelta {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub content_complete: Option<bool>,
    #[serde(default)]
    pub response_id: Option<ResponseId>,
}

impl ContentDelta {
    /// Completion flag with its default applied: a fragment that belongs to a
    /// response id is partial unless marked, one without an id stands alone.
    pub fn is_complete(&self) -> bool {
        self.content_complete.unwrap_or(self.response_id.is_none())
    }
}

/// Utterance as it appears in an agent-side transcript
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Utterance {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRequestKind {
    Response,
    Reminder,
}

#[derive(Debug, Deserialize)]
struct TurnRequestFrame {
    response_id: ResponseId,
    #[serde(default)]
    transcript: Vec<Utterance>,
}

#[derive(Debug, Deserialize)]
struct TranscriptUpdateFrame {
    #[serde(default)]
    transcript: Vec<Utterance>,
}

/// Every frame the agent may send
#[derive(Debug, Clone, PartialEq)]
pub enum RetellInbound {
    PingPong {
        timestamp: Option<i64>,
    },
    ToolCallInvocation(ToolCallInvocation),
    ToolCallResult(ToolCallResult),
    Content(ContentDelta),
    CallDetails {
        call: Value,
    },
    UpdateOnly {
        transcript: Vec<Utterance>,
    },
    TurnRequest {
        kind: TurnRequestKind,
        response_id: ResponseId,
        transcript: Vec<Utterance>,
    },
}

impl RetellInbound {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(text)?;

        let discriminator = value
            .get("response_type")
            .or_else(|| value.get("interaction_type"))
            .and_then(Value::as_str)
            .map(str::to_owned);

        match discriminator.as_deref() {
            Some("ping_pong") => Ok(Self::PingPong {
                timestamp: value.get("timestamp").and_then(Value::as_i64),
            }),
            Some("tool_call_invocation") => {
                serde_json::from_value(value).map(Self::ToolCallInvocation)
            }
            Some("tool_call_result") => serde_json::from_value(value).map(Self::ToolCallResult),
            Some("call_details") => Ok(Self::CallDetails {
                call: value.get("call").cloned().unwrap_or(Value::Null),
            }),
            Some("update_only") => {
                let frame: TranscriptUpdateFrame = serde_json::from_value(value)?;
                Ok(Self::UpdateOnly {
                    transcript: frame.transcript,
                })
            }
            Some(kind @ ("response_required" | "reminder_required")) => {
                let kind = if kind == "reminder_required" {
                    TurnRequestKind::Reminder
                } else {
                    TurnRequestKind::Response
                };
                let frame: TurnRequestFrame = serde_json::from_value(value)?;
                Ok(Self::TurnRequest {
                    kind,
                    response_id: frame.response_id,
                    transcript: frame.transcript,
                })
            }
            _ => serde_json::from_value(value).map(Self::Content),
        }
    }

    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PingPong { .. } => "ping_pong",
            Self::ToolCallInvocation(_) => "tool_call_invocation",
            Self::ToolCallResult(_) => "tool_call_result",
            Self::Content(_) => "content",
            Self::CallDetails { .. } => "call_details",
            Self::UpdateOnly { .. } => "update_only",
            Self::TurnRequest {
                kind: TurnRequestKind::Response,
                ..
            } => "response_required",
            Self::TurnRequest {
                kind: TurnRequestKind::Reminder,
                ..
            } => "reminder_required",
        }
    }
}

// =============================================================================
// Outbound (gateway -> agent)
// =============================================================================

/// Transcript carried by a response request, under the configured field name
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptPayload {
    Transcript(Vec<Turn>),
    TranscriptWithToolCalls(Vec<Turn>),
}

/// Request for the agent to produce the next response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseRequired {
    interaction_type: &'static str,
    pub response_id: ResponseId,
    #[serde(flatten)]
    pub transcript: TranscriptPayload,
}

impl ResponseRequired {
    pub fn new(response_id: ResponseId, transcript: TranscriptPayload) -> Self {
        Self {
            interaction_type: "response_required",
            response_id,
            transcript,
        }
    }
}

/// Call options announced when the gateway answers on behalf of the agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallConfig {
    pub auto_reconnect: bool,
    pub call_details: bool,
    pub transcript_with_tool_calls: bool,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            call_details: true,
            transcript_with_tool_calls: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "response_type", rename_all = "snake_case")]
pub enum RetellResponse {
    PingPong {
        timestamp: i64,
    },
    Config {
        config: CallConfig,
    },
    Response {
        response_id: ResponseId,
        content: String,
        content_complete: bool,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        end_call: bool,
    },
    AgentInterrupt {
        interrupt_id: i64,
        content: String,
        content_complete: bool,
        no_interruption_allowed: bool,
    },
}

/// Anything the gateway writes to the upstream socket
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RetellOutbound {
    Request(ResponseRequired),
    Response(RetellResponse),
}

impl From<ResponseRequired> for RetellOutbound {
    fn from(request: ResponseRequired) -> Self {
        RetellOutbound::Request(request)
    }
}

impl From<RetellResponse> for RetellOutbound {
    fn from(response: RetellResponse) -> Self {
        RetellOutbound::Response(response)
    }
}
