//! Protocol translation between downstream clients and the upstream agent.
//!
//! The translator is pure with respect to I/O: each call takes the session's
//! [`ConversationState`], mutates it, and returns at most one frame to deliver.
//! The caller owns delivery. All protocol variants go through one
//! [`Translator`] configured by a [`ProtocolMode`].

use std::str::FromStr;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::assembler::{ResponseAssembler, ResponseId};
use crate::core::protocol::retell::{ToolCallInvocation, ToolCallResult};
use crate::core::protocol::{
    CallConfig, ResponseRequired, RetellInbound, RetellOutbound, RetellResponse,
    TranscriptPayload, VoceraInbound, VoceraOutbound,
};
use crate::core::protocol::vocera::{FunctionCallData, FunctionCallResultData};
use crate::core::transcript::{Transcript, Turn};
use crate::utils::epoch_millis;

/// Phrases in an agent reply that end the call when the agent side drives turns
const END_CALL_PHRASES: [&str; 2] = ["end call", "goodbye"];

/// Which side decides when a response is due
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnDriver {
    /// Downstream user speaks, the agent answers
    #[default]
    Downstream,
    /// The agent requests responses and the downstream client supplies them
    Upstream,
}

/// How response ids are assigned to outgoing requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseIdStrategy {
    /// Number of user turns minus one
    #[default]
    UserTurns,
    /// Milliseconds since the Unix epoch
    Timestamp,
}

/// Name and content of the transcript array in response requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TranscriptField {
    /// `transcript`: user and agent turns only
    #[default]
    Transcript,
    /// `transcript_with_tool_calls`: every turn
    TranscriptWithToolCalls,
}

/// Error returned when a protocol setting string is not recognised
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown {setting} '{value}'")]
pub struct UnknownSetting {
    pub setting: &'static str,
    pub value: String,
}

impl FromStr for TurnDriver {
    type Err = UnknownSetting;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "downstream" | "forward" => Ok(TurnDriver::Downstream),
            "upstream" | "reverse" => Ok(TurnDriver::Upstream),
            other => Err(UnknownSetting {
                setting: "protocol driver",
                value: other.to_string(),
            }),
        }
    }
}

impl FromStr for ResponseIdStrategy {
    type Err = UnknownSetting;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user_turns" => Ok(ResponseIdStrategy::UserTurns),
            "timestamp" => Ok(ResponseIdStrategy::Timestamp),
            other => Err(UnknownSetting {
                setting: "response id strategy",
                value: other.to_string(),
            }),
        }
    }
}

impl FromStr for TranscriptField {
    type Err = UnknownSetting;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "transcript" => Ok(TranscriptField::Transcript),
            "transcript_with_tool_calls" => Ok(TranscriptField::TranscriptWithToolCalls),
            other => Err(UnknownSetting {
                setting: "transcript field",
                value: other.to_string(),
            }),
        }
    }
}

/// Complete protocol configuration for a gateway instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProtocolMode {
    pub driver: TurnDriver,
    pub response_ids: ResponseIdStrategy,
    pub transcript_field: TranscriptField,
}

/// Mutable conversation state of one session
#[derive(Debug, Default)]
pub struct ConversationState {
    pub transcript: Transcript,
    pub assembler: ResponseAssembler,
    /// Last response id sent to the agent
    pub last_response_id: Option<ResponseId>,
    /// Response id the agent is waiting on (agent-driven turns only)
    pub pending_response_id: Option<ResponseId>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A translated frame and the side it is addressed to
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Downstream(VoceraOutbound),
    Upstream(RetellOutbound),
}

#[derive(Debug, Clone, Default)]
pub struct Translator {
    mode: ProtocolMode,
}

impl Translator {
    pub fn new(mode: ProtocolMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> ProtocolMode {
        self.mode
    }

    /// Frame to send as soon as the upstream link opens, if any
    pub fn on_link_open(&self) -> Option<RetellOutbound> {
        match self.mode.driver {
            TurnDriver::Downstream => None,
            TurnDriver::Upstream => Some(
                RetellResponse::Config {
                    config: CallConfig::default(),
                }
                .into(),
            ),
        }
    }

    /// Translate a downstream client frame into a frame for the agent.
    ///
    /// Missing or whitespace-only content yields `None` and leaves the state untouched.
    pub fn downstream_to_upstream(
        &self,
        state: &mut ConversationState,
        message: &VoceraInbound,
    ) -> Option<RetellOutbound> {
        let text = message.text()?;

        match self.mode.driver {
            TurnDriver::Downstream => {
                state.transcript.append(Turn::user(text));
                let response_id = self.next_response_id(&state.transcript);
                state.last_response_id = Some(response_id);
                Some(
                    ResponseRequired::new(response_id, self.transcript_payload(&state.transcript))
                        .into(),
                )
            }
            TurnDriver::Upstream => {
                state.transcript.append(Turn::agent(text));
                let reply = match state.pending_response_id.take() {
                    Some(response_id) => RetellResponse::Response {
                        response_id,
                        content: text.to_string(),
                        content_complete: true,
                        end_call: wants_end_call(text),
                    },
                    None => RetellResponse::AgentInterrupt {
                        interrupt_id: epoch_millis(),
                        content: text.to_string(),
                        content_complete: true,
                        no_interruption_allowed: true,
                    },
                };
                Some(reply.into())
            }
        }
    }

    /// Translate an agent frame. The result is either a reply for the agent
    /// (pongs) or a frame for the downstream client.
    pub fn upstream_to_downstream(
        &self,
        state: &mut ConversationState,
        message: RetellInbound,
    ) -> Option<Outbound> {
        match message {
            RetellInbound::PingPong { .. } => Some(Outbound::Upstream(
                RetellResponse::PingPong {
                    timestamp: epoch_millis(),
                }
                .into(),
            )),
            RetellInbound::Content(delta) => {
                let is_complete = delta.is_complete();
                let text = state
                    .assembler
                    .ingest(delta.response_id, &delta.content, is_complete)?;
                if text.trim().is_empty() {
                    debug!(response_id = ?delta.response_id, "Dropping empty agent response");
                    return None;
                }
                state.transcript.append(Turn::agent(text.clone()));
                Some(Outbound::Downstream(VoceraOutbound::Agent { content: text }))
            }
            RetellInbound::ToolCallInvocation(ToolCallInvocation {
                tool_call_id,
                name,
                arguments,
            }) => {
                state.transcript.append(Turn::ToolCallInvocation {
                    tool_call_id: tool_call_id.clone(),
                    name: name.clone(),
                    arguments: arguments.clone(),
                });
                Some(Outbound::Downstream(VoceraOutbound::FunctionCall {
                    data: FunctionCallData {
                        id: tool_call_id,
                        name,
                        arguments,
                    },
                }))
            }
            RetellInbound::ToolCallResult(ToolCallResult {
                tool_call_id,
                content,
            }) => {
                state.transcript.append(Turn::ToolCallResult {
                    tool_call_id: tool_call_id.clone(),
                    content: content.clone(),
                });
                Some(Outbound::Downstream(VoceraOutbound::FunctionCallResult {
                    data: FunctionCallResultData {
                        id: tool_call_id,
                        result: content,
                    },
                }))
            }
            RetellInbound::CallDetails { call } => {
                info!(call = %call, "Received call details");
                None
            }
            RetellInbound::UpdateOnly { transcript } => {
                if let Some(last) = transcript.last() {
                    debug!(role = %last.role, content = %last.content, "Transcript update");
                }
                None
            }
            RetellInbound::TurnRequest {
                kind,
                response_id,
                transcript,
            } => {
                if self.mode.driver == TurnDriver::Downstream {
                    warn!(
                        response_id,
                        ?kind,
                        "Ignoring turn request while the downstream side drives turns"
                    );
                    return None;
                }
                state.pending_response_id = Some(response_id);
                let content = transcript
                    .last()
                    .map(|utterance| utterance.content.trim())
                    .filter(|content| !content.is_empty())?
                    .to_string();
                state.transcript.append(Turn::user(content.clone()));
                Some(Outbound::Downstream(VoceraOutbound::User { content }))
            }
        }
    }

    fn next_response_id(&self, transcript: &Transcript) -> ResponseId {
        match self.mode.response_ids {
            ResponseIdStrategy::UserTurns => transcript.user_turns() as ResponseId - 1,
            ResponseIdStrategy::Timestamp => epoch_millis(),
        }
    }

    fn transcript_payload(&self, transcript: &Transcript) -> TranscriptPayload {
        match self.mode.transcript_field {
            TranscriptField::Transcript => TranscriptPayload::Transcript(transcript.utterances()),
            TranscriptField::TranscriptWithToolCalls => {
                TranscriptPayload::TranscriptWithToolCalls(transcript.with_tool_calls())
            }
        }
    }
}

fn wants_end_call(text: &str) -> bool {
    let lowered = text.to_lowercase();
    END_CALL_PHRASES
        .iter()
        .any(|phrase| lowered.contains(phrase))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::protocol::retell::{ContentDelta, TurnRequestKind, Utterance};
    use crate::core::transcript::TurnRole;
    use serde_json::json;

    fn forward() -> Translator {
        Translator::new(ProtocolMode::default())
    }

    fn reverse() -> Translator {
        Translator::new(ProtocolMode {
            driver: TurnDriver::Upstream,
            ..ProtocolMode::default()
        })
    }

    fn delta(content: &str, complete: Option<bool>, response_id: Option<i64>) -> RetellInbound {
        RetellInbound::Content(ContentDelta {
            content: content.to_string(),
            content_complete: complete,
            response_id,
        })
    }

    fn as_json(outbound: RetellOutbound) -> serde_json::Value {
        serde_json::to_value(outbound).unwrap()
    }

    #[test]
    fn test_user_message_becomes_response_required() {
        let translator = forward();
        let mut state = ConversationState::new();

        let out = translator
            .downstream_to_upstream(&mut state, &VoceraInbound::new("  hi  "))
            .unwrap();
        assert_eq!(
            as_json(out),
            json!({
                "interaction_type": "response_required",
                "response_id": 0,
                "transcript": [{"role": "user", "content": "hi"}]
            })
        );

        let out = translator
            .downstream_to_upstream(&mut state, &VoceraInbound::new("again"))
            .unwrap();
        assert_eq!(as_json(out)["response_id"], json!(1));
        assert_eq!(state.last_response_id, Some(1));
    }

    #[test]
    fn test_blank_message_leaves_state_untouched() {
        let translator = forward();
        let mut state = ConversationState::new();

        assert!(
            translator
                .downstream_to_upstream(&mut state, &VoceraInbound::new("   "))
                .is_none()
        );
        assert!(
            translator
                .downstream_to_upstream(&mut state, &VoceraInbound::default())
                .is_none()
        );
        assert!(state.transcript.is_empty());
    }

    #[test]
    fn test_timestamp_response_ids() {
        let translator = Translator::new(ProtocolMode {
            response_ids: ResponseIdStrategy::Timestamp,
            ..ProtocolMode::default()
        });
        let mut state = ConversationState::new();
        let before = epoch_millis();
        translator.downstream_to_upstream(&mut state, &VoceraInbound::new("hi"));
        assert!(state.last_response_id.unwrap() >= before);
    }

    #[test]
    fn test_fragments_forwarded_once_complete() {
        let translator = forward();
        let mut state = ConversationState::new();

        assert_eq!(
            translator.upstream_to_downstream(&mut state, delta("Hello", Some(false), Some(7))),
            None
        );
        assert_eq!(
            translator.upstream_to_downstream(&mut state, delta("world", Some(true), Some(7))),
            Some(Outbound::Downstream(VoceraOutbound::Agent {
                content: "Hello world".to_string()
            }))
        );
        assert_eq!(state.transcript.turns(), &[Turn::agent("Hello world")]);
    }

    #[test]
    fn test_empty_completion_suppressed() {
        let translator = forward();
        let mut state = ConversationState::new();

        translator.upstream_to_downstream(&mut state, delta("", Some(false), Some(2)));
        assert_eq!(
            translator.upstream_to_downstream(&mut state, delta(" ", Some(true), Some(2))),
            None
        );
        assert!(state.transcript.is_empty());
        assert_eq!(state.assembler.pending_len(), 0);
    }

    #[test]
    fn test_tool_calls_forwarded_immediately() {
        let translator = forward();
        let mut state = ConversationState::new();

        let invocation = translator.upstream_to_downstream(
            &mut state,
            RetellInbound::ToolCallInvocation(ToolCallInvocation {
                tool_call_id: "t1".to_string(),
                name: "page_nurse".to_string(),
                arguments: json!("{\"unit\":\"ICU\"}"),
            }),
        );
        assert_eq!(
            invocation,
            Some(Outbound::Downstream(VoceraOutbound::FunctionCall {
                data: FunctionCallData {
                    id: "t1".to_string(),
                    name: "page_nurse".to_string(),
                    arguments: json!("{\"unit\":\"ICU\"}"),
                }
            }))
        );

        let result = translator.upstream_to_downstream(
            &mut state,
            RetellInbound::ToolCallResult(ToolCallResult {
                tool_call_id: "t1".to_string(),
                content: "paged".to_string(),
            }),
        );
        assert_eq!(
            result,
            Some(Outbound::Downstream(VoceraOutbound::FunctionCallResult {
                data: FunctionCallResultData {
                    id: "t1".to_string(),
                    result: "paged".to_string(),
                }
            }))
        );

        let roles: Vec<TurnRole> = state.transcript.turns().iter().map(Turn::role).collect();
        assert_eq!(
            roles,
            vec![TurnRole::ToolCallInvocation, TurnRole::ToolCallResult]
        );
    }

    #[test]
    fn test_transcript_field_selection() {
        let translator = Translator::new(ProtocolMode {
            transcript_field: TranscriptField::TranscriptWithToolCalls,
            ..ProtocolMode::default()
        });
        let mut state = ConversationState::new();
        translator.upstream_to_downstream(
            &mut state,
            RetellInbound::ToolCallResult(ToolCallResult {
                tool_call_id: "t1".to_string(),
                content: "done".to_string(),
            }),
        );

        let out = translator
            .downstream_to_upstream(&mut state, &VoceraInbound::new("thanks"))
            .unwrap();
        let value = as_json(out);
        assert!(value.get("transcript").is_none());
        assert_eq!(value["transcript_with_tool_calls"].as_array().unwrap().len(), 2);

        // Default field hides tool-call turns
        let out = forward()
            .downstream_to_upstream(&mut state, &VoceraInbound::new("more"))
            .unwrap();
        let value = as_json(out);
        assert_eq!(
            value["transcript"],
            json!([
                {"role": "user", "content": "thanks"},
                {"role": "user", "content": "more"}
            ])
        );
    }

    #[test]
    fn test_transcript_follows_arrival_order() {
        let translator = forward();
        let mut state = ConversationState::new();

        translator.downstream_to_upstream(&mut state, &VoceraInbound::new("hi"));
        translator.upstream_to_downstream(&mut state, delta("Hello", Some(true), Some(0)));
        translator.upstream_to_downstream(
            &mut state,
            RetellInbound::ToolCallInvocation(ToolCallInvocation {
                tool_call_id: "t1".to_string(),
                name: "f".to_string(),
                arguments: json!({}),
            }),
        );
        translator.downstream_to_upstream(&mut state, &VoceraInbound::new("bye"));

        let roles: Vec<TurnRole> = state.transcript.turns().iter().map(Turn::role).collect();
        assert_eq!(
            roles,
            vec![
                TurnRole::User,
                TurnRole::Agent,
                TurnRole::ToolCallInvocation,
                TurnRole::User
            ]
        );
    }

    #[test]
    fn test_ping_answered_without_touching_transcript() {
        let translator = forward();
        let mut state = ConversationState::new();

        let out = translator
            .upstream_to_downstream(&mut state, RetellInbound::PingPong { timestamp: Some(1) })
            .unwrap();
        let Outbound::Upstream(reply) = out else {
            panic!("expected upstream pong");
        };
        let value = as_json(reply);
        assert_eq!(value["response_type"], json!("ping_pong"));
        assert!(value["timestamp"].as_i64().unwrap() > 0);
        assert!(state.transcript.is_empty());
    }

    #[test]
    fn test_reverse_config_on_open() {
        assert!(forward().on_link_open().is_none());
        let config = reverse().on_link_open().unwrap();
        assert_eq!(
            as_json(config),
            json!({
                "response_type": "config",
                "config": {
                    "auto_reconnect": true,
                    "call_details": true,
                    "transcript_with_tool_calls": true
                }
            })
        );
    }

    #[test]
    fn test_reverse_turn_request_and_reply() {
        let translator = reverse();
        let mut state = ConversationState::new();

        let out = translator.upstream_to_downstream(
            &mut state,
            RetellInbound::TurnRequest {
                kind: TurnRequestKind::Response,
                response_id: 4,
                transcript: vec![
                    Utterance {
                        role: "agent".to_string(),
                        content: "How can I help?".to_string(),
                    },
                    Utterance {
                        role: "user".to_string(),
                        content: "Where is bed 4?".to_string(),
                    },
                ],
            },
        );
        assert_eq!(
            out,
            Some(Outbound::Downstream(VoceraOutbound::User {
                content: "Where is bed 4?".to_string()
            }))
        );
        assert_eq!(state.pending_response_id, Some(4));

        let reply = translator
            .downstream_to_upstream(&mut state, &VoceraInbound::new("Ward B. Goodbye!"))
            .unwrap();
        assert_eq!(
            as_json(reply),
            json!({
                "response_type": "response",
                "response_id": 4,
                "content": "Ward B. Goodbye!",
                "content_complete": true,
                "end_call": true
            })
        );
        assert_eq!(state.pending_response_id, None);
    }

    #[test]
    fn test_reverse_reply_without_pending_id_interrupts() {
        let translator = reverse();
        let mut state = ConversationState::new();

        let reply = translator
            .downstream_to_upstream(&mut state, &VoceraInbound::new("Code blue on 3"))
            .unwrap();
        let value = as_json(reply);
        assert_eq!(value["response_type"], json!("agent_interrupt"));
        assert_eq!(value["no_interruption_allowed"], json!(true));
        assert_eq!(value["content_complete"], json!(true));
        assert!(value["interrupt_id"].as_i64().unwrap() > 0);
        assert_eq!(state.transcript.turns(), &[Turn::agent("Code blue on 3")]);
    }

    #[test]
    fn test_turn_request_ignored_when_downstream_drives() {
        let translator = forward();
        let mut state = ConversationState::new();
        let out = translator.upstream_to_downstream(
            &mut state,
            RetellInbound::TurnRequest {
                kind: TurnRequestKind::Reminder,
                response_id: 1,
                transcript: vec![],
            },
        );
        assert_eq!(out, None);
        assert_eq!(state.pending_response_id, None);
    }

    #[test]
    fn test_setting_parsing() {
        assert_eq!("upstream".parse::<TurnDriver>(), Ok(TurnDriver::Upstream));
        assert_eq!(
            "Timestamp".parse::<ResponseIdStrategy>(),
            Ok(ResponseIdStrategy::Timestamp)
        );
        assert_eq!(
            "transcript_with_tool_calls".parse::<TranscriptField>(),
            Ok(TranscriptField::TranscriptWithToolCalls)
        );
        let err = "sideways".parse::<TurnDriver>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown protocol driver 'sideways'");
        let source: &dyn std::error::Error = &err;
        assert!(source.source().is_none());
    }

    #[test]
    fn test_end_call_detection() {
        assert!(wants_end_call("Okay, END CALL now"));
        assert!(!wants_end_call("Calling the nurse"));
    }
}
