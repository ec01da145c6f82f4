//! Per-session conversation transcript.
//!
//! The transcript is an append-only log. Turns are serialized in the shape the
//! upstream agent protocol expects inside `transcript` /
//! `transcript_with_tool_calls` arrays.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role of a single transcript turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TurnRole {
    User,
    Agent,
    ToolCallInvocation,
    ToolCallResult,
}

impl fmt::Display for TurnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnRole::User => write!(f, "user"),
            TurnRole::Agent => write!(f, "agent"),
            TurnRole::ToolCallInvocation => write!(f, "tool_call_invocation"),
            TurnRole::ToolCallResult => write!(f, "tool_call_result"),
        }
    }
}

/// One entry of the transcript, immutable once appended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Turn {
    User {
        content: String,
    },
    Agent {
        content: String,
    },
    ToolCallInvocation {
        tool_call_id: String,
        name: String,
        arguments: Value,
    },
    ToolCallResult {
        tool_call_id: String,
        content: String,
    },
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Turn::User {
            content: content.into(),
        }
    }

    pub fn agent(content: impl Into<String>) -> Self {
        Turn::Agent {
            content: content.into(),
        }
    }

    pub fn role(&self) -> TurnRole {
        match self {
            Turn::User { .. } => TurnRole::User,
            Turn::Agent { .. } => TurnRole::Agent,
            Turn::ToolCallInvocation { .. } => TurnRole::ToolCallInvocation,
            Turn::ToolCallResult { .. } => TurnRole::ToolCallResult,
        }
    }

    /// Spoken turns (user or agent), as opposed to tool-call bookkeeping
    pub fn is_utterance(&self) -> bool {
        matches!(self, Turn::User { .. } | Turn::Agent { .. })
    }
}

/// Ordered, append-only sequence of turns
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Number of user turns recorded so far
    pub fn user_turns(&self) -> usize {
        self.turns
            .iter()
            .filter(|turn| turn.role() == TurnRole::User)
            .count()
    }

    /// User and agent turns only, in order
    pub fn utterances(&self) -> Vec<Turn> {
        self.turns
            .iter()
            .filter(|turn| turn.is_utterance())
            .cloned()
            .collect()
    }

    /// Every turn including tool-call entries, in order
    pub fn with_tool_calls(&self) -> Vec<Turn> {
        self.turns.clone()
    }
}
