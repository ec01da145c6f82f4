//! Request and trace types for the interact REST API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Greeting used when the launch request produces no text
pub const DEFAULT_GREETING: &str = "Hi! How can I help you today?";

/// Reply sent to the client when the backend request fails
pub const FALLBACK_REPLY: &str =
    "Sorry, I couldn't process your message. Please try again later.";

/// Content of the end-of-conversation notice
pub const CONVERSATION_ENDED: &str = "Conversation ended";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InteractRequest {
    pub action: Action,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Action {
    Launch,
    Text { payload: String },
}

/// One step of the agent's answer
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Trace {
    #[serde(rename = "type")]
    pub trace_type: String,
    #[serde(default)]
    pub payload: Value,
}

impl Trace {
    /// `payload.message` of a speak/text trace
    pub fn message(&self) -> Option<&str> {
        match self.trace_type.as_str() {
            "speak" | "text" => self
                .payload
                .get("message")
                .and_then(Value::as_str)
                .filter(|message| !message.is_empty()),
            _ => None,
        }
    }

    pub fn is_end(&self) -> bool {
        self.trace_type == "end"
    }
}

/// What a batch of traces amounts to for the client
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceOutcome {
    /// Collected messages joined with a space
    pub text: Option<String>,
    pub ended: bool,
}

impl TraceOutcome {
    pub fn from_traces(traces: &[Trace]) -> Self {
        let messages: Vec<&str> = traces.iter().filter_map(Trace::message).collect();
        Self {
            text: (!messages.is_empty()).then(|| messages.join(" ")),
            ended: traces.iter().any(Trace::is_end),
        }
    }
}

/// Frames sent to a client of the interact route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InteractReply {
    End {
        #[serde(rename = "type")]
        kind: String,
        content: String,
    },
    Content {
        content: String,
    },
}

impl InteractReply {
    pub fn content(content: impl Into<String>) -> Self {
        InteractReply::Content {
            content: content.into(),
        }
    }

    pub fn end() -> Self {
        InteractReply::End {
            kind: "end".to_string(),
            content: CONVERSATION_ENDED.to_string(),
        }
    }
}
