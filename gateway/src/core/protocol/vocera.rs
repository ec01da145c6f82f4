//! Downstream (Vocera client) wire messages.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Frame received from a downstream client: `{"content": "..."}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoceraInbound {
    #[serde(default)]
    pub content: Option<String>,
}

impl VoceraInbound {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
        }
    }

    /// Trimmed message text, or `None` when missing or whitespace-only
    pub fn text(&self) -> Option<&str> {
        self.content
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }
}

/// Frame sent to a downstream client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role")]
pub enum VoceraOutbound {
    #[serde(rename = "agent")]
    Agent { content: String },
    #[serde(rename = "user")]
    User { content: String },
    #[serde(rename = "Function Call")]
    FunctionCall { data: FunctionCallData },
    #[serde(rename = "Function Call Result")]
    FunctionCallResult { data: FunctionCallResultData },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCallData {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCallResultData {
    pub id: String,
    pub result: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_inbound_text_trims() {
        let msg: VoceraInbound = serde_json::from_str(r#"{"content": "  hi there \n"}"#).unwrap();
        assert_eq!(msg.text(), Some("hi there"));
    }

    #[test]
    fn test_inbound_blank_or_missing() {
        let blank: VoceraInbound = serde_json::from_str(r#"{"content": "   "}"#).unwrap();
        assert_eq!(blank.text(), None);

        let missing: VoceraInbound = serde_json::from_str(r#"{"other": 1}"#).unwrap();
        assert_eq!(missing.text(), None);
    }

    #[test]
    fn test_outbound_shapes() {
        assert_eq!(
            serde_json::to_value(VoceraOutbound::Agent {
                content: "Hello".to_string()
            })
            .unwrap(),
            json!({"role": "agent", "content": "Hello"})
        );

        assert_eq!(
            serde_json::to_value(VoceraOutbound::FunctionCall {
                data: FunctionCallData {
                    id: "t1".to_string(),
                    name: "page_nurse".to_string(),
                    arguments: json!("{\"unit\":\"ICU\"}"),
                }
            })
            .unwrap(),
            json!({
                "role": "Function Call",
                "data": {"id": "t1", "name": "page_nurse", "arguments": "{\"unit\":\"ICU\"}"}
            })
        );

        assert_eq!(
            serde_json::to_value(VoceraOutbound::FunctionCallResult {
                data: FunctionCallResultData {
                    id: "t1".to_string(),
                    result: "paged".to_string(),
                }
            })
            .unwrap(),
            json!({"role": "Function Call Result", "data": {"id": "t1", "result": "paged"}})
        );
    }
}
