//! Anthropic Messages API types.
//!
//! Request/response structures for HTTP communication with the Messages API.
//! Only the subset the oracle sends and reads is modelled.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Name of the single tool offered to the model.
pub const SHELL_TOOL_NAME: &str = "execute_shell_command";

/// Request body for the Anthropic Messages API.
#[derive(Debug, Clone, Serialize)]
pub struct AnthropicRequest {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<AnthropicTool>,
}

/// A single message in an Anthropic conversation.
#[derive(Debug, Clone, Serialize)]
pub struct AnthropicMessage {
    pub role: String,
    pub content: String,
}

impl AnthropicMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// A tool definition offered to the model.
#[derive(Debug, Clone, Serialize)]
pub struct AnthropicTool {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl AnthropicTool {
    /// The shell tool: run one command in the sandbox.
    pub fn shell() -> Self {
        Self {
            name: SHELL_TOOL_NAME.to_string(),
            description: "Execute a shell command inside the Docker container. Use this for \
                          file operations, running programs, installing packages, git \
                          operations, etc."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "command": {
                        "type": "string",
                        "description": "The shell command to execute (e.g., 'ls -la', 'mkdir project')"
                    },
                    "reason": {
                        "type": "string",
                        "description": "Brief explanation of why this command is needed for the task"
                    }
                },
                "required": ["command", "reason"]
            }),
        }
    }
}

/// A content block in an Anthropic response.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum AnthropicContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    /// Block types the oracle does not read (thinking, server tools, ...).
    #[serde(other)]
    Other,
}

/// Token usage from Anthropic.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnthropicUsage {
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
}

/// Non-streaming response from the Anthropic Messages API.
#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicResponse {
    pub id: String,
    pub content: Vec<AnthropicContentBlock>,
    pub model: String,
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub usage: AnthropicUsage,
}

impl AnthropicResponse {
    /// All text blocks concatenated.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                AnthropicContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let req = AnthropicRequest {
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 1024,
            messages: vec![AnthropicMessage::user("Hello")],
            system: None,
            tools: vec![AnthropicTool::shell()],
        };

        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["max_tokens"], 1024);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["tools"][0]["name"], SHELL_TOOL_NAME);
        assert_eq!(
            json["tools"][0]["input_schema"]["required"],
            json!(["command", "reason"])
        );
        assert!(json.get("system").is_none());
    }

    #[test]
    fn test_tools_omitted_when_empty() {
        let req = AnthropicRequest {
            model: "m".to_string(),
            max_tokens: 10,
            messages: vec![],
            system: Some("s".to_string()),
            tools: vec![],
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("tools").is_none());
        assert_eq!(json["system"], "s");
    }

    #[test]
    fn test_response_deserialization() {
        let raw = json!({
            "id": "msg_01",
            "type": "message",
            "role": "assistant",
            "model": "claude-sonnet-4-20250514",
            "content": [
                {"type": "text", "text": "Listing "},
                {"type": "text", "text": "files."},
                {"type": "tool_use", "id": "toolu_1", "name": "execute_shell_command",
                 "input": {"command": "ls -la", "reason": "inspect"}},
                {"type": "thinking", "thinking": "hmm", "signature": "x"}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 12, "output_tokens": 30}
        });

        let resp: AnthropicResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(resp.text(), "Listing files.");
        assert_eq!(resp.content.len(), 4);
        assert!(matches!(resp.content[3], AnthropicContentBlock::Other));
        assert_eq!(resp.usage.output_tokens, 30);
    }
}
