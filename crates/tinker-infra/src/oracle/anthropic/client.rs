//! AnthropicOracle: concrete [`ReasoningOracle`] backed by Anthropic Claude.
//!
//! The API key is wrapped in [`secrecy::SecretString`] and is never logged
//! or included in `Debug` output.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use tinker_core::oracle::{OracleError, OracleQuery, OracleResponse, ReasoningOracle};
use tinker_types::task::{PlannedAction, SHELL_ACTION_KIND};

use super::prompt::{self, GOAL_ACHIEVED, NO_ACTION};
use super::types::{
    AnthropicContentBlock, AnthropicRequest, AnthropicResponse, AnthropicTool, SHELL_TOOL_NAME,
};

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Anthropic Claude reasoning oracle.
pub struct AnthropicOracle {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicOracle {
    /// The Anthropic API version header value.
    const API_VERSION: &'static str = "2023-06-01";

    /// Create a new oracle.
    ///
    /// * `api_key` - Anthropic API key wrapped in SecretString
    /// * `model` - Model identifier (e.g., "claude-sonnet-4-20250514")
    pub fn new(api_key: SecretString, model: String, max_tokens: u32) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| OracleError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: "https://api.anthropic.com".to_string(),
            model,
            max_tokens,
        })
    }

    /// Create an oracle with the key from `ANTHROPIC_API_KEY`.
    pub fn from_env(model: String, max_tokens: u32) -> Result<Self, OracleError> {
        let key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| OracleError::NotConfigured(format!("{API_KEY_ENV} is not set")))?;
        Self::new(SecretString::from(key), model, max_tokens)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Override the base URL (useful for testing or proxies).
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request_for(&self, query: &OracleQuery<'_>) -> AnthropicRequest {
        let prompt = prompt::build(query);
        AnthropicRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: prompt.messages,
            system: prompt.system,
            tools: if prompt.offer_shell_tool {
                vec![AnthropicTool::shell()]
            } else {
                Vec::new()
            },
        }
    }

    async fn send(&self, body: &AnthropicRequest) -> Result<AnthropicResponse, OracleError> {
        let response = self
            .client
            .post(self.url("/v1/messages"))
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", Self::API_VERSION)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| OracleError::Request(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 => OracleError::NotConfigured("authentication failed".to_string()),
                _ => OracleError::Request(format!("HTTP {status}: {error_body}")),
            });
        }

        response
            .json()
            .await
            .map_err(|e| OracleError::InvalidResponse(format!("failed to parse response: {e}")))
    }
}

// AnthropicOracle intentionally does NOT derive Debug; the SecretString
// already redacts, and the rest is not useful in logs.

impl ReasoningOracle for AnthropicOracle {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn consult(&self, query: &OracleQuery<'_>) -> Result<OracleResponse, OracleError> {
        let body = self.request_for(query);
        let response = self.send(&body).await?;

        tracing::debug!(
            query = query.name(),
            model = %response.model,
            stop_reason = response.stop_reason.as_deref().unwrap_or("none"),
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "oracle answered"
        );

        Ok(interpret(query, &response))
    }
}

/// Turn a raw API answer into the typed response for `query`.
fn interpret(query: &OracleQuery<'_>, response: &AnthropicResponse) -> OracleResponse {
    let text = response.text();
    match query {
        OracleQuery::Analyze { .. } => OracleResponse::narrative(text).with_actions(tool_actions(response)),
        OracleQuery::Synthesize { .. } => OracleResponse::narrative(text),
        OracleQuery::Think { .. } => {
            let done = text.contains(GOAL_ACHIEVED);
            let response = OracleResponse::narrative(text);
            if done { response.finished() } else { response }
        }
        OracleQuery::SelectAction { .. } => {
            let command = text.trim();
            let actions = if command.is_empty() || command == NO_ACTION {
                Vec::new()
            } else {
                vec![PlannedAction::shell(command)]
            };
            OracleResponse::narrative(command).with_actions(actions)
        }
    }
}

/// `tool_use` blocks as planned actions. Shell tool calls become `shell`
/// actions; any other tool name passes through as its own kind.
fn tool_actions(response: &AnthropicResponse) -> Vec<PlannedAction> {
    response
        .content
        .iter()
        .filter_map(|block| match block {
            AnthropicContentBlock::ToolUse { name, input, .. } => {
                let kind = if name == SHELL_TOOL_NAME {
                    SHELL_ACTION_KIND
                } else {
                    name.as_str()
                };
                let params = match input {
                    Value::Object(_) => input.clone(),
                    _ => Value::Object(Default::default()),
                };
                Some(PlannedAction::new(kind, params))
            }
            _ => None,
        })
        .collect()
}
