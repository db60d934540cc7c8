//! OpenAI-compatible Chat Completions integration.
//!
//! Works against api.openai.com and Azure OpenAI deployments that expose the
//! same request shape. Constrained generation is implemented with a strict
//! JSON-schema response format whose single property is an enum over the
//! allowed tokens, so the provider itself restricts the output alphabet.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use quizbench_core::error::{ModelError, Result};
use quizbench_core::message::Message;
use quizbench_core::model::{CallOptions, ChatModel, ChatResult, check_allowed_tokens};

// ---------------------------------------------------------------------------
// Chat Completions API request/response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct OpenAiRequest {
    pub model: String,
    pub messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<OpenAiResponseFormat>,
}

#[derive(Debug, Serialize)]
pub struct OpenAiMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct OpenAiResponseFormat {
    #[serde(rename = "type")]
    pub format_type: String,
    pub json_schema: OpenAiJsonSchema,
}

#[derive(Debug, Serialize)]
pub struct OpenAiJsonSchema {
    pub name: String,
    pub schema: serde_json::Value,
    pub strict: bool,
}

#[derive(Debug, Deserialize)]
pub struct OpenAiResponse {
    pub choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
pub struct OpenAiChoice {
    pub message: OpenAiResponseMessage,
}

#[derive(Debug, Deserialize)]
pub struct OpenAiResponseMessage {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OpenAiError {
    pub error: OpenAiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct OpenAiErrorDetail {
    pub message: String,
}

// ---------------------------------------------------------------------------
// Constrained-generation helpers
// ---------------------------------------------------------------------------

/// Strict schema restricting the response to `{"choice": <one of allowed>}`.
pub fn constrained_schema(allowed: &[String]) -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "choice": {
                "type": "string",
                "enum": allowed,
            }
        },
        "required": ["choice"],
        "additionalProperties": false,
    })
}

/// Extract and verify the constrained token from a response body.
pub fn parse_constrained_content(content: &str, allowed: &[String]) -> Result<String> {
    let value: serde_json::Value = serde_json::from_str(content)
        .map_err(|e| ModelError::InvalidResponse(format!("not a JSON object: {e}")))?;
    let token = value
        .get("choice")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ModelError::InvalidResponse("missing 'choice' field".into()))?;
    if !allowed.iter().any(|a| a == token) {
        return Err(
            ModelError::InvalidResponse(format!("token '{token}' outside allowed set")).into(),
        );
    }
    Ok(token.to_string())
}

// ---------------------------------------------------------------------------
// OpenAiChatModel
// ---------------------------------------------------------------------------

pub struct OpenAiChatModel {
    endpoint: String,
    api_key: String,
    model_id: String,
    client: reqwest::Client,
}

impl OpenAiChatModel {
    pub fn new(endpoint: String, api_key: String, model_id: String) -> Self {
        Self {
            endpoint,
            api_key,
            model_id,
            client: reqwest::Client::new(),
        }
    }

    pub fn build_request(
        &self,
        messages: &[Message],
        options: &CallOptions,
        response_format: Option<OpenAiResponseFormat>,
    ) -> OpenAiRequest {
        let api_messages = messages
            .iter()
            .map(|msg| OpenAiMessage {
                role: msg.role().into(),
                content: msg.content().into(),
            })
            .collect();

        OpenAiRequest {
            model: self.model_id.clone(),
            messages: api_messages,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            stop: if options.stop.is_empty() {
                None
            } else {
                Some(options.stop.clone())
            },
            response_format,
        }
    }

    async fn call(&self, request_body: &OpenAiRequest) -> Result<String> {
        let url = format!(
            "{}/chat/completions",
            self.endpoint.trim_end_matches('/')
        );
        tracing::debug!(model = %self.model_id, messages = request_body.messages.len(), "chat completion request");
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("api-key", &self.api_key)
            .json(request_body)
            .send()
            .await
            .map_err(|e| ModelError::ApiRequest(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read response body".into());
            let error_msg = serde_json::from_str::<OpenAiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(match status.as_u16() {
                401 | 403 => ModelError::Auth(error_msg),
                429 => ModelError::RateLimited {
                    retry_after_secs: retry_after,
                },
                _ => ModelError::ApiRequest(format!("HTTP {status}: {error_msg}")),
            }
            .into());
        }

        let api_response: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;

        api_response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| ModelError::InvalidResponse("empty completion".into()).into())
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn generate(&self, messages: &[Message], options: &CallOptions) -> Result<ChatResult> {
        let request_body = self.build_request(messages, options, None);
        let content = self.call(&request_body).await?;
        Ok(ChatResult {
            message: Message::assistant(content),
        })
    }

    async fn generate_constrained(
        &self,
        messages: &[Message],
        allowed: &[String],
    ) -> Result<String> {
        check_allowed_tokens(allowed)?;

        let format = OpenAiResponseFormat {
            format_type: "json_schema".into(),
            json_schema: OpenAiJsonSchema {
                name: "constrained_choice".into(),
                schema: constrained_schema(allowed),
                strict: true,
            },
        };
        let request_body = self.build_request(messages, &CallOptions::default(), Some(format));
        let content = self.call(&request_body).await?;
        parse_constrained_content(&content, allowed)
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}
