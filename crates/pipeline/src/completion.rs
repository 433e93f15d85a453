//! HTTP client for an OpenAI-compatible chat completions endpoint.
//!
//! The reply's message content is expected to hold a JSON document, possibly
//! wrapped in a Markdown code fence.

use std::time::Duration;

use async_trait::async_trait;
use autopilot_core::recommendation::extract_json_block;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::CompletionConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::store::CompletionService;

const SYSTEM_PROMPT: &str = "You are an SEO analyst. Reply with a single JSON document that \
    matches the provided schema and nothing else.";

pub struct HttpCompletionClient {
    config: CompletionConfig,
    client: Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    response_format: ResponseFormat<'a>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: JsonSchemaSpec<'a>,
}

#[derive(Debug, Serialize)]
struct JsonSchemaSpec<'a> {
    name: &'static str,
    schema: &'a serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

impl HttpCompletionClient {
    /// `timeout` bounds each HTTP call; the pipeline applies its own timeout on top.
    pub fn new(config: CompletionConfig, timeout: Duration) -> Result<Self, PipelineError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::Completion(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.config.endpoint)
    }
}

/// Turn a chat reply's text into a JSON document.
fn parse_reply(content: &str) -> PipelineResult<serde_json::Value> {
    let body = extract_json_block(content);
    serde_json::from_str(body)
        .map_err(|e| PipelineError::Validation(format!("reply is not valid JSON: {e}")))
}

#[async_trait]
impl CompletionService for HttpCompletionClient {
    async fn complete(
        &self,
        prompt: &str,
        response_schema: &serde_json::Value,
    ) -> PipelineResult<serde_json::Value> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            response_format: ResponseFormat {
                kind: "json_schema",
                json_schema: JsonSchemaSpec {
                    name: "recommendations",
                    schema: response_schema,
                },
            },
        };

        let mut builder = self.client.post(self.url()).json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        tracing::debug!(model = %self.config.model, prompt_len = prompt.len(), "Requesting completion");
        let resp = builder
            .send()
            .await
            .map_err(|e| PipelineError::Completion(format!("connection failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PipelineError::Completion(format!("HTTP {status}: {body}")));
        }

        let reply: ChatResponse = resp
            .json()
            .await
            .map_err(|e| PipelineError::Completion(format!("unexpected response body: {e}")))?;

        let content = reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| PipelineError::Validation("reply has no message content".into()))?;

        parse_reply(&content)
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn parses_fenced_reply() {
        let value = parse_reply("```json\n{\"recommendations\": []}\n```").unwrap();
        assert_eq!(value["recommendations"], serde_json::json!([]));
    }

    #[test]
    fn rejects_prose_reply() {
        assert_matches!(
            parse_reply("Here are my suggestions: shorten titles."),
            Err(PipelineError::Validation(_))
        );
    }

    #[test]
    fn url_joins_endpoint() {
        let client = HttpCompletionClient::new(
            CompletionConfig {
                endpoint: "https://llm.internal/v1".into(),
                ..Default::default()
            },
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(client.url(), "https://llm.internal/v1/chat/completions");
        assert_eq!(client.model(), "gpt-4o-mini");
    }
}
