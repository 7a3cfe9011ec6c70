//! Generative text capability.
//!
//! A [`Generator`] receives role instructions, ordered context messages and an
//! output schema, and returns the raw JSON value the model produced. It does
//! not validate that value against the schema; callers do that explicitly.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, instrument};

use newsroom_shared::{ModelSelection, NewsroomError, Result};

use crate::http::{build_client, check_status, endpoint};

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Speaker of a context message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One context message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Declared shape of the structured output.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSchema {
    /// Contract name, `[a-z_]+`.
    pub name: String,
    /// JSON Schema document.
    pub schema: Value,
}

/// Everything one generative call needs.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub instructions: String,
    pub context: Vec<Message>,
    pub output: OutputSchema,
    pub model: ModelSelection,
}

/// Send role instructions + context, receive a value meant to match the schema.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn invoke(&self, request: &GenerationRequest) -> Result<Value>;
}

// ---------------------------------------------------------------------------
// OpenAI-compatible chat completions
// ---------------------------------------------------------------------------

/// Chat-completions client using `response_format: json_schema`.
pub struct OpenAiGenerator {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiGenerator {
    pub fn new(api_key: String, base_url: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            api_key,
            base_url,
        })
    }

    fn to_wire(&self, request: &GenerationRequest) -> ChatRequest {
        let mut messages = Vec::with_capacity(request.context.len() + 1);
        messages.push(ChatMessage {
            role: "system",
            content: request.instructions.clone(),
        });
        messages.extend(request.context.iter().map(|m| ChatMessage {
            role: match m.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            },
            content: m.content.clone(),
        }));

        ChatRequest {
            model: request.model.model.clone(),
            messages,
            response_format: json!({
                "type": "json_schema",
                "json_schema": {
                    "name": request.output.name,
                    "schema": request.output.schema,
                    "strict": true,
                }
            }),
            reasoning_effort: request.model.reasoning_effort.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    response_format: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_effort: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

#[async_trait]
impl Generator for OpenAiGenerator {
    #[instrument(skip_all, fields(contract = %request.output.name, model = %request.model.model))]
    async fn invoke(&self, request: &GenerationRequest) -> Result<Value> {
        let contract = request.output.name.as_str();
        let url = endpoint(&self.base_url, "chat/completions");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.to_wire(request))
            .send()
            .await
            .map_err(|e| NewsroomError::Network(format!("{url}: {e}")))?;
        let response = check_status(response)
            .await
            .map_err(|msg| NewsroomError::Network(format!("{url}: {msg}")))?;

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| NewsroomError::generation(contract, format!("unreadable response: {e}")))?;

        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| NewsroomError::generation(contract, "response has no choices"))?;

        if let Some(refusal) = choice.message.refusal {
            return Err(NewsroomError::generation(
                contract,
                format!("model refused: {refusal}"),
            ));
        }

        let content = choice.message.content.unwrap_or_default();
        debug!(
            chars = content.len(),
            finish_reason = choice.finish_reason.as_deref().unwrap_or("unknown"),
            "generation complete"
        );

        serde_json::from_str(&content).map_err(|e| {
            NewsroomError::generation(contract, format!("output is not valid JSON: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> GenerationRequest {
        GenerationRequest {
            instructions: "You are the assignment editor.".into(),
            context: vec![Message::user("Idea: tardigrades in space")],
            output: OutputSchema {
                name: "query_batch".into(),
                schema: json!({"type": "object"}),
            },
            model: ModelSelection {
                model: "gpt-5-mini".into(),
                reasoning_effort: Some("minimal".into()),
            },
        }
    }

    fn completion(content: &str) -> Value {
        json!({
            "choices": [{
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
            }]
        })
    }

    async fn generator(server: &MockServer) -> OpenAiGenerator {
        OpenAiGenerator::new("sk-test".into(), server.uri(), Duration::from_secs(5))
            .expect("client")
    }

    #[tokio::test]
    async fn sends_schema_and_parses_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "gpt-5-mini",
                "reasoning_effort": "minimal",
                "response_format": {"type": "json_schema", "json_schema": {"name": "query_batch"}},
                "messages": [
                    {"role": "system", "content": "You are the assignment editor."},
                    {"role": "user", "content": "Idea: tardigrades in space"}
                ]
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(completion(r#"{"queries":["tardigrade vacuum survival"]}"#)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let value = generator(&server)
            .await
            .invoke(&request())
            .await
            .expect("invoke");
        assert_eq!(value["queries"][0], "tardigrade vacuum survival");
    }

    #[tokio::test]
    async fn non_json_content_is_generation_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("Sure! Here you go")))
            .mount(&server)
            .await;

        let err = generator(&server)
            .await
            .invoke(&request())
            .await
            .expect_err("invalid");
        assert!(matches!(err, NewsroomError::Generation { ref contract, .. } if contract == "query_batch"));
    }

    #[tokio::test]
    async fn refusal_is_generation_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": null, "refusal": "cannot help"}}]
            })))
            .mount(&server)
            .await;

        let err = generator(&server)
            .await
            .invoke(&request())
            .await
            .expect_err("refused");
        assert!(err.to_string().contains("cannot help"));
    }

    #[tokio::test]
    async fn http_error_is_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let err = generator(&server)
            .await
            .invoke(&request())
            .await
            .expect_err("unauthorized");
        match err {
            NewsroomError::Network(msg) => {
                assert!(msg.contains("401"));
                assert!(msg.contains("bad key"));
            }
            other => panic!("expected network error, got {other:?}"),
        }
    }
}
