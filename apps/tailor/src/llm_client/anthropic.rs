//! Anthropic Messages API.

use serde::{Deserialize, Serialize};

use super::{LlmClient, LlmError};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 2000;

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

impl AnthropicResponse {
    /// Text of the first text block.
    fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

pub(super) async fn complete(
    client: &LlmClient,
    prompt: &str,
    system: &str,
) -> Result<String, LlmError> {
    let body = AnthropicRequest {
        model: client.model(),
        max_tokens: MAX_TOKENS,
        temperature: 0.7,
        system,
        messages: vec![AnthropicMessage {
            role: "user",
            content: prompt,
        }],
    };
    let url = client.endpoint("messages");

    let raw = client
        .send_with_retry(|http| {
            http.post(&url)
                .header("x-api-key", client.api_key())
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&body)
        })
        .await?;
    let response: AnthropicResponse = client.parse_body(&raw)?;

    if let Some(usage) = &response.usage {
        tracing::debug!(
            "anthropic usage: input_tokens={}, output_tokens={}",
            usage.input_tokens,
            usage.output_tokens
        );
    }

    client.non_empty(response.text())
}

#[cfg(test)]
mod tests {
    use axum::{http::HeaderMap, routing::post, Json, Router};
    use serde_json::{json, Value};

    use crate::llm_client::mock::{serve, settings_for};
    use crate::llm_client::{LlmClient, ModelSelection, TextGenerator};

    #[tokio::test]
    async fn test_messages_request_and_first_text_block() {
        let router = Router::new().route(
            "/messages",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(headers["x-api-key"], "sk-ant-test");
                assert_eq!(headers["anthropic-version"], "2023-06-01");
                assert_eq!(body["system"], "sys");
                assert_eq!(body["model"], "claude-3-haiku-20240307");
                assert_eq!(body["messages"][0]["role"], "user");
                Json(json!({
                    "content": [
                        {"type": "thinking", "text": null},
                        {"type": "text", "text": "Rust, Go, Kafka"}
                    ],
                    "usage": {"input_tokens": 40, "output_tokens": 6}
                }))
            }),
        );
        let base = serve(router).await;
        let client = LlmClient::new(
            &ModelSelection::parse("claude-3-haiku-20240307").unwrap(),
            &settings_for(&base),
            None,
        )
        .unwrap();

        assert_eq!(client.generate("skills", "sys").await.unwrap(), "Rust, Go, Kafka");
    }
}
