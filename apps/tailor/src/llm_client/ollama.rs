//! Local Ollama server: `/api/generate` for completions, `/api/tags` for installed
//! models. No API key; longer timeout.

use serde::{Deserialize, Serialize};

use super::{LlmClient, LlmError};

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    top_p: f32,
    num_predict: u32,
    repeat_penalty: f32,
    stop: [&'static str; 1],
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            top_p: 0.8,
            num_predict: 2000,
            repeat_penalty: 1.1,
            // Small models tend to ramble past the answer.
            stop: ["\n\n\n"],
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<InstalledModel>,
}

#[derive(Debug, Deserialize)]
struct InstalledModel {
    name: String,
}

pub(super) async fn generate(
    client: &LlmClient,
    prompt: &str,
    system: &str,
) -> Result<String, LlmError> {
    let body = GenerateRequest {
        model: client.model(),
        prompt,
        system,
        stream: false,
        options: GenerateOptions::default(),
    };
    let url = client.endpoint("api/generate");

    let raw = client
        .send_with_retry(|http| http.post(&url).json(&body))
        .await?;
    let response: GenerateResponse = client.parse_body(&raw)?;
    client.non_empty(response.response.as_deref())
}

/// Models installed on the server; falls back to the suggested list when the server
/// reports none.
pub(super) async fn list_models(client: &LlmClient) -> Result<Vec<String>, LlmError> {
    let url = client.endpoint("api/tags");
    let raw = client.send_with_retry(|http| http.get(&url)).await?;
    let tags: TagsResponse = client.parse_body(&raw)?;

    if tags.models.is_empty() {
        return Ok(client
            .provider()
            .suggested_models()
            .iter()
            .map(|m| m.to_string())
            .collect());
    }
    Ok(tags.models.into_iter().map(|m| m.name).collect())
}

#[cfg(test)]
mod tests {
    use axum::{
        routing::{get, post},
        Json, Router,
    };
    use serde_json::{json, Value};

    use crate::llm_client::mock::{serve, settings_for};
    use crate::llm_client::{LlmClient, LlmError, ModelSelection, ProviderKind, TextGenerator};

    #[tokio::test]
    async fn test_generate_uses_configured_model_and_options() {
        let router = Router::new().route(
            "/api/generate",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["model"], "phi3:mini");
                assert_eq!(body["stream"], false);
                assert_eq!(body["options"]["num_predict"], 2000);
                Json(json!({"response": "  Summary text.\n", "done": true}))
            }),
        );
        let base = serve(router).await;
        let client = LlmClient::new(
            &ModelSelection::provider(ProviderKind::Local),
            &settings_for(&base),
            None,
        )
        .unwrap();
        assert_eq!(client.generate("p", "s").await.unwrap(), "Summary text.");
    }

    #[tokio::test]
    async fn test_model_not_found_is_api_error() {
        let router = Router::new().route(
            "/api/generate",
            post(|| async {
                (
                    axum::http::StatusCode::NOT_FOUND,
                    Json(json!({"error": "model 'mistral' not found, try pulling it first"})),
                )
            }),
        );
        let base = serve(router).await;
        let client = LlmClient::new(
            &ModelSelection::parse("ollama:mistral").unwrap(),
            &settings_for(&base),
            None,
        )
        .unwrap();
        match client.generate("p", "s").await.unwrap_err() {
            LlmError::Api { status, message, .. } => {
                assert_eq!(status, 404);
                assert!(message.contains("not found"));
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_list_models_reads_tags() {
        let router = Router::new().route(
            "/api/tags",
            get(|| async {
                Json(json!({"models": [{"name": "mistral:latest"}, {"name": "phi3:mini"}]}))
            }),
        );
        let base = serve(router).await;
        let client = LlmClient::new(
            &ModelSelection::provider(ProviderKind::Local),
            &settings_for(&base),
            None,
        )
        .unwrap();
        assert_eq!(
            client.list_models().await.unwrap(),
            vec!["mistral:latest".to_string(), "phi3:mini".to_string()]
        );
    }

    #[tokio::test]
    async fn test_list_models_falls_back_when_none_installed() {
        let router =
            Router::new().route("/api/tags", get(|| async { Json(json!({"models": []})) }));
        let base = serve(router).await;
        let client = LlmClient::new(
            &ModelSelection::provider(ProviderKind::Local),
            &settings_for(&base),
            None,
        )
        .unwrap();
        let models = client.list_models().await.unwrap();
        assert!(models.contains(&"phi3:mini".to_string()));
    }
}
