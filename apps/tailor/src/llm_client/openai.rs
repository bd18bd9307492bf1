//! OpenAI-compatible chat completions. Groq serves the same API under its own base
//! URL, so both providers share this module.

use serde::{Deserialize, Serialize};

use super::{LlmClient, LlmError, ProviderKind};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

/// Sampling per provider: Groq runs cooler with a tighter budget.
fn sampling(provider: ProviderKind) -> (u32, f32, f32) {
    match provider {
        ProviderKind::Groq => (500, 0.3, 0.8),
        _ => (2000, 0.7, 0.9),
    }
}

pub(super) async fn complete(
    client: &LlmClient,
    prompt: &str,
    system: &str,
) -> Result<String, LlmError> {
    let (max_tokens, temperature, top_p) = sampling(client.provider());
    let body = ChatRequest {
        model: client.model(),
        messages: [
            ChatMessage {
                role: "system",
                content: system,
            },
            ChatMessage {
                role: "user",
                content: prompt,
            },
        ],
        max_tokens,
        temperature,
        top_p,
    };
    let url = client.endpoint("chat/completions");

    let raw = client
        .send_with_retry(|http| http.post(&url).bearer_auth(client.api_key()).json(&body))
        .await?;
    let response: ChatResponse = client.parse_body(&raw)?;

    if let Some(usage) = &response.usage {
        tracing::debug!(
            "{} usage: prompt_tokens={}, completion_tokens={}",
            client.provider(),
            usage.prompt_tokens,
            usage.completion_tokens
        );
    }

    let text = response
        .choices
        .first()
        .and_then(|c| c.message.as_ref())
        .and_then(|m| m.content.as_deref());
    client.non_empty(text)
}
