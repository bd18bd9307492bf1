//! Provider catalogue and connectivity self-test.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, Instrument};
use uuid::Uuid;

use crate::errors::AppError;
use crate::llm_client::{ModelSelection, ProviderKind};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ProviderInfo {
    pub name: ProviderKind,
    pub requires_api_key: bool,
    /// True when the server has a key (or none is needed).
    pub configured: bool,
    pub default_model: String,
    pub models: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ProvidersResponse {
    pub default_provider: ProviderKind,
    pub default_model: Option<String>,
    pub providers: Vec<ProviderInfo>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TestProviderRequest {
    pub api_key: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TestProviderResponse {
    pub provider: ProviderKind,
    pub model: Option<String>,
    pub status: &'static str,
    pub models: Vec<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/v1/providers
///
/// Lists every provider, whether the server can call it without a user key, and
/// the models offered in the picker.
pub async fn handle_list_providers(State(state): State<AppState>) -> Json<ProvidersResponse> {
    let settings = &state.config.providers;
    let providers = ProviderKind::ALL
        .into_iter()
        .map(|provider| ProviderInfo {
            name: provider,
            requires_api_key: provider.requires_api_key(),
            configured: settings.is_configured(provider),
            default_model: settings.default_model(provider).to_string(),
            models: provider
                .suggested_models()
                .iter()
                .map(|m| m.to_string())
                .collect(),
        })
        .collect();

    Json(ProvidersResponse {
        default_provider: state.config.default_model.provider,
        default_model: state.config.default_model.model.clone(),
        providers,
    })
}

/// POST /api/v1/providers/:provider/test
///
/// Sends a short prompt through the selected provider. For the local backend the
/// installed models are returned as well.
pub async fn handle_test_provider(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    body: Option<Json<TestProviderRequest>>,
) -> Result<Json<TestProviderResponse>, AppError> {
    let provider: ProviderKind = provider.parse()?;
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let selection = ModelSelection {
        provider,
        model: request.model.filter(|m| !m.trim().is_empty()),
    };

    let span = tracing::info_span!(
        "provider_test",
        request_id = %Uuid::new_v4(),
        provider = %provider
    );
    async move {
        let generator = state
            .generators
            .build(&selection, request.api_key.as_deref())?;
        generator.test_connection().await?;

        let models = if provider.is_local() {
            generator.list_models().await?
        } else {
            Vec::new()
        };
        info!("provider test passed");

        Ok::<_, AppError>(Json(TestProviderResponse {
            provider,
            model: selection.model,
            status: "ok",
            models,
        }))
    }
    .instrument(span)
    .await
}
