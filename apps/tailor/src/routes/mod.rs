pub mod health;
pub mod providers;
pub mod tailor;
pub mod ui;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::limit::RequestBodyLimitLayer;

use crate::state::AppState;

/// Room for the text fields and multipart framing on top of the resume itself.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes.saturating_add(FORM_OVERHEAD_BYTES);

    Router::new()
        .route("/", get(ui::index_handler))
        .route("/health", get(health::health_handler))
        .route("/api/v1/providers", get(providers::handle_list_providers))
        .route(
            "/api/v1/providers/:provider/test",
            post(providers::handle_test_provider),
        )
        .route("/api/v1/resume/preview", post(tailor::handle_preview))
        .route("/api/v1/tailor", post(tailor::handle_tailor))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .with_state(state)
}


#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::test_support::{app, json_body, test_config};
    use crate::llm_client::mock::{ScriptedFactory, ScriptedGenerator};

    #[tokio::test]
    async fn test_health() {
        let app = app(test_config(), ScriptedFactory::new(ScriptedGenerator::new(&[])));
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "resume-tailor");
    }

    #[tokio::test]
    async fn test_index_page_served() {
        let app = app(test_config(), ScriptedFactory::new(ScriptedGenerator::new(&[])));
        let response = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("/api/v1/tailor"));
    }

    #[tokio::test]
    async fn test_router_builds_with_largest_upload_limit() {
        let mut config = test_config();
        config.max_upload_bytes = usize::MAX;
        let app = app(config, ScriptedFactory::new(ScriptedGenerator::new(&[])));
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
