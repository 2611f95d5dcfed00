use crate::dispatcher::{Dispatcher, CLARIFY, EMPTY_QUESTION};
use axum::{
    body::Bytes,
    extract::{Extension, Json},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use protocol::{AskRequest, AskResponse, SkillRequest, SkillResponse};
use serde_json::json;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", post(skill_webhook))
        .route("/alexa", post(ask))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(Extension(state))
}

/// Voice-platform entry point. Always answers 200 with speech, even when the
/// body cannot be parsed.
async fn skill_webhook(Extension(state): Extension<AppState>, body: Bytes) -> impl IntoResponse {
    let response = match serde_json::from_slice::<SkillRequest>(&body) {
        Ok(req) => state.dispatcher.handle(&req).await,
        Err(err) => {
            warn!(error = %err, "unparseable skill request");
            SkillResponse::speak(CLARIFY, false)
        }
    };
    Json(response)
}

/// Simplified endpoint for manual testing: `{pergunta}` in, `{resposta}` out.
async fn ask(Extension(state): Extension<AppState>, body: Bytes) -> impl IntoResponse {
    let req = serde_json::from_slice::<AskRequest>(&body).unwrap_or_default();
    info!(pergunta = req.pergunta.as_deref().unwrap_or(""), "test endpoint request");

    let resposta = match req.pergunta.as_deref() {
        Some(question) if !question.trim().is_empty() => state.dispatcher.answer(question).await,
        _ => EMPTY_QUESTION.to_string(),
    };
    Json(AskResponse { resposta })
}

async fn health_check() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}
