//! Route handlers.

use axum::extract::State;
use axum::Json;
use serde_json::{Map, Value};
use tracing::info;

use crate::auth::{self, CurrentUser};
use crate::dto::{
    AnalyzeRequest, AnalyzeResponse, HealthResponse, RegisterRequest, TokenForm, TokenResponse,
    UserResponse,
};
use crate::extract::{ApiForm, ApiJson};
use crate::metrics::{ModelMetrics, load_metrics};
use crate::{ApiError, AppState};

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<RegisterRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let email = body.email.trim();
    if email.is_empty() || body.password.is_empty() {
        return Err(ApiError::Validation(
            "email and password must not be empty".to_string(),
        ));
    }

    let hash = auth::hash_password_blocking(body.password).await?;
    let user = state.store.create_user(email, &hash).await?;
    info!(user_id = user.id, "registered user");
    Ok(Json(user.into()))
}

pub async fn token(
    State(state): State<AppState>,
    ApiForm(form): ApiForm<TokenForm>,
) -> Result<Json<TokenResponse>, ApiError> {
    let user = auth::authenticate(state.store.as_ref(), form.username.trim(), &form.password).await?;
    let token = auth::issue_token(&state.auth, &user.email)?;
    info!(user_id = user.id, "issued access token");
    Ok(Json(TokenResponse::bearer(token)))
}

pub async fn me(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(user.into())
}

pub async fn analyze(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(body): ApiJson<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    info!(user_id = user.id, chars = body.text.len(), "analyze request");
    run_analysis(&state, body.text).await
}

pub async fn analyze_public(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    info!(chars = body.text.len(), "public analyze request");
    run_analysis(&state, body.text).await
}

/// Classify, then log exactly one row. A failed inference logs nothing.
async fn run_analysis(state: &AppState, text: String) -> Result<Json<AnalyzeResponse>, ApiError> {
    let prediction = state.model.analyze(&text).await?;
    let row = state
        .store
        .log_analysis(&text, prediction.label, prediction.confidence)
        .await?;
    Ok(Json(AnalyzeResponse {
        sentiment: prediction.label,
        confidence: prediction.confidence,
        timestamp: row.created_at,
    }))
}

pub async fn model_info(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Json<Map<String, Value>> {
    info!(user_id = user.id, "model info request");
    Json(state.model.model_info().await.into_map())
}

pub async fn model_metrics(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ModelMetrics>, ApiError> {
    info!(user_id = user.id, "model metrics request");
    let settings = state.settings.clone();
    let metrics = tokio::task::spawn_blocking(move || {
        load_metrics(&settings.evaluation_dir, &settings.model_path)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("metrics task failed: {e}")))?;
    Ok(Json(metrics))
}
