//! Axum route handlers for the HTTP API (`spec.md` §6-§7).

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;

use lingua_core::{LinguaError, UserId};
use lingua_data::DataReader;
use lingua_story::StorySegment;

use crate::models::{
    ErasureResponse, ErrorResponse, HealthResponse, KnowledgeStateRequest, KnowledgeStateResponse,
    NextActivityRequest, ObserveRewardRequest, SelectWordsRequest, SessionEndResponse,
    SessionEventRequest, SessionEventResponse, SessionInitRequest, UpdatePreferencesRequest,
};
use crate::state::AppState;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

/// Maps a [`LinguaError`] onto the HTTP status + detail taxonomy from
/// `spec.md` §7. `ModelNotTrained` and `DependencyUnavailable` are
/// mapped here only for routes with no local fallback; routes with a
/// defined degradation handle those variants themselves before this
/// is ever reached.
fn error_response(err: LinguaError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &err {
        LinguaError::Validation { .. } => StatusCode::BAD_REQUEST,
        LinguaError::Authentication { .. } => StatusCode::UNAUTHORIZED,
        LinguaError::NotFound { .. } => StatusCode::NOT_FOUND,
        LinguaError::DependencyUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        LinguaError::ModelNotTrained { .. } => StatusCode::SERVICE_UNAVAILABLE,
        LinguaError::ArtifactMismatch { .. }
        | LinguaError::TransientTrainingFailure { .. }
        | LinguaError::PermanentTrainingFailure { .. }
        | LinguaError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    tracing::warn!(error = %err, %status, "request failed");
    (status, Json(ErrorResponse { detail: err.to_string() }))
}

/// Rejects requests missing `X-Api-Key` when a non-empty secret is
/// configured; auth is bypassed in development mode (`spec.md` §6).
pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Result<axum::response::Response, (StatusCode, Json<ErrorResponse>)> {
    if state.api_key.is_empty() {
        return Ok(next.run(request).await);
    }
    let presented = headers
        .get(crate::state::API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());
    if presented != Some(state.api_key.as_str()) {
        return Err(error_response(LinguaError::Authentication {
            message: "missing or invalid X-Api-Key".to_string(),
        }));
    }
    Ok(next.run(request).await)
}

/// `GET /health` (`spec.md` §6).
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let cache_health = state.cache.health().await;
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        linucb_loaded: true,
        ppo_loaded: state.router.ppo_loaded().await,
        cache_connected: cache_health.connected,
    })
}

/// `POST /knowledge-state`.
pub async fn knowledge_state(
    State(state): State<Arc<AppState>>,
    Json(req): Json<KnowledgeStateRequest>,
) -> ApiResult<KnowledgeStateResponse> {
    let knowledge = state.tracer.knowledge_state(req.user_id).await.map_err(error_response)?;
    Ok(Json(KnowledgeStateResponse { state: knowledge }))
}

/// `POST /cognitive-load/session/init`.
pub async fn cognitive_load_session_init(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SessionInitRequest>,
) -> impl IntoResponse {
    state.cognitive_load.init_session(
        req.session_id,
        req.user_id,
        req.module_source,
        req.user_baseline_ms,
        std::collections::HashMap::new(),
        std::collections::HashMap::new(),
    );
    StatusCode::OK
}

/// `POST /cognitive-load/session/event`.
pub async fn cognitive_load_session_event(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SessionEventRequest>,
) -> Json<SessionEventResponse> {
    let cognitive_load = state.cognitive_load.record_event(
        req.session_id,
        req.word_id,
        req.word_status,
        req.response_time_ms,
        req.sequence_number_in_session,
    );
    Json(SessionEventResponse { cognitive_load })
}

/// `GET /cognitive-load/session/{id}`.
pub async fn cognitive_load_session_get(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<lingua_core::SessionId>,
) -> ApiResult<lingua_core::CognitiveLoadSnapshot> {
    match state.cognitive_load.get_session_load(session_id).await.map_err(error_response)? {
        Some(snapshot) => Ok(Json(snapshot)),
        None => Err(error_response(LinguaError::not_found("session", session_id.to_string()))),
    }
}

/// `POST /cognitive-load/session/end`.
pub async fn cognitive_load_session_end(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SessionInitRequest>,
) -> Json<SessionEndResponse> {
    let average_load = state.cognitive_load.end_session(req.session_id);
    Json(SessionEndResponse { average_load })
}

/// `POST /router/next-activity`.
pub async fn router_next_activity(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NextActivityRequest>,
) -> ApiResult<lingua_core::RoutingDecision> {
    let decision = state
        .router
        .next_activity(req.user_id, req.session_id, req.estimated_available_minutes)
        .await
        .map_err(error_response)?;
    Ok(Json(decision))
}

/// `POST /router/observe-reward`.
pub async fn router_observe_reward(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ObserveRewardRequest>,
) -> ApiResult<Option<lingua_core::RewardObservation>> {
    let observation = state.router.observe_reward(req.decision_id).await.map_err(error_response)?;
    Ok(Json(observation))
}

/// `POST /story/select-words`.
pub async fn story_select_words(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SelectWordsRequest>,
) -> ApiResult<lingua_story::StorySelection> {
    let selection = state
        .story
        .select_words(req.user_id, req.target_word_count, req.complexity_level)
        .await
        .map_err(error_response)?;
    Ok(Json(selection))
}

/// `POST /story/update-preferences`.
pub async fn story_update_preferences(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdatePreferencesRequest>,
) -> ApiResult<lingua_core::UserTopicPreference> {
    let preference = state
        .data
        .get_topic_preference(req.user_id)
        .await
        .map_err(error_response)?
        .unwrap_or_else(|| lingua_core::UserTopicPreference::new(req.user_id));
    let segments: Vec<StorySegment> = req
        .segments
        .into_iter()
        .map(|s| StorySegment { topic_tags: s.topic_tags, seconds_spent: s.seconds_spent })
        .collect();
    let updated = state.story.update_preferences(preference, &segments).await.map_err(error_response)?;
    Ok(Json(updated))
}

/// `DELETE /user/{user_id}` — gateway-only GDPR erasure (`spec.md` §4.11).
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<UserId>,
) -> Json<ErasureResponse> {
    let summary = state.erasure.delete_user(user_id).await;
    Json(ErasureResponse { summary })
}
