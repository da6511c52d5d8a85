//! # lingua-gateway
//!
//! The HTTP server and orchestration layer for the Lingua ML platform.
//!
//! This is the leaf crate — it imports from every service crate and
//! exposes the learner-facing API described in `spec.md` §6. No other
//! crate may import from here.
//!
//! ## Endpoints
//!
//! - `GET /health`
//! - `POST /knowledge-state`
//! - `POST /cognitive-load/session/init`
//! - `POST /cognitive-load/session/event`
//! - `GET /cognitive-load/session/{id}`
//! - `POST /cognitive-load/session/end`
//! - `POST /router/next-activity`
//! - `POST /router/observe-reward`
//! - `POST /story/select-words`
//! - `POST /story/update-preferences`
//! - `DELETE /user/{user_id}`
//!
//! ## Architecture Rules
//!
//! - This is the ONLY crate that wires every service together.
//! - No other `lingua-*` crate may depend on `lingua-gateway`.

pub mod models;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::state::AppState;

/// Builds the Axum router for the given [`AppState`], with the
/// `X-Api-Key` gate applied to every route (`spec.md` §6).
pub fn build_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/knowledge-state", post(routes::knowledge_state))
        .route("/cognitive-load/session/init", post(routes::cognitive_load_session_init))
        .route("/cognitive-load/session/event", post(routes::cognitive_load_session_event))
        .route("/cognitive-load/session/{id}", get(routes::cognitive_load_session_get))
        .route("/cognitive-load/session/end", post(routes::cognitive_load_session_end))
        .route("/router/next-activity", post(routes::router_next_activity))
        .route("/router/observe-reward", post(routes::router_observe_reward))
        .route("/story/select-words", post(routes::story_select_words))
        .route("/story/update-preferences", post(routes::story_update_preferences))
        .route("/user/{user_id}", delete(routes::delete_user))
        .layer(middleware::from_fn_with_state(state.clone(), routes::require_api_key))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
