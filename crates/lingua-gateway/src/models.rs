//! Request/response DTOs for the HTTP API (`spec.md` §6).

use serde::{Deserialize, Serialize};

use lingua_core::{ModuleSource, SessionId, UserId, WordId, WordStatus};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub linucb_loaded: bool,
    pub ppo_loaded: bool,
    pub cache_connected: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeStateRequest {
    pub user_id: UserId,
}

#[derive(Debug, Serialize)]
pub struct KnowledgeStateResponse {
    #[serde(flatten)]
    pub state: lingua_tracer::KnowledgeState,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInitRequest {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub module_source: ModuleSource,
    pub user_baseline_ms: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEventRequest {
    pub session_id: SessionId,
    pub word_id: Option<WordId>,
    pub word_status: Option<WordStatus>,
    pub response_time_ms: u32,
    pub sequence_number_in_session: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEventResponse {
    pub cognitive_load: Option<f32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEndResponse {
    pub average_load: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextActivityRequest {
    pub user_id: UserId,
    pub session_id: SessionId,
    pub estimated_available_minutes: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObserveRewardRequest {
    pub decision_id: lingua_core::DecisionId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectWordsRequest {
    pub user_id: UserId,
    pub target_word_count: usize,
    pub complexity_level: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePreferencesRequest {
    pub user_id: UserId,
    pub segments: Vec<StorySegmentRequest>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorySegmentRequest {
    pub topic_tags: Vec<String>,
    pub seconds_spent: f32,
}

#[derive(Debug, Serialize)]
pub struct ErasureResponse {
    #[serde(flatten)]
    pub summary: lingua_erasure::ErasureSummary,
}
