//! # lingua-cognitive-load
//!
//! CognitiveLoadCore: per-session cognitive-load tracking over a
//! cooperative request stream (`spec.md` §4.1).
//!
//! Sessions live in a single `RwLock<HashMap<SessionId, SessionLoadState>>`
//! per engine instance, following the `AppState.conversations` pattern
//! the gateway crate uses for its own per-entity maps: mutations take
//! one short-held write lock, reads take a read lock, and nothing is
//! computed while holding either.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use lingua_core::cognitive::{
    BREAK_THRESHOLD, CONSECUTIVE_HIGH_LOAD_FOR_SIMPLIFY, SIMPLIFY_THRESHOLD, TREND_WINDOW_SIZE,
};
use lingua_core::{
    BucketBaseline, CognitiveLoadSnapshot, EventLoad, LinguaError, LoadTrend, ModuleSource,
    RecommendedAction, SessionId, SessionLoadState, UserId, WordStatus,
};
use lingua_data::DataReader;

/// Per-session in-memory cognitive-load tracker.
///
/// Cheap to clone: wraps an `Arc` around the shared session map, so
/// handlers can hold their own `CognitiveLoadCore` value without
/// sharing a lock guard across `.await` points.
#[derive(Clone)]
pub struct CognitiveLoadCore {
    sessions: Arc<RwLock<HashMap<SessionId, SessionLoadState>>>,
    data: Arc<dyn DataReader>,
}

impl CognitiveLoadCore {
    pub fn new(data: Arc<dyn DataReader>) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            data,
        }
    }

    /// Registers a new session, replacing any existing state for the
    /// same `session_id` (last init wins — used by replay-from-DB).
    #[allow(clippy::too_many_arguments)]
    pub fn init_session(
        &self,
        session_id: SessionId,
        user_id: UserId,
        module_source: ModuleSource,
        user_baseline_ms: f64,
        module_baselines: HashMap<ModuleSource, f64>,
        bucket_baselines: HashMap<(ModuleSource, WordStatus), f64>,
    ) {
        let state = SessionLoadState::new(
            session_id,
            user_id,
            module_source,
            user_baseline_ms,
            module_baselines,
            bucket_baselines,
        );
        self.sessions.write().expect("lock poisoned").insert(session_id, state);
    }

    /// Records one interaction and returns the computed cognitive load.
    ///
    /// Fire-and-forget semantics: returns `None` (not an error) if the
    /// session isn't tracked or `response_time_ms` is zero, matching
    /// the null-is-fine contract callers rely on (`spec.md` §4.1).
    pub fn record_event(
        &self,
        session_id: SessionId,
        word_id: Option<lingua_core::WordId>,
        word_status: Option<WordStatus>,
        response_time_ms: u32,
        sequence: u32,
    ) -> Option<f32> {
        if response_time_ms == 0 {
            return None;
        }
        let mut sessions = self.sessions.write().expect("lock poisoned");
        let state = sessions.get_mut(&session_id)?;
        let baseline_ms = state.resolve_baseline(word_status);
        let cognitive_load = EventLoad::compute_load(response_time_ms, baseline_ms);
        state.push_event(EventLoad {
            sequence,
            word_id,
            response_time_ms,
            baseline_ms,
            cognitive_load,
            timestamp: chrono::Utc::now(),
        });
        Some(cognitive_load)
    }

    /// Returns a snapshot of the session's current load, trend and
    /// recommended action. If the session isn't in memory, attempts
    /// restart recovery by replaying its persisted event log before
    /// giving up (`spec.md` §4.1 "Restart recovery").
    pub async fn get_session_load(
        &self,
        session_id: SessionId,
    ) -> Result<Option<CognitiveLoadSnapshot>, LinguaError> {
        if let Some(snapshot) = self.snapshot_of(session_id) {
            return Ok(Some(snapshot));
        }
        if !self.recover_session(session_id).await? {
            return Ok(None);
        }
        Ok(self.snapshot_of(session_id))
    }

    /// Removes the session from memory and returns its final average
    /// load (`0.0` if no events were recorded). Idempotent: returns
    /// `None` if the session was never tracked or already ended.
    pub fn end_session(&self, session_id: SessionId) -> Option<f32> {
        let mut sessions = self.sessions.write().expect("lock poisoned");
        sessions.remove(&session_id).map(|state| state.average_load())
    }

    fn snapshot_of(&self, session_id: SessionId) -> Option<CognitiveLoadSnapshot> {
        let sessions = self.sessions.read().expect("lock poisoned");
        let state = sessions.get(&session_id)?;
        Some(build_snapshot(session_id, state))
    }

    /// Re-initialises a session from `SessionSummary` + baselines and
    /// replays its persisted events in sequence order. Returns `true`
    /// if the session existed and was recovered.
    async fn recover_session(&self, session_id: SessionId) -> Result<bool, LinguaError> {
        let Some(summary) = self.data.get_session_summary(session_id).await? else {
            return Ok(false);
        };
        let user_baseline = self
            .data
            .get_user_baseline(summary.user_id)
            .await?
            .map(|b| b.avg_response_time_ms)
            .unwrap_or(lingua_core::events::SYSTEM_DEFAULT_BASELINE_MS);
        let module_baseline = self
            .data
            .get_module_baseline(summary.user_id, summary.module_source)
            .await?;
        let mut module_baselines = HashMap::new();
        if let Some(mb) = module_baseline {
            module_baselines.insert(summary.module_source, mb.avg_response_time_ms);
        }
        let bucket_baselines = self.recover_bucket_baselines(summary.user_id, summary.module_source).await?;

        self.init_session(
            session_id,
            summary.user_id,
            summary.module_source,
            user_baseline,
            module_baselines,
            bucket_baselines,
        );

        let mut events = self.data.list_session_events(session_id).await?;
        events.sort_by_key(|e| e.sequence_number_in_session);
        for event in events {
            if let Some(response_time_ms) = event.response_time_ms {
                self.record_event(
                    session_id,
                    event.word_id,
                    event.word_status,
                    response_time_ms,
                    event.sequence_number_in_session,
                );
            }
        }
        Ok(true)
    }

    async fn recover_bucket_baselines(
        &self,
        user_id: UserId,
        module_source: ModuleSource,
    ) -> Result<HashMap<(ModuleSource, WordStatus), f64>, LinguaError> {
        let mut map = HashMap::new();
        for status in [WordStatus::New, WordStatus::Learning, WordStatus::Due, WordStatus::Known] {
            if let Some(BucketBaseline { avg_response_time_ms, .. }) =
                self.data.get_bucket_baseline(user_id, module_source, status).await?
            {
                map.insert((module_source, status), avg_response_time_ms);
            }
        }
        Ok(map)
    }
}

fn build_snapshot(session_id: SessionId, state: &SessionLoadState) -> CognitiveLoadSnapshot {
    let recent_loads = state.recent_loads();
    let current_load = state.current_load().unwrap_or(0.0);
    let avg_load = state.average_load();
    let trend = classify_trend(&recent_loads);
    let recommended_action =
        recommend_action(current_load, avg_load, state.consecutive_high_load_counter);

    CognitiveLoadSnapshot {
        session_id,
        current_load,
        trend,
        recommended_action,
        event_count: state.rolling_event_window.len() as u32,
        consecutive_high_load: state.consecutive_high_load_counter,
        avg_load,
        recent_loads,
    }
}

/// Least-squares slope over the last ≤[`TREND_WINDOW_SIZE`] loads
/// (`spec.md` §4.1 "Trend algorithm").
fn classify_trend(recent_loads: &[f32]) -> LoadTrend {
    if recent_loads.len() < 3 {
        return LoadTrend::Stable;
    }
    let n = recent_loads.len() as f64;
    let xs: Vec<f64> = (0..recent_loads.len()).map(|i| i as f64).collect();
    let x_mean = xs.iter().sum::<f64>() / n;
    let y_mean = recent_loads.iter().map(|&y| y as f64).sum::<f64>() / n;

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (x, &y) in xs.iter().zip(recent_loads) {
        let dx = x - x_mean;
        numerator += dx * (y as f64 - y_mean);
        denominator += dx * dx;
    }
    if denominator == 0.0 {
        return LoadTrend::Stable;
    }
    let slope = numerator / denominator;
    if slope > 0.05 {
        LoadTrend::Increasing
    } else if slope < -0.05 {
        LoadTrend::Decreasing
    } else {
        LoadTrend::Stable
    }
}

/// Priority cascade, first match wins (`spec.md` §4.1 "Action
/// recommendation").
fn recommend_action(current_load: f32, avg_load: f32, consecutive_high_load: u32) -> RecommendedAction {
    if current_load > BREAK_THRESHOLD {
        RecommendedAction::EndSession
    } else if current_load > SIMPLIFY_THRESHOLD && consecutive_high_load >= CONSECUTIVE_HIGH_LOAD_FOR_SIMPLIFY {
        RecommendedAction::Simplify
    } else if avg_load > SIMPLIFY_THRESHOLD {
        RecommendedAction::Simplify
    } else {
        RecommendedAction::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lingua_data::MockDataStore;

    fn core() -> CognitiveLoadCore {
        CognitiveLoadCore::new(Arc::new(MockDataStore::new()))
    }

    #[test]
    fn record_event_returns_none_for_unknown_session() {
        let core = core();
        let got = core.record_event(SessionId::new(), None, None, 2000, 1);
        assert!(got.is_none());
    }

    #[test]
    fn record_event_returns_none_for_zero_response_time() {
        let core = core();
        let session_id = SessionId::new();
        core.init_session(session_id, UserId::new(), ModuleSource::Rest, 2000.0, HashMap::new(), HashMap::new());
        assert!(core.record_event(session_id, None, None, 0, 1).is_none());
    }

    #[test]
    fn init_session_replaces_existing_state() {
        let core = core();
        let session_id = SessionId::new();
        let user_id = UserId::new();
        core.init_session(session_id, user_id, ModuleSource::Rest, 2000.0, HashMap::new(), HashMap::new());
        core.record_event(session_id, None, None, 5000, 1);
        core.init_session(session_id, user_id, ModuleSource::Rest, 2000.0, HashMap::new(), HashMap::new());
        let snapshot = core.snapshot_of(session_id).unwrap();
        assert_eq!(snapshot.event_count, 0);
    }

    #[test]
    fn end_session_returns_average_load_and_is_idempotent() {
        let core = core();
        let session_id = SessionId::new();
        core.init_session(session_id, UserId::new(), ModuleSource::Rest, 2000.0, HashMap::new(), HashMap::new());
        core.record_event(session_id, None, None, 2000, 1);
        core.record_event(session_id, None, None, 4000, 2);
        let avg = core.end_session(session_id).unwrap();
        assert!((avg - 0.5).abs() < 1e-6);
        assert!(core.end_session(session_id).is_none());
    }

    #[test]
    fn classify_trend_reports_stable_below_three_samples() {
        assert_eq!(classify_trend(&[0.1, 0.2]), LoadTrend::Stable);
    }

    #[test]
    fn classify_trend_detects_increasing() {
        assert_eq!(classify_trend(&[0.1, 0.3, 0.5, 0.7, 0.9]), LoadTrend::Increasing);
    }

    #[test]
    fn classify_trend_detects_decreasing() {
        assert_eq!(classify_trend(&[0.9, 0.7, 0.5, 0.3, 0.1]), LoadTrend::Decreasing);
    }

    #[test]
    fn recommend_action_cascade_end_session_wins_over_simplify() {
        assert_eq!(recommend_action(0.9, 0.9, 5), RecommendedAction::EndSession);
    }

    #[test]
    fn recommend_action_cascade_simplify_on_consecutive_high_load() {
        assert_eq!(recommend_action(0.7, 0.5, 3), RecommendedAction::Simplify);
    }

    #[test]
    fn recommend_action_cascade_simplify_on_avg_load() {
        assert_eq!(recommend_action(0.5, 0.7, 0), RecommendedAction::Simplify);
    }

    #[test]
    fn recommend_action_cascade_continue_otherwise() {
        assert_eq!(recommend_action(0.3, 0.3, 0), RecommendedAction::Continue);
    }

    #[tokio::test]
    async fn restart_recovery_replays_persisted_events_in_sequence_order() {
        let store = Arc::new(MockDataStore::new());
        let user_id = UserId::new();
        let session_id = SessionId::new();
        store.seed_user_baseline(lingua_core::UserBaseline {
            user_id,
            avg_response_time_ms: 2000.0,
            total_sessions: 3,
            last_session_at: None,
        });
        store.seed_session_events(
            session_id,
            vec![
                lingua_core::InteractionEvent {
                    user_id,
                    word_id: None,
                    session_id,
                    module_source: ModuleSource::Rest,
                    input_mode: "text".to_string(),
                    correct: None,
                    response_time_ms: Some(2000),
                    sequence_number_in_session: 2,
                    word_status: None,
                    ease_factor: None,
                    timestamp: chrono::Utc::now(),
                },
                lingua_core::InteractionEvent {
                    user_id,
                    word_id: None,
                    session_id,
                    module_source: ModuleSource::Rest,
                    input_mode: "text".to_string(),
                    correct: None,
                    response_time_ms: Some(4000),
                    sequence_number_in_session: 1,
                    word_status: None,
                    ease_factor: None,
                    timestamp: chrono::Utc::now(),
                },
            ],
        );
        // Stash a summary so the recovery path finds the session at all.
        let summary = lingua_core::SessionSummary {
            session_id,
            user_id,
            module_source: ModuleSource::Rest,
            started_at: chrono::Utc::now(),
            ended_at: None,
            total_words: 0,
            completed_flag: false,
            estimated_cognitive_load: None,
        };
        lingua_data::DataWriter::upsert_session_summary(&*store, &summary).await.unwrap();

        let core = CognitiveLoadCore::new(store);
        let snapshot = core.get_session_load(session_id).await.unwrap().unwrap();
        assert_eq!(snapshot.event_count, 2);
        assert_eq!(snapshot.recent_loads[0], 1.0);
        assert_eq!(snapshot.recent_loads[1], 0.0);
    }
}
