//! Cognitive-load data model (`spec.md` §3, §4.1).
//!
//! The behaviour that mutates these types — the rolling window, the
//! trend fit, the action recommendation — lives in `lingua-cognitive-load`;
//! this module only defines the shapes, per the Design Notes in
//! `spec.md` §9.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::events::{ModuleSource, WordStatus};
use crate::ids::{SessionId, UserId, WordId};

/// Hard cap on the rolling event window per session (`spec.md` §3, §5).
pub const MAX_ROLLING_WINDOW: usize = 500;

/// Number of most-recent loads considered for the trend fit (`spec.md` §4.1).
pub const TREND_WINDOW_SIZE: usize = 8;

/// Load above which a session is considered "high load" for the
/// consecutive-high-load counter (`spec.md` §4.1).
pub const SIMPLIFY_THRESHOLD: f32 = 0.6;

/// Load above which the recommendation escalates to ending the session
/// (`spec.md` §4.1).
pub const BREAK_THRESHOLD: f32 = 0.8;

/// Number of consecutive high-load events required to recommend
/// simplifying, alongside `current_load > SIMPLIFY_THRESHOLD` (`spec.md` §4.1).
pub const CONSECUTIVE_HIGH_LOAD_FOR_SIMPLIFY: u32 = 3;

/// A single scored interaction within a tracked session.
///
/// `cognitive_load = clamp((response_time_ms − baseline_ms) / baseline_ms, 0, 1)`
/// (`spec.md` §3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventLoad {
    pub sequence: u32,
    pub word_id: Option<WordId>,
    pub response_time_ms: u32,
    pub baseline_ms: f64,
    pub cognitive_load: f32,
    pub timestamp: DateTime<Utc>,
}

impl EventLoad {
    /// Computes a clamped cognitive-load value from a response time and a
    /// resolved baseline. Property 1 in `spec.md` §8: monotone in
    /// `response_time_ms`, `0.0` at or below baseline, `1.0` at or above
    /// `2 * baseline`.
    pub fn compute_load(response_time_ms: u32, baseline_ms: f64) -> f32 {
        let raw = (response_time_ms as f64 - baseline_ms) / baseline_ms;
        raw.clamp(0.0, 1.0) as f32
    }
}

/// Qualitative direction of the last [`TREND_WINDOW_SIZE`] loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadTrend {
    Increasing,
    Stable,
    Decreasing,
}

/// What the learner should do next, per the priority cascade in
/// `spec.md` §4.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecommendedAction {
    Continue,
    Simplify,
    EndSession,
}

/// In-memory per-session tracking state (`spec.md` §3).
///
/// Exists only between `init_session` and `end_session`; `session_id` is
/// unique across active sessions in a given service instance.
#[derive(Debug, Clone)]
pub struct SessionLoadState {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub module_source: ModuleSource,
    pub started_at: DateTime<Utc>,
    pub user_baseline_ms: f64,
    pub module_baseline_map: HashMap<ModuleSource, f64>,
    pub bucket_baseline_map: HashMap<(ModuleSource, WordStatus), f64>,
    pub rolling_event_window: VecDeque<EventLoad>,
    pub consecutive_high_load_counter: u32,
}

impl SessionLoadState {
    /// Creates a freshly initialised session with an empty rolling window.
    pub fn new(
        session_id: SessionId,
        user_id: UserId,
        module_source: ModuleSource,
        user_baseline_ms: f64,
        module_baseline_map: HashMap<ModuleSource, f64>,
        bucket_baseline_map: HashMap<(ModuleSource, WordStatus), f64>,
    ) -> Self {
        Self {
            session_id,
            user_id,
            module_source,
            started_at: Utc::now(),
            user_baseline_ms,
            module_baseline_map,
            bucket_baseline_map,
            rolling_event_window: VecDeque::with_capacity(MAX_ROLLING_WINDOW.min(64)),
            consecutive_high_load_counter: 0,
        }
    }

    /// Resolves a baseline via the three-level hierarchy: bucket, then
    /// module, then user-global, then the system default. First defined
    /// level wins (`spec.md` §3, Property 2 in §8).
    pub fn resolve_baseline(&self, word_status: Option<WordStatus>) -> f64 {
        if let Some(status) = word_status
            && let Some(&bucket_ms) = self.bucket_baseline_map.get(&(self.module_source, status))
        {
            return bucket_ms;
        }
        if let Some(&module_ms) = self.module_baseline_map.get(&self.module_source) {
            return module_ms;
        }
        if self.user_baseline_ms > 0.0 {
            return self.user_baseline_ms;
        }
        crate::events::SYSTEM_DEFAULT_BASELINE_MS
    }

    /// Appends a load sample, evicting the oldest entry if the window is
    /// at [`MAX_ROLLING_WINDOW`] capacity.
    pub fn push_event(&mut self, event: EventLoad) {
        if self.rolling_event_window.len() >= MAX_ROLLING_WINDOW {
            self.rolling_event_window.pop_front();
        }
        self.rolling_event_window.push_back(event);
        if event.cognitive_load > SIMPLIFY_THRESHOLD {
            self.consecutive_high_load_counter += 1;
        } else {
            self.consecutive_high_load_counter = 0;
        }
    }

    /// The arithmetic mean of all recorded loads in the session, `0.0` if
    /// none have been recorded.
    pub fn average_load(&self) -> f32 {
        if self.rolling_event_window.is_empty() {
            return 0.0;
        }
        let sum: f32 = self.rolling_event_window.iter().map(|e| e.cognitive_load).sum();
        sum / self.rolling_event_window.len() as f32
    }

    /// The most recently recorded load, if any.
    pub fn current_load(&self) -> Option<f32> {
        self.rolling_event_window.back().map(|e| e.cognitive_load)
    }

    /// The last [`TREND_WINDOW_SIZE`] loads, oldest first.
    pub fn recent_loads(&self) -> Vec<f32> {
        self.rolling_event_window
            .iter()
            .rev()
            .take(TREND_WINDOW_SIZE)
            .rev()
            .map(|e| e.cognitive_load)
            .collect()
    }
}

/// A point-in-time view of a tracked session returned by
/// `get_session_load` (`spec.md` §4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CognitiveLoadSnapshot {
    pub session_id: SessionId,
    pub current_load: f32,
    pub trend: LoadTrend,
    pub recommended_action: RecommendedAction,
    pub event_count: u32,
    pub consecutive_high_load: u32,
    pub avg_load: f32,
    pub recent_loads: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_load_is_zero_at_or_below_baseline() {
        assert_eq!(EventLoad::compute_load(2000, 2000.0), 0.0);
        assert_eq!(EventLoad::compute_load(1500, 2000.0), 0.0);
    }

    #[test]
    fn compute_load_is_one_at_or_above_double_baseline() {
        assert_eq!(EventLoad::compute_load(4000, 2000.0), 1.0);
        assert_eq!(EventLoad::compute_load(5000, 2000.0), 1.0);
    }

    #[test]
    fn compute_load_monotone_in_response_time() {
        let b = 2000.0;
        let l1 = EventLoad::compute_load(2100, b);
        let l2 = EventLoad::compute_load(2500, b);
        assert!(l1 <= l2);
    }

    #[test]
    fn resolve_baseline_hierarchy_bucket_wins() {
        let mut bucket_map = HashMap::new();
        bucket_map.insert((ModuleSource::StoryEngine, WordStatus::New), 4000.0);
        let mut module_map = HashMap::new();
        module_map.insert(ModuleSource::StoryEngine, 2500.0);

        let state = SessionLoadState::new(
            SessionId::new(),
            UserId::new(),
            ModuleSource::StoryEngine,
            3000.0,
            module_map,
            bucket_map,
        );

        assert_eq!(state.resolve_baseline(Some(WordStatus::New)), 4000.0);
        assert_eq!(state.resolve_baseline(Some(WordStatus::Known)), 2500.0);
        assert_eq!(state.resolve_baseline(None), 2500.0);
    }

    #[test]
    fn resolve_baseline_falls_back_to_system_default() {
        let state = SessionLoadState::new(
            SessionId::new(),
            UserId::new(),
            ModuleSource::Rest,
            0.0,
            HashMap::new(),
            HashMap::new(),
        );
        assert_eq!(state.resolve_baseline(None), crate::events::SYSTEM_DEFAULT_BASELINE_MS);
    }

    #[test]
    fn push_event_evicts_oldest_when_over_capacity() {
        let mut state = SessionLoadState::new(
            SessionId::new(),
            UserId::new(),
            ModuleSource::Rest,
            2000.0,
            HashMap::new(),
            HashMap::new(),
        );
        for i in 0..(MAX_ROLLING_WINDOW as u32 + 10) {
            state.push_event(EventLoad {
                sequence: i,
                word_id: None,
                response_time_ms: 2000,
                baseline_ms: 2000.0,
                cognitive_load: 0.0,
                timestamp: Utc::now(),
            });
        }
        assert_eq!(state.rolling_event_window.len(), MAX_ROLLING_WINDOW);
        assert_eq!(state.rolling_event_window.front().unwrap().sequence, 10);
    }

    #[test]
    fn consecutive_high_load_counter_resets_below_threshold() {
        let mut state = SessionLoadState::new(
            SessionId::new(),
            UserId::new(),
            ModuleSource::Rest,
            2000.0,
            HashMap::new(),
            HashMap::new(),
        );
        let mk = |load: f32| EventLoad {
            sequence: 0,
            word_id: None,
            response_time_ms: 2000,
            baseline_ms: 2000.0,
            cognitive_load: load,
            timestamp: Utc::now(),
        };
        state.push_event(mk(0.7));
        state.push_event(mk(0.7));
        assert_eq!(state.consecutive_high_load_counter, 2);
        state.push_event(mk(0.1));
        assert_eq!(state.consecutive_high_load_counter, 0);
    }
}
