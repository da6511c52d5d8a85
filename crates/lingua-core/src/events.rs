//! Read-only facts ingested from the external relational store.
//!
//! Everything in this module is produced by the client-facing application
//! and the ingestion pipeline; the platform only ever reads these types
//! (`spec.md` §3, "Lifecycle ownership").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{SessionId, UserId, WordId};

/// The module (activity type) an interaction or recommendation belongs to.
///
/// This is the router's action set (`spec.md` GLOSSARY, "Module").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleSource {
    StoryEngine,
    AnkiDrill,
    ConjugationDrill,
    PronunciationSession,
    GrammarLesson,
    Rest,
}

impl ModuleSource {
    /// All module variants, in a fixed, stable order.
    ///
    /// Used as the LinUCB/PPO action-index ordering and for the `[6..8]`
    /// "last 3 modules" state-vector dimensions, which normalise by
    /// `index / (num_modules - 1)`.
    pub const ALL: [ModuleSource; 6] = [
        ModuleSource::StoryEngine,
        ModuleSource::AnkiDrill,
        ModuleSource::ConjugationDrill,
        ModuleSource::PronunciationSession,
        ModuleSource::GrammarLesson,
        ModuleSource::Rest,
    ];

    /// The fixed index of this module in [`ModuleSource::ALL`].
    pub fn index(self) -> usize {
        Self::ALL.iter().position(|m| *m == self).expect("ALL is exhaustive")
    }

    /// Number of distinct modules (the action-set size).
    pub fn count() -> usize {
        Self::ALL.len()
    }
}

/// The recognised word-status buckets used by the baseline hierarchy
/// and by StoryWordSelector's due/known pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WordStatus {
    New,
    Learning,
    Due,
    Known,
}

/// An immutable fact emitted by the learner's client and persisted
/// externally. The platform only reads these (`spec.md` §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionEvent {
    pub user_id: UserId,
    pub word_id: Option<WordId>,
    pub session_id: SessionId,
    pub module_source: ModuleSource,
    pub input_mode: String,
    pub correct: Option<bool>,
    pub response_time_ms: Option<u32>,
    pub sequence_number_in_session: u32,
    pub word_status: Option<WordStatus>,
    /// SM-2-style ease factor in `[1.3, 3.0]`, when known for this word.
    /// Feeds `recognition_proxy` in StoryWordSelector's scoring formula.
    pub ease_factor: Option<f32>,
    pub timestamp: DateTime<Utc>,
}

/// (session_id, user_id, started_at, ended_at?, total_words, completed_flag,
/// estimated_cognitive_load?). Created at session start; the trailing
/// three fields are filled in when the session terminates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub module_source: ModuleSource,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub total_words: u32,
    pub completed_flag: bool,
    pub estimated_cognitive_load: Option<f32>,
}

impl SessionSummary {
    /// Whether the session has terminated (`ended_at` has been filled in).
    pub fn has_ended(&self) -> bool {
        self.ended_at.is_some()
    }
}

/// (user_id, avg_response_time_ms, total_sessions, last_session_at).
/// Updated asynchronously by the ingestion side; read-only here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserBaseline {
    pub user_id: UserId,
    pub avg_response_time_ms: f64,
    pub total_sessions: u32,
    pub last_session_at: Option<DateTime<Utc>>,
}

/// (user_id, module_source) → avg_response_time_ms. A derived view the
/// platform reads from the store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleBaseline {
    pub user_id: UserId,
    pub module_source: ModuleSource,
    pub avg_response_time_ms: f64,
}

/// (user_id, module_source, word_status) → avg_response_time_ms. The
/// finest level of the three-level baseline hierarchy (`spec.md` §3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketBaseline {
    pub user_id: UserId,
    pub module_source: ModuleSource,
    pub word_status: WordStatus,
    pub avg_response_time_ms: f64,
}

/// System-default baseline when no level of the hierarchy has data:
/// `{bucket} ⊃ {module} ⊃ {user-global} ⊃ 3000ms` (`spec.md` §3).
pub const SYSTEM_DEFAULT_BASELINE_MS: f64 = 3000.0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_source_all_has_six_entries_with_distinct_indices() {
        assert_eq!(ModuleSource::count(), 6);
        let indices: Vec<usize> = ModuleSource::ALL.iter().map(|m| m.index()).collect();
        let mut sorted = indices.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), indices.len());
    }

    #[test]
    fn session_summary_has_ended_tracks_ended_at() {
        let mut s = SessionSummary {
            session_id: SessionId::new(),
            user_id: UserId::new(),
            module_source: ModuleSource::StoryEngine,
            started_at: Utc::now(),
            ended_at: None,
            total_words: 10,
            completed_flag: false,
            estimated_cognitive_load: None,
        };
        assert!(!s.has_ended());
        s.ended_at = Some(Utc::now());
        assert!(s.has_ended());
    }
}
