//! Record shapes read from tables the platform does not own
//! (`spec.md` §3 "Lifecycle ownership").
//!
//! These mirror `profiles`, `user_words`, `grammar_lessons` and
//! `vocabulary` in the original Supabase schema closely enough for
//! StoryWordSelector, KnowledgeTracer's fallback and RouterCore's
//! state assembly to read from them, without pulling in the rest of
//! that schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lingua_core::{UserId, WordId, WordStatus};

/// A learner's account-level profile, read for RouterCore's
/// `account_age_norm` / `streak_norm` state dimensions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub total_sessions: u32,
    pub current_streak_days: u32,
}

/// A single vocabulary word as tracked for one learner, read by
/// StoryWordSelector and KnowledgeTracer's fallback path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordRecord {
    pub word_id: WordId,
    pub user_id: UserId,
    pub lemma: String,
    pub status: WordStatus,
    /// SM-2-style ease factor in `[1.3, 3.0]`.
    pub ease_factor: f32,
    /// Production-recall score in `[0, 100]`, independent of
    /// `ease_factor`'s recognition signal (`spec.md` §4.8).
    pub production_score: f32,
    /// Pronunciation-recall score in `[0, 100]` (`spec.md` §4.2 dim
    /// `[10]`, §4.3 rule 2).
    pub pronunciation_score: f32,
    pub days_overdue: f32,
    pub topic_tags: Vec<String>,
    pub last_story_mode_session_at: Option<DateTime<Utc>>,
    /// Whether the word appeared in each of the last 2 sessions,
    /// `[most_recent, second_most_recent]` (`spec.md` §4.8
    /// `recency_penalty`). Positional, not a truncated id list: a word
    /// seen only in the second-most-recent session must stay
    /// distinguishable from one seen only in the most recent.
    pub last_two_session_membership: [bool; 2],
}

/// Below this normalised production score, a word counts toward
/// RouterCore's low-production-word tally and cold-start rule 1
/// (`spec.md` §4.2 dim `[17]`, §4.3 rule 1).
pub const LOW_PRODUCTION_THRESHOLD: f32 = 0.4;

/// Below this normalised pronunciation score, a word counts toward
/// RouterCore's low-pronunciation-word tally and cold-start rule 2
/// (`spec.md` §4.2 dim `[18]`, §4.3 rule 2).
pub const LOW_PRONUNCIATION_THRESHOLD: f32 = 0.3;

impl WordRecord {
    /// `recognition_proxy`: `ease_factor` linearly mapped from
    /// `[1.3, 3.0]` to `[0, 100]` (`spec.md` §4.8).
    pub fn recognition_proxy(&self) -> f32 {
        let clamped = self.ease_factor.clamp(1.3, 3.0);
        (clamped - 1.3) / (3.0 - 1.3) * 100.0
    }

    pub fn is_low_production(&self) -> bool {
        self.production_score / 100.0 < LOW_PRODUCTION_THRESHOLD
    }

    pub fn is_low_pronunciation(&self) -> bool {
        self.pronunciation_score / 100.0 < LOW_PRONUNCIATION_THRESHOLD
    }
}
