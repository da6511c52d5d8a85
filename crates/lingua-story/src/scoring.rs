//! The `storyScore` weighted multi-signal formula (`spec.md` §4.8).

use chrono::{DateTime, Utc};

use lingua_core::PREFERENCE_DIM;
use lingua_data::WordRecord;

use crate::embedding::{cosine_similarity, topic_embedding};

const WEIGHT_FORGET_48H: f32 = 0.4;
const WEIGHT_RECENCY: f32 = 0.2;
const WEIGHT_PRODUCTION_GAP: f32 = 0.2;
const WEIGHT_MODULE_VARIETY: f32 = 0.1;
const WEIGHT_THEMATIC_RELEVANCE: f32 = 0.1;

/// Horizon used by the fallback `p_forget_48h` estimate when
/// KnowledgeTracer has no estimate for this word
/// (`days_overdue / 14`, `spec.md` §4.8).
const FALLBACK_FORGET_HORIZON_DAYS: f32 = 14.0;

/// Inputs to one word's `storyScore`, gathered from WordRecord plus
/// whatever the caller already resolved from KnowledgeTracer and the
/// user's topic preference.
pub struct ScoreInputs<'a> {
    pub word: &'a WordRecord,
    /// KnowledgeTracer's `p_forget_48h`, when the model is trained
    /// (`spec.md` §4.8: falls back to `clamp(days_overdue/14, 0, 1)`).
    pub p_forget_48h: Option<f32>,
    pub preference_vector: &'a [f32; PREFERENCE_DIM],
    pub now: DateTime<Utc>,
}

/// Computes `storyScore` for one candidate word (`spec.md` §4.8).
pub fn story_score(inputs: &ScoreInputs) -> f32 {
    let forget = inputs
        .p_forget_48h
        .unwrap_or_else(|| (inputs.word.days_overdue / FALLBACK_FORGET_HORIZON_DAYS).clamp(0.0, 1.0));

    let recency_penalty = recency_penalty(inputs.word);
    let production_gap = production_gap(inputs.word);
    let module_variety_bonus = module_variety_bonus(inputs.word, inputs.now);
    let thematic_relevance = thematic_relevance(inputs.word, inputs.preference_vector);

    WEIGHT_FORGET_48H * forget
        + WEIGHT_RECENCY * recency_penalty
        + WEIGHT_PRODUCTION_GAP * production_gap
        + WEIGHT_MODULE_VARIETY * module_variety_bonus
        + WEIGHT_THEMATIC_RELEVANCE * thematic_relevance
}

/// `0` if the word appeared in the most recent session, `0.5` if it
/// appeared only in the second-most-recent one, `1` if it appeared in
/// neither (`spec.md` §4.8).
fn recency_penalty(word: &WordRecord) -> f32 {
    let [most_recent, second_most_recent] = word.last_two_session_membership;
    if most_recent {
        0.0
    } else if second_most_recent {
        0.5
    } else {
        1.0
    }
}

fn production_gap(word: &WordRecord) -> f32 {
    ((word.recognition_proxy() - word.production_score) / 100.0).clamp(0.0, 1.0)
}

fn module_variety_bonus(word: &WordRecord, now: DateTime<Utc>) -> f32 {
    match word.last_story_mode_session_at {
        None => 1.0,
        Some(last) => {
            if (now - last).num_days() >= 7 {
                1.0
            } else {
                0.0
            }
        }
    }
}

fn thematic_relevance(word: &WordRecord, preference_vector: &[f32; PREFERENCE_DIM]) -> f32 {
    word.topic_tags
        .iter()
        .map(|tag| cosine_similarity(&topic_embedding(tag), preference_vector))
        .fold(0.0f32, f32::max)
        .max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lingua_core::{UserId, WordId, WordStatus};

    fn base_word() -> WordRecord {
        WordRecord {
            word_id: WordId::new(),
            user_id: UserId::new(),
            lemma: "manger".to_string(),
            status: WordStatus::Due,
            ease_factor: 2.0,
            production_score: 40.0,
            pronunciation_score: 60.0,
            days_overdue: 7.0,
            topic_tags: vec!["food".to_string()],
            last_story_mode_session_at: None,
            last_two_session_membership: [false, false],
        }
    }

    #[test]
    fn recency_penalty_is_zero_when_word_was_in_most_recent_session() {
        let mut word = base_word();
        word.last_two_session_membership = [true, false];
        assert_eq!(recency_penalty(&word), 0.0);
    }

    #[test]
    fn recency_penalty_is_half_when_word_was_only_in_second_most_recent_session() {
        let mut word = base_word();
        word.last_two_session_membership = [false, true];
        assert_eq!(recency_penalty(&word), 0.5);
    }

    #[test]
    fn recency_penalty_is_one_when_word_absent_from_recent_sessions() {
        let word = base_word();
        assert_eq!(recency_penalty(&word), 1.0);
    }

    #[test]
    fn module_variety_bonus_is_one_when_never_seen_in_story_mode() {
        let word = base_word();
        assert_eq!(module_variety_bonus(&word, Utc::now()), 1.0);
    }

    #[test]
    fn module_variety_bonus_is_zero_within_seven_days() {
        let mut word = base_word();
        word.last_story_mode_session_at = Some(Utc::now());
        assert_eq!(module_variety_bonus(&word, Utc::now()), 0.0);
    }

    #[test]
    fn story_score_uses_fallback_forget_estimate_when_tracer_unavailable() {
        let word = base_word();
        let preference = [0.0; PREFERENCE_DIM];
        let inputs = ScoreInputs {
            word: &word,
            p_forget_48h: None,
            preference_vector: &preference,
            now: Utc::now(),
        };
        let score = story_score(&inputs);
        assert!(score > 0.0);
    }

    #[test]
    fn story_score_is_bounded_by_component_weights() {
        let word = base_word();
        let preference = [0.0; PREFERENCE_DIM];
        let inputs = ScoreInputs {
            word: &word,
            p_forget_48h: Some(1.0),
            preference_vector: &preference,
            now: Utc::now(),
        };
        let score = story_score(&inputs);
        assert!(score <= 1.0 + 1e-5);
    }
}
