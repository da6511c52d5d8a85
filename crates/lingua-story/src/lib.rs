//! StoryWordSelector: word-list assembly for story-mode sessions
//! (`spec.md` §4.8).

mod embedding;
mod scoring;

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use rand::Rng as _;
use serde::{Deserialize, Serialize};

use lingua_core::{LinguaError, UserId, WordId, PREFERENCE_DIM};
use lingua_data::{DataReader, DataWriter};
use lingua_tracer::KnowledgeTracer;

pub use embedding::{cosine_similarity, topic_embedding};
pub use scoring::{story_score, ScoreInputs};

/// Floor on how many due/new words are selected, regardless of ratio
/// (`spec.md` §4.8).
pub const MIN_NEW_WORDS: usize = 1;
/// Base fraction of `target_word_count` allotted to new words before
/// the complexity-level adjustment (`spec.md` §4.8).
pub const MAX_NEW_WORD_RATIO: f32 = 0.05;
/// Absolute ceiling on the new-word slice as a fraction of
/// `target_word_count` (`spec.md` §4.8).
pub const HARD_NEW_WORD_CAP_RATIO: f32 = 0.10;
/// Share of known-fill slots taken in descending thematic-relevance
/// order; the remainder is sampled uniformly for variety
/// (`spec.md` §4.8).
pub const KNOWN_FILL_RANKED_SHARE: f32 = 0.70;
/// Number of thematic-bias tags returned (`spec.md` §4.8).
const THEMATIC_BIAS_COUNT: usize = 3;

/// Result of one `select_words` call (`spec.md` §4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorySelection {
    pub due_words: Vec<WordId>,
    pub known_fill_words: Vec<WordId>,
    pub thematic_bias: Vec<String>,
}

/// One story segment the learner engaged with, used to update topic
/// preferences after a session (`spec.md` §4.8 "Thematic preference
/// update").
#[derive(Debug, Clone)]
pub struct StorySegment {
    pub topic_tags: Vec<String>,
    pub seconds_spent: f32,
}

pub struct StoryWordSelector {
    data: Arc<dyn DataReader>,
    writer: Arc<dyn DataWriter>,
    tracer: Option<Arc<KnowledgeTracer>>,
}

impl StoryWordSelector {
    pub fn new(data: Arc<dyn DataReader>, writer: Arc<dyn DataWriter>) -> Self {
        Self { data, writer, tracer: None }
    }

    pub fn with_tracer(mut self, tracer: Arc<KnowledgeTracer>) -> Self {
        self.tracer = Some(tracer);
        self
    }

    /// Selects disjoint due/known word lists plus thematic bias for a
    /// story segment (`spec.md` §4.8).
    pub async fn select_words(
        &self,
        user_id: UserId,
        target_word_count: usize,
        complexity_level: u32,
    ) -> Result<StorySelection, LinguaError> {
        if target_word_count == 0 {
            return Err(LinguaError::validation("target_word_count must be positive"));
        }

        let preference = self.load_preference_vector(user_id).await?;
        let knowledge = self.load_knowledge(user_id).await?;

        let due_candidates = self.data.list_due_and_new_words(user_id).await?;
        let known_candidates = self.data.list_known_words(user_id).await?;
        let now = Utc::now();

        let mut scored_due: Vec<(f32, &lingua_data::WordRecord)> = due_candidates
            .iter()
            .map(|word| {
                let p_forget_48h = knowledge.as_ref().and_then(|k| {
                    k.word_states.iter().find(|w| w.word_id == word.word_id).map(|w| w.p_forget_48h)
                });
                let inputs = ScoreInputs { word, p_forget_48h, preference_vector: &preference, now };
                (story_score(&inputs), word)
            })
            .collect();
        scored_due.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let new_word_cap = new_word_cap(target_word_count, complexity_level);
        let due_words: Vec<WordId> = scored_due.into_iter().take(new_word_cap).map(|(_, w)| w.word_id).collect();

        let remaining_slots = target_word_count.saturating_sub(due_words.len());
        let known_fill_words = self.select_known_fill(&known_candidates, &preference, now, remaining_slots);

        let thematic_bias = thematic_bias_tags(&due_candidates, &known_candidates, &preference);

        Ok(StorySelection { due_words, known_fill_words, thematic_bias })
    }

    fn select_known_fill(
        &self,
        known_candidates: &[lingua_data::WordRecord],
        preference: &[f32; PREFERENCE_DIM],
        now: chrono::DateTime<Utc>,
        remaining_slots: usize,
    ) -> Vec<WordId> {
        if remaining_slots == 0 || known_candidates.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(f32, &lingua_data::WordRecord)> = known_candidates
            .iter()
            .map(|word| {
                let inputs = ScoreInputs { word, p_forget_48h: None, preference_vector: preference, now };
                (story_score(&inputs), word)
            })
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let ranked_count = ((remaining_slots as f32) * KNOWN_FILL_RANKED_SHARE).round() as usize;
        let ranked_count = ranked_count.min(remaining_slots).min(scored.len());

        let mut chosen_ids: HashSet<WordId> = HashSet::new();
        let mut result = Vec::with_capacity(remaining_slots);
        for (_, word) in scored.iter().take(ranked_count) {
            chosen_ids.insert(word.word_id);
            result.push(word.word_id);
        }

        let remainder: Vec<&lingua_data::WordRecord> =
            scored.iter().map(|(_, w)| *w).filter(|w| !chosen_ids.contains(&w.word_id)).collect();

        let sample_count = (remaining_slots - result.len()).min(remainder.len());
        let mut rng = rand::rng();
        let mut pool = remainder;
        for _ in 0..sample_count {
            let idx = rng.random_range(0..pool.len());
            let word = pool.swap_remove(idx);
            result.push(word.word_id);
        }

        result
    }

    async fn load_preference_vector(&self, user_id: UserId) -> Result<[f32; PREFERENCE_DIM], LinguaError> {
        Ok(self
            .data
            .get_topic_preference(user_id)
            .await?
            .map(|pref| pref.preference_vector)
            .unwrap_or([0.0; PREFERENCE_DIM]))
    }

    async fn load_knowledge(&self, user_id: UserId) -> Result<Option<lingua_tracer::KnowledgeState>, LinguaError> {
        match &self.tracer {
            Some(tracer) => {
                let state = tracer.knowledge_state(user_id).await?;
                Ok((!state.using_fallback).then_some(state))
            }
            None => Ok(None),
        }
    }

    /// Applies the preference-vector EMA after a story session
    /// (`spec.md` §4.8 "Thematic preference update") and persists it.
    pub async fn update_preferences(
        &self,
        mut preference: lingua_core::UserTopicPreference,
        segments: &[StorySegment],
    ) -> Result<lingua_core::UserTopicPreference, LinguaError> {
        let engagement_vector = engagement_vector(segments);
        preference.apply_vector_ema(engagement_vector);
        for segment in segments {
            let weight = (1.0 + segment.seconds_spent).ln();
            for tag in &segment.topic_tags {
                preference.observe_engagement(tag, weight.min(1.0));
            }
        }
        preference.refresh_selected_topics();
        self.writer.upsert_topic_preference(&preference).await?;
        Ok(preference)
    }
}

fn new_word_cap(target_word_count: usize, complexity_level: u32) -> usize {
    let ratio_based = MAX_NEW_WORD_RATIO * target_word_count as f32 + (complexity_level as f32 - 1.0);
    let soft_cap = (MIN_NEW_WORDS as f32).max(ratio_based).round() as usize;
    let hard_cap = (target_word_count as f32 * HARD_NEW_WORD_CAP_RATIO).floor() as usize;
    soft_cap.min(hard_cap.max(MIN_NEW_WORDS))
}

/// `v_engagement`: the log-weighted sum of topic-tag embeddings across
/// segments the learner spent time on, `weight = log(1 + seconds)`
/// (`spec.md` §4.8).
fn engagement_vector(segments: &[StorySegment]) -> [f32; PREFERENCE_DIM] {
    let mut v = [0.0f32; PREFERENCE_DIM];
    for segment in segments {
        let weight = (1.0 + segment.seconds_spent).ln();
        for tag in &segment.topic_tags {
            let embedding = topic_embedding(tag);
            for i in 0..PREFERENCE_DIM {
                v[i] += weight * embedding[i];
            }
        }
    }
    v
}

fn thematic_bias_tags(
    due_candidates: &[lingua_data::WordRecord],
    known_candidates: &[lingua_data::WordRecord],
    preference: &[f32; PREFERENCE_DIM],
) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut scored: Vec<(f32, String)> = due_candidates
        .iter()
        .chain(known_candidates.iter())
        .flat_map(|w| w.topic_tags.iter())
        .filter(|tag| seen.insert((*tag).clone()))
        .map(|tag| (cosine_similarity(&topic_embedding(tag), preference), tag.clone()))
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().take(THEMATIC_BIAS_COUNT).map(|(_, tag)| tag).collect()
}
