//! KnowledgeTracer: the platform's inference-only per-word recall
//! contract (`spec.md` §4.7).
//!
//! The contract is narrow on purpose: `knowledge_state` is the only
//! cross-service dependency other components take on this crate.
//! Below [`KnowledgeTracer::min_events`] recorded interactions for a
//! user, the service declines to guess and reports
//! `using_fallback=true` with an empty word list; callers (principally
//! StoryWordSelector) carry their own simpler heuristic for that case.

mod model;

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use lingua_core::{LinguaError, UserId, WordId};
use lingua_data::DataReader;

/// Below this many recorded interactions for a user, `knowledge_state`
/// returns the fallback shape instead of a model estimate
/// (`spec.md` §4.7 default).
pub const MIN_EVENTS_FOR_MODEL: u32 = 50;

/// Forecast horizons the contract exposes per word.
const FORGET_HORIZON_48H_DAYS: f32 = 2.0;
const FORGET_HORIZON_7D_DAYS: f32 = 7.0;

/// Per-word recall forecast (`spec.md` §4.7).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordState {
    pub word_id: WordId,
    pub p_recall: f32,
    pub p_forget_48h: f32,
    pub p_forget_7d: f32,
}

/// The full contract response (`spec.md` §4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeState {
    pub word_states: Vec<WordState>,
    pub concept_mastery: HashMap<String, f32>,
    pub event_count: u64,
    pub using_fallback: bool,
}

/// The KnowledgeTracer service core.
pub struct KnowledgeTracer {
    data: Arc<dyn DataReader>,
    min_events: u32,
}

impl KnowledgeTracer {
    pub fn new(data: Arc<dyn DataReader>) -> Self {
        Self { data, min_events: MIN_EVENTS_FOR_MODEL }
    }

    pub fn with_min_events(data: Arc<dyn DataReader>, min_events: u32) -> Self {
        Self { data, min_events }
    }

    /// Per-word recall + concept mastery for `user_id`
    /// (`spec.md` §4.7).
    pub async fn knowledge_state(&self, user_id: UserId) -> Result<KnowledgeState, LinguaError> {
        let events = self.data.list_user_events(user_id).await?;
        let event_count = events.len() as u64;

        if event_count < u64::from(self.min_events) {
            return Ok(KnowledgeState {
                word_states: Vec::new(),
                concept_mastery: HashMap::new(),
                event_count,
                using_fallback: true,
            });
        }

        let words = self.data.list_words(user_id).await?;
        let mut word_states = Vec::with_capacity(words.len());
        let mut concept_accum: HashMap<String, (f32, u32)> = HashMap::new();

        for word in &words {
            let p_recall = model::p_recall_at(word.ease_factor, word.days_overdue);
            let p_forget_48h = model::p_forget_over_horizon(word.ease_factor, word.days_overdue, FORGET_HORIZON_48H_DAYS);
            let p_forget_7d = model::p_forget_over_horizon(word.ease_factor, word.days_overdue, FORGET_HORIZON_7D_DAYS);

            word_states.push(WordState {
                word_id: word.word_id,
                p_recall,
                p_forget_48h,
                p_forget_7d,
            });

            for tag in &word.topic_tags {
                let entry = concept_accum.entry(tag.clone()).or_insert((0.0, 0));
                entry.0 += p_recall;
                entry.1 += 1;
            }
        }

        let concept_mastery = concept_accum
            .into_iter()
            .map(|(tag, (sum, count))| (tag, sum / count.max(1) as f32))
            .collect();

        Ok(KnowledgeState {
            word_states,
            concept_mastery,
            event_count,
            using_fallback: false,
        })
    }
}
