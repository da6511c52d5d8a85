//! Topic-preference data model used by StoryWordSelector (`spec.md` §3,
//! §4.8).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::UserId;

/// Dimensionality of the learner's topic-preference embedding
/// (`spec.md` §3).
pub const PREFERENCE_DIM: usize = 16;

/// Weight given to the new engagement vector on each preference-vector
/// EMA update; the rest is retained from the prior vector
/// (`spec.md` §4.8 "Thematic preference update").
pub const PREFERENCE_VECTOR_EMA_ALPHA: f32 = 0.05;

/// Smoothing factor for the simpler per-tag engagement scalar tracked
/// alongside the vector, used for [`UserTopicPreference::entropy`] and
/// [`UserTopicPreference::refresh_selected_topics`].
pub const TOPIC_ENGAGEMENT_EMA_ALPHA: f32 = 0.1;

/// How many top tags are retained in `selected_topics`.
const SELECTED_TOPICS_COUNT: usize = 3;

/// A user's story-topic affinity, maintained by two complementary EMAs:
/// a 16-dim preference vector (compared by cosine similarity against
/// topic-tag embeddings, `spec.md` §4.8) and a per-tag scalar engagement
/// map (used for entropy and the "selected topics" shortlist).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTopicPreference {
    pub user_id: UserId,
    pub preference_vector: [f32; PREFERENCE_DIM],
    pub selected_topics: Vec<String>,
    pub topic_engagement: HashMap<String, f32>,
    pub updated_at: DateTime<Utc>,
}

impl UserTopicPreference {
    /// A fresh preference profile: zero vector, no observed topics.
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            preference_vector: [0.0; PREFERENCE_DIM],
            selected_topics: Vec::new(),
            topic_engagement: HashMap::new(),
            updated_at: Utc::now(),
        }
    }

    /// Applies the preference-vector EMA from `spec.md` §4.8:
    /// `v_new = 0.95·v_old + 0.05·v_engagement`, re-normalised to unit
    /// length. A zero `engagement_vector` (no segments observed) leaves
    /// the preference vector unchanged.
    pub fn apply_vector_ema(&mut self, engagement_vector: [f32; PREFERENCE_DIM]) {
        if engagement_vector.iter().all(|&v| v == 0.0) {
            return;
        }
        let mut updated = [0.0f32; PREFERENCE_DIM];
        for i in 0..PREFERENCE_DIM {
            updated[i] = (1.0 - PREFERENCE_VECTOR_EMA_ALPHA) * self.preference_vector[i]
                + PREFERENCE_VECTOR_EMA_ALPHA * engagement_vector[i];
        }
        let norm = updated.iter().map(|&v| v * v).sum::<f32>().sqrt();
        if norm > 1e-8 {
            for v in updated.iter_mut() {
                *v /= norm;
            }
        }
        self.preference_vector = updated;
        self.updated_at = Utc::now();
    }

    /// Applies one EMA update for a single tag's scalar engagement,
    /// independent of the vector update above.
    pub fn observe_engagement(&mut self, tag: &str, engagement: f32) {
        let current = self.topic_engagement.get(tag).copied().unwrap_or(0.0);
        let updated = TOPIC_ENGAGEMENT_EMA_ALPHA * engagement + (1.0 - TOPIC_ENGAGEMENT_EMA_ALPHA) * current;
        self.topic_engagement.insert(tag.to_string(), updated);
        self.updated_at = Utc::now();
    }

    /// Recomputes `selected_topics` as the top tags by current scalar
    /// engagement, descending.
    pub fn refresh_selected_topics(&mut self) {
        let mut tags: Vec<(&String, &f32)> = self.topic_engagement.iter().collect();
        tags.sort_by(|a, b| b.1.partial_cmp(a.1).unwrap_or(std::cmp::Ordering::Equal));
        self.selected_topics = tags.into_iter().take(SELECTED_TOPICS_COUNT).map(|(tag, _)| tag.clone()).collect();
    }

    /// Shannon entropy of the (renormalised) engagement distribution,
    /// used as state-vector dimension 16 (`spec.md` §4.2). `0.0` with no
    /// observed topics.
    pub fn entropy(&self) -> f32 {
        let total: f32 = self.topic_engagement.values().sum();
        if total <= 0.0 {
            return 0.0;
        }
        -self
            .topic_engagement
            .values()
            .filter(|&&w| w > 0.0)
            .map(|&w| {
                let p = w / total;
                p * p.ln()
            })
            .sum::<f32>()
    }
}
