//! Routing data model: state vectors, decisions and reward observations
//! (`spec.md` §3, §4.2-§4.6).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{DecisionId, RewardId, SessionId, UserId, WordId};

/// Dimensionality of the router's deterministic state vector
/// (`spec.md` §4.2).
pub const STATE_DIM: usize = 24;

/// Which algorithm produced a [`RoutingDecision`] (`spec.md` §4.3-§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    ColdStart,
    LinUcb,
    Ppo,
}

/// A 24-dimensional snapshot of everything the router knows about a user
/// at decision time (`spec.md` §4.2). Field order matches the dimension
/// order documented there; [`UserState::to_vector`] is the single place
/// that order is authoritative.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserState {
    /// [0..5] (mean, std, min, max, p25, p75) of per-word recall
    /// probabilities from KnowledgeTracer; `[0.5; 6]` if no data.
    pub dkt_summary: [f32; 6],
    /// [6..8] Last three modules used, normalised `index / (num_modules
    /// − 1)`. Missing positions default to `0.5` (neutral).
    pub last_modules_norm: [f32; 3],
    /// [9] Average production score across the user's words, `[0, 1]`.
    pub avg_production_score: f32,
    /// [10] Average pronunciation score, `[0, 1]`.
    pub avg_pronunciation_score: f32,
    /// [11] Weakest grammar concept mastery, `[0, 1]` (`1.0` if none).
    pub weakest_concept_mastery: f32,
    /// [12] Cognitive load from the last session, `[0, 1]` (`0.5` if
    /// unknown).
    pub cognitive_load_last_session: f32,
    /// [13] Estimated available minutes / 60, clamped to `[0, 1]`.
    pub available_minutes_norm: f32,
    /// [14] Days since last session / 30, clamped (`1.0` if never
    /// sessioned).
    pub days_since_last_session_norm: f32,
    /// [15] Due word count / 200, clamped.
    pub due_word_count_norm: f32,
    /// [16] Total words / 2000, clamped.
    pub total_word_count_norm: f32,
    /// [17] Count of low-production-flagged words / 50, clamped.
    pub low_production_count_norm: f32,
    /// [18] Count of low-pronunciation-flagged words / 50, clamped.
    pub low_pronunciation_count_norm: f32,
    /// [19..22] Cyclical encoding of the current UTC hour and weekday:
    /// `(sin(2π h/24), cos(2π h/24), sin(2π d/7), cos(2π d/7))`.
    pub time_cyclical: [f32; 4],
    /// [23] Session completion rate over the last 10 sessions, `[0, 1]`
    /// (`1.0` if none).
    pub session_completion_rate: f32,
}

impl UserState {
    /// Flattens the struct to the 24-element vector the bandit and PPO
    /// crates consume, in the fixed order documented on each field.
    pub fn to_vector(self) -> [f32; STATE_DIM] {
        let mut v = [0.0f32; STATE_DIM];
        v[0..6].copy_from_slice(&self.dkt_summary);
        v[6..9].copy_from_slice(&self.last_modules_norm);
        v[9] = self.avg_production_score;
        v[10] = self.avg_pronunciation_score;
        v[11] = self.weakest_concept_mastery;
        v[12] = self.cognitive_load_last_session;
        v[13] = self.available_minutes_norm;
        v[14] = self.days_since_last_session_norm;
        v[15] = self.due_word_count_norm;
        v[16] = self.total_word_count_norm;
        v[17] = self.low_production_count_norm;
        v[18] = self.low_pronunciation_count_norm;
        v[19..23].copy_from_slice(&self.time_cyclical);
        v[23] = self.session_completion_rate;
        v
    }
}

/// A persisted router decision (`spec.md` §3, §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingDecision {
    pub decision_id: DecisionId,
    pub user_id: UserId,
    pub session_id: SessionId,
    pub algorithm: Algorithm,
    pub recommended_module: crate::events::ModuleSource,
    /// Words the action enrichment step singled out, e.g. top-k
    /// low-production words for `conjugation_drill` (`spec.md` §4.2).
    pub target_word_ids: Vec<WordId>,
    /// Concept tag the action targets, e.g. `weakest_concept_tag` for
    /// `grammar_lesson`; absent for actions with no concept focus.
    pub target_concept: Option<String>,
    /// Human-readable justification, rewritten by the time-constraint
    /// override when it fires (`spec.md` §4.2).
    pub reason: String,
    pub confidence: f32,
    /// The full resolved state used for the decision, persisted as a
    /// snapshot rather than a raw vector so older decisions remain
    /// interpretable after the state shape changes (`spec.md` §9, Open
    /// Question 2).
    pub state_snapshot: UserState,
    pub time_constraint_applied: bool,
    pub created_at: DateTime<Utc>,
}

/// A reward signal attributed back to a prior [`RoutingDecision`]
/// (`spec.md` §4.6). `reward_components` carries the named contributions
/// (`recall_improvement`, `production_improvement`, `session_completed`,
/// `pronunciation_improvement`, `session_abandoned`, `monotony_penalty`)
/// so the breakdown survives alongside the total.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardObservation {
    pub reward_id: RewardId,
    pub decision_id: DecisionId,
    pub user_id: UserId,
    pub reward: f32,
    pub reward_components: HashMap<String, f32>,
    pub observed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_state() -> UserState {
        UserState {
            dkt_summary: [0.5, 0.1, 0.2, 0.9, 0.4, 0.6],
            last_modules_norm: [0.0, 0.2, 0.4],
            avg_production_score: 0.6,
            avg_pronunciation_score: 0.7,
            weakest_concept_mastery: 0.3,
            cognitive_load_last_session: 0.4,
            available_minutes_norm: 0.5,
            days_since_last_session_norm: 0.1,
            due_word_count_norm: 0.2,
            total_word_count_norm: 0.3,
            low_production_count_norm: 0.05,
            low_pronunciation_count_norm: 0.02,
            time_cyclical: [0.0, 1.0, 0.0, 1.0],
            session_completion_rate: 0.9,
        }
    }

    #[test]
    fn to_vector_has_expected_dimension() {
        assert_eq!(sample_state().to_vector().len(), STATE_DIM);
    }

    #[test]
    fn to_vector_places_dkt_summary_first() {
        let v = sample_state().to_vector();
        assert_eq!(&v[0..6], &[0.5, 0.1, 0.2, 0.9, 0.4, 0.6]);
    }

    #[test]
    fn to_vector_places_last_modules_at_6_through_9() {
        let v = sample_state().to_vector();
        assert_eq!(&v[6..9], &[0.0, 0.2, 0.4]);
    }

    #[test]
    fn to_vector_places_session_completion_rate_last() {
        let v = sample_state().to_vector();
        assert_eq!(v[23], 0.9);
    }
}
