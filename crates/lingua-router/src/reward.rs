//! RewardAttribution: turns a completed session into a reward signal
//! for the decision that preceded it (`spec.md` §4.6).

use std::sync::Arc;

use chrono::Utc;

use lingua_core::{Algorithm, DecisionId, LinguaError, RewardId, RewardObservation};
use lingua_data::{DataReader, DataWriter};
use lingua_tracer::KnowledgeTracer;

use crate::state;

const RECALL_IMPROVEMENT_REWARD: f32 = 2.0;
const PRODUCTION_IMPROVEMENT_REWARD: f32 = 1.5;
const SESSION_COMPLETED_REWARD: f32 = 1.0;
const PRONUNCIATION_IMPROVEMENT_REWARD: f32 = 0.5;
const SESSION_ABANDONED_PENALTY: f32 = -1.0;
const MONOTONY_PENALTY: f32 = -0.5;
const ABANDONED_LOAD_THRESHOLD: f32 = 0.7;
const MONOTONY_WINDOW: usize = 3;

/// Attributes reward to a prior [`RoutingDecision`] once its user's
/// next session has completed (`spec.md` §4.6).
pub struct RewardAttributor {
    data: Arc<dyn DataReader>,
    writer: Arc<dyn DataWriter>,
    tracer: Option<Arc<KnowledgeTracer>>,
}

/// What happened to a LinUCB-authored decision's arm, so the caller
/// can feed it back into the bandit (`spec.md` §4.2 "Online update").
pub struct BanditFeedback {
    pub action: usize,
    pub context: [f32; lingua_core::STATE_DIM],
    pub reward: f32,
}

impl RewardAttributor {
    pub fn new(data: Arc<dyn DataReader>, writer: Arc<dyn DataWriter>) -> Self {
        Self { data, writer, tracer: None }
    }

    pub fn with_tracer(mut self, tracer: Arc<KnowledgeTracer>) -> Self {
        self.tracer = Some(tracer);
        self
    }

    /// Runs the full attribution pipeline for `decision_id`. Returns
    /// `None` (not an error) if no reward can be computed yet because
    /// no subsequent session exists (`spec.md` §4.6 step 2).
    pub async fn attribute(
        &self,
        decision_id: DecisionId,
    ) -> Result<Option<(RewardObservation, Option<BanditFeedback>)>, LinguaError> {
        let Some(decision) = self.data.get_routing_decision(decision_id).await? else {
            return Err(LinguaError::not_found("routing_decision", decision_id.to_string()));
        };

        let mut sessions = self.data.list_user_sessions(decision.user_id).await?;
        sessions.retain(|s| s.started_at > decision.created_at && s.has_ended());
        sessions.sort_by_key(|s| s.started_at);
        let Some(next_session) = sessions.into_iter().next() else {
            return Ok(None);
        };

        let post = state::assemble(&*self.data, self.tracer.as_ref(), decision.user_id, 30.0, Utc::now()).await?;

        let pre_recall = decision.state_snapshot.dkt_summary[0];
        let post_recall = post.state.dkt_summary[0];
        let pre_production = decision.state_snapshot.avg_production_score;
        let post_production = post.state.avg_production_score;
        let pre_pronunciation = decision.state_snapshot.avg_pronunciation_score;
        let post_pronunciation = post.state.avg_pronunciation_score;
        let post_cognitive_load = next_session.estimated_cognitive_load.unwrap_or(post.state.cognitive_load_last_session);

        let all_sessions = self.data.list_user_sessions(decision.user_id).await?;
        let mut recent = all_sessions.clone();
        recent.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        let recent_modules = state::last_n_modules(&recent, MONOTONY_WINDOW);
        let monotonous = recent_modules.len() == MONOTONY_WINDOW
            && recent_modules.iter().all(|&m| m == decision.recommended_module);

        let mut components = std::collections::HashMap::new();
        components.insert(
            "recall_improvement".to_string(),
            if post_recall > pre_recall { RECALL_IMPROVEMENT_REWARD } else { 0.0 },
        );
        components.insert(
            "production_improvement".to_string(),
            if post_production > pre_production { PRODUCTION_IMPROVEMENT_REWARD } else { 0.0 },
        );
        components.insert(
            "session_completed".to_string(),
            if next_session.completed_flag { SESSION_COMPLETED_REWARD } else { 0.0 },
        );
        components.insert(
            "pronunciation_improvement".to_string(),
            if post_pronunciation > pre_pronunciation { PRONUNCIATION_IMPROVEMENT_REWARD } else { 0.0 },
        );
        components.insert(
            "session_abandoned".to_string(),
            if !next_session.completed_flag && post_cognitive_load > ABANDONED_LOAD_THRESHOLD {
                SESSION_ABANDONED_PENALTY
            } else {
                0.0
            },
        );
        components.insert("monotony_penalty".to_string(), if monotonous { MONOTONY_PENALTY } else { 0.0 });

        let reward: f32 = components.values().sum();

        let observation = RewardObservation {
            reward_id: RewardId::new(),
            decision_id,
            user_id: decision.user_id,
            reward,
            reward_components: components,
            observed_at: Utc::now(),
        };
        self.writer.insert_reward_observation(&observation).await?;

        let feedback = (decision.algorithm == Algorithm::LinUcb).then(|| BanditFeedback {
            action: decision.recommended_module.index(),
            context: decision.state_snapshot.to_vector(),
            reward,
        });

        Ok(Some((observation, feedback)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lingua_core::{Algorithm, ModuleSource, RoutingDecision, SessionId, UserId};
    use lingua_data::MockDataStore;

    fn sample_state() -> lingua_core::UserState {
        lingua_core::UserState {
            dkt_summary: [0.4; 6],
            last_modules_norm: [0.0; 3],
            avg_production_score: 0.3,
            avg_pronunciation_score: 0.3,
            weakest_concept_mastery: 1.0,
            cognitive_load_last_session: 0.5,
            available_minutes_norm: 0.5,
            days_since_last_session_norm: 0.1,
            due_word_count_norm: 0.1,
            total_word_count_norm: 0.1,
            low_production_count_norm: 0.0,
            low_pronunciation_count_norm: 0.0,
            time_cyclical: [0.0, 1.0, 0.0, 1.0],
            session_completion_rate: 1.0,
        }
    }

    #[tokio::test]
    async fn attribute_returns_none_without_a_subsequent_session() {
        let store = Arc::new(MockDataStore::new());
        let user_id = UserId::new();
        let decision = RoutingDecision {
            decision_id: DecisionId::new(),
            user_id,
            session_id: SessionId::new(),
            algorithm: Algorithm::ColdStart,
            recommended_module: ModuleSource::StoryEngine,
            target_word_ids: vec![],
            target_concept: None,
            reason: "default".to_string(),
            confidence: 0.5,
            state_snapshot: sample_state(),
            time_constraint_applied: false,
            created_at: Utc::now(),
        };
        lingua_data::DataWriter::insert_routing_decision(&*store, &decision).await.unwrap();

        let attributor = RewardAttributor::new(store.clone(), store.clone());
        let result = attributor.attribute(decision.decision_id).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn attribute_errors_on_unknown_decision() {
        let store = Arc::new(MockDataStore::new());
        let attributor = RewardAttributor::new(store.clone(), store.clone());
        let result = attributor.attribute(DecisionId::new()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn attribute_rewards_completed_session_and_requests_bandit_update_for_linucb() {
        let store = Arc::new(MockDataStore::new());
        let user_id = UserId::new();
        let decision_created_at = Utc::now() - chrono::Duration::hours(1);
        let decision = RoutingDecision {
            decision_id: DecisionId::new(),
            user_id,
            session_id: SessionId::new(),
            algorithm: Algorithm::LinUcb,
            recommended_module: ModuleSource::StoryEngine,
            target_word_ids: vec![],
            target_concept: None,
            reason: "default".to_string(),
            confidence: 0.5,
            state_snapshot: sample_state(),
            time_constraint_applied: false,
            created_at: decision_created_at,
        };
        lingua_data::DataWriter::insert_routing_decision(&*store, &decision).await.unwrap();

        store.seed_user_sessions(
            user_id,
            vec![lingua_core::SessionSummary {
                session_id: SessionId::new(),
                user_id,
                module_source: ModuleSource::StoryEngine,
                started_at: Utc::now(),
                ended_at: Some(Utc::now()),
                total_words: 10,
                completed_flag: true,
                estimated_cognitive_load: Some(0.3),
            }],
        );

        let attributor = RewardAttributor::new(store.clone(), store.clone());
        let (observation, feedback) = attributor.attribute(decision.decision_id).await.unwrap().unwrap();
        assert!(observation.reward_components.contains_key("session_completed"));
        assert_eq!(observation.reward_components["session_completed"], SESSION_COMPLETED_REWARD);
        let feedback = feedback.expect("linucb decision must request a bandit update");
        assert_eq!(feedback.action, ModuleSource::StoryEngine.index());
    }
}
