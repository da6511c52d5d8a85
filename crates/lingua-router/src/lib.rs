//! # lingua-router
//!
//! RouterCore: the planning service tying state assembly, the
//! algorithm-selection cascade, action enrichment, and reward
//! attribution into a single `next_activity` / `observe_reward` pair
//! (`spec.md` §4.2).
//!
//! ## Architecture Rules
//!
//! - Depends on `lingua-data`, `lingua-cache`, `lingua-bandit`,
//!   `lingua-ppo` and `lingua-tracer`, never the other way around.

pub mod enrichment;
pub mod retrain;
pub mod reward;
pub mod state;

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;

use lingua_bandit::{recommend_cold_start, ColdStartInputs, LinUcbModel};
use lingua_core::{
    Algorithm, DecisionId, LinguaError, ModuleSource, RoutingDecision, SessionId, UserId,
};
use lingua_data::{DataReader, DataWriter};
use lingua_ppo::ActorCritic;
use lingua_tracer::KnowledgeTracer;

pub use reward::{BanditFeedback, RewardAttributor};

/// Below this many recorded interactions for a user, cold-start rules
/// are used instead of a learned algorithm (`spec.md` §4.2).
pub const COLD_START_THRESHOLD: u64 = 50;

/// Minimum platform-wide completed sessions before PPO is preferred
/// over LinUCB, once a PPO artifact is loaded (`spec.md` §4.2).
pub const PPO_THRESHOLD: u64 = 10_000;

/// The planning service core (`spec.md` §4.2).
///
/// Holds the mutable learned models directly rather than behind a
/// trained-model registry: a single router instance owns exactly one
/// LinUCB model and at most one loaded PPO policy, matching the
/// original `rl_router` service's single-tenant-per-process shape.
pub struct RouterCore {
    data: Arc<dyn DataReader>,
    writer: Arc<dyn DataWriter>,
    tracer: Arc<KnowledgeTracer>,
    bandit: RwLock<LinUcbModel>,
    ppo: RwLock<Option<ActorCritic>>,
}

impl RouterCore {
    pub fn new(data: Arc<dyn DataReader>, writer: Arc<dyn DataWriter>, tracer: Arc<KnowledgeTracer>) -> Self {
        Self {
            data,
            writer,
            tracer,
            bandit: RwLock::new(LinUcbModel::with_defaults(ModuleSource::count())),
            ppo: RwLock::new(None),
        }
    }

    /// Hot-swaps the loaded PPO policy, e.g. after RetrainScheduler
    /// publishes a new artifact (`spec.md` §4.10).
    pub async fn load_ppo(&self, policy: ActorCritic) {
        *self.ppo.write().await = Some(policy);
    }

    /// Replaces the LinUCB model wholesale, e.g. from a persisted
    /// snapshot at startup (`spec.md` §4.4 "Persistence").
    pub async fn load_bandit(&self, model: LinUcbModel) {
        *self.bandit.write().await = model;
    }

    /// Whether a PPO policy is currently loaded, for `/health`'s
    /// model-loaded flags (`spec.md` §6).
    pub async fn ppo_loaded(&self) -> bool {
        self.ppo.read().await.is_some()
    }

    async fn choose_algorithm(&self, user_event_count: u64) -> Result<Algorithm, LinguaError> {
        if user_event_count < COLD_START_THRESHOLD {
            return Ok(Algorithm::ColdStart);
        }
        if self.ppo.read().await.is_some() && self.data.count_global_sessions().await? >= PPO_THRESHOLD {
            return Ok(Algorithm::Ppo);
        }
        Ok(Algorithm::LinUcb)
    }

    /// Produces and persists a routing decision for `user_id`
    /// (`spec.md` §4.2).
    pub async fn next_activity(
        &self,
        user_id: UserId,
        session_id: SessionId,
        estimated_available_minutes: f32,
    ) -> Result<RoutingDecision, LinguaError> {
        let ctx = state::assemble(&*self.data, Some(&self.tracer), user_id, estimated_available_minutes, Utc::now())
            .await?;
        let algorithm = self.choose_algorithm(ctx.user_event_count).await?;
        let vector = ctx.state.to_vector();

        let (module, reason, confidence) = match algorithm {
            Algorithm::ColdStart => {
                let decision = recommend_cold_start(ColdStartInputs {
                    avg_production_score: ctx.state.avg_production_score,
                    has_low_production_words: !ctx.low_production_word_ids.is_empty(),
                    avg_pronunciation_score: ctx.state.avg_pronunciation_score,
                    has_low_pronunciation_words: ctx.has_low_pronunciation_words,
                    weakest_concept_score: ctx.state.weakest_concept_mastery,
                    weakest_concept_tag: ctx.weakest_concept_tag.as_deref(),
                    cognitive_load_last_session: Some(ctx.state.cognitive_load_last_session),
                });
                (decision.module, decision.reason, decision.confidence)
            }
            Algorithm::LinUcb => {
                let bandit = self.bandit.read().await;
                let (action, _scores) = bandit.predict(&vector)?;
                let confidence = bandit.confidence(action, &vector)? as f32;
                (
                    ModuleSource::ALL[action],
                    format!("linucb selected action {action}"),
                    confidence,
                )
            }
            Algorithm::Ppo => {
                let ppo = self.ppo.read().await;
                let policy = ppo.as_ref().expect("ppo chosen only when loaded");
                let (action, confidence, _value) = policy.act_deterministic(&vector);
                (ModuleSource::ALL[action], format!("ppo selected action {action}"), confidence)
            }
        };

        let enriched = enrichment::enrich(
            module,
            reason,
            estimated_available_minutes,
            &ctx.words,
            ctx.weakest_concept_tag.as_deref(),
        );

        let decision = RoutingDecision {
            decision_id: DecisionId::new(),
            user_id,
            session_id,
            algorithm,
            recommended_module: enriched.module,
            target_word_ids: enriched.target_word_ids,
            target_concept: enriched.target_concept,
            reason: enriched.reason,
            confidence,
            state_snapshot: ctx.state,
            time_constraint_applied: enriched.time_constraint_applied,
            created_at: Utc::now(),
        };

        self.writer.insert_routing_decision(&decision).await?;
        Ok(decision)
    }

    /// Closes the learning loop for a prior decision: computes and
    /// persists its reward, applying an online LinUCB update when the
    /// decision was LinUCB-authored (`spec.md` §4.2 "Online update").
    pub async fn observe_reward(
        &self,
        decision_id: DecisionId,
    ) -> Result<Option<lingua_core::RewardObservation>, LinguaError> {
        let attributor = RewardAttributor::new(self.data.clone(), self.writer.clone())
            .with_tracer(self.tracer.clone());
        let Some((observation, feedback)) = attributor.attribute(decision_id).await? else {
            return Ok(None);
        };
        if let Some(feedback) = feedback {
            self.bandit
                .write()
                .await
                .update(feedback.action, &feedback.context, feedback.reward as f64)?;
        }
        Ok(Some(observation))
    }
}
