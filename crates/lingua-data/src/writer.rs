//! Write contracts for tables the platform owns
//! (`spec.md` §3 "Lifecycle ownership", §4.11).

use async_trait::async_trait;

use lingua_core::{
    LinguaError, RewardObservation, RoutingDecision, SessionSummary, UserId, UserTopicPreference,
};

/// The full set of ML-owned tables ErasureCoordinator deletes from, in
/// FK-safe (child-before-parent) order (`spec.md` §4.11, grounded on
/// `_SUPABASE_TABLES` in the original `gdpr.py`).
///
/// Tables with no dedicated typed write method on [`DataWriter`] (the
/// churn/cold-start tables this platform's eight services don't own a
/// model for) are still erased through [`DataWriter::delete_erasable_rows`]
/// by name, since the erasure contract names them explicitly even though
/// no service here writes them.
pub const ERASABLE_TABLES: &[&str] = &[
    "routing_rewards",
    "routing_decisions",
    "churn_predictions",
    "abandonment_snapshots",
    "rescue_interventions",
    "cluster_assignments",
    "cognitive_load_events",
    "cognitive_load_sessions",
    "user_topic_preferences",
    "ml_prediction_log",
];

/// Write access to tables the platform owns.
#[async_trait]
pub trait DataWriter: Send + Sync {
    async fn insert_routing_decision(&self, decision: &RoutingDecision) -> Result<(), LinguaError>;

    async fn insert_reward_observation(
        &self,
        reward: &RewardObservation,
    ) -> Result<(), LinguaError>;

    async fn upsert_session_summary(&self, summary: &SessionSummary) -> Result<(), LinguaError>;

    async fn upsert_topic_preference(
        &self,
        preference: &UserTopicPreference,
    ) -> Result<(), LinguaError>;

    /// Deletes all rows for `user_id` in `table`, returning the count
    /// deleted. Used by ErasureCoordinator for every table in
    /// [`ERASABLE_TABLES`], including ones no typed writer above covers.
    async fn delete_erasable_rows(
        &self,
        table: &str,
        user_id: UserId,
    ) -> Result<u64, LinguaError>;
}
