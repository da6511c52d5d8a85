//! Read contracts against tables the platform does not own
//! (`spec.md` §3 "Lifecycle ownership").

use async_trait::async_trait;

use lingua_core::{
    BucketBaseline, DecisionId, LinguaError, ModuleBaseline, ModuleSource, RoutingDecision,
    SessionSummary, UserBaseline, UserId, UserTopicPreference, WordStatus,
};

use crate::records::{UserProfile, WordRecord};

/// Read-only access to facts the platform ingests but never writes.
///
/// Implementations talk to whatever relational store backs production
/// (Supabase/Postgres in the original); [`crate::mock::MockDataStore`]
/// is the in-memory stand-in used by the rest of the workspace's tests.
#[async_trait]
pub trait DataReader: Send + Sync {
    async fn get_user_baseline(&self, user_id: UserId) -> Result<Option<UserBaseline>, LinguaError>;

    async fn get_module_baseline(
        &self,
        user_id: UserId,
        module: ModuleSource,
    ) -> Result<Option<ModuleBaseline>, LinguaError>;

    async fn get_bucket_baseline(
        &self,
        user_id: UserId,
        module: ModuleSource,
        status: WordStatus,
    ) -> Result<Option<BucketBaseline>, LinguaError>;

    async fn get_session_summary(
        &self,
        session_id: lingua_core::SessionId,
    ) -> Result<Option<SessionSummary>, LinguaError>;

    async fn get_profile(&self, user_id: UserId) -> Result<Option<UserProfile>, LinguaError>;

    /// All words tracked for `user_id`, across every status bucket.
    async fn list_words(&self, user_id: UserId) -> Result<Vec<WordRecord>, LinguaError>;

    /// Words in `Due` or `New` status for `user_id`, as consumed by
    /// StoryWordSelector's due pool (`spec.md` §4.8).
    async fn list_due_and_new_words(&self, user_id: UserId) -> Result<Vec<WordRecord>, LinguaError>;

    /// Words in `Known` status for `user_id`, as consumed by
    /// StoryWordSelector's fill pool (`spec.md` §4.8).
    async fn list_known_words(&self, user_id: UserId) -> Result<Vec<WordRecord>, LinguaError>;

    /// Interaction events for a session, used by restart-recovery replay
    /// in CognitiveLoadCore (`spec.md` §5 "Crash/restart recovery").
    async fn list_session_events(
        &self,
        session_id: lingua_core::SessionId,
    ) -> Result<Vec<lingua_core::InteractionEvent>, LinguaError>;

    /// All interaction events for a user, across every session. Used by
    /// KnowledgeTracer to decide whether the fallback threshold applies
    /// and by RouterCore's session-completion-rate dimension
    /// (`spec.md` §4.2, §4.7).
    async fn list_user_events(
        &self,
        user_id: UserId,
    ) -> Result<Vec<lingua_core::InteractionEvent>, LinguaError>;

    /// Session summaries for a user, most-recent-first is not
    /// guaranteed; callers sort by `started_at` themselves
    /// (`spec.md` §4.2 dim `[23]`, §4.6).
    async fn list_user_sessions(
        &self,
        user_id: UserId,
    ) -> Result<Vec<SessionSummary>, LinguaError>;

    /// The user's current topic preference, if one has ever been
    /// written (`spec.md` §4.8).
    async fn get_topic_preference(
        &self,
        user_id: UserId,
    ) -> Result<Option<UserTopicPreference>, LinguaError>;

    /// Total completed sessions across every user on the platform, used
    /// by RouterCore's `total_session_count_global ≥ ppo_threshold`
    /// algorithm-selection check (`spec.md` §4.2). The relational store
    /// backs this with a simple aggregate query; nothing in this
    /// workspace needs a live-updating counter.
    async fn count_global_sessions(&self) -> Result<u64, LinguaError>;

    /// A previously-persisted routing decision, read back by
    /// RewardAttribution (`spec.md` §4.6).
    async fn get_routing_decision(
        &self,
        decision_id: DecisionId,
    ) -> Result<Option<RoutingDecision>, LinguaError>;
}
