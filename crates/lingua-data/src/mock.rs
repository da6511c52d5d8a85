//! In-memory [`DataReader`]/[`DataWriter`] implementation.
//!
//! Stands in for the relational store in tests across the workspace,
//! following the `RwLock<HashMap<...>>` shared-state idiom used
//! throughout the gateway crate's `AppState`.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use lingua_core::{
    BucketBaseline, InteractionEvent, LinguaError, ModuleBaseline, ModuleSource, RewardObservation,
    RoutingDecision, SessionId, SessionSummary, UserBaseline, UserId, UserTopicPreference,
    WordStatus,
};

use crate::reader::DataReader;
use crate::records::{UserProfile, WordRecord};
use crate::writer::DataWriter;

/// An in-memory store seeded by tests, implementing both [`DataReader`]
/// and [`DataWriter`]. Not used in production; the real deployment talks
/// to the relational store over whatever driver the operator configures.
#[derive(Default)]
pub struct MockDataStore {
    user_baselines: RwLock<HashMap<UserId, UserBaseline>>,
    module_baselines: RwLock<HashMap<(UserId, ModuleSource), ModuleBaseline>>,
    bucket_baselines: RwLock<HashMap<(UserId, ModuleSource, WordStatus), BucketBaseline>>,
    session_summaries: RwLock<HashMap<SessionId, SessionSummary>>,
    session_events: RwLock<HashMap<SessionId, Vec<InteractionEvent>>>,
    user_events: RwLock<HashMap<UserId, Vec<InteractionEvent>>>,
    user_sessions: RwLock<HashMap<UserId, Vec<SessionSummary>>>,
    profiles: RwLock<HashMap<UserId, UserProfile>>,
    words: RwLock<HashMap<UserId, Vec<WordRecord>>>,
    routing_decisions: RwLock<Vec<RoutingDecision>>,
    reward_observations: RwLock<Vec<RewardObservation>>,
    topic_preferences: RwLock<HashMap<UserId, UserTopicPreference>>,
    erasable_rows: RwLock<HashMap<(String, UserId), u64>>,
}

impl MockDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_user_baseline(&self, baseline: UserBaseline) {
        self.user_baselines.write().expect("lock poisoned").insert(baseline.user_id, baseline);
    }

    pub fn seed_module_baseline(&self, baseline: ModuleBaseline) {
        self.module_baselines
            .write()
            .expect("lock poisoned")
            .insert((baseline.user_id, baseline.module_source), baseline);
    }

    pub fn seed_bucket_baseline(&self, baseline: BucketBaseline) {
        self.bucket_baselines
            .write()
            .expect("lock poisoned")
            .insert((baseline.user_id, baseline.module_source, baseline.word_status), baseline);
    }

    pub fn seed_profile(&self, profile: UserProfile) {
        self.profiles.write().expect("lock poisoned").insert(profile.user_id, profile);
    }

    pub fn seed_words(&self, user_id: UserId, words: Vec<WordRecord>) {
        self.words.write().expect("lock poisoned").insert(user_id, words);
    }

    pub fn seed_session_events(&self, session_id: SessionId, events: Vec<InteractionEvent>) {
        self.session_events.write().expect("lock poisoned").insert(session_id, events);
    }

    pub fn seed_user_events(&self, user_id: UserId, events: Vec<InteractionEvent>) {
        self.user_events.write().expect("lock poisoned").insert(user_id, events);
    }

    pub fn seed_user_sessions(&self, user_id: UserId, sessions: Vec<SessionSummary>) {
        for session in &sessions {
            self.session_summaries
                .write()
                .expect("lock poisoned")
                .insert(session.session_id, session.clone());
        }
        self.user_sessions.write().expect("lock poisoned").insert(user_id, sessions);
    }

    /// Used by erasure tests to simulate pre-existing rows in the
    /// churn/cold-start tables this workspace has no typed writer for.
    pub fn seed_erasable_rows(&self, table: &str, user_id: UserId, count: u64) {
        self.erasable_rows
            .write()
            .expect("lock poisoned")
            .insert((table.to_string(), user_id), count);
    }

    pub fn routing_decisions(&self) -> Vec<RoutingDecision> {
        self.routing_decisions.read().expect("lock poisoned").clone()
    }

    pub fn reward_observations(&self) -> Vec<RewardObservation> {
        self.reward_observations.read().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl DataReader for MockDataStore {
    async fn get_user_baseline(&self, user_id: UserId) -> Result<Option<UserBaseline>, LinguaError> {
        Ok(self.user_baselines.read().expect("lock poisoned").get(&user_id).cloned())
    }

    async fn get_module_baseline(
        &self,
        user_id: UserId,
        module: ModuleSource,
    ) -> Result<Option<ModuleBaseline>, LinguaError> {
        Ok(self
            .module_baselines
            .read()
            .expect("lock poisoned")
            .get(&(user_id, module))
            .copied())
    }

    async fn get_bucket_baseline(
        &self,
        user_id: UserId,
        module: ModuleSource,
        status: WordStatus,
    ) -> Result<Option<BucketBaseline>, LinguaError> {
        Ok(self
            .bucket_baselines
            .read()
            .expect("lock poisoned")
            .get(&(user_id, module, status))
            .copied())
    }

    async fn get_session_summary(
        &self,
        session_id: SessionId,
    ) -> Result<Option<SessionSummary>, LinguaError> {
        Ok(self.session_summaries.read().expect("lock poisoned").get(&session_id).cloned())
    }

    async fn get_profile(&self, user_id: UserId) -> Result<Option<UserProfile>, LinguaError> {
        Ok(self.profiles.read().expect("lock poisoned").get(&user_id).cloned())
    }

    async fn list_words(&self, user_id: UserId) -> Result<Vec<WordRecord>, LinguaError> {
        Ok(self.words.read().expect("lock poisoned").get(&user_id).cloned().unwrap_or_default())
    }

    async fn list_due_and_new_words(&self, user_id: UserId) -> Result<Vec<WordRecord>, LinguaError> {
        let words = self.list_words(user_id).await?;
        Ok(words
            .into_iter()
            .filter(|w| matches!(w.status, WordStatus::Due | WordStatus::New | WordStatus::Learning))
            .collect())
    }

    async fn list_known_words(&self, user_id: UserId) -> Result<Vec<WordRecord>, LinguaError> {
        let words = self.list_words(user_id).await?;
        Ok(words.into_iter().filter(|w| w.status == WordStatus::Known).collect())
    }

    async fn list_session_events(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<InteractionEvent>, LinguaError> {
        Ok(self.session_events.read().expect("lock poisoned").get(&session_id).cloned().unwrap_or_default())
    }

    async fn list_user_events(&self, user_id: UserId) -> Result<Vec<InteractionEvent>, LinguaError> {
        Ok(self.user_events.read().expect("lock poisoned").get(&user_id).cloned().unwrap_or_default())
    }

    async fn list_user_sessions(&self, user_id: UserId) -> Result<Vec<SessionSummary>, LinguaError> {
        Ok(self.user_sessions.read().expect("lock poisoned").get(&user_id).cloned().unwrap_or_default())
    }

    async fn get_topic_preference(&self, user_id: UserId) -> Result<Option<UserTopicPreference>, LinguaError> {
        Ok(self.topic_preferences.read().expect("lock poisoned").get(&user_id).cloned())
    }

    async fn count_global_sessions(&self) -> Result<u64, LinguaError> {
        Ok(self.session_summaries.read().expect("lock poisoned").len() as u64)
    }

    async fn get_routing_decision(
        &self,
        decision_id: lingua_core::DecisionId,
    ) -> Result<Option<RoutingDecision>, LinguaError> {
        Ok(self
            .routing_decisions
            .read()
            .expect("lock poisoned")
            .iter()
            .find(|d| d.decision_id == decision_id)
            .cloned())
    }
}

#[async_trait]
impl DataWriter for MockDataStore {
    async fn insert_routing_decision(&self, decision: &RoutingDecision) -> Result<(), LinguaError> {
        self.routing_decisions.write().expect("lock poisoned").push(decision.clone());
        Ok(())
    }

    async fn insert_reward_observation(
        &self,
        reward: &RewardObservation,
    ) -> Result<(), LinguaError> {
        self.reward_observations.write().expect("lock poisoned").push(reward.clone());
        Ok(())
    }

    async fn upsert_session_summary(&self, summary: &SessionSummary) -> Result<(), LinguaError> {
        self.session_summaries
            .write()
            .expect("lock poisoned")
            .insert(summary.session_id, summary.clone());
        Ok(())
    }

    async fn upsert_topic_preference(
        &self,
        preference: &UserTopicPreference,
    ) -> Result<(), LinguaError> {
        self.topic_preferences
            .write()
            .expect("lock poisoned")
            .insert(preference.user_id, preference.clone());
        Ok(())
    }

    async fn delete_erasable_rows(&self, table: &str, user_id: UserId) -> Result<u64, LinguaError> {
        let mut erasable = self.erasable_rows.write().expect("lock poisoned");
        let count = erasable.remove(&(table.to_string(), user_id)).unwrap_or(0);

        match table {
            "routing_decisions" => {
                let mut decisions = self.routing_decisions.write().expect("lock poisoned");
                let before = decisions.len();
                decisions.retain(|d| d.user_id != user_id);
                return Ok(count + (before - decisions.len()) as u64);
            }
            "routing_rewards" => {
                let mut rewards = self.reward_observations.write().expect("lock poisoned");
                let before = rewards.len();
                rewards.retain(|r| r.user_id != user_id);
                return Ok(count + (before - rewards.len()) as u64);
            }
            "user_topic_preferences" => {
                let mut prefs = self.topic_preferences.write().expect("lock poisoned");
                let removed = prefs.remove(&user_id).is_some();
                return Ok(count + u64::from(removed));
            }
            _ => {}
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seeded_user_baseline_is_readable() {
        let store = MockDataStore::new();
        let baseline = UserBaseline {
            user_id: UserId::new(),
            avg_response_time_ms: 2500.0,
            total_sessions: 10,
            last_session_at: None,
        };
        store.seed_user_baseline(baseline.clone());
        let found = store.get_user_baseline(baseline.user_id).await.unwrap();
        assert_eq!(found.unwrap().avg_response_time_ms, 2500.0);
    }

    #[tokio::test]
    async fn delete_erasable_rows_is_idempotent() {
        let store = MockDataStore::new();
        let user_id = UserId::new();
        store.seed_erasable_rows("cognitive_load_sessions", user_id, 5);
        let first = store.delete_erasable_rows("cognitive_load_sessions", user_id).await.unwrap();
        let second = store.delete_erasable_rows("cognitive_load_sessions", user_id).await.unwrap();
        assert_eq!(first, 5);
        assert_eq!(second, 0);
    }

    #[tokio::test]
    async fn delete_erasable_rows_removes_routing_decisions_by_user() {
        let store = MockDataStore::new();
        let user_id = UserId::new();
        let decision = RoutingDecision {
            decision_id: lingua_core::DecisionId::new(),
            user_id,
            session_id: SessionId::new(),
            algorithm: lingua_core::Algorithm::ColdStart,
            recommended_module: ModuleSource::StoryEngine,
            target_word_ids: vec![],
            target_concept: None,
            reason: "default rule".to_string(),
            confidence: 0.5,
            state_snapshot: sample_state(),
            time_constraint_applied: false,
            created_at: chrono::Utc::now(),
        };
        store.insert_routing_decision(&decision).await.unwrap();
        assert_eq!(store.routing_decisions().len(), 1);
        let deleted = store.delete_erasable_rows("routing_decisions", user_id).await.unwrap();
        assert_eq!(deleted, 1);
        assert!(store.routing_decisions().is_empty());
    }

    fn sample_state() -> lingua_core::UserState {
        lingua_core::UserState {
            dkt_summary: [0.5; 6],
            last_modules_norm: [0.0; 3],
            avg_production_score: 0.0,
            avg_pronunciation_score: 0.0,
            weakest_concept_mastery: 1.0,
            cognitive_load_last_session: 0.5,
            available_minutes_norm: 0.0,
            days_since_last_session_norm: 1.0,
            due_word_count_norm: 0.0,
            total_word_count_norm: 0.0,
            low_production_count_norm: 0.0,
            low_pronunciation_count_norm: 0.0,
            time_cyclical: [0.0, 1.0, 0.0, 1.0],
            session_completion_rate: 1.0,
        }
    }
}
