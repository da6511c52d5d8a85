//! # lingua-core
//!
//! Foundational crate for the Lingua adaptive learner-modelling platform.
//! Defines the data model every other `lingua-*` crate depends on:
//!
//! - [`LinguaError`] — unified error type for the entire workspace
//! - [`ids`] — newtype identifiers (`UserId`, `SessionId`, `WordId`, ...)
//! - [`events`] — read-only facts ingested from the external store
//! - [`cognitive`] — CognitiveLoadCore's session/load data model
//! - [`routing`] — RouterCore's state vector, decisions and rewards
//! - [`topic`] — StoryWordSelector's topic-preference model
//! - [`artifact`] — the trained-model envelope shared by every learner
//!
//! ## Architecture Rules
//!
//! - `lingua-core` may NOT import from any other `lingua-*` crate.
//! - No `async` code in this crate — pure synchronous data types.
//! - No `unwrap()` in library code — use `Result<T, LinguaError>`.

pub mod artifact;
pub mod cognitive;
pub mod error;
pub mod events;
pub mod ids;
pub mod routing;
pub mod topic;

pub use artifact::ModelArtifact;
pub use cognitive::{CognitiveLoadSnapshot, EventLoad, LoadTrend, RecommendedAction, SessionLoadState};
pub use error::LinguaError;
pub use events::{BucketBaseline, InteractionEvent, ModuleBaseline, ModuleSource, SessionSummary, UserBaseline, WordStatus};
pub use ids::{DecisionId, RewardId, SessionId, UserId, WordId};
pub use routing::{Algorithm, RewardObservation, RoutingDecision, UserState, STATE_DIM};
pub use topic::{UserTopicPreference, PREFERENCE_DIM};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_dim_matches_user_state_vector_length() {
        assert_eq!(STATE_DIM, 24);
    }

    #[test]
    fn module_source_count_matches_all_len() {
        assert_eq!(ModuleSource::count(), ModuleSource::ALL.len());
    }
}
