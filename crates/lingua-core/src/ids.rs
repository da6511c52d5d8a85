//! Newtype identifiers for the platform's entities.
//!
//! Source systems pass raw strings/UUIDs around; this crate wraps them
//! so that a `UserId` and a `SessionId` can never be swapped by accident
//! at a call site, per the Design Notes in `spec.md` §9 ("typed structs,
//! not dynamic dictionaries").

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generates a fresh random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

uuid_id!(UserId, "Identifies a learner.");
uuid_id!(SessionId, "Identifies a learning session.");
uuid_id!(WordId, "Identifies a vocabulary word.");
uuid_id!(DecisionId, "Identifies a persisted [`crate::routing::RoutingDecision`].");
uuid_id!(RewardId, "Identifies a persisted [`crate::routing::RewardObservation`].");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_types() {
        let user = UserId::new();
        let session = SessionId::new();
        assert_ne!(user.0, Uuid::nil());
        assert_ne!(session.0, Uuid::nil());
    }

    #[test]
    fn display_matches_uuid_string() {
        let id = UserId(Uuid::nil());
        assert_eq!(id.to_string(), "00000000-0000-0000-0000-000000000000");
    }

    #[test]
    fn from_str_roundtrips() {
        let id = UserId::new();
        let parsed: UserId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }
}
