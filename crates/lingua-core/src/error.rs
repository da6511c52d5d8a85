//! Unified error type for the Lingua ML platform.
//!
//! All crates in the workspace propagate [`LinguaError`]. Variants map
//! 1:1 onto the error taxonomy table (transport mapping happens in
//! `lingua-gateway`, never here): *Validation*, *Authentication*,
//! *NotFound*, *DependencyUnavailable*, *ModelNotTrained*, *Internal*,
//! plus the two training-only kinds the retrain scheduler needs to tell
//! apart even though neither is ever user-visible.

/// The unified error type for all Lingua platform operations.
///
/// # Example
///
/// ```
/// use lingua_core::LinguaError;
///
/// fn example() -> Result<(), LinguaError> {
///     Err(LinguaError::not_found("session", "s1"))
/// }
///
/// let err = example().unwrap_err();
/// assert!(err.to_string().contains("session"));
/// ```
#[derive(Debug, Clone, thiserror::Error)]
pub enum LinguaError {
    /// Bad input or an out-of-range parameter.
    #[error("validation failed: {message}")]
    Validation {
        /// Description of the invalid input.
        message: String,
    },

    /// The caller's credentials were missing or rejected.
    #[error("authentication failed: {message}")]
    Authentication {
        /// Description of the authentication failure.
        message: String,
    },

    /// A requested entity (session, user, word, decision) does not exist.
    #[error("{kind} '{id}' not found")]
    NotFound {
        /// The kind of entity that was not found (e.g. "session").
        kind: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// A downstream dependency (store, cache, peer service) is unreachable.
    ///
    /// Handlers with a defined fallback catch this locally and degrade;
    /// handlers with no fallback let it surface as 503.
    #[error("dependency '{dependency}' unavailable: {message}")]
    DependencyUnavailable {
        /// The name of the unavailable dependency.
        dependency: String,
        /// Description of the failure.
        message: String,
    },

    /// A model artifact has not been trained/loaded yet.
    #[error("model '{model}' not trained")]
    ModelNotTrained {
        /// The model that has no loaded artifact.
        model: String,
    },

    /// A loaded artifact does not match the service's expected schema.
    #[error("artifact mismatch for model '{model}': {message}")]
    ArtifactMismatch {
        /// The model whose artifact failed validation.
        model: String,
        /// Description of the mismatch.
        message: String,
    },

    /// A training run failed but may succeed on retry.
    #[error("transient training failure for '{model}': {message}")]
    TransientTrainingFailure {
        /// The model being trained.
        model: String,
        /// Description of the failure.
        message: String,
    },

    /// A training run failed and retries are exhausted or pointless.
    #[error("permanent training failure for '{model}': {message}")]
    PermanentTrainingFailure {
        /// The model being trained.
        model: String,
        /// Description of the failure.
        message: String,
    },

    /// An internal invariant was violated; this should never happen.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl LinguaError {
    /// Convenience constructor for [`LinguaError::Internal`], typically
    /// used to wrap a poisoned lock or other `Display`-able cause.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Convenience constructor for [`LinguaError::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Convenience constructor for [`LinguaError::NotFound`].
    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Convenience constructor for [`LinguaError::DependencyUnavailable`].
    pub fn dependency_unavailable(
        dependency: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::DependencyUnavailable {
            dependency: dependency.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_contains_kind_and_id() {
        let err = LinguaError::not_found("session", "abc-123");
        assert!(err.to_string().contains("session"));
        assert!(err.to_string().contains("abc-123"));
    }

    #[test]
    fn validation_message_roundtrips() {
        let err = LinguaError::validation("response_time_ms must be positive");
        assert!(err.to_string().contains("response_time_ms"));
    }
}
