//! Model-artifact envelope shared by every trainable component
//! (`spec.md` §4.9-§4.10).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A versioned, schema-tagged snapshot of a trained model, as published
/// by RetrainScheduler and hot-swapped into the serving crates behind a
/// short-held `RwLock` write lock (`spec.md` §4.10).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelArtifact {
    pub model_id: String,
    pub version: u64,
    /// Names/order of the features this artifact was trained against.
    /// A serving crate refuses to load an artifact whose schema doesn't
    /// match what it expects (`LinguaError::ArtifactMismatch`).
    pub feature_schema: Vec<String>,
    pub hyperparameters: HashMap<String, f64>,
    pub trained_at: DateTime<Utc>,
    /// Opaque serialized model weights/state.
    pub payload: Vec<u8>,
}

impl ModelArtifact {
    /// Validates that this artifact's feature schema matches what the
    /// caller expects, returning a descriptive mismatch reason on
    /// failure.
    pub fn validate_schema(&self, expected: &[&str]) -> Result<(), String> {
        if self.feature_schema.len() != expected.len()
            || self.feature_schema.iter().zip(expected).any(|(a, b)| a != b)
        {
            return Err(format!(
                "expected feature schema {:?}, found {:?}",
                expected, self.feature_schema
            ));
        }
        Ok(())
    }
}
