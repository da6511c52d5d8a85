//! # lingua-erasure
//!
//! ErasureCoordinator: GDPR-style user deletion across the cache and
//! every ML-owned table (`spec.md` §4.11).
//!
//! ## Architecture Rules
//!
//! - Depends on `lingua-core`, `lingua-data`, `lingua-cache`.
//! - Never stops partway through a table list on a single-table error;
//!   every table gets a chance to delete, and failures are aggregated.

use std::sync::Arc;

use serde::Serialize;

use lingua_cache::PredictionCache;
use lingua_core::UserId;
use lingua_data::{DataWriter, ERASABLE_TABLES};

/// Outcome of one [`ErasureCoordinator::delete_user`] run
/// (`spec.md` §4.11 step 4).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErasureSummary {
    pub success: bool,
    pub cache_keys_deleted: u64,
    pub per_table_counts: Vec<(String, u64)>,
    pub errors: Vec<String>,
}

/// Coordinates complete removal of a user's footprint across the
/// platform's owned tables and the prediction cache (`spec.md` §4.11).
pub struct ErasureCoordinator {
    writer: Arc<dyn DataWriter>,
    cache: Arc<PredictionCache>,
}

impl ErasureCoordinator {
    pub fn new(writer: Arc<dyn DataWriter>, cache: Arc<PredictionCache>) -> Self {
        Self { writer, cache }
    }

    /// Deletes every trace of `user_id` this platform owns. Idempotent:
    /// re-running on an already-erased user yields zero counts and no
    /// errors (`spec.md` §4.11).
    pub async fn delete_user(&self, user_id: UserId) -> ErasureSummary {
        let cache_keys_deleted = self.cache.invalidate_user(&user_id.to_string()).await;

        let mut per_table_counts = Vec::with_capacity(ERASABLE_TABLES.len());
        let mut errors = Vec::new();

        for &table in ERASABLE_TABLES {
            match self.writer.delete_erasable_rows(table, user_id).await {
                Ok(count) => per_table_counts.push((table.to_string(), count)),
                Err(err) => {
                    tracing::warn!(%table, %user_id, error = %err, "erasure: table delete failed");
                    per_table_counts.push((table.to_string(), 0));
                    errors.push(format!("{table}: {err}"));
                }
            }
        }

        let success = errors.is_empty();
        tracing::info!(%user_id, cache_keys_deleted, success, "erasure complete");
        ErasureSummary { success, cache_keys_deleted, per_table_counts, errors }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lingua_data::MockDataStore;

    #[tokio::test]
    async fn delete_user_erases_every_table_and_is_idempotent() {
        let store = Arc::new(MockDataStore::new());
        let cache = Arc::new(PredictionCache::new("redis://127.0.0.1:1").unwrap());
        let coordinator = ErasureCoordinator::new(store.clone(), cache);
        let user_id = UserId::new();

        let first = coordinator.delete_user(user_id).await;
        assert!(first.success);
        assert_eq!(first.per_table_counts.len(), ERASABLE_TABLES.len());
        assert!(first.errors.is_empty());

        let second = coordinator.delete_user(user_id).await;
        assert!(second.success);
        assert_eq!(second.cache_keys_deleted, 0);
        assert!(second.per_table_counts.iter().all(|(_, count)| *count == 0));
    }
}
