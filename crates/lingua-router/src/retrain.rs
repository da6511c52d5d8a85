//! RetrainScheduler: single-flight, cron-driven retraining with
//! exponential backoff (`spec.md` §4.10).

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_cron_scheduler::{Job, JobScheduler};

use lingua_cache::PredictionCache;
use lingua_core::{LinguaError, ModelArtifact};

/// Retry budget before a transient failure is given up on
/// (`spec.md` §4.10 step 4).
pub const MAX_ATTEMPTS: u32 = 3;

/// Exponential back-off delays between retries, seconds
/// (`spec.md` §4.10 step 4).
pub const BACKOFF_SECONDS: [u64; 3] = [60, 120, 240];

/// One model's retrain job: pulls fresh data, produces an artifact,
/// and publishes it under the scheduler's single-flight guard.
#[async_trait]
pub trait Trainer: Send + Sync {
    /// Unique id for this model, used as the single-flight key.
    fn model_id(&self) -> &str;

    /// The service slug whose cache entries get flushed after publish
    /// (`spec.md` §4.9 key convention).
    fn service_slug(&self) -> &str;

    async fn train(&self) -> Result<ModelArtifact, LinguaError>;

    async fn publish(&self, artifact: ModelArtifact) -> Result<(), LinguaError>;
}

/// Coordinates retrain runs across however many [`Trainer`]s a service
/// registers, guaranteeing at most one in-flight run per `model_id`
/// (`spec.md` §4.10 "Concurrency").
pub struct RetrainScheduler {
    cache: Arc<PredictionCache>,
    in_flight: Mutex<HashSet<String>>,
}

impl RetrainScheduler {
    pub fn new(cache: Arc<PredictionCache>) -> Self {
        Self { cache, in_flight: Mutex::new(HashSet::new()) }
    }

    /// Runs one retrain task end-to-end: acquires the single-flight
    /// guard, retries transient failures with exponential back-off,
    /// and flushes the cache strictly after a successful publish.
    ///
    /// Returns [`LinguaError::Validation`] immediately, without
    /// training, if another run for the same model is already in
    /// flight.
    pub async fn run(&self, trainer: &dyn Trainer) -> Result<(), LinguaError> {
        if !self.try_acquire(trainer.model_id()) {
            return Err(LinguaError::validation(format!(
                "retrain for '{}' already in flight",
                trainer.model_id()
            )));
        }
        let result = self.run_with_retry(trainer).await;
        self.release(trainer.model_id());
        result
    }

    fn try_acquire(&self, model_id: &str) -> bool {
        self.in_flight.lock().expect("lock poisoned").insert(model_id.to_string())
    }

    fn release(&self, model_id: &str) {
        self.in_flight.lock().expect("lock poisoned").remove(model_id);
    }

    /// Registers `trainer` on `cron_expr` against a shared
    /// `tokio-cron-scheduler` instance, standing in for the platform's
    /// external distributed task queue (`spec.md` §4.10 "cron-driven").
    /// Failures from a scheduled run are logged, never propagated —
    /// there is no caller left to hand them to.
    pub async fn schedule(
        self: &Arc<Self>,
        sched: &JobScheduler,
        cron_expr: &str,
        trainer: Arc<dyn Trainer>,
    ) -> Result<(), LinguaError> {
        let scheduler = Arc::clone(self);
        let job = Job::new_async(cron_expr, move |_uuid, _jobs| {
            let scheduler = Arc::clone(&scheduler);
            let trainer = Arc::clone(&trainer);
            Box::pin(async move {
                if let Err(err) = scheduler.run(trainer.as_ref()).await {
                    tracing::error!(model_id = trainer.model_id(), error = %err, "scheduled retrain failed");
                }
            })
        })
        .map_err(|err| LinguaError::internal(err.to_string()))?;
        sched.add(job).await.map_err(|err| LinguaError::internal(err.to_string()))?;
        Ok(())
    }

    async fn run_with_retry(&self, trainer: &dyn Trainer) -> Result<(), LinguaError> {
        let mut attempt = 0u32;
        loop {
            match trainer.train().await {
                Ok(artifact) => {
                    trainer.publish(artifact).await?;
                    self.cache.invalidate_service(trainer.service_slug()).await;
                    tracing::info!(model_id = trainer.model_id(), attempt, "retrain published");
                    return Ok(());
                }
                Err(LinguaError::TransientTrainingFailure { model, message }) => {
                    attempt += 1;
                    tracing::warn!(%model, %message, attempt, "transient training failure");
                    if attempt >= MAX_ATTEMPTS {
                        return Err(LinguaError::PermanentTrainingFailure {
                            model,
                            message: format!("exhausted {MAX_ATTEMPTS} attempts: {message}"),
                        });
                    }
                    tokio::time::sleep(std::time::Duration::from_secs(
                        BACKOFF_SECONDS[(attempt - 1) as usize],
                    ))
                    .await;
                }
                Err(err @ LinguaError::PermanentTrainingFailure { .. }) => {
                    tracing::error!(model_id = trainer.model_id(), error = %err, "permanent training failure");
                    return Err(err);
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyTrainer {
        attempts: AtomicU32,
        succeed_on: u32,
    }

    #[async_trait]
    impl Trainer for FlakyTrainer {
        fn model_id(&self) -> &str {
            "linucb-router"
        }

        fn service_slug(&self) -> &str {
            "router"
        }

        async fn train(&self) -> Result<ModelArtifact, LinguaError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt < self.succeed_on {
                return Err(LinguaError::TransientTrainingFailure {
                    model: self.model_id().to_string(),
                    message: "simulated flake".to_string(),
                });
            }
            Ok(ModelArtifact {
                model_id: self.model_id().to_string(),
                version: attempt as u64,
                feature_schema: vec![],
                hyperparameters: std::collections::HashMap::new(),
                trained_at: chrono::Utc::now(),
                payload: vec![],
            })
        }

        async fn publish(&self, _artifact: ModelArtifact) -> Result<(), LinguaError> {
            Ok(())
        }
    }

    fn scheduler() -> RetrainScheduler {
        RetrainScheduler::new(Arc::new(PredictionCache::new("redis://127.0.0.1:1").unwrap()))
    }

    #[tokio::test(start_paused = true)]
    async fn run_retries_transient_failures_until_success() {
        let trainer = FlakyTrainer { attempts: AtomicU32::new(0), succeed_on: 2 };
        let scheduler = scheduler();
        scheduler.run(&trainer).await.unwrap();
        assert_eq!(trainer.attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn run_gives_up_after_max_attempts() {
        let trainer = FlakyTrainer { attempts: AtomicU32::new(0), succeed_on: 100 };
        let scheduler = scheduler();
        let result = scheduler.run(&trainer).await;
        assert!(matches!(result, Err(LinguaError::PermanentTrainingFailure { .. })));
        assert_eq!(trainer.attempts.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn run_rejects_a_second_concurrent_run_for_the_same_model() {
        let trainer = FlakyTrainer { attempts: AtomicU32::new(0), succeed_on: 1 };
        let scheduler = scheduler();
        assert!(scheduler.try_acquire(trainer.model_id()));
        let result = scheduler.run(&trainer).await;
        assert!(result.is_err());
        scheduler.release(trainer.model_id());
    }
}
