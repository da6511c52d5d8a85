//! LinUCB contextual bandit with disjoint per-arm linear models
//! (`spec.md` §4.4).
//!
//! Grounded on `ml/rl_router/engine/bandit.py`'s `LinUCBModel`: the
//! same update rule, the same regularise-and-retry fallback on a
//! singular `A`, the same softmax confidence — expressed with
//! `nalgebra` matrices instead of numpy arrays.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use lingua_core::routing::STATE_DIM;
use lingua_core::LinguaError;

/// UCB exploration coefficient (`spec.md` §4.4).
pub const ALPHA: f64 = 1.5;

/// Regularisation added to `A_a` when inversion fails, then retried
/// once (`spec.md` §4.4).
const SINGULAR_REGULARIZATION: f64 = 0.01;

/// One action's disjoint linear model.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Arm {
    a: DMatrix<f64>,
    b: DVector<f64>,
    a_inv: DMatrix<f64>,
    pulls: u64,
}

impl Arm {
    fn new(d: usize) -> Self {
        Self {
            a: DMatrix::identity(d, d),
            b: DVector::zeros(d),
            a_inv: DMatrix::identity(d, d),
            pulls: 0,
        }
    }
}

/// The per-arm LinUCB model backing RouterCore once enough sessions
/// have accumulated to outgrow cold-start rules (`spec.md` §4.2-§4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinUcbModel {
    arms: Vec<Arm>,
    d: usize,
    alpha: f64,
    decay: f64,
    total_updates: u64,
}

impl LinUcbModel {
    /// Builds a model with `n_actions` arms over [`STATE_DIM`]-dimensional
    /// context vectors, `decay` in `(0, 1]` (1.0 disables decay).
    pub fn new(n_actions: usize, alpha: f64, decay: f64) -> Self {
        Self {
            arms: (0..n_actions).map(|_| Arm::new(STATE_DIM)).collect(),
            d: STATE_DIM,
            alpha,
            decay,
            total_updates: 0,
        }
    }

    /// Builds a model with the default exploration coefficient and no
    /// decay.
    pub fn with_defaults(n_actions: usize) -> Self {
        Self::new(n_actions, ALPHA, 1.0)
    }

    pub fn n_actions(&self) -> usize {
        self.arms.len()
    }

    pub fn total_updates(&self) -> u64 {
        self.total_updates
    }

    pub fn arm_pulls(&self, action: usize) -> u64 {
        self.arms[action].pulls
    }

    fn context_vector(&self, x: &[f32]) -> Result<DVector<f64>, LinguaError> {
        if x.len() != self.d {
            return Err(LinguaError::validation(format!(
                "expected context of dimension {}, got {}",
                self.d,
                x.len()
            )));
        }
        Ok(DVector::from_iterator(self.d, x.iter().map(|&v| v as f64)))
    }

    /// Scores every arm and returns `(best_action, scores)`
    /// (`spec.md` §4.4).
    pub fn predict(&self, x: &[f32]) -> Result<(usize, Vec<f64>), LinguaError> {
        let x = self.context_vector(x)?;
        let scores: Vec<f64> = self
            .arms
            .iter()
            .map(|arm| {
                let theta = &arm.a_inv * &arm.b;
                let mean = theta.dot(&x);
                let exploration = self.alpha * (x.dot(&(&arm.a_inv * &x))).max(0.0).sqrt();
                mean + exploration
            })
            .collect();
        let best = argmax(&scores);
        Ok((best, scores))
    }

    /// Like [`Self::predict`], but also returns a numerically-stable
    /// softmax confidence distribution over actions.
    pub fn predict_with_probs(&self, x: &[f32]) -> Result<(usize, Vec<f64>, Vec<f64>), LinguaError> {
        let (best, scores) = self.predict(x)?;
        let max_score = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let exp_scores: Vec<f64> = scores.iter().map(|&s| (s - max_score).exp()).collect();
        let sum: f64 = exp_scores.iter().sum();
        let probs = exp_scores.into_iter().map(|e| e / sum).collect();
        Ok((best, scores, probs))
    }

    /// Applies one `(action, context, reward)` observation
    /// (`spec.md` §4.4).
    pub fn update(&mut self, action: usize, x: &[f32], reward: f64) -> Result<(), LinguaError> {
        let x = self.context_vector(x)?;
        let arm = self
            .arms
            .get_mut(action)
            .ok_or_else(|| LinguaError::validation(format!("invalid action index {action}")))?;

        let outer = &x * x.transpose();
        arm.a = if self.decay < 1.0 {
            &arm.a * self.decay + &outer
        } else {
            &arm.a + &outer
        };
        arm.b += reward * &x;

        arm.a_inv = match arm.a.clone().try_inverse() {
            Some(inv) => inv,
            None => {
                arm.a += DMatrix::identity(self.d, self.d) * SINGULAR_REGULARIZATION;
                arm.a.clone().try_inverse().ok_or_else(|| {
                    LinguaError::internal("LinUCB arm matrix remained singular after regularisation")
                })?
            }
        };

        arm.pulls += 1;
        self.total_updates += 1;
        Ok(())
    }

    /// Batch form of [`Self::update`], applied in order.
    pub fn batch_update(
        &mut self,
        observations: &[(usize, Vec<f32>, f64)],
    ) -> Result<(), LinguaError> {
        for (action, x, reward) in observations {
            self.update(*action, x, *reward)?;
        }
        Ok(())
    }

    /// Confidence for one `(action, context)` pair: inversely related
    /// to predictive uncertainty, clamped to `[0, 1]` (`spec.md` §4.4).
    pub fn confidence(&self, action: usize, x: &[f32]) -> Result<f64, LinguaError> {
        let x = self.context_vector(x)?;
        let arm = self
            .arms
            .get(action)
            .ok_or_else(|| LinguaError::validation(format!("invalid action index {action}")))?;
        let uncertainty = (x.dot(&(&arm.a_inv * &x))).max(0.0).sqrt();
        Ok((1.0 / (1.0 + uncertainty)).clamp(0.0, 1.0))
    }
}

fn argmax(scores: &[f64]) -> usize {
    scores
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(best_i, best_v), (i, &v)| {
            if v > best_v { (i, v) } else { (best_i, best_v) }
        })
        .0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(seed: f32) -> Vec<f32> {
        let mut v = vec![0.0f32; STATE_DIM];
        v[0] = seed;
        v
    }

    #[test]
    fn predict_rejects_wrong_dimension() {
        let model = LinUcbModel::with_defaults(3);
        assert!(model.predict(&[0.0, 1.0]).is_err());
    }

    #[test]
    fn fresh_model_scores_all_arms_equal() {
        let model = LinUcbModel::with_defaults(3);
        let (_, scores) = model.predict(&ctx(0.5)).unwrap();
        assert!((scores[0] - scores[1]).abs() < 1e-9);
        assert!((scores[1] - scores[2]).abs() < 1e-9);
    }

    #[test]
    fn update_biases_future_predictions_toward_rewarded_arm() {
        let mut model = LinUcbModel::with_defaults(2);
        let x = ctx(1.0);
        for _ in 0..20 {
            model.update(0, &x, 1.0).unwrap();
            model.update(1, &x, -1.0).unwrap();
        }
        let (best, _) = model.predict(&x).unwrap();
        assert_eq!(best, 0);
    }

    #[test]
    fn update_increments_pull_counters_and_total() {
        let mut model = LinUcbModel::with_defaults(2);
        model.update(0, &ctx(1.0), 0.5).unwrap();
        model.update(0, &ctx(1.0), 0.5).unwrap();
        assert_eq!(model.arm_pulls(0), 2);
        assert_eq!(model.total_updates(), 2);
    }

    #[test]
    fn predict_with_probs_sums_to_one() {
        let mut model = LinUcbModel::with_defaults(3);
        model.update(0, &ctx(1.0), 1.0).unwrap();
        let (_, _, probs) = model.predict_with_probs(&ctx(1.0)).unwrap();
        let sum: f64 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn confidence_is_within_unit_interval() {
        let mut model = LinUcbModel::with_defaults(1);
        model.update(0, &ctx(1.0), 1.0).unwrap();
        let confidence = model.confidence(0, &ctx(1.0)).unwrap();
        assert!((0.0..=1.0).contains(&confidence));
    }
}
