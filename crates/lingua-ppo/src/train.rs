//! PPO clipped-surrogate training step (`spec.md` §4.5).
//!
//! Backpropagates by hand through [`ActorCritic`]'s small backbone —
//! there's no autodiff engine here, just the chain rule applied layer
//! by layer, one direction further than the forward pass alone needs.

use lingua_core::LinguaError;

use crate::buffer::{normalize_advantages, RolloutBuffer};
use crate::nn::{layer_norm_backward, relu_backward, Rng};
use crate::policy::ActorCritic;

/// Clipped-surrogate epsilon (`spec.md` §4.5).
pub const CLIP_EPSILON: f32 = 0.2;
/// Value-loss weight in the combined objective (`spec.md` §4.5).
pub const VALUE_LOSS_WEIGHT: f32 = 0.5;
/// Entropy bonus weight, encourages exploration (`spec.md` §4.5).
pub const ENTROPY_BONUS: f32 = 0.01;
/// Adam learning rate (`spec.md` §4.5).
pub const LEARNING_RATE: f32 = 3e-4;
/// Global gradient-norm clip (`spec.md` §4.5).
pub const MAX_GRAD_NORM: f32 = 0.5;
/// Epochs per update over the full buffer (`spec.md` §4.5).
pub const EPOCHS_PER_UPDATE: usize = 4;
/// Minibatch size within an epoch (`spec.md` §4.5).
pub const BATCH_SIZE: usize = 64;

#[derive(Debug, Clone, Copy, Default)]
pub struct TrainStats {
    pub policy_loss: f32,
    pub value_loss: f32,
    pub entropy: f32,
    pub updates_applied: usize,
}

struct AdamState {
    m: Vec<f32>,
    v: Vec<f32>,
    t: u64,
}

impl AdamState {
    fn new(size: usize) -> Self {
        Self { m: vec![0.0; size], v: vec![0.0; size], t: 0 }
    }

    fn step(&mut self, params: &mut [f32], grads: &[f32], lr: f32) {
        const BETA1: f32 = 0.9;
        const BETA2: f32 = 0.999;
        const EPS: f32 = 1e-8;
        self.t += 1;
        let bc1 = 1.0 - BETA1.powi(self.t as i32);
        let bc2 = 1.0 - BETA2.powi(self.t as i32);
        for i in 0..params.len() {
            self.m[i] = BETA1 * self.m[i] + (1.0 - BETA1) * grads[i];
            self.v[i] = BETA2 * self.v[i] + (1.0 - BETA2) * grads[i] * grads[i];
            let m_hat = self.m[i] / bc1;
            let v_hat = self.v[i] / bc2;
            params[i] -= lr * m_hat / (v_hat.sqrt() + EPS);
        }
    }
}

struct LayerAdam {
    weight: AdamState,
    bias: AdamState,
}

/// Owns an [`ActorCritic`] and its Adam optimiser state across
/// repeated PPO updates.
pub struct PpoTrainer {
    pub net: ActorCritic,
    backbone_adam: Vec<LayerAdam>,
    policy_adam: LayerAdam,
    value_adam: LayerAdam,
    rng: Rng,
}

impl PpoTrainer {
    pub fn new(net: ActorCritic, seed: u64) -> Self {
        let backbone_adam = net
            .backbone_layers()
            .iter()
            .map(|layer| LayerAdam {
                weight: AdamState::new(layer.weights().len()),
                bias: AdamState::new(layer.bias().len()),
            })
            .collect();
        let policy_adam = LayerAdam {
            weight: AdamState::new(net.policy_head().weights().len()),
            bias: AdamState::new(net.policy_head().bias().len()),
        };
        let value_adam = LayerAdam {
            weight: AdamState::new(net.value_head().weights().len()),
            bias: AdamState::new(net.value_head().bias().len()),
        };
        Self { net, backbone_adam, policy_adam, value_adam, rng: Rng::new(seed) }
    }

    /// Runs [`EPOCHS_PER_UPDATE`] passes over `buffer` in minibatches of
    /// [`BATCH_SIZE`], applying the clipped-surrogate PPO update.
    pub fn update(&mut self, buffer: &RolloutBuffer, bootstrap_value: f32) -> Result<TrainStats, LinguaError> {
        if buffer.is_empty() {
            return Err(LinguaError::validation("cannot run a PPO update on an empty rollout buffer"));
        }
        let (mut advantages, returns) = buffer.compute_gae(bootstrap_value);
        normalize_advantages(&mut advantages);
        let transitions: Vec<_> = buffer.transitions().cloned().collect();

        let mut stats = TrainStats::default();
        for _ in 0..EPOCHS_PER_UPDATE {
            for batch_start in (0..transitions.len()).step_by(BATCH_SIZE) {
                let batch_end = (batch_start + BATCH_SIZE).min(transitions.len());
                let batch_stats = self.update_batch(
                    &transitions[batch_start..batch_end],
                    &advantages[batch_start..batch_end],
                    &returns[batch_start..batch_end],
                );
                stats.policy_loss += batch_stats.policy_loss;
                stats.value_loss += batch_stats.value_loss;
                stats.entropy += batch_stats.entropy;
                stats.updates_applied += 1;
            }
        }
        if stats.updates_applied > 0 {
            stats.policy_loss /= stats.updates_applied as f32;
            stats.value_loss /= stats.updates_applied as f32;
            stats.entropy /= stats.updates_applied as f32;
        }
        Ok(stats)
    }

    fn update_batch(
        &mut self,
        batch: &[crate::buffer::Transition],
        advantages: &[f32],
        returns: &[f32],
    ) -> TrainStats {
        let n_backbone = self.net.backbone_layers().len();
        let mut backbone_weight_grad: Vec<Vec<f32>> =
            self.net.backbone_layers().iter().map(|l| vec![0.0; l.weights().len()]).collect();
        let mut backbone_bias_grad: Vec<Vec<f32>> =
            self.net.backbone_layers().iter().map(|l| vec![0.0; l.bias().len()]).collect();
        let mut policy_weight_grad = vec![0.0f32; self.net.policy_head().weights().len()];
        let mut policy_bias_grad = vec![0.0f32; self.net.policy_head().bias().len()];
        let mut value_weight_grad = vec![0.0f32; self.net.value_head().weights().len()];
        let mut value_bias_grad = vec![0.0f32; self.net.value_head().bias().len()];

        let mut stats = TrainStats::default();
        let batch_size = batch.len().max(1) as f32;

        for ((transition, &advantage), &ret) in batch.iter().zip(advantages).zip(returns) {
            let trace = self.net.forward_for_training(&transition.state, &mut self.rng);
            let probs = softmax(&trace.policy_logits);
            let new_log_prob = probs[transition.action].max(1e-12).ln();
            let ratio = (new_log_prob - transition.log_prob).exp();
            let surrogate1 = ratio * advantage;
            let clipped_ratio = ratio.clamp(1.0 - CLIP_EPSILON, 1.0 + CLIP_EPSILON);
            let surrogate2 = clipped_ratio * advantage;
            let clipped_branch_wins = surrogate2 < surrogate1;

            let entropy: f32 = probs.iter().map(|&p| if p > 0.0 { -p * p.ln() } else { 0.0 }).sum();

            let mut logit_grad = vec![0.0f32; probs.len()];
            if !clipped_branch_wins {
                for (k, grad) in logit_grad.iter_mut().enumerate() {
                    let indicator = if k == transition.action { 1.0 } else { 0.0 };
                    *grad += -advantage * ratio * (indicator - probs[k]);
                }
            }
            for (k, grad) in logit_grad.iter_mut().enumerate() {
                *grad += -ENTROPY_BONUS * (-probs[k] * (probs[k].max(1e-12).ln() + entropy));
            }

            let value_error = trace.value - ret;
            let value_grad = VALUE_LOSS_WEIGHT * 2.0 * value_error;

            let (pw, pb, d_backbone_from_policy) =
                self.net.policy_head().backward(&trace.backbone_output, &logit_grad);
            let (vw, vb, d_backbone_from_value) =
                self.net.value_head().backward(&trace.backbone_output, &[value_grad]);
            for i in 0..policy_weight_grad.len() {
                policy_weight_grad[i] += pw[i];
            }
            for i in 0..policy_bias_grad.len() {
                policy_bias_grad[i] += pb[i];
            }
            for i in 0..value_weight_grad.len() {
                value_weight_grad[i] += vw[i];
            }
            for i in 0..value_bias_grad.len() {
                value_bias_grad[i] += vb[i];
            }

            let mut d_backbone: Vec<f32> =
                d_backbone_from_policy.iter().zip(&d_backbone_from_value).map(|(a, b)| a + b).collect();

            for layer_idx in (0..n_backbone).rev() {
                let cache = &trace.layers[layer_idx];
                let d_dropped = d_backbone;
                let d_normed: Vec<f32> = d_dropped
                    .iter()
                    .zip(&cache.dropout_mask)
                    .map(|(&d, &keep)| if keep { d } else { 0.0 })
                    .collect();
                let d_post_relu = layer_norm_backward(&cache.normed, cache.inv_std, &d_normed);
                let d_pre_relu = relu_backward(&cache.pre_relu, &d_post_relu);
                let (lw, lb, d_input) = self.net.backbone_layers()[layer_idx].backward(&cache.input, &d_pre_relu);
                for i in 0..backbone_weight_grad[layer_idx].len() {
                    backbone_weight_grad[layer_idx][i] += lw[i];
                }
                for i in 0..backbone_bias_grad[layer_idx].len() {
                    backbone_bias_grad[layer_idx][i] += lb[i];
                }
                d_backbone = d_input;
            }

            stats.policy_loss += -surrogate1.min(surrogate2);
            stats.value_loss += value_error * value_error * VALUE_LOSS_WEIGHT;
            stats.entropy += entropy;
        }

        for grad in backbone_weight_grad.iter_mut().chain(backbone_bias_grad.iter_mut()) {
            for g in grad.iter_mut() {
                *g /= batch_size;
            }
        }
        for grad in [&mut policy_weight_grad, &mut policy_bias_grad, &mut value_weight_grad, &mut value_bias_grad] {
            for g in grad.iter_mut() {
                *g /= batch_size;
            }
        }
        stats.policy_loss /= batch_size;
        stats.value_loss /= batch_size;
        stats.entropy /= batch_size;

        clip_global_norm(
            backbone_weight_grad.iter_mut().chain(backbone_bias_grad.iter_mut()).chain([
                &mut policy_weight_grad,
                &mut policy_bias_grad,
                &mut value_weight_grad,
                &mut value_bias_grad,
            ]),
            MAX_GRAD_NORM,
        );

        for (layer_idx, adam) in self.backbone_adam.iter_mut().enumerate() {
            let layer = &mut self.net.backbone_layers_mut()[layer_idx];
            adam.weight.step(layer.weights_mut(), &backbone_weight_grad[layer_idx], LEARNING_RATE);
            adam.bias.step(layer.bias_mut(), &backbone_bias_grad[layer_idx], LEARNING_RATE);
        }
        self.policy_adam.weight.step(self.net.policy_head_mut().weights_mut(), &policy_weight_grad, LEARNING_RATE);
        self.policy_adam.bias.step(self.net.policy_head_mut().bias_mut(), &policy_bias_grad, LEARNING_RATE);
        self.value_adam.weight.step(self.net.value_head_mut().weights_mut(), &value_weight_grad, LEARNING_RATE);
        self.value_adam.bias.step(self.net.value_head_mut().bias_mut(), &value_bias_grad, LEARNING_RATE);

        stats.updates_applied = 1;
        stats
    }
}

fn softmax(logits: &[f32]) -> Vec<f32> {
    let max_logit = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exp: Vec<f32> = logits.iter().map(|&l| (l - max_logit).exp()).collect();
    let sum: f32 = exp.iter().sum();
    exp.into_iter().map(|e| e / sum).collect()
}

fn clip_global_norm<'a>(grads: impl Iterator<Item = &'a mut Vec<f32>>, max_norm: f32) {
    let grads: Vec<&mut Vec<f32>> = grads.collect();
    let total_norm: f32 = grads.iter().flat_map(|g| g.iter()).map(|&v| v * v).sum::<f32>().sqrt();
    if total_norm > max_norm {
        let scale = max_norm / (total_norm + 1e-8);
        for grad in grads {
            for g in grad.iter_mut() {
                *g *= scale;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::Transition;

    fn sample_transition(state_dim: usize) -> Transition {
        Transition {
            state: vec![0.1; state_dim],
            action: 0,
            reward: 1.0,
            log_prob: -1.0,
            value: 0.0,
            done: false,
        }
    }

    #[test]
    fn update_rejects_empty_buffer() {
        let net = ActorCritic::new_random(8, 3, 1);
        let mut trainer = PpoTrainer::new(net, 1);
        let buffer = RolloutBuffer::new();
        assert!(trainer.update(&buffer, 0.0).is_err());
    }

    #[test]
    fn update_runs_without_panicking_and_reports_stats() {
        let net = ActorCritic::new_random(8, 3, 1);
        let mut trainer = PpoTrainer::new(net, 1);
        let mut buffer = RolloutBuffer::new();
        for _ in 0..10 {
            buffer.push(sample_transition(8));
        }
        let stats = trainer.update(&buffer, 0.0).unwrap();
        assert!(stats.updates_applied > 0);
        assert!(stats.entropy >= 0.0);
    }

    #[test]
    fn clip_global_norm_shrinks_large_gradients() {
        let mut g1 = vec![10.0, 10.0];
        let mut g2 = vec![10.0];
        clip_global_norm(vec![&mut g1, &mut g2].into_iter(), MAX_GRAD_NORM);
        let norm = (g1.iter().chain(&g2).map(|v| v * v).sum::<f32>()).sqrt();
        assert!(norm <= MAX_GRAD_NORM + 1e-4);
    }
}
