//! Internal neural network primitives for the PPO policy.
//!
//! A deterministic PRNG plus a hand-rolled linear layer with its own
//! backward pass: the policy's actor and critic are a 2×128 MLP, far
//! too small to justify pulling in a tensor framework for what's
//! otherwise plain scalar arithmetic.

use rand::rngs::StdRng;
use rand::{Rng as _, SeedableRng};
use rand_distr::{Bernoulli, Distribution};

/// Seeded PRNG used for reproducible weight initialization and
/// dropout masks. `StdRng` is deterministic given a seed, which is
/// what reproducible training runs depend on.
#[derive(Clone)]
pub(crate) struct Rng(StdRng);

impl Rng {
    pub(crate) fn new(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }

    pub(crate) fn next_u64(&mut self) -> u64 {
        self.0.random()
    }

    pub(crate) fn next_f32(&mut self) -> f32 {
        self.0.random()
    }

    pub(crate) fn next_f32_range(&mut self, lo: f32, hi: f32) -> f32 {
        self.0.random_range(lo..hi)
    }

    /// `true` with probability `1 - drop_p`, used for dropout's keep mask.
    pub(crate) fn keep(&mut self, drop_p: f32) -> bool {
        Bernoulli::new((1.0 - drop_p) as f64).expect("drop_p in [0, 1]").sample(&mut self.0)
    }
}

/// A single linear (fully connected) layer: `y = Wx + b`, with a
/// backward pass for the PPO training loop.
///
/// Weights are stored row-major: `weights[i * in_dim + j]` is the
/// weight from input `j` to output `i`.
#[derive(Clone)]
pub(crate) struct Linear {
    weights: Vec<f32>,
    bias: Vec<f32>,
    in_dim: usize,
    out_dim: usize,
}

impl Linear {
    /// Xavier/Glorot uniform initialization: weights ~ Uniform(-limit,
    /// limit) where limit = sqrt(6 / (in + out)); biases start at zero.
    pub(crate) fn new_xavier(rng: &mut Rng, in_dim: usize, out_dim: usize) -> Self {
        let limit = (6.0 / (in_dim + out_dim) as f32).sqrt();
        let weights: Vec<f32> = (0..out_dim * in_dim)
            .map(|_| rng.next_f32_range(-limit, limit))
            .collect();
        Self {
            weights,
            bias: vec![0.0; out_dim],
            in_dim,
            out_dim,
        }
    }

    pub(crate) fn forward(&self, input: &[f32]) -> Vec<f32> {
        debug_assert_eq!(input.len(), self.in_dim);
        let mut output = self.bias.clone();
        for (i, out_val) in output.iter_mut().enumerate() {
            let row_start = i * self.in_dim;
            let mut sum = *out_val;
            for (j, &inp_val) in input.iter().enumerate() {
                sum += self.weights[row_start + j] * inp_val;
            }
            *out_val = sum;
        }
        output
    }

    pub(crate) fn in_dim(&self) -> usize {
        self.in_dim
    }

    pub(crate) fn out_dim(&self) -> usize {
        self.out_dim
    }

    /// Rebuilds a layer from its raw weights, e.g. when loading a
    /// persisted [`crate::policy::ActorCritic`] artifact payload.
    pub(crate) fn from_parts(weights: Vec<f32>, bias: Vec<f32>, in_dim: usize, out_dim: usize) -> Self {
        Self { weights, bias, in_dim, out_dim }
    }

    /// Backward pass given the upstream gradient `d_output` and the
    /// `input` that produced the forward output. Returns
    /// `(weight_grad, bias_grad, input_grad)`.
    pub(crate) fn backward(&self, input: &[f32], d_output: &[f32]) -> (Vec<f32>, Vec<f32>, Vec<f32>) {
        debug_assert_eq!(input.len(), self.in_dim);
        debug_assert_eq!(d_output.len(), self.out_dim);

        let mut weight_grad = vec![0.0f32; self.out_dim * self.in_dim];
        let mut input_grad = vec![0.0f32; self.in_dim];
        for i in 0..self.out_dim {
            let row_start = i * self.in_dim;
            for j in 0..self.in_dim {
                weight_grad[row_start + j] = d_output[i] * input[j];
                input_grad[j] += d_output[i] * self.weights[row_start + j];
            }
        }
        (weight_grad, d_output.to_vec(), input_grad)
    }

    pub(crate) fn weights(&self) -> &[f32] {
        &self.weights
    }

    pub(crate) fn bias(&self) -> &[f32] {
        &self.bias
    }

    pub(crate) fn weights_mut(&mut self) -> &mut [f32] {
        &mut self.weights
    }

    pub(crate) fn bias_mut(&mut self) -> &mut [f32] {
        &mut self.bias
    }
}

/// Applies ReLU elementwise, returning the activated output.
pub(crate) fn relu(x: &[f32]) -> Vec<f32> {
    x.iter().map(|&v| v.max(0.0)).collect()
}

/// Backward pass for [`relu`]: zeroes the gradient wherever the
/// forward input was non-positive.
pub(crate) fn relu_backward(input: &[f32], d_output: &[f32]) -> Vec<f32> {
    input.iter().zip(d_output).map(|(&x, &d)| if x > 0.0 { d } else { 0.0 }).collect()
}

const LAYER_NORM_EPS: f32 = 1e-5;

/// LayerNorm with no learnable affine parameters: normalises to zero
/// mean, unit variance across the feature dimension.
pub(crate) fn layer_norm(x: &[f32]) -> Vec<f32> {
    let n = x.len() as f32;
    let mean = x.iter().sum::<f32>() / n;
    let var = x.iter().map(|&v| (v - mean).powi(2)).sum::<f32>() / n;
    let inv_std = 1.0 / (var + LAYER_NORM_EPS).sqrt();
    x.iter().map(|&v| (v - mean) * inv_std).collect()
}

/// Backward pass for [`layer_norm`], given the normalised forward
/// output `y` (so the caller doesn't need to recompute mean/variance).
pub(crate) fn layer_norm_backward(y: &[f32], inv_std: f32, d_output: &[f32]) -> Vec<f32> {
    let n = y.len() as f32;
    let sum_dy: f32 = d_output.iter().sum();
    let sum_dy_y: f32 = d_output.iter().zip(y).map(|(&dy, &yi)| dy * yi).sum();
    d_output
        .iter()
        .zip(y)
        .map(|(&dy, &yi)| inv_std / n * (n * dy - sum_dy - yi * sum_dy_y))
        .collect()
}

/// Returns `(normalised, inv_std)` so the backward pass can reuse the
/// forward statistics instead of recomputing them.
pub(crate) fn layer_norm_with_stats(x: &[f32]) -> (Vec<f32>, f32) {
    let n = x.len() as f32;
    let mean = x.iter().sum::<f32>() / n;
    let var = x.iter().map(|&v| (v - mean).powi(2)).sum::<f32>() / n;
    let inv_std = 1.0 / (var + LAYER_NORM_EPS).sqrt();
    (x.iter().map(|&v| (v - mean) * inv_std).collect(), inv_std)
}

/// Inverted dropout: zeroes each unit independently with probability
/// `p`, rescaling survivors by `1 / (1 - p)` so inference needs no
/// rescaling. A no-op when `p <= 0.0` (used for evaluation/inference).
pub(crate) fn dropout(x: &[f32], p: f32, rng: &mut Rng) -> (Vec<f32>, Vec<bool>) {
    if p <= 0.0 {
        return (x.to_vec(), vec![true; x.len()]);
    }
    let keep_scale = 1.0 / (1.0 - p);
    let mask: Vec<bool> = (0..x.len()).map(|_| rng.keep(p)).collect();
    let out = x
        .iter()
        .zip(&mask)
        .map(|(&v, &keep)| if keep { v * keep_scale } else { 0.0 })
        .collect();
    (out, mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rng_is_deterministic() {
        let mut r1 = Rng::new(42);
        let mut r2 = Rng::new(42);
        for _ in 0..50 {
            assert_eq!(r1.next_u64(), r2.next_u64());
        }
    }

    #[test]
    fn linear_forward_output_has_expected_size() {
        let mut rng = Rng::new(1);
        let layer = Linear::new_xavier(&mut rng, 8, 4);
        assert_eq!(layer.forward(&[1.0; 8]).len(), 4);
    }

    #[test]
    fn linear_backward_shapes_match_layer_dims() {
        let mut rng = Rng::new(1);
        let layer = Linear::new_xavier(&mut rng, 6, 3);
        let input = vec![0.5; 6];
        let (wg, bg, ig) = layer.backward(&input, &[1.0, 1.0, 1.0]);
        assert_eq!(wg.len(), 18);
        assert_eq!(bg.len(), 3);
        assert_eq!(ig.len(), 6);
    }

    #[test]
    fn relu_zeroes_negative_inputs() {
        assert_eq!(relu(&[-1.0, 0.0, 2.0]), vec![0.0, 0.0, 2.0]);
    }

    #[test]
    fn relu_backward_blocks_gradient_through_negatives() {
        let grad = relu_backward(&[-1.0, 2.0], &[5.0, 5.0]);
        assert_eq!(grad, vec![0.0, 5.0]);
    }

    #[test]
    fn layer_norm_output_has_zero_mean_unit_variance() {
        let y = layer_norm(&[1.0, 2.0, 3.0, 4.0]);
        let mean: f32 = y.iter().sum::<f32>() / y.len() as f32;
        assert!(mean.abs() < 1e-5);
    }

    #[test]
    fn dropout_is_identity_when_p_is_zero() {
        let mut rng = Rng::new(1);
        let (out, mask) = dropout(&[1.0, 2.0, 3.0], 0.0, &mut rng);
        assert_eq!(out, vec![1.0, 2.0, 3.0]);
        assert!(mask.iter().all(|&k| k));
    }
}
