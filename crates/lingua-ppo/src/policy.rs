//! Actor-critic network: a shared MLP backbone with a policy head and
//! a value head (`spec.md` §4.5).

use serde::{Deserialize, Serialize};

use lingua_core::LinguaError;

use crate::nn::{dropout, layer_norm_with_stats, relu, Linear, Rng};

/// Hidden width of each backbone layer (`spec.md` §4.5 default).
pub const HIDDEN_DIM: usize = 128;

/// Number of backbone layers (`spec.md` §4.5 default).
pub const BACKBONE_DEPTH: usize = 2;

/// Dropout probability applied after each backbone layer during
/// training; disabled during inference (`spec.md` §4.5).
pub const DROPOUT_P: f32 = 0.1;

/// One backbone layer's cached forward activations, kept only long
/// enough to run the backward pass for the same transition.
pub(crate) struct LayerCache {
    pub(crate) input: Vec<f32>,
    pub(crate) pre_relu: Vec<f32>,
    pub(crate) post_relu: Vec<f32>,
    pub(crate) normed: Vec<f32>,
    pub(crate) inv_std: f32,
    pub(crate) dropout_mask: Vec<bool>,
}

/// Full forward trace through the network, used by the PPO update to
/// recompute gradients without a general-purpose autodiff engine.
pub(crate) struct ForwardTrace {
    pub(crate) layers: Vec<LayerCache>,
    pub(crate) backbone_output: Vec<f32>,
    pub(crate) policy_logits: Vec<f32>,
    pub(crate) value: f32,
}

/// The PPO actor-critic network: shared backbone, policy head
/// (`n_actions` logits) and value head (scalar).
///
/// Not directly `Serialize`/`Deserialize`: weights travel through
/// [`Self::to_artifact_payload`]/[`Self::from_artifact_payload`] into
/// [`lingua_core::ModelArtifact::payload`] instead, since reloading an
/// artifact always supplies `state_dim`/`n_actions` up front for the
/// shape check in [`Self::validate_shape`].
#[derive(Clone)]
pub struct ActorCritic {
    pub state_dim: usize,
    pub n_actions: usize,
    backbone: Vec<LinearLayer>,
    policy_head: Option<Linear>,
    value_head: Option<Linear>,
}

#[derive(Clone)]
struct LinearLayer(Linear);

/// Plain-data snapshot of one [`Linear`] layer's weights, the unit
/// serialized into an artifact payload.
#[derive(Serialize, Deserialize)]
struct LinearSnapshot {
    weights: Vec<f32>,
    bias: Vec<f32>,
    in_dim: usize,
    out_dim: usize,
}

impl From<&Linear> for LinearSnapshot {
    fn from(layer: &Linear) -> Self {
        Self {
            weights: layer.weights().to_vec(),
            bias: layer.bias().to_vec(),
            in_dim: layer.in_dim(),
            out_dim: layer.out_dim(),
        }
    }
}

impl From<LinearSnapshot> for Linear {
    fn from(snapshot: LinearSnapshot) -> Self {
        Linear::from_parts(snapshot.weights, snapshot.bias, snapshot.in_dim, snapshot.out_dim)
    }
}

#[derive(Serialize, Deserialize)]
struct ActorCriticWeights {
    backbone: Vec<LinearSnapshot>,
    policy_head: LinearSnapshot,
    value_head: LinearSnapshot,
}

impl ActorCritic {
    /// Builds a freshly-initialised network for `state_dim` inputs and
    /// `n_actions` outputs, seeded deterministically.
    pub fn new_random(state_dim: usize, n_actions: usize, seed: u64) -> Self {
        let mut rng = Rng::new(seed);
        let mut backbone = Vec::with_capacity(BACKBONE_DEPTH);
        let mut in_dim = state_dim;
        for _ in 0..BACKBONE_DEPTH {
            backbone.push(LinearLayer(Linear::new_xavier(&mut rng, in_dim, HIDDEN_DIM)));
            in_dim = HIDDEN_DIM;
        }
        let policy_head = Linear::new_xavier(&mut rng, HIDDEN_DIM, n_actions);
        let value_head = Linear::new_xavier(&mut rng, HIDDEN_DIM, 1);
        Self {
            state_dim,
            n_actions,
            backbone,
            policy_head: Some(policy_head),
            value_head: Some(value_head),
        }
    }

    /// Serializes this network's weights for
    /// [`lingua_core::ModelArtifact::payload`]. `state_dim`/`n_actions`
    /// travel alongside on the artifact itself, not in the payload.
    pub fn to_artifact_payload(&self) -> Vec<u8> {
        let weights = ActorCriticWeights {
            backbone: self.backbone.iter().map(|LinearLayer(l)| LinearSnapshot::from(l)).collect(),
            policy_head: LinearSnapshot::from(self.policy_head.as_ref().expect("policy head present")),
            value_head: LinearSnapshot::from(self.value_head.as_ref().expect("value head present")),
        };
        serde_json::to_vec(&weights).expect("ActorCriticWeights is always serializable")
    }

    /// Rebuilds a network from an artifact payload produced by
    /// [`Self::to_artifact_payload`], for the given shape.
    pub fn from_artifact_payload(
        state_dim: usize,
        n_actions: usize,
        payload: &[u8],
    ) -> Result<Self, LinguaError> {
        let weights: ActorCriticWeights = serde_json::from_slice(payload).map_err(|err| {
            LinguaError::ArtifactMismatch {
                model: "ppo-policy".to_string(),
                message: format!("malformed artifact payload: {err}"),
            }
        })?;
        Ok(Self {
            state_dim,
            n_actions,
            backbone: weights.backbone.into_iter().map(|s| LinearLayer(s.into())).collect(),
            policy_head: Some(weights.policy_head.into()),
            value_head: Some(weights.value_head.into()),
        })
    }

    /// Validates that this network's shape matches what the caller
    /// expects, returning [`LinguaError::ArtifactMismatch`] otherwise —
    /// "loading a mismatched artifact fails loudly" (`spec.md` §3
    /// `PPOPolicy` invariant).
    pub fn validate_shape(&self, expected_state_dim: usize, expected_n_actions: usize) -> Result<(), LinguaError> {
        if self.state_dim != expected_state_dim || self.n_actions != expected_n_actions {
            return Err(LinguaError::ArtifactMismatch {
                model: "ppo-policy".to_string(),
                message: format!(
                    "expected (state_dim={expected_state_dim}, n_actions={expected_n_actions}), found (state_dim={}, n_actions={})",
                    self.state_dim, self.n_actions
                ),
            });
        }
        Ok(())
    }

    fn forward_trace(&self, state: &[f32], training: bool, rng: &mut Rng) -> ForwardTrace {
        let mut layers = Vec::with_capacity(self.backbone.len());
        let mut x = state.to_vec();
        for LinearLayer(linear) in &self.backbone {
            let pre_relu = linear.forward(&x);
            let post_relu = relu(&pre_relu);
            let (normed, inv_std) = layer_norm_with_stats(&post_relu);
            let (dropped, mask) = if training {
                dropout(&normed, DROPOUT_P, rng)
            } else {
                (normed.clone(), vec![true; normed.len()])
            };
            layers.push(LayerCache {
                input: x.clone(),
                pre_relu,
                post_relu,
                normed,
                inv_std,
                dropout_mask: mask,
            });
            x = dropped;
        }
        let policy_logits = self.policy_head.as_ref().expect("policy head present").forward(&x);
        let value = self.value_head.as_ref().expect("value head present").forward(&x)[0];
        ForwardTrace {
            layers,
            backbone_output: x,
            policy_logits,
            value,
        }
    }

    /// Softmax action distribution + state value for inference.
    pub fn forward(&self, state: &[f32]) -> (Vec<f32>, f32) {
        let mut rng = Rng::new(0);
        let trace = self.forward_trace(state, false, &mut rng);
        (softmax(&trace.policy_logits), trace.value)
    }

    pub(crate) fn forward_for_training(&self, state: &[f32], rng: &mut Rng) -> ForwardTrace {
        self.forward_trace(state, true, rng)
    }

    pub(crate) fn backbone_layers(&self) -> &[LinearLayer] {
        &self.backbone
    }

    pub(crate) fn policy_head(&self) -> &Linear {
        self.policy_head.as_ref().expect("policy head present")
    }

    pub(crate) fn value_head(&self) -> &Linear {
        self.value_head.as_ref().expect("value head present")
    }

    pub(crate) fn backbone_layers_mut(&mut self) -> &mut [LinearLayer] {
        &mut self.backbone
    }

    pub(crate) fn policy_head_mut(&mut self) -> &mut Linear {
        self.policy_head.as_mut().expect("policy head present")
    }

    pub(crate) fn value_head_mut(&mut self) -> &mut Linear {
        self.value_head.as_mut().expect("value head present")
    }

    /// Deterministic action selection: argmax of the policy
    /// distribution, with its probability reported as confidence
    /// (`spec.md` §4.5).
    pub fn act_deterministic(&self, state: &[f32]) -> (usize, f32, f32) {
        let (probs, value) = self.forward(state);
        let action = argmax(&probs);
        (action, probs[action], value)
    }

    /// Stochastic action selection, sampling from the policy
    /// distribution; used to collect exploration during rollout
    /// (`spec.md` §4.5).
    pub fn act_sampled(&self, state: &[f32], rng: &mut Rng) -> (usize, f32, f32) {
        let (probs, value) = self.forward(state);
        let draw = rng.next_f32();
        let mut cumulative = 0.0;
        let mut action = probs.len() - 1;
        for (i, &p) in probs.iter().enumerate() {
            cumulative += p;
            if draw < cumulative {
                action = i;
                break;
            }
        }
        (action, probs[action], value)
    }
}

impl std::ops::Deref for LinearLayer {
    type Target = Linear;
    fn deref(&self) -> &Linear {
        &self.0
    }
}

impl std::ops::DerefMut for LinearLayer {
    fn deref_mut(&mut self) -> &mut Linear {
        &mut self.0
    }
}

fn softmax(logits: &[f32]) -> Vec<f32> {
    let max_logit = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exp: Vec<f32> = logits.iter().map(|&l| (l - max_logit).exp()).collect();
    let sum: f32 = exp.iter().sum();
    exp.into_iter().map(|e| e / sum).collect()
}

fn argmax(values: &[f32]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(bi, bv), (i, &v)| if v > bv { (i, v) } else { (bi, bv) })
        .0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_produces_normalised_action_distribution() {
        let net = ActorCritic::new_random(24, 6, 7);
        let (probs, _) = net.forward(&[0.1; 24]);
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-4);
        assert_eq!(probs.len(), 6);
    }

    #[test]
    fn act_deterministic_picks_the_highest_probability_action() {
        let net = ActorCritic::new_random(24, 6, 7);
        let (action, confidence, _) = net.act_deterministic(&[0.1; 24]);
        let (probs, _) = net.forward(&[0.1; 24]);
        assert_eq!(confidence, probs[action]);
        assert_eq!(probs.iter().cloned().fold(f32::MIN, f32::max), confidence);
    }

    #[test]
    fn artifact_payload_round_trips_weights() {
        let net = ActorCritic::new_random(24, 6, 7);
        let (before, _) = net.forward(&[0.1; 24]);
        let payload = net.to_artifact_payload();
        let restored = ActorCritic::from_artifact_payload(24, 6, &payload).unwrap();
        let (after, _) = restored.forward(&[0.1; 24]);
        assert_eq!(before, after);
    }

    #[test]
    fn from_artifact_payload_rejects_malformed_bytes() {
        assert!(ActorCritic::from_artifact_payload(24, 6, b"not json").is_err());
    }

    #[test]
    fn validate_shape_rejects_mismatched_dims() {
        let net = ActorCritic::new_random(24, 6, 1);
        assert!(net.validate_shape(24, 6).is_ok());
        assert!(net.validate_shape(16, 6).is_err());
        assert!(net.validate_shape(24, 5).is_err());
    }

    #[test]
    fn act_sampled_stays_within_action_bounds() {
        let net = ActorCritic::new_random(24, 6, 1);
        let mut rng = Rng::new(99);
        for _ in 0..50 {
            let (action, _, _) = net.act_sampled(&[0.1; 24], &mut rng);
            assert!(action < 6);
        }
    }
}
