//! PPO actor-critic policy for mature-regime routing decisions
//! (`spec.md` §4.5).
//!
//! Hand-rolled rather than framework-backed: the network is a small
//! 2×128 MLP, so [`nn`] carries both the forward pass and (beyond the
//! teacher's original inference-only version) a backward pass, and
//! [`train::PpoTrainer`] drives the clipped-surrogate update with its
//! own Adam optimiser instead of reaching for an autodiff crate.

mod nn;

pub mod buffer;
pub mod policy;
pub mod train;

pub use buffer::{normalize_advantages, RolloutBuffer, Transition, BUFFER_CAPACITY, GAMMA, LAMBDA};
pub use policy::{ActorCritic, BACKBONE_DEPTH, DROPOUT_P, HIDDEN_DIM};
pub use train::{
    PpoTrainer, TrainStats, BATCH_SIZE, CLIP_EPSILON, ENTROPY_BONUS, EPOCHS_PER_UPDATE, LEARNING_RATE,
    MAX_GRAD_NORM, VALUE_LOSS_WEIGHT,
};
