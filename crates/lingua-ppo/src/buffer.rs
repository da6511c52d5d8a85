//! Rollout buffer and GAE advantage computation (`spec.md` §4.5).

use std::collections::VecDeque;

/// Hard cap on the rollout buffer (`spec.md` §4.5).
pub const BUFFER_CAPACITY: usize = 2048;

/// Discount factor for GAE (`spec.md` §4.5).
pub const GAMMA: f32 = 0.99;

/// GAE smoothing factor (`spec.md` §4.5).
pub const LAMBDA: f32 = 0.95;

/// One recorded interaction between the policy and the environment.
#[derive(Debug, Clone)]
pub struct Transition {
    pub state: Vec<f32>,
    pub action: usize,
    pub reward: f32,
    pub log_prob: f32,
    pub value: f32,
    pub done: bool,
}

/// A FIFO rollout buffer capped at [`BUFFER_CAPACITY`] transitions.
#[derive(Default)]
pub struct RolloutBuffer {
    transitions: VecDeque<Transition>,
}

impl RolloutBuffer {
    pub fn new() -> Self {
        Self { transitions: VecDeque::with_capacity(BUFFER_CAPACITY.min(256)) }
    }

    pub fn push(&mut self, transition: Transition) {
        if self.transitions.len() >= BUFFER_CAPACITY {
            self.transitions.pop_front();
        }
        self.transitions.push_back(transition);
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    pub fn clear(&mut self) {
        self.transitions.clear();
    }

    pub fn transitions(&self) -> impl Iterator<Item = &Transition> {
        self.transitions.iter()
    }

    /// Walks the buffer from the tail backward computing GAE advantages
    /// and discounted returns. `bootstrap_value` is `V(s_{T+1})` for the
    /// final transition's successor state (`spec.md` §4.5).
    ///
    /// Returns `(advantages, returns)`, one entry per transition, in
    /// the buffer's original (oldest-first) order.
    pub fn compute_gae(&self, bootstrap_value: f32) -> (Vec<f32>, Vec<f32>) {
        let n = self.transitions.len();
        let mut advantages = vec![0.0f32; n];
        let mut next_value = bootstrap_value;
        let mut next_advantage = 0.0f32;

        for (i, transition) in self.transitions.iter().enumerate().rev() {
            let not_done = if transition.done { 0.0 } else { 1.0 };
            let delta = transition.reward + GAMMA * next_value * not_done - transition.value;
            let advantage = delta + GAMMA * LAMBDA * not_done * next_advantage;
            advantages[i] = advantage;
            next_value = transition.value;
            next_advantage = advantage;
        }

        let returns: Vec<f32> = advantages
            .iter()
            .zip(self.transitions.iter())
            .map(|(&a, t)| a + t.value)
            .collect();

        (advantages, returns)
    }
}

/// Normalises advantages to zero mean, unit variance, as required
/// before each PPO update (`spec.md` §4.5).
pub fn normalize_advantages(advantages: &mut [f32]) {
    if advantages.is_empty() {
        return;
    }
    let n = advantages.len() as f32;
    let mean = advantages.iter().sum::<f32>() / n;
    let var = advantages.iter().map(|&a| (a - mean).powi(2)).sum::<f32>() / n;
    let std = var.sqrt().max(1e-8);
    for a in advantages.iter_mut() {
        *a = (*a - mean) / std;
    }
}
