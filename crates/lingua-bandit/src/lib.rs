//! # lingua-bandit
//!
//! Cold-start rules (`spec.md` §4.3) and the LinUCB contextual bandit
//! (`spec.md` §4.4) that RouterCore escalates through before a user
//! has enough history for the PPO policy in `lingua-ppo`.
//!
//! ## Architecture Rules
//!
//! - Depends only on `lingua-core`.
//! - No `async` code — pure synchronous numeric logic.

pub mod cold_start;
pub mod linucb;

pub use cold_start::{recommend as recommend_cold_start, ColdStartDecision, ColdStartInputs};
pub use linucb::{LinUcbModel, ALPHA};
