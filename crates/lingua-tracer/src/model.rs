//! Per-word recall estimation (`spec.md` §4.7).
//!
//! The contract only binds the shape of `knowledge_state`; "sequence
//! assembly, neural forward pass... are implementation-defined"
//! (`spec.md` §4.7). In place of a transformer, this estimates recall
//! from a classic exponential forgetting curve, with `ease_factor`
//! standing in for stability the way SM-2-derived schedulers use it.

/// Maps `ease_factor ∈ [1.3, 3.0]` onto a stability estimate in days.
/// Higher ease implies a flatter forgetting curve.
fn stability_days(ease_factor: f32) -> f32 {
    let clamped = ease_factor.clamp(1.3, 3.0);
    // 1.3 ease -> ~3 day half-life; 3.0 ease -> ~30 day half-life.
    3.0 + (clamped - 1.3) / (3.0 - 1.3) * 27.0
}

/// Probability of recall `t` days after the last review, under an
/// exponential forgetting curve `R(t) = 2^(-t / S)`.
pub fn p_recall_at(ease_factor: f32, days_since_review: f32) -> f32 {
    let s = stability_days(ease_factor);
    let t = days_since_review.max(0.0);
    2f32.powf(-t / s).clamp(0.0, 1.0)
}

/// `p_forget` over a horizon, given the current recall estimate (taken
/// at `days_overdue` days since last review): `1 - R(days_overdue +
/// horizon_days)` relative to today's recall.
pub fn p_forget_over_horizon(ease_factor: f32, days_overdue: f32, horizon_days: f32) -> f32 {
    let recall_now = p_recall_at(ease_factor, days_overdue);
    let recall_at_horizon = p_recall_at(ease_factor, days_overdue + horizon_days);
    (recall_now - recall_at_horizon).clamp(0.0, 1.0)
}
