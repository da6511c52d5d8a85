//! Deterministic topic-tag embeddings (`spec.md` §4.8).
//!
//! Topic tags live in the same 16-dim space as
//! `UserTopicPreference::preference_vector`, but where those tag
//! embeddings come from upstream is left unsaid (they'd normally be
//! learned alongside the content catalogue, out of scope here,
//! `spec.md` §1). Hashing each tag into a deterministic unit vector
//! keeps cosine similarity well-defined and stable across requests.

use lingua_core::PREFERENCE_DIM;

/// Splitmix64-derived hash, same construction as the PPO crate's `Rng`
/// seed step, used here only to fan a tag string out into 16 floats.
fn hash_to_u64(seed: u64) -> u64 {
    let mut z = seed.wrapping_add(0x9e3779b97f4a7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
    z ^ (z >> 31)
}

fn fnv1a(s: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in s.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// A deterministic unit vector in `R^16` for `tag`, stable across
/// process restarts and independent of insertion order.
pub fn topic_embedding(tag: &str) -> [f32; PREFERENCE_DIM] {
    let mut seed = fnv1a(tag);
    let mut v = [0.0f32; PREFERENCE_DIM];
    for slot in v.iter_mut() {
        seed = hash_to_u64(seed);
        *slot = (seed >> 40) as f32 / (1u64 << 24) as f32 * 2.0 - 1.0;
    }
    let norm = v.iter().map(|&x| x * x).sum::<f32>().sqrt();
    if norm > 1e-8 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
    v
}

/// Cosine similarity between two vectors in the same embedding space.
pub fn cosine_similarity(a: &[f32; PREFERENCE_DIM], b: &[f32; PREFERENCE_DIM]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(&x, &y)| x * y).sum();
    let norm_a = a.iter().map(|&x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|&x| x * x).sum::<f32>().sqrt();
    if norm_a <= 1e-8 || norm_b <= 1e-8 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_embedding_is_deterministic() {
        assert_eq!(topic_embedding("travel"), topic_embedding("travel"));
    }

    #[test]
    fn topic_embedding_is_unit_length() {
        let v = topic_embedding("food");
        let norm = v.iter().map(|&x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn distinct_tags_get_distinct_embeddings() {
        assert_ne!(topic_embedding("travel"), topic_embedding("food"));
    }

    #[test]
    fn cosine_similarity_of_identical_vectors_is_one() {
        let v = topic_embedding("travel");
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn cosine_similarity_with_zero_vector_is_zero() {
        let v = topic_embedding("travel");
        let zero = [0.0; 16];
        assert_eq!(cosine_similarity(&v, &zero), 0.0);
    }
}
