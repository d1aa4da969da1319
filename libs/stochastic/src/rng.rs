//! Deterministic randomness source
//!
//! Wraps a seeded ChaCha8 generator behind the small surface the models
//! need. Everything stochastic in the workspace draws from one of these, so
//! identical seeds and identical call sequences produce bit-identical
//! results.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Seeded uniform generator underlying all stochastic computation.
#[derive(Debug, Clone)]
pub struct RandomnessSource {
    seed: u64,
    rng: ChaCha8Rng,
}

impl RandomnessSource {
    /// Create a source with a deterministic seed.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Reinitialize the sequence from a new seed.
    pub fn reset(&mut self, seed: u64) {
        self.seed = seed;
        self.rng = ChaCha8Rng::seed_from_u64(seed);
    }

    /// The seed this source was last initialized with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Derive an independent source for a sub-stream (e.g. one per symbol).
    ///
    /// Mixing is a fixed multiply-xor so derived seeds are stable across
    /// runs and distinct across indices.
    pub fn derive(&self, index: u64) -> Self {
        let mixed = self
            .seed
            .wrapping_mul(0x9E37_79B9_7F4A_7C15)
            .wrapping_add(index.wrapping_mul(0xBF58_476D_1CE4_E5B9));
        Self::new(mixed)
    }

    /// Next uniform value in [0, 1).
    pub fn next_f64(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    /// Next uniform value in [lo, hi).
    pub fn next_range(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }

    /// Bernoulli draw with probability `p`, consuming one uniform value.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Uniform index in [0, len). `len` must be non-zero.
    pub fn next_index(&mut self, len: usize) -> usize {
        debug_assert!(len > 0);
        let idx = (self.next_f64() * len as f64) as usize;
        idx.min(len - 1)
    }

    /// A pair of independent standard-normal samples via Box–Muller,
    /// consuming exactly two uniform draws.
    pub fn next_normal_pair(&mut self) -> (f64, f64) {
        // Guard against ln(0); the uniform draw is in [0, 1).
        let u1 = self.next_f64().max(f64::MIN_POSITIVE);
        let u2 = self.next_f64();
        let radius = (-2.0 * u1.ln()).sqrt();
        let theta = 2.0 * std::f64::consts::PI * u2;
        (radius * theta.cos(), radius * theta.sin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = RandomnessSource::new(42);
        let mut b = RandomnessSource::new(42);

        for _ in 0..1_000 {
            assert_eq!(a.next_f64().to_bits(), b.next_f64().to_bits());
        }
    }

    #[test]
    fn test_different_seeds_diverge() {
        let mut a = RandomnessSource::new(1);
        let mut b = RandomnessSource::new(2);

        let seq_a: Vec<u64> = (0..10).map(|_| a.next_f64().to_bits()).collect();
        let seq_b: Vec<u64> = (0..10).map(|_| b.next_f64().to_bits()).collect();
        assert_ne!(seq_a, seq_b);
    }

    #[test]
    fn test_reset_replays_sequence() {
        let mut rng = RandomnessSource::new(7);
        let first: Vec<u64> = (0..100).map(|_| rng.next_f64().to_bits()).collect();

        rng.reset(7);
        let second: Vec<u64> = (0..100).map(|_| rng.next_f64().to_bits()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_uniform_range() {
        let mut rng = RandomnessSource::new(3);
        for _ in 0..10_000 {
            let value = rng.next_f64();
            assert!((0.0..1.0).contains(&value));
        }
    }

    #[test]
    fn test_next_range_bounds() {
        let mut rng = RandomnessSource::new(11);
        for _ in 0..10_000 {
            let value = rng.next_range(0.5, 1.0);
            assert!((0.5..1.0).contains(&value));
        }
    }

    #[test]
    fn test_next_index_bounds() {
        let mut rng = RandomnessSource::new(13);
        let mut seen = [false; 4];
        for _ in 0..1_000 {
            seen[rng.next_index(4)] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_normal_pair_consumes_two_draws() {
        let mut with_pair = RandomnessSource::new(5);
        let mut plain = RandomnessSource::new(5);

        let _ = with_pair.next_normal_pair();
        let _ = plain.next_f64();
        let _ = plain.next_f64();

        // Both streams are now at the same position.
        assert_eq!(with_pair.next_f64().to_bits(), plain.next_f64().to_bits());
    }

    #[test]
    fn test_normal_pair_moments() {
        let mut rng = RandomnessSource::new(17);
        let n = 20_000;
        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        for _ in 0..n {
            let (z1, z2) = rng.next_normal_pair();
            sum += z1 + z2;
            sum_sq += z1 * z1 + z2 * z2;
        }
        let count = (2 * n) as f64;
        let mean = sum / count;
        let variance = sum_sq / count - mean * mean;

        assert!(mean.abs() < 0.05, "mean {mean} too far from 0");
        assert!((variance - 1.0).abs() < 0.05, "variance {variance} too far from 1");
    }

    #[test]
    fn test_derive_is_stable_and_distinct() {
        let base = RandomnessSource::new(42);
        let a1 = base.derive(0).seed();
        let a2 = base.derive(0).seed();
        let b = base.derive(1).seed();

        assert_eq!(a1, a2);
        assert_ne!(a1, b);
    }
}
