//! Trial samplers

use crate::tuning::search_space::{SearchSpace, TrialParams};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Strategy for proposing the next trial
pub trait Sampler: Send {
    /// Propose parameters, optionally informed by finished trials
    /// given as (params, score) pairs where lower scores are better.
    fn sample(&mut self, space: &SearchSpace, history: &[(TrialParams, f64)]) -> TrialParams;

    fn name(&self) -> &str;
}

/// Uniform random sampling, history ignored
pub struct RandomSampler {
    rng: ChaCha8Rng,
}

impl RandomSampler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl Sampler for RandomSampler {
    fn sample(&mut self, space: &SearchSpace, _history: &[(TrialParams, f64)]) -> TrialParams {
        space.sample(&mut self.rng)
    }

    fn name(&self) -> &str {
        "random"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_sampler_reproducible() {
        let space = SearchSpace::new()
            .add_discrete("n", &[10.0, 20.0, 30.0])
            .add_float("lr", 0.0, 1.0);

        let mut a = RandomSampler::new(42);
        let mut b = RandomSampler::new(42);
        for _ in 0..5 {
            assert_eq!(a.sample(&space, &[]), b.sample(&space, &[]));
        }
    }

    #[test]
    fn test_different_seeds_diverge() {
        let space = SearchSpace::new().add_float("lr", 0.0, 1.0);
        let mut a = RandomSampler::new(1);
        let mut b = RandomSampler::new(2);

        let draws_a: Vec<TrialParams> = (0..5).map(|_| a.sample(&space, &[])).collect();
        let draws_b: Vec<TrialParams> = (0..5).map(|_| b.sample(&space, &[])).collect();
        assert_ne!(draws_a, draws_b);
    }
}
