// locus_sim/src/simulation/core/prng.rs

use rand::rngs::OsRng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// A newtype wrapper around `ChaCha8Rng`.
/// This is the central, deterministic pseudo-random number generator for a run.
#[derive(Debug, Clone)]
pub struct SimulationRng(pub ChaCha8Rng);

impl SimulationRng {
    pub fn new(seed: Option<u64>) -> Result<Self, rand::Error> {
        let rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_rng(&mut OsRng)?,
        };
        Ok(Self(rng))
    }
}
