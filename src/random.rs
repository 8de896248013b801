//! A seeded source of randomness for constructing synthetic experiments.
//!
//! The context must be seeded exactly once before use so that experiments are reproducible.
use crate::interval::Interval;
use anyhow::{Context, Result, ensure};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// A pseudo-random generator which must be explicitly seeded
#[derive(Debug, Default)]
pub struct RngContext {
    rng: Option<StdRng>,
}

impl RngContext {
    /// Create an unseeded context
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context seeded with `seed`
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Some(StdRng::seed_from_u64(seed)),
        }
    }

    /// Seed the generator. Fails if it has already been seeded.
    pub fn initialize(&mut self, seed: u64) -> Result<()> {
        ensure!(self.rng.is_none(), "Random generator has already been seeded");
        self.rng = Some(StdRng::seed_from_u64(seed));
        Ok(())
    }

    /// Whether the generator has been seeded
    pub fn is_initialized(&self) -> bool {
        self.rng.is_some()
    }

    fn rng(&mut self) -> Result<&mut StdRng> {
        self.rng
            .as_mut()
            .context("Random generator needs to be seeded before use")
    }

    /// A value drawn uniformly between `a` and `b` (in either order)
    pub fn double(&mut self, a: f64, b: f64) -> Result<f64> {
        let u: f64 = self.rng()?.random();
        Ok(a + (b - a) * u)
    }

    /// `true` with probability `p_true`
    pub fn boolean(&mut self, p_true: f64) -> Result<bool> {
        let u: f64 = self.rng()?.random();
        Ok(u <= p_true)
    }

    /// An integer drawn uniformly from `0..size`
    pub fn int(&mut self, size: usize) -> Result<usize> {
        ensure!(size > 0, "Cannot draw an integer from an empty range");
        Ok(self.rng()?.random_range(0..size))
    }

    /// An interval whose bounds are two values drawn uniformly between `min` and `max`
    pub fn interval(&mut self, min: f64, max: f64) -> Result<Interval<f64>> {
        let first = self.double(min, max)?;
        let second = self.double(min, max)?;
        Ok(Interval {
            min: first.min(second),
            max: first.max(second),
        })
    }

    /// Shuffle a slice in place
    pub fn shuffle<T>(&mut self, items: &mut [T]) -> Result<()> {
        items.shuffle(self.rng()?);
        Ok(())
    }
}
