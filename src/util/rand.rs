use rand::SeedableRng;
use rand_distr::{Distribution, Uniform};
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::quantities::Float;

/// The crate's only source of randomness.
///
/// Callers seed one root generator for reproducibility; `create_child` splits
/// off independent streams for workers evaluating genomes in parallel.
#[derive(Debug)]
pub struct Rng {
    rng: Xoshiro256PlusPlus,
}

impl Rng {
    #[must_use]
    pub fn from_seed(seed: u64) -> Rng {
        Rng {
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
        }
    }

    #[must_use]
    // Xoshiro256PlusPlus::from_rng is infallible when called with Xoshiro256PlusPlus
    #[allow(clippy::missing_panics_doc)]
    pub fn create_child(&mut self) -> Rng {
        Rng {
            rng: Xoshiro256PlusPlus::from_rng(&mut self.rng).unwrap(),
        }
    }

    pub fn sample<R>(&mut self, dist: &impl Distribution<R>) -> R {
        dist.sample(&mut self.rng)
    }

    /// A draw from `U[0, 1)`.
    pub fn unit(&mut self) -> Float {
        self.sample(&Uniform::new(0., 1.))
    }

    /// A fair coin.
    pub fn coin(&mut self) -> bool {
        self.index(2) == 1
    }

    /// A uniform index into a collection of `len` elements.
    pub fn index(&mut self, len: usize) -> usize {
        assert!(len > 0, "cannot draw an index into an empty collection");
        self.sample(&Uniform::new(0, len))
    }
}

#[cfg(test)]
mod tests {
    use super::Rng;

    #[test]
    fn same_seed_same_stream() {
        let mut a = Rng::from_seed(123_497_239_457);
        let mut b = Rng::from_seed(123_497_239_457);
        let xs: Vec<usize> = (0..64).map(|_| a.index(1_000_000)).collect();
        let ys: Vec<usize> = (0..64).map(|_| b.index(1_000_000)).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn child_streams_are_independent() {
        let mut root = Rng::from_seed(7);
        let mut first = root.create_child();
        let mut second = root.create_child();
        let xs: Vec<usize> = (0..64).map(|_| first.index(1_000_000)).collect();
        let ys: Vec<usize> = (0..64).map(|_| second.index(1_000_000)).collect();
        assert_ne!(xs, ys);
    }

    #[test]
    fn draws_respect_their_ranges() {
        let mut rng = Rng::from_seed(42);
        for _ in 0..10_000 {
            let u = rng.unit();
            assert!((0. ..1.).contains(&u));
            assert!(rng.index(7) < 7);
        }
    }
}
