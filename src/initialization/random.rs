use std::{cell::RefCell, rc::Rc};

use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};

use super::ParamGen;
use crate::{Result, TrainErr};

/// Draws values from a distribution, up to a budget.
///
/// The random number generator is shared, so every parameter of a checkpoint initialized
/// from the same seed comes out the same regardless of how the generators are split.
pub struct RandParamGen<R: Rng, D: Distribution<f32>> {
    rng: Rc<RefCell<R>>,
    distribution: D,
    budget: usize,
}

impl<R: Rng, D: Distribution<f32>> RandParamGen<R, D> {
    pub fn new(rng: Rc<RefCell<R>>, distribution: D, budget: usize) -> Self {
        Self {
            rng,
            distribution,
            budget,
        }
    }
}

fn invalid(init: &str, e: impl std::fmt::Display) -> TrainErr {
    TrainErr::Configuration(format!("{init} initializer: {e}"))
}

impl<R: Rng> RandParamGen<R, Uniform<f32>> {
    /// A uniform distribution over `[low, high)`.
    ///
    /// # Returns
    /// A configuration error unless `low < high`.
    pub fn uniform(rng: Rc<RefCell<R>>, budget: usize, low: f32, high: f32) -> Result<Self> {
        let distribution = Uniform::new(low, high).map_err(|e| invalid("uniform", e))?;
        Ok(Self::new(rng, distribution, budget))
    }

    /// Glorot uniform, bounded by `sqrt(6 / (fan_in + fan_out))`.
    pub fn xavier_uniform(
        rng: Rc<RefCell<R>>,
        budget: usize,
        fan_in: usize,
        fan_out: usize,
    ) -> Result<Self> {
        let bound = (6. / (fan_in + fan_out).max(1) as f32).sqrt();
        Self::uniform(rng, budget, -bound, bound)
    }
}

impl<R: Rng> RandParamGen<R, Normal<f32>> {
    /// # Returns
    /// A configuration error if `std_dev` is negative or not finite.
    pub fn normal(rng: Rc<RefCell<R>>, budget: usize, mean: f32, std_dev: f32) -> Result<Self> {
        let distribution = Normal::new(mean, std_dev).map_err(|e| invalid("normal", e))?;
        Ok(Self::new(rng, distribution, budget))
    }

    /// He normal, centered with a standard deviation of `sqrt(2 / fan_in)`.
    pub fn kaiming(rng: Rc<RefCell<R>>, budget: usize, fan_in: usize) -> Result<Self> {
        let std_dev = (2. / fan_in.max(1) as f32).sqrt();
        Self::normal(rng, budget, 0., std_dev)
    }
}

impl<R: Rng, D: Distribution<f32>> ParamGen for RandParamGen<R, D> {
    fn sample(&mut self, n: usize) -> Option<Vec<f32>> {
        if self.budget == 0 {
            return None;
        }

        let take = n.min(self.budget);
        self.budget -= take;

        let mut rng = self.rng.borrow_mut();
        Some((0..take).map(|_| self.distribution.sample(&mut *rng)).collect())
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn rng(seed: u64) -> Rc<RefCell<StdRng>> {
        Rc::new(RefCell::new(StdRng::seed_from_u64(seed)))
    }

    #[test]
    fn xavier_respects_its_bound() {
        let t = RandParamGen::xavier_uniform(rng(42), 100, 3, 3)
            .unwrap()
            .tensor(&[10, 10])
            .unwrap();

        assert!(t.data().iter().all(|x| (-1. ..1.).contains(x)));
    }

    #[test]
    fn shared_rng_is_reproducible() {
        let draw = |seed| {
            let shared = rng(seed);
            let mut a = RandParamGen::normal(Rc::clone(&shared), 4, 0., 1.).unwrap();
            let mut b = RandParamGen::kaiming(shared, 4, 8).unwrap();
            (a.sample(4), b.sample(4))
        };

        assert_eq!(draw(7), draw(7));
        assert_ne!(draw(7), draw(8));
    }

    #[test]
    fn bad_distributions_are_configuration_errors() {
        assert!(matches!(
            RandParamGen::uniform(rng(0), 1, 1., -1.),
            Err(TrainErr::Configuration(_))
        ));
        assert!(matches!(
            RandParamGen::normal(rng(0), 1, 0., f32::NAN),
            Err(TrainErr::Configuration(_))
        ));
    }
}
