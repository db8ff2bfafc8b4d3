use super::ParamGen;

/// Hands out the same value, up to a budget.
#[derive(Debug, Clone)]
pub struct ConstParamGen {
    value: f32,
    budget: usize,
}

impl ConstParamGen {
    /// Creates a new `ConstParamGen` that yields `value` at most `budget` times.
    pub fn new(value: f32, budget: usize) -> Self {
        Self { value, budget }
    }
}

impl ParamGen for ConstParamGen {
    fn sample(&mut self, n: usize) -> Option<Vec<f32>> {
        if self.budget == 0 {
            return None;
        }

        let take = n.min(self.budget);
        self.budget -= take;
        Some(vec![self.value; take])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_a_tensor() {
        let t = ConstParamGen::new(0.25, 6).tensor(&[2, 3]).unwrap();

        assert_eq!(t.shape(), &[2, 3]);
        assert_eq!(t.data(), &[0.25; 6]);
    }

    #[test]
    fn runs_dry() {
        let mut param_gen = ConstParamGen::new(1., 3);

        assert_eq!(param_gen.sample(2).unwrap().len(), 2);
        assert!(param_gen.tensor(&[2]).is_err());
        assert!(param_gen.sample(1).is_none());
    }
}
