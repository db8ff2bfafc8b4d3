use super::{
    Optimizer, StepContext,
    optimizer::check_len,
};
use crate::{Result, checkpoint::ParamOptimizerState};

/// Plain gradient descent, `p -= lr * g`. Keeps no state.
#[derive(Debug, Default)]
pub struct GradientDescent;

impl GradientDescent {
    /// Creates a new `GradientDescent` optimizer.
    pub fn new() -> Self {
        Self
    }
}

impl Optimizer for GradientDescent {
    fn name(&self) -> &'static str {
        "gradient_descent"
    }

    fn init_state(&self, _shape: &[usize]) -> ParamOptimizerState {
        ParamOptimizerState::new()
    }

    fn update_params(
        &self,
        grad: &[f32],
        params: &mut [f32],
        _state: &mut ParamOptimizerState,
        ctx: StepContext,
    ) -> Result<()> {
        check_len("gradient", grad.len(), params.len())?;

        let lr = ctx.learning_rate;

        for (p, g) in params.iter_mut().zip(grad) {
            *p -= lr * g;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descends_along_the_gradient() {
        let mut params = [1., 2.];
        let ctx = StepContext {
            learning_rate: 0.5,
            step: 0,
        };

        GradientDescent
            .update_params(&[2., -4.], &mut params, &mut ParamOptimizerState::new(), ctx)
            .unwrap();

        assert_eq!(params, [0., 4.]);
    }

    #[test]
    fn rejects_mismatched_sizes() {
        let ctx = StepContext {
            learning_rate: 0.5,
            step: 0,
        };

        let res = GradientDescent.update_params(
            &[1.],
            &mut [1., 2.],
            &mut ParamOptimizerState::new(),
            ctx,
        );
        assert!(res.is_err());
    }
}
