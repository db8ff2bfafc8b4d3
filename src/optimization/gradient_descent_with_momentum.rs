use super::{
    Optimizer, StepContext,
    optimizer::{check_len, state_slot},
};
use crate::{Result, Tensor, checkpoint::ParamOptimizerState};

const VELOCITY: &str = "velocity";

/// Gradient descent with momentum, `v = mu * v + g; p -= lr * v`.
#[derive(Debug)]
pub struct GradientDescentWithMomentum {
    momentum: f32,
}

impl GradientDescentWithMomentum {
    /// Creates a new `GradientDescentWithMomentum` optimizer.
    ///
    /// # Arguments
    /// * `momentum` - Hyperparameter to the optimization algorithm.
    pub fn new(momentum: f32) -> Self {
        Self { momentum }
    }
}

impl Optimizer for GradientDescentWithMomentum {
    fn name(&self) -> &'static str {
        "gradient_descent_with_momentum"
    }

    fn init_state(&self, shape: &[usize]) -> ParamOptimizerState {
        ParamOptimizerState::from([(VELOCITY.to_string(), Tensor::zeros(shape))])
    }

    fn update_params(
        &self,
        grad: &[f32],
        params: &mut [f32],
        state: &mut ParamOptimizerState,
        ctx: StepContext,
    ) -> Result<()> {
        check_len("gradient", grad.len(), params.len())?;
        let velocity = state_slot(state, VELOCITY, params.len())?;

        let lr = ctx.learning_rate;
        let mu = self.momentum;

        params
            .iter_mut()
            .zip(grad)
            .zip(velocity.iter_mut())
            .for_each(|((p, g), v)| {
                *v = (mu * *v) + g;
                *p -= lr * *v;
            });

        Ok(())
    }
}
