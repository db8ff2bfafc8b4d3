use super::{
    Optimizer, StepContext,
    optimizer::check_len,
};
use crate::{Result, Tensor, TrainErr, checkpoint::ParamOptimizerState};

const MOMENTUM0: &str = "momentum0";
const MOMENTUM1: &str = "momentum1";

/// Adam with decoupled weight decay.
///
/// The first and second moment estimates are stored as `momentum0` and `momentum1`.
/// Bias correction is derived from the update count, so a resumed checkpoint picks up
/// exactly where it left off.
#[derive(Debug)]
pub struct Adam {
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    weight_decay: f32,
}

impl Adam {
    /// Creates a new `Adam` optimizer.
    ///
    /// # Arguments
    /// * `beta1`, `beta2`, `epsilon` - Hyperparameters to the optimization algorithm.
    /// * `weight_decay` - The decoupled weight decay coefficient, `0` disables it.
    ///
    /// # Returns
    /// A new `Adam` instance.
    pub fn new(beta1: f32, beta2: f32, epsilon: f32, weight_decay: f32) -> Self {
        Self {
            beta1,
            beta2,
            epsilon,
            weight_decay,
        }
    }
}

impl Optimizer for Adam {
    fn name(&self) -> &'static str {
        "adam"
    }

    fn init_state(&self, shape: &[usize]) -> ParamOptimizerState {
        ParamOptimizerState::from([
            (MOMENTUM0.to_string(), Tensor::zeros(shape)),
            (MOMENTUM1.to_string(), Tensor::zeros(shape)),
        ])
    }

    fn update_params(
        &self,
        grad: &[f32],
        params: &mut [f32],
        state: &mut ParamOptimizerState,
        ctx: StepContext,
    ) -> Result<()> {
        check_len("gradient", grad.len(), params.len())?;

        let (mut m, mut v) = (None, None);
        for (key, tensor) in state.iter_mut() {
            match key.as_str() {
                MOMENTUM0 => m = Some(tensor),
                MOMENTUM1 => v = Some(tensor),
                _ => {}
            }
        }

        let (Some(m), Some(v)) = (m, v) else {
            return Err(TrainErr::GraphExecution(format!(
                "optimizer state must hold {MOMENTUM0} and {MOMENTUM1}"
            )));
        };

        check_len(MOMENTUM0, m.len(), params.len())?;
        check_len(MOMENTUM1, v.len(), params.len())?;

        let Self {
            beta1: b1,
            beta2: b2,
            epsilon: eps,
            weight_decay: wd,
        } = *self;
        let lr = ctx.learning_rate;

        let t = (ctx.step + 1) as i32;
        let bc1 = 1. - b1.powi(t);
        let bc2 = 1. - b2.powi(t);
        let step_size = lr * (bc2.sqrt() / bc1);

        params
            .iter_mut()
            .zip(grad)
            .zip(m.data_mut().iter_mut())
            .zip(v.data_mut().iter_mut())
            .for_each(|(((p, g), m), v)| {
                *m = b1 * *m + (1. - b1) * g;
                *v = b2 * *v + (1. - b2) * g.powi(2);
                *p -= step_size * *m / (v.sqrt() + eps) + lr * wd * *p;
            });

        Ok(())
    }
}
