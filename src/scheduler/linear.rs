use super::{LrScheduler, SchedulerState};
use crate::optimization::OptimizerView;

/// Ramps the learning rate linearly from zero to its initial value over `warmup_steps`,
/// then decays it linearly back to zero at `total_steps`.
#[derive(Debug, Clone)]
pub struct LinearScheduler {
    initial_lr: f32,
    warmup_steps: usize,
    total_steps: usize,
    step: usize,
}

impl LinearScheduler {
    /// Creates a new `LinearScheduler`.
    ///
    /// # Arguments
    /// * `view` - The optimizer the scheduler drives, for the initial learning rate and
    ///   the step to resume from.
    /// * `warmup_steps` - The amount of steps to reach the initial learning rate.
    /// * `total_steps` - The step at which the learning rate reaches zero.
    pub fn new(view: OptimizerView<'_>, warmup_steps: usize, total_steps: usize) -> Self {
        Self {
            initial_lr: view.initial_lr().unwrap_or_default(),
            warmup_steps,
            total_steps,
            step: view.scheduler_step(),
        }
    }

    fn multiplier(&self) -> f32 {
        let step = self.step as f32;

        if self.step < self.warmup_steps {
            return step / self.warmup_steps.max(1) as f32;
        }

        let remaining = self.total_steps.saturating_sub(self.step) as f32;
        let span = self.total_steps.saturating_sub(self.warmup_steps).max(1) as f32;
        (remaining / span).max(0.)
    }
}

impl LrScheduler for LinearScheduler {
    fn advance(&mut self) -> f32 {
        self.step += 1;
        self.initial_lr * self.multiplier()
    }

    fn state(&self) -> SchedulerState {
        SchedulerState {
            step: self.step,
            learning_rate: self.initial_lr * self.multiplier(),
        }
    }
}
