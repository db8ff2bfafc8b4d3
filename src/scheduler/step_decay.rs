use super::{LrScheduler, SchedulerState};
use crate::optimization::OptimizerView;

/// Multiplies the learning rate by `gamma` every `step_size` steps.
#[derive(Debug, Clone)]
pub struct StepDecayScheduler {
    initial_lr: f32,
    step_size: usize,
    gamma: f32,
    step: usize,
}

impl StepDecayScheduler {
    pub fn new(view: OptimizerView<'_>, step_size: usize, gamma: f32) -> Self {
        Self {
            initial_lr: view.initial_lr().unwrap_or_default(),
            step_size: step_size.max(1),
            gamma,
            step: view.scheduler_step(),
        }
    }

    fn learning_rate(&self) -> f32 {
        let decays = (self.step / self.step_size) as i32;
        self.initial_lr * self.gamma.powi(decays)
    }
}

impl LrScheduler for StepDecayScheduler {
    fn advance(&mut self) -> f32 {
        self.step += 1;
        self.learning_rate()
    }

    fn state(&self) -> SchedulerState {
        SchedulerState {
            step: self.step,
            learning_rate: self.learning_rate(),
        }
    }
}
