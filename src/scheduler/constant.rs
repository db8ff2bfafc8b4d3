use super::{LrScheduler, SchedulerState};
use crate::optimization::OptimizerView;

/// Keeps the initial learning rate forever.
#[derive(Debug, Clone)]
pub struct ConstantScheduler {
    learning_rate: f32,
    step: usize,
}

impl ConstantScheduler {
    pub fn new(view: OptimizerView<'_>) -> Self {
        Self {
            learning_rate: view.initial_lr().unwrap_or_default(),
            step: view.scheduler_step(),
        }
    }
}

impl LrScheduler for ConstantScheduler {
    fn advance(&mut self) -> f32 {
        self.step += 1;
        self.learning_rate
    }

    fn state(&self) -> SchedulerState {
        SchedulerState {
            step: self.step,
            learning_rate: self.learning_rate,
        }
    }
}
