use std::f32::consts::PI;

use super::{LrScheduler, SchedulerState};
use crate::optimization::OptimizerView;

/// Anneals the learning rate from its initial value down to `min_lr` along half a cosine
/// wave, and keeps it at `min_lr` past `total_steps`.
#[derive(Debug, Clone)]
pub struct CosineScheduler {
    initial_lr: f32,
    min_lr: f32,
    total_steps: usize,
    step: usize,
}

impl CosineScheduler {
    pub fn new(view: OptimizerView<'_>, total_steps: usize, min_lr: f32) -> Self {
        Self {
            initial_lr: view.initial_lr().unwrap_or_default(),
            min_lr,
            total_steps: total_steps.max(1),
            step: view.scheduler_step(),
        }
    }

    fn learning_rate(&self) -> f32 {
        let progress = self.step.min(self.total_steps) as f32 / self.total_steps as f32;
        let cosine = 0.5 * (1. + (PI * progress).cos());
        self.min_lr + (self.initial_lr - self.min_lr) * cosine
    }
}

impl LrScheduler for CosineScheduler {
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
