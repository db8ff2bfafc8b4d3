use serde::{Deserialize, Serialize};

use super::{
    ConstantScheduler, CosineScheduler, LinearScheduler, LrScheduler, StepDecayScheduler,
};
use crate::{Result, TrainErr, optimization::OptimizerView};

/// The specification for the `LrScheduler` trait.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerSpec {
    Constant,
    Linear {
        #[serde(default)]
        warmup_steps: usize,
        total_steps: usize,
    },
    StepDecay {
        step_size: usize,
        gamma: f32,
    },
    Cosine {
        total_steps: usize,
        #[serde(default)]
        min_lr: f32,
    },
}

impl SchedulerSpec {
    pub fn validate(&self) -> Result<()> {
        let ok = match *self {
            Self::Constant => true,
            Self::Linear {
                warmup_steps,
                total_steps,
            } => total_steps > 0 && warmup_steps <= total_steps,
            Self::StepDecay { step_size, gamma } => step_size > 0 && gamma > 0.,
            Self::Cosine {
                total_steps,
                min_lr,
            } => total_steps > 0 && min_lr >= 0.,
        };

        if !ok {
            return Err(TrainErr::Configuration(format!(
                "invalid scheduler: {self:?}"
            )));
        }

        Ok(())
    }

    /// Builds the scheduler, meant to be used as the factory passed to
    /// `TrainingSession::register_scheduler`.
    pub fn build(self, view: OptimizerView<'_>) -> Box<dyn LrScheduler> {
        match self {
            Self::Constant => Box::new(ConstantScheduler::new(view)),
            Self::Linear {
                warmup_steps,
                total_steps,
            } => Box::new(LinearScheduler::new(view, warmup_steps, total_steps)),
            Self::StepDecay { step_size, gamma } => {
                Box::new(StepDecayScheduler::new(view, step_size, gamma))
            }
            Self::Cosine {
                total_steps,
                min_lr,
            } => Box::new(CosineScheduler::new(view, total_steps, min_lr)),
        }
    }
}
