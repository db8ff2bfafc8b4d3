use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::Tensor;

/// The auxiliary tensors an optimizer keeps for a single parameter, e.g. `momentum0`.
pub type ParamOptimizerState = BTreeMap<String, Tensor>;

/// The optimizer side of a checkpoint: update and scheduler progress, learning rates
/// and the per parameter optimizer state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptimizerCheckpoint {
    pub(crate) step: usize,
    pub(crate) initial_lr: Option<f32>,
    pub(crate) learning_rate: Option<f32>,
    pub(crate) scheduler_step: usize,
    pub(crate) states: BTreeMap<String, ParamOptimizerState>,
}

impl OptimizerCheckpoint {
    /// The amount of optimizer updates applied so far.
    pub fn step(&self) -> usize {
        self.step
    }

    /// The learning rate the scheduler was registered with, if any.
    pub fn initial_lr(&self) -> Option<f32> {
        self.initial_lr
    }

    /// The current learning rate, if it was ever set.
    pub fn learning_rate(&self) -> Option<f32> {
        self.learning_rate
    }

    /// The amount of scheduler steps taken so far.
    pub fn scheduler_step(&self) -> usize {
        self.scheduler_step
    }

    /// The optimizer state of a single parameter.
    pub fn state(&self, name: &str) -> Option<&ParamOptimizerState> {
        self.states.get(name)
    }

    /// Iterates the names of the parameters with optimizer state.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.states.keys().map(String::as_str)
    }
}
