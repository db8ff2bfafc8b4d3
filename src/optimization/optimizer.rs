use std::fmt;

use crate::{Result, TrainErr, checkpoint::ParamOptimizerState};

/// What an update rule needs to know about the update being applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepContext {
    pub learning_rate: f32,
    /// The amount of updates applied before this one.
    pub step: usize,
}

/// Defines the strategy for updating a parameter based on its accumulated gradient.
///
/// Implementations are stateless, every auxiliary tensor lives in the
/// `ParamOptimizerState` handed to them so it can be checkpointed.
pub trait Optimizer: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// The fresh optimizer state for a parameter of the given shape.
    fn init_state(&self, shape: &[usize]) -> ParamOptimizerState;

    /// Updates the provided slice of parameters using the accumulated gradient.
    ///
    /// # Arguments
    /// * `grad` - The accumulated gradient of the parameter.
    /// * `params` - The parameter values to update.
    /// * `state` - The parameter's optimizer state.
    /// * `ctx` - The learning rate and step of this update.
    ///
    /// # Returns
    /// A graph execution error if `grad`, `params` and `state` don't agree in size.
    fn update_params(
        &self,
        grad: &[f32],
        params: &mut [f32],
        state: &mut ParamOptimizerState,
        ctx: StepContext,
    ) -> Result<()>;
}

pub(super) fn check_len(what: &str, got: usize, expected: usize) -> Result<()> {
    if got != expected {
        return Err(TrainErr::GraphExecution(format!(
            "{what} has {got} element(s), expected {expected}"
        )));
    }

    Ok(())
}

/// Looks up an auxiliary tensor of `state` by `key`.
pub(super) fn state_slot<'a>(
    state: &'a mut ParamOptimizerState,
    key: &str,
    len: usize,
) -> Result<&'a mut [f32]> {
    let slot = state
        .get_mut(key)
        .ok_or_else(|| TrainErr::GraphExecution(format!("optimizer state has no {key}")))?;

    check_len(key, slot.len(), len)?;
    Ok(slot.data_mut())
}
