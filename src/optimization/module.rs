use log::{debug, info, warn};
use rayon::prelude::*;

use super::{Optimizer, OptimizerSpec, StepContext};
use crate::{
    ParameterStore, Result, TrainErr,
    checkpoint::{OptimizerCheckpoint, ParamOptimizerState},
    module::GradientBuffer,
};

/// An update rule bound to the trainable parameters of a checkpoint.
#[derive(Debug)]
pub struct OptimizerModule {
    rule: Box<dyn Optimizer>,
}

impl OptimizerModule {
    /// Creates a new `OptimizerModule` and reconciles the checkpoint's optimizer state
    /// with the parameters.
    ///
    /// Every trainable parameter ends up with exactly one state entry: entries that are
    /// missing or don't fit the rule or the parameter's shape are initialized fresh, and
    /// entries of unknown or frozen parameters are dropped.
    ///
    /// # Arguments
    /// * `spec` - The update rule to use.
    /// * `params` - The parameters to bind to.
    /// * `ckpt` - The optimizer half of the checkpoint.
    ///
    /// # Returns
    /// A configuration error if `spec` is invalid.
    pub fn new(
        spec: &OptimizerSpec,
        params: &ParameterStore,
        ckpt: &mut OptimizerCheckpoint,
    ) -> Result<Self> {
        let rule = spec.build()?;

        let before = ckpt.states.len();
        ckpt.states
            .retain(|name, _| params.get(name).is_some_and(|p| p.requires_grad()));

        let dropped = before - ckpt.states.len();
        if dropped > 0 {
            warn!("dropped optimizer state of {dropped} parameter(s) that are not trainable");
        }

        let mut fresh = 0;
        for (name, param) in params.trainable() {
            let init = rule.init_state(param.shape());

            match ckpt.states.get(name) {
                Some(state) if fits(state, &init) => continue,
                Some(_) => warn!("optimizer state of {name} doesn't fit {}, reinitializing", rule.name()),
                None => debug!("initializing optimizer state of {name}"),
            }

            ckpt.states.insert(name.to_string(), init);
            fresh += 1;
        }

        info!(
            "bound {} optimizer to {} parameter(s), {fresh} with fresh state, resuming at step {}",
            rule.name(),
            ckpt.states.len(),
            ckpt.step
        );

        Ok(Self { rule })
    }

    pub fn name(&self) -> &'static str {
        self.rule.name()
    }

    /// Applies one update to every trainable parameter using the accumulated gradients.
    ///
    /// Sizes are validated before any parameter is written. The parameters are then
    /// updated in parallel, and the step count is increased once every update succeeded.
    ///
    /// # Returns
    /// A precondition error if no learning rate was set, or a graph execution error if
    /// the gradients or the optimizer state don't match the parameters.
    pub fn step(
        &self,
        params: &mut ParameterStore,
        grads: &GradientBuffer,
        ckpt: &mut OptimizerCheckpoint,
    ) -> Result<()> {
        let learning_rate = ckpt
            .learning_rate
            .ok_or(TrainErr::Precondition("learning rate was never set"))?;

        let trainable: Vec<_> = params.trainable().map(|(name, _)| name).collect();
        let names_match = trainable.len() == ckpt.states.len()
            && trainable.iter().zip(ckpt.states.keys()).all(|(a, b)| *a == b.as_str());

        if !names_match {
            return Err(TrainErr::GraphExecution(
                "optimizer state is out of sync with the trainable parameters".into(),
            ));
        }

        for (name, param) in params.trainable() {
            let grad = grads.get(name).ok_or_else(|| {
                TrainErr::GraphExecution(format!("no accumulated gradient for {name}"))
            })?;

            param.data().check_same_shape(grad).map_err(|_| {
                TrainErr::GraphExecution(format!("gradient of {name} has the wrong shape"))
            })?;
        }

        let ctx = StepContext {
            learning_rate,
            step: ckpt.step,
        };

        let work: Vec<(&[f32], &mut [f32], &mut ParamOptimizerState)> = params
            .iter_mut()
            .filter(|(_, param)| param.requires_grad())
            .zip(ckpt.states.values_mut())
            .filter_map(|((name, param), state)| {
                let grad = grads.get(name)?;
                Some((grad.data(), param.data_mut().data_mut(), state))
            })
            .collect();

        work.into_par_iter()
            .try_for_each(|(grad, params, state)| self.rule.update_params(grad, params, state, ctx))?;

        ckpt.step += 1;
        debug!("applied optimizer step {} with lr {learning_rate}", ckpt.step);
        Ok(())
    }
}

fn fits(state: &ParamOptimizerState, init: &ParamOptimizerState) -> bool {
    state.len() == init.len()
        && init
            .iter()
            .all(|(key, t)| state.get(key).is_some_and(|s| s.check_same_shape(t).is_ok()))
}

/// A read-only view over an optimizer and its checkpointed progress, handed to scheduler
/// factories.
#[derive(Debug, Clone, Copy)]
pub struct OptimizerView<'a> {
    module: &'a OptimizerModule,
    ckpt: &'a OptimizerCheckpoint,
}

impl<'a> OptimizerView<'a> {
    pub(crate) fn new(module: &'a OptimizerModule, ckpt: &'a OptimizerCheckpoint) -> Self {
        Self { module, ckpt }
    }

    /// The name of the update rule.
    pub fn name(&self) -> &'static str {
        self.module.name()
    }

    pub fn initial_lr(&self) -> Option<f32> {
        self.ckpt.initial_lr()
    }

    pub fn learning_rate(&self) -> Option<f32> {
        self.ckpt.learning_rate()
    }

    /// The amount of optimizer updates applied so far.
    pub fn step(&self) -> usize {
        self.ckpt.step()
    }

    /// The amount of scheduler steps taken so far, a resumed scheduler starts from here.
    pub fn scheduler_step(&self) -> usize {
        self.ckpt.scheduler_step()
    }

    pub fn param_names(&self) -> impl Iterator<Item = &'a str> + use<'a> {
        self.ckpt.param_names()
    }
}
