use std::{collections::HashSet, sync::Arc};

#[cfg(feature = "export")]
use std::path::Path;

use log::{debug, info, warn};

use super::ModelIdentifiers;
use crate::{
    CheckpointState, Environment, ParameterStore, Result, RunOptions, SessionConfig, Tensor,
    TrainErr,
    engine::{self, ExecutionProvider, GraphSpec},
    module::{ComputeModule, GradientBuffer, Mode, ParameterLayout},
    optimization::{OptimizerModule, OptimizerSpec, OptimizerView},
    scheduler::LrScheduler,
};

/// Drives training steps over a caller-owned `CheckpointState`.
///
/// The session borrows the checkpoint mutably for its whole lifetime: parameters, optimizer
/// state, learning rate and scheduler progress are read and written in place, so saving
/// the checkpoint after dropping the session captures everything needed to resume.
///
/// Mutating operations take `&mut self`, evaluation and the accessors take `&self`.
///
/// # Failure semantics
/// Every operation validates its inputs before writing anything, so a returned error
/// leaves the session and the checkpoint as they were. The one exception is a panic
/// inside an update rule during `optimizer_step`: parameters may then be partially
/// updated, and the session must be discarded and rebuilt from the last saved checkpoint.
pub struct TrainingSession<'ckpt> {
    config: SessionConfig,
    state: &'ckpt mut CheckpointState,
    module: ComputeModule,
    layout: ParameterLayout,
    optimizer: Option<OptimizerModule>,
    scheduler: Option<Box<dyn LrScheduler>>,
    lr_overridden: bool,
}

impl<'ckpt> TrainingSession<'ckpt> {
    /// Creates a new `TrainingSession`.
    ///
    /// # Arguments
    /// * `env` - Resolves the model identifiers.
    /// * `config` - Session wide settings.
    /// * `providers` - The candidate execution providers in order of preference, the cpu
    ///   provider is used if empty.
    /// * `state` - The checkpoint to train, borrowed for the session's lifetime.
    /// * `ids` - The train model plus the optional eval and optimizer models.
    ///
    /// # Returns
    /// A configuration error if a model can't be resolved, is malformed or doesn't fit the
    /// checkpoint's parameters, or a provider error if no provider can host a graph. The
    /// checkpoint is untouched on failure.
    pub fn new(
        env: &Environment,
        config: SessionConfig,
        providers: &[Arc<dyn ExecutionProvider>],
        state: &'ckpt mut CheckpointState,
        ids: &ModelIdentifiers,
    ) -> Result<Self> {
        let log_id = config.log_id.as_str();

        if ids.train_model.is_empty() {
            return Err(TrainErr::Configuration(
                "a train model identifier is required".into(),
            ));
        }

        let train_spec = GraphSpec::from_json(&env.resolve(&ids.train_model)?)?;
        if !train_spec.is_trainable() {
            return Err(TrainErr::Configuration(format!(
                "train model {} has no loss head",
                ids.train_model
            )));
        }

        bind(&train_spec, state.parameters())?;
        check_unreferenced(&train_spec, state.parameters(), &config)?;

        let eval_spec = match &ids.eval_model {
            Some(id) => {
                let spec = GraphSpec::from_json(&env.resolve(id)?)?;
                bind(&spec, state.parameters())?;
                Some(spec)
            }
            None => None,
        };

        let optim_spec = match &ids.optim_model {
            Some(id) => Some(OptimizerSpec::from_json(&env.resolve(id)?)?),
            None => None,
        };

        let train = engine::compile(providers, &train_spec, "train")?;
        let eval = eval_spec
            .as_ref()
            .map(|spec| engine::compile(providers, spec, "eval"))
            .transpose()?;

        let module = ComputeModule::new(train, eval, state.parameters());
        let layout = ParameterLayout::new(state.parameters());

        let optimizer = match &optim_spec {
            Some(spec) => {
                let (params, ckpt) = state.split_mut();
                Some(OptimizerModule::new(spec, params, ckpt)?)
            }
            None => None,
        };

        info!(
            session = log_id,
            params = state.parameters().len(),
            trainable_size = layout.size(true),
            size = layout.size(false),
            eval = module.has_eval(),
            optimizer = optimizer.as_ref().map_or("none", OptimizerModule::name);
            "session ready"
        );

        Ok(Self {
            config,
            state,
            module,
            layout,
            optimizer,
            scheduler: None,
            lr_overridden: false,
        })
    }

    fn optimizer(&self) -> Result<&OptimizerModule> {
        self.optimizer
            .as_ref()
            .ok_or(TrainErr::UnsupportedOperation("no optimizer model was supplied"))
    }

    /// Registers the learning rate scheduler, which can only be done once.
    ///
    /// The learning rate is set to `initial_lr` and the factory is invoked once with a
    /// view over the optimizer. When the checkpoint carries scheduler progress, the
    /// resumed scheduler's current rate is used instead of `initial_lr`.
    ///
    /// # Returns
    /// An unsupported operation error without an optimizer, or an already registered
    /// error on a second call, in which case the first scheduler stays in effect.
    pub fn register_scheduler<F>(&mut self, factory: F, initial_lr: f32) -> Result<()>
    where
        F: FnOnce(OptimizerView<'_>) -> Box<dyn LrScheduler>,
    {
        let Some(optimizer) = &self.optimizer else {
            return Err(TrainErr::UnsupportedOperation("no optimizer model was supplied"));
        };

        if self.scheduler.is_some() {
            return Err(TrainErr::AlreadyRegistered);
        }

        let ckpt = self.state.optimizer_mut();
        ckpt.initial_lr = Some(initial_lr);
        ckpt.learning_rate = Some(initial_lr);

        let scheduler = factory(OptimizerView::new(optimizer, self.state.optimizer()));

        let resumed = scheduler.state();
        if resumed.step > 0 {
            self.state.optimizer_mut().learning_rate = Some(resumed.learning_rate);
        }

        info!(
            session = self.config.log_id.as_str(),
            initial_lr = initial_lr,
            step = resumed.step;
            "registered scheduler"
        );

        self.scheduler = Some(scheduler);
        self.lr_overridden = false;
        Ok(())
    }

    pub fn training_model_input_count(&self) -> usize {
        self.module.input_count(Mode::Train).unwrap_or_default()
    }

    pub fn training_model_input_name(&self, index: usize) -> Result<&str> {
        self.module.input_name(Mode::Train, index)
    }

    pub fn training_model_output_count(&self) -> usize {
        self.module.output_count(Mode::Train).unwrap_or_default()
    }

    pub fn training_model_output_name(&self, index: usize) -> Result<&str> {
        self.module.output_name(Mode::Train, index)
    }

    /// # Returns
    /// An unsupported operation error without an eval model.
    pub fn eval_model_input_count(&self) -> Result<usize> {
        self.module.input_count(Mode::Eval)
    }

    pub fn eval_model_input_name(&self, index: usize) -> Result<&str> {
        self.module.input_name(Mode::Eval, index)
    }

    pub fn eval_model_output_count(&self) -> Result<usize> {
        self.module.output_count(Mode::Eval)
    }

    pub fn eval_model_output_name(&self, index: usize) -> Result<&str> {
        self.module.output_name(Mode::Eval, index)
    }

    /// Runs forward and backward on the train graph, adding the gradients into the
    /// accumulators. A pending lazy reset is applied right before the addition.
    ///
    /// # Arguments
    /// * `options` - The run options.
    /// * `inputs` - One tensor per train input, following `training_model_input_name`.
    ///
    /// # Returns
    /// The train graph's outputs, or a graph execution error in which case the
    /// accumulators and the pending reset are untouched.
    pub fn train_step(&mut self, options: &RunOptions, inputs: &[Tensor]) -> Result<Vec<Tensor>> {
        options.check()?;

        let outputs = self.module.train_step(self.state.parameters(), inputs)?;
        debug!(session = self.config.log_id.as_str(), tag = options.tag(); "train step");
        Ok(outputs)
    }

    /// Runs forward on the eval graph. Nothing in the session changes.
    pub fn eval_step(&self, options: &RunOptions, inputs: &[Tensor]) -> Result<Vec<Tensor>> {
        options.check()?;
        self.module.eval_step(self.state.parameters(), inputs)
    }

    /// Requests the accumulators to be zeroed at the start of the next successful
    /// `train_step`.
    ///
    /// An `optimizer_step` issued before that uses the accumulators as they are.
    pub fn lazy_reset_grad(&mut self) {
        self.module.lazy_reset_grad();
    }

    /// Updates every trainable parameter with its accumulated gradient and the current
    /// learning rate. The accumulators are left as they are.
    ///
    /// # Returns
    /// An unsupported operation error without an optimizer, a precondition error if the
    /// learning rate was never set, or a graph execution error if the sizes don't agree.
    pub fn optimizer_step(&mut self, options: &RunOptions) -> Result<()> {
        options.check()?;

        let Some(optimizer) = &self.optimizer else {
            return Err(TrainErr::UnsupportedOperation("no optimizer model was supplied"));
        };

        let (params, ckpt) = self.state.split_mut();
        optimizer.step(params, self.module.gradients(), ckpt)?;
        debug!(
            session = self.config.log_id.as_str(),
            step = ckpt.step(),
            tag = options.tag();
            "optimizer step"
        );
        Ok(())
    }

    /// Overrides the learning rate until the next scheduler step, if any.
    pub fn set_learning_rate(&mut self, learning_rate: f32) -> Result<()> {
        self.optimizer()?;

        self.state.optimizer_mut().learning_rate = Some(learning_rate);
        self.lr_overridden = self.scheduler.is_some();
        Ok(())
    }

    /// # Returns
    /// An unsupported operation error without an optimizer, or a precondition error if the
    /// learning rate was never set.
    pub fn learning_rate(&self) -> Result<f32> {
        self.optimizer()?;

        self.state
            .optimizer()
            .learning_rate()
            .ok_or(TrainErr::Precondition("learning rate was never set"))
    }

    /// Advances the scheduler one step and makes its rate the current learning rate,
    /// discarding any rate set by hand since the previous step.
    ///
    /// # Returns
    /// The new learning rate, or an unsupported operation error without a scheduler.
    pub fn scheduler_step(&mut self) -> Result<f32> {
        let Some(scheduler) = self.scheduler.as_mut() else {
            return Err(TrainErr::UnsupportedOperation("no scheduler was registered"));
        };

        let learning_rate = scheduler.advance();
        let step = scheduler.state().step;

        let ckpt = self.state.optimizer_mut();
        if self.lr_overridden && self.config.warn_on_lr_override {
            warn!(
                session = self.config.log_id.as_str();
                "scheduler step {step} discards the learning rate {:?} set by hand",
                ckpt.learning_rate
            );
        }

        ckpt.learning_rate = Some(learning_rate);
        ckpt.scheduler_step = step;
        self.lr_overridden = false;
        Ok(learning_rate)
    }

    /// The amount of scalar elements across the parameters, or only the trainable ones.
    pub fn parameters_size(&self, trainable_only: bool) -> usize {
        self.layout.size(trainable_only)
    }

    /// Flattens the parameters into `buffer` in canonical order, lexicographic by name.
    ///
    /// # Returns
    /// A size mismatch error if `buffer` doesn't have exactly `parameters_size` elements,
    /// in which case nothing is written.
    pub fn copy_parameters_to_buffer(&self, buffer: &mut [f32], trainable_only: bool) -> Result<()> {
        self.layout
            .copy_to_buffer(self.state.parameters(), buffer, trainable_only)
    }

    /// Overwrites the parameters with `buffer`, laid out as in `copy_parameters_to_buffer`.
    ///
    /// # Returns
    /// A size mismatch error if `buffer` doesn't have exactly `parameters_size` elements,
    /// in which case nothing is written.
    pub fn copy_buffer_to_parameters(&mut self, buffer: &[f32], trainable_only: bool) -> Result<()> {
        self.layout
            .copy_from_buffer(self.state.parameters_mut(), buffer, trainable_only)
    }

    /// Writes a forward-only model computing `outputs` from the current parameter values.
    ///
    /// # Returns
    /// An invalid argument error if `outputs` is empty or names an unknown output, or an
    /// io error if the model can't be written.
    #[cfg(feature = "export")]
    pub fn export_model_for_inferencing(
        &self,
        path: impl AsRef<Path>,
        outputs: &[String],
    ) -> Result<()> {
        let path = path.as_ref();
        let model = crate::inference::InferenceModel::from_graph(
            self.module.train_spec(),
            self.state.parameters(),
            outputs,
        )?;

        model.save(path)?;
        info!(
            session = self.config.log_id.as_str();
            "exported {outputs:?} for inferencing to {}",
            path.display()
        );
        Ok(())
    }

    /// The accumulated gradients.
    pub fn gradients(&self) -> &GradientBuffer {
        self.module.gradients()
    }

    pub fn checkpoint_state(&self) -> &CheckpointState {
        &*self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

/// Checks the checkpoint has every parameter `spec` binds to, with the right shape.
fn bind(spec: &GraphSpec, params: &ParameterStore) -> Result<()> {
    engine::check_bindings(&spec.parameters()?, |name| {
        params.get(name).map(|param| param.shape())
    })
}

fn check_unreferenced(spec: &GraphSpec, params: &ParameterStore, config: &SessionConfig) -> Result<()> {
    let referenced: HashSet<_> = spec.parameters()?.into_iter().map(|b| b.name).collect();
    let unreferenced: Vec<_> = params
        .iter()
        .map(|(name, _)| name)
        .filter(|name| !referenced.contains(*name))
        .collect();

    if unreferenced.is_empty() {
        return Ok(());
    }

    if config.strict_parameters {
        return Err(TrainErr::Configuration(format!(
            "checkpoint parameters {unreferenced:?} are not referenced by the train model"
        )));
    }

    info!(
        session = config.log_id.as_str();
        "keeping parameter(s) the train model doesn't reference: {unreferenced:?}"
    );
    Ok(())
}
