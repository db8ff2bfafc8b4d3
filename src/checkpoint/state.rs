use std::{cell::RefCell, collections::BTreeMap, fs, path::Path, rc::Rc};

use log::{debug, info};
use rand::{SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use super::{OptimizerCheckpoint, Parameter, ParameterStore, Property};
use crate::{
    Result, Tensor,
    engine::{GraphSpec, ParamKind},
    initialization::ParamInit,
};

/// Everything needed to resume a training: the parameters, the optimizer's state and
/// the scheduler's progress, plus a bag of user defined properties.
///
/// A `CheckpointState` is always owned by the caller. A `TrainingSession` borrows it
/// mutably for as long as the session lives and reads and writes through it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckpointState {
    parameters: ParameterStore,
    #[serde(default)]
    optimizer: OptimizerCheckpoint,
    #[serde(default)]
    properties: BTreeMap<String, Property>,
}

impl CheckpointState {
    /// Creates a new empty `CheckpointState`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new `CheckpointState` with the given parameters and no optimizer progress.
    pub fn from_parameters(parameters: ParameterStore) -> Self {
        Self {
            parameters,
            ..Default::default()
        }
    }

    /// Creates a fresh checkpoint for every parameter a graph binds to.
    ///
    /// Weights are sampled from `init`, biases start at zero. Every parameter is trainable.
    ///
    /// # Arguments
    /// * `spec` - The graph the parameters are for.
    /// * `init` - How to initialize the weights.
    /// * `seed` - The seed for the random initializers, `None` seeds from the os.
    ///
    /// # Returns
    /// A configuration error if the graph is invalid or `init` can't be sampled.
    pub fn init_from_graph(spec: &GraphSpec, init: ParamInit, seed: Option<u64>) -> Result<Self> {
        spec.validate()?;

        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let rng = Rc::new(RefCell::new(rng));

        let mut parameters = ParameterStore::new();
        for binding in spec.parameters()? {
            let data = match binding.kind {
                ParamKind::Weight => init.sample(&rng, &binding.shape)?,
                ParamKind::Bias => Tensor::zeros(&binding.shape),
            };

            parameters.insert(binding.name, Parameter::new(data, true))?;
        }

        info!(
            "initialized checkpoint with {} parameter(s), {} element(s)",
            parameters.len(),
            parameters.numel(false)
        );

        Ok(Self::from_parameters(parameters))
    }

    /// Adds a new parameter.
    ///
    /// # Returns
    /// A configuration error if there's already a parameter with that name.
    pub fn add_parameter(
        &mut self,
        name: impl Into<String>,
        data: Tensor,
        requires_grad: bool,
    ) -> Result<()> {
        self.parameters
            .insert(name, Parameter::new(data, requires_grad))
    }

    pub fn parameters(&self) -> &ParameterStore {
        &self.parameters
    }

    pub fn parameters_mut(&mut self) -> &mut ParameterStore {
        &mut self.parameters
    }

    pub fn optimizer(&self) -> &OptimizerCheckpoint {
        &self.optimizer
    }

    pub(crate) fn optimizer_mut(&mut self) -> &mut OptimizerCheckpoint {
        &mut self.optimizer
    }

    /// Splits the checkpoint in its parameter and optimizer halves.
    pub(crate) fn split_mut(&mut self) -> (&mut ParameterStore, &mut OptimizerCheckpoint) {
        (&mut self.parameters, &mut self.optimizer)
    }

    /// Adds or replaces a property.
    pub fn add_property(&mut self, name: impl Into<String>, value: impl Into<Property>) {
        self.properties.insert(name.into(), value.into());
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    /// Writes the checkpoint to `path` as json.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let raw = serde_json::to_vec(self)?;
        fs::write(path, raw)?;
        debug!("saved checkpoint to {}", path.display());
        Ok(())
    }

    /// Reads a checkpoint previously written with `save`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read(path)?;
        let state: Self = serde_json::from_slice(&raw)?;
        debug!(
            "loaded checkpoint from {} with {} parameter(s)",
            path.display(),
            state.parameters.len()
        );
        Ok(state)
    }
}
