//! Forward-only models exported from a training session.

use std::{collections::BTreeMap, fs, path::Path};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    Parameter, ParameterStore, Result, Tensor, TrainErr,
    engine::{CpuProvider, ExecutionProvider, GraphSpec},
};

/// A graph stripped of everything its retained outputs don't need, together with a
/// snapshot of the parameters it binds to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceModel {
    graph: GraphSpec,
    outputs: Vec<String>,
    initializers: BTreeMap<String, Tensor>,
}

impl InferenceModel {
    /// Snapshots the forward-only part of `graph` computing `outputs`.
    ///
    /// # Arguments
    /// * `graph` - The trained graph.
    /// * `params` - The parameters to snapshot, only the ones `graph` binds to are kept.
    /// * `outputs` - The outputs to retain.
    ///
    /// # Returns
    /// An invalid argument error if `outputs` is empty or names an unknown output.
    pub fn from_graph(graph: &GraphSpec, params: &ParameterStore, outputs: &[String]) -> Result<Self> {
        let graph = graph.for_inference(outputs)?;

        let initializers = graph
            .parameters()?
            .into_iter()
            .map(|binding| {
                let param = params.get(&binding.name).ok_or_else(|| {
                    TrainErr::Configuration(format!("parameter {} is missing", binding.name))
                })?;

                Ok((binding.name, param.data().clone()))
            })
            .collect::<Result<_>>()?;

        Ok(Self {
            graph,
            outputs: outputs.to_vec(),
            initializers,
        })
    }

    /// Writes the model to `path` as json.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let raw = serde_json::to_vec(self)?;
        fs::write(path, raw)?;
        Ok(())
    }

    /// Reads a model previously written with `save`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read(path)?;
        let model: Self = serde_json::from_slice(&raw)?;

        model.graph.validate()?;
        debug!("loaded inference model from {}", path.display());
        Ok(model)
    }

    pub fn input_names(&self) -> Vec<String> {
        self.graph.input_names()
    }

    /// The retained outputs, in the order `run` returns them.
    pub fn output_names(&self) -> &[String] {
        &self.outputs
    }

    /// Evaluates the model on the cpu.
    ///
    /// # Arguments
    /// * `inputs` - One tensor per input, following `input_names`.
    ///
    /// # Returns
    /// The retained outputs or a graph execution error.
    pub fn run(&self, inputs: &[Tensor]) -> Result<Vec<Tensor>> {
        let graph = CpuProvider.compile(&self.graph).ok_or_else(|| TrainErr::Provider {
            graph: "inference",
            tried: vec![CpuProvider.name().to_string()],
        })?;

        let mut params = ParameterStore::new();
        for (name, data) in &self.initializers {
            params.insert(name.clone(), Parameter::new(data.clone(), false))?;
        }

        let mut produced: BTreeMap<_, _> = graph
            .output_names()
            .iter()
            .cloned()
            .zip(graph.forward(&params, inputs)?)
            .collect();

        self.outputs
            .iter()
            .map(|name| {
                produced.remove(name).ok_or_else(|| {
                    TrainErr::GraphExecution(format!("graph did not produce {name}"))
                })
            })
            .collect()
    }
}
