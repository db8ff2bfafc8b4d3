use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::{Result, TrainErr};

/// The specification for the `ActFn` enum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActFnSpec {
    Sigmoid { amp: f32 },
}

/// The specification for a single layer of a sequential graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerSpec {
    /// `y = act_fn(x · weight + bias)`, `weight` has shape `dim` and `bias` shape `[dim.1]`.
    Dense {
        weight: String,
        #[serde(default)]
        bias: Option<String>,
        dim: (usize, usize),
        #[serde(default)]
        act_fn: Option<ActFnSpec>,
    },
}

/// The specification for the `LossFn` trait.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossFnSpec {
    Mse,
}

/// The loss head of a graph, the part that makes it trainable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LossSpec {
    pub loss_fn: LossFnSpec,
    #[serde(default = "default_target")]
    pub target: String,
    #[serde(default = "default_loss")]
    pub output: String,
}

/// A sequential computation graph.
///
/// Inputs are `[input]`, plus `target` when there's a loss head. Outputs are `[output]`,
/// preceded by the loss output when there's a loss head.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSpec {
    #[serde(default = "default_input")]
    pub input: String,
    #[serde(default = "default_output")]
    pub output: String,
    pub layers: Vec<LayerSpec>,
    #[serde(default)]
    pub loss: Option<LossSpec>,
}

fn default_input() -> String {
    "input".into()
}

fn default_output() -> String {
    "output".into()
}

fn default_target() -> String {
    "target".into()
}

fn default_loss() -> String {
    "loss".into()
}

/// Whether a bound parameter multiplies or is added to the activations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Weight,
    Bias,
}

/// A parameter a graph needs to be bound to before it can run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamBinding {
    pub name: String,
    pub shape: Vec<usize>,
    pub kind: ParamKind,
}

impl GraphSpec {
    /// Parses a graph from its json description.
    ///
    /// # Returns
    /// A configuration error if the description is malformed or invalid.
    pub fn from_json(src: &str) -> Result<Self> {
        let spec: Self = serde_json::from_str(src)
            .map_err(|e| TrainErr::Configuration(format!("malformed graph: {e}")))?;

        spec.validate()?;
        Ok(spec)
    }

    /// Checks the graph is structurally sound.
    pub fn validate(&self) -> Result<()> {
        if self.layers.is_empty() {
            return Err(TrainErr::Configuration(
                "graph must have at least one layer".into(),
            ));
        }

        // Adjacent layers must have compatible dimensions: prev.m == next.n
        for i in 1..self.layers.len() {
            let LayerSpec::Dense { dim: (_, prev_m), .. } = self.layers[i - 1];
            let LayerSpec::Dense { dim: (curr_n, _), .. } = self.layers[i];

            if prev_m != curr_n {
                return Err(TrainErr::Configuration(format!(
                    "layer {i}: input size ({curr_n}) does not match \
                     previous layer output size ({prev_m})"
                )));
            }
        }

        let names = self.input_names().into_iter().chain(self.output_names());
        let mut unique = HashSet::new();
        for name in names {
            if !unique.insert(name.clone()) {
                return Err(TrainErr::Configuration(format!(
                    "graph input/output name {name} is used more than once"
                )));
            }
        }

        self.parameters().map(|_| ())
    }

    /// Whether the graph has a loss head and can therefore be differentiated.
    pub fn is_trainable(&self) -> bool {
        self.loss.is_some()
    }

    pub fn input_names(&self) -> Vec<String> {
        let mut names = vec![self.input.clone()];
        if let Some(loss) = &self.loss {
            names.push(loss.target.clone());
        }

        names
    }

    pub fn output_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(2);
        if let Some(loss) = &self.loss {
            names.push(loss.output.clone());
        }

        names.push(self.output.clone());
        names
    }

    /// Lists the parameters the graph binds to in order of first use. A name used by
    /// several layers is listed once.
    ///
    /// # Returns
    /// A configuration error if the same name is bound with two different shapes.
    pub fn parameters(&self) -> Result<Vec<ParamBinding>> {
        let mut seen: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        let mut bindings = Vec::new();

        for layer in &self.layers {
            let LayerSpec::Dense {
                weight, bias, dim, ..
            } = layer;

            let mut candidates = vec![ParamBinding {
                name: weight.clone(),
                shape: vec![dim.0, dim.1],
                kind: ParamKind::Weight,
            }];

            if let Some(bias) = bias {
                candidates.push(ParamBinding {
                    name: bias.clone(),
                    shape: vec![dim.1],
                    kind: ParamKind::Bias,
                });
            }

            for binding in candidates {
                if let Some(shape) = seen.get(&binding.name) {
                    if *shape != binding.shape {
                        return Err(TrainErr::Configuration(format!(
                            "parameter {} is bound with shapes {shape:?} and {:?}",
                            binding.name, binding.shape
                        )));
                    }

                    continue;
                }

                seen.insert(binding.name.clone(), binding.shape.clone());
                bindings.push(binding);
            }
        }

        Ok(bindings)
    }

    /// Builds the forward-only graph that computes `outputs`.
    ///
    /// The loss head is kept only if its output is requested.
    ///
    /// # Returns
    /// An invalid argument error if `outputs` is empty or names an unknown output.
    pub fn for_inference(&self, outputs: &[String]) -> Result<GraphSpec> {
        if outputs.is_empty() {
            return Err(TrainErr::InvalidArgument(
                "at least one output must be retained".into(),
            ));
        }

        let known = self.output_names();
        if let Some(unknown) = outputs.iter().find(|name| !known.contains(name)) {
            return Err(TrainErr::InvalidArgument(format!(
                "graph has no output named {unknown}, outputs are {known:?}"
            )));
        }

        let loss = self
            .loss
            .as_ref()
            .filter(|loss| outputs.contains(&loss.output))
            .cloned();

        Ok(GraphSpec {
            input: self.input.clone(),
            output: self.output.clone(),
            layers: self.layers.clone(),
            loss,
        })
    }
}

/// Checks every parameter `bindings` needs is present in `lookup` with the right shape.
pub(crate) fn check_bindings<'a, F>(bindings: &[ParamBinding], mut lookup: F) -> Result<()>
where
    F: FnMut(&str) -> Option<&'a [usize]>,
{
    for binding in bindings {
        match lookup(&binding.name) {
            None => {
                return Err(TrainErr::Configuration(format!(
                    "graph binds to parameter {} which is not in the checkpoint",
                    binding.name
                )));
            }
            Some(shape) if shape != binding.shape.as_slice() => {
                return Err(TrainErr::Configuration(format!(
                    "parameter {} has shape {shape:?} but the graph expects {:?}",
                    binding.name, binding.shape
                )));
            }
            Some(_) => {}
        }
    }

    Ok(())
}
