use std::collections::BTreeMap;

use super::GraphSpec;
use crate::{ParameterStore, Result, Tensor};

/// Per parameter gradients of a single forward/backward pass.
pub type Gradients = BTreeMap<String, Tensor>;

/// A graph compiled by an `ExecutionProvider`, ready to run against a `ParameterStore`.
///
/// Inputs are positional and must follow `input_names`, outputs come back following
/// `output_names`.
pub trait Graph: Send + Sync {
    /// The description the graph was compiled from.
    fn spec(&self) -> &GraphSpec;

    fn input_names(&self) -> &[String];

    fn output_names(&self) -> &[String];

    /// Runs a forward pass.
    ///
    /// # Arguments
    /// * `params` - The parameters to bind the graph to.
    /// * `inputs` - The input tensors.
    ///
    /// # Returns
    /// The output tensors or a graph execution error.
    fn forward(&self, params: &ParameterStore, inputs: &[Tensor]) -> Result<Vec<Tensor>>;

    /// Runs a forward and a backward pass.
    ///
    /// Gradients are written into scratch space owned by the caller of this method, never
    /// into the parameters, and only for parameters that require a gradient.
    ///
    /// # Returns
    /// The output tensors and the gradients, or a graph execution error.
    fn forward_backward(
        &self,
        params: &ParameterStore,
        inputs: &[Tensor],
    ) -> Result<(Vec<Tensor>, Gradients)>;
}
