use serde::{Deserialize, Serialize};

use crate::Tensor;

/// A model parameter, named by the `ParameterStore` that holds it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    data: Tensor,
    requires_grad: bool,
}

impl Parameter {
    /// Creates a new `Parameter`.
    ///
    /// # Arguments
    /// * `data` - The parameter's value.
    /// * `requires_grad` - Whether the optimizer should update this parameter.
    pub fn new(data: Tensor, requires_grad: bool) -> Self {
        Self {
            data,
            requires_grad,
        }
    }

    pub fn data(&self) -> &Tensor {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Tensor {
        &mut self.data
    }

    /// Whether this parameter is trainable.
    pub fn requires_grad(&self) -> bool {
        self.requires_grad
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
