use ndarray::{ArrayD, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::{Result, TrainErr};

/// An owned, row-major `f32` tensor.
///
/// The data always fills the shape, deserializing goes through `Tensor::new`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTensor")]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

#[derive(Deserialize)]
struct RawTensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl TryFrom<RawTensor> for Tensor {
    type Error = TrainErr;

    fn try_from(RawTensor { shape, data }: RawTensor) -> Result<Self> {
        Self::new(shape, data)
    }
}

impl Tensor {
    /// Creates a new `Tensor`.
    ///
    /// # Arguments
    /// * `shape` - The dimensions of the tensor.
    /// * `data` - The values in row-major order.
    ///
    /// # Returns
    /// A new `Tensor` or a size mismatch error if `data` doesn't fill `shape`.
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Result<Self> {
        let expected = shape.iter().product();

        if data.len() != expected {
            return Err(TrainErr::SizeMismatch {
                what: "tensor data",
                got: data.len(),
                expected,
            });
        }

        Ok(Self { shape, data })
    }

    /// Creates a tensor of the given shape filled with zeros.
    pub fn zeros(shape: &[usize]) -> Self {
        Self::full(shape, 0.)
    }

    /// Creates a tensor of the given shape filled with `value`.
    pub fn full(shape: &[usize], value: f32) -> Self {
        Self {
            shape: shape.to_vec(),
            data: vec![value; shape.iter().product()],
        }
    }

    /// Creates a zero dimensional tensor.
    pub fn scalar(value: f32) -> Self {
        Self {
            shape: Vec::new(),
            data: vec![value],
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// The amount of scalar elements in the tensor.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Sets every element to zero, keeping the allocation.
    pub fn fill_zero(&mut self) {
        self.data.fill(0.);
    }

    /// Adds `other` element-wise into `self`.
    ///
    /// # Returns
    /// A graph execution error if the shapes differ, in which case `self` is untouched.
    pub fn add_assign(&mut self, other: &Tensor) -> Result<()> {
        self.check_same_shape(other)?;

        for (a, b) in self.data.iter_mut().zip(&other.data) {
            *a += b;
        }

        Ok(())
    }

    /// Checks that `other` has the same shape and element count as `self`.
    pub fn check_same_shape(&self, other: &Tensor) -> Result<()> {
        if self.shape != other.shape || self.data.len() != other.data.len() {
            return Err(TrainErr::GraphExecution(format!(
                "shape mismatch: got {:?}, expected {:?}",
                other.shape, self.shape
            )));
        }

        Ok(())
    }

    /// Views the tensor as a matrix.
    ///
    /// # Returns
    /// A graph execution error if the tensor isn't two dimensional.
    pub fn as_matrix(&self) -> Result<ArrayView2<'_, f32>> {
        let &[rows, cols] = self.shape.as_slice() else {
            return Err(TrainErr::GraphExecution(format!(
                "expected a rank 2 tensor, got shape {:?}",
                self.shape
            )));
        };

        ArrayView2::from_shape((rows, cols), &self.data)
            .map_err(|e| TrainErr::GraphExecution(e.to_string()))
    }
}

impl From<ArrayD<f32>> for Tensor {
    fn from(value: ArrayD<f32>) -> Self {
        let shape = value.shape().to_vec();
        let data = value.as_standard_layout().iter().copied().collect();
        Self { shape, data }
    }
}
