use crate::{Result, Tensor, TrainErr};

/// Produces the initial values of a parameter, in row-major order.
pub trait ParamGen {
    /// Draws up to `n` values.
    ///
    /// # Returns
    /// `None` once the generator has handed out everything it was created for.
    fn sample(&mut self, n: usize) -> Option<Vec<f32>>;

    /// Draws exactly enough values to fill a tensor of the given shape.
    ///
    /// # Returns
    /// A configuration error if the generator runs dry before the tensor is full.
    fn tensor(&mut self, shape: &[usize]) -> Result<Tensor> {
        let len = shape.iter().product();
        let data = match self.sample(len) {
            Some(data) => data,
            None if len == 0 => Vec::new(),
            None => {
                return Err(TrainErr::Configuration(
                    "parameter generator is exhausted".into(),
                ));
            }
        };

        if data.len() != len {
            return Err(TrainErr::Configuration(format!(
                "parameter generator produced {} of {len} value(s)",
                data.len()
            )));
        }

        Tensor::new(shape.to_vec(), data)
    }
}
