use std::{cell::RefCell, rc::Rc};

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{ConstParamGen, ParamGen, RandParamGen};
use crate::{Result, Tensor};

/// How to initialize a fresh weight tensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamInit {
    Const { value: f32 },
    Uniform { low: f32, high: f32 },
    Normal { mean: f32, std_dev: f32 },
    XavierUniform,
    Kaiming,
}

impl ParamInit {
    /// Samples a new tensor of the given shape.
    ///
    /// # Arguments
    /// * `rng` - The random number generator shared by every parameter of a model.
    /// * `shape` - The shape of the tensor, its first two dimensions are used as fan in and out.
    pub fn sample<R: Rng + 'static>(&self, rng: &Rc<RefCell<R>>, shape: &[usize]) -> Result<Tensor> {
        let len = shape.iter().product();
        let (fan_in, fan_out) = match *shape {
            [] => (1, 1),
            [n] => (n, n),
            [n, m, ..] => (n, m),
        };

        let rng = Rc::clone(rng);
        let mut param_gen: Box<dyn ParamGen> = match *self {
            ParamInit::Const { value } => Box::new(ConstParamGen::new(value, len)),
            ParamInit::Uniform { low, high } => {
                Box::new(RandParamGen::uniform(rng, len, low, high)?)
            }
            ParamInit::Normal { mean, std_dev } => {
                Box::new(RandParamGen::normal(rng, len, mean, std_dev)?)
            }
            ParamInit::XavierUniform => {
                Box::new(RandParamGen::xavier_uniform(rng, len, fan_in, fan_out)?)
            }
            ParamInit::Kaiming => Box::new(RandParamGen::kaiming(rng, len, fan_in)?),
        };

        param_gen.tensor(shape)
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    #[test]
    fn const_fills_the_shape() {
        let rng = Rc::new(RefCell::new(StdRng::seed_from_u64(0)));
        let t = ParamInit::Const { value: 0.5 }.sample(&rng, &[2, 2]).unwrap();

        assert_eq!(t.shape(), &[2, 2]);
        assert_eq!(t.data(), &[0.5; 4]);
    }

    #[test]
    fn empty_shapes_are_fine() {
        let rng = Rc::new(RefCell::new(StdRng::seed_from_u64(0)));
        let t = ParamInit::Const { value: 1. }.sample(&rng, &[0, 3]).unwrap();
        assert!(t.is_empty());
    }

    #[test]
    fn deserializes_from_snake_case() {
        let init: ParamInit = serde_json::from_str(r#""xavier_uniform""#).unwrap();
        assert_eq!(init, ParamInit::XavierUniform);

        let init: ParamInit = serde_json::from_str(r#"{"const":{"value":1.0}}"#).unwrap();
        assert_eq!(init, ParamInit::Const { value: 1. });
    }
}
