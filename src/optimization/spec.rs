use serde::{Deserialize, Serialize};

use super::{Adam, GradientDescent, GradientDescentWithMomentum, Optimizer};
use crate::{Result, TrainErr};

/// The specification for the `Optimizer` trait.
///
/// The learning rate is not part of it, it belongs to the session and its scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerSpec {
    Adam {
        #[serde(default = "default_beta1")]
        beta1: f32,
        #[serde(default = "default_beta2")]
        beta2: f32,
        #[serde(default = "default_epsilon")]
        epsilon: f32,
        #[serde(default)]
        weight_decay: f32,
    },
    GradientDescent,
    GradientDescentWithMomentum {
        momentum: f32,
    },
}

fn default_beta1() -> f32 {
    0.9
}

fn default_beta2() -> f32 {
    0.999
}

fn default_epsilon() -> f32 {
    1e-8
}

impl OptimizerSpec {
    /// Parses an optimizer from its json description.
    ///
    /// # Returns
    /// A configuration error if the description is malformed or its hyperparameters are
    /// out of range.
    pub fn from_json(src: &str) -> Result<Self> {
        let spec: Self = serde_json::from_str(src)
            .map_err(|e| TrainErr::Configuration(format!("malformed optimizer: {e}")))?;

        spec.validate()?;
        Ok(spec)
    }

    pub fn validate(&self) -> Result<()> {
        let in_unit = |x: f32| (0. ..1.).contains(&x);

        let ok = match *self {
            Self::Adam {
                beta1,
                beta2,
                epsilon,
                weight_decay,
            } => in_unit(beta1) && in_unit(beta2) && epsilon > 0. && weight_decay >= 0.,
            Self::GradientDescent => true,
            Self::GradientDescentWithMomentum { momentum } => in_unit(momentum),
        };

        if !ok {
            return Err(TrainErr::Configuration(format!(
                "invalid optimizer hyperparameters: {self:?}"
            )));
        }

        Ok(())
    }

    /// Builds the update rule this spec describes.
    pub fn build(&self) -> Result<Box<dyn Optimizer>> {
        self.validate()?;

        let optimizer: Box<dyn Optimizer> = match *self {
            Self::Adam {
                beta1,
                beta2,
                epsilon,
                weight_decay,
            } => Box::new(Adam::new(beta1, beta2, epsilon, weight_decay)),
            Self::GradientDescent => Box::new(GradientDescent::new()),
            Self::GradientDescentWithMomentum { momentum } => {
                Box::new(GradientDescentWithMomentum::new(momentum))
            }
        };

        Ok(optimizer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adam_defaults() {
        let spec = OptimizerSpec::from_json(r#"{ "adam": {} }"#).unwrap();

        assert_eq!(
            spec,
            OptimizerSpec::Adam {
                beta1: 0.9,
                beta2: 0.999,
                epsilon: 1e-8,
                weight_decay: 0.,
            }
        );
        assert_eq!(spec.build().unwrap().name(), "adam");
    }

    #[test]
    fn unit_variant_parses_from_a_string() {
        let spec = OptimizerSpec::from_json(r#""gradient_descent""#).unwrap();
        assert_eq!(spec, OptimizerSpec::GradientDescent);
    }

    #[test]
    fn rejects_out_of_range_hyperparameters() {
        let res = OptimizerSpec::from_json(r#"{ "gradient_descent_with_momentum": { "momentum": 1.5 } }"#);
        assert!(matches!(res, Err(TrainErr::Configuration(_))));
    }

    #[test]
    fn rejects_unknown_optimizers() {
        let res = OptimizerSpec::from_json(r#"{ "rmsprop": {} }"#);
        assert!(matches!(res, Err(TrainErr::Configuration(_))));
    }
}
