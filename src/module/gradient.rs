use std::collections::BTreeMap;

use log::debug;

use crate::{ParameterStore, Result, Tensor, TrainErr, engine::Gradients};

/// One gradient accumulator per trainable parameter.
///
/// Accumulators start at zero and keep summing the gradients of every train step until a
/// reset is requested. Resets are lazy: `lazy_reset` only records the request, and the
/// next successful `accumulate` zeroes the accumulators right before adding to them.
#[derive(Debug, Clone)]
pub struct GradientBuffer {
    accumulators: BTreeMap<String, Accumulator>,
    reset_pending: bool,
}

#[derive(Debug, Clone)]
struct Accumulator {
    grad: Tensor,
    has_pending: bool,
}

impl GradientBuffer {
    /// Creates a zeroed accumulator for every trainable parameter in `params`.
    pub fn new(params: &ParameterStore) -> Self {
        let accumulators = params
            .trainable()
            .map(|(name, param)| {
                let acc = Accumulator {
                    grad: Tensor::zeros(param.shape()),
                    has_pending: false,
                };

                (name.to_string(), acc)
            })
            .collect();

        Self {
            accumulators,
            reset_pending: false,
        }
    }

    /// Requests a reset of every accumulator, deferred until the next accumulation.
    pub fn lazy_reset(&mut self) {
        self.reset_pending = true;
    }

    /// Whether a requested reset hasn't been applied yet.
    pub fn is_reset_pending(&self) -> bool {
        self.reset_pending
    }

    /// The accumulated gradient of `name`.
    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.accumulators.get(name).map(|acc| &acc.grad)
    }

    /// Whether `name` accumulated any gradient since the last applied reset.
    pub fn has_pending(&self, name: &str) -> bool {
        self.accumulators
            .get(name)
            .is_some_and(|acc| acc.has_pending)
    }

    /// Iterates the accumulators in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tensor)> {
        self.accumulators
            .iter()
            .map(|(name, acc)| (name.as_str(), &acc.grad))
    }

    pub fn len(&self) -> usize {
        self.accumulators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accumulators.is_empty()
    }

    /// Adds the gradients of one backward pass.
    ///
    /// Either every gradient lands or none does: the names and shapes are checked before
    /// the pending reset, if any, and the additions take place.
    ///
    /// # Returns
    /// A graph execution error if a gradient has no accumulator or the wrong shape.
    pub(crate) fn accumulate(&mut self, grads: Gradients) -> Result<()> {
        for (name, grad) in &grads {
            let acc = self.accumulators.get(name).ok_or_else(|| {
                TrainErr::GraphExecution(format!("no gradient accumulator for parameter {name}"))
            })?;

            acc.grad.check_same_shape(grad)?;
        }

        if self.reset_pending {
            for acc in self.accumulators.values_mut() {
                acc.grad.fill_zero();
                acc.has_pending = false;
            }

            self.reset_pending = false;
            debug!("applied pending gradient reset");
        }

        for (name, grad) in grads {
            if let Some(acc) = self.accumulators.get_mut(&name) {
                acc.grad.add_assign(&grad)?;
                acc.has_pending = true;
            }
        }

        Ok(())
    }
}
