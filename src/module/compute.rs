use super::GradientBuffer;
use crate::{
    ParameterStore, Result, Tensor, TrainErr,
    engine::{Graph, GraphSpec},
};

/// Which of the module's graphs an accessor refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Train,
    Eval,
}

/// Wraps the train graph, the optional eval graph and the gradient accumulators the
/// train graph writes into.
pub struct ComputeModule {
    train: Box<dyn Graph>,
    eval: Option<Box<dyn Graph>>,
    gradients: GradientBuffer,
}

impl ComputeModule {
    /// Creates a new `ComputeModule`.
    ///
    /// # Arguments
    /// * `train` - The compiled train graph.
    /// * `eval` - The compiled eval graph, if any.
    /// * `params` - The parameters the graphs are bound to, used to size the accumulators.
    pub fn new(train: Box<dyn Graph>, eval: Option<Box<dyn Graph>>, params: &ParameterStore) -> Self {
        Self {
            train,
            eval,
            gradients: GradientBuffer::new(params),
        }
    }

    /// Runs forward and backward on the train graph and accumulates the gradients.
    ///
    /// # Returns
    /// The train graph's outputs or a graph execution error, in which case the
    /// accumulators are untouched.
    pub fn train_step(&mut self, params: &ParameterStore, inputs: &[Tensor]) -> Result<Vec<Tensor>> {
        let (outputs, grads) = self.train.forward_backward(params, inputs)?;
        self.gradients.accumulate(grads)?;
        Ok(outputs)
    }

    /// Runs forward on the eval graph.
    pub fn eval_step(&self, params: &ParameterStore, inputs: &[Tensor]) -> Result<Vec<Tensor>> {
        self.graph(Mode::Eval)?.forward(params, inputs)
    }

    pub fn lazy_reset_grad(&mut self) {
        self.gradients.lazy_reset();
    }

    pub fn gradients(&self) -> &GradientBuffer {
        &self.gradients
    }

    /// The description of the train graph.
    pub fn train_spec(&self) -> &GraphSpec {
        self.train.spec()
    }

    pub fn has_eval(&self) -> bool {
        self.eval.is_some()
    }

    fn graph(&self, mode: Mode) -> Result<&dyn Graph> {
        match mode {
            Mode::Train => Ok(self.train.as_ref()),
            Mode::Eval => self
                .eval
                .as_deref()
                .ok_or(TrainErr::UnsupportedOperation("no eval graph was supplied")),
        }
    }

    pub fn input_count(&self, mode: Mode) -> Result<usize> {
        Ok(self.graph(mode)?.input_names().len())
    }

    pub fn input_name(&self, mode: Mode, index: usize) -> Result<&str> {
        nth(self.graph(mode)?.input_names(), index)
    }

    pub fn output_count(&self, mode: Mode) -> Result<usize> {
        Ok(self.graph(mode)?.output_names().len())
    }

    pub fn output_name(&self, mode: Mode, index: usize) -> Result<&str> {
        nth(self.graph(mode)?.output_names(), index)
    }
}

fn nth(names: &[String], index: usize) -> Result<&str> {
    names
        .get(index)
        .map(String::as_str)
        .ok_or(TrainErr::IndexOutOfRange {
            index,
            len: names.len(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Parameter, engine::SequentialGraph};

    fn module(with_eval: bool) -> (ComputeModule, ParameterStore) {
        let train = GraphSpec::from_json(
            r#"{ "layers": [{ "dense": { "weight": "w", "dim": [1, 1] } }],
                 "loss": { "loss_fn": "mse" } }"#,
        )
        .unwrap();
        let eval = GraphSpec {
            loss: None,
            ..train.clone()
        };

        let mut params = ParameterStore::new();
        params
            .insert("w", Parameter::new(Tensor::full(&[1, 1], 1.), true))
            .unwrap();

        let train = Box::new(SequentialGraph::new(train));
        let eval = with_eval.then(|| Box::new(SequentialGraph::new(eval)) as Box<dyn Graph>);
        (ComputeModule::new(train, eval, &params), params)
    }

    #[test]
    fn introspection_per_mode() {
        let (module, _) = module(true);

        assert_eq!(module.input_count(Mode::Train).unwrap(), 2);
        assert_eq!(module.input_name(Mode::Train, 1).unwrap(), "target");
        assert_eq!(module.output_name(Mode::Train, 0).unwrap(), "loss");
        assert_eq!(module.output_count(Mode::Eval).unwrap(), 1);
        assert_eq!(module.input_name(Mode::Eval, 0).unwrap(), "input");
    }

    #[test]
    fn out_of_range_index_fails() {
        let (module, _) = module(true);

        assert!(matches!(
            module.output_name(Mode::Train, 2),
            Err(TrainErr::IndexOutOfRange { index: 2, len: 2 })
        ));
    }

    #[test]
    fn eval_accessors_need_an_eval_graph() {
        let (module, params) = module(false);

        assert!(matches!(
            module.input_count(Mode::Eval),
            Err(TrainErr::UnsupportedOperation(_))
        ));
        assert!(matches!(
            module.eval_step(&params, &[Tensor::zeros(&[1, 1])]),
            Err(TrainErr::UnsupportedOperation(_))
        ));
    }

    #[test]
    fn train_step_accumulates() {
        let (mut module, params) = module(false);
        let inputs = [Tensor::full(&[1, 1], 1.), Tensor::full(&[1, 1], 0.)];

        module.train_step(&params, &inputs).unwrap();
        module.train_step(&params, &inputs).unwrap();

        // loss = (w x - y)^2, dloss/dw = 2 (w x - y) x = 2 per step
        assert_eq!(module.gradients().get("w").unwrap().data(), &[4.]);
    }
}
