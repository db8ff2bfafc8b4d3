use ndarray::{Array2, ArrayD, ArrayView1, ArrayView2, Axis};

use super::{ActFn, Gradients, Graph, GraphSpec, LayerSpec, LossFn, LossFnSpec, Mse};
use crate::{Parameter, ParameterStore, Result, Tensor, TrainErr};

/// A sequential graph: information flows forward when computing an output and backward
/// when computing the gradients of its layers.
pub struct SequentialGraph {
    spec: GraphSpec,
    input_names: Vec<String>,
    output_names: Vec<String>,
    layers: Vec<DenseOp>,
    loss_fn: Option<Mse>,
}

struct DenseOp {
    weight: String,
    bias: Option<String>,
    dim: (usize, usize),
    act_fn: Option<ActFn>,
}

/// What the forward pass keeps around for the backward pass: each layer's input and
/// pre-activation output.
struct Trace {
    xs: Vec<Array2<f32>>,
    zs: Vec<Array2<f32>>,
}

impl SequentialGraph {
    /// Creates a new `SequentialGraph` from an already validated spec.
    pub fn new(spec: GraphSpec) -> Self {
        let layers = spec
            .layers
            .iter()
            .map(|layer| match layer {
                LayerSpec::Dense {
                    weight,
                    bias,
                    dim,
                    act_fn,
                } => DenseOp {
                    weight: weight.clone(),
                    bias: bias.clone(),
                    dim: *dim,
                    act_fn: act_fn.map(ActFn::from),
                },
            })
            .collect();

        let loss_fn = spec.loss.as_ref().map(|loss| match loss.loss_fn {
            LossFnSpec::Mse => Mse,
        });

        Self {
            input_names: spec.input_names(),
            output_names: spec.output_names(),
            layers,
            loss_fn,
            spec,
        }
    }

    fn check_inputs(&self, inputs: &[Tensor]) -> Result<()> {
        if inputs.len() != self.input_names.len() {
            return Err(TrainErr::GraphExecution(format!(
                "expected {} input(s) {:?}, got {}",
                self.input_names.len(),
                self.input_names,
                inputs.len()
            )));
        }

        Ok(())
    }

    fn forward_trace(
        &self,
        params: &ParameterStore,
        x: ArrayView2<f32>,
    ) -> Result<(Array2<f32>, Trace)> {
        let mut trace = Trace {
            xs: Vec::with_capacity(self.layers.len()),
            zs: Vec::with_capacity(self.layers.len()),
        };
        let mut a = x.to_owned();

        for (i, layer) in self.layers.iter().enumerate() {
            if a.ncols() != layer.dim.0 {
                return Err(TrainErr::GraphExecution(format!(
                    "layer {i} expects {} feature(s), got {}",
                    layer.dim.0,
                    a.ncols()
                )));
            }

            let w = weight_view(params, layer)?;
            let mut z = a.dot(&w);

            if let Some(bias) = &layer.bias {
                z += &bias_view(params, bias, layer.dim.1)?;
            }

            let next = match layer.act_fn {
                Some(act_fn) => z.mapv(|z| act_fn.f(z)),
                None => z.clone(),
            };

            trace.xs.push(a);
            trace.zs.push(z);
            a = next;
        }

        Ok((a, trace))
    }

    fn target<'t>(&self, inputs: &'t [Tensor], y_pred: &Array2<f32>) -> Result<ArrayView2<'t, f32>> {
        let y = inputs[1].as_matrix()?;

        if y.dim() != y_pred.dim() {
            return Err(TrainErr::GraphExecution(format!(
                "target has shape {:?} but the prediction has shape {:?}",
                y.dim(),
                y_pred.dim()
            )));
        }

        Ok(y)
    }
}

impl Graph for SequentialGraph {
    fn spec(&self) -> &GraphSpec {
        &self.spec
    }

    fn input_names(&self) -> &[String] {
        &self.input_names
    }

    fn output_names(&self) -> &[String] {
        &self.output_names
    }

    fn forward(&self, params: &ParameterStore, inputs: &[Tensor]) -> Result<Vec<Tensor>> {
        self.check_inputs(inputs)?;

        let x = inputs[0].as_matrix()?;
        let (y_pred, _) = self.forward_trace(params, x)?;

        let mut outputs = Vec::with_capacity(self.output_names.len());
        if let Some(loss_fn) = &self.loss_fn {
            let y = self.target(inputs, &y_pred)?;
            outputs.push(Tensor::scalar(loss_fn.loss(y_pred.view(), y)));
        }

        outputs.push(Tensor::from(y_pred.into_dyn()));
        Ok(outputs)
    }

    fn forward_backward(
        &self,
        params: &ParameterStore,
        inputs: &[Tensor],
    ) -> Result<(Vec<Tensor>, Gradients)> {
        let Some(loss_fn) = &self.loss_fn else {
            return Err(TrainErr::GraphExecution(
                "graph has no loss head to differentiate".into(),
            ));
        };

        self.check_inputs(inputs)?;

        let x = inputs[0].as_matrix()?;
        let (y_pred, trace) = self.forward_trace(params, x)?;
        let y = self.target(inputs, &y_pred)?;
        let loss = loss_fn.loss(y_pred.view(), y);

        let mut grads = Gradients::new();
        let mut d = loss_fn.loss_prime(y_pred.view(), y);

        for (i, layer) in self.layers.iter().enumerate().rev() {
            if let Some(act_fn) = layer.act_fn {
                d.zip_mut_with(&trace.zs[i], |d, &z| *d *= act_fn.df(z));
            }

            if param(params, &layer.weight)?.requires_grad() {
                let dw = trace.xs[i].t().dot(&d);
                add_grad(&mut grads, &layer.weight, dw.into_dyn())?;
            }

            if let Some(bias) = &layer.bias {
                if param(params, bias)?.requires_grad() {
                    let db = d.sum_axis(Axis(0));
                    add_grad(&mut grads, bias, db.into_dyn())?;
                }
            }

            if i > 0 {
                let w = weight_view(params, layer)?;
                d = d.dot(&w.t());
            }
        }

        let outputs = vec![Tensor::scalar(loss), Tensor::from(y_pred.into_dyn())];
        Ok((outputs, grads))
    }
}

fn param<'p>(params: &'p ParameterStore, name: &str) -> Result<&'p Parameter> {
    params
        .get(name)
        .ok_or_else(|| TrainErr::GraphExecution(format!("parameter {name} is not bound")))
}

fn weight_view<'p>(params: &'p ParameterStore, layer: &DenseOp) -> Result<ArrayView2<'p, f32>> {
    let w = param(params, &layer.weight)?.data().as_matrix()?;

    if w.dim() != layer.dim {
        return Err(TrainErr::GraphExecution(format!(
            "parameter {} has shape {:?}, expected {:?}",
            layer.weight,
            w.dim(),
            layer.dim
        )));
    }

    Ok(w)
}

fn bias_view<'p>(params: &'p ParameterStore, name: &str, len: usize) -> Result<ArrayView1<'p, f32>> {
    let b = param(params, name)?.data();

    if b.shape() != [len] {
        return Err(TrainErr::GraphExecution(format!(
            "parameter {name} has shape {:?}, expected [{len}]",
            b.shape()
        )));
    }

    ArrayView1::from_shape(len, b.data()).map_err(|e| TrainErr::GraphExecution(e.to_string()))
}

/// Adds `grad` to the gradient of `name`, parameters shared between layers sum up.
fn add_grad(grads: &mut Gradients, name: &str, grad: ArrayD<f32>) -> Result<()> {
    let grad = Tensor::from(grad);

    match grads.get_mut(name) {
        Some(acc) => acc.add_assign(&grad),
        None => {
            grads.insert(name.to_string(), grad);
            Ok(())
        }
    }
}
