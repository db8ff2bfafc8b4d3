mod activations;
mod graph;
mod loss;
mod provider;
mod sequential;
mod spec;

pub use activations::ActFn;
pub use graph::{Gradients, Graph};
pub use loss::{LossFn, Mse};
pub use provider::{CpuProvider, ExecutionProvider, compile};
pub use sequential::SequentialGraph;
pub(crate) use spec::check_bindings;
pub use spec::{ActFnSpec, GraphSpec, LayerSpec, LossFnSpec, LossSpec, ParamBinding, ParamKind};
