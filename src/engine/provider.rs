use std::sync::Arc;

use log::debug;

use super::{Graph, GraphSpec, SequentialGraph};
use crate::{Result, TrainErr};

/// A backend able to host graphs.
pub trait ExecutionProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Compiles `spec` into a runnable graph.
    ///
    /// # Returns
    /// `None` if this provider can't host the graph.
    fn compile(&self, spec: &GraphSpec) -> Option<Box<dyn Graph>>;
}

/// The default provider, runs sequential graphs on the cpu through `ndarray`.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuProvider;

impl CpuProvider {
    pub fn new() -> Self {
        Self
    }
}

impl ExecutionProvider for CpuProvider {
    fn name(&self) -> &str {
        "cpu"
    }

    fn compile(&self, spec: &GraphSpec) -> Option<Box<dyn Graph>> {
        Some(Box::new(SequentialGraph::new(spec.clone())))
    }
}

/// Compiles `spec` with the first provider that accepts it.
///
/// An empty provider list falls back to the `CpuProvider`.
///
/// # Arguments
/// * `providers` - The candidate providers, in order of preference.
/// * `spec` - The graph to compile.
/// * `label` - What the graph is used for, for diagnostics.
///
/// # Returns
/// The compiled graph or a provider error if every provider declined.
pub fn compile(
    providers: &[Arc<dyn ExecutionProvider>],
    spec: &GraphSpec,
    label: &'static str,
) -> Result<Box<dyn Graph>> {
    if providers.is_empty() {
        debug!("no providers supplied, compiling the {label} graph on cpu");
        return CpuProvider.compile(spec).ok_or_else(|| TrainErr::Provider {
            graph: label,
            tried: vec![CpuProvider.name().to_string()],
        });
    }

    for provider in providers {
        if let Some(graph) = provider.compile(spec) {
            debug!("compiled the {label} graph on {}", provider.name());
            return Ok(graph);
        }
    }

    Err(TrainErr::Provider {
        graph: label,
        tried: providers.iter().map(|p| p.name().to_string()).collect(),
    })
}
