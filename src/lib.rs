//! Training step orchestration over a caller-owned checkpoint.
//!
//! A [`TrainingSession`] borrows a [`CheckpointState`] for its whole lifetime and
//! coordinates a compiled training graph, an optional evaluation graph, an optional
//! optimizer and a learning rate scheduler around it.

pub mod checkpoint;
pub mod config;
pub mod engine;
pub mod environment;
pub mod error;
#[cfg(feature = "export")]
pub mod inference;
pub mod initialization;
pub mod module;
pub mod optimization;
pub mod scheduler;
pub mod session;
pub mod tensor;

pub use checkpoint::{CheckpointState, Parameter, ParameterStore, Property};
pub use config::{RunOptions, SessionConfig};
pub use environment::Environment;
pub use error::{Result, TrainErr};
pub use session::{ModelIdentifiers, TrainingSession};
pub use tensor::Tensor;
