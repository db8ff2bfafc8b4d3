mod optimizer;
mod parameter;
mod property;
mod state;
mod store;

pub use optimizer::{OptimizerCheckpoint, ParamOptimizerState};
pub use parameter::Parameter;
pub use property::Property;
pub use state::CheckpointState;
pub use store::ParameterStore;
