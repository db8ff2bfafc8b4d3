mod constant;
mod cosine;
mod linear;
mod scheduler;
mod spec;
mod step_decay;

pub use constant::ConstantScheduler;
pub use cosine::CosineScheduler;
pub use linear::LinearScheduler;
pub use scheduler::{LrScheduler, SchedulerState};
pub use spec::SchedulerSpec;
pub use step_decay::StepDecayScheduler;
