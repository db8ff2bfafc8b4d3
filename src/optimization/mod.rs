mod adam;
mod gradient_descent;
mod gradient_descent_with_momentum;
mod module;
mod optimizer;
mod spec;

pub use adam::Adam;
pub use gradient_descent::GradientDescent;
pub use gradient_descent_with_momentum::GradientDescentWithMomentum;
pub use module::{OptimizerModule, OptimizerView};
pub use optimizer::{Optimizer, StepContext};
pub use spec::OptimizerSpec;
