mod compute;
mod gradient;
mod layout;

pub use compute::{ComputeModule, Mode};
pub use gradient::GradientBuffer;
pub use layout::ParameterLayout;
