mod identifiers;
mod session;

pub use identifiers::ModelIdentifiers;
pub use session::TrainingSession;
