/// The models a session is built from, resolved through an `Environment`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelIdentifiers {
    pub train_model: String,
    pub eval_model: Option<String>,
    pub optim_model: Option<String>,
}

impl ModelIdentifiers {
    /// Creates a new `ModelIdentifiers` with only a train model.
    pub fn new(train_model: impl Into<String>) -> Self {
        Self {
            train_model: train_model.into(),
            ..Default::default()
        }
    }

    pub fn with_eval(mut self, eval_model: impl Into<String>) -> Self {
        self.eval_model = Some(eval_model.into());
        self
    }

    pub fn with_optimizer(mut self, optim_model: impl Into<String>) -> Self {
        self.optim_model = Some(optim_model.into());
        self
    }
}
