use std::{collections::HashMap, fs, path::Path};

use log::debug;

use crate::{Result, TrainErr};

/// Resolves model identifiers to model descriptions.
///
/// Identifiers registered with `register_model` take precedence, anything else is
/// treated as a path to a json file.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    models: HashMap<String, String>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an in memory model description under `id`, replacing any previous one.
    pub fn register_model(&mut self, id: impl Into<String>, source: impl Into<String>) {
        self.models.insert(id.into(), source.into());
    }

    /// Looks up the description of `id`.
    ///
    /// # Returns
    /// A configuration error if `id` is empty, unregistered and not a readable file.
    pub fn resolve(&self, id: &str) -> Result<String> {
        if id.is_empty() {
            return Err(TrainErr::Configuration("empty model identifier".into()));
        }

        if let Some(source) = self.models.get(id) {
            return Ok(source.clone());
        }

        let path = Path::new(id);
        let source = fs::read_to_string(path).map_err(|e| {
            TrainErr::Configuration(format!("can't resolve model {id}: {e}"))
        })?;

        debug!("resolved model {id} from {}", path.display());
        Ok(source)
    }
}

#[cfg(test)]
mod tests {
    use std::env;

    use super::*;

    #[test]
    fn registered_models_resolve_first() {
        let mut env = Environment::new();
        env.register_model("train", "{}");

        assert_eq!(env.resolve("train").unwrap(), "{}");
    }

    #[test]
    fn falls_back_to_the_filesystem() {
        let path = env::temp_dir().join(format!("env-resolve-{}.json", std::process::id()));
        fs::write(&path, "[]").unwrap();

        let id = path.to_string_lossy().into_owned();
        let res = Environment::new().resolve(&id);
        let _ = fs::remove_file(&path);

        assert_eq!(res.unwrap(), "[]");
    }

    #[test]
    fn unresolvable_identifiers_fail() {
        let env = Environment::new();

        assert!(matches!(env.resolve(""), Err(TrainErr::Configuration(_))));
        assert!(matches!(
            env.resolve("no/such/model.json"),
            Err(TrainErr::Configuration(_))
        ));
    }
}
