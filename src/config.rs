use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{Result, TrainErr};

/// Session wide settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Prefixes every log line the session emits.
    pub log_id: String,
    /// Reject checkpoints holding parameters the train graph never references.
    pub strict_parameters: bool,
    /// Warn when a scheduler step overwrites a learning rate set by hand.
    pub warn_on_lr_override: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            log_id: "training_session".into(),
            strict_parameters: false,
            warn_on_lr_override: true,
        }
    }
}

impl SessionConfig {
    /// Parses a config from json, missing fields take their default value.
    pub fn from_json(src: &str) -> Result<Self> {
        serde_json::from_str(src)
            .map_err(|e| TrainErr::Configuration(format!("malformed session config: {e}")))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let src = fs::read_to_string(path)?;
        Self::from_json(&src)
    }
}

/// Per call options of the stepping operations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOptions {
    /// Shows up in the logs of the call.
    pub tag: Option<String>,
    /// Makes the call fail before doing any work.
    pub terminate: bool,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// The tag to log with, empty if there's none.
    pub(crate) fn tag(&self) -> &str {
        self.tag.as_deref().unwrap_or_default()
    }

    /// Fails if the caller asked to terminate.
    pub(crate) fn check(&self) -> Result<()> {
        if self.terminate {
            return Err(TrainErr::GraphExecution(format!(
                "run{} was terminated",
                self.tag.as_ref().map(|t| format!(" {t}")).unwrap_or_default()
            )));
        }

        Ok(())
    }
}
