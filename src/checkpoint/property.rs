use serde::{Deserialize, Serialize};

/// A user defined value stored alongside the checkpoint, e.g. the current epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Property {
    Int(i64),
    Float(f32),
    String(String),
}

impl From<i64> for Property {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f32> for Property {
    fn from(value: f32) -> Self {
        Self::Float(value)
    }
}

impl From<String> for Property {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for Property {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}
