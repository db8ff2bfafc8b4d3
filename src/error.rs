use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

/// The result type used in the entire crate.
pub type Result<T> = std::result::Result<T, TrainErr>;

/// The training session's error type.
#[derive(Debug)]
pub enum TrainErr {
    /// Bad construction inputs: missing or malformed model, incompatible parameters.
    Configuration(String),
    /// None of the supplied execution providers can host a graph.
    Provider {
        graph: &'static str,
        tried: Vec<String>,
    },
    /// The feature needed by the operation was not configured.
    UnsupportedOperation(&'static str),
    /// The learning rate scheduler was already registered.
    AlreadyRegistered,
    /// The execution of a graph failed.
    GraphExecution(String),
    /// An introspection index was out of bounds.
    IndexOutOfRange { index: usize, len: usize },
    /// A caller supplied buffer doesn't match the expected size.
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    /// A required piece of state was never set.
    Precondition(&'static str),
    /// A caller supplied argument is invalid.
    InvalidArgument(String),
    Io(io::Error),
    Serialization(serde_json::Error),
}

impl Display for TrainErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrainErr::Configuration(msg) => write!(f, "invalid configuration: {msg}"),
            TrainErr::Provider { graph, tried } => write!(
                f,
                "no execution provider can host the {graph} graph, tried [{}]",
                tried.join(", ")
            ),
            TrainErr::UnsupportedOperation(msg) => write!(f, "unsupported operation: {msg}"),
            TrainErr::AlreadyRegistered => {
                f.write_str("a learning rate scheduler is already registered")
            }
            TrainErr::GraphExecution(msg) => write!(f, "graph execution failed: {msg}"),
            TrainErr::IndexOutOfRange { index, len } => {
                write!(f, "index {index} is out of range for length {len}")
            }
            TrainErr::SizeMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "size mismatch for {what}: got {got}, expected {expected}"
            ),
            TrainErr::Precondition(msg) => write!(f, "precondition failed: {msg}"),
            TrainErr::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            TrainErr::Io(e) => write!(f, "io error: {e}"),
            TrainErr::Serialization(e) => write!(f, "serialization error: {e}"),
        }
    }
}

impl Error for TrainErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TrainErr::Io(e) => Some(e),
            TrainErr::Serialization(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for TrainErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for TrainErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}
