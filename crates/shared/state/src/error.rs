//! Error types for the state tree

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StateError {
    #[error("unknown property: {0}")]
    UnknownProperty(String),

    #[error("property is not writable: {0}")]
    NotWritable(String),

    #[error("type mismatch for {name}: expected {expected}, got {got}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        got: String,
    },

    #[error("value for {name} out of range: {value}")]
    OutOfRange { name: String, value: f64 },

    #[error("unknown enumeration value for {name}: {value}")]
    UnknownVariant { name: String, value: String },

    #[error("expected a nested state object for {0}")]
    NotAnObject(String),

    #[error("collection membership is fixed: {0}")]
    StaticCollection(String),

    #[error("{path}: {source}")]
    At {
        path: String,
        #[source]
        source: Box<StateError>,
    },

    #[error("{0}")]
    Failed(String),
}

impl StateError {
    /// Wrap an error with the key it occurred under, so a composite apply
    /// reports the failing key path.
    pub fn at(path: &str, source: StateError) -> StateError {
        StateError::At {
            path: path.to_string(),
            source: Box::new(source),
        }
    }
}

/// Short tag of a JSON value's type, for error messages.
pub(crate) fn json_type(value: &crate::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
