use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("cannot {operation} property '{key}' of {base}")]
    NotAnObject {
        operation: &'static str,
        key: String,
        base: &'static str,
    },

    #[error("{what} is not a function")]
    NotCallable { what: String },

    #[error("Array.prototype.{method} called on a non-array receiver")]
    NotAnArray { method: &'static str },

    #[error("invalid array length: {value}")]
    InvalidArrayLength { value: String },

    #[error("{message}")]
    Thrown { message: String },

    #[error("invalid configuration: {message}")]
    Config { message: String },
}

impl Error {
    /// Error raised by user code (callbacks, methods, comparators).
    #[must_use]
    pub fn thrown(message: impl Into<String>) -> Self {
        Self::Thrown {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn not_callable(what: impl Into<String>) -> Self {
        Self::NotCallable { what: what.into() }
    }

    #[must_use]
    pub fn not_an_object(operation: &'static str, key: impl ToString, base: &'static str) -> Self {
        Self::NotAnObject {
            operation,
            key: key.to_string(),
            base,
        }
    }

    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::config(err.to_string())
    }
}
