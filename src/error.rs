use std::fmt::Display;

use thiserror::Error;

/// Errors raised by the codec, the builder and the plugin pipeline.
///
/// Parsing and stringifying only ever fail for the parameter limit guard;
/// every other malformed input degrades to its raw text instead.
#[derive(Debug, Error)]
pub enum Error {
    /// The query string held more `delimiter`-separated pairs than allowed.
    #[error("Parameter limit exceeded. Maximum allowed: {limit}")]
    ParameterLimitExceeded { limit: usize },

    /// Custom message, usually raised from a serde implementation.
    #[error("{0}")]
    Custom(String),

    #[error("json conversion failed: {0}")]
    Json(#[from] serde_json::Error),

    /// A builder operation was handed a value of the wrong shape.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("No base URL provided")]
    MissingBaseUrl,

    #[error("Query validation failed{}", display_reason(.0))]
    QueryValidation(String),

    #[error("plugin error: {0}")]
    Plugin(String),

    #[error("cannot derive a new shape from an object schema without a shape")]
    MissingShape,

    #[error("Security validation failed: {}", .0.join(", "))]
    Security(Vec<String>),
}

fn display_reason(reason: &str) -> String {
    if reason.is_empty() {
        String::new()
    } else {
        format!(": {reason}")
    }
}

impl Error {
    /// Generate a custom error from any displayable message.
    pub fn custom<T: Display>(msg: T) -> Self {
        Error::Custom(msg.to_string())
    }
}

impl serde::de::Error for Error {
    fn custom<T>(msg: T) -> Self
    where
        T: Display,
    {
        Error::Custom(msg.to_string())
    }
}

impl serde::ser::Error for Error {
    fn custom<T>(msg: T) -> Self
    where
        T: Display,
    {
        Error::Custom(msg.to_string())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A failed schema check.
///
/// The message is human readable and names the expected shape or value,
/// e.g. `String must be at least 2 characters`.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Prefix the message with context from an enclosing schema.
    pub(crate) fn context(self, prefix: impl Display) -> Self {
        Self {
            message: format!("{prefix}: {}", self.message),
        }
    }
}
