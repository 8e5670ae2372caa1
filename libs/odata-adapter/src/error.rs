/// Unified error type for the `OData` adaptation layer.
///
/// Every variant is raised synchronously at the point of misuse or malformation.
/// Nothing here is retried internally.
///
/// ## Caller guidance
///
/// - `MissingFieldContext` and `InvalidArgument` are programming errors to fix at the call site.
/// - `MalformedResponse` is fatal for that single response; `body` holds the raw payload.
/// - `UnsupportedValue` comes from literal encoding and surfaces through the filter builder.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("`{operation}` requires a field; call `field()` or `func()` first")]
    MissingFieldContext { operation: &'static str },

    #[error("unsupported literal value: {0}")]
    UnsupportedValue(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("malformed OData response: {reason}")]
    MalformedResponse { reason: String, body: String },
}

impl Error {
    pub(crate) fn malformed(reason: impl Into<String>, body: impl Into<String>) -> Self {
        Self::MalformedResponse {
            reason: reason.into(),
            body: body.into(),
        }
    }

    /// Raw response body attached to a `MalformedResponse`, if any.
    #[must_use]
    pub fn raw_body(&self) -> Option<&str> {
        match self {
            Self::MalformedResponse { body, .. } => Some(body),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
