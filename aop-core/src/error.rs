//! Error types for the AOP runtime.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// Errors that can occur while building an advice chain, dispatching an
/// invocation, or running advice/original-method code.
///
/// Mirrors the error handling design's three-way taxonomy: structural
/// problems discovered at generation/first-dispatch time
/// (`ConfigurationError`), advice applied to a shape it cannot handle
/// (`UnsupportedOperation`), and failures propagated from user code
/// (`UserError`).
#[derive(Debug, Clone)]
pub enum AspectError {
    /// Structural problem in annotations or registration: a non-overridable
    /// method, an open generic type, conflicting annotation forms, a
    /// missing instance provider, an empty advice/type list, and so on.
    ConfigurationError {
        /// Human-readable description of the problem.
        message: String,
    },

    /// An advice was applied to a joinpoint shape it does not support, for
    /// example an async advice adapter applied to a synchronous method, or
    /// a direct `apply` call on a bundle annotation.
    UnsupportedOperation {
        /// Human-readable description of the problem.
        message: String,
    },

    /// An error raised by an advice body or by the original method
    /// implementation. Held behind an `Arc` so `Invocation::exception` can
    /// retain a snapshot of the failure while the original error is still
    /// returned up the call stack.
    UserError {
        /// The underlying error.
        source: Arc<dyn Error + Send + Sync>,
    },
}

impl AspectError {
    /// Build a `ConfigurationError`.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::ConfigurationError {
            message: message.into(),
        }
    }

    /// Build an `UnsupportedOperation`.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedOperation {
            message: message.into(),
        }
    }

    /// Wrap an arbitrary error as a `UserError`.
    pub fn user(error: impl Error + Send + Sync + 'static) -> Self {
        Self::UserError {
            source: Arc::new(error),
        }
    }

    /// True for a `UserError`, i.e. one that originated from an advice
    /// body or the original method rather than from chain construction.
    pub fn is_user_error(&self) -> bool {
        matches!(self, Self::UserError { .. })
    }
}

impl fmt::Display for AspectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigurationError { message } => write!(f, "configuration error: {message}"),
            Self::UnsupportedOperation { message } => {
                write!(f, "unsupported operation: {message}")
            }
            Self::UserError { source } => write!(f, "{source}"),
        }
    }
}

impl Error for AspectError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::UserError { source } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<String> for AspectError {
    fn from(message: String) -> Self {
        Self::UserError {
            source: Arc::new(StringError(message)),
        }
    }
}

impl From<&str> for AspectError {
    fn from(message: &str) -> Self {
        Self::from(message.to_string())
    }
}

/// Adapts a plain `String` into `std::error::Error` so advice bodies
/// returning `Result<_, String>` compose with `AspectError::from`.
#[derive(Debug, Clone)]
struct StringError(String);

impl fmt::Display for StringError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Error for StringError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn configuration_error_display() {
        let err = AspectError::configuration("method not overridable");
        assert!(matches!(err, AspectError::ConfigurationError { .. }));
        assert_eq!(
            err.to_string(),
            "configuration error: method not overridable"
        );
    }

    #[test]
    fn user_error_preserves_source() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err = AspectError::user(io_err);
        assert!(err.is_user_error());
        assert!(err.source().is_some());
    }

    #[test]
    fn from_string() {
        let err: AspectError = "boom".into();
        assert!(err.is_user_error());
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn clone_preserves_variant() {
        let err = AspectError::unsupported("async advice on sync method");
        let cloned = err.clone();
        assert!(matches!(cloned, AspectError::UnsupportedOperation { .. }));
    }
}
