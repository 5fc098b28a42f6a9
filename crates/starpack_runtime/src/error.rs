//! Error types reported by the runtime
//!
//! Every public operation returns [`RuntimeError`]. Errors are `Clone` so a
//! caller that caches the outcome of executing a module (the bundler's loader
//! does) can hand the same failure out again without re-running anything.

use std::{error::Error as StdError, fmt, sync::Arc};

use thiserror::Error;

/// Result alias used throughout the runtime
pub type Result<T, E = RuntimeError> = std::result::Result<T, E>;

/// Error type for failures raised by a [`Loader`](crate::Loader) implementation
pub type LoadCause = Arc<dyn StdError + Send + Sync + 'static>;

/// Classification of an execution failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Reference to a name that is bound nowhere
    Name,
    /// Operation applied to a value of the wrong type
    Type,
    /// Right type, unacceptable value (division by zero, overflow, bad literal)
    Value,
    /// Missing dict key, out-of-range index, or missing loaded symbol
    Lookup,
    /// Mutation of a frozen value
    Frozen,
    /// Recursive call without the recursion dialect flag, or stack exhaustion
    Recursion,
    /// A `load` statement could not be satisfied
    Load,
    /// Explicit call to `fail()`
    Fail,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Name => "name error",
            Self::Type => "type error",
            Self::Value => "value error",
            Self::Lookup => "lookup error",
            Self::Frozen => "frozen value error",
            Self::Recursion => "recursion error",
            Self::Load => "load error",
            Self::Fail => "fail",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Error)]
pub enum RuntimeError {
    /// Malformed source text
    #[error("{path}:{line}:{column}: {message}")]
    Parse {
        path: String,
        line: usize,
        column: usize,
        message: String,
    },

    /// Syntactically valid source that the dialect does not accept
    #[error("{path}: {message}")]
    Compile { path: String, message: String },

    /// Failure raised while executing a program
    #[error("{kind}: {message}{}", format_stack(.stack))]
    Execution {
        kind: ErrorKind,
        message: String,
        /// Active functions, outermost first
        stack: Vec<String>,
        #[source]
        cause: Option<LoadCause>,
    },

    /// A compiled artifact that cannot be decoded
    #[error("invalid artifact: {0}")]
    Artifact(String),

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: Arc<std::io::Error>,
    },
}

impl RuntimeError {
    /// Wrap a loader failure for the module named in a `load` statement
    pub fn load(module: &str, cause: impl StdError + Send + Sync + 'static) -> Self {
        Self::Execution {
            kind: ErrorKind::Load,
            message: format!("cannot load {module}"),
            stack: Vec::new(),
            cause: Some(Arc::new(cause)),
        }
    }

    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source: Arc::new(source),
        }
    }

    /// The execution error kind, if this is an execution failure
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Execution { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// The loader failure behind a `load` error, ready to downcast
    pub fn load_cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        match self {
            Self::Execution { cause, .. } => cause.as_deref(),
            _ => None,
        }
    }
}

fn format_stack(stack: &[String]) -> String {
    if stack.is_empty() {
        String::new()
    } else {
        format!(" (in {})", stack.join(" -> "))
    }
}

/// Error raised inside the evaluator before the call stack is attached
#[derive(Debug, Clone)]
pub(crate) struct EvalError {
    pub(crate) kind: ErrorKind,
    pub(crate) message: String,
    /// Innermost function first; reversed when converted
    pub(crate) frames: Vec<String>,
    pub(crate) cause: Option<LoadCause>,
}

impl EvalError {
    pub(crate) fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            frames: Vec::new(),
            cause: None,
        }
    }

    pub(crate) fn name(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Name, message)
    }

    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Type, message)
    }

    pub(crate) fn value(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Value, message)
    }

    pub(crate) fn lookup(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Lookup, message)
    }

    pub(crate) fn frozen(type_name: &str) -> Self {
        Self::new(
            ErrorKind::Frozen,
            format!("cannot modify frozen {type_name} value"),
        )
    }

    /// Record that the error propagated out of `function`
    pub(crate) fn in_function(mut self, function: &str) -> Self {
        self.frames.push(function.to_owned());
        self
    }
}

impl From<EvalError> for RuntimeError {
    fn from(err: EvalError) -> Self {
        let mut stack = err.frames;
        stack.reverse();
        Self::Execution {
            kind: err.kind,
            message: err.message,
            stack,
            cause: err.cause,
        }
    }
}

impl From<RuntimeError> for EvalError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::Execution {
                kind,
                message,
                mut stack,
                cause,
            } => {
                stack.reverse();
                Self {
                    kind,
                    message,
                    frames: stack,
                    cause,
                }
            }
            other => Self::new(ErrorKind::Load, other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_error_display_includes_stack() {
        let err: RuntimeError = EvalError::lookup("key \"x\" not in dict")
            .in_function("inner")
            .in_function("outer")
            .into();
        assert_eq!(
            err.to_string(),
            "lookup error: key \"x\" not in dict (in outer -> inner)"
        );
        assert_eq!(err.kind(), Some(ErrorKind::Lookup));
    }

    #[test]
    fn test_load_error_keeps_cause() {
        let cause = std::io::Error::other("boom");
        let err = RuntimeError::load("geo", cause);
        assert_eq!(err.to_string(), "load error: cannot load geo");
        let source = StdError::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("boom"));
        let cause = err
            .load_cause()
            .and_then(|cause| cause.downcast_ref::<std::io::Error>());
        assert!(cause.is_some());
    }
}
