//! Errors raised while bundling
//!
//! Loader outcomes are cached, so every variant is `Clone`. A failure deep in
//! the load graph reaches the caller wrapped once per importing module: the
//! runtime turns a failed `load` into an execution error of the importer,
//! carrying the original [`BundleError`] as its cause.

use std::{io, path::PathBuf, sync::Arc};

use starpack_runtime::{ErrorKind, RuntimeError};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum BundleError {
    /// The module source is malformed or rejected by the dialect
    #[error("cannot compile module {module}")]
    Parse {
        module: String,
        #[source]
        source: RuntimeError,
    },

    /// The module's top-level code failed while it was being loaded
    #[error("module {module} failed to execute")]
    Execution {
        module: String,
        #[source]
        source: RuntimeError,
    },

    /// `module` was requested while it was still being loaded
    #[error("cycle in load graph: {}", chain.join(" -> "))]
    Cycle { module: String, chain: Vec<String> },

    #[error("{0}")]
    Configuration(String),

    /// The assembled program could not be compiled or written
    #[error("cannot produce artifact {}", path.display())]
    Artifact {
        path: PathBuf,
        #[source]
        source: RuntimeError,
    },

    #[error("{context} {}", path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: Arc<io::Error>,
    },
}

impl BundleError {
    pub(crate) fn io(context: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            context,
            path: path.into(),
            source: Arc::new(source),
        }
    }

    /// The module this error was raised for, if any
    pub fn module(&self) -> Option<&str> {
        match self {
            Self::Parse { module, .. } | Self::Execution { module, .. } | Self::Cycle { module, .. } => {
                Some(module)
            }
            Self::Configuration(_) | Self::Artifact { .. } | Self::Io { .. } => None,
        }
    }

    /// The load cycle behind this error, looking through importers' failures
    pub fn cycle(&self) -> Option<&[String]> {
        match self {
            Self::Cycle { chain, .. } => Some(chain),
            Self::Parse { source, .. } | Self::Execution { source, .. } => source
                .load_cause()
                .and_then(|cause| cause.downcast_ref::<Self>())
                .and_then(Self::cycle),
            Self::Configuration(_) | Self::Artifact { .. } | Self::Io { .. } => None,
        }
    }

    /// Kind of the runtime failure that stopped a module, if it was one
    pub fn runtime_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Execution { source, .. } => source.kind(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_cycle_display_names_chain() {
        let err = BundleError::Cycle {
            module: "a".to_owned(),
            chain: vec!["a".to_owned(), "b".to_owned(), "a".to_owned()],
        };
        assert_eq!(err.to_string(), "cycle in load graph: a -> b -> a");
        assert_eq!(err.module(), Some("a"));
    }

    #[test]
    fn test_cycle_is_found_through_importers() {
        let cycle = BundleError::Cycle {
            module: "a".to_owned(),
            chain: vec!["a".to_owned(), "b".to_owned(), "a".to_owned()],
        };
        let inner = BundleError::Execution {
            module: "b".to_owned(),
            source: RuntimeError::load("a", cycle),
        };
        let outer = BundleError::Execution {
            module: "a".to_owned(),
            source: RuntimeError::load("b", inner),
        };

        assert_eq!(
            outer.cycle(),
            Some(&["a".to_owned(), "b".to_owned(), "a".to_owned()][..])
        );
        assert_eq!(outer.runtime_kind(), Some(ErrorKind::Load));
    }

    #[test]
    fn test_configuration_error_has_no_cycle() {
        let err = BundleError::Configuration("missing suffix".to_owned());
        assert!(err.cycle().is_none());
        assert!(err.module().is_none());
    }
}
