use std::sync::Arc;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RegistryError>;

/// An error produced by user code (build, validate or close functions),
/// shared so a recorded failure can be surfaced more than once.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync + 'static>;

pub(crate) fn share(err: anyhow::Error) -> SharedError {
    let boxed: Box<dyn std::error::Error + Send + Sync + 'static> = err.into();
    Arc::from(boxed)
}

#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    #[error("{name}: definition not found")]
    DefinitionNotFound { name: String },

    #[error("{name}: definition already registered")]
    DefinitionExists { name: String },

    #[error("definition name must not be empty")]
    EmptyName,

    #[error("{name}: definition build function is missing")]
    BuildFunctionMissing { name: String },

    #[error("{name}: validation failed: {source}")]
    ValidationFailed {
        name: String,
        #[source]
        source: SharedError,
    },

    #[error("{name}: build failed: {source}")]
    BuildFailed {
        name: String,
        #[source]
        source: SharedError,
    },

    /// The build function panicked; the definition stays failed.
    #[error("{name}: build aborted before completion")]
    BuildAborted { name: String },

    #[error("{name}: close failed: {source}")]
    CloseFailed {
        name: String,
        #[source]
        source: SharedError,
    },

    #[error("{name}: failed to downcast to {type_name}")]
    DowncastFailed {
        name: String,
        type_name: &'static str,
    },

    #[error("Circular dependency detected: {cycle}")]
    CircularDependency { cycle: String },

    #[error("{}", join_messages(.0))]
    Multiple(Vec<RegistryError>),
}

impl RegistryError {
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::DefinitionNotFound { name: name.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::DefinitionNotFound { .. })
    }

    /// Folds a list of errors into one, `None` when the list is empty.
    pub fn join(mut errors: Vec<RegistryError>) -> Option<Self> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(Self::Multiple(errors)),
        }
    }
}

fn join_messages(errors: &[RegistryError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}
