use std::sync::Arc;

use spx_syntax::ParseError;

pub type Result<T> = std::result::Result<T, ProjectError>;

/// Errors surfaced by the project cache and its builders.
///
/// The first three variants are API sentinels callers routinely match on.
/// Builder failures are cached alongside their entry until the next
/// invalidation, so every variant is cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProjectError {
    #[error("file does not exist")]
    NotFound,

    #[error("file already exists")]
    AlreadyExists,

    /// The requested kind is not registered, its feature bit is unset, or it
    /// was requested through the wrong-scope accessor.
    #[error("unknown kind")]
    UnknownKind,

    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A builder failure that carries only a message.
    #[error("{0}")]
    Build(Arc<str>),
}

impl ProjectError {
    pub fn build(message: impl Into<String>) -> Self {
        ProjectError::Build(message.into().into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ProjectError::NotFound)
    }

    pub fn is_unknown_kind(&self) -> bool {
        matches!(self, ProjectError::UnknownKind)
    }
}
