//! In-memory project model for spx language tooling.
//!
//! A [`Project`] holds the current file set of one project and lazily
//! derives, memoizes, and invalidates named *kinds* of artifacts over it:
//! per-file syntax trees, the merged package, type-checking results, and the
//! documentation index. The cache is built for many concurrent readers and
//! occasional writers:
//!
//! - builds are single-flight per `(kind, key)`: concurrent readers of a
//!   pending entry wait on its latch and share the published result;
//! - mutations invalidate exactly the affected entries (per-path for
//!   file-scope kinds, wholesale for project-scope kinds) before returning;
//! - [`Project::snapshot`] produces a consistent point-in-time view that
//!   shares file handles and built artifacts by reference.
//!
//! Kinds are registered up front in a [`KindRegistry`] and gated by the
//! project's [`Features`] mask; requesting a disabled or unregistered kind
//! reports [`ProjectError::UnknownKind`] without running anything.

mod builders;
mod cache;
mod error;
mod file;
mod kind;
mod project;

pub use builders::{
    default_registry, KIND_AST, KIND_AST_PACKAGE, KIND_PKG_DOC, KIND_TYPE_INFO,
};
pub use error::{ProjectError, Result};
pub use file::{same_file, File, FileContent, MemFile};
pub use kind::{Artifact, Builder, Features, KindRegistry, KindScope};
pub use project::{InitialFiles, Project, ProjectOptions, ProjectView};
