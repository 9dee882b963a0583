use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::sync::Arc;

use crate::error::Result;
use crate::project::ProjectView;

/// A derived artifact, shared between the cache and all readers.
pub type Artifact = Arc<dyn Any + Send + Sync>;

/// Builds the artifact for a `(kind, key)` slot.
///
/// File-scope builders receive the path as the key; project-scope builders
/// receive an empty string. A builder must not mutate the project it was
/// handed, and a file-scope builder must depend only on the keyed file;
/// that contract is what lets invalidation stay per-path for file kinds.
/// Builders may re-enter the cache through the view for other kinds;
/// dependency cycles deadlock and are a programming error.
pub type Builder = Arc<dyn Fn(ProjectView<'_>, &str) -> Result<Artifact> + Send + Sync>;

/// Whether a kind produces one artifact per file or one per project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindScope {
    File,
    Project,
}

/// Bitset selecting which registered kinds are active in a project.
///
/// Requests for a kind whose bit is unset short-circuit to
/// [`crate::ProjectError::UnknownKind`] without invoking the builder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Features(u32);

impl Features {
    pub const NONE: Features = Features(0);
    pub const AST: Features = Features(1 << 0);
    pub const AST_PACKAGE: Features = Features(1 << 1);
    pub const TYPE_INFO: Features = Features(1 << 2);
    pub const PKG_DOC: Features = Features(1 << 3);
    pub const ALL: Features = Features(u32::MAX);

    /// The n-th feature bit. Bits 0–7 are reserved for built-in kinds;
    /// custom kinds should use 8 and up.
    pub const fn bit(n: u32) -> Features {
        Features(1 << n)
    }

    pub const fn contains(self, other: Features) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Features {
    type Output = Features;

    fn bitor(self, rhs: Features) -> Features {
        Features(self.0 | rhs.0)
    }
}

impl BitOrAssign for Features {
    fn bitor_assign(&mut self, rhs: Features) {
        self.0 |= rhs.0;
    }
}

/// A registered kind: its scope, feature bit, and builder.
#[derive(Clone)]
pub struct KindSpec {
    pub scope: KindScope,
    pub feature: Features,
    pub builder: Builder,
}

impl fmt::Debug for KindSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KindSpec")
            .field("scope", &self.scope)
            .field("feature", &self.feature)
            .finish_non_exhaustive()
    }
}

/// The recognized artifact kinds of a project.
///
/// The registry is populated at construction and fixed for the lifetime of
/// the project; all projects cloned from it via snapshots share it.
#[derive(Debug, Default)]
pub struct KindRegistry {
    kinds: HashMap<String, KindSpec>,
}

impl KindRegistry {
    /// An empty registry. Use [`crate::default_registry`] for the standard
    /// kinds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `kind`, replacing any previous registration under that name.
    pub fn register(
        &mut self,
        kind: impl Into<String>,
        scope: KindScope,
        feature: Features,
        builder: Builder,
    ) {
        self.kinds.insert(
            kind.into(),
            KindSpec {
                scope,
                feature,
                builder,
            },
        );
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.kinds.contains_key(kind)
    }

    pub(crate) fn get(&self, kind: &str) -> Option<&KindSpec> {
        self.kinds.get(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_mask_containment() {
        let mask = Features::AST | Features::PKG_DOC;
        assert!(mask.contains(Features::AST));
        assert!(mask.contains(Features::PKG_DOC));
        assert!(!mask.contains(Features::TYPE_INFO));
        assert!(Features::ALL.contains(mask));
        assert!(Features::NONE.is_empty());
    }

    #[test]
    fn custom_bits_do_not_collide_with_builtins() {
        let custom = Features::bit(8);
        assert!(!custom.contains(Features::AST));
        assert!(Features::ALL.contains(custom));
    }
}
