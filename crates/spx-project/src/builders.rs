//! The standard artifact kinds and their builders.
//!
//! Dependencies resolve by re-entering the cache through the read view:
//! `pkgdoc` and `typeinfo` ask for the merged package, which in turn asks
//! for the per-file syntax trees, so shared work is never duplicated.

use std::collections::BTreeMap;
use std::sync::Arc;

use spx_syntax::ast::merge_package;
use spx_syntax::{parse_file, pkg_doc};
use spx_types::{check_package, CheckOptions};

use crate::error::{ProjectError, Result};
use crate::kind::{Artifact, Features, KindRegistry, KindScope};
use crate::project::ProjectView;

/// Parsed syntax of a single source file. File scope; `Arc<SourceFile>`.
pub const KIND_AST: &str = "ast";
/// Merged package over all source files. Project scope; `Arc<AstPackage>`.
pub const KIND_AST_PACKAGE: &str = "astpkg";
/// Type-checking result over the merged package. Project scope;
/// `Arc<TypeInfo>`.
pub const KIND_TYPE_INFO: &str = "typeinfo";
/// Documentation index over the merged package. Project scope;
/// `Arc<PkgDoc>`.
pub const KIND_PKG_DOC: &str = "pkgdoc";

/// The registry used when a project is constructed without a custom one.
pub fn default_registry() -> KindRegistry {
    let mut registry = KindRegistry::new();
    registry.register(KIND_AST, KindScope::File, Features::AST, Arc::new(build_ast));
    registry.register(
        KIND_AST_PACKAGE,
        KindScope::Project,
        Features::AST_PACKAGE,
        Arc::new(build_ast_package),
    );
    registry.register(
        KIND_TYPE_INFO,
        KindScope::Project,
        Features::TYPE_INFO,
        Arc::new(build_type_info),
    );
    registry.register(
        KIND_PKG_DOC,
        KindScope::Project,
        Features::PKG_DOC,
        Arc::new(build_pkg_doc),
    );
    registry
}

fn build_ast(view: ProjectView<'_>, path: &str) -> Result<Artifact> {
    let file = view.get_file(path)?;
    let source = std::str::from_utf8(file.content())
        .map_err(|_| ProjectError::build(format!("{path}: source is not valid UTF-8")))?;
    let parsed = parse_file(path, source)?;
    Ok(Arc::new(parsed))
}

fn build_ast_package(view: ProjectView<'_>, _key: &str) -> Result<Artifact> {
    let files: BTreeMap<_, _> = view.ast_files()?.into_iter().collect();
    Ok(Arc::new(merge_package(files)))
}

fn build_type_info(view: ProjectView<'_>, _key: &str) -> Result<Artifact> {
    let pkg = view.ast_package()?;
    // Framework resolution belongs to the resource-set loader; the default
    // project checks without an importer.
    let info = check_package(&pkg, &CheckOptions::default());
    Ok(Arc::new(info))
}

fn build_pkg_doc(view: ProjectView<'_>, _key: &str) -> Result<Artifact> {
    let pkg = view.ast_package()?;
    Ok(Arc::new(pkg_doc(&pkg)))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::file::MemFile;
    use crate::project::Project;

    #[test]
    fn pkg_doc_builder_reports_disabled_package_kind_by_message() {
        let mut files = HashMap::new();
        files.insert("main.spx".to_string(), MemFile::new("echo 100"));
        let proj = Project::new(None, files, Features::NONE);

        // The merged-package dependency is feature-gated too; its failure
        // reaches this builder as a message-only error, not the sentinel.
        let err = build_pkg_doc(ProjectView { project: &proj }, "").unwrap_err();
        assert!(!err.is_unknown_kind());
        assert_eq!(err.to_string(), "unknown kind");
    }

    #[test]
    fn ast_builder_rejects_non_utf8_content() {
        let mut files = HashMap::new();
        files.insert("main.spx".to_string(), MemFile::new(vec![0xff, 0xfe]));
        let proj = Project::new(None, files, Features::ALL);

        let err = proj.ast("main.spx").unwrap_err();
        assert!(err.to_string().contains("not valid UTF-8"));
    }
}
