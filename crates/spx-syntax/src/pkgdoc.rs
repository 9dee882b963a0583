//! Documentation index over a merged package.

use crate::ast::{AstPackage, Decl};

/// Documentation extracted from a merged package: the package name, its doc
/// comment, and one entry per documented-or-not top-level declaration.
///
/// Shadow entries are synthetic and never appear here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkgDoc {
    pub name: String,
    pub doc: Option<String>,
    pub funcs: Vec<FuncDoc>,
    pub vars: Vec<VarDoc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncDoc {
    pub name: String,
    pub doc: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarDoc {
    pub name: String,
    pub doc: Option<String>,
}

/// Build the documentation index for `pkg`.
///
/// Declarations are listed in name order; the package doc comes from the
/// first file (in path order) that carries one.
pub fn pkg_doc(pkg: &AstPackage) -> PkgDoc {
    let mut funcs = Vec::new();
    let mut vars = Vec::new();
    let mut doc = None;

    for file in pkg.files.values() {
        if doc.is_none() {
            doc = file.doc.clone();
        }
        for decl in &file.decls {
            match decl {
                Decl::Func(f) => funcs.push(FuncDoc {
                    name: f.name.name.clone(),
                    doc: f.doc.clone(),
                }),
                Decl::Var(v) => vars.push(VarDoc {
                    name: v.name.name.clone(),
                    doc: v.doc.clone(),
                }),
            }
        }
    }

    funcs.sort_by(|a, b| a.name.cmp(&b.name));
    vars.sort_by(|a, b| a.name.cmp(&b.name));

    PkgDoc {
        name: pkg.name.clone(),
        doc,
        funcs,
        vars,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use super::*;
    use crate::ast::merge_package;
    use crate::parse_file;

    fn package(sources: &[(&str, &str)]) -> AstPackage {
        let files: BTreeMap<_, _> = sources
            .iter()
            .map(|(path, src)| {
                (
                    path.to_string(),
                    Arc::new(parse_file(path, src).unwrap()),
                )
            })
            .collect();
        merge_package(files)
    }

    #[test]
    fn shadow_entry_is_not_documented() {
        let pkg = package(&[("main.spx", "echo 100")]);
        let doc = pkg_doc(&pkg);
        assert_eq!(doc.name, "main");
        assert!(doc.funcs.is_empty());
        assert!(doc.vars.is_empty());
    }

    #[test]
    fn decls_are_indexed_in_name_order() {
        let pkg = package(&[(
            "lib.gop",
            "// B does b things.\nfunc b() {}\n\n// A does a things.\nfunc a() {}\n\nvar n = 1\n",
        )]);
        let doc = pkg_doc(&pkg);
        let names: Vec<_> = doc.funcs.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(doc.funcs[0].doc.as_deref(), Some("A does a things."));
        assert_eq!(doc.vars.len(), 1);
        assert_eq!(doc.vars[0].doc, None);
    }
}
