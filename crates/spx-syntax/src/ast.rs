//! AST model for spx source files and merged packages.
//!
//! Nodes own their text and spans; they carry no back-references to the
//! project that produced them, so a parsed file can be shared freely between
//! a live project and its snapshots.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::TextRange;

#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: TextRange,
}

impl Ident {
    pub fn new(name: impl Into<String>, span: TextRange) -> Self {
        Self {
            name: name.into(),
            span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Lit {
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Ident(Ident),
    Lit {
        value: Lit,
        span: TextRange,
    },
    Call(CallExpr),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        span: TextRange,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        span: TextRange,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
}

impl Expr {
    pub fn span(&self) -> TextRange {
        match self {
            Expr::Ident(id) => id.span,
            Expr::Lit { span, .. } => *span,
            Expr::Call(call) => call.span,
            Expr::Unary { span, .. } => *span,
            Expr::Binary { span, .. } => *span,
        }
    }
}

/// A call expression. `command` is set for command-style calls written
/// without parentheses (`echo 100`), the dialect's signature statement form.
#[derive(Debug, Clone, PartialEq)]
pub struct CallExpr {
    pub callee: Ident,
    pub args: Vec<Expr>,
    pub command: bool,
    pub span: TextRange,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expr(Expr),
    Var(VarDecl),
    Assign(AssignStmt),
}

impl Stmt {
    pub fn span(&self) -> TextRange {
        match self {
            Stmt::Expr(e) => e.span(),
            Stmt::Var(v) => v.span,
            Stmt::Assign(a) => a.span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssignStmt {
    pub target: Ident,
    pub value: Expr,
    pub span: TextRange,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub doc: Option<String>,
    pub name: Ident,
    pub init: Option<Expr>,
    pub span: TextRange,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub list: Vec<Stmt>,
    pub span: TextRange,
}

/// A function declaration.
///
/// `shadow` marks the synthetic `main` wrapper holding a file's free-standing
/// statements; it has no doc comment and an empty span.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncDecl {
    pub doc: Option<String>,
    pub name: Ident,
    pub params: Vec<Ident>,
    pub body: Block,
    pub shadow: bool,
    pub span: TextRange,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    Func(FuncDecl),
    Var(VarDecl),
}

impl Decl {
    pub fn name(&self) -> &str {
        match self {
            Decl::Func(f) => &f.name.name,
            Decl::Var(v) => &v.name.name,
        }
    }
}

/// A fully parsed source file.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub path: String,
    /// Explicit `package` clause, if any.
    pub package: Option<Ident>,
    /// Doc comment attached to the package clause.
    pub doc: Option<String>,
    pub decls: Vec<Decl>,
    /// Synthetic `main` wrapping the file's free-standing statements.
    pub shadow_entry: Option<FuncDecl>,
    /// Whether this file is a class file (`.spx`): its loose statements are
    /// methods of a game class rather than plain script statements.
    pub is_class: bool,
}

impl SourceFile {
    pub fn package_name(&self) -> Option<&str> {
        self.package.as_ref().map(|id| id.name.as_str())
    }
}

/// A package merged from one or more parsed files, keyed by path.
///
/// The map is ordered, which gives package-level consumers a deterministic
/// lexicographic iteration order.
#[derive(Debug, Clone, PartialEq)]
pub struct AstPackage {
    pub name: String,
    pub files: BTreeMap<String, Arc<SourceFile>>,
}

/// Merge parsed files into a package.
///
/// The package name is the first explicit `package` clause in path order;
/// files without one contribute to the conventional `"main"` package.
pub fn merge_package(files: BTreeMap<String, Arc<SourceFile>>) -> AstPackage {
    let name = files
        .values()
        .find_map(|f| f.package_name().map(str::to_string))
        .unwrap_or_else(|| "main".to_string());
    AstPackage { name, files }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_file;

    #[test]
    fn merge_defaults_to_main() {
        let mut files = BTreeMap::new();
        files.insert(
            "a.spx".to_string(),
            Arc::new(parse_file("a.spx", "echo 1").unwrap()),
        );
        files.insert(
            "b.spx".to_string(),
            Arc::new(parse_file("b.spx", "echo 2").unwrap()),
        );
        let pkg = merge_package(files);
        assert_eq!(pkg.name, "main");
        assert_eq!(pkg.files.len(), 2);
    }

    #[test]
    fn merge_uses_first_explicit_package_clause() {
        let mut files = BTreeMap::new();
        files.insert(
            "z.gop".to_string(),
            Arc::new(parse_file("z.gop", "package demo\necho 1").unwrap()),
        );
        files.insert(
            "a.gop".to_string(),
            Arc::new(parse_file("a.gop", "echo 2").unwrap()),
        );
        // `a.gop` sorts first but has no clause; the name comes from `z.gop`.
        let pkg = merge_package(files);
        assert_eq!(pkg.name, "demo");
    }
}
