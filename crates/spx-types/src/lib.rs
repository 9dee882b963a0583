//! Best-effort type checking for merged spx packages.
//!
//! The checker is deliberately IDE-grade rather than a full language
//! implementation: it collects package-level symbols, infers types for the
//! small expression language the parser accepts, and records problems as
//! diagnostics instead of aborting. Checking always produces a usable
//! [`TypePackage`]; callers decide how much to care about the diagnostics.
//!
//! Class files (`.spx`) are methods of a game class supplied by the game
//! framework package. Resolving that package goes through the [`Importer`]
//! capability; when no importer is configured, checking a package that
//! contains class files records a resolution diagnostic per class file.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use spx_syntax::ast::{AstPackage, BinOp, Decl, Expr, FuncDecl, Lit, SourceFile, Stmt};
use spx_syntax::TextRange;

/// Import path of the game framework package class files depend on.
pub const FRAMEWORK_PACKAGE: &str = "spx";

#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Int,
    Float,
    Str,
    Unit,
    /// Unconstrained: untyped parameters and variadic builtin arguments.
    Any,
    Func(FuncType),
    /// The type of an expression that already produced a diagnostic.
    Invalid,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncType {
    pub params: Vec<Type>,
    pub variadic: bool,
    pub result: Box<Type>,
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Float => write!(f, "float"),
            Type::Str => write!(f, "string"),
            Type::Unit => write!(f, "()"),
            Type::Any => write!(f, "any"),
            Type::Func(_) => write!(f, "func"),
            Type::Invalid => write!(f, "<invalid>"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Func,
    Var,
    Builtin,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub ty: Type,
}

/// A flat name → symbol table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    symbols: BTreeMap<String, Symbol>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, symbol: Symbol) -> Option<Symbol> {
        self.symbols.insert(symbol.name.clone(), symbol)
    }

    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.symbols.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut Symbol> {
        self.symbols.get_mut(name)
    }
}

/// A checked package: name plus its package-level scope.
#[derive(Debug, Clone, PartialEq)]
pub struct TypePackage {
    name: String,
    scope: Scope,
}

impl TypePackage {
    pub fn new(name: impl Into<String>, scope: Scope) -> Self {
        Self {
            name: name.into(),
            scope,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub path: String,
    pub message: String,
    pub span: Option<TextRange>,
}

/// The result of checking a package: the checked package together with the
/// diagnostics recorded along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeInfo {
    package: TypePackage,
    diagnostics: Vec<Diagnostic>,
}

impl TypeInfo {
    pub fn package(&self) -> &TypePackage {
        &self.package
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn is_ok(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Resolves framework packages for class files.
pub trait Importer: Send + Sync {
    fn import(&self, path: &str) -> Option<Arc<TypePackage>>;
}

#[derive(Clone, Default)]
pub struct CheckOptions {
    pub importer: Option<Arc<dyn Importer>>,
}

impl fmt::Debug for CheckOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckOptions")
            .field("importer", &self.importer.is_some())
            .finish()
    }
}

/// Check a merged package.
pub fn check_package(pkg: &AstPackage, opts: &CheckOptions) -> TypeInfo {
    let mut checker = Checker {
        opts,
        universe: universe(),
        package: Scope::new(),
        diagnostics: Vec::new(),
    };
    checker.collect(pkg);
    checker.check(pkg);
    TypeInfo {
        package: TypePackage::new(pkg.name.clone(), checker.package),
        diagnostics: checker.diagnostics,
    }
}

struct Checker<'a> {
    opts: &'a CheckOptions,
    universe: Scope,
    package: Scope,
    diagnostics: Vec<Diagnostic>,
}

impl Checker<'_> {
    /// Pass 1: collect package-level declarations. Variable types start out
    /// as `Any` and are refined once initializers are checked.
    fn collect(&mut self, pkg: &AstPackage) {
        for file in pkg.files.values() {
            for decl in &file.decls {
                match decl {
                    Decl::Func(f) => {
                        let ty = Type::Func(FuncType {
                            params: vec![Type::Any; f.params.len()],
                            variadic: false,
                            result: Box::new(Type::Unit),
                        });
                        self.declare(file, &f.name.name, SymbolKind::Func, ty, f.name.span);
                    }
                    Decl::Var(v) => {
                        self.declare(file, &v.name.name, SymbolKind::Var, Type::Any, v.name.span);
                    }
                }
            }
            // The shadow entry is the package's `main` unless one was
            // declared explicitly.
            if file.shadow_entry.is_some() && self.package.lookup("main").is_none() {
                self.package.insert(Symbol {
                    name: "main".to_string(),
                    kind: SymbolKind::Func,
                    ty: Type::Func(FuncType {
                        params: Vec::new(),
                        variadic: false,
                        result: Box::new(Type::Unit),
                    }),
                });
            }
        }
    }

    fn declare(
        &mut self,
        file: &SourceFile,
        name: &str,
        kind: SymbolKind,
        ty: Type,
        span: TextRange,
    ) {
        if self.package.lookup(name).is_some() {
            self.diagnostics.push(Diagnostic {
                path: file.path.clone(),
                message: format!("{name} redeclared in this package"),
                span: Some(span),
            });
            return;
        }
        self.package.insert(Symbol {
            name: name.to_string(),
            kind,
            ty,
        });
    }

    /// Pass 2: resolve the class environment per file and check all bodies.
    fn check(&mut self, pkg: &AstPackage) {
        for file in pkg.files.values() {
            let class_env = self.resolve_class_env(file);

            for decl in &file.decls {
                match decl {
                    Decl::Var(v) => {
                        if let Some(init) = &v.init {
                            let ty = self.check_expr(file, class_env.as_deref(), &Scope::new(), init);
                            if let Some(sym) = self.package.get_mut(&v.name.name) {
                                sym.ty = ty;
                            }
                        }
                    }
                    Decl::Func(f) => self.check_func(file, class_env.as_deref(), f),
                }
            }
            if let Some(shadow) = &file.shadow_entry {
                self.check_func(file, class_env.as_deref(), shadow);
            }
        }
    }

    fn resolve_class_env(&mut self, file: &SourceFile) -> Option<Arc<TypePackage>> {
        if !file.is_class {
            return None;
        }
        let resolved = self
            .opts
            .importer
            .as_ref()
            .and_then(|imp| imp.import(FRAMEWORK_PACKAGE));
        if resolved.is_none() {
            self.diagnostics.push(Diagnostic {
                path: file.path.clone(),
                message: format!(
                    "cannot resolve game framework package {FRAMEWORK_PACKAGE:?}"
                ),
                span: None,
            });
        }
        resolved
    }

    fn check_func(&mut self, file: &SourceFile, class_env: Option<&TypePackage>, func: &FuncDecl) {
        let mut locals = Scope::new();
        for param in &func.params {
            locals.insert(Symbol {
                name: param.name.clone(),
                kind: SymbolKind::Var,
                ty: Type::Any,
            });
        }
        for stmt in &func.body.list {
            match stmt {
                Stmt::Expr(expr) => {
                    self.check_expr(file, class_env, &locals, expr);
                }
                Stmt::Var(v) => {
                    let ty = v
                        .init
                        .as_ref()
                        .map(|init| self.check_expr(file, class_env, &locals, init))
                        .unwrap_or(Type::Any);
                    locals.insert(Symbol {
                        name: v.name.name.clone(),
                        kind: SymbolKind::Var,
                        ty,
                    });
                }
                Stmt::Assign(assign) => {
                    if self
                        .resolve(class_env, &locals, &assign.target.name)
                        .is_none()
                    {
                        self.undefined(file, &assign.target.name, assign.target.span);
                    }
                    self.check_expr(file, class_env, &locals, &assign.value);
                }
            }
        }
    }

    fn check_expr(
        &mut self,
        file: &SourceFile,
        class_env: Option<&TypePackage>,
        locals: &Scope,
        expr: &Expr,
    ) -> Type {
        match expr {
            Expr::Lit { value, .. } => match value {
                Lit::Int(_) => Type::Int,
                Lit::Float(_) => Type::Float,
                Lit::Str(_) => Type::Str,
            },
            Expr::Ident(id) => match self.resolve(class_env, locals, &id.name) {
                Some(sym) => sym.ty.clone(),
                None => {
                    self.undefined(file, &id.name, id.span);
                    Type::Invalid
                }
            },
            Expr::Unary { operand, span, .. } => {
                let ty = self.check_expr(file, class_env, locals, operand);
                match ty {
                    Type::Int | Type::Float | Type::Any | Type::Invalid => ty,
                    other => {
                        self.diagnostics.push(Diagnostic {
                            path: file.path.clone(),
                            message: format!("invalid operation: cannot negate {other}"),
                            span: Some(*span),
                        });
                        Type::Invalid
                    }
                }
            }
            Expr::Binary { op, lhs, rhs, span } => {
                let lt = self.check_expr(file, class_env, locals, lhs);
                let rt = self.check_expr(file, class_env, locals, rhs);
                self.binary_result(file, *op, lt, rt, *span)
            }
            Expr::Call(call) => {
                let callee = self.resolve(class_env, locals, &call.callee.name).cloned();
                let sig = match callee {
                    Some(sym) => match sym.ty {
                        Type::Func(sig) => Some(sig),
                        Type::Any | Type::Invalid => None,
                        other => {
                            self.diagnostics.push(Diagnostic {
                                path: file.path.clone(),
                                message: format!(
                                    "cannot call {} (type {other})",
                                    call.callee.name
                                ),
                                span: Some(call.callee.span),
                            });
                            None
                        }
                    },
                    None => {
                        self.undefined(file, &call.callee.name, call.callee.span);
                        None
                    }
                };
                for arg in &call.args {
                    self.check_expr(file, class_env, locals, arg);
                }
                match sig {
                    Some(sig) => {
                        if !sig.variadic && call.args.len() != sig.params.len() {
                            self.diagnostics.push(Diagnostic {
                                path: file.path.clone(),
                                message: format!(
                                    "wrong number of arguments to {}: have {}, want {}",
                                    call.callee.name,
                                    call.args.len(),
                                    sig.params.len()
                                ),
                                span: Some(call.span),
                            });
                        }
                        *sig.result
                    }
                    None => Type::Any,
                }
            }
        }
    }

    fn binary_result(
        &mut self,
        file: &SourceFile,
        op: BinOp,
        lhs: Type,
        rhs: Type,
        span: TextRange,
    ) -> Type {
        if lhs == Type::Invalid || rhs == Type::Invalid {
            return Type::Invalid;
        }
        if lhs == Type::Any || rhs == Type::Any {
            return Type::Any;
        }
        if op == BinOp::Add && lhs == Type::Str && rhs == Type::Str {
            return Type::Str;
        }
        let numeric =
            |t: &Type| matches!(t, Type::Int | Type::Float);
        if numeric(&lhs) && numeric(&rhs) {
            if lhs == Type::Float || rhs == Type::Float {
                return Type::Float;
            }
            return Type::Int;
        }
        self.diagnostics.push(Diagnostic {
            path: file.path.clone(),
            message: format!("invalid operation: mismatched types {lhs} and {rhs}"),
            span: Some(span),
        });
        Type::Invalid
    }

    fn resolve<'s>(
        &'s self,
        class_env: Option<&'s TypePackage>,
        locals: &'s Scope,
        name: &str,
    ) -> Option<&'s Symbol> {
        locals
            .lookup(name)
            .or_else(|| class_env.and_then(|env| env.scope().lookup(name)))
            .or_else(|| self.package.lookup(name))
            .or_else(|| self.universe.lookup(name))
    }

    fn undefined(&mut self, file: &SourceFile, name: &str, span: TextRange) {
        self.diagnostics.push(Diagnostic {
            path: file.path.clone(),
            message: format!("undefined: {name}"),
            span: Some(span),
        });
    }
}

fn universe() -> Scope {
    let mut scope = Scope::new();
    for name in ["echo", "print", "println"] {
        scope.insert(Symbol {
            name: name.to_string(),
            kind: SymbolKind::Builtin,
            ty: Type::Func(FuncType {
                params: Vec::new(),
                variadic: true,
                result: Box::new(Type::Unit),
            }),
        });
    }
    scope.insert(Symbol {
        name: "len".to_string(),
        kind: SymbolKind::Builtin,
        ty: Type::Func(FuncType {
            params: vec![Type::Any],
            variadic: false,
            result: Box::new(Type::Int),
        }),
    });
    scope
}
