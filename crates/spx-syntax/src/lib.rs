//! Syntax tree and parsing primitives for the spx scripting dialect.
//!
//! The dialect is a small Go-derived surface: an optional `package` clause,
//! top-level `func` and `var` declarations, and free-standing statements that
//! the parser wraps into a synthetic `main` function (the *shadow entry*).
//! Files with the `.spx` extension are class files: their loose statements are
//! conceptually methods of a game class and are flagged via
//! [`SourceFile::is_class`].
//!
//! Entry point: [`parse_file`], which produces an [`ast::SourceFile`] or the
//! first [`ParseError`] encountered.

pub mod ast;
mod lexer;
mod parser;
pub mod pkgdoc;

pub use ast::{merge_package, AstPackage, SourceFile};
pub use lexer::{lex, LexError, Lexer, Token, TokenKind};
pub use parser::parse_file;
pub use pkgdoc::{pkg_doc, FuncDoc, PkgDoc, VarDoc};

/// A half-open byte range within a source file (`start..end`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TextRange {
    pub start: u32,
    pub end: u32,
}

impl TextRange {
    #[inline]
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end);
        Self {
            start: start as u32,
            end: end as u32,
        }
    }

    #[inline]
    pub fn join(self, other: TextRange) -> TextRange {
        TextRange {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    #[inline]
    pub fn len(self) -> u32 {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.start == self.end
    }
}

/// A parse (or lex) failure, annotated with the path it occurred in.
///
/// Parsing is all-or-nothing: the parser reports the first error and callers
/// treat the file as unusable until its content is replaced.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{path}: {message}")]
pub struct ParseError {
    pub path: String,
    pub message: String,
    pub range: TextRange,
}

impl ParseError {
    pub fn new(path: impl Into<String>, message: impl Into<String>, range: TextRange) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            range,
        }
    }
}
