use crate::ast::{
    AssignStmt, BinOp, Block, CallExpr, Decl, Expr, FuncDecl, Ident, Lit, SourceFile, Stmt,
    UnaryOp, VarDecl,
};
use crate::lexer::{lex, Token, TokenKind};
use crate::{ParseError, TextRange};

/// Parse one source file, failing on the first lexical or syntactic error.
///
/// Files ending in `.spx` are parsed as class files. Free-standing statements
/// are wrapped into the shadow entry, which is present in every parsed file
/// (possibly with an empty body).
pub fn parse_file(path: &str, source: &str) -> Result<SourceFile, ParseError> {
    let (tokens, lex_errors) = lex(source);
    if let Some(err) = lex_errors.into_iter().next() {
        return Err(ParseError::new(path, err.message, err.range));
    }
    Parser {
        path,
        source,
        tokens,
        pos: 0,
    }
    .parse_source_file()
}

struct Parser<'a> {
    path: &'a str,
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn parse_source_file(mut self) -> Result<SourceFile, ParseError> {
        let is_class = self.path.ends_with(".spx");
        let mut file_doc = None;
        let mut package = None;
        let mut decls = Vec::new();
        let mut loose: Vec<Stmt> = Vec::new();

        let mut doc = self.skip_blank_lines();
        if self.peek_kind() == TokenKind::PackageKw {
            self.bump();
            let name = self.expect_ident("package name")?;
            self.expect_terminator()?;
            package = Some(name);
            file_doc = doc.take();
            doc = self.skip_blank_lines();
        }

        loop {
            match self.peek_kind() {
                TokenKind::Eof => break,
                TokenKind::FuncKw => decls.push(Decl::Func(self.parse_func(doc.take())?)),
                TokenKind::VarKw => {
                    let decl = self.parse_var(doc.take())?;
                    self.expect_terminator()?;
                    decls.push(Decl::Var(decl));
                }
                _ => loose.push(self.parse_stmt()?),
            }
            doc = self.skip_blank_lines();
        }

        let span = match (loose.first(), loose.last()) {
            (Some(first), Some(last)) => first.span().join(last.span()),
            _ => TextRange::new(0, 0),
        };
        let shadow_entry = Some(FuncDecl {
            doc: None,
            name: Ident::new("main", TextRange::new(0, 0)),
            params: Vec::new(),
            body: Block { list: loose, span },
            shadow: true,
            span,
        });

        Ok(SourceFile {
            path: self.path.to_string(),
            package,
            doc: file_doc,
            decls,
            shadow_entry,
            is_class,
        })
    }

    fn parse_func(&mut self, doc: Option<String>) -> Result<FuncDecl, ParseError> {
        let kw = self.bump();
        let name = self.expect_ident("function name")?;
        self.expect(TokenKind::LParen, "`(`")?;
        let mut params = Vec::new();
        if self.peek_kind() != TokenKind::RParen {
            loop {
                params.push(self.expect_ident("parameter name")?);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "`)`")?;
        let body = self.parse_block()?;
        let span = TextRange {
            start: kw.range.start,
            end: body.span.end,
        };
        Ok(FuncDecl {
            doc,
            name,
            params,
            body,
            shadow: false,
            span,
        })
    }

    fn parse_block(&mut self) -> Result<Block, ParseError> {
        let open = self.expect(TokenKind::LBrace, "`{`")?;
        let mut list = Vec::new();
        loop {
            let _ = self.skip_blank_lines();
            match self.peek_kind() {
                TokenKind::RBrace => break,
                TokenKind::Eof => return Err(self.err("unclosed block", open.range)),
                TokenKind::VarKw => {
                    let decl = self.parse_var(None)?;
                    self.expect_terminator()?;
                    list.push(Stmt::Var(decl));
                }
                _ => list.push(self.parse_stmt()?),
            }
        }
        let close = self.bump();
        Ok(Block {
            list,
            span: TextRange {
                start: open.range.start,
                end: close.range.end,
            },
        })
    }

    fn parse_var(&mut self, doc: Option<String>) -> Result<VarDecl, ParseError> {
        let kw = self.bump();
        let name = self.expect_ident("variable name")?;
        let mut init = None;
        let mut end = name.span.end;
        if self.eat(TokenKind::Assign) {
            let expr = self.parse_expr(0)?;
            end = expr.span().end;
            init = Some(expr);
        }
        Ok(VarDecl {
            doc,
            name,
            init,
            span: TextRange {
                start: kw.range.start,
                end,
            },
        })
    }

    fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        if self.peek_kind() == TokenKind::Ident {
            let next_kind = self.nth(1).kind;
            if next_kind == TokenKind::Assign {
                let target = self.expect_ident("assignment target")?;
                self.bump();
                let value = self.parse_expr(0)?;
                self.expect_terminator()?;
                let span = target.span.join(value.span());
                return Ok(Stmt::Assign(AssignStmt {
                    target,
                    value,
                    span,
                }));
            }
            if starts_expression(next_kind) && !self.adjacent_call_parens() {
                // Command-style call: arguments without parentheses, e.g.
                // `echo 100, 200`.
                let callee = self.expect_ident("command name")?;
                let mut args = Vec::new();
                loop {
                    args.push(self.parse_expr(0)?);
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect_terminator()?;
                let last = args.last().map(|a| a.span()).unwrap_or(callee.span);
                let span = callee.span.join(last);
                return Ok(Stmt::Expr(Expr::Call(CallExpr {
                    callee,
                    args,
                    command: true,
                    span,
                })));
            }
        }
        let expr = self.parse_expr(0)?;
        self.expect_terminator()?;
        Ok(Stmt::Expr(expr))
    }

    fn parse_expr(&mut self, min_bp: u8) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_primary()?;
        loop {
            let (op, bp) = match self.peek_kind() {
                TokenKind::Plus => (BinOp::Add, 1),
                TokenKind::Minus => (BinOp::Sub, 1),
                TokenKind::Star => (BinOp::Mul, 2),
                TokenKind::Slash => (BinOp::Div, 2),
                TokenKind::Percent => (BinOp::Rem, 2),
                _ => break,
            };
            if bp < min_bp {
                break;
            }
            self.bump();
            let rhs = self.parse_expr(bp + 1)?;
            let span = lhs.span().join(rhs.span());
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
        Ok(lhs)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::IntLit => {
                self.bump();
                let digits = tok.text(self.source).replace('_', "");
                let value = digits.parse::<i64>().map_err(|_| {
                    self.err(
                        format!("integer literal {:?} out of range", tok.text(self.source)),
                        tok.range,
                    )
                })?;
                Ok(Expr::Lit {
                    value: Lit::Int(value),
                    span: tok.range,
                })
            }
            TokenKind::FloatLit => {
                self.bump();
                let digits = tok.text(self.source).replace('_', "");
                let value = digits.parse::<f64>().map_err(|_| {
                    self.err(
                        format!("invalid float literal {:?}", tok.text(self.source)),
                        tok.range,
                    )
                })?;
                Ok(Expr::Lit {
                    value: Lit::Float(value),
                    span: tok.range,
                })
            }
            TokenKind::StringLit => {
                self.bump();
                let value = self.unescape(&tok)?;
                Ok(Expr::Lit {
                    value: Lit::Str(value),
                    span: tok.range,
                })
            }
            TokenKind::Minus => {
                self.bump();
                let operand = self.parse_primary()?;
                let span = tok.range.join(operand.span());
                Ok(Expr::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(operand),
                    span,
                })
            }
            TokenKind::LParen => {
                self.bump();
                let inner = self.parse_expr(0)?;
                self.expect(TokenKind::RParen, "`)`")?;
                Ok(inner)
            }
            TokenKind::Ident => {
                let callee = self.expect_ident("identifier")?;
                let next = self.peek().clone();
                if next.kind == TokenKind::LParen && next.range.start == callee.span.end {
                    self.bump();
                    let mut args = Vec::new();
                    if self.peek_kind() != TokenKind::RParen {
                        loop {
                            args.push(self.parse_expr(0)?);
                            if !self.eat(TokenKind::Comma) {
                                break;
                            }
                        }
                    }
                    let close = self.expect(TokenKind::RParen, "`)`")?;
                    let span = TextRange {
                        start: callee.span.start,
                        end: close.range.end,
                    };
                    return Ok(Expr::Call(CallExpr {
                        callee,
                        args,
                        command: false,
                        span,
                    }));
                }
                Ok(Expr::Ident(callee))
            }
            _ => Err(self.unexpected(&tok, "an expression")),
        }
    }

    fn unescape(&self, tok: &Token) -> Result<String, ParseError> {
        let raw = tok.text(self.source);
        let inner = &raw[1..raw.len() - 1];
        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(ch) = chars.next() {
            if ch != '\\' {
                out.push(ch);
                continue;
            }
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('\\') => out.push('\\'),
                Some('"') => out.push('"'),
                other => {
                    return Err(self.err(
                        format!("unknown escape sequence \\{}", other.unwrap_or(' ')),
                        tok.range,
                    ))
                }
            }
        }
        Ok(out)
    }

    /// Skip newlines, semicolons, and trivia. Consecutive line comments are
    /// collected and returned so callers can attach them as the doc comment
    /// of the following declaration; a blank line detaches them.
    fn skip_blank_lines(&mut self) -> Option<String> {
        let mut doc: Vec<String> = Vec::new();
        let mut newlines_since_comment = 0usize;
        loop {
            let tok = &self.tokens[self.pos];
            match tok.kind {
                TokenKind::Whitespace | TokenKind::BlockComment => self.pos += 1,
                TokenKind::LineComment => {
                    let text = tok.text(self.source);
                    doc.push(text.trim_start_matches('/').trim().to_string());
                    newlines_since_comment = 0;
                    self.pos += 1;
                }
                TokenKind::Newline | TokenKind::Semicolon => {
                    if !doc.is_empty() {
                        newlines_since_comment += 1;
                        if newlines_since_comment > 1 {
                            doc.clear();
                        }
                    }
                    self.pos += 1;
                }
                _ => break,
            }
        }
        if doc.is_empty() {
            None
        } else {
            Some(doc.join("\n"))
        }
    }

    fn peek(&self) -> &Token {
        let mut i = self.pos;
        while self.tokens[i].kind.is_trivia() {
            i += 1;
        }
        &self.tokens[i]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    /// The n-th significant token from the current position (0 == `peek`).
    fn nth(&self, n: usize) -> &Token {
        let mut i = self.pos;
        let mut seen = 0;
        loop {
            let tok = &self.tokens[i];
            if !tok.kind.is_trivia() {
                if seen == n {
                    return tok;
                }
                seen += 1;
            }
            if tok.kind == TokenKind::Eof {
                return tok;
            }
            i += 1;
        }
    }

    fn bump(&mut self) -> Token {
        loop {
            let tok = self.tokens[self.pos].clone();
            if tok.kind == TokenKind::Eof {
                return tok;
            }
            self.pos += 1;
            if !tok.kind.is_trivia() {
                return tok;
            }
        }
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.peek_kind() == kind {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token, ParseError> {
        let tok = self.peek().clone();
        if tok.kind == kind {
            Ok(self.bump())
        } else {
            Err(self.unexpected(&tok, what))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<Ident, ParseError> {
        let tok = self.peek().clone();
        if tok.kind != TokenKind::Ident {
            return Err(self.unexpected(&tok, what));
        }
        self.bump();
        Ok(Ident::new(tok.text(self.source), tok.range))
    }

    fn expect_terminator(&mut self) -> Result<(), ParseError> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Newline | TokenKind::Semicolon => {
                self.bump();
                Ok(())
            }
            TokenKind::RBrace | TokenKind::Eof => Ok(()),
            _ => Err(self.unexpected(&tok, "end of statement")),
        }
    }

    fn unexpected(&self, tok: &Token, expected: &str) -> ParseError {
        let found = match tok.kind {
            TokenKind::Eof => "end of file".to_string(),
            TokenKind::Newline => "end of line".to_string(),
            _ => format!("{:?}", tok.text(self.source)),
        };
        self.err(format!("expected {expected}, found {found}"), tok.range)
    }

    fn err(&self, message: impl Into<String>, range: TextRange) -> ParseError {
        ParseError::new(self.path, message, range)
    }

    /// Whether the upcoming `ident (` is a parenthesized call (no space
    /// between the name and the opening parenthesis).
    fn adjacent_call_parens(&self) -> bool {
        let id = self.peek();
        let next = self.nth(1);
        next.kind == TokenKind::LParen && next.range.start == id.range.end
    }
}

fn starts_expression(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::IntLit
            | TokenKind::FloatLit
            | TokenKind::StringLit
            | TokenKind::Ident
            | TokenKind::Minus
            | TokenKind::LParen
    )
}
