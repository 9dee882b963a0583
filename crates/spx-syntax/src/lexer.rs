use crate::TextRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Whitespace,
    Newline,
    LineComment,
    BlockComment,

    Ident,
    PackageKw,
    FuncKw,
    VarKw,

    IntLit,
    FloatLit,
    StringLit,

    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Semicolon,
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,

    Error,
    Eof,
}

impl TokenKind {
    /// Trivia is skipped by the parser; line comments are kept around long
    /// enough to be attached as doc comments.
    pub fn is_trivia(self) -> bool {
        matches!(
            self,
            TokenKind::Whitespace | TokenKind::LineComment | TokenKind::BlockComment
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub range: TextRange,
}

impl Token {
    pub fn text<'a>(&self, input: &'a str) -> &'a str {
        &input[self.range.start as usize..self.range.end as usize]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub message: String,
    pub range: TextRange,
}

/// Tokenize `input`, returning the token stream and any lexical errors.
///
/// The stream is lossless (trivia tokens are included) and always ends with
/// an `Eof` token.
pub fn lex(input: &str) -> (Vec<Token>, Vec<LexError>) {
    Lexer::new(input).lex()
}

pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    errors: Vec<LexError>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            errors: Vec::new(),
        }
    }

    pub fn lex(mut self) -> (Vec<Token>, Vec<LexError>) {
        let mut tokens = Vec::new();
        while !self.is_eof() {
            let start = self.pos;
            let kind = self.next_kind();
            tokens.push(Token {
                kind,
                range: TextRange::new(start, self.pos),
            });
        }
        tokens.push(Token {
            kind: TokenKind::Eof,
            range: TextRange::new(self.pos, self.pos),
        });
        (tokens, self.errors)
    }

    fn next_kind(&mut self) -> TokenKind {
        let b = self.peek_byte(0).unwrap_or(b'\0');
        match b {
            b'\n' => self.single(TokenKind::Newline),
            b'\r' => {
                if self.peek_byte(1) == Some(b'\n') {
                    self.pos += 2;
                } else {
                    self.pos += 1;
                }
                TokenKind::Newline
            }
            b' ' | b'\t' => self.scan_whitespace(),
            b'/' => self.scan_slash_or_comment(),
            b'"' => self.scan_string(),
            b'0'..=b'9' => self.scan_number(),
            b'(' => self.single(TokenKind::LParen),
            b')' => self.single(TokenKind::RParen),
            b'{' => self.single(TokenKind::LBrace),
            b'}' => self.single(TokenKind::RBrace),
            b',' => self.single(TokenKind::Comma),
            b';' => self.single(TokenKind::Semicolon),
            b'=' => self.single(TokenKind::Assign),
            b'+' => self.single(TokenKind::Plus),
            b'-' => self.single(TokenKind::Minus),
            b'*' => self.single(TokenKind::Star),
            b'%' => self.single(TokenKind::Percent),
            b'_' | b'a'..=b'z' | b'A'..=b'Z' => self.scan_identifier_or_keyword(),
            _ => {
                let ch = self.peek_char().unwrap_or('\0');
                if is_ident_start(ch) {
                    self.scan_identifier_or_keyword()
                } else {
                    let start = self.pos;
                    self.bump_char();
                    self.errors.push(LexError {
                        message: format!("unexpected character {ch:?}"),
                        range: TextRange::new(start, self.pos),
                    });
                    TokenKind::Error
                }
            }
        }
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.pos += 1;
        kind
    }

    fn scan_whitespace(&mut self) -> TokenKind {
        while matches!(self.peek_byte(0), Some(b' ' | b'\t')) {
            self.pos += 1;
        }
        TokenKind::Whitespace
    }

    fn scan_slash_or_comment(&mut self) -> TokenKind {
        match self.peek_byte(1) {
            Some(b'/') => {
                while let Some(b) = self.peek_byte(0) {
                    if b == b'\n' {
                        break;
                    }
                    self.bump_char();
                }
                TokenKind::LineComment
            }
            Some(b'*') => {
                let start = self.pos;
                self.pos += 2;
                loop {
                    match self.peek_byte(0) {
                        Some(b'*') if self.peek_byte(1) == Some(b'/') => {
                            self.pos += 2;
                            return TokenKind::BlockComment;
                        }
                        Some(_) => self.bump_char(),
                        None => {
                            self.errors.push(LexError {
                                message: "unterminated block comment".to_string(),
                                range: TextRange::new(start, self.pos),
                            });
                            return TokenKind::Error;
                        }
                    }
                }
            }
            _ => self.single(TokenKind::Slash),
        }
    }

    fn scan_string(&mut self) -> TokenKind {
        let start = self.pos;
        self.pos += 1;
        loop {
            match self.peek_byte(0) {
                Some(b'"') => {
                    self.pos += 1;
                    return TokenKind::StringLit;
                }
                Some(b'\\') => {
                    self.pos += 1;
                    if self.peek_byte(0).is_some() {
                        self.bump_char();
                    }
                }
                Some(b'\n') | None => {
                    self.errors.push(LexError {
                        message: "unterminated string literal".to_string(),
                        range: TextRange::new(start, self.pos),
                    });
                    return TokenKind::Error;
                }
                Some(_) => self.bump_char(),
            }
        }
    }

    fn scan_number(&mut self) -> TokenKind {
        let start = self.pos;
        self.eat_digits();
        let mut kind = TokenKind::IntLit;
        if self.peek_byte(0) == Some(b'.') && matches!(self.peek_byte(1), Some(b'0'..=b'9')) {
            self.pos += 1;
            self.eat_digits();
            kind = TokenKind::FloatLit;
        }
        // A numeric literal must not run directly into identifier characters
        // (e.g. `100_err`); the whole run becomes a single error token.
        if self.peek_char().is_some_and(is_ident_continue) {
            while self.peek_char().is_some_and(is_ident_continue) {
                self.bump_char();
            }
            self.errors.push(LexError {
                message: format!(
                    "invalid numeric literal {:?}",
                    &self.input[start..self.pos]
                ),
                range: TextRange::new(start, self.pos),
            });
            return TokenKind::Error;
        }
        kind
    }

    fn eat_digits(&mut self) {
        while let Some(b) = self.peek_byte(0) {
            match b {
                b'0'..=b'9' => self.pos += 1,
                // `_` is only a digit separator when digits follow.
                b'_' if matches!(self.peek_byte(1), Some(b'0'..=b'9')) => self.pos += 1,
                _ => break,
            }
        }
    }

    fn scan_identifier_or_keyword(&mut self) -> TokenKind {
        let start = self.pos;
        self.bump_char();
        while self.peek_char().is_some_and(is_ident_continue) {
            self.bump_char();
        }
        match &self.input[start..self.pos] {
            "package" => TokenKind::PackageKw,
            "func" => TokenKind::FuncKw,
            "var" => TokenKind::VarKw,
            _ => TokenKind::Ident,
        }
    }

    fn peek_byte(&self, offset: usize) -> Option<u8> {
        self.input.as_bytes().get(self.pos + offset).copied()
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump_char(&mut self) {
        if let Some(ch) = self.peek_char() {
            self.pos += ch.len_utf8();
        }
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }
}

fn is_ident_start(ch: char) -> bool {
    ch == '_' || ch.is_ascii_alphabetic() || (!ch.is_ascii() && ch.is_alphabetic())
}

fn is_ident_continue(ch: char) -> bool {
    is_ident_start(ch) || ch.is_ascii_digit()
}
