use prototool_config::Failure;

/// Byte-accurate position of a token within its file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Location {
    /// 1-based line.
    pub line: u32,
    /// 1-based column, counted in bytes.
    pub column: u32,
    /// 0-based byte offset.
    pub offset: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    IntLiteral,
    FloatLiteral,
    StringLiteral,
    /// A single punctuation character: `{ } ( ) [ ] < > = ; , . : / -` etc.
    Symbol,
    LineComment,
    BlockComment,
    /// A run of spaces and tabs.
    Whitespace,
    /// One line terminator (`\n` or `\r\n`).
    Newline,
}

impl TokenKind {
    /// Tokens that carry no grammar: skipped by the parser cursor, re-emitted
    /// by the formatter.
    pub fn is_trivia(self) -> bool {
        matches!(
            self,
            TokenKind::LineComment
                | TokenKind::BlockComment
                | TokenKind::Whitespace
                | TokenKind::Newline
        )
    }

    pub fn is_comment(self) -> bool {
        matches!(self, TokenKind::LineComment | TokenKind::BlockComment)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// The original text, byte for byte.
    pub text: String,
    pub location: Location,
}

struct Lexer<'a> {
    path: &'a str,
    src: &'a [u8],
    offset: usize,
    line: u32,
    column: u32,
}

/// Lexes `source` into a complete token stream.
///
/// Invariant: the concatenation of every token's `text` equals `source`.
pub fn lex(path: &str, source: &str) -> Result<Vec<Token>, Failure> {
    let mut lexer = Lexer {
        path,
        src: source.as_bytes(),
        offset: 0,
        line: 1,
        column: 1,
    };
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next_token()? {
        tokens.push(token);
    }
    Ok(tokens)
}

impl<'a> Lexer<'a> {
    fn location(&self) -> Location {
        Location {
            line: self.line,
            column: self.column,
            offset: self.offset,
        }
    }

    fn peek(&self, ahead: usize) -> Option<u8> {
        self.src.get(self.offset + ahead).copied()
    }

    fn failure(&self, message: impl Into<String>) -> Failure {
        Failure::new(self.path, self.line, self.column, message).with_rule("PARSE")
    }

    fn next_token(&mut self) -> Result<Option<Token>, Failure> {
        let start = self.location();
        let Some(byte) = self.peek(0) else {
            return Ok(None);
        };

        let kind = match byte {
            b'\n' | b'\r' => {
                let len = if byte == b'\r' && self.peek(1) == Some(b'\n') {
                    2
                } else {
                    1
                };
                return Ok(Some(self.emit(TokenKind::Newline, start, len)));
            }
            b' ' | b'\t' => {
                let mut len = 1;
                while matches!(self.peek(len), Some(b' ') | Some(b'\t')) {
                    len += 1;
                }
                return Ok(Some(self.emit(TokenKind::Whitespace, start, len)));
            }
            b'/' if self.peek(1) == Some(b'/') => {
                let mut len = 2;
                while self.peek(len).is_some_and(|b| b != b'\n' && b != b'\r') {
                    len += 1;
                }
                return Ok(Some(self.emit(TokenKind::LineComment, start, len)));
            }
            b'/' if self.peek(1) == Some(b'*') => {
                return self.block_comment(start).map(Some);
            }
            b'"' | b'\'' => return self.string_literal(start, byte).map(Some),
            b'0'..=b'9' => return Ok(Some(self.number(start, false))),
            b'.' if self.peek(1).is_some_and(|b| b.is_ascii_digit()) => {
                return Ok(Some(self.number(start, true)));
            }
            b if b == b'_' || b.is_ascii_alphabetic() => {
                let mut len = 1;
                while self
                    .peek(len)
                    .is_some_and(|b| b == b'_' || b.is_ascii_alphanumeric())
                {
                    len += 1;
                }
                return Ok(Some(self.emit(TokenKind::Identifier, start, len)));
            }
            _ => TokenKind::Symbol,
        };

        Ok(Some(self.emit(kind, start, 1)))
    }

    fn block_comment(&mut self, start: Location) -> Result<Token, Failure> {
        let mut len = 2;
        loop {
            match (self.peek(len), self.peek(len + 1)) {
                (Some(b'*'), Some(b'/')) => {
                    len += 2;
                    break;
                }
                (Some(_), _) => len += 1,
                (None, _) => return Err(self.failure("unterminated block comment")),
            }
        }
        Ok(self.emit(TokenKind::BlockComment, start, len))
    }

    fn string_literal(&mut self, start: Location, quote: u8) -> Result<Token, Failure> {
        let mut len = 1;
        loop {
            match self.peek(len) {
                Some(b) if b == quote => {
                    len += 1;
                    break;
                }
                Some(b'\\') => {
                    if self.peek(len + 1).is_none() {
                        return Err(self.failure("unterminated string literal"));
                    }
                    len += 2;
                }
                Some(b'\n') | Some(b'\r') | None => {
                    return Err(self.failure("unterminated string literal"));
                }
                Some(_) => len += 1,
            }
        }
        Ok(self.emit(TokenKind::StringLiteral, start, len))
    }

    fn number(&mut self, start: Location, leading_dot: bool) -> Token {
        let mut len = 1;
        let mut float = leading_dot;

        if !leading_dot && self.src[start.offset] == b'0' && matches!(self.peek(1), Some(b'x') | Some(b'X'))
        {
            len = 2;
            while self.peek(len).is_some_and(|b| b.is_ascii_hexdigit()) {
                len += 1;
            }
            return self.emit(TokenKind::IntLiteral, start, len);
        }

        while self.peek(len).is_some_and(|b| b.is_ascii_digit()) {
            len += 1;
        }
        if !float && self.peek(len) == Some(b'.') {
            float = true;
            len += 1;
            while self.peek(len).is_some_and(|b| b.is_ascii_digit()) {
                len += 1;
            }
        }
        if matches!(self.peek(len), Some(b'e') | Some(b'E')) {
            let mut exp = len + 1;
            if matches!(self.peek(exp), Some(b'+') | Some(b'-')) {
                exp += 1;
            }
            if self.peek(exp).is_some_and(|b| b.is_ascii_digit()) {
                float = true;
                len = exp;
                while self.peek(len).is_some_and(|b| b.is_ascii_digit()) {
                    len += 1;
                }
            }
        }

        let kind = if float {
            TokenKind::FloatLiteral
        } else {
            TokenKind::IntLiteral
        };
        self.emit(kind, start, len)
    }

    fn emit(&mut self, kind: TokenKind, start: Location, len: usize) -> Token {
        let text =
            String::from_utf8_lossy(&self.src[start.offset..start.offset + len]).into_owned();
        self.offset += len;

        // Block comments and newline tokens span line breaks; track them here
        // so every other token can simply advance the column.
        let mut newlines = 0u32;
        let mut last_newline = None;
        for (index, byte) in text.bytes().enumerate() {
            if byte == b'\n' {
                newlines += 1;
                last_newline = Some(index);
            }
        }
        match last_newline {
            Some(last) => {
                self.line += newlines;
                self.column = (len - last) as u32;
            }
            None => self.column += len as u32,
        }

        Token {
            kind,
            text,
            location: start,
        }
    }
}
