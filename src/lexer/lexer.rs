use super::{
    token::{KEYWORDS, ONE_SYMBOL_TOKENS, TWO_SYMBOLS_TOKENS},
    Location, Token, TokenKind,
};

#[derive(thiserror::Error, Clone, Debug, PartialEq)]
pub enum LexError {
    #[error("{loc}: unexpected character '{c}'")]
    UnexpectedChar { c: char, loc: Location },
    #[error("{loc}: unterminated string literal")]
    UnterminatedString { loc: Location },
    #[error("{loc}: unterminated comment")]
    UnterminatedComment { loc: Location },
    #[error("{loc}: invalid numeric literal '{text}'")]
    InvalidNumber { text: String, loc: Location },
}

/// Tokens of one source file plus the options its pseudo-comments set.
#[derive(Clone, Debug, Default)]
pub struct Lexed {
    pub tokens: Vec<Token>,
    /// Last `//&D+` or `//&D-` seen, if any.
    pub dump_table: Option<bool>,
}

#[derive(Debug)]
pub struct Lexer {
    chars: Vec<char>,
    index: usize,
    line: u32,
    col: u32,
    lexed: Lexed,
}

impl Lexer {
    fn new(s: &str) -> Self {
        Self {
            chars: s.chars().collect(),
            index: 0,
            line: 1,
            col: 1,
            lexed: Lexed::default(),
        }
    }

    fn loc(&self) -> Location {
        Location::new(self.line, self.col)
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.index + offset).copied()
    }

    fn advance(&mut self, n: usize) {
        for _ in 0..n {
            if let Some(c) = self.peek(0) {
                self.index += 1;
                if c == '\n' {
                    self.line += 1;
                    self.col = 1;
                } else {
                    self.col += 1;
                }
            }
        }
    }

    fn new_token(&mut self, kind: TokenKind, loc: Location, len: usize) {
        self.lexed.tokens.push(Token { kind, loc });
        self.advance(len);
    }

    fn take_while(&self, from: usize, f: impl Fn(char) -> bool) -> usize {
        self.chars[self.index + from..]
            .iter()
            .take_while(|&&c| f(c))
            .count()
    }

    fn text(&self, len: usize) -> String {
        self.chars[self.index..self.index + len].iter().collect()
    }

    fn parse_number(&mut self) -> Result<(), LexError> {
        let loc = self.loc();
        let mut len = self.take_while(0, |c| c.is_ascii_digit());
        let mut is_real = false;

        if self.peek(len) == Some('.') && self.peek(len + 1).is_some_and(|c| c.is_ascii_digit()) {
            is_real = true;
            len += 1 + self.take_while(len + 1, |c| c.is_ascii_digit());
        }
        if matches!(self.peek(len), Some('e' | 'E')) {
            let sign = usize::from(matches!(self.peek(len + 1), Some('+' | '-')));
            let digits = self.take_while(len + 1 + sign, |c| c.is_ascii_digit());
            if digits > 0 {
                is_real = true;
                len += 1 + sign + digits;
            }
        }

        let text = self.text(len);
        let invalid = || LexError::InvalidNumber {
            text: text.clone(),
            loc,
        };
        let kind = if is_real {
            TokenKind::RealLiteral(text.parse().map_err(|_| invalid())?)
        } else {
            let (digits, radix) = match text.strip_prefix('0') {
                Some(octal) if !octal.is_empty() => (octal, 8),
                _ => (text.as_str(), 10),
            };
            // Integer literals must fit a 32-bit word.
            let value = i32::from_str_radix(digits, radix).map_err(|_| invalid())?;
            TokenKind::IntLiteral(i64::from(value))
        };
        self.new_token(kind, loc, len);
        Ok(())
    }

    fn parse_identifier(&mut self) {
        let loc = self.loc();
        let len = self.take_while(0, |c| c.is_ascii_alphanumeric() || c == '_');
        let s = self.text(len);

        if let Some(kind) = KEYWORDS.get(s.as_str()) {
            self.new_token(kind.clone(), loc, len);
        } else {
            self.new_token(TokenKind::Ident(s), loc, len);
        }
    }

    fn parse_string(&mut self) -> Result<(), LexError> {
        let loc = self.loc();
        let mut value = String::new();
        let mut len = 1;
        loop {
            match self.peek(len) {
                None | Some('\n') => return Err(LexError::UnterminatedString { loc }),
                Some('"') if self.peek(len + 1) == Some('"') => {
                    value.push('"');
                    len += 2;
                }
                Some('"') => break,
                Some(c) => {
                    value.push(c);
                    len += 1;
                }
            }
        }
        self.new_token(TokenKind::StringLiteral(value), loc, len + 1);
        Ok(())
    }

    fn skip_line_comment(&mut self) {
        let len = self.take_while(0, |c| c != '\n');
        let comment = self.text(len);
        match comment.as_str() {
            s if s.starts_with("//&D+") => self.lexed.dump_table = Some(true),
            s if s.starts_with("//&D-") => self.lexed.dump_table = Some(false),
            _ => (),
        }
        self.advance(len);
    }

    fn skip_block_comment(&mut self) -> Result<(), LexError> {
        let loc = self.loc();
        self.advance(2);
        while self.peek(0).is_some() {
            if self.peek(0) == Some('*') && self.peek(1) == Some('/') {
                self.advance(2);
                return Ok(());
            }
            self.advance(1);
        }
        Err(LexError::UnterminatedComment { loc })
    }

    fn _tokenize(&mut self) -> Result<(), LexError> {
        while let Some(c) = self.peek(0) {
            let c2: String = self.chars[self.index..].iter().take(2).collect();

            if c.is_whitespace() {
                self.advance(1);
            } else if c2 == "//" {
                self.skip_line_comment();
            } else if c2 == "/*" {
                self.skip_block_comment()?;
            } else if c.is_ascii_digit() {
                self.parse_number()?;
            } else if c.is_ascii_alphabetic() {
                self.parse_identifier();
            } else if c == '"' {
                self.parse_string()?;
            } else if let Some(kind) = TWO_SYMBOLS_TOKENS.get(c2.as_str()) {
                self.new_token(kind.clone(), self.loc(), 2);
            } else if let Some(kind) = ONE_SYMBOL_TOKENS.get(&c) {
                self.new_token(kind.clone(), self.loc(), 1);
            } else {
                return Err(LexError::UnexpectedChar { c, loc: self.loc() });
            }
        }
        Ok(())
    }

    pub fn tokenize(s: &str) -> Result<Lexed, LexError> {
        let mut lexer = Lexer::new(s);
        lexer._tokenize()?;

        log::trace!("lexed {} tokens", lexer.lexed.tokens.len());
        Ok(lexer.lexed)
    }
}
