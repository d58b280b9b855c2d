use std::fmt;

use phf::phf_map;

pub(super) static KEYWORDS: phf::Map<&str, TokenKind> = phf_map! {
    "and" => TokenKind::And,
    "array" => TokenKind::Array,
    "begin" => TokenKind::Begin,
    "boolean" => TokenKind::Boolean,
    "do" => TokenKind::Do,
    "else" => TokenKind::Else,
    "end" => TokenKind::End,
    "false" => TokenKind::False,
    "for" => TokenKind::For,
    "if" => TokenKind::If,
    "integer" => TokenKind::Integer,
    "mod" => TokenKind::Mod,
    "not" => TokenKind::Not,
    "of" => TokenKind::Of,
    "or" => TokenKind::Or,
    "print" => TokenKind::Print,
    "program" => TokenKind::Program,
    "read" => TokenKind::Read,
    "real" => TokenKind::Real,
    "return" => TokenKind::Return,
    "string" => TokenKind::String,
    "then" => TokenKind::Then,
    "to" => TokenKind::To,
    "true" => TokenKind::True,
    "var" => TokenKind::Var,
    "while" => TokenKind::While,
};

pub(super) static TWO_SYMBOLS_TOKENS: phf::Map<&str, TokenKind> = phf_map! {
    ":=" => TokenKind::Assign,
    "<=" => TokenKind::LessEqual,
    "<>" => TokenKind::NotEqual,
    ">=" => TokenKind::GreaterEqual,
};

pub(super) static ONE_SYMBOL_TOKENS: phf::Map<char, TokenKind> = phf_map! {
    ',' => TokenKind::Comma,
    ';' => TokenKind::SemiColon,
    ':' => TokenKind::Colon,
    '(' => TokenKind::OpenParen,
    ')' => TokenKind::CloseParen,
    '[' => TokenKind::OpenSquareBrace,
    ']' => TokenKind::CloseSquareBrace,
    '+' => TokenKind::Plus,
    '-' => TokenKind::Minus,
    '*' => TokenKind::Star,
    '/' => TokenKind::Slash,
    '<' => TokenKind::LessThan,
    '>' => TokenKind::GreaterThan,
    '=' => TokenKind::Equal,
};

/// 1-based source position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Location {
    pub line: u32,
    pub col: u32,
}

impl Location {
    pub fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.col)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    Ident(String),
    IntLiteral(i64),
    RealLiteral(f64),
    StringLiteral(String),

    Comma,
    SemiColon,
    Colon,
    OpenParen,
    CloseParen,
    OpenSquareBrace,
    CloseSquareBrace,

    Plus,
    Minus,
    Star,
    Slash,
    Assign,
    LessThan,
    LessEqual,
    NotEqual,
    GreaterEqual,
    GreaterThan,
    Equal,

    And,
    Array,
    Begin,
    Boolean,
    Do,
    Else,
    End,
    False,
    For,
    If,
    Integer,
    Mod,
    Not,
    Of,
    Or,
    Print,
    Program,
    Read,
    Real,
    Return,
    String,
    Then,
    To,
    True,
    Var,
    While,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub loc: Location,
}
