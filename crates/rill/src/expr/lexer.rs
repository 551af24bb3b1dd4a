//! Lexer for cell source text.

use crate::ast::Span;
use crate::error::{Error, Result};

/// A lexical token.
#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Number(f64),
    Str(String),
    Ident(String),
    // Keywords
    Import,
    With,
    From,
    As,
    Viewof,
    Let,
    Return,
    Yield,
    If,
    Else,
    While,
    Await,
    True,
    False,
    Null,
    // Punctuation
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Semi,
    Assign,
    Question,
    Colon,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    Not,
}

/// A token with its byte range in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tok: Tok,
    pub span: Span,
}

fn keyword(ident: &str) -> Option<Tok> {
    Some(match ident {
        "import" => Tok::Import,
        "with" => Tok::With,
        "from" => Tok::From,
        "as" => Tok::As,
        "viewof" => Tok::Viewof,
        "let" => Tok::Let,
        "return" => Tok::Return,
        "yield" => Tok::Yield,
        "if" => Tok::If,
        "else" => Tok::Else,
        "while" => Tok::While,
        "await" => Tok::Await,
        "true" => Tok::True,
        "false" => Tok::False,
        "null" => Tok::Null,
        _ => return None,
    })
}

/// Tokenize cell source text. Line comments (`//`) are skipped.
pub fn lex(src: &str) -> Result<Vec<Token>> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b' ' | b'\t' | b'\r' | b'\n' => {
                i += 1;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'"' => {
                let start = i;
                i += 1;
                let mut text = String::new();
                loop {
                    match bytes.get(i) {
                        None => return Err(Error::Parse("unterminated string literal".into())),
                        Some(b'"') => {
                            i += 1;
                            break;
                        }
                        Some(b'\\') => {
                            let escaped = match bytes.get(i + 1) {
                                Some(b'n') => '\n',
                                Some(b't') => '\t',
                                Some(b'"') => '"',
                                Some(b'\\') => '\\',
                                other => {
                                    return Err(Error::Parse(format!(
                                        "unknown string escape: \\{}",
                                        other.map(|c| *c as char).unwrap_or(' ')
                                    )));
                                }
                            };
                            text.push(escaped);
                            i += 2;
                        }
                        Some(_) => {
                            // Copy one full UTF-8 character.
                            let ch = src[i..].chars().next().unwrap_or('\u{fffd}');
                            text.push(ch);
                            i += ch.len_utf8();
                        }
                    }
                }
                tokens.push(Token { tok: Tok::Str(text), span: Span::new(start, i) });
            }
            b'0'..=b'9' => {
                let start = i;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                if bytes.get(i) == Some(&b'.') && bytes.get(i + 1).is_some_and(u8::is_ascii_digit) {
                    i += 1;
                    while i < bytes.len() && bytes[i].is_ascii_digit() {
                        i += 1;
                    }
                }
                let text = &src[start..i];
                let value: f64 = text
                    .parse()
                    .map_err(|_| Error::Parse(format!("invalid number literal: {}", text)))?;
                tokens.push(Token { tok: Tok::Number(value), span: Span::new(start, i) });
            }
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                let text = &src[start..i];
                let tok = keyword(text).unwrap_or_else(|| Tok::Ident(text.to_string()));
                tokens.push(Token { tok, span: Span::new(start, i) });
            }
            _ => {
                let start = i;
                let two = |second: u8| bytes.get(i + 1) == Some(&second);
                let (tok, len) = match b {
                    b'=' if two(b'=') => (Tok::EqEq, 2),
                    b'=' => (Tok::Assign, 1),
                    b'!' if two(b'=') => (Tok::NotEq, 2),
                    b'!' => (Tok::Not, 1),
                    b'<' if two(b'=') => (Tok::Le, 2),
                    b'<' => (Tok::Lt, 1),
                    b'>' if two(b'=') => (Tok::Ge, 2),
                    b'>' => (Tok::Gt, 1),
                    b'&' if two(b'&') => (Tok::AndAnd, 2),
                    b'|' if two(b'|') => (Tok::OrOr, 2),
                    b'{' => (Tok::LBrace, 1),
                    b'}' => (Tok::RBrace, 1),
                    b'(' => (Tok::LParen, 1),
                    b')' => (Tok::RParen, 1),
                    b'[' => (Tok::LBracket, 1),
                    b']' => (Tok::RBracket, 1),
                    b',' => (Tok::Comma, 1),
                    b';' => (Tok::Semi, 1),
                    b'?' => (Tok::Question, 1),
                    b':' => (Tok::Colon, 1),
                    b'+' => (Tok::Plus, 1),
                    b'-' => (Tok::Minus, 1),
                    b'*' => (Tok::Star, 1),
                    b'/' => (Tok::Slash, 1),
                    b'%' => (Tok::Percent, 1),
                    _ => {
                        return Err(Error::Parse(format!(
                            "unexpected character '{}'",
                            src[i..].chars().next().unwrap_or('\u{fffd}')
                        )));
                    }
                };
                i += len;
                tokens.push(Token { tok, span: Span::new(start, i) });
            }
        }
    }

    Ok(tokens)
}
