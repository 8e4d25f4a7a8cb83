//! cnd::lexer
//!
//! Tokenizer for compact node type definitions.

use super::CndError;

/// Token types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// Bare word: names, attribute keywords, `*`
    Word(String),
    /// Single- or double-quoted string, quotes removed
    Quoted(String),

    LAngle,   // <
    RAngle,   // >
    LBracket, // [
    RBracket, // ]
    LParen,   // (
    RParen,   // )
    Eq,       // =
    Comma,    // ,
    Minus,    // -
    Plus,     // +
}

impl TokenKind {
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Word(w) => format!("'{w}'"),
            TokenKind::Quoted(q) => format!("string '{q}'"),
            TokenKind::LAngle => "'<'".to_string(),
            TokenKind::RAngle => "'>'".to_string(),
            TokenKind::LBracket => "'['".to_string(),
            TokenKind::RBracket => "']'".to_string(),
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
            TokenKind::Eq => "'='".to_string(),
            TokenKind::Comma => "','".to_string(),
            TokenKind::Minus => "'-'".to_string(),
            TokenKind::Plus => "'+'".to_string(),
        }
    }
}

/// A token with its 1-based source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
}

const PUNCTUATION: &[char] = &['<', '>', '[', ']', '(', ')', '=', ',', '\'', '"'];

/// Split CND text into tokens, dropping whitespace and comments.
pub fn tokenize(input: &str) -> Result<Vec<Token>, CndError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    let mut line = 1;

    while let Some(c) = chars.next() {
        let kind = match c {
            '\n' => {
                line += 1;
                continue;
            }
            c if c.is_whitespace() => continue,
            '/' if chars.peek() == Some(&'/') => {
                while chars.peek().is_some_and(|c| *c != '\n') {
                    chars.next();
                }
                continue;
            }
            '/' if chars.peek() == Some(&'*') => {
                let start = line;
                chars.next();
                let mut closed = false;
                while let Some(c) = chars.next() {
                    match c {
                        '\n' => line += 1,
                        '*' if chars.peek() == Some(&'/') => {
                            chars.next();
                            closed = true;
                            break;
                        }
                        _ => {}
                    }
                }
                if !closed {
                    return Err(CndError::syntax(start, "unterminated block comment"));
                }
                continue;
            }
            quote @ ('\'' | '"') => {
                let start = line;
                let mut value = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == quote {
                        closed = true;
                        break;
                    }
                    if c == '\n' {
                        line += 1;
                    }
                    value.push(c);
                }
                if !closed {
                    return Err(CndError::syntax(start, "unterminated string"));
                }
                tokens.push(Token {
                    kind: TokenKind::Quoted(value),
                    line: start,
                });
                continue;
            }
            '<' => TokenKind::LAngle,
            '>' => TokenKind::RAngle,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '=' => TokenKind::Eq,
            ',' => TokenKind::Comma,
            '-' => TokenKind::Minus,
            '+' => TokenKind::Plus,
            first => {
                let mut word = String::from(first);
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || PUNCTUATION.contains(&c) {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                TokenKind::Word(word)
            }
        };
        tokens.push(Token { kind, line });
    }

    Ok(tokens)
}
