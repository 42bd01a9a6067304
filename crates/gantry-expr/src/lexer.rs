// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tokenizer for path expressions.
//!
//! The lexer has two modes. Outside a filter block, the structural
//! characters `> ~ : . ( ) { }` are individual tokens and words are runs of
//! anything else. Inside a filter block (between `{` and `}`) only
//! whitespace separates words, so unquoted values may contain dots and
//! colons. Single-quoted literals are one token in either mode and never
//! contain structural characters as far as the parser is concerned.

use crate::parser::ParseError;

/// One lexical token of a path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A bare word: identifier, operator, or unquoted filter value.
    Word(String),
    /// A single-quoted literal with the quotes stripped.
    Literal(String),
    /// `>` — forward join separator.
    Gt,
    /// `~` — reverse join separator.
    Tilde,
    /// `:` — package/entity separator.
    Colon,
    /// `.` — result column separator.
    Dot,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `{` — filter block start.
    LBrace,
    /// `}` — filter block end.
    RBrace,
}

fn is_structural(c: char) -> bool {
    matches!(c, '>' | '~' | ':' | '.' | '(' | ')' | '{' | '}')
}

/// Tokenize a path expression.
///
/// Fails only on an unterminated single-quoted literal; all other
/// malformations are grammar errors reported by the parser.
pub fn tokenize(input: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();
    let mut in_filter = false;

    while let Some((pos, c)) = chars.next() {
        match c {
            '\'' => {
                let mut literal = String::new();
                let mut closed = false;
                for (_, lc) in chars.by_ref() {
                    if lc == '\'' {
                        closed = true;
                        break;
                    }
                    literal.push(lc);
                }
                if !closed {
                    return Err(ParseError::UnterminatedLiteral(pos));
                }
                tokens.push(Token::Literal(literal));
            }
            '{' => {
                in_filter = true;
                tokens.push(Token::LBrace);
            }
            '}' => {
                in_filter = false;
                tokens.push(Token::RBrace);
            }
            c if c.is_whitespace() => {}
            c if !in_filter && is_structural(c) => tokens.push(match c {
                '>' => Token::Gt,
                '~' => Token::Tilde,
                ':' => Token::Colon,
                '.' => Token::Dot,
                '(' => Token::LParen,
                _ => Token::RParen,
            }),
            c => {
                let mut word = String::new();
                word.push(c);
                while let Some(&(_, nc)) = chars.peek() {
                    let stop = nc == '\''
                        || nc == '}'
                        || nc.is_whitespace()
                        || (!in_filter && is_structural(nc))
                        || (in_filter && nc == '{');
                    if stop {
                        break;
                    }
                    word.push(nc);
                    chars.next();
                }
                tokens.push(Token::Word(word));
            }
        }
    }

    Ok(tokens)
}
