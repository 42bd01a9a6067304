// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Recursive-descent parser for path expressions.
//!
//! Grammar:
//!
//! ```text
//! expression := segment+
//! segment    := join? ident ':' ident filter* ('.' ident)?
//! join       := '>' | '~' '(' ident ')'
//! filter     := '{' ident ident value '}'
//! value      := literal | word
//! ```
//!
//! A `>` join borrows the previous segment's trailing `.column` as the left
//! join column; `~(col)` names the right join column explicitly.

use serde::{Deserialize, Serialize};

use crate::lexer::{Token, tokenize};

/// One attribute filter inside a segment: `{name operator value}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityFilter {
    /// Attribute name being filtered.
    pub name: String,
    /// Filter operator, passed through verbatim (`eq`, `in`, `like`, ...).
    pub operator: String,
    /// Filter value with any surrounding quotes stripped.
    pub value: String,
}

/// One resolved query step of a parsed expression.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExpressionSegment {
    /// Plugin package that owns the entity.
    pub package: String,
    /// Entity name within the package.
    pub entity: String,
    /// Attribute filters declared inline in this segment.
    pub filters: Vec<EntityFilter>,
    /// For a `>` segment: the previous segment's column whose values are
    /// matched against this entity's `id`.
    pub left_join_column: Option<String>,
    /// For a `~(col)` segment: the column matched against the previous
    /// segment's `id` values.
    pub right_join_column: Option<String>,
    /// Mirror of `right_join_column`, kept for callers that report the
    /// referencing column separately.
    pub ref_column: Option<String>,
    /// Trailing `.column`, the designated result column of this segment.
    pub result_column: Option<String>,
}

impl ExpressionSegment {
    /// `package:entity` display form, used in error reporting.
    pub fn entity_ref(&self) -> String {
        format!("{}:{}", self.package, self.entity)
    }
}

/// Errors raised while parsing a path expression.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The expression is empty or all whitespace.
    #[error("expression is empty")]
    Empty,

    /// A single-quoted literal was never closed.
    #[error("unterminated literal starting at byte {0}")]
    UnterminatedLiteral(usize),

    /// The expression begins with a join separator.
    #[error("expression must not start with a join separator")]
    LeadingJoin,

    /// A segment's entity reference did not split into exactly
    /// `package:entity`.
    #[error("entity reference '{0}' is illegal, expected package:entity")]
    MalformedEntity(String),

    /// A filter block was opened but never closed.
    #[error("filter in segment '{0}' is missing a closing brace")]
    UnclosedFilter(String),

    /// A filter block did not contain exactly name, operator, and value.
    #[error("filter in segment '{0}' must be 'name operator value'")]
    MalformedFilter(String),

    /// A `~` join was not followed by `(column)`.
    #[error("reverse join in segment {0} must name a column as ~(column)")]
    MalformedReverseJoin(usize),

    /// A `>` segment's predecessor has no trailing `.column` to join on.
    #[error("segment {0} joins with '>' but the previous segment has no result column")]
    MissingJoinColumn(usize),

    /// Leftover tokens that fit no production.
    #[error("unexpected content in segment {0}")]
    UnexpectedToken(usize),
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat_word(&mut self) -> Option<String> {
        match self.peek() {
            Some(Token::Word(_)) => match self.next() {
                Some(Token::Word(w)) => Some(w),
                _ => None,
            },
            _ => None,
        }
    }

    /// Parse one segment. `index` is the zero-based segment position and
    /// `previous_result_column` the trailing `.column` of the predecessor.
    fn segment(
        &mut self,
        index: usize,
        previous_result_column: Option<&String>,
    ) -> Result<ExpressionSegment, ParseError> {
        let mut segment = ExpressionSegment::default();

        match self.peek() {
            Some(Token::Gt) => {
                self.next();
                let column = previous_result_column
                    .cloned()
                    .ok_or(ParseError::MissingJoinColumn(index))?;
                segment.left_join_column = Some(column);
            }
            Some(Token::Tilde) => {
                self.next();
                if !matches!(self.next(), Some(Token::LParen)) {
                    return Err(ParseError::MalformedReverseJoin(index));
                }
                let column = self
                    .eat_word()
                    .ok_or(ParseError::MalformedReverseJoin(index))?;
                if !matches!(self.next(), Some(Token::RParen)) {
                    return Err(ParseError::MalformedReverseJoin(index));
                }
                segment.right_join_column = Some(column.clone());
                segment.ref_column = Some(column);
            }
            _ => {}
        }

        // Entity reference: collect the ident:ident[:ident...] run, then
        // require exactly two parts.
        let mut parts = Vec::new();
        match self.eat_word() {
            Some(word) => parts.push(word),
            None => return Err(ParseError::MalformedEntity(format!("segment {}", index))),
        }
        while matches!(self.peek(), Some(Token::Colon)) {
            self.next();
            match self.eat_word() {
                Some(word) => parts.push(word),
                None => return Err(ParseError::MalformedEntity(parts.join(":"))),
            }
        }
        if parts.len() != 2 {
            return Err(ParseError::MalformedEntity(parts.join(":")));
        }
        segment.package = parts.remove(0);
        segment.entity = parts.remove(0);

        while matches!(self.peek(), Some(Token::LBrace)) {
            self.next();
            segment.filters.push(self.filter(&segment)?);
        }

        if matches!(self.peek(), Some(Token::Dot)) {
            self.next();
            let column = self
                .eat_word()
                .ok_or(ParseError::UnexpectedToken(index))?;
            segment.result_column = Some(column);
        }

        match self.peek() {
            None | Some(Token::Gt) | Some(Token::Tilde) => Ok(segment),
            Some(_) => Err(ParseError::UnexpectedToken(index)),
        }
    }

    /// Parse the remainder of a filter block, the `{` already consumed.
    fn filter(&mut self, segment: &ExpressionSegment) -> Result<EntityFilter, ParseError> {
        let mut fields = Vec::new();
        loop {
            match self.next() {
                Some(Token::RBrace) => break,
                Some(Token::Word(w)) => fields.push(w),
                Some(Token::Literal(l)) => fields.push(l),
                Some(_) => return Err(ParseError::MalformedFilter(segment.entity_ref())),
                None => return Err(ParseError::UnclosedFilter(segment.entity_ref())),
            }
        }
        if fields.len() != 3 {
            return Err(ParseError::MalformedFilter(segment.entity_ref()));
        }
        let mut fields = fields.into_iter();
        Ok(EntityFilter {
            name: fields.next().unwrap(),
            operator: fields.next().unwrap(),
            value: fields.next().unwrap(),
        })
    }
}

/// Parse a path expression into its ordered query segments.
pub fn parse(expression: &str) -> Result<Vec<ExpressionSegment>, ParseError> {
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err(ParseError::Empty);
    }
    if matches!(tokens.first(), Some(Token::Gt) | Some(Token::Tilde)) {
        return Err(ParseError::LeadingJoin);
    }

    let mut parser = Parser { tokens, pos: 0 };
    let mut segments: Vec<ExpressionSegment> = Vec::new();
    while parser.peek().is_some() {
        let previous_result_column = segments.last().and_then(|s| s.result_column.as_ref());
        let segment = parser.segment(segments.len(), previous_result_column)?;
        segments.push(segment);
    }
    Ok(segments)
}
