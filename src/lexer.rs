// SDPL - a statistical data-processing language interpreter.
// Copyright (C) 2026 The SDPL Project
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later
// version.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program.  If not, see <http://www.gnu.org/licenses/>.

//! Lexer (C2): character stream to token stream.
//!
//! Single pass with one character of lookahead, grounded on the segmentation
//! style of `pspp::lex::segment`: a hand-rolled scanner that tracks
//! line/column itself rather than delegating to a tokenizer-generator crate.

use std::fmt::{Display, Formatter, Result as FmtResult};

use thiserror::Error as ThisError;

use crate::identifier::{self, Identifier};
use crate::message::Point;
use crate::token::{Keyword, Punct, Token, TokenKind};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LexErrorKind {
    UnterminatedString,
    BadNumber,
    UnknownChar(char),
    UnterminatedDatalines,
}

impl Display for LexErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            LexErrorKind::UnterminatedString => write!(f, "unterminated string literal"),
            LexErrorKind::BadNumber => write!(f, "malformed number"),
            LexErrorKind::UnknownChar(c) => write!(f, "unexpected character {c:?}"),
            LexErrorKind::UnterminatedDatalines => {
                write!(f, "DATALINES block has no terminating line")
            }
        }
    }
}

#[derive(Clone, Debug, ThisError, PartialEq, Eq)]
#[error("{kind} at {point}")]
pub struct LexError {
    pub kind: LexErrorKind,
    pub point: Point,
}

/// DATALINES raw text attached to the preceding `DATALINES;` statement, as a
/// side channel keyed by the index of the `Datalines` token in the stream.
/// Keeping raw lines out of the main token stream keeps that stream uniform
/// instead of special-casing a STRING-kind token that spans many lines.
#[derive(Clone, Debug, Default)]
pub struct DatalinesBlocks {
    /// Maps the token index of the `DATALINES` keyword to its raw lines.
    pub blocks: Vec<(usize, Vec<String>)>,
}

pub struct Lexer<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
    line: u32,
    col: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn point(&self) -> Point {
        Point::new(self.line, self.col)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<(), LexError> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.peek2() == Some('*') => {
                    let start = self.point();
                    self.bump();
                    self.bump();
                    loop {
                        match self.peek() {
                            None => {
                                return Err(LexError {
                                    kind: LexErrorKind::UnknownChar('*'),
                                    point: start,
                                });
                            }
                            Some('*') if self.peek2() == Some('/') => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            _ => {
                                self.bump();
                            }
                        }
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn lex_number(&mut self) -> Result<Token, LexError> {
        let start = self.point();
        let mut text = String::new();
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            text.push(self.bump().unwrap());
        }
        if self.peek() == Some('.') && matches!(self.peek2(), Some(c) if c.is_ascii_digit()) {
            text.push(self.bump().unwrap());
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                text.push(self.bump().unwrap());
            }
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            let mut lookahead = self.pos + 1;
            if matches!(self.chars.get(lookahead), Some('+') | Some('-')) {
                lookahead += 1;
            }
            if matches!(self.chars.get(lookahead), Some(c) if c.is_ascii_digit()) {
                text.push(self.bump().unwrap());
                if matches!(self.peek(), Some('+') | Some('-')) {
                    text.push(self.bump().unwrap());
                }
                while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                    text.push(self.bump().unwrap());
                }
            }
        }
        let value: f64 = text.parse().map_err(|_| LexError {
            kind: LexErrorKind::BadNumber,
            point: start,
        })?;
        Ok(Token::new(TokenKind::Number(value), text, start))
    }

    fn lex_string(&mut self, quote: char) -> Result<Token, LexError> {
        let start = self.point();
        self.bump();
        let mut raw = String::new();
        let mut value = String::new();
        loop {
            match self.peek() {
                None => {
                    return Err(LexError {
                        kind: LexErrorKind::UnterminatedString,
                        point: start,
                    });
                }
                Some(c) if c == quote => {
                    self.bump();
                    raw.push(quote);
                    if self.peek() == Some(quote) {
                        // Doubled quote: a literal quote character.
                        self.bump();
                        raw.push(quote);
                        value.push(quote);
                    } else {
                        break;
                    }
                }
                Some(c) => {
                    self.bump();
                    raw.push(c);
                    value.push(c);
                }
            }
        }
        Ok(Token::new(TokenKind::String(value), raw, start))
    }

    fn lex_word(&mut self) -> Result<Token, LexError> {
        let start = self.point();
        let mut text = String::new();
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            text.push(self.bump().unwrap());
        }
        if let Some(punct) = word_operator(&text) {
            return Ok(Token::new(TokenKind::Punct(punct), text, start));
        }
        if let Some(keyword) = Keyword::lookup(&text) {
            return Ok(Token::new(TokenKind::Keyword(keyword), text, start));
        }
        let id = Identifier::new(&text).unwrap_or_else(|_| Identifier::new_unchecked(&text));
        Ok(Token::new(TokenKind::Identifier(id), text, start))
    }

    /// Consumes a DATALINES block: raw lines up to (and including) a line
    /// whose only non-whitespace content is `;`. Blank lines inside the block
    /// are data, not terminators.
    fn lex_datalines_block(&mut self) -> Result<Vec<String>, LexError> {
        let start = self.point();
        let mut lines = Vec::new();
        loop {
            if self.peek().is_none() {
                return Err(LexError {
                    kind: LexErrorKind::UnterminatedDatalines,
                    point: start,
                });
            }
            let mut line = String::new();
            while let Some(c) = self.peek() {
                if c == '\n' {
                    break;
                }
                line.push(c);
                self.bump();
            }
            if self.peek() == Some('\n') {
                self.bump();
            }
            if line.trim() == ";" {
                break;
            }
            lines.push(line);
        }
        Ok(lines)
    }

    /// Tokenizes the whole source, returning the token stream and any
    /// DATALINES raw blocks keyed by the index of their `DATALINES` token.
    pub fn tokenize(mut self) -> Result<(Vec<Token>, DatalinesBlocks), LexError> {
        let mut tokens = Vec::new();
        let mut blocks = DatalinesBlocks::default();
        loop {
            self.skip_whitespace_and_comments()?;
            let Some(c) = self.peek() else {
                tokens.push(Token::new(TokenKind::Eof, "", self.point()));
                break;
            };
            let point = self.point();
            let token = if c.is_ascii_digit() {
                self.lex_number()?
            } else if c == '.' && matches!(self.peek2(), Some(d) if d.is_ascii_digit()) {
                self.lex_number()?
            } else if c == '"' || c == '\'' {
                self.lex_string(c)?
            } else if c.is_ascii_alphabetic() || c == '_' {
                self.lex_word()?
            } else {
                self.bump();
                let kind = match (c, self.peek()) {
                    ('>', Some('=')) => {
                        self.bump();
                        TokenKind::Punct(Punct::Ge)
                    }
                    ('<', Some('=')) => {
                        self.bump();
                        TokenKind::Punct(Punct::Le)
                    }
                    ('=', Some('=')) => {
                        self.bump();
                        TokenKind::Punct(Punct::EqEq)
                    }
                    ('!', Some('=')) | ('^', Some('=')) => {
                        self.bump();
                        TokenKind::Punct(Punct::Ne)
                    }
                    (';', _) => TokenKind::Punct(Punct::Semicolon),
                    (',', _) => TokenKind::Punct(Punct::Comma),
                    ('{', _) => TokenKind::Punct(Punct::LBrace),
                    ('}', _) => TokenKind::Punct(Punct::RBrace),
                    ('(', _) => TokenKind::Punct(Punct::LParen),
                    (')', _) => TokenKind::Punct(Punct::RParen),
                    ('.', _) => TokenKind::Punct(Punct::Dot),
                    ('$', _) => TokenKind::Punct(Punct::Dollar),
                    ('=', _) => TokenKind::Punct(Punct::Equal),
                    ('+', _) => TokenKind::Punct(Punct::Plus),
                    ('-', _) => TokenKind::Punct(Punct::Minus),
                    ('*', _) => TokenKind::Punct(Punct::Star),
                    ('/', _) => TokenKind::Punct(Punct::Slash),
                    ('<', _) => TokenKind::Punct(Punct::Lt),
                    ('>', _) => TokenKind::Punct(Punct::Gt),
                    (other, _) => {
                        return Err(LexError {
                            kind: LexErrorKind::UnknownChar(other),
                            point,
                        });
                    }
                };
                let text: String = std::iter::once(c)
                    .chain(if matches!(kind, TokenKind::Punct(Punct::Ge | Punct::Le | Punct::EqEq | Punct::Ne)) {
                        Some('=')
                    } else {
                        None
                    })
                    .collect();
                Token::new(kind, text, point)
            };
            let is_datalines = token.is_keyword(Keyword::Datalines);
            let index = tokens.len();
            tokens.push(token);
            if is_datalines {
                // A SEMICOLON must precede switching into line mode; absence
                // is a normal lex error recovered by the parser like any
                // other.
                self.skip_whitespace_and_comments()?;
                if self.peek() == Some(';') {
                    let semi_point = self.point();
                    self.bump();
                    tokens.push(Token::new(TokenKind::Punct(Punct::Semicolon), ";", semi_point));
                    let lines = self.lex_datalines_block()?;
                    blocks.blocks.push((index, lines));
                }
            }
        }
        Ok((tokens, blocks))
    }

    /// Returns the raw source text, used by tests checking tokenizer
    /// totality.
    pub fn source(&self) -> &'a str {
        self.source
    }
}

fn word_operator(word: &str) -> Option<Punct> {
    match identifier::keyword_lookup(word)? {
        "AND" => Some(Punct::And),
        "OR" => Some(Punct::Or),
        "NOT" => Some(Punct::Not),
        "EQ" => Some(Punct::EqEq),
        "NE" => Some(Punct::Ne),
        "LT" => Some(Punct::Lt),
        "LE" => Some(Punct::Le),
        "GT" => Some(Punct::Gt),
        "GE" => Some(Punct::Ge),
        _ => None,
    }
}
