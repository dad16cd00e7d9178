//! Redo-SQL row image recovery.
//!
//! LogMiner reconstructs each row change as a single-row INSERT, UPDATE or
//! DELETE statement. This module parses that narrow grammar back into
//! before/after column-value maps. It is deliberately not a general SQL
//! parser: statements are lexed with the `sqlparser` tokenizer and the three
//! DML shapes are recognized directly from the token stream. Only conjunctive
//! equality predicates are captured from WHERE clauses, which is all the
//! reconstruction emits for single-row changes.

use crate::{Error, Result};
use sqlparser::dialect::GenericDialect;
use sqlparser::keywords::Keyword;
use sqlparser::tokenizer::{Token, Tokenizer, Word};
use tracing::trace;

/// Raw string images recovered from one redo statement.
///
/// Column order follows the statement's declaration order. A `None` value is
/// an explicit NULL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedChange {
    pub before: Vec<(String, Option<String>)>,
    pub after: Vec<(String, Option<String>)>,
}

/// Parses one reconstructed DML statement into before/after images.
pub fn parse_redo(redo: &str) -> Result<ParsedChange> {
    trace!("parsing redo statement into column string maps");

    // Both spellings of the null predicate appear in reconstructed redo;
    // normalize before lexing so WHERE capture sees one shape.
    let normalized = redo.replace("IS NULL", "= NULL");

    let tokens = Tokenizer::new(&GenericDialect {}, &normalized)
        .tokenize()
        .map_err(|e| Error::Parse {
            message: format!("cannot tokenize redo statement: {}", e),
        })?;
    let tokens: Vec<Token> = tokens
        .into_iter()
        .filter(|t| !matches!(t, Token::Whitespace(_)))
        .collect();

    let mut parser = RedoParser { tokens, pos: 0 };
    let change = parser.parse()?;
    trace!(?change, "parsed redo statement");
    Ok(change)
}

/// Normalizes a literal extracted from redo text: strips a leading
/// `TIMESTAMP` type marker, one layer of surrounding quotes, and whitespace.
/// Idempotent; performs no semantic type conversion.
pub fn clean_string(raw: &str) -> String {
    let mut s = raw.trim();
    if let Some(rest) = s.strip_prefix("TIMESTAMP ") {
        s = rest.trim_start();
    }
    if s.len() >= 2 && ((s.starts_with('\'') && s.ends_with('\'')) || (s.starts_with('"') && s.ends_with('"'))) {
        s = &s[1..s.len() - 1];
    }
    s.trim().to_string()
}

struct RedoParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl RedoParser {
    fn parse(&mut self) -> Result<ParsedChange> {
        match self.peek_keyword() {
            Some(Keyword::INSERT) => self.parse_insert(),
            Some(Keyword::UPDATE) => self.parse_update(),
            Some(Keyword::DELETE) => self.parse_delete(),
            _ => Err(self.error("expected INSERT, UPDATE or DELETE")),
        }
    }

    fn parse_insert(&mut self) -> Result<ParsedChange> {
        self.expect_keyword(Keyword::INSERT)?;
        self.expect_keyword(Keyword::INTO)?;
        self.skip_object_name();

        self.expect_token(&Token::LParen)?;
        let mut columns = Vec::new();
        loop {
            columns.push(self.expect_ident()?);
            match self.advance() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => break,
                _ => return Err(self.error("malformed INSERT column list")),
            }
        }

        self.expect_keyword(Keyword::VALUES)?;
        self.expect_token(&Token::LParen)?;
        let mut values = Vec::new();
        loop {
            values.push(self.parse_value(&[])?);
            match self.advance() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => break,
                _ => return Err(self.error("malformed INSERT value list")),
            }
        }

        if columns.len() != values.len() {
            return Err(Error::Parse {
                message: format!(
                    "INSERT has {} columns but {} values",
                    columns.len(),
                    values.len()
                ),
            });
        }

        Ok(ParsedChange {
            before: Vec::new(),
            after: columns.into_iter().zip(values).collect(),
        })
    }

    fn parse_update(&mut self) -> Result<ParsedChange> {
        self.expect_keyword(Keyword::UPDATE)?;
        self.skip_object_name();
        self.expect_keyword(Keyword::SET)?;

        let mut after: Vec<(String, Option<String>)> = Vec::new();
        loop {
            let column = self.expect_ident()?;
            self.expect_token(&Token::Eq)?;
            let value = self.parse_value(&[Keyword::WHERE])?;
            upsert(&mut after, column, value);
            match self.peek() {
                Some(Token::Comma) => {
                    self.advance();
                }
                _ => break,
            }
        }

        let before = if self.consume_keyword(Keyword::WHERE) {
            self.parse_equality_conditions()?
        } else {
            Vec::new()
        };

        Ok(ParsedChange { before, after })
    }

    fn parse_delete(&mut self) -> Result<ParsedChange> {
        self.expect_keyword(Keyword::DELETE)?;
        self.expect_keyword(Keyword::FROM)?;
        self.skip_object_name();

        let before = if self.consume_keyword(Keyword::WHERE) {
            self.parse_equality_conditions()?
        } else {
            Vec::new()
        };

        Ok(ParsedChange {
            before,
            after: Vec::new(),
        })
    }

    /// Captures every `column = value` condition in the remaining tokens.
    /// Non-equality predicates are stepped over without capture.
    fn parse_equality_conditions(&mut self) -> Result<Vec<(String, Option<String>)>> {
        let mut conditions: Vec<(String, Option<String>)> = Vec::new();
        while let Some(token) = self.peek() {
            match token {
                Token::Word(w) if is_ident(w) => {
                    let column = w.value.clone();
                    self.advance();
                    if matches!(self.peek(), Some(Token::Eq)) {
                        self.advance();
                        let value = self.parse_value(&[Keyword::AND, Keyword::OR])?;
                        upsert(&mut conditions, column, value);
                    }
                }
                _ => {
                    self.advance();
                }
            }
        }
        Ok(conditions)
    }

    /// Collects one value expression as cleaned text. Stops, without
    /// consuming, at a top-level comma, closing paren, end of input, or any
    /// of the given stop keywords. A lone NULL keyword yields `None`.
    fn parse_value(&mut self, stop_keywords: &[Keyword]) -> Result<Option<String>> {
        let mut depth = 0usize;
        let mut parts: Vec<String> = Vec::new();
        let mut only_null = true;

        loop {
            let token = match self.peek() {
                Some(t) => t.clone(),
                None => break,
            };
            match &token {
                Token::Comma | Token::RParen if depth == 0 => break,
                Token::SemiColon => break,
                Token::Word(w) if depth == 0 && stop_keywords.contains(&w.keyword) => break,
                Token::LParen => depth += 1,
                Token::RParen => depth -= 1,
                _ => {}
            }
            if !matches!(&token, Token::Word(w) if w.keyword == Keyword::NULL) {
                only_null = false;
            }
            parts.push(token_text(&token));
            self.advance();
        }

        if parts.is_empty() {
            return Err(self.error("empty value expression"));
        }
        if parts.len() == 1 && only_null {
            return Ok(None);
        }
        Ok(Some(clean_string(&join_expression(&parts))))
    }

    /// Steps over a possibly qualified, possibly quoted object name.
    fn skip_object_name(&mut self) {
        while let Some(token) = self.peek() {
            match token {
                Token::Word(w) if is_ident(w) => {
                    self.advance();
                }
                Token::Period => {
                    self.advance();
                }
                _ => break,
            }
        }
    }

    fn expect_ident(&mut self) -> Result<String> {
        match self.advance() {
            Some(Token::Word(w)) => Ok(w.value),
            other => Err(Error::Parse {
                message: format!("expected identifier, found {:?}", other),
            }),
        }
    }

    fn expect_keyword(&mut self, keyword: Keyword) -> Result<()> {
        match self.advance() {
            Some(Token::Word(w)) if w.keyword == keyword => Ok(()),
            other => Err(Error::Parse {
                message: format!("expected {:?}, found {:?}", keyword, other),
            }),
        }
    }

    fn consume_keyword(&mut self, keyword: Keyword) -> bool {
        match self.peek() {
            Some(Token::Word(w)) if w.keyword == keyword => {
                self.advance();
                true
            }
            _ => false,
        }
    }

    fn expect_token(&mut self, expected: &Token) -> Result<()> {
        match self.advance() {
            Some(ref t) if t == expected => Ok(()),
            other => Err(Error::Parse {
                message: format!("expected {:?}, found {:?}", expected, other),
            }),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_keyword(&self) -> Option<Keyword> {
        match self.peek() {
            Some(Token::Word(w)) => Some(w.keyword),
            _ => None,
        }
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn error(&self, message: &str) -> Error {
        Error::Parse {
            message: format!("{} at token {}", message, self.pos),
        }
    }
}

/// An identifier token: quoted, or an unreserved bare word.
fn is_ident(word: &Word) -> bool {
    word.quote_style.is_some() || word.keyword == Keyword::NoKeyword
}

fn token_text(token: &Token) -> String {
    match token {
        Token::Word(w) => w.value.clone(),
        Token::SingleQuotedString(s) => format!("'{}'", s),
        Token::Number(n, _) => n.clone(),
        other => other.to_string(),
    }
}

/// Joins expression fragments back into display text. Punctuation binds
/// tightly so simple literals come out verbatim.
fn join_expression(parts: &[String]) -> String {
    let mut out = String::new();
    for part in parts {
        let tight = matches!(part.as_str(), "(" | ")" | "," | "." | "-");
        let after_tight = matches!(
            out.chars().last(),
            Some('(') | Some('.') | Some('-') | None
        );
        if !tight && !after_tight {
            out.push(' ');
        }
        if tight && part != "-" && out.ends_with(' ') {
            out.pop();
        }
        out.push_str(part);
    }
    out
}

fn upsert(entries: &mut Vec<(String, Option<String>)>, column: String, value: Option<String>) {
    if let Some(existing) = entries.iter_mut().find(|(name, _)| *name == column) {
        existing.1 = value;
    } else {
        entries.push((column, value));
    }
}
