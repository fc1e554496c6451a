//! Predicate evaluation for in-memory document filtering.
//!
//! The in-memory sessions receive the same parameterized statement fragments
//! the orchestrators hand to real drivers. This module parses that fragment
//! grammar — and only that grammar: parenthesized comparisons, `AND`/`OR`
//! chains, `LOWER(..) LIKE LOWER(:var)`, `IN`, `ISNULL` — and evaluates the
//! resulting predicate tree against documents with the bound variables.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde_json::{Map, Value};

use crudkit_core::document::Document;
use crudkit_core::error::{DbResult, db_errors};
use crudkit_core::filter::FilterCriteria;

/// Type-erased, comparable view of a JSON value. Numbers are normalized to
/// f64 for cross-type comparison.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
}

impl<'a> From<&'a Value> for Comparable<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::Null => Comparable::Null,
            Value::Bool(value) => Comparable::Bool(*value),
            Value::Number(value) => Comparable::Number(value.as_f64().unwrap_or(f64::NAN)),
            Value::String(value) => Comparable::String(value),
            Value::Array(values) => {
                Comparable::Array(values.iter().map(Comparable::from).collect())
            }
            Value::Object(map) => Comparable::Map(
                map.iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect(),
            ),
        }
    }
}

impl PartialEq for Comparable<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for Comparable<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Placeholder(String),
    LParen,
    RParen,
    Op(CmpOp),
    And,
    Or,
    Like,
    In,
    IsNull,
    Lower,
}

fn unsupported(statement: &str) -> crudkit_core::error::DbError {
    db_errors::db_instruction_with(format!("unsupported statement fragment: {statement}"))
}

fn tokenize(statement: &str) -> DbResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = statement.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '=' => {
                chars.next();
                tokens.push(Token::Op(CmpOp::Eq));
            }
            '!' => {
                chars.next();
                if chars.next() != Some('=') {
                    return Err(unsupported(statement));
                }
                tokens.push(Token::Op(CmpOp::Ne));
            }
            '<' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Op(CmpOp::Lte));
                } else {
                    tokens.push(Token::Op(CmpOp::Lt));
                }
            }
            '>' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Op(CmpOp::Gte));
                } else {
                    tokens.push(Token::Op(CmpOp::Gt));
                }
            }
            ':' => {
                chars.next();
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if name.is_empty() {
                    return Err(unsupported(statement));
                }
                tokens.push(Token::Placeholder(name));
            }
            '`' => {
                // Quoted identifier.
                chars.next();
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('`') => break,
                        Some(c) => name.push(c),
                        None => return Err(unsupported(statement)),
                    }
                }
                tokens.push(Token::Ident(name));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '$' {
                        word.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let token = if word.eq_ignore_ascii_case("and") {
                    Token::And
                } else if word.eq_ignore_ascii_case("or") {
                    Token::Or
                } else if word.eq_ignore_ascii_case("like") {
                    Token::Like
                } else if word.eq_ignore_ascii_case("in") {
                    Token::In
                } else if word.eq_ignore_ascii_case("isnull") {
                    Token::IsNull
                } else if word.eq_ignore_ascii_case("lower") {
                    Token::Lower
                } else {
                    Token::Ident(word)
                };
                tokens.push(token);
            }
            _ => return Err(unsupported(statement)),
        }
    }

    Ok(tokens)
}

#[derive(Debug, Clone, PartialEq)]
enum Predicate {
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    IsNull(String),
    Cmp { field: String, op: CmpOp, var: String },
    Like { field: String, var: String, ci: bool },
    In { field: String, var: String },
}

struct Parser<'a> {
    statement: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(statement: &'a str, tokens: Vec<Token>) -> Self {
        Self { statement, tokens, pos: 0 }
    }

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

    fn expect(&mut self, expected: Token) -> DbResult<()> {
        if self.next() == Some(expected) {
            Ok(())
        } else {
            Err(unsupported(self.statement))
        }
    }

    fn parse(mut self) -> DbResult<Predicate> {
        let predicate = self.expr()?;
        if self.peek().is_some() {
            return Err(unsupported(self.statement));
        }
        Ok(predicate)
    }

    // expr := and_chain (OR and_chain)*
    fn expr(&mut self) -> DbResult<Predicate> {
        let mut parts = vec![self.and_chain()?];
        while self.peek() == Some(&Token::Or) {
            self.next();
            parts.push(self.and_chain()?);
        }
        Ok(if parts.len() == 1 {
            parts.pop().unwrap()
        } else {
            Predicate::Or(parts)
        })
    }

    // and_chain := unary (AND unary)*
    fn and_chain(&mut self) -> DbResult<Predicate> {
        let mut parts = vec![self.unary()?];
        while self.peek() == Some(&Token::And) {
            self.next();
            parts.push(self.unary()?);
        }
        Ok(if parts.len() == 1 {
            parts.pop().unwrap()
        } else {
            Predicate::And(parts)
        })
    }

    // unary := '(' expr ')' | predicate
    fn unary(&mut self) -> DbResult<Predicate> {
        if self.peek() == Some(&Token::LParen) {
            self.next();
            let inner = self.expr()?;
            self.expect(Token::RParen)?;
            return Ok(inner);
        }
        self.predicate()
    }

    fn predicate(&mut self) -> DbResult<Predicate> {
        match self.next() {
            // ISNULL(field)
            Some(Token::IsNull) => {
                self.expect(Token::LParen)?;
                let field = self.ident()?;
                self.expect(Token::RParen)?;
                Ok(Predicate::IsNull(field))
            }
            // LOWER(field) LIKE LOWER(:var)
            Some(Token::Lower) => {
                self.expect(Token::LParen)?;
                let field = self.ident()?;
                self.expect(Token::RParen)?;
                self.expect(Token::Like)?;
                self.expect(Token::Lower)?;
                self.expect(Token::LParen)?;
                let var = self.placeholder()?;
                self.expect(Token::RParen)?;
                Ok(Predicate::Like { field, var, ci: true })
            }
            Some(Token::Ident(field)) => match self.next() {
                Some(Token::Op(op)) => {
                    let var = self.placeholder()?;
                    Ok(Predicate::Cmp { field, op, var })
                }
                Some(Token::Like) => {
                    let var = self.placeholder()?;
                    Ok(Predicate::Like { field, var, ci: false })
                }
                Some(Token::In) => {
                    let var = self.placeholder()?;
                    Ok(Predicate::In { field, var })
                }
                _ => Err(unsupported(self.statement)),
            },
            _ => Err(unsupported(self.statement)),
        }
    }

    fn ident(&mut self) -> DbResult<String> {
        match self.next() {
            Some(Token::Ident(name)) => Ok(name),
            _ => Err(unsupported(self.statement)),
        }
    }

    fn placeholder(&mut self) -> DbResult<String> {
        match self.next() {
            Some(Token::Placeholder(name)) => Ok(name),
            _ => Err(unsupported(self.statement)),
        }
    }
}

/// SQL `LIKE` matching with `%` (any run) and `_` (any one) wildcards.
fn like_match(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    let (mut t, mut p) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut mark = 0usize;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '_' || pattern[p] == text[t]) {
            t += 1;
            p += 1;
        } else if p < pattern.len() && pattern[p] == '%' {
            star = Some(p);
            mark = t;
            p += 1;
        } else if let Some(star_pos) = star {
            p = star_pos + 1;
            mark += 1;
            t = mark;
        } else {
            return false;
        }
    }
    while p < pattern.len() && pattern[p] == '%' {
        p += 1;
    }
    p == pattern.len()
}

/// A parsed predicate ready to match documents against bound variables.
#[derive(Debug, Clone)]
pub struct StatementFilter {
    predicate: Predicate,
}

impl StatementFilter {
    /// Parses a statement fragment emitted by the orchestrators.
    pub fn parse(statement: &str) -> DbResult<Self> {
        let tokens = tokenize(statement)?;
        if tokens.is_empty() {
            return Err(unsupported(statement));
        }
        let predicate = Parser::new(statement, tokens).parse()?;
        Ok(Self { predicate })
    }

    /// Convenience over [`parse`](Self::parse) for a compiled criteria.
    pub fn from_criteria(criteria: &FilterCriteria) -> DbResult<Self> {
        Self::parse(&criteria.statement)
    }

    /// Evaluates the predicate against one document.
    pub fn matches(&self, document: &Document, variables: &Map<String, Value>) -> DbResult<bool> {
        eval(&self.predicate, document, variables)
    }
}

fn eval(predicate: &Predicate, document: &Document, variables: &Map<String, Value>) -> DbResult<bool> {
    match predicate {
        Predicate::And(parts) => {
            for part in parts {
                if !eval(part, document, variables)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Predicate::Or(parts) => {
            for part in parts {
                if eval(part, document, variables)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Predicate::IsNull(field) => Ok(matches!(
            document.get(field),
            None | Some(Value::Null)
        )),
        Predicate::Cmp { field, op, var } => {
            let bound = lookup(variables, var)?;
            let field_value = document.get(field).unwrap_or(&Value::Null);
            let left = Comparable::from(field_value);
            let right = Comparable::from(bound);
            Ok(match op {
                CmpOp::Eq => left == right,
                CmpOp::Ne => left != right,
                CmpOp::Gt | CmpOp::Gte | CmpOp::Lt | CmpOp::Lte => {
                    match left.partial_cmp(&right) {
                        Some(ordering) => match op {
                            CmpOp::Gt => ordering == Ordering::Greater,
                            CmpOp::Gte => ordering != Ordering::Less,
                            CmpOp::Lt => ordering == Ordering::Less,
                            CmpOp::Lte => ordering != Ordering::Greater,
                            _ => unreachable!(),
                        },
                        None => false,
                    }
                }
            })
        }
        Predicate::Like { field, var, ci } => {
            let bound = lookup(variables, var)?;
            let (Some(text), Some(pattern)) = (
                document.get(field).and_then(Value::as_str),
                bound.as_str(),
            ) else {
                return Ok(false);
            };
            Ok(if *ci {
                like_match(&text.to_lowercase(), &pattern.to_lowercase())
            } else {
                like_match(text, pattern)
            })
        }
        Predicate::In { field, var } => {
            let bound = lookup(variables, var)?;
            let field_value = document.get(field).unwrap_or(&Value::Null);
            match bound {
                Value::Array(values) => Ok(values
                    .iter()
                    .any(|value| Comparable::from(value) == Comparable::from(field_value))),
                single => Ok(Comparable::from(single) == Comparable::from(field_value)),
            }
        }
    }
}

fn lookup<'a>(variables: &'a Map<String, Value>, var: &str) -> DbResult<&'a Value> {
    variables
        .get(var)
        .ok_or_else(|| db_errors::db_instruction_with(format!("unbound placeholder :{var}")))
}

/// Parses one ordering fragment (`` `name` desc `` / `name asc`) into a field
/// and an ascending flag. Direction defaults to ascending.
pub fn parse_sort_fragment(fragment: &str) -> Option<(String, bool)> {
    let mut words = fragment.split_whitespace();
    let field = words.next()?.trim_matches('`').to_string();
    let ascending = match words.next() {
        Some(direction) => direction.eq_ignore_ascii_case("asc"),
        None => true,
    };
    Some((field, ascending))
}

/// Orders documents by successive sort fragments, null-last within equals.
pub fn sort_documents(documents: &mut [Document], fragments: &[String]) {
    let keys: Vec<(String, bool)> = fragments
        .iter()
        .filter_map(|fragment| parse_sort_fragment(fragment))
        .collect();
    if keys.is_empty() {
        return;
    }

    documents.sort_by(|a, b| {
        for (field, ascending) in &keys {
            let left = Comparable::from(a.get(field).unwrap_or(&Value::Null));
            let right = Comparable::from(b.get(field).unwrap_or(&Value::Null));
            let ordering = left.partial_cmp(&right).unwrap_or(Ordering::Equal);
            let ordering = if *ascending { ordering } else { ordering.reverse() };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}
