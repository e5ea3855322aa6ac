//! Filter expression parser
//!
//! Parses the filter language the query-constructor prompt teaches the model:
//! comparisons of the form `comp(attr, val)` combined with logical operations
//! `op(statement, ...)`, e.g.
//!
//! ```text
//! and(or(eq("artist", "Taylor Swift"), eq("artist", "Katy Perry")), lt("length", 180))
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Deepest nesting of calls and lists a filter may use
pub const MAX_DEPTH: usize = 64;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message} at position {position}")]
pub struct ParseError {
    /// Byte offset into the filter string
    pub position: usize,
    pub message: String,
}

impl ParseError {
    fn new(position: usize, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

/// Comparison applied to a single metadata attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Contain,
    Like,
    In,
    Nin,
}

impl Comparator {
    pub const ALL: [Comparator; 10] = [
        Comparator::Eq,
        Comparator::Ne,
        Comparator::Gt,
        Comparator::Gte,
        Comparator::Lt,
        Comparator::Lte,
        Comparator::Contain,
        Comparator::Like,
        Comparator::In,
        Comparator::Nin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Comparator::Eq => "eq",
            Comparator::Ne => "ne",
            Comparator::Gt => "gt",
            Comparator::Gte => "gte",
            Comparator::Lt => "lt",
            Comparator::Lte => "lte",
            Comparator::Contain => "contain",
            Comparator::Like => "like",
            Comparator::In => "in",
            Comparator::Nin => "nin",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

/// Logical combination of statements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    And,
    Or,
    Not,
}

impl Operator {
    pub const ALL: [Operator; 3] = [Operator::And, Operator::Or, Operator::Not];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::And => "and",
            Operator::Or => "or",
            Operator::Not => "not",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|o| o.as_str() == name)
    }
}

/// Literal on the right-hand side of a comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<FilterValue>),
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Bool(b) => write!(f, "{}", b),
            FilterValue::Int(i) => write!(f, "{}", i),
            // Debug keeps the fractional part so `5.0` reads back as a float
            FilterValue::Float(x) => write!(f, "{:?}", x),
            FilterValue::Str(s) => write!(f, "{:?}", s),
            FilterValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Parsed, store-independent filter tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StructuredFilter {
    Comparison {
        comparator: Comparator,
        attribute: String,
        value: FilterValue,
    },
    Operation {
        operator: Operator,
        arguments: Vec<StructuredFilter>,
    },
}

impl fmt::Display for StructuredFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StructuredFilter::Comparison {
                comparator,
                attribute,
                value,
            } => write!(f, "{}({:?}, {})", comparator.as_str(), attribute, value),
            StructuredFilter::Operation {
                operator,
                arguments,
            } => {
                write!(f, "{}(", operator.as_str())?;
                for (i, arg) in arguments.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Parse a filter expression into a [`StructuredFilter`]
pub fn parse(input: &str) -> Result<StructuredFilter, ParseError> {
    let mut parser = Parser {
        src: input,
        pos: 0,
        depth: 0,
    };
    parser.skip_whitespace();
    if parser.at_end() {
        return Err(ParseError::new(0, "empty filter expression"));
    }

    let filter = parser.statement()?;

    parser.skip_whitespace();
    if !parser.at_end() {
        return Err(ParseError::new(parser.pos, "unexpected trailing input"));
    }

    Ok(filter)
}

enum Expr {
    Statement(StructuredFilter),
    Value(FilterValue),
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(c) if c == expected => {
                self.bump();
                Ok(())
            }
            Some(c) => Err(ParseError::new(
                self.pos,
                format!("expected '{}', found '{}'", expected, c),
            )),
            None => Err(ParseError::new(
                self.pos,
                format!("expected '{}', found end of input", expected),
            )),
        }
    }

    fn enter(&mut self, start: usize) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ParseError::new(start, "filter nested too deeply"));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn identifier(&mut self) -> &'a str {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.bump();
        }
        &self.src[start..self.pos]
    }

    fn statement(&mut self) -> Result<StructuredFilter, ParseError> {
        let start = self.pos;
        match self.expr()? {
            Expr::Statement(filter) => Ok(filter),
            Expr::Value(_) => Err(ParseError::new(
                start,
                "expected a comparison or logical operation",
            )),
        }
    }

    fn expr(&mut self) -> Result<Expr, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        match self.peek() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                let name = self.identifier();
                self.skip_whitespace();
                if self.peek() == Some('(') {
                    return self.call(start, name).map(Expr::Statement);
                }
                match name {
                    "true" | "True" | "TRUE" => Ok(Expr::Value(FilterValue::Bool(true))),
                    "false" | "False" | "FALSE" => Ok(Expr::Value(FilterValue::Bool(false))),
                    _ => Err(ParseError::new(
                        start,
                        format!("unexpected identifier '{}'", name),
                    )),
                }
            }
            _ => self.value().map(Expr::Value),
        }
    }

    fn call(&mut self, start: usize, name: &str) -> Result<StructuredFilter, ParseError> {
        self.enter(start)?;
        self.expect('(')?;
        let args = self.arguments(')')?;
        self.leave();

        if let Some(comparator) = Comparator::from_name(name) {
            return comparison(start, comparator, args);
        }

        if let Some(operator) = Operator::from_name(name) {
            return operation(start, operator, args);
        }

        Err(ParseError::new(
            start,
            format!("unknown function '{}'", name),
        ))
    }

    /// Comma-separated expressions up to and including `close`
    fn arguments(&mut self, close: char) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        self.skip_whitespace();
        if self.peek() == Some(close) {
            self.bump();
            return Ok(args);
        }

        loop {
            args.push(self.expr()?);
            self.skip_whitespace();
            match self.bump() {
                Some(',') => continue,
                Some(c) if c == close => return Ok(args),
                Some(c) => {
                    return Err(ParseError::new(
                        self.pos - c.len_utf8(),
                        format!("expected ',' or '{}', found '{}'", close, c),
                    ))
                }
                None => {
                    return Err(ParseError::new(
                        self.pos,
                        format!("expected '{}', found end of input", close),
                    ))
                }
            }
        }
    }

    fn value(&mut self) -> Result<FilterValue, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        match self.peek() {
            Some(q @ ('"' | '\'')) => self.string(q).map(FilterValue::Str),
            Some('[') => {
                self.enter(start)?;
                self.bump();
                let args = self.arguments(']')?;
                self.leave();

                let mut items = Vec::new();
                for arg in args {
                    match arg {
                        Expr::Value(v) => items.push(v),
                        Expr::Statement(_) => {
                            return Err(ParseError::new(
                                start,
                                "lists may only contain values",
                            ))
                        }
                    }
                }
                Ok(FilterValue::List(items))
            }
            Some(c) if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => self.number(),
            Some(c) => Err(ParseError::new(start, format!("unexpected character '{}'", c))),
            None => Err(ParseError::new(start, "unexpected end of input")),
        }
    }

    fn string(&mut self, quote: char) -> Result<String, ParseError> {
        let start = self.pos;
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some(c) => out.push(c),
                    None => break,
                },
                Some(c) if c == quote => return Ok(out),
                Some(c) => out.push(c),
                None => break,
            }
        }
        Err(ParseError::new(start, "unterminated string"))
    }

    fn number(&mut self) -> Result<FilterValue, ParseError> {
        let start = self.pos;
        while matches!(
            self.peek(),
            Some(c) if c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E')
        ) {
            self.bump();
        }
        let text = &self.src[start..self.pos];

        if text.contains(['.', 'e', 'E']) {
            text.parse::<f64>()
                .map(FilterValue::Float)
                .map_err(|_| ParseError::new(start, format!("invalid number '{}'", text)))
        } else {
            text.parse::<i64>()
                .map(FilterValue::Int)
                .map_err(|_| ParseError::new(start, format!("invalid number '{}'", text)))
        }
    }
}

fn comparison(
    start: usize,
    comparator: Comparator,
    args: Vec<Expr>,
) -> Result<StructuredFilter, ParseError> {
    let name = comparator.as_str();
    let [attribute, value]: [Expr; 2] = args.try_into().map_err(|args: Vec<Expr>| {
        ParseError::new(
            start,
            format!("{} expects 2 arguments, got {}", name, args.len()),
        )
    })?;

    let attribute = match attribute {
        Expr::Value(FilterValue::Str(s)) => s,
        _ => {
            return Err(ParseError::new(
                start,
                format!("{} expects a string attribute name", name),
            ))
        }
    };

    let value = match value {
        Expr::Value(v) => v,
        Expr::Statement(_) => {
            return Err(ParseError::new(
                start,
                format!("{} expects a value, not a statement", name),
            ))
        }
    };

    Ok(StructuredFilter::Comparison {
        comparator,
        attribute,
        value,
    })
}

fn operation(
    start: usize,
    operator: Operator,
    args: Vec<Expr>,
) -> Result<StructuredFilter, ParseError> {
    let name = operator.as_str();
    let mut arguments = Vec::with_capacity(args.len());
    for arg in args {
        match arg {
            Expr::Statement(s) => arguments.push(s),
            Expr::Value(v) => {
                return Err(ParseError::new(
                    start,
                    format!("{} expects statements, got value {}", name, v),
                ))
            }
        }
    }

    match operator {
        Operator::Not if arguments.len() != 1 => Err(ParseError::new(
            start,
            format!("not expects 1 argument, got {}", arguments.len()),
        )),
        Operator::And | Operator::Or if arguments.is_empty() => Err(ParseError::new(
            start,
            format!("{} expects at least 1 argument", name),
        )),
        Operator::And | Operator::Or if arguments.len() == 1 => Ok(arguments.remove(0)),
        _ => Ok(StructuredFilter::Operation {
            operator,
            arguments,
        }),
    }
}
