//! Reader for the small subset of Python literals that form fields carry:
//! lists, tuples, strings, numbers, `True`/`False`/`None`.
//!
//! Used where the compiler must look inside user text at compile time:
//! StateMonitor `record` indices, monitor `variables`, and the
//! SpikeGeneratorGroup length check. Anything that is not a pure literal
//! (`arange(5)`, `[1, 2]*ms`) is rejected and left for the engine to judge.

use pest::error::LineColLocation;
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use thiserror::Error;

#[derive(Parser)]
#[grammar_inline = r#"
WHITESPACE = _{ " " | "\t" | "\r" | "\n" }

literal = { SOI ~ value ~ EOI }
value = _{ list | tuple | paren | string | number | boolean | none }

list = { "[" ~ (value ~ ("," ~ value)* ~ ","?)? ~ "]" }
tuple = { "(" ~ ")" | "(" ~ value ~ "," ~ (value ~ ("," ~ value)* ~ ","?)? ~ ")" }
paren = _{ "(" ~ value ~ ")" }

string = ${ "'" ~ single_inner ~ "'" | "\"" ~ double_inner ~ "\"" }
single_inner = @{ (!("'" | "\\" | NEWLINE) ~ ANY | "\\" ~ ANY)* }
double_inner = @{ (!("\"" | "\\" | NEWLINE) ~ ANY | "\\" ~ ANY)* }

number = @{
    ("-" | "+")? ~ (ASCII_DIGIT+ ~ ("." ~ ASCII_DIGIT*)? | "." ~ ASCII_DIGIT+)
    ~ (("e" | "E") ~ ("-" | "+")? ~ ASCII_DIGIT+)?
}
boolean = @{ ("True" | "False") ~ !(ASCII_ALPHANUMERIC | "_") }
none = @{ "None" ~ !(ASCII_ALPHANUMERIC | "_") }
"#]
struct LiteralParser;

/// Text that is not a readable literal
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct LiteralError {
    pub message: String,
}

impl LiteralError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A parsed Python literal
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    None,
    List(Vec<Literal>),
    Tuple(Vec<Literal>),
}

impl Literal {
    /// Elements of a list or tuple
    pub fn as_sequence(&self) -> Option<&[Literal]> {
        match self {
            Literal::List(items) | Literal::Tuple(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Literal::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::Str(text) => Some(text),
            _ => None,
        }
    }
}

/// Parse `text` as a single Python literal
pub fn parse_literal(text: &str) -> Result<Literal, LiteralError> {
    let mut pairs = LiteralParser::parse(Rule::literal, text).map_err(|e| {
        let column = match e.line_col {
            LineColLocation::Pos((_, col)) | LineColLocation::Span((_, col), _) => col,
        };
        LiteralError::new(format!("not a literal (stopped at column {column})"))
    })?;

    let value = pairs
        .next()
        .and_then(|literal| literal.into_inner().next())
        .ok_or_else(|| LiteralError::new("empty literal"))?;
    build(value)
}

fn build(pair: Pair<Rule>) -> Result<Literal, LiteralError> {
    match pair.as_rule() {
        Rule::list => Ok(Literal::List(build_items(pair)?)),
        Rule::tuple => Ok(Literal::Tuple(build_items(pair)?)),
        Rule::string => {
            let inner = pair.into_inner().next().map(|p| p.as_str()).unwrap_or("");
            Ok(Literal::Str(unescape(inner)))
        }
        Rule::number => parse_number(pair.as_str()),
        Rule::boolean => Ok(Literal::Bool(pair.as_str() == "True")),
        Rule::none => Ok(Literal::None),
        other => Err(LiteralError::new(format!("unexpected {other:?}"))),
    }
}

fn build_items(pair: Pair<Rule>) -> Result<Vec<Literal>, LiteralError> {
    pair.into_inner().map(build).collect()
}

fn parse_number(text: &str) -> Result<Literal, LiteralError> {
    let is_float = text.contains(['.', 'e', 'E']);
    if !is_float {
        if let Ok(value) = text.parse::<i64>() {
            return Ok(Literal::Int(value));
        }
    }
    text.parse::<f64>()
        .map(Literal::Float)
        .map_err(|_| LiteralError::new(format!("bad number '{text}'")))
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other @ ('\\' | '\'' | '"')) => out.push(other),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Read a literal sequence of integer indices such as `[0, 1, 5]`
pub fn index_list(text: &str) -> Result<Vec<i64>, LiteralError> {
    let literal = parse_literal(text)?;
    let items = literal
        .as_sequence()
        .ok_or_else(|| LiteralError::new("expected a list of indices"))?;
    items
        .iter()
        .map(|item| {
            item.as_int()
                .ok_or_else(|| LiteralError::new(format!("index {item:?} is not an integer")))
        })
        .collect()
}

/// Read variable names from `'v'` or `['v', 'w']`
pub fn name_list(text: &str) -> Option<Vec<String>> {
    match parse_literal(text).ok()? {
        Literal::Str(name) => Some(vec![name]),
        literal => literal
            .as_sequence()?
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect(),
    }
}

/// Length of `text` if it is a literal list or tuple
pub fn sequence_len(text: &str) -> Option<usize> {
    parse_literal(text).ok()?.as_sequence().map(<[Literal]>::len)
}
