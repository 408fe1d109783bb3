//! S-expression parsing with parse-time macro expansion.
//!
//! The parser is a single pass over the source bytes. It recognizes the
//! seven value kinds plus two sigils: `@(...)` error literals (the enclosed
//! items are encoded and space-joined into the error message) and
//! `$(name ?p1 ...)` macro definitions, whose very next expression becomes
//! the template. Macros are purely textual: a call site `($name a1 ...)` is
//! replaced during list parsing by the template with each `?pi` substituted
//! by a structural copy of the corresponding argument, re-expanded to a
//! fixed point so templates may call other macros. Macros never reach the
//! evaluator.
//!
//! Every produced value carries the byte offset it started at; parse errors
//! carry the offset where they were detected. For unclosed lists a second
//! scan locates the `(` that is actually unmatched, tracking string and
//! comment state, which is far more useful than the position of the
//! outermost opener.

use std::collections::HashMap;

use nom::Parser as _;
use nom::character::complete::{char, digit1, one_of};
use nom::combinator::{all_consuming, opt, recognize};
use nom::sequence::pair;
use thiserror::Error;

use crate::object::{Data, ErrorValue, Value};

/// Categories of parse failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    UnclosedList,
    UnclosedString,
    UnexpectedToken,
    EmptyIdentifier,
    InvalidMacro,
}

/// A parse failure: byte position plus a pre-rendered message. Callers that
/// hold the source text can format this with line/column (the config loader
/// does).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at position {position}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub position: usize,
    pub message: String,
}

impl ParseError {
    fn new(kind: ParseErrorKind, position: usize, message: impl Into<String>) -> ParseError {
        ParseError {
            kind,
            position,
            message: message.into(),
        }
    }
}

/// A macro collected during parsing: name, `?`-prefixed formal parameters,
/// and the unevaluated template.
#[derive(Debug, Clone)]
struct MacroDef {
    parameters: Vec<String>,
    template: Value,
}

pub struct Parser<'a> {
    source: &'a str,
    position: usize,
    macros: HashMap<String, MacroDef>,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Parser<'a> {
        Parser {
            source,
            position: 0,
            macros: HashMap::new(),
        }
    }

    /// Parse every top-level expression. Macro definitions (and bare `_`)
    /// produce no output value.
    pub fn parse_all(&mut self) -> Result<Vec<Value>, ParseError> {
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            if self.at_end() {
                break;
            }
            let value = self.parse()?;
            if value.kind() != crate::object::Kind::None {
                items.push(value);
            }
        }
        Ok(items)
    }

    /// Parse a single expression at the cursor.
    pub fn parse(&mut self) -> Result<Value, ParseError> {
        self.skip_whitespace();

        if self.at_end() {
            return Ok(Value::none().at(self.position as u32));
        }

        match self.peek() {
            b'(' => self.parse_list(),
            b'\'' => {
                let quote_pos = self.position;
                self.position += 1;
                let inner = self.parse()?;
                Ok(Value::quoted(inner).at(quote_pos as u32))
            }
            b'@' => self.parse_error_literal(),
            b'$' => {
                if self.source.as_bytes().get(self.position + 1) == Some(&b'(') {
                    self.parse_macro_definition()
                } else {
                    self.parse_atom()
                }
            }
            b'_' => {
                let none_pos = self.position;
                self.position += 1;
                Ok(Value::none().at(none_pos as u32))
            }
            _ => self.parse_atom(),
        }
    }

    fn parse_list(&mut self) -> Result<Value, ParseError> {
        let list_start = self.position;
        self.position += 1;
        let mut items = Vec::new();

        loop {
            self.skip_whitespace();
            if self.at_end() {
                let open = self.locate_unmatched_open(list_start);
                return Err(ParseError::new(
                    ParseErrorKind::UnclosedList,
                    open,
                    "unclosed list",
                ));
            }
            if self.peek() == b')' {
                self.position += 1;
                let list = Value::list(items).at(list_start as u32);
                return self.expand_macro_if_needed(list);
            }
            items.push(self.parse()?);
        }
    }

    fn parse_atom(&mut self) -> Result<Value, ParseError> {
        if self.peek() == b'"' {
            return self.parse_string();
        }

        let start = self.position;
        while !self.at_end() {
            let b = self.peek();
            if is_whitespace(b) || b == b'(' || b == b')' {
                break;
            }
            self.position += 1;
        }

        let text = &self.source[start..self.position];
        if text.is_empty() {
            return Err(ParseError::new(
                ParseErrorKind::EmptyIdentifier,
                start,
                "empty identifier",
            ));
        }

        Ok(classify_atom(text).at(start as u32))
    }

    fn parse_string(&mut self) -> Result<Value, ParseError> {
        let string_start = self.position;
        self.position += 1;
        let content_start = self.position;
        let bytes = self.source.as_bytes();

        while self.position < bytes.len() {
            if bytes[self.position] == b'"' {
                // The closing quote is the first one behind an even number
                // of backslashes.
                let mut escapes = 0;
                let mut i = self.position;
                while i > content_start && bytes[i - 1] == b'\\' {
                    escapes += 1;
                    i -= 1;
                }
                if escapes % 2 == 0 {
                    let raw = &self.source[content_start..self.position];
                    self.position += 1;
                    return Ok(Value::string(unescape_string(raw)).at(string_start as u32));
                }
            }
            self.position += 1;
        }

        Err(ParseError::new(
            ParseErrorKind::UnclosedString,
            string_start,
            "unclosed quoted string",
        ))
    }

    fn parse_error_literal(&mut self) -> Result<Value, ParseError> {
        let error_pos = self.position;
        self.position += 1;
        self.skip_whitespace();

        if self.at_end() || self.peek() != b'(' {
            return Err(ParseError::new(
                ParseErrorKind::UnexpectedToken,
                error_pos,
                "expected '(' after @",
            ));
        }

        let list_value = self.parse_list()?;
        let Data::List(items) = &list_value.data else {
            return Err(ParseError::new(
                ParseErrorKind::UnexpectedToken,
                error_pos,
                "expected list after @",
            ));
        };

        let message = items
            .iter()
            .map(Value::encode)
            .collect::<Vec<String>>()
            .join(" ");

        Ok(Value {
            data: Data::Error(ErrorValue {
                file: String::new(),
                position: error_pos as u32,
                message,
            }),
            pos: error_pos as u32,
            closure: None,
        })
    }

    fn parse_macro_definition(&mut self) -> Result<Value, ParseError> {
        let macro_pos = self.position;
        self.position += 1;

        let pattern_value = self.parse_list()?;
        let Data::List(pattern) = &pattern_value.data else {
            return Err(ParseError::new(
                ParseErrorKind::InvalidMacro,
                macro_pos,
                "expected pattern list after $",
            ));
        };

        if pattern.is_empty() {
            return Err(ParseError::new(
                ParseErrorKind::InvalidMacro,
                macro_pos,
                "macro pattern cannot be empty",
            ));
        }

        let Data::Identifier(name) = &pattern[0].data else {
            return Err(ParseError::new(
                ParseErrorKind::InvalidMacro,
                macro_pos,
                "macro name must be an identifier",
            ));
        };
        let name = name.clone();

        let mut parameters = Vec::with_capacity(pattern.len() - 1);
        for item in &pattern[1..] {
            let Data::Identifier(param) = &item.data else {
                return Err(ParseError::new(
                    ParseErrorKind::InvalidMacro,
                    macro_pos,
                    "macro parameter must be an identifier",
                ));
            };
            if !param.starts_with('?') {
                return Err(ParseError::new(
                    ParseErrorKind::InvalidMacro,
                    macro_pos,
                    "macro parameter must start with ?",
                ));
            }
            parameters.push(param.clone());
        }

        let template = self.parse()?;
        self.macros.insert(
            name,
            MacroDef {
                parameters,
                template,
            },
        );

        // Definitions leave no trace in the output stream.
        Ok(Value::none().at(macro_pos as u32))
    }

    fn expand_macro_if_needed(&mut self, list_value: Value) -> Result<Value, ParseError> {
        let Data::List(items) = &list_value.data else {
            return Ok(list_value);
        };
        let Some(head) = items.first() else {
            return Ok(list_value);
        };
        let Data::Identifier(call_name) = &head.data else {
            return Ok(list_value);
        };
        let Some(macro_name) = call_name.strip_prefix('$') else {
            return Ok(list_value);
        };

        let Some(def) = self.macros.get(macro_name).cloned() else {
            return Err(ParseError::new(
                ParseErrorKind::InvalidMacro,
                list_value.pos as usize,
                format!("undefined macro ${macro_name}"),
            ));
        };

        if items.len() - 1 != def.parameters.len() {
            return Err(ParseError::new(
                ParseErrorKind::InvalidMacro,
                list_value.pos as usize,
                format!(
                    "macro ${macro_name} expects {} arguments, got {}",
                    def.parameters.len(),
                    items.len() - 1
                ),
            ));
        }

        let mut bindings = HashMap::new();
        for (param, argument) in def.parameters.iter().zip(&items[1..]) {
            bindings.insert(param.clone(), argument.clone());
        }

        // The expansion inherits the call-site offset.
        let expanded = substitute(&def.template, &bindings).at(list_value.pos);

        // Templates may themselves be macro calls; expand to a fixed point.
        if matches!(expanded.data, Data::List(_)) {
            return self.expand_macro_if_needed(expanded);
        }
        Ok(expanded)
    }

    /// Second pass for unclosed-list reporting: walk forward from the
    /// opener, tracking string and comment state, and report the innermost
    /// `(` left open.
    fn locate_unmatched_open(&self, from: usize) -> usize {
        let bytes = self.source.as_bytes();
        let mut open_stack = Vec::new();
        let mut in_string = false;
        let mut in_comment = false;
        let mut i = from;

        while i < bytes.len() {
            let b = bytes[i];
            if in_string {
                match b {
                    b'\\' => i += 1,
                    b'"' => in_string = false,
                    _ => {}
                }
            } else if in_comment {
                if b == b'\n' {
                    in_comment = false;
                }
            } else {
                match b {
                    b'"' => in_string = true,
                    b';' => in_comment = true,
                    b'(' => open_stack.push(i),
                    b')' => {
                        open_stack.pop();
                    }
                    _ => {}
                }
            }
            i += 1;
        }

        open_stack.last().copied().unwrap_or(from)
    }

    fn skip_whitespace(&mut self) {
        let bytes = self.source.as_bytes();
        while self.position < bytes.len() {
            let b = bytes[self.position];
            if is_whitespace(b) {
                self.position += 1;
            } else if b == b';' {
                while self.position < bytes.len() && bytes[self.position] != b'\n' {
                    self.position += 1;
                }
            } else {
                break;
            }
        }
    }

    fn at_end(&self) -> bool {
        self.position >= self.source.len()
    }

    fn peek(&self) -> u8 {
        self.source.as_bytes()[self.position]
    }
}

/// Replace template parameters with their bound arguments, recursing through
/// lists and quoted values. Bound arguments are copied structurally so a
/// parameter used twice yields independent values.
fn substitute(template: &Value, bindings: &HashMap<String, Value>) -> Value {
    match &template.data {
        Data::Identifier(name) => match bindings.get(name) {
            Some(replacement) => replacement.clone(),
            None => template.clone(),
        },
        Data::List(items) => {
            let substituted = items
                .iter()
                .map(|item| substitute(item, bindings))
                .collect();
            Value::list(substituted).at(template.pos)
        }
        Data::Quoted(inner) => Value::quoted(substitute(inner, bindings)).at(template.pos),
        _ => template.clone(),
    }
}

// Atom shapes. Signs that stand alone and malformed numbers (`3.`, `.5`,
// `1.2.3`) fall through to identifiers.

fn integer_text(input: &str) -> nom::IResult<&str, &str> {
    recognize(pair(opt(one_of("+-")), digit1)).parse(input)
}

fn real_text(input: &str) -> nom::IResult<&str, &str> {
    recognize(pair(
        pair(pair(opt(one_of("+-")), digit1), char('.')),
        digit1,
    ))
    .parse(input)
}

fn classify_atom(text: &str) -> Value {
    if all_consuming(integer_text).parse(text).is_ok() {
        return Value::integer(parse_wrapping_integer(text));
    }
    if all_consuming(real_text).parse(text).is_ok()
        && let Ok(real) = text.parse::<f64>()
    {
        return Value::real(real);
    }
    Value::identifier(text)
}

/// Decimal accumulation with two's-complement wrapping, so any all-digit
/// atom stays an integer no matter how long it is.
fn parse_wrapping_integer(text: &str) -> i64 {
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let mut value: i64 = 0;
    for b in digits.bytes() {
        value = value.wrapping_mul(10).wrapping_add(i64::from(b - b'0'));
    }
    if negative { value.wrapping_neg() } else { value }
}

fn unescape_string(raw: &str) -> String {
    let mut result = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some('"') => result.push('"'),
            Some('\\') => result.push('\\'),
            // Unknown escapes drop the backslash and keep the character.
            Some(other) => result.push(other),
            None => result.push('\\'),
        }
    }
    result
}

fn is_whitespace(b: u8) -> bool {
    b == b' ' || b == b'\t' || b == b'\n' || b == b'\r'
}
