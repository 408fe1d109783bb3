//! Core value model for the interpreter.
//!
//! The main type, [`Value`], is the tagged union that every other layer of the
//! crate traffics in: seven language-visible kinds (none, integer, real,
//! string, identifier, list, quoted) plus first-class error values and
//! function values. Each value carries the byte offset in the source text
//! that produced it, and function values additionally carry a handle to the
//! environment frame captured at their point of definition.
//!
//! Cloning a `Value` is the canonical structural copy: all payloads are owned
//! and copied, while the closure handle is a shared reference into the
//! original frame, so a copied function still resolves against the
//! environment it closed over.

use std::fmt;

use crate::mem::MemRef;

/// The closed set of value kinds, plus `Any` which only ever appears in
/// parameter and return annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    None,
    Quoted,
    Any,
    List,
    Error,
    String,
    Integer,
    Real,
    Identifier,
    Function,
}

impl Kind {
    /// The annotation symbol used in source text (`:I`, `:S`, ...).
    pub fn symbol(self) -> &'static str {
        match self {
            Kind::None => ":_",
            Kind::Quoted => ":Q",
            Kind::Any => ":*",
            Kind::List => ":L",
            Kind::Error => ":E",
            Kind::String => ":S",
            Kind::Integer => ":I",
            Kind::Real => ":R",
            Kind::Identifier => ":X",
            Kind::Function => ":F",
        }
    }

    /// Resolve an annotation symbol back to a kind.
    pub fn from_symbol(symbol: &str) -> Option<Kind> {
        match symbol {
            ":_" => Some(Kind::None),
            ":Q" => Some(Kind::Quoted),
            ":*" => Some(Kind::Any),
            ":L" => Some(Kind::List),
            ":E" => Some(Kind::Error),
            ":S" => Some(Kind::String),
            ":I" => Some(Kind::Integer),
            ":R" => Some(Kind::Real),
            ":X" => Some(Kind::Identifier),
            ":F" => Some(Kind::Function),
            _ => None,
        }
    }

    /// Human-readable kind name, as used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            Kind::None => "none",
            Kind::Quoted => "quoted",
            Kind::Any => "any",
            Kind::List => "list",
            Kind::Error => "error",
            Kind::String => "string",
            Kind::Integer => "integer",
            Kind::Real => "real",
            Kind::Identifier => "identifier",
            Kind::Function => "function",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Payload of an error value: where it came from and a pre-rendered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorValue {
    /// Path of the file the error originated in; empty for errors minted
    /// outside any file context (parser literals, host builtins).
    pub file: String,
    /// Byte offset into that file.
    pub position: u32,
    pub message: String,
}

/// A formal parameter of a function: name plus expected kind, where
/// [`Kind::Any`] means unconstrained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub kind: Kind,
}

impl Parameter {
    pub fn new(name: impl Into<String>, kind: Kind) -> Self {
        Parameter {
            name: name.into(),
            kind,
        }
    }
}

/// A user-defined function: typed parameters, declared return kind, variadic
/// flag, and the unevaluated body expressions. The captured closure frame
/// lives on the enclosing [`Value`], not here, so that the function payload
/// itself stays comparable.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub parameters: Vec<Parameter>,
    pub return_kind: Kind,
    pub variadic: bool,
    pub body: Vec<Value>,
}

/// The payload of a [`Value`], discriminated by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Data {
    None,
    Integer(i64),
    Real(f64),
    Str(String),
    Identifier(String),
    List(Vec<Value>),
    Quoted(Box<Value>),
    Error(ErrorValue),
    Function(Function),
}

/// A value in the language.
///
/// `pos` is the byte offset in the source text that produced the value (zero
/// when the value was synthesized at runtime). `closure` is only ever set on
/// function values and holds the frame captured when the literal was
/// evaluated.
#[derive(Clone)]
pub struct Value {
    pub data: Data,
    pub pos: u32,
    pub closure: Option<MemRef>,
}

impl Value {
    pub fn none() -> Value {
        Value::from_data(Data::None)
    }

    pub fn integer(n: i64) -> Value {
        Value::from_data(Data::Integer(n))
    }

    pub fn real(r: f64) -> Value {
        Value::from_data(Data::Real(r))
    }

    pub fn string(s: impl Into<String>) -> Value {
        Value::from_data(Data::Str(s.into()))
    }

    pub fn identifier(name: impl Into<String>) -> Value {
        Value::from_data(Data::Identifier(name.into()))
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::from_data(Data::List(items))
    }

    pub fn quoted(inner: Value) -> Value {
        Value::from_data(Data::Quoted(Box::new(inner)))
    }

    /// An error value with no file or position attribution. The evaluation
    /// context re-stamps file and position when it can do better.
    pub fn error(message: impl Into<String>) -> Value {
        Value::from_data(Data::Error(ErrorValue {
            file: String::new(),
            position: 0,
            message: message.into(),
        }))
    }

    fn from_data(data: Data) -> Value {
        Value {
            data,
            pos: 0,
            closure: None,
        }
    }

    /// Attach a source position, builder-style.
    pub fn at(mut self, pos: u32) -> Value {
        self.pos = pos;
        self
    }

    pub fn kind(&self) -> Kind {
        match &self.data {
            Data::None => Kind::None,
            Data::Integer(_) => Kind::Integer,
            Data::Real(_) => Kind::Real,
            Data::Str(_) => Kind::String,
            Data::Identifier(_) => Kind::Identifier,
            Data::List(_) => Kind::List,
            Data::Quoted(_) => Kind::Quoted,
            Data::Error(_) => Kind::Error,
            Data::Function(_) => Kind::Function,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.data, Data::Error(_))
    }

    /// Render the value in the canonical textual form the parser accepts.
    ///
    /// Total and pure. Round-trips for every kind except functions, whose
    /// rendering is informational only.
    pub fn encode(&self) -> String {
        match &self.data {
            Data::None => "_".to_owned(),
            Data::Quoted(inner) => format!("'{}", inner.encode()),
            Data::List(items) => {
                if items.is_empty() {
                    "()".to_owned()
                } else {
                    let parts: Vec<String> = items.iter().map(Value::encode).collect();
                    format!("({})", parts.join(" "))
                }
            }
            Data::Str(s) => escape_string(s),
            Data::Integer(n) => n.to_string(),
            // {:?} keeps the decimal point on whole reals and stays the
            // shortest form that round-trips through f64.
            Data::Real(r) => format!("{r:?}"),
            Data::Identifier(name) => name.clone(),
            Data::Error(err) => {
                if err.file.is_empty() {
                    format!("ERROR:{}:{}", err.position, err.message)
                } else {
                    format!("ERROR:{}:{}:{}", err.file, err.position, err.message)
                }
            }
            Data::Function(function) => format!("FUNCTION:LEN:{}", function.body.len()),
        }
    }
}

/// Equality is structural over payloads; source positions and closure
/// handles do not participate, so a parsed value compares equal to the same
/// value re-parsed from its encoding.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        self.data == other.data
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Closure frames can reference the value that holds them; print
        // presence only.
        let mut s = f.debug_struct("Value");
        s.field("data", &self.data).field("pos", &self.pos);
        if self.closure.is_some() {
            s.field("closure", &"<frame>");
        }
        s.finish()
    }
}

fn escape_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 2);
    result.push('"');
    for c in s.chars() {
        match c {
            '"' => result.push_str("\\\""),
            '\\' => result.push_str("\\\\"),
            '\n' => result.push_str("\\n"),
            '\t' => result.push_str("\\t"),
            '\r' => result.push_str("\\r"),
            _ => result.push(c),
        }
    }
    result.push('"');
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode() {
        let cases: Vec<(Value, &str)> = vec![
            (Value::none(), "_"),
            (Value::integer(42), "42"),
            (Value::integer(-7), "-7"),
            (Value::real(3.14), "3.14"),
            (Value::real(2.0), "2.0"),
            (Value::string("hello"), "\"hello\""),
            (Value::string("a\"b\\c\nd\te\rf"), "\"a\\\"b\\\\c\\nd\\te\\rf\""),
            (Value::identifier("int/add"), "int/add"),
            (Value::list(vec![]), "()"),
            (
                Value::list(vec![
                    Value::identifier("set"),
                    Value::identifier("x"),
                    Value::integer(1),
                ]),
                "(set x 1)",
            ),
            (
                Value::quoted(Value::list(vec![Value::integer(1), Value::integer(2)])),
                "'(1 2)",
            ),
            (Value::quoted(Value::quoted(Value::none())), "''_"),
            (Value::error("boom"), "ERROR:0:boom"),
        ];

        for (value, expected) in cases {
            assert_eq!(value.encode(), expected);
        }
    }

    #[test]
    fn test_encode_error_with_file() {
        let err = Value {
            data: Data::Error(ErrorValue {
                file: "main.slpx".to_owned(),
                position: 12,
                message: "boom".to_owned(),
            }),
            pos: 12,
            closure: None,
        };
        assert_eq!(err.encode(), "ERROR:main.slpx:12:boom");
    }

    #[test]
    fn test_encode_function_is_informational() {
        let function = Value::from_data(Data::Function(Function {
            parameters: vec![Parameter::new("x", Kind::Integer)],
            return_kind: Kind::Integer,
            variadic: false,
            body: vec![Value::integer(1), Value::integer(2)],
        }));
        assert_eq!(function.encode(), "FUNCTION:LEN:2");
    }

    #[test]
    fn test_kind_symbols_round_trip() {
        let kinds = [
            Kind::None,
            Kind::Quoted,
            Kind::Any,
            Kind::List,
            Kind::Error,
            Kind::String,
            Kind::Integer,
            Kind::Real,
            Kind::Identifier,
            Kind::Function,
        ];
        for kind in kinds {
            assert_eq!(Kind::from_symbol(kind.symbol()), Some(kind));
        }
        assert_eq!(Kind::from_symbol(":nope"), None);
        assert_eq!(Kind::from_symbol("I"), None);
    }

    #[test]
    fn test_clone_is_structural_copy() {
        let original = Value::list(vec![
            Value::string("hello"),
            Value::list(vec![Value::quoted(Value::integer(42))]),
        ]);
        let copied = original.clone();

        let mut mutated = original;
        if let Data::List(items) = &mut mutated.data {
            items[0] = Value::string("modified");
            if let Data::List(nested) = &mut items[1].data {
                nested[0] = Value::quoted(Value::integer(999));
            }
        }

        assert_eq!(copied.encode(), "(\"hello\" ('42))");
        assert_eq!(mutated.encode(), "(\"modified\" ('999))");
    }

    #[test]
    fn test_equality_ignores_positions() {
        let a = Value::integer(7).at(10);
        let b = Value::integer(7).at(99);
        assert_eq!(a, b);
        assert_ne!(Value::integer(7), Value::real(7.0));
    }
}
