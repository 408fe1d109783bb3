//! SLPX - an interpreter for the SLP expression language
//!
//! SLP is a small homoiconic, parenthesized expression language: source text
//! is a sequence of s-expressions over seven value kinds (none, integer,
//! real, string, identifier, list, quoted), evaluated by a tree-walking
//! evaluator with lexically scoped environments, first-class functions with
//! closures and variadic forms, and structured error values that propagate
//! like data rather than exceptions.
//!
//! ```text
//! (set mk (fn (n :I) :F (fn (x :I) :I (int/add x n))))
//! (set add5 (mk 5))
//! (putln (add5 10))           ; prints 15
//! (try (int/div 1 0) $error)  ; "int/div: division by zero"
//! ```
//!
//! ## Strict typing
//!
//! Parameters and return values carry kind annotations (`:I` integer, `:S`
//! string, `:*` any, ...). There is no coercion: arity and kind mismatches
//! at call sites produce error values, conditions must be integers (`if`
//! tests strict positivity), and real equality is bitwise IEEE.
//!
//! ## Errors are data
//!
//! Runtime failures are `error` values flowing through the normal value
//! channel; they short-circuit argument evaluation and body execution and
//! are caught by `try`, which binds the message to `$error` for its
//! handler. Parse failures are the one Rust-level error (`ParseError`).
//!
//! ## Capabilities
//!
//! Host functionality reaches the language through named function groups
//! registered on an evaluation context; terminal and file access go through
//! the injectable [`io::Io`] and [`fs::Fs`] capability traits shared by all
//! frames of a context.
//!
//! ## Modules
//!
//! - [`object`]: the value model and canonical encoder
//! - [`parser`]: s-expression parsing with parse-time macro expansion
//! - [`mem`]: environment frames with parent chains and fork-on-call
//! - [`context`]: the evaluator and the builtin calling convention
//! - [`groups`]: the standard function groups
//! - [`session`]: script-running surface over a persistent environment
//! - [`config`]: typed configuration extraction under a timeout

pub mod config;
pub mod context;
pub mod fs;
pub mod groups;
pub mod io;
pub mod mem;
pub mod object;
pub mod parser;
pub mod session;

pub use context::{Builtin, ContextBuilder, EvalContext, FunctionGroup};
pub use object::{Kind, Value};
pub use parser::{ParseError, Parser};
pub use session::{Session, SessionBuilder};
