//! Typed configuration loading.
//!
//! A configuration file is an ordinary script: it is evaluated with the full
//! standard surface in a fresh, isolated session, then the requested
//! variables are projected out of the final environment with kind
//! validation. Evaluation runs on a worker thread raced against a wall-clock
//! timeout; a timed-out worker is abandoned and its session (environment
//! included) is discarded with it, so the caller never observes partial
//! state.
//!
//! ```no_run
//! use std::time::Duration;
//! use slpx::config::{self, Variable};
//! use slpx::object::Kind;
//!
//! let variables = [
//!     Variable::required("app_name", Kind::String),
//!     Variable::required("port", Kind::Integer),
//!     Variable::optional("debug_mode", Kind::Integer),
//! ];
//! let values = config::load("config.slpx", &variables, Duration::from_secs(10))?;
//! # Ok::<(), config::ConfigError>(())
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use thiserror::Error;

use crate::fs::{Fs, HostFs};
use crate::io::{Io, StdIo};
use crate::mem;
use crate::object::{Data, Kind, Value};
use crate::session::SessionBuilder;

// Plenty of headroom for the default recursion ceiling.
const WORKER_STACK_SIZE: usize = 8 * 1024 * 1024;

/// One requested binding: the identifier to extract, the kind it must have
/// ([`Kind::Any`] accepts anything), and whether its absence is an error.
#[derive(Debug, Clone)]
pub struct Variable {
    pub identifier: String,
    pub kind: Kind,
    pub required: bool,
}

impl Variable {
    pub fn required(identifier: impl Into<String>, kind: Kind) -> Variable {
        Variable {
            identifier: identifier.into(),
            kind,
            required: true,
        }
    }

    pub fn optional(identifier: impl Into<String>, kind: Kind) -> Variable {
        Variable {
            identifier: identifier.into(),
            kind,
            required: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("config evaluation timed out")]
    Timeout,

    #[error("{0}")]
    Parse(String),

    #[error("{0}")]
    Eval(String),

    #[error("required variable '{0}' not found in config")]
    MissingVariable(String),

    #[error("type mismatch for variable '{name}': expected {expected}, got {actual}")]
    KindMismatch {
        name: String,
        expected: Kind,
        actual: Kind,
    },
}

/// Read and evaluate `file`, then extract `variables` from the resulting
/// environment. Host I/O and the host filesystem back the script.
pub fn load(
    file: impl AsRef<Path>,
    variables: &[Variable],
    timeout: Duration,
) -> Result<HashMap<String, Value>, ConfigError> {
    let file = file.as_ref();
    let content = std::fs::read_to_string(file)?;
    load_from_content(
        file,
        content,
        variables,
        timeout,
        Box::new(HostFs::new()),
        Box::new(StdIo::new()),
    )
}

/// Like [`load`] but with the script body already in hand and explicit
/// capabilities, for callers that embed their configuration or redirect its
/// I/O.
pub fn load_from_content(
    path: impl AsRef<Path>,
    content: String,
    variables: &[Variable],
    timeout: Duration,
    fs: Box<dyn Fs>,
    io: Box<dyn Io>,
) -> Result<HashMap<String, Value>, ConfigError> {
    let path_text = path.as_ref().to_string_lossy().into_owned();
    let requested = variables.to_vec();

    let (sender, receiver) = mpsc::channel();
    thread::Builder::new()
        .name("slpx-config".to_owned())
        .stack_size(WORKER_STACK_SIZE)
        .spawn(move || {
            let result = evaluate_and_extract(&path_text, &content, &requested, fs, io);
            let _ = sender.send(result);
        })?;

    match receiver.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => {
            tracing::warn!(timeout_ms = timeout.as_millis() as u64, "config evaluation timed out");
            Err(ConfigError::Timeout)
        }
        Err(RecvTimeoutError::Disconnected) => {
            Err(ConfigError::Eval("config worker terminated unexpectedly".to_owned()))
        }
    }
}

fn evaluate_and_extract(
    path: &str,
    content: &str,
    variables: &[Variable],
    fs: Box<dyn Fs>,
    io: Box<dyn Io>,
) -> Result<HashMap<String, Value>, ConfigError> {
    let mut session = SessionBuilder::new().with_fs(fs).with_io(io).build(path);

    let result = match session.evaluate(content) {
        Ok(result) => result,
        Err(parse_error) => {
            return Err(ConfigError::Parse(format_parse_error(
                path,
                content,
                parse_error.position,
                &parse_error.message,
            )));
        }
    };

    if let Data::Error(err) = &result.data {
        return Err(ConfigError::Eval(format_script_error(
            content,
            &err.file,
            err.position as usize,
            &err.message,
        )));
    }

    let frame = session.mem();
    let frame = mem::lock(&frame);
    let mut extracted = HashMap::new();

    for variable in variables {
        let Some(value) = frame.get(&variable.identifier, true) else {
            if variable.required {
                return Err(ConfigError::MissingVariable(variable.identifier.clone()));
            }
            continue;
        };

        if variable.kind != Kind::Any && value.kind() != variable.kind {
            return Err(ConfigError::KindMismatch {
                name: variable.identifier.clone(),
                expected: variable.kind,
                actual: value.kind(),
            });
        }

        extracted.insert(variable.identifier.clone(), value);
    }

    Ok(extracted)
}

fn format_parse_error(file: &str, content: &str, position: usize, message: &str) -> String {
    let (line, column, line_start, line_end) = position_to_line_col(content, position);
    let mut out = format!("Parse error in {file} at line {line}, column {column}:\n");
    push_source_caret(&mut out, content, line, column, line_start, line_end);
    out.push_str(message);
    out
}

fn format_script_error(content: &str, file: &str, position: usize, message: &str) -> String {
    if file.is_empty() {
        return format!("Error: {message}");
    }
    if position == 0 {
        return format!("Error in {file}:\n{message}");
    }
    let (line, column, line_start, line_end) = position_to_line_col(content, position);
    let mut out = format!("Error in {file} at line {line}, column {column}:\n");
    push_source_caret(&mut out, content, line, column, line_start, line_end);
    out.push_str(message);
    out
}

fn push_source_caret(
    out: &mut String,
    content: &str,
    line: usize,
    column: usize,
    line_start: usize,
    line_end: usize,
) {
    if line_start < content.len() && line_end <= content.len() {
        out.push_str(&format!("  {line} | {}\n", &content[line_start..line_end]));
        out.push_str("      ");
        for _ in 1..column {
            out.push(' ');
        }
        out.push_str("^\n");
    }
}

fn position_to_line_col(content: &str, position: usize) -> (usize, usize, usize, usize) {
    let mut line = 1;
    let mut column = 1;
    let mut line_start = 0;

    for (index, byte) in content.bytes().enumerate() {
        if index >= position {
            break;
        }
        if byte == b'\n' {
            line += 1;
            column = 1;
            line_start = index + 1;
        } else {
            column += 1;
        }
    }

    let mut line_end = line_start;
    let bytes = content.as_bytes();
    while line_end < bytes.len() && bytes[line_end] != b'\n' {
        line_end += 1;
    }

    (line, column, line_start, line_end)
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::io::BufferIo;

    fn load_source(
        source: &str,
        variables: &[Variable],
        timeout: Duration,
    ) -> Result<HashMap<String, Value>, ConfigError> {
        load_from_content(
            "config.slpx",
            source.to_owned(),
            variables,
            timeout,
            Box::new(HostFs::new()),
            Box::new(BufferIo::default()),
        )
    }

    #[test]
    fn test_extracts_typed_variables() {
        let values = load_source(
            "(set app_name \"demo\") (set port 8080) (set ratio 0.5)",
            &[
                Variable::required("app_name", Kind::String),
                Variable::required("port", Kind::Integer),
                Variable::required("ratio", Kind::Real),
            ],
            Duration::from_secs(5),
        )
        .unwrap();

        assert_eq!(values["app_name"], Value::string("demo"));
        assert_eq!(values["port"], Value::integer(8080));
        assert_eq!(values["ratio"], Value::real(0.5));
    }

    #[test]
    fn test_computed_values_and_any_kind() {
        let values = load_source(
            "(set base 40) (set answer (int/add base 2))",
            &[
                Variable::required("answer", Kind::Any),
                Variable::optional("base", Kind::Integer),
            ],
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(values["answer"], Value::integer(42));
        assert_eq!(values["base"], Value::integer(40));
    }

    #[test]
    fn test_missing_required_variable() {
        let error = load_source(
            "(set a 1)",
            &[
                Variable::required("a", Kind::Integer),
                Variable::required("b", Kind::String),
            ],
            Duration::from_secs(5),
        )
        .unwrap_err();

        match error {
            ConfigError::MissingVariable(name) => assert_eq!(name, "b"),
            other => panic!("expected MissingVariable, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_optional_variable_is_omitted() {
        let values = load_source(
            "(set a 1)",
            &[
                Variable::required("a", Kind::Integer),
                Variable::optional("b", Kind::String),
            ],
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(values.len(), 1);
        assert!(!values.contains_key("b"));
    }

    #[test]
    fn test_kind_mismatch() {
        let error = load_source(
            "(set port \"8080\")",
            &[Variable::required("port", Kind::Integer)],
            Duration::from_secs(5),
        )
        .unwrap_err();

        match error {
            ConfigError::KindMismatch {
                name,
                expected,
                actual,
            } => {
                assert_eq!(name, "port");
                assert_eq!(expected, Kind::Integer);
                assert_eq!(actual, Kind::String);
            }
            other => panic!("expected KindMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_error_is_formatted_with_line_and_column() {
        let error = load_source(
            "(set ok 1)\n(set broken\n",
            &[Variable::required("ok", Kind::Integer)],
            Duration::from_secs(5),
        )
        .unwrap_err();

        let ConfigError::Parse(message) = error else {
            panic!("expected Parse, got {error:?}");
        };
        assert!(message.contains("line 2"), "message was: {message}");
        assert!(message.contains("^"), "message was: {message}");
        assert!(message.contains("unclosed list"), "message was: {message}");
    }

    #[test]
    fn test_script_error_is_formatted() {
        let error = load_source(
            "(set ok 1)\n(int/div 1 0)",
            &[Variable::required("ok", Kind::Integer)],
            Duration::from_secs(5),
        )
        .unwrap_err();

        let ConfigError::Eval(message) = error else {
            panic!("expected Eval, got {error:?}");
        };
        assert!(
            message.contains("int/div: division by zero"),
            "message was: {message}"
        );
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let error = load(
            "definitely-not-here.slpx",
            &[Variable::required("a", Kind::Any)],
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(matches!(error, ConfigError::Io(_)));
    }

    #[test]
    fn test_timeout_abandons_the_worker() {
        // A quadratic iteration workload: far longer than the timeout, but
        // bounded, so the abandoned worker eventually winds down.
        let source = "\
            (set xs (list/new 1024 0)) \
            (set burn (fn (x :I) :I 1)) \
            (list/iter xs (fn (i :I) :I (do (list/iter xs burn) 1))) \
            (set done 1)";

        let started = std::time::Instant::now();
        let error = load_source(
            source,
            &[Variable::required("done", Kind::Integer)],
            Duration::from_millis(100),
        )
        .unwrap_err();

        assert!(matches!(error, ConfigError::Timeout));
        // The caller returns promptly; no partial result leaks out.
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_load_reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.slpx");
        std::fs::write(&path, "(set name \"from-disk\")").unwrap();

        let values = load(
            &path,
            &[Variable::required("name", Kind::String)],
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(values["name"], Value::string("from-disk"));
    }
}
