//! The evaluation context: dispatch, application, and the builtin calling
//! convention.
//!
//! [`EvalContext::evaluate`] walks a single value; lists delegate to
//! [`EvalContext::execute`], which applies either a user function value or a
//! host builtin resolved through the registered [`FunctionGroup`]s. Runtime
//! failures are first-class error values that short-circuit argument
//! evaluation and body execution; the only Rust-level error channel in the
//! crate is the parser's.
//!
//! Builtins are described by [`Builtin`]: the `evaluate_args` flag is the
//! single knob that separates special forms (which receive argument syntax
//! verbatim and drive their own evaluation) from eager functions. Both run
//! through one dispatch path with shared arity and kind validation.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::rc::Rc;

use crate::fs::{Fs, HostFs};
use crate::io::{Io, StdIo};
use crate::mem::{self, MemRef};
use crate::object::{Data, ErrorValue, Function, Kind, Parameter, Value};

/// Bound by the runtime in variadic calls to the list of evaluated
/// arguments.
pub const ARGS_BINDING: &str = "$args";
/// Bound by the runtime inside a `try` handler to the error's message.
pub const ERROR_BINDING: &str = "$error";
/// Sole parameter-list element marking a variadic function with no declared
/// positionals.
pub const VARIADIC_MARKER: &str = "..";

/// Recursion ceiling applied when the builder does not override it. Runaway
/// recursion becomes an error value instead of a host stack overflow.
pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 512;

/// Canonical host-builtin signature: the evaluation context plus the
/// (possibly pre-evaluated) argument list.
pub type HostBody = dyn Fn(&mut EvalContext, Vec<Value>) -> Value;

/// Descriptor of one host-provided builtin.
#[derive(Clone)]
pub struct Builtin {
    /// When false the builtin is a special form: it receives argument syntax
    /// unevaluated and is responsible for its own evaluation.
    pub evaluate_args: bool,
    /// Declared parameters; an empty list skips arity and kind validation
    /// entirely.
    pub parameters: Vec<Parameter>,
    pub return_kind: Kind,
    pub variadic: bool,
    pub body: Rc<HostBody>,
}

/// A named bundle of builtins, registered on a context as one unit.
pub struct FunctionGroup {
    name: String,
    functions: HashMap<String, Builtin>,
}

impl FunctionGroup {
    pub fn new(name: impl Into<String>) -> FunctionGroup {
        FunctionGroup {
            name: name.into(),
            functions: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn insert(&mut self, name: impl Into<String>, builtin: Builtin) {
        self.functions.insert(name.into(), builtin);
    }

    pub fn get(&self, name: &str) -> Option<&Builtin> {
        self.functions.get(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.functions.keys().cloned().collect()
    }
}

/// Builder for [`EvalContext`]. Capabilities and the root frame default to
/// host I/O, the host filesystem, and a fresh frame.
#[derive(Default)]
pub struct ContextBuilder {
    io: Option<Box<dyn Io>>,
    fs: Option<Box<dyn Fs>>,
    mem: Option<MemRef>,
    max_recursion_depth: Option<usize>,
    groups: Vec<FunctionGroup>,
}

impl ContextBuilder {
    pub fn new() -> ContextBuilder {
        ContextBuilder::default()
    }

    pub fn with_io(mut self, io: Box<dyn Io>) -> ContextBuilder {
        self.io = Some(io);
        self
    }

    pub fn with_fs(mut self, fs: Box<dyn Fs>) -> ContextBuilder {
        self.fs = Some(fs);
        self
    }

    pub fn with_mem(mut self, mem: MemRef) -> ContextBuilder {
        self.mem = Some(mem);
        self
    }

    pub fn with_max_recursion_depth(mut self, depth: usize) -> ContextBuilder {
        self.max_recursion_depth = Some(depth);
        self
    }

    pub fn with_function_group(mut self, group: FunctionGroup) -> ContextBuilder {
        self.groups.push(group);
        self
    }

    pub fn build(self) -> EvalContext {
        EvalContext {
            mem: self.mem.unwrap_or_else(mem::new_frame),
            io: Rc::new(RefCell::new(self.io.unwrap_or_else(|| Box::new(StdIo::new())))),
            fs: Rc::new(RefCell::new(self.fs.unwrap_or_else(|| Box::new(HostFs::new())))),
            groups: Rc::new(RefCell::new(self.groups)),
            imported: Rc::new(RefCell::new(HashSet::new())),
            depth: Rc::new(Cell::new(0)),
            max_depth: self.max_recursion_depth.unwrap_or(DEFAULT_MAX_RECURSION_DEPTH),
            current_file: String::new(),
        }
    }
}

/// One evaluation context: a frame handle, the shared capabilities, the
/// function-group table, the import-seen set, and the current file used for
/// error attribution and `use` resolution.
///
/// Cloning produces a sibling view over the same shared state; function
/// calls clone with a forked frame so call scopes stay isolated while
/// capabilities, groups, imports, and the depth counter remain shared.
#[derive(Clone)]
pub struct EvalContext {
    mem: MemRef,
    io: Rc<RefCell<Box<dyn Io>>>,
    fs: Rc<RefCell<Box<dyn Fs>>>,
    groups: Rc<RefCell<Vec<FunctionGroup>>>,
    imported: Rc<RefCell<HashSet<PathBuf>>>,
    depth: Rc<Cell<usize>>,
    max_depth: usize,
    current_file: String,
}

impl EvalContext {
    /// Evaluate one value, dispatched on its kind. Literals return
    /// themselves, quoted values unwrap one level, identifiers resolve, and
    /// lists execute as applications.
    pub fn evaluate(&mut self, value: &Value) -> Value {
        let _guard = match self.enter() {
            Ok(guard) => guard,
            Err(error) => return error,
        };

        match &value.data {
            Data::None
            | Data::Str(_)
            | Data::Integer(_)
            | Data::Real(_)
            | Data::Error(_)
            | Data::Function(_) => value.clone(),
            Data::Quoted(inner) => (**inner).clone(),
            Data::Identifier(name) => self.lookup_identifier(value, name),
            Data::List(items) => self.execute(items),
        }
    }

    /// Execute a list as an application. The empty list is `none`.
    pub fn execute(&mut self, list: &[Value]) -> Value {
        let Some((head_expr, arguments)) = list.split_first() else {
            return Value::none();
        };

        let head = self.evaluate(head_expr);
        if head.is_error() {
            return head;
        }

        match &head.data {
            Data::Function(_) => self.call_function(&head, arguments),
            Data::Identifier(name) => match self.lookup_builtin(name) {
                Some(builtin) => self.call_builtin(&builtin, arguments),
                None => self.error_from(head_expr, format!("function not found: {name}")),
            },
            _ => self.error_from(
                head_expr,
                format!("first element is not callable: {}", head.kind()),
            ),
        }
    }

    pub fn add_function_group(&mut self, group: FunctionGroup) {
        let mut groups = self.groups.borrow_mut();
        if let Some(existing) = groups.iter_mut().find(|g| g.name() == group.name()) {
            *existing = group;
        } else {
            groups.push(group);
        }
    }

    pub fn remove_function_group(&mut self, name: &str) {
        self.groups.borrow_mut().retain(|g| g.name() != name);
    }

    pub fn set_current_file(&mut self, path: impl Into<String>) {
        self.current_file = path.into();
    }

    pub fn current_file(&self) -> &str {
        &self.current_file
    }

    pub fn mem(&self) -> MemRef {
        self.mem.clone()
    }

    pub fn io(&self) -> Rc<RefCell<Box<dyn Io>>> {
        self.io.clone()
    }

    pub fn fs(&self) -> Rc<RefCell<Box<dyn Fs>>> {
        self.fs.clone()
    }

    /// Record an import target. Returns false when the path was already
    /// imported in this context (the caller then skips re-evaluation). The
    /// set is shared by every frame of the context.
    pub(crate) fn mark_imported(&self, path: PathBuf) -> bool {
        self.imported.borrow_mut().insert(path)
    }

    /// Error value stamped with the current file and the given offset.
    pub(crate) fn error_at(&self, pos: u32, message: impl Into<String>) -> Value {
        Value {
            data: Data::Error(ErrorValue {
                file: self.current_file.clone(),
                position: pos,
                message: message.into(),
            }),
            pos,
            closure: None,
        }
    }

    /// Error value positioned at `value`'s source offset.
    pub(crate) fn error_from(&self, value: &Value, message: impl Into<String>) -> Value {
        self.error_at(value.pos, message)
    }

    pub(crate) fn child_with_frame(&self, frame: MemRef) -> EvalContext {
        let mut child = self.clone();
        child.mem = frame;
        child
    }

    fn enter(&self) -> Result<DepthGuard, Value> {
        let next = self.depth.get() + 1;
        if next > self.max_depth {
            return Err(self.error_at(
                0,
                format!("evaluation depth limit exceeded (max: {})", self.max_depth),
            ));
        }
        self.depth.set(next);
        Ok(DepthGuard(self.depth.clone()))
    }

    fn lookup_identifier(&mut self, source: &Value, name: &str) -> Value {
        if let Some(bound) = mem::lock(&self.mem).get(name, true) {
            return bound;
        }
        // A builtin name evaluates to a fresh identifier, the marker for the
        // callable.
        if self.lookup_builtin(name).is_some() {
            return Value::identifier(name).at(source.pos);
        }
        self.error_from(source, format!("undefined identifier: {name}"))
    }

    fn lookup_builtin(&self, name: &str) -> Option<Builtin> {
        let groups = self.groups.borrow();
        for group in groups.iter() {
            if let Some(builtin) = group.get(name) {
                return Some(builtin.clone());
            }
        }
        None
    }

    // ---- user function application ----

    fn call_function(&mut self, function_value: &Value, arguments: &[Value]) -> Value {
        let Data::Function(function) = &function_value.data else {
            return self.error_from(function_value, "not a function value".to_owned());
        };

        // Restore the frame captured at definition; a function with no
        // closure (builtins never mint one, but host embedders may) runs
        // against the current frame.
        let closure = function_value
            .closure
            .clone()
            .unwrap_or_else(|| self.mem.clone());
        let call_frame = mem::fork(&closure);

        if function.variadic {
            self.call_variadic_function(function, arguments, call_frame)
        } else {
            self.call_fixed_function(function, arguments, call_frame)
        }
    }

    fn call_variadic_function(
        &mut self,
        function: &Function,
        arguments: &[Value],
        call_frame: MemRef,
    ) -> Value {
        let first_pos = arguments.first().map_or(0, |a| a.pos);
        let mut evaluated = Vec::with_capacity(arguments.len());
        for argument in arguments {
            let value = self.evaluate(argument);
            if value.is_error() {
                return value;
            }
            evaluated.push(value);
        }

        mem::lock(&call_frame).set(
            ARGS_BINDING,
            Value::list(evaluated).at(first_pos),
            false,
        );

        self.run_body(function, call_frame)
    }

    fn call_fixed_function(
        &mut self,
        function: &Function,
        arguments: &[Value],
        call_frame: MemRef,
    ) -> Value {
        if arguments.len() != function.parameters.len() {
            let pos = arguments.first().map_or(0, |a| a.pos);
            return self.error_at(pos, "wrong number of arguments");
        }

        let mut evaluated = Vec::with_capacity(arguments.len());
        for argument in arguments {
            let value = self.evaluate(argument);
            if value.is_error() {
                return value;
            }
            evaluated.push(value);
        }

        for (parameter, value) in function.parameters.iter().zip(evaluated) {
            if !kind_matches(parameter.kind, value.kind()) {
                return self.error_from(
                    &value,
                    format!(
                        "type mismatch for parameter '{}': expected {}, got {}",
                        parameter.name,
                        parameter.kind,
                        value.kind()
                    ),
                );
            }
            mem::lock(&call_frame).set(&parameter.name, value, false);
        }

        self.run_body(function, call_frame)
    }

    fn run_body(&mut self, function: &Function, call_frame: MemRef) -> Value {
        let mut child = self.child_with_frame(call_frame);

        let mut result = Value::none();
        for expression in &function.body {
            result = child.evaluate(expression);
            if result.is_error() {
                return result;
            }
        }

        if !kind_matches(function.return_kind, result.kind()) {
            let mut pos = result.pos;
            if pos == 0 && let Some(last) = function.body.last() {
                pos = last.pos;
            }
            return self.error_at(
                pos,
                format!(
                    "return type mismatch: expected {}, got {}",
                    function.return_kind,
                    result.kind()
                ),
            );
        }
        result
    }

    // ---- builtin application ----

    fn call_builtin(&mut self, builtin: &Builtin, arguments: &[Value]) -> Value {
        let arguments = if builtin.evaluate_args {
            let mut evaluated = Vec::with_capacity(arguments.len());
            for argument in arguments {
                let value = self.evaluate(argument);
                if value.is_error() {
                    return value;
                }
                evaluated.push(value);
            }
            evaluated
        } else {
            arguments.to_vec()
        };

        if !builtin.parameters.is_empty() {
            if let Some(error) = self.validate_builtin_arity(builtin, &arguments) {
                return error;
            }
            if let Some(error) = self.validate_builtin_kinds(builtin, &arguments) {
                return error;
            }
        }

        let body = builtin.body.clone();
        let result = body(self, arguments);

        if builtin.return_kind != Kind::Any && !result.is_error()
            && result.kind() != builtin.return_kind
        {
            return self.error_from(
                &result,
                format!(
                    "return type mismatch: expected {}, got {}",
                    builtin.return_kind,
                    result.kind()
                ),
            );
        }
        result
    }

    fn validate_builtin_arity(&self, builtin: &Builtin, arguments: &[Value]) -> Option<Value> {
        let declared = builtin.parameters.len();
        let pos = arguments.first().map_or(0, |a| a.pos);

        if builtin.variadic {
            if arguments.len() < declared {
                return Some(self.error_at(
                    pos,
                    format!(
                        "insufficient arguments: expected at least {declared}, got {}",
                        arguments.len()
                    ),
                ));
            }
        } else if arguments.len() != declared {
            return Some(self.error_at(
                pos,
                format!(
                    "wrong number of arguments: expected {declared}, got {}",
                    arguments.len()
                ),
            ));
        }
        None
    }

    fn validate_builtin_kinds(&self, builtin: &Builtin, arguments: &[Value]) -> Option<Value> {
        for (parameter, argument) in builtin.parameters.iter().zip(arguments) {
            if !kind_matches(parameter.kind, argument.kind()) {
                return Some(self.error_from(
                    argument,
                    format!(
                        "type mismatch for parameter '{}': expected {}, got {}",
                        parameter.name,
                        parameter.kind,
                        argument.kind()
                    ),
                ));
            }
        }

        // Surplus positionals of a variadic builtin take the last declared
        // parameter's kind.
        if builtin.variadic && arguments.len() > builtin.parameters.len()
            && let Some(last) = builtin.parameters.last()
        {
            for (index, argument) in arguments.iter().enumerate().skip(builtin.parameters.len()) {
                if !kind_matches(last.kind, argument.kind()) {
                    return Some(self.error_from(
                        argument,
                        format!(
                            "type mismatch for variadic parameter '{}' at position {index}: expected {}, got {}",
                            last.name,
                            last.kind,
                            argument.kind()
                        ),
                    ));
                }
            }
        }
        None
    }
}

fn kind_matches(expected: Kind, actual: Kind) -> bool {
    expected == Kind::Any || expected == actual
}

struct DepthGuard(Rc<Cell<usize>>);

impl Drop for DepthGuard {
    fn drop(&mut self) {
        self.0.set(self.0.get() - 1);
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::groups;
    use crate::io::BufferIo;
    use crate::parser::Parser;

    fn test_context() -> EvalContext {
        ContextBuilder::new()
            .with_io(Box::new(BufferIo::default()))
            .with_function_group(groups::core::group())
            .with_function_group(groups::numbers::group())
            .with_function_group(groups::lists::group())
            .build()
    }

    fn eval_source(ctx: &mut EvalContext, source: &str) -> Value {
        let items = Parser::new(source).parse_all().unwrap();
        let mut result = Value::none();
        for item in &items {
            result = ctx.evaluate(item);
            if result.is_error() {
                return result;
            }
        }
        result
    }

    fn error_message(value: &Value) -> String {
        match &value.data {
            Data::Error(err) => err.message.clone(),
            other => panic!("expected error value, got {other:?}"),
        }
    }

    #[test]
    fn test_literals_self_evaluate() {
        let mut ctx = test_context();
        for source in ["42", "3.5", "\"text\"", "_"] {
            let value = Parser::new(source).parse().unwrap();
            assert_eq!(ctx.evaluate(&value), value, "source: {source}");
        }
    }

    #[test]
    fn test_quoted_unwraps_one_level() {
        let mut ctx = test_context();
        let value = Parser::new("''x").parse().unwrap();
        assert_eq!(ctx.evaluate(&value), Value::quoted(Value::identifier("x")));

        let value = Parser::new("'(int/add 1 2)").parse().unwrap();
        assert_eq!(ctx.evaluate(&value).encode(), "(int/add 1 2)");
    }

    #[test]
    fn test_identifier_resolution() {
        let mut ctx = test_context();
        mem::lock(&ctx.mem()).set("x", Value::integer(40), false);

        assert_eq!(eval_source(&mut ctx, "x"), Value::integer(40));

        // A builtin name resolves to an identifier marker.
        let marker = eval_source(&mut ctx, "int/add");
        assert_eq!(marker, Value::identifier("int/add"));

        let missing = eval_source(&mut ctx, "nope");
        assert!(missing.is_error());
        assert_eq!(error_message(&missing), "undefined identifier: nope");
    }

    #[test]
    fn test_empty_list_is_none() {
        let mut ctx = test_context();
        assert_eq!(eval_source(&mut ctx, "()"), Value::none());
    }

    #[test]
    fn test_uncallable_heads() {
        let mut ctx = test_context();
        let error = eval_source(&mut ctx, "(1 2 3)");
        assert_eq!(
            error_message(&error),
            "first element is not callable: integer"
        );

        mem::lock(&ctx.mem()).set("s", Value::string("v"), false);
        let error = eval_source(&mut ctx, "(s)");
        assert_eq!(
            error_message(&error),
            "first element is not callable: string"
        );
    }

    #[test]
    fn test_function_not_found() {
        let mut ctx = test_context();
        mem::lock(&ctx.mem()).set("f", Value::identifier("ghost"), false);
        let error = eval_source(&mut ctx, "(f 1)");
        assert_eq!(error_message(&error), "function not found: ghost");
    }

    #[test]
    fn test_builtin_arity_and_kind_errors() {
        let mut ctx = test_context();

        let error = eval_source(&mut ctx, "(int/add 1)");
        assert_eq!(
            error_message(&error),
            "wrong number of arguments: expected 2, got 1"
        );

        let error = eval_source(&mut ctx, "(int/add 1 2.0)");
        assert_eq!(
            error_message(&error),
            "type mismatch for parameter 'b': expected integer, got real"
        );
    }

    #[test]
    fn test_argument_errors_short_circuit() {
        let mut ctx = test_context();
        let error = eval_source(&mut ctx, "(int/add (int/div 1 0) (missing))");
        assert_eq!(error_message(&error), "int/div: division by zero");
    }

    #[test]
    fn test_fixed_function_call() {
        let mut ctx = test_context();
        eval_source(&mut ctx, "(set inc (fn (x :I) :I (int/add x 1)))");
        assert_eq!(eval_source(&mut ctx, "(inc 41)"), Value::integer(42));

        let error = eval_source(&mut ctx, "(inc 1 2)");
        assert_eq!(error_message(&error), "wrong number of arguments");

        let error = eval_source(&mut ctx, "(inc 1.5)");
        assert_eq!(
            error_message(&error),
            "type mismatch for parameter 'x': expected integer, got real"
        );
    }

    #[test]
    fn test_untyped_parameters_accept_anything() {
        let mut ctx = test_context();
        eval_source(&mut ctx, "(set first (fn (a :* b :*) :* a))");
        assert_eq!(
            eval_source(&mut ctx, "(first \"s\" 2)"),
            Value::string("s")
        );
        assert_eq!(eval_source(&mut ctx, "(first 1.5 2)"), Value::real(1.5));
    }

    #[test]
    fn test_return_kind_enforced() {
        let mut ctx = test_context();
        eval_source(&mut ctx, "(set bad (fn (x :I) :S (int/add x 1)))");
        let error = eval_source(&mut ctx, "(bad 1)");
        assert_eq!(
            error_message(&error),
            "return type mismatch: expected string, got integer"
        );
    }

    #[test]
    fn test_variadic_binds_args_list() {
        let mut ctx = test_context();
        eval_source(&mut ctx, "(set count (fn (..) :I (list/len (uq (qu $args)))))");
        assert_eq!(eval_source(&mut ctx, "(count 9 8 7)"), Value::integer(3));
        assert_eq!(eval_source(&mut ctx, "(count)"), Value::integer(0));
    }

    #[test]
    fn test_closure_capture() {
        let mut ctx = test_context();
        eval_source(
            &mut ctx,
            "(set mk (fn (n :I) :F (fn (x :I) :I (int/add x n))))",
        );
        eval_source(&mut ctx, "(set add5 (mk 5))");
        assert_eq!(eval_source(&mut ctx, "(add5 10)"), Value::integer(15));

        // Two closures over different frames stay independent.
        eval_source(&mut ctx, "(set add9 (mk 9))");
        assert_eq!(eval_source(&mut ctx, "(add9 10)"), Value::integer(19));
        assert_eq!(eval_source(&mut ctx, "(add5 10)"), Value::integer(15));
    }

    #[test]
    fn test_closure_sees_later_rebinding() {
        let mut ctx = test_context();
        eval_source(&mut ctx, "(set base 1)");
        eval_source(&mut ctx, "(set get-base (fn () :I base))");
        assert_eq!(eval_source(&mut ctx, "(get-base)"), Value::integer(1));
        eval_source(&mut ctx, "(set base 2)");
        assert_eq!(eval_source(&mut ctx, "(get-base)"), Value::integer(2));
    }

    #[test]
    fn test_recursion_and_depth_limit() {
        let mut ctx = ContextBuilder::new()
            .with_io(Box::new(BufferIo::default()))
            .with_function_group(groups::core::group())
            .with_function_group(groups::numbers::group())
            .with_max_recursion_depth(64)
            .build();

        eval_source(
            &mut ctx,
            "(set down (fn (n :I) :I (if n (down (int/sub n 1)) 0)))",
        );
        assert_eq!(eval_source(&mut ctx, "(down 3)"), Value::integer(0));

        let error = eval_source(&mut ctx, "(down 100000)");
        assert!(error_message(&error).contains("depth limit exceeded"));

        // The counter unwinds, so the context keeps working afterwards.
        assert_eq!(eval_source(&mut ctx, "(down 2)"), Value::integer(0));
    }

    #[test]
    fn test_group_registration() {
        let mut ctx = test_context();
        assert_eq!(eval_source(&mut ctx, "(int/add 1 2)"), Value::integer(3));

        ctx.remove_function_group("arith");
        let error = eval_source(&mut ctx, "(int/add 1 2)");
        assert_eq!(error_message(&error), "function not found: int/add");

        ctx.add_function_group(groups::numbers::group());
        assert_eq!(eval_source(&mut ctx, "(int/add 1 2)"), Value::integer(3));
    }

    #[test]
    fn test_error_values_carry_current_file() {
        let mut ctx = test_context();
        ctx.set_current_file("/tmp/script.slpx");
        let error = eval_source(&mut ctx, "nope");
        let Data::Error(err) = &error.data else {
            panic!("expected error");
        };
        assert_eq!(err.file, "/tmp/script.slpx");
    }
}
