//! The `core` group: the special forms the evaluator semantics depend on,
//! plus `putln`. All except `putln` and `use` receive their arguments
//! unevaluated and drive evaluation themselves.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::context::{Builtin, ERROR_BINDING, EvalContext, FunctionGroup, VARIADIC_MARKER};
use crate::groups::ident_value;
use crate::mem;
use crate::object::{Data, Function, Kind, Parameter, Value};
use crate::parser::Parser;

pub fn group() -> FunctionGroup {
    let mut g = FunctionGroup::new("core");

    g.insert(
        "set",
        Builtin {
            evaluate_args: false,
            parameters: vec![
                Parameter::new("name", Kind::Identifier),
                Parameter::new("value", Kind::Any),
            ],
            return_kind: Kind::Any,
            variadic: false,
            body: Rc::new(cmd_set),
        },
    );

    g.insert(
        "fn",
        Builtin {
            evaluate_args: false,
            parameters: vec![
                Parameter::new("params", Kind::List),
                Parameter::new("body", Kind::Any),
            ],
            return_kind: Kind::Function,
            variadic: true,
            body: Rc::new(cmd_fn),
        },
    );

    g.insert(
        "if",
        Builtin {
            evaluate_args: false,
            parameters: vec![
                Parameter::new("condition", Kind::Any),
                Parameter::new("true_body", Kind::Any),
                Parameter::new("false_body", Kind::Any),
            ],
            return_kind: Kind::Any,
            variadic: false,
            body: Rc::new(cmd_if),
        },
    );

    g.insert(
        "do",
        Builtin {
            evaluate_args: false,
            parameters: vec![Parameter::new("exprs", Kind::Any)],
            return_kind: Kind::Any,
            variadic: true,
            body: Rc::new(cmd_do),
        },
    );

    g.insert(
        "try",
        Builtin {
            evaluate_args: false,
            parameters: vec![
                Parameter::new("expr", Kind::Any),
                Parameter::new("handler", Kind::Any),
            ],
            return_kind: Kind::Any,
            variadic: false,
            body: Rc::new(cmd_try),
        },
    );

    g.insert(
        "qu",
        Builtin {
            evaluate_args: false,
            parameters: vec![Parameter::new("expr", Kind::Any)],
            return_kind: Kind::Quoted,
            variadic: false,
            body: Rc::new(cmd_qu),
        },
    );

    g.insert(
        "uq",
        Builtin {
            evaluate_args: false,
            parameters: vec![Parameter::new("quoted", Kind::Any)],
            return_kind: Kind::Any,
            variadic: false,
            body: Rc::new(cmd_uq),
        },
    );

    g.insert(
        "drop",
        Builtin {
            evaluate_args: false,
            parameters: vec![Parameter::new("name", Kind::Identifier)],
            return_kind: Kind::None,
            variadic: false,
            body: Rc::new(cmd_drop),
        },
    );

    g.insert(
        "use",
        Builtin {
            evaluate_args: true,
            parameters: vec![Parameter::new("paths", Kind::String)],
            return_kind: Kind::None,
            variadic: true,
            body: Rc::new(cmd_use),
        },
    );

    g.insert(
        "exit",
        Builtin {
            evaluate_args: false,
            parameters: vec![Parameter::new("code", Kind::Any)],
            return_kind: Kind::None,
            variadic: false,
            body: Rc::new(cmd_exit),
        },
    );

    g.insert(
        "putln",
        Builtin {
            evaluate_args: true,
            parameters: vec![Parameter::new("args", Kind::Any)],
            return_kind: Kind::None,
            variadic: true,
            body: Rc::new(cmd_putln),
        },
    );

    g
}

/// `(set NAME EXPR)`: evaluate EXPR and bind NAME, updating the nearest
/// enclosing binding when one exists. Yields the bound value; note that
/// error values bind like any other value before propagating.
fn cmd_set(ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let name = ident_value(&args[0]).to_owned();
    let value = ctx.evaluate(&args[1]);
    mem::lock(&ctx.mem()).set(&name, value.clone(), true);
    value
}

/// `(fn PARAMS [:RET] BODY…)`: build a function value closing over the
/// current frame. PARAMS is `()` for no parameters, `(..)` for variadic, or
/// `name :type` pairs.
fn cmd_fn(ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let Data::List(param_list) = &args[0].data else {
        return ctx.error_from(
            &args[0],
            format!("fn: parameter list must be a list, got {}", args[0].kind()),
        );
    };

    let mut variadic = false;
    let mut parameters = Vec::new();

    if param_list.len() == 1
        && let Data::Identifier(marker) = &param_list[0].data
    {
        if marker == VARIADIC_MARKER {
            variadic = true;
        } else {
            return ctx.error_from(
                &param_list[0],
                "fn: single parameter must be '..' for variadic or a name-type pair",
            );
        }
    } else if !param_list.is_empty() {
        if param_list.len() % 2 != 0 {
            return ctx.error_from(&args[0], "fn: parameters must be name-type pairs");
        }
        for pair in param_list.chunks(2) {
            let Data::Identifier(name) = &pair[0].data else {
                return ctx.error_from(
                    &pair[0],
                    format!("fn: parameter name must be an identifier, got {}", pair[0].kind()),
                );
            };
            let Data::Identifier(type_symbol) = &pair[1].data else {
                return ctx.error_from(
                    &pair[1],
                    format!("fn: parameter type must be an identifier, got {}", pair[1].kind()),
                );
            };
            let Some(kind) = Kind::from_symbol(type_symbol) else {
                return ctx.error_from(
                    &pair[1],
                    format!("fn: invalid type identifier: {type_symbol}"),
                );
            };
            parameters.push(Parameter::new(name.clone(), kind));
        }
    }

    // An identifier right after the parameter list that names a kind is the
    // return annotation; anything else is the first body expression.
    let mut return_kind = Kind::Any;
    let mut body_start = 1;
    if let Data::Identifier(symbol) = &args[1].data
        && let Some(kind) = Kind::from_symbol(symbol)
    {
        return_kind = kind;
        body_start = 2;
    }

    if body_start >= args.len() {
        return ctx.error_from(&args[0], "fn: function body cannot be empty");
    }

    Value {
        data: Data::Function(Function {
            parameters,
            return_kind,
            variadic,
            body: args[body_start..].to_vec(),
        }),
        pos: args[0].pos,
        closure: Some(ctx.mem()),
    }
}

/// `(if C T E)`: C must evaluate to an integer; strictly positive selects T.
fn cmd_if(ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let condition = ctx.evaluate(&args[0]);
    if condition.is_error() {
        return condition;
    }
    let Data::Integer(flag) = &condition.data else {
        return ctx.error_from(
            &args[0],
            format!("if: condition must evaluate to integer, got {}", condition.kind()),
        );
    };

    if *flag > 0 {
        ctx.evaluate(&args[1])
    } else {
        ctx.evaluate(&args[2])
    }
}

/// `(do E1 … En)`: evaluate in order, return the last value; the first
/// error short-circuits. Empty is none.
fn cmd_do(ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let mut result = Value::none();
    for expression in &args {
        result = ctx.evaluate(expression);
        if result.is_error() {
            return result;
        }
    }
    result
}

/// `(try EXPR HANDLER)`: on error, bind `$error` to the message, run the
/// handler, unbind, and return the handler's result.
fn cmd_try(ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let result = ctx.evaluate(&args[0]);
    let Data::Error(err) = &result.data else {
        return result;
    };

    let frame = ctx.mem();
    mem::lock(&frame).set(ERROR_BINDING, Value::string(err.message.clone()), false);
    let handled = ctx.evaluate(&args[1]);
    mem::lock(&frame).delete(ERROR_BINDING, false);
    handled
}

/// `(qu EXPR)`: wrap EXPR unevaluated.
fn cmd_qu(_ctx: &mut EvalContext, mut args: Vec<Value>) -> Value {
    let inner = args.remove(0);
    let pos = inner.pos;
    Value::quoted(inner).at(pos)
}

/// `(uq EXPR)`: evaluate EXPR, require a quoted result, and strip one
/// layer. An identifier inside the wrapper is resolved against the current
/// frame (unbound names pass through verbatim); this is what lets a variadic
/// body reach its `$args` list through `(uq (qu $args))`.
fn cmd_uq(ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let evaluated = ctx.evaluate(&args[0]);
    if evaluated.is_error() {
        return evaluated;
    }
    let kind = evaluated.kind();
    let Data::Quoted(inner) = evaluated.data else {
        return ctx.error_from(&args[0], format!("uq: argument must be quoted, got {kind}"));
    };

    if let Data::Identifier(name) = &inner.data
        && let Some(bound) = mem::lock(&ctx.mem()).get(name, true)
    {
        return bound;
    }
    *inner
}

/// `(drop NAME)`: delete the nearest binding for NAME.
fn cmd_drop(ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let name = ident_value(&args[0]);
    mem::lock(&ctx.mem()).delete(name, true);
    Value::none()
}

/// `(use PATH…)`: import files relative to the directory of the current
/// file. Paths already imported by this context are silently skipped; the
/// imported file's top-level expressions run against the same environment
/// with current-file swapped for the duration.
fn cmd_use(ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    if args.is_empty() {
        return ctx.error_at(0, "use: requires at least 1 argument");
    }

    for arg in &args {
        let Data::Str(path) = &arg.data else {
            return ctx.error_from(arg, format!("use: argument must be string, got {}", arg.kind()));
        };

        let full_path = resolve_import(ctx.current_file(), path);
        let canonical = std::path::absolute(&full_path).unwrap_or_else(|_| full_path.clone());
        if !ctx.mark_imported(canonical) {
            continue;
        }

        let display_path = full_path.to_string_lossy().into_owned();
        tracing::debug!(path = %display_path, "importing file");

        let content = match ctx.fs().borrow().read_file(&display_path) {
            Ok(content) => content,
            Err(err) => {
                return ctx.error_from(arg, format!("use: failed to read file {display_path}: {err}"));
            }
        };
        let source = String::from_utf8_lossy(&content).into_owned();

        let items = match Parser::new(&source).parse_all() {
            Ok(items) => items,
            Err(err) => {
                return ctx.error_from(arg, format!("use: failed to parse file {display_path}: {err}"));
            }
        };

        let previous_file = ctx.current_file().to_owned();
        ctx.set_current_file(display_path.clone());

        for (index, item) in items.iter().enumerate() {
            let result = ctx.evaluate(item);
            if let Data::Error(err) = &result.data {
                let message = err.message.clone();
                ctx.set_current_file(previous_file);
                return ctx.error_from(
                    item,
                    format!("use: file {display_path} item {index} produced error: {message}"),
                );
            }
        }

        ctx.set_current_file(previous_file);
    }

    Value::none()
}

fn resolve_import(current_file: &str, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        return p.to_path_buf();
    }
    match Path::new(current_file).parent() {
        Some(dir) if !current_file.is_empty() => dir.join(p),
        _ => p.to_path_buf(),
    }
}

/// `(exit CODE)`: terminate the process. A non-integer argument is
/// evaluated first; anything that does not yield an integer exits 1.
fn cmd_exit(ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let code = match &args[0].data {
        Data::Integer(code) => *code,
        _ => match ctx.evaluate(&args[0]).data {
            Data::Integer(code) => code,
            _ => 1,
        },
    };
    std::process::exit(code as i32);
}

/// `(putln ARGS…)`: print space-separated with a trailing newline; strings
/// print bare, everything else through the encoder.
fn cmd_putln(ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let io = ctx.io();
    let mut io = io.borrow_mut();
    for (index, arg) in args.iter().enumerate() {
        if index > 0 {
            let _ = io.write_string(" ");
        }
        match &arg.data {
            Data::Str(s) => {
                let _ = io.write_string(s);
            }
            _ => {
                let _ = io.write_string(&arg.encode());
            }
        }
    }
    let _ = io.write_string("\n");
    let _ = io.flush();
    Value::none()
}
