//! The `io` group: terminal output and prompted input over the context's
//! [`Io`](crate::io::Io) capability, plus 24-bit ANSI color helpers. `io/out`
//! flushes after every write so prompts appear before reads; real output
//! precision is group-local state adjusted by `io/out/set_precision`.

use std::cell::Cell;
use std::rc::Rc;

use crate::context::{Builtin, EvalContext, FunctionGroup};
use crate::groups::{int_value, str_value};
use crate::object::{Data, Kind, Parameter, Value};

const DEFAULT_PRECISION: usize = 6;

pub fn group() -> FunctionGroup {
    let precision = Rc::new(Cell::new(DEFAULT_PRECISION));
    let mut g = FunctionGroup::new("io");

    let out_precision = precision.clone();
    g.insert(
        "io/out",
        Builtin {
            evaluate_args: true,
            parameters: vec![Parameter::new("args", Kind::Any)],
            return_kind: Kind::None,
            variadic: true,
            body: Rc::new(move |ctx, args| cmd_out(&out_precision, ctx, args)),
        },
    );

    g.insert(
        "io/in",
        Builtin {
            evaluate_args: true,
            parameters: vec![Parameter::new("prompt", Kind::String)],
            return_kind: Kind::String,
            variadic: false,
            body: Rc::new(cmd_in),
        },
    );

    g.insert(
        "io/in/int",
        Builtin {
            evaluate_args: true,
            parameters: vec![Parameter::new("prompt", Kind::String)],
            return_kind: Kind::Integer,
            variadic: false,
            body: Rc::new(cmd_in_int),
        },
    );

    g.insert(
        "io/in/real",
        Builtin {
            evaluate_args: true,
            parameters: vec![Parameter::new("prompt", Kind::String)],
            return_kind: Kind::Real,
            variadic: false,
            body: Rc::new(cmd_in_real),
        },
    );

    let set_precision = precision.clone();
    g.insert(
        "io/out/set_precision",
        Builtin {
            evaluate_args: true,
            parameters: vec![Parameter::new("digits", Kind::Integer)],
            return_kind: Kind::None,
            variadic: false,
            body: Rc::new(move |_ctx, args| {
                set_precision.set(int_value(&args[0]).clamp(0, 20) as usize);
                Value::none()
            }),
        },
    );

    g.insert(
        "io/flush",
        Builtin {
            evaluate_args: true,
            parameters: Vec::new(),
            return_kind: Kind::None,
            variadic: false,
            body: Rc::new(cmd_flush),
        },
    );

    g.insert(
        "io/color/fg",
        Builtin {
            evaluate_args: true,
            parameters: vec![Parameter::new("hex", Kind::String)],
            return_kind: Kind::String,
            variadic: false,
            body: Rc::new(cmd_color_fg),
        },
    );

    g.insert(
        "io/color/bg",
        Builtin {
            evaluate_args: true,
            parameters: vec![Parameter::new("hex", Kind::String)],
            return_kind: Kind::String,
            variadic: false,
            body: Rc::new(cmd_color_bg),
        },
    );

    g.insert(
        "io/color/reset",
        Builtin {
            evaluate_args: true,
            parameters: Vec::new(),
            return_kind: Kind::String,
            variadic: false,
            body: Rc::new(|_ctx, _args| Value::string("\x1b[0m")),
        },
    );

    g
}

fn cmd_out(precision: &Cell<usize>, ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let io = ctx.io();
    let mut io = io.borrow_mut();
    for arg in &args {
        let rendered = match &arg.data {
            Data::Str(s) => s.clone(),
            Data::Integer(n) => n.to_string(),
            Data::Real(r) => format!("{:.*}", precision.get(), r),
            _ => arg.encode(),
        };
        let _ = io.write_string(&rendered);
        let _ = io.flush();
    }
    Value::none()
}

fn prompt_line(ctx: &mut EvalContext, prompt: &str) -> Result<String, Value> {
    let io = ctx.io();
    let mut io = io.borrow_mut();
    let _ = io.write_string(prompt);
    let _ = io.flush();
    io.read_line()
        .map_err(|err| Value::error(format!("failed to read input: {err}")))
}

fn cmd_in(ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    match prompt_line(ctx, str_value(&args[0])) {
        Ok(line) => Value::string(line),
        Err(error) => error,
    }
}

fn cmd_in_int(ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let line = match prompt_line(ctx, str_value(&args[0])) {
        Ok(line) => line,
        Err(error) => return error,
    };
    match line.trim().parse::<i64>() {
        Ok(n) => Value::integer(n),
        Err(_) => Value::error(format!("input is not a valid integer: {}", line.trim())),
    }
}

fn cmd_in_real(ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let line = match prompt_line(ctx, str_value(&args[0])) {
        Ok(line) => line,
        Err(error) => return error,
    };
    match line.trim().parse::<f64>() {
        Ok(r) => Value::real(r),
        Err(_) => Value::error(format!("input is not a valid real number: {}", line.trim())),
    }
}

fn cmd_flush(ctx: &mut EvalContext, _args: Vec<Value>) -> Value {
    let result = ctx.io().borrow_mut().flush();
    match result {
        Ok(()) => Value::none(),
        Err(err) => Value::error(format!("failed to flush output: {err}")),
    }
}

fn parse_hex_color(hex: &str) -> Result<(u8, u8, u8), String> {
    let hex = hex.strip_prefix('#').unwrap_or(hex);
    if hex.len() != 6 {
        return Err(format!("hex color must be 6 characters (got {})", hex.len()));
    }
    let raw = u32::from_str_radix(hex, 16).map_err(|err| err.to_string())?;
    Ok((
        ((raw >> 16) & 0xff) as u8,
        ((raw >> 8) & 0xff) as u8,
        (raw & 0xff) as u8,
    ))
}

fn cmd_color_fg(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    match parse_hex_color(str_value(&args[0])) {
        Ok((r, g, b)) => Value::string(format!("\x1b[38;2;{r};{g};{b}m")),
        Err(err) => Value::error(format!("invalid hex color: {err}")),
    }
}

fn cmd_color_bg(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    match parse_hex_color(str_value(&args[0])) {
        Ok((r, g, b)) => Value::string(format!("\x1b[48;2;{r};{g};{b}m")),
        Err(err) => Value::error(format!("invalid hex color: {err}")),
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::context::ContextBuilder;
    use crate::groups;
    use crate::io::BufferIo;
    use crate::parser::Parser;

    fn ctx_with_buffers(input: &str) -> (EvalContext, crate::io::SharedBuffer) {
        let io = BufferIo::new(input);
        let output = io.output();
        let ctx = ContextBuilder::new()
            .with_io(Box::new(io))
            .with_function_group(groups::core::group())
            .with_function_group(groups::io::group())
            .build();
        (ctx, output)
    }

    fn eval(ctx: &mut EvalContext, source: &str) -> Value {
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

    #[test]
    fn test_out_rendering() {
        let (mut ctx, output) = ctx_with_buffers("");
        eval(&mut ctx, "(io/out \"x=\" 42 \" r=\" 1.5 \" \" '(a b))");
        assert_eq!(output.contents_string(), "x=42 r=1.500000 (a b)");
    }

    #[test]
    fn test_out_precision() {
        let (mut ctx, output) = ctx_with_buffers("");
        eval(&mut ctx, "(io/out/set_precision 2) (io/out 1.23456)");
        assert_eq!(output.contents_string(), "1.23");
    }

    #[test]
    fn test_prompted_input() {
        let (mut ctx, output) = ctx_with_buffers("alice\n41\n2.5\nnope\n");
        assert_eq!(eval(&mut ctx, "(io/in \"name? \")"), Value::string("alice"));
        assert_eq!(eval(&mut ctx, "(io/in/int \"n? \")"), Value::integer(41));
        assert_eq!(eval(&mut ctx, "(io/in/real \"r? \")"), Value::real(2.5));
        assert!(eval(&mut ctx, "(io/in/int \"n? \")").is_error());
        assert_eq!(output.contents_string(), "name? n? r? n? ");
    }

    #[test]
    fn test_input_exhausted_is_error() {
        let (mut ctx, _) = ctx_with_buffers("");
        let error = eval(&mut ctx, "(io/in \"? \")");
        assert!(error.is_error());
    }

    #[test]
    fn test_colors() {
        let (mut ctx, _) = ctx_with_buffers("");
        assert_eq!(
            eval(&mut ctx, "(io/color/fg \"#ff0080\")"),
            Value::string("\x1b[38;2;255;0;128m")
        );
        assert_eq!(
            eval(&mut ctx, "(io/color/bg \"00ff00\")"),
            Value::string("\x1b[48;2;0;255;0m")
        );
        assert_eq!(eval(&mut ctx, "(io/color/reset)"), Value::string("\x1b[0m"));
        assert!(eval(&mut ctx, "(io/color/fg \"zzz\")").is_error());
    }

    #[test]
    fn test_flush_is_none() {
        let (mut ctx, _) = ctx_with_buffers("");
        assert_eq!(eval(&mut ctx, "(io/flush)"), Value::none());
    }
}
