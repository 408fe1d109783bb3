//! The `str` group. Length, slicing, and explosion count Unicode scalar
//! values, not bytes. `str/from` renders reals with a group-local precision
//! that `str/precision` adjusts.

use std::cell::Cell;
use std::rc::Rc;

use crate::context::{Builtin, EvalContext, FunctionGroup};
use crate::groups::{flag, int_value, str_value};
use crate::object::{Data, Kind, Parameter, Value};

const DEFAULT_PRECISION: u8 = 6;

fn str_unary(return_kind: Kind, body: fn(&mut EvalContext, Vec<Value>) -> Value) -> Builtin {
    Builtin {
        evaluate_args: true,
        parameters: vec![Parameter::new("value", Kind::String)],
        return_kind,
        variadic: false,
        body: Rc::new(body),
    }
}

fn str_pair(return_kind: Kind, body: fn(&mut EvalContext, Vec<Value>) -> Value) -> Builtin {
    Builtin {
        evaluate_args: true,
        parameters: vec![
            Parameter::new("a", Kind::String),
            Parameter::new("b", Kind::String),
        ],
        return_kind,
        variadic: false,
        body: Rc::new(body),
    }
}

pub fn group() -> FunctionGroup {
    let precision = Rc::new(Cell::new(DEFAULT_PRECISION));
    let mut g = FunctionGroup::new("str");

    g.insert("str/eq", str_pair(Kind::Integer, cmd_str_eq));
    g.insert("str/len", str_unary(Kind::Integer, cmd_str_len));
    g.insert("str/upper", str_unary(Kind::String, cmd_str_upper));
    g.insert("str/lower", str_unary(Kind::String, cmd_str_lower));
    g.insert("str/trim", str_unary(Kind::String, cmd_str_trim));
    g.insert("str/int", str_unary(Kind::Integer, cmd_str_int));
    g.insert("str/real", str_unary(Kind::Real, cmd_str_real));
    g.insert("str/list", str_unary(Kind::List, cmd_str_list));
    g.insert("str/contains", str_pair(Kind::Integer, cmd_str_contains));
    g.insert("str/index", str_pair(Kind::Integer, cmd_str_index));
    g.insert("str/split", str_pair(Kind::List, cmd_str_split));

    g.insert(
        "str/clear",
        Builtin {
            evaluate_args: true,
            parameters: vec![Parameter::new("value", Kind::String)],
            return_kind: Kind::String,
            variadic: false,
            body: Rc::new(|_ctx, _args| Value::string("")),
        },
    );

    let from_precision = precision.clone();
    g.insert(
        "str/from",
        Builtin {
            evaluate_args: true,
            parameters: vec![Parameter::new("value", Kind::Any)],
            return_kind: Kind::String,
            variadic: false,
            body: Rc::new(move |_ctx, args| cmd_str_from(&from_precision, &args[0])),
        },
    );

    g.insert(
        "str/concat",
        Builtin {
            evaluate_args: true,
            parameters: vec![Parameter::new("parts", Kind::String)],
            return_kind: Kind::String,
            variadic: true,
            body: Rc::new(cmd_str_concat),
        },
    );

    g.insert(
        "str/slice",
        Builtin {
            evaluate_args: true,
            parameters: vec![
                Parameter::new("value", Kind::String),
                Parameter::new("start", Kind::Integer),
                Parameter::new("end", Kind::Integer),
            ],
            return_kind: Kind::String,
            variadic: false,
            body: Rc::new(cmd_str_slice),
        },
    );

    g.insert(
        "str/replace",
        Builtin {
            evaluate_args: true,
            parameters: vec![
                Parameter::new("value", Kind::String),
                Parameter::new("old", Kind::String),
                Parameter::new("new", Kind::String),
            ],
            return_kind: Kind::String,
            variadic: false,
            body: Rc::new(cmd_str_replace),
        },
    );

    let set_precision = precision.clone();
    g.insert(
        "str/precision",
        Builtin {
            evaluate_args: true,
            parameters: vec![Parameter::new("digits", Kind::Integer)],
            return_kind: Kind::Integer,
            variadic: false,
            body: Rc::new(move |_ctx, args| {
                let clamped = int_value(&args[0]).clamp(0, 255);
                set_precision.set(clamped as u8);
                Value::integer(clamped)
            }),
        },
    );

    g
}

fn cmd_str_eq(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    flag(str_value(&args[0]) == str_value(&args[1]))
}

fn cmd_str_len(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    Value::integer(str_value(&args[0]).chars().count() as i64)
}

fn cmd_str_upper(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    Value::string(str_value(&args[0]).to_uppercase())
}

fn cmd_str_lower(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    Value::string(str_value(&args[0]).to_lowercase())
}

fn cmd_str_trim(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    Value::string(str_value(&args[0]).trim())
}

fn cmd_str_from(precision: &Cell<u8>, value: &Value) -> Value {
    match &value.data {
        Data::Str(_) => value.clone(),
        Data::Real(r) => Value::string(format!("{:.*}", precision.get() as usize, r)),
        _ => Value::string(value.encode()),
    }
}

fn cmd_str_int(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    match str_value(&args[0]).parse::<i64>() {
        Ok(n) => Value::integer(n),
        Err(err) => Value::error(format!("str/int: failed to parse integer: {err}")),
    }
}

fn cmd_str_real(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    match str_value(&args[0]).parse::<f64>() {
        Ok(r) => Value::real(r),
        Err(err) => Value::error(format!("str/real: failed to parse real: {err}")),
    }
}

fn cmd_str_list(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let items = str_value(&args[0])
        .chars()
        .map(|c| Value::string(c.to_string()))
        .collect();
    Value::list(items)
}

fn cmd_str_concat(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let mut result = String::new();
    for value in &args {
        result.push_str(str_value(value));
    }
    Value::string(result)
}

fn cmd_str_contains(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    flag(str_value(&args[0]).contains(str_value(&args[1])))
}

/// Index of the first occurrence in scalar values, -1 when absent.
fn cmd_str_index(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let haystack = str_value(&args[0]);
    let needle = str_value(&args[1]);
    match haystack.find(needle) {
        Some(byte_index) => {
            Value::integer(haystack[..byte_index].chars().count() as i64)
        }
        None => Value::integer(-1),
    }
}

fn cmd_str_slice(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let chars: Vec<char> = str_value(&args[0]).chars().collect();
    let length = chars.len() as i64;

    let mut start = int_value(&args[1]).max(0);
    let mut end = int_value(&args[2]).min(length);
    if end < 0 {
        end = 0;
    }
    if start > end {
        start = end;
    }

    Value::string(chars[start as usize..end as usize].iter().collect::<String>())
}

fn cmd_str_split(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let value = str_value(&args[0]);
    let separator = str_value(&args[1]);
    let parts: Vec<Value> = if separator.is_empty() {
        value.chars().map(|c| Value::string(c.to_string())).collect()
    } else {
        value.split(separator).map(Value::string).collect()
    };
    Value::list(parts)
}

fn cmd_str_replace(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    Value::string(str_value(&args[0]).replace(str_value(&args[1]), str_value(&args[2])))
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::context::ContextBuilder;
    use crate::groups;
    use crate::io::BufferIo;
    use crate::parser::Parser;

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

    fn new_ctx() -> EvalContext {
        ContextBuilder::new()
            .with_io(Box::new(BufferIo::default()))
            .with_function_group(groups::core::group())
            .with_function_group(groups::strings::group())
            .build()
    }

    #[test]
    fn test_basics() {
        let mut ctx = new_ctx();
        let cases: Vec<(&str, &str)> = vec![
            ("(str/eq \"a\" \"a\")", "1"),
            ("(str/eq \"a\" \"b\")", "0"),
            ("(str/len \"hello\")", "5"),
            ("(str/len \"\")", "0"),
            ("(str/clear \"anything\")", "\"\""),
            ("(str/upper \"MiXeD\")", "\"MIXED\""),
            ("(str/lower \"MiXeD\")", "\"mixed\""),
            ("(str/trim \"  pad  \")", "\"pad\""),
            ("(str/contains \"haystack\" \"stack\")", "1"),
            ("(str/contains \"haystack\" \"needle\")", "0"),
            ("(str/index \"haystack\" \"stack\")", "3"),
            ("(str/index \"haystack\" \"z\")", "-1"),
            ("(str/concat)", "\"\""),
            ("(str/concat \"a\" \"b\" \"c\")", "\"abc\""),
            ("(str/replace \"a-b-c\" \"-\" \"+\")", "\"a+b+c\""),
        ];
        for (source, expected) in cases {
            assert_eq!(eval(&mut ctx, source).encode(), expected, "source: {source}");
        }
    }

    #[test]
    fn test_lengths_count_scalars_not_bytes() {
        let mut ctx = new_ctx();
        assert_eq!(eval(&mut ctx, "(str/len \"héllo\")"), Value::integer(5));
        assert_eq!(
            eval(&mut ctx, "(str/slice \"héllo\" 1 3)"),
            Value::string("él")
        );
        assert_eq!(
            eval(&mut ctx, "(str/list \"né\")").encode(),
            "(\"n\" \"é\")"
        );
    }

    #[test]
    fn test_slice_clamps() {
        let mut ctx = new_ctx();
        assert_eq!(eval(&mut ctx, "(str/slice \"abc\" -5 99)"), Value::string("abc"));
        assert_eq!(eval(&mut ctx, "(str/slice \"abc\" 2 1)"), Value::string(""));
    }

    #[test]
    fn test_split() {
        let mut ctx = new_ctx();
        assert_eq!(
            eval(&mut ctx, "(str/split \"a,b,,c\" \",\")").encode(),
            "(\"a\" \"b\" \"\" \"c\")"
        );
        assert_eq!(eval(&mut ctx, "(str/split \"ab\" \"\")").encode(), "(\"a\" \"b\")");
    }

    #[test]
    fn test_parsing() {
        let mut ctx = new_ctx();
        assert_eq!(eval(&mut ctx, "(str/int \"42\")"), Value::integer(42));
        assert_eq!(eval(&mut ctx, "(str/real \"2.5\")"), Value::real(2.5));
        assert!(eval(&mut ctx, "(str/int \"x\")").is_error());
        assert!(eval(&mut ctx, "(str/real \"x\")").is_error());
    }

    #[test]
    fn test_from_respects_precision() {
        let mut ctx = new_ctx();
        assert_eq!(
            eval(&mut ctx, "(str/from 3.14159)"),
            Value::string("3.141590")
        );
        assert_eq!(eval(&mut ctx, "(str/precision 2)"), Value::integer(2));
        assert_eq!(eval(&mut ctx, "(str/from 3.14159)"), Value::string("3.14"));

        assert_eq!(eval(&mut ctx, "(str/from \"already\")"), Value::string("already"));
        assert_eq!(eval(&mut ctx, "(str/from 42)"), Value::string("42"));
        assert_eq!(eval(&mut ctx, "(str/from '(a b))"), Value::string("(a b)"));

        assert_eq!(eval(&mut ctx, "(str/precision -3)"), Value::integer(0));
        assert_eq!(eval(&mut ctx, "(str/precision 999)"), Value::integer(255));
    }
}
