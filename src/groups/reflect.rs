//! The `reflect` group: kind predicates and kind names, all answering with
//! the 0/1 integer convention.

use std::rc::Rc;

use crate::context::{Builtin, EvalContext, FunctionGroup};
use crate::groups::flag;
use crate::object::{Data, Kind, Parameter, Value};

fn probe(body: fn(&mut EvalContext, Vec<Value>) -> Value) -> Builtin {
    Builtin {
        evaluate_args: true,
        parameters: vec![Parameter::new("value", Kind::Any)],
        return_kind: Kind::Integer,
        variadic: false,
        body: Rc::new(body),
    }
}

pub fn group() -> FunctionGroup {
    let mut g = FunctionGroup::new("reflection");

    g.insert(
        "reflect/type?",
        Builtin {
            evaluate_args: true,
            parameters: vec![Parameter::new("value", Kind::Any)],
            return_kind: Kind::String,
            variadic: false,
            body: Rc::new(cmd_type),
        },
    );

    g.insert(
        "reflect/equal?",
        Builtin {
            evaluate_args: true,
            parameters: vec![
                Parameter::new("a", Kind::Any),
                Parameter::new("b", Kind::Any),
            ],
            return_kind: Kind::Integer,
            variadic: false,
            body: Rc::new(cmd_equal),
        },
    );

    g.insert("reflect/int?", probe(cmd_is_int));
    g.insert("reflect/real?", probe(cmd_is_real));
    g.insert("reflect/str?", probe(cmd_is_str));
    g.insert("reflect/list?", probe(cmd_is_list));
    g.insert("reflect/fn?", probe(cmd_is_fn));
    g.insert("reflect/none?", probe(cmd_is_none));
    g.insert("reflect/error?", probe(cmd_is_error));
    g.insert("reflect/some?", probe(cmd_is_quoted));
    g.insert("reflect/ident?", probe(cmd_is_ident));

    g
}

/// Kind name of the argument. An identifier that resolves reports the kind
/// of its binding; an unresolvable one reports "identifier".
fn cmd_type(ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let mut value = args[0].clone();
    if matches!(value.data, Data::Identifier(_)) {
        let resolved = ctx.evaluate(&value);
        if resolved.is_error() {
            return Value::string(Kind::Identifier.name());
        }
        value = resolved;
    }
    Value::string(value.kind().name())
}

/// Kind equality only; payloads are not compared.
fn cmd_equal(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    flag(args[0].kind() == args[1].kind())
}

fn cmd_is_int(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    flag(args[0].kind() == Kind::Integer)
}

fn cmd_is_real(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    flag(args[0].kind() == Kind::Real)
}

fn cmd_is_str(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    flag(args[0].kind() == Kind::String)
}

fn cmd_is_list(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    flag(args[0].kind() == Kind::List)
}

fn cmd_is_fn(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    flag(args[0].kind() == Kind::Function)
}

fn cmd_is_none(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    flag(args[0].kind() == Kind::None)
}

fn cmd_is_error(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    flag(args[0].kind() == Kind::Error)
}

fn cmd_is_quoted(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    flag(args[0].kind() == Kind::Quoted)
}

fn cmd_is_ident(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    flag(args[0].kind() == Kind::Identifier)
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::context::ContextBuilder;
    use crate::groups;
    use crate::io::BufferIo;
    use crate::parser::Parser;

    fn new_ctx() -> EvalContext {
        ContextBuilder::new()
            .with_io(Box::new(BufferIo::default()))
            .with_function_group(groups::core::group())
            .with_function_group(groups::reflect::group())
            .build()
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
    fn test_predicates() {
        let mut ctx = new_ctx();
        let cases: Vec<(&str, &str)> = vec![
            ("(reflect/int? 1)", "1"),
            ("(reflect/int? 1.0)", "0"),
            ("(reflect/real? 1.0)", "1"),
            ("(reflect/str? \"s\")", "1"),
            ("(reflect/list? '(1))", "1"),
            ("(reflect/list? 1)", "0"),
            ("(reflect/none? _)", "1"),
            ("(reflect/some? ''x)", "1"),
            ("(reflect/some? 'x)", "0"),
            ("(reflect/ident? 'x)", "1"),
            ("(reflect/fn? (fn () :_ _))", "1"),
            ("(reflect/error? (try @(boom) (qu fine)))", "0"),
        ];
        for (source, expected) in cases {
            assert_eq!(eval(&mut ctx, source).encode(), expected, "source: {source}");
        }
    }

    #[test]
    fn test_error_predicate_sees_quoted_error() {
        let mut ctx = new_ctx();
        eval(&mut ctx, "(set e (try (uq 1) (qu err)))");
        // The handler returned a quoted identifier, not an error.
        assert_eq!(eval(&mut ctx, "(reflect/some? e)"), Value::integer(1));
    }

    #[test]
    fn test_type_names() {
        let mut ctx = new_ctx();
        assert_eq!(eval(&mut ctx, "(reflect/type? 1)"), Value::string("integer"));
        assert_eq!(eval(&mut ctx, "(reflect/type? 1.5)"), Value::string("real"));
        assert_eq!(eval(&mut ctx, "(reflect/type? \"s\")"), Value::string("string"));
        assert_eq!(eval(&mut ctx, "(reflect/type? '(1))"), Value::string("list"));
        assert_eq!(eval(&mut ctx, "(reflect/type? _)"), Value::string("none"));

        // A bound identifier reports its binding's kind.
        eval(&mut ctx, "(set x 2.5)");
        assert_eq!(eval(&mut ctx, "(reflect/type? 'x)"), Value::string("real"));
        assert_eq!(
            eval(&mut ctx, "(reflect/type? 'unbound)"),
            Value::string("identifier")
        );
    }

    #[test]
    fn test_kind_equality() {
        let mut ctx = new_ctx();
        assert_eq!(eval(&mut ctx, "(reflect/equal? 1 2)"), Value::integer(1));
        assert_eq!(eval(&mut ctx, "(reflect/equal? 1 2.0)"), Value::integer(0));
        assert_eq!(
            eval(&mut ctx, "(reflect/equal? \"a\" \"b\")"),
            Value::integer(1)
        );
    }
}
