//! The `arith` group: integer and real arithmetic, comparisons, conversions,
//! and numeric reflection. Integer arithmetic wraps per two's complement;
//! division and modulo by zero, negative integer exponents, and
//! out-of-domain real operations produce error values. Comparisons return
//! integer 0/1.

use std::rc::Rc;

use rand::Rng;

use crate::context::{Builtin, EvalContext, FunctionGroup};
use crate::groups::{flag, int_value, list_value, real_value};
use crate::object::{Data, Kind, Parameter, Value};

fn int_binary(body: fn(&mut EvalContext, Vec<Value>) -> Value) -> Builtin {
    Builtin {
        evaluate_args: true,
        parameters: vec![
            Parameter::new("a", Kind::Integer),
            Parameter::new("b", Kind::Integer),
        ],
        return_kind: Kind::Integer,
        variadic: false,
        body: Rc::new(body),
    }
}

fn real_binary(return_kind: Kind, body: fn(&mut EvalContext, Vec<Value>) -> Value) -> Builtin {
    Builtin {
        evaluate_args: true,
        parameters: vec![
            Parameter::new("a", Kind::Real),
            Parameter::new("b", Kind::Real),
        ],
        return_kind,
        variadic: false,
        body: Rc::new(body),
    }
}

fn unary(kind: Kind, return_kind: Kind, body: fn(&mut EvalContext, Vec<Value>) -> Value) -> Builtin {
    Builtin {
        evaluate_args: true,
        parameters: vec![Parameter::new("value", kind)],
        return_kind,
        variadic: false,
        body: Rc::new(body),
    }
}

fn variadic_sum(return_kind: Kind, body: fn(&mut EvalContext, Vec<Value>) -> Value) -> Builtin {
    Builtin {
        evaluate_args: true,
        parameters: vec![Parameter::new("values", Kind::Any)],
        return_kind,
        variadic: true,
        body: Rc::new(body),
    }
}

pub fn group() -> FunctionGroup {
    let mut g = FunctionGroup::new("arith");

    g.insert("int/add", int_binary(cmd_int_add));
    g.insert("int/sub", int_binary(cmd_int_sub));
    g.insert("int/mul", int_binary(cmd_int_mul));
    g.insert("int/div", int_binary(cmd_int_div));
    g.insert("int/mod", int_binary(cmd_int_mod));
    g.insert("int/pow", int_binary(cmd_int_pow));
    g.insert("int/eq", int_binary(cmd_int_eq));
    g.insert("int/gt", int_binary(cmd_int_gt));
    g.insert("int/gte", int_binary(cmd_int_gte));
    g.insert("int/lt", int_binary(cmd_int_lt));
    g.insert("int/lte", int_binary(cmd_int_lte));
    g.insert("int/rand", int_binary(cmd_int_rand));
    g.insert("int/sum", variadic_sum(Kind::Integer, cmd_int_sum));
    g.insert("int/abs", unary(Kind::Integer, Kind::Integer, cmd_int_abs));
    g.insert("int/real", unary(Kind::Integer, Kind::Real, cmd_int_to_real));

    g.insert("real/add", real_binary(Kind::Real, cmd_real_add));
    g.insert("real/sub", real_binary(Kind::Real, cmd_real_sub));
    g.insert("real/mul", real_binary(Kind::Real, cmd_real_mul));
    g.insert("real/div", real_binary(Kind::Real, cmd_real_div));
    g.insert("real/pow", real_binary(Kind::Real, cmd_real_pow));
    g.insert("real/eq", real_binary(Kind::Integer, cmd_real_eq));
    g.insert("real/gt", real_binary(Kind::Integer, cmd_real_gt));
    g.insert("real/gte", real_binary(Kind::Integer, cmd_real_gte));
    g.insert("real/lt", real_binary(Kind::Integer, cmd_real_lt));
    g.insert("real/lte", real_binary(Kind::Integer, cmd_real_lte));
    g.insert("real/rand", real_binary(Kind::Real, cmd_real_rand));
    g.insert("real/sum", variadic_sum(Kind::Real, cmd_real_sum));
    g.insert("real/abs", unary(Kind::Real, Kind::Real, cmd_real_abs));
    g.insert("real/int", unary(Kind::Real, Kind::Integer, cmd_real_to_int));
    g.insert("real/sqrt", unary(Kind::Real, Kind::Real, cmd_real_sqrt));
    g.insert("real/exp", unary(Kind::Real, Kind::Real, cmd_real_exp));
    g.insert("real/log", unary(Kind::Real, Kind::Real, cmd_real_log));
    g.insert("real/ceil", unary(Kind::Real, Kind::Integer, cmd_real_ceil));
    g.insert("real/round", unary(Kind::Real, Kind::Integer, cmd_real_round));
    g.insert("real/is-nan", unary(Kind::Real, Kind::Integer, cmd_real_is_nan));
    g.insert("real/is-inf", unary(Kind::Real, Kind::Integer, cmd_real_is_inf));
    g.insert("real/is-finite", unary(Kind::Real, Kind::Integer, cmd_real_is_finite));

    g
}

macro_rules! int_comparison {
    ($name:ident, $op:tt) => {
        fn $name(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
            flag(int_value(&args[0]) $op int_value(&args[1]))
        }
    };
}

macro_rules! real_comparison {
    ($name:ident, $op:tt) => {
        fn $name(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
            flag(real_value(&args[0]) $op real_value(&args[1]))
        }
    };
}

int_comparison!(cmd_int_eq, ==);
int_comparison!(cmd_int_gt, >);
int_comparison!(cmd_int_gte, >=);
int_comparison!(cmd_int_lt, <);
int_comparison!(cmd_int_lte, <=);

// IEEE equality: NaN compares unequal to everything, itself included.
real_comparison!(cmd_real_eq, ==);
real_comparison!(cmd_real_gt, >);
real_comparison!(cmd_real_gte, >=);
real_comparison!(cmd_real_lt, <);
real_comparison!(cmd_real_lte, <=);

fn cmd_int_add(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    Value::integer(int_value(&args[0]).wrapping_add(int_value(&args[1])))
}

fn cmd_int_sub(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    Value::integer(int_value(&args[0]).wrapping_sub(int_value(&args[1])))
}

fn cmd_int_mul(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    Value::integer(int_value(&args[0]).wrapping_mul(int_value(&args[1])))
}

fn cmd_int_div(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let b = int_value(&args[1]);
    if b == 0 {
        return Value::error("int/div: division by zero");
    }
    Value::integer(int_value(&args[0]).wrapping_div(b))
}

fn cmd_int_mod(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let b = int_value(&args[1]);
    if b == 0 {
        return Value::error("int/mod: modulo by zero");
    }
    Value::integer(int_value(&args[0]).wrapping_rem(b))
}

fn cmd_int_pow(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let mut base = int_value(&args[0]);
    let mut exponent = int_value(&args[1]);
    if exponent < 0 {
        return Value::error("int/pow: negative exponent not supported for integer power");
    }
    let mut result: i64 = 1;
    while exponent > 0 {
        if exponent % 2 == 1 {
            result = result.wrapping_mul(base);
        }
        base = base.wrapping_mul(base);
        exponent /= 2;
    }
    Value::integer(result)
}

fn cmd_int_abs(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    Value::integer(int_value(&args[0]).wrapping_abs())
}

fn cmd_int_to_real(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    Value::real(int_value(&args[0]) as f64)
}

fn cmd_int_rand(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let lower = int_value(&args[0]);
    let upper = int_value(&args[1]);
    if lower > upper {
        return Value::error("int/rand: lower bound must be less than or equal to upper bound");
    }
    if lower == upper {
        return Value::integer(lower);
    }
    Value::integer(rand::thread_rng().gen_range(lower..=upper))
}

/// `(int/sum a b c …)` or `(int/sum LIST)`: the single-list form is how a
/// variadic body sums its `$args`.
fn cmd_int_sum(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let scalars: &[Value] = match args.as_slice() {
        [single] if matches!(single.data, Data::List(_)) => list_value(single),
        _ => &args,
    };
    let mut sum: i64 = 0;
    for (index, value) in scalars.iter().enumerate() {
        let Data::Integer(n) = value.data else {
            return Value::error(format!(
                "int/sum: all arguments must be integers, got {} at position {index}",
                value.kind()
            ));
        };
        sum = sum.wrapping_add(n);
    }
    Value::integer(sum)
}

fn cmd_real_add(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    Value::real(real_value(&args[0]) + real_value(&args[1]))
}

fn cmd_real_sub(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    Value::real(real_value(&args[0]) - real_value(&args[1]))
}

fn cmd_real_mul(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    Value::real(real_value(&args[0]) * real_value(&args[1]))
}

fn cmd_real_div(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let b = real_value(&args[1]);
    if b == 0.0 {
        return Value::error("real/div: division by zero");
    }
    Value::real(real_value(&args[0]) / b)
}

fn cmd_real_pow(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let result = real_value(&args[0]).powf(real_value(&args[1]));
    if result.is_nan() || result.is_infinite() {
        return Value::error("real/pow: invalid result (NaN or Inf)");
    }
    Value::real(result)
}

fn cmd_real_abs(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    Value::real(real_value(&args[0]).abs())
}

fn cmd_real_to_int(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    Value::integer(real_value(&args[0]).floor() as i64)
}

fn cmd_real_rand(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let lower = real_value(&args[0]);
    let upper = real_value(&args[1]);
    if lower > upper {
        return Value::error("real/rand: lower bound must be less than or equal to upper bound");
    }
    if lower == upper {
        return Value::real(lower);
    }
    Value::real(rand::thread_rng().gen_range(lower..upper))
}

fn cmd_real_sum(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let scalars: &[Value] = match args.as_slice() {
        [single] if matches!(single.data, Data::List(_)) => list_value(single),
        _ => &args,
    };
    let mut sum: f64 = 0.0;
    for (index, value) in scalars.iter().enumerate() {
        let Data::Real(r) = value.data else {
            return Value::error(format!(
                "real/sum: all arguments must be reals, got {} at position {index}",
                value.kind()
            ));
        };
        sum += r;
    }
    Value::real(sum)
}

fn cmd_real_sqrt(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let value = real_value(&args[0]);
    if value < 0.0 {
        return Value::error("real/sqrt: cannot compute square root of negative number");
    }
    Value::real(value.sqrt())
}

fn cmd_real_exp(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let result = real_value(&args[0]).exp();
    if result.is_infinite() {
        return Value::error("real/exp: result overflow (infinity)");
    }
    Value::real(result)
}

fn cmd_real_log(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let value = real_value(&args[0]);
    if value <= 0.0 {
        return Value::error("real/log: logarithm undefined for non-positive numbers");
    }
    Value::real(value.ln())
}

fn cmd_real_ceil(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    Value::integer(real_value(&args[0]).ceil() as i64)
}

fn cmd_real_round(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    Value::integer(real_value(&args[0]).round() as i64)
}

fn cmd_real_is_nan(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    flag(real_value(&args[0]).is_nan())
}

fn cmd_real_is_inf(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    flag(real_value(&args[0]).is_infinite())
}

fn cmd_real_is_finite(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    flag(real_value(&args[0]).is_finite())
}
