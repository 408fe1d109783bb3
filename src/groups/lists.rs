//! The `list` group. `iter`, `map`, `filter`, and `reduce` receive their
//! arguments unevaluated, evaluate them internally, and apply the callback
//! through the context's `execute`, so any callable value works: user
//! functions, builtin names, or expressions producing either.

use std::rc::Rc;

use crate::context::{Builtin, EvalContext, FunctionGroup};
use crate::groups::{flag, int_value, list_value, str_value};
use crate::object::{Data, Kind, Parameter, Value};

fn list_unary(return_kind: Kind, body: fn(&mut EvalContext, Vec<Value>) -> Value) -> Builtin {
    Builtin {
        evaluate_args: true,
        parameters: vec![Parameter::new("list", Kind::List)],
        return_kind,
        variadic: false,
        body: Rc::new(body),
    }
}

fn callback_form(
    parameter_count: usize,
    return_kind: Kind,
    body: fn(&mut EvalContext, Vec<Value>) -> Value,
) -> Builtin {
    let names = ["list", "a", "b"];
    Builtin {
        evaluate_args: false,
        parameters: (0..parameter_count)
            .map(|i| Parameter::new(names[i.min(names.len() - 1)], Kind::Any))
            .collect(),
        return_kind,
        variadic: false,
        body: Rc::new(body),
    }
}

pub fn group() -> FunctionGroup {
    let mut g = FunctionGroup::new("list");

    g.insert(
        "list/new",
        Builtin {
            evaluate_args: true,
            parameters: vec![
                Parameter::new("length", Kind::Integer),
                Parameter::new("default", Kind::Any),
            ],
            return_kind: Kind::List,
            variadic: false,
            body: Rc::new(cmd_list_new),
        },
    );

    g.insert("list/len", list_unary(Kind::Integer, cmd_list_len));
    g.insert("list/empty", list_unary(Kind::Integer, cmd_list_empty));
    g.insert("list/first", list_unary(Kind::Any, cmd_list_first));
    g.insert("list/last", list_unary(Kind::Any, cmd_list_last));
    g.insert("list/pop", list_unary(Kind::Any, cmd_list_pop));
    g.insert("list/clear", list_unary(Kind::List, cmd_list_clear));
    g.insert("list/reverse", list_unary(Kind::List, cmd_list_reverse));

    g.insert(
        "list/get",
        Builtin {
            evaluate_args: true,
            parameters: vec![
                Parameter::new("list", Kind::List),
                Parameter::new("index", Kind::Integer),
            ],
            return_kind: Kind::Any,
            variadic: false,
            body: Rc::new(cmd_list_get),
        },
    );

    g.insert(
        "list/set",
        Builtin {
            evaluate_args: true,
            parameters: vec![
                Parameter::new("list", Kind::List),
                Parameter::new("index", Kind::Integer),
                Parameter::new("value", Kind::Any),
            ],
            return_kind: Kind::List,
            variadic: false,
            body: Rc::new(cmd_list_set),
        },
    );

    g.insert(
        "list/push",
        Builtin {
            evaluate_args: true,
            parameters: vec![
                Parameter::new("list", Kind::List),
                Parameter::new("value", Kind::Any),
            ],
            return_kind: Kind::List,
            variadic: false,
            body: Rc::new(cmd_list_push),
        },
    );

    g.insert(
        "list/fill",
        Builtin {
            evaluate_args: true,
            parameters: vec![
                Parameter::new("list", Kind::List),
                Parameter::new("value", Kind::Any),
            ],
            return_kind: Kind::List,
            variadic: false,
            body: Rc::new(cmd_list_fill),
        },
    );

    g.insert(
        "list/contains",
        Builtin {
            evaluate_args: true,
            parameters: vec![
                Parameter::new("list", Kind::List),
                Parameter::new("value", Kind::Any),
            ],
            return_kind: Kind::Integer,
            variadic: false,
            body: Rc::new(cmd_list_contains),
        },
    );

    g.insert(
        "list/index",
        Builtin {
            evaluate_args: true,
            parameters: vec![
                Parameter::new("list", Kind::List),
                Parameter::new("value", Kind::Any),
            ],
            return_kind: Kind::Integer,
            variadic: false,
            body: Rc::new(cmd_list_index),
        },
    );

    g.insert(
        "list/concat",
        Builtin {
            evaluate_args: true,
            parameters: vec![Parameter::new("lists", Kind::List)],
            return_kind: Kind::List,
            variadic: true,
            body: Rc::new(cmd_list_concat),
        },
    );

    g.insert(
        "list/join",
        Builtin {
            evaluate_args: true,
            parameters: vec![
                Parameter::new("list", Kind::List),
                Parameter::new("separator", Kind::String),
            ],
            return_kind: Kind::String,
            variadic: false,
            body: Rc::new(cmd_list_join),
        },
    );

    g.insert(
        "list/subset",
        Builtin {
            evaluate_args: true,
            parameters: vec![
                Parameter::new("list", Kind::List),
                Parameter::new("start", Kind::Integer),
                Parameter::new("end", Kind::Integer),
            ],
            return_kind: Kind::List,
            variadic: false,
            body: Rc::new(cmd_list_subset),
        },
    );

    g.insert(
        "list/slice",
        Builtin {
            evaluate_args: true,
            parameters: vec![
                Parameter::new("list", Kind::List),
                Parameter::new("start", Kind::Integer),
                Parameter::new("end", Kind::Integer),
            ],
            return_kind: Kind::List,
            variadic: false,
            body: Rc::new(cmd_list_slice),
        },
    );

    g.insert("list/iter", callback_form(2, Kind::Integer, cmd_list_iter));
    g.insert("list/map", callback_form(2, Kind::List, cmd_list_map));
    g.insert("list/filter", callback_form(2, Kind::List, cmd_list_filter));
    g.insert("list/reduce", callback_form(3, Kind::Any, cmd_list_reduce));

    g
}

fn cmd_list_new(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let length = int_value(&args[0]);
    if length < 0 {
        return Value::error("list/new: length must be non-negative");
    }
    let items = vec![args[1].clone(); length as usize];
    Value::list(items)
}

fn cmd_list_len(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    Value::integer(list_value(&args[0]).len() as i64)
}

fn cmd_list_empty(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    flag(list_value(&args[0]).is_empty())
}

fn cmd_list_first(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    match list_value(&args[0]).first() {
        Some(item) => item.clone(),
        None => Value::error("list/first: cannot get first element of empty list"),
    }
}

fn cmd_list_last(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    match list_value(&args[0]).last() {
        Some(item) => item.clone(),
        None => Value::error("list/last: cannot get last element of empty list"),
    }
}

fn cmd_list_pop(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    match list_value(&args[0]).last() {
        Some(item) => item.clone(),
        None => Value::error("list/pop: cannot pop from empty list"),
    }
}

fn cmd_list_clear(_ctx: &mut EvalContext, _args: Vec<Value>) -> Value {
    Value::list(Vec::new())
}

fn cmd_list_reverse(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let mut items = list_value(&args[0]).to_vec();
    items.reverse();
    Value::list(items)
}

fn cmd_list_get(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let items = list_value(&args[0]);
    let index = int_value(&args[1]);
    if index < 0 || index as usize >= items.len() {
        return Value::error(format!("list/get: index out of bounds: {index}"));
    }
    items[index as usize].clone()
}

fn cmd_list_set(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let mut items = list_value(&args[0]).to_vec();
    let index = int_value(&args[1]);
    if index < 0 || index as usize >= items.len() {
        return Value::error(format!("list/set: index out of bounds: {index}"));
    }
    items[index as usize] = args[2].clone();
    Value::list(items)
}

fn cmd_list_push(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let mut items = list_value(&args[0]).to_vec();
    items.push(args[1].clone());
    Value::list(items)
}

fn cmd_list_fill(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let length = list_value(&args[0]).len();
    Value::list(vec![args[1].clone(); length])
}

// Containment and position compare by encoded form, which lines up with the
// encoder's round-trip guarantee for data kinds.

fn cmd_list_contains(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let needle = args[1].encode();
    flag(list_value(&args[0]).iter().any(|item| item.encode() == needle))
}

fn cmd_list_index(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let needle = args[1].encode();
    match list_value(&args[0])
        .iter()
        .position(|item| item.encode() == needle)
    {
        Some(index) => Value::integer(index as i64),
        None => Value::integer(-1),
    }
}

fn cmd_list_concat(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let mut result = Vec::new();
    for value in &args {
        result.extend_from_slice(list_value(value));
    }
    Value::list(result)
}

fn cmd_list_join(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let separator = str_value(&args[1]);
    let mut result = String::new();
    for (index, item) in list_value(&args[0]).iter().enumerate() {
        if index > 0 {
            result.push_str(separator);
        }
        match &item.data {
            Data::Str(s) => result.push_str(s),
            _ => result.push_str(&item.encode()),
        }
    }
    Value::string(result)
}

/// Inclusive subset: both indices must be in bounds and ordered.
fn cmd_list_subset(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let items = list_value(&args[0]);
    let start = int_value(&args[1]);
    let end = int_value(&args[2]);

    if start < 0 || start as usize >= items.len() {
        return Value::error(format!("list/subset: start index out of bounds: {start}"));
    }
    if end < 0 || end as usize >= items.len() {
        return Value::error(format!("list/subset: end index out of bounds: {end}"));
    }
    if start > end {
        return Value::error("list/subset: start index must be <= end index");
    }

    Value::list(items[start as usize..=end as usize].to_vec())
}

/// Exclusive slice with clamping, the forgiving counterpart to `subset`.
fn cmd_list_slice(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let items = list_value(&args[0]);
    let length = items.len() as i64;

    let start = int_value(&args[1]).max(0);
    let end = int_value(&args[2]).min(length).max(start);

    Value::list(items[start as usize..end as usize].to_vec())
}

fn eval_callback_input(ctx: &mut EvalContext, expression: &Value) -> Result<Value, Value> {
    let value = ctx.evaluate(expression);
    if value.is_error() { Err(value) } else { Ok(value) }
}

fn require_list(name: &str, value: &Value) -> Result<Vec<Value>, Value> {
    match &value.data {
        Data::List(items) => Ok(items.clone()),
        _ => Err(Value::error(format!(
            "{name}: first argument must be a list, got {}",
            value.kind()
        ))),
    }
}

/// `(list/iter LIST CALLBACK)`: callback returns integer 1 to continue, 0
/// to stop early. Yields 1 when the whole list was visited, 0 on early stop.
fn cmd_list_iter(ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let list = match eval_callback_input(ctx, &args[0]) {
        Ok(value) => value,
        Err(error) => return error,
    };
    let items = match require_list("list/iter", &list) {
        Ok(items) => items,
        Err(error) => return error,
    };
    let callback = match eval_callback_input(ctx, &args[1]) {
        Ok(value) => value,
        Err(error) => return error,
    };

    for element in items {
        let result = ctx.execute(&[callback.clone(), element]);
        if result.is_error() {
            return result;
        }
        let Data::Integer(keep_going) = result.data else {
            return Value::error("list/iter: callback must return integer (1 to continue, 0 to stop)");
        };
        if keep_going == 0 {
            return Value::integer(0);
        }
    }
    Value::integer(1)
}

fn cmd_list_map(ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let list = match eval_callback_input(ctx, &args[0]) {
        Ok(value) => value,
        Err(error) => return error,
    };
    let items = match require_list("list/map", &list) {
        Ok(items) => items,
        Err(error) => return error,
    };
    let mapper = match eval_callback_input(ctx, &args[1]) {
        Ok(value) => value,
        Err(error) => return error,
    };

    let mut mapped = Vec::with_capacity(items.len());
    for element in items {
        let result = ctx.execute(&[mapper.clone(), element]);
        if result.is_error() {
            return result;
        }
        mapped.push(result);
    }
    Value::list(mapped)
}

fn cmd_list_filter(ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let list = match eval_callback_input(ctx, &args[0]) {
        Ok(value) => value,
        Err(error) => return error,
    };
    let items = match require_list("list/filter", &list) {
        Ok(items) => items,
        Err(error) => return error,
    };
    let predicate = match eval_callback_input(ctx, &args[1]) {
        Ok(value) => value,
        Err(error) => return error,
    };

    let mut kept = Vec::new();
    for element in items {
        let verdict = ctx.execute(&[predicate.clone(), element.clone()]);
        if verdict.is_error() {
            return verdict;
        }
        let Data::Integer(include) = verdict.data else {
            return Value::error(
                "list/filter: predicate must return integer (1 to include, 0 to exclude)",
            );
        };
        if include != 0 {
            kept.push(element);
        }
    }
    Value::list(kept)
}

fn cmd_list_reduce(ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let list = match eval_callback_input(ctx, &args[0]) {
        Ok(value) => value,
        Err(error) => return error,
    };
    let items = match require_list("list/reduce", &list) {
        Ok(items) => items,
        Err(error) => return error,
    };
    let initial = match eval_callback_input(ctx, &args[1]) {
        Ok(value) => value,
        Err(error) => return error,
    };
    let reducer = match eval_callback_input(ctx, &args[2]) {
        Ok(value) => value,
        Err(error) => return error,
    };

    let mut accumulator = initial;
    for element in items {
        let result = ctx.execute(&[reducer.clone(), accumulator, element]);
        if result.is_error() {
            return result;
        }
        accumulator = result;
    }
    accumulator
}
