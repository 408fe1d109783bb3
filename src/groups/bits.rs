//! The `bits` group: punning integers and reals to and from their 64-bit
//! representations as little-endian bit lists.

use std::rc::Rc;

use crate::context::{Builtin, EvalContext, FunctionGroup};
use crate::groups::list_value;
use crate::object::{Data, Kind, Parameter, Value};

pub fn group() -> FunctionGroup {
    let mut g = FunctionGroup::new("bits");

    g.insert(
        "bits/explode",
        Builtin {
            evaluate_args: true,
            parameters: vec![Parameter::new("value", Kind::Any)],
            return_kind: Kind::List,
            variadic: false,
            body: Rc::new(cmd_explode),
        },
    );

    g.insert(
        "bits/int",
        Builtin {
            evaluate_args: true,
            parameters: vec![Parameter::new("bits", Kind::List)],
            return_kind: Kind::Integer,
            variadic: false,
            body: Rc::new(cmd_int),
        },
    );

    g.insert(
        "bits/real",
        Builtin {
            evaluate_args: true,
            parameters: vec![Parameter::new("bits", Kind::List)],
            return_kind: Kind::Real,
            variadic: false,
            body: Rc::new(cmd_real),
        },
    );

    g
}

/// Bit i of the 64-bit representation lands at list index i (LSB first).
fn cmd_explode(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let raw: u64 = match &args[0].data {
        Data::Integer(n) => *n as u64,
        Data::Real(r) => r.to_bits(),
        _ => {
            return Value::error(format!(
                "bits/explode: unsupported type {}, expected integer or real",
                args[0].kind()
            ));
        }
    };

    let bits = (0..64)
        .map(|i| Value::integer(((raw >> i) & 1) as i64))
        .collect();
    Value::list(bits)
}

fn collect_bits(name: &str, value: &Value) -> Result<u64, Value> {
    let items = list_value(value);
    if items.len() != 64 {
        return Err(Value::error(format!(
            "{name}: expected 64 bits, got {}",
            items.len()
        )));
    }

    let mut raw: u64 = 0;
    for (index, item) in items.iter().enumerate() {
        let Data::Integer(bit) = item.data else {
            return Err(Value::error(format!(
                "{name}: bit at position {index} is not an integer"
            )));
        };
        if bit != 0 && bit != 1 {
            return Err(Value::error(format!(
                "{name}: bit at position {index} must be 0 or 1, got {bit}"
            )));
        }
        if bit == 1 {
            raw |= 1 << index;
        }
    }
    Ok(raw)
}

fn cmd_int(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    match collect_bits("bits/int", &args[0]) {
        Ok(raw) => Value::integer(raw as i64),
        Err(error) => error,
    }
}

fn cmd_real(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    match collect_bits("bits/real", &args[0]) {
        Ok(raw) => Value::real(f64::from_bits(raw)),
        Err(error) => error,
    }
}
