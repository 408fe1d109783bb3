//! The `host` group: process environment variables and platform facts.

use std::env;
use std::path::PathBuf;
use std::rc::Rc;

use crate::context::{Builtin, EvalContext, FunctionGroup};
use crate::groups::str_value;
use crate::object::{Kind, Parameter, Value};

fn fact(body: fn(&mut EvalContext, Vec<Value>) -> Value) -> Builtin {
    Builtin {
        evaluate_args: true,
        parameters: Vec::new(),
        return_kind: Kind::String,
        variadic: false,
        body: Rc::new(body),
    }
}

pub fn group() -> FunctionGroup {
    let mut g = FunctionGroup::new("host");

    g.insert(
        "host/env/get",
        Builtin {
            evaluate_args: true,
            parameters: vec![Parameter::new("name", Kind::String)],
            return_kind: Kind::String,
            variadic: false,
            body: Rc::new(cmd_env_get),
        },
    );

    g.insert(
        "host/env/set",
        Builtin {
            evaluate_args: true,
            parameters: vec![
                Parameter::new("name", Kind::String),
                Parameter::new("value", Kind::String),
            ],
            return_kind: Kind::Integer,
            variadic: false,
            body: Rc::new(cmd_env_set),
        },
    );

    g.insert("host/dir/home", fact(cmd_dir_home));
    g.insert("host/dir/config", fact(cmd_dir_config));
    g.insert("host/dir/temp", fact(cmd_dir_temp));
    g.insert("host/dir/cache", fact(cmd_dir_cache));
    g.insert("host/os", fact(cmd_os));

    g
}

fn cmd_env_get(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let name = str_value(&args[0]);
    match env::var(name) {
        Ok(value) => Value::string(value),
        Err(_) => Value::error(format!(
            "host/env/get: environment variable not found: {name}"
        )),
    }
}

fn cmd_env_set(_ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    // Affects the whole process, which is the point of the builtin.
    unsafe {
        env::set_var(str_value(&args[0]), str_value(&args[1]));
    }
    Value::integer(1)
}

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}

fn cmd_dir_home(_ctx: &mut EvalContext, _args: Vec<Value>) -> Value {
    match home_dir() {
        Some(dir) => Value::string(dir.to_string_lossy().into_owned()),
        None => Value::error("host/dir/home: failed to get home directory"),
    }
}

fn cmd_dir_config(_ctx: &mut EvalContext, _args: Vec<Value>) -> Value {
    let dir = env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| home_dir().map(|home| home.join(".config")));
    match dir {
        Some(dir) => Value::string(dir.to_string_lossy().into_owned()),
        None => Value::error("host/dir/config: failed to get config directory"),
    }
}

fn cmd_dir_temp(_ctx: &mut EvalContext, _args: Vec<Value>) -> Value {
    Value::string(env::temp_dir().to_string_lossy().into_owned())
}

fn cmd_dir_cache(_ctx: &mut EvalContext, _args: Vec<Value>) -> Value {
    let dir = env::var_os("XDG_CACHE_HOME")
        .map(PathBuf::from)
        .or_else(|| home_dir().map(|home| home.join(".cache")));
    match dir {
        Some(dir) => Value::string(dir.to_string_lossy().into_owned()),
        None => Value::error("host/dir/cache: failed to get cache directory"),
    }
}

fn cmd_os(_ctx: &mut EvalContext, _args: Vec<Value>) -> Value {
    Value::string(env::consts::OS)
}
