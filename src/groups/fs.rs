//! The `fs` group: file and directory builtins delegating to the context's
//! [`Fs`](crate::fs::Fs) capability. Success for the mutating operations is
//! integer 1; host failures become error values.

use std::rc::Rc;

use crate::context::{Builtin, EvalContext, FunctionGroup};
use crate::groups::{flag, str_value};
use crate::object::{Kind, Parameter, Value};

fn path_op(return_kind: Kind, body: fn(&mut EvalContext, Vec<Value>) -> Value) -> Builtin {
    Builtin {
        evaluate_args: true,
        parameters: vec![Parameter::new("path", Kind::String)],
        return_kind,
        variadic: false,
        body: Rc::new(body),
    }
}

fn path_data_op(body: fn(&mut EvalContext, Vec<Value>) -> Value) -> Builtin {
    Builtin {
        evaluate_args: true,
        parameters: vec![
            Parameter::new("path", Kind::String),
            Parameter::new("content", Kind::String),
        ],
        return_kind: Kind::Integer,
        variadic: false,
        body: Rc::new(body),
    }
}

pub fn group() -> FunctionGroup {
    let mut g = FunctionGroup::new("fs");

    g.insert("fs/exists?", path_op(Kind::Integer, cmd_exists));
    g.insert("fs/dir?", path_op(Kind::Integer, cmd_is_dir));
    g.insert("fs/file?", path_op(Kind::Integer, cmd_is_file));
    g.insert("fs/read_file", path_op(Kind::String, cmd_read_file));
    g.insert("fs/write_file", path_data_op(cmd_write_file));
    g.insert("fs/append_file", path_data_op(cmd_append_file));
    g.insert("fs/rm_file", path_op(Kind::Integer, cmd_rm_file));
    g.insert("fs/rm_dir", path_op(Kind::Integer, cmd_rm_dir));
    g.insert("fs/rm_dir_all", path_op(Kind::Integer, cmd_rm_dir_all));
    g.insert("fs/mk_dir", path_op(Kind::Integer, cmd_mk_dir));
    g.insert("fs/mk_dir_all", path_op(Kind::Integer, cmd_mk_dir_all));
    g.insert("fs/list_dir", path_op(Kind::List, cmd_list_dir));
    g.insert("fs/set_working_dir", path_op(Kind::Integer, cmd_set_working_dir));

    g.insert(
        "fs/working_dir",
        Builtin {
            evaluate_args: true,
            parameters: Vec::new(),
            return_kind: Kind::String,
            variadic: false,
            body: Rc::new(cmd_working_dir),
        },
    );

    g
}

fn cmd_exists(ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let exists = ctx.fs().borrow().exists(str_value(&args[0]));
    flag(exists)
}

fn cmd_is_dir(ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let is_dir = ctx.fs().borrow().is_dir(str_value(&args[0]));
    flag(is_dir)
}

fn cmd_is_file(ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let is_file = ctx.fs().borrow().is_file(str_value(&args[0]));
    flag(is_file)
}

fn cmd_read_file(ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let path = str_value(&args[0]);
    match ctx.fs().borrow().read_file(path) {
        Ok(content) => Value::string(String::from_utf8_lossy(&content).into_owned()),
        Err(err) => Value::error(format!("fs/read_file: failed to read {path}: {err}")),
    }
}

fn cmd_write_file(ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let path = str_value(&args[0]);
    match ctx.fs().borrow().write_file(path, str_value(&args[1]).as_bytes()) {
        Ok(()) => Value::integer(1),
        Err(err) => Value::error(format!("fs/write_file: failed to write {path}: {err}")),
    }
}

fn cmd_append_file(ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let path = str_value(&args[0]);
    match ctx.fs().borrow().append_file(path, str_value(&args[1]).as_bytes()) {
        Ok(()) => Value::integer(1),
        Err(err) => Value::error(format!("fs/append_file: failed to append {path}: {err}")),
    }
}

fn cmd_rm_file(ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let path = str_value(&args[0]);
    match ctx.fs().borrow().delete_file(path) {
        Ok(()) => Value::integer(1),
        Err(err) => Value::error(format!("fs/rm_file: failed to remove {path}: {err}")),
    }
}

fn cmd_rm_dir(ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let path = str_value(&args[0]);
    match ctx.fs().borrow().remove_dir(path) {
        Ok(()) => Value::integer(1),
        Err(err) => Value::error(format!("fs/rm_dir: failed to remove {path}: {err}")),
    }
}

fn cmd_rm_dir_all(ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let path = str_value(&args[0]);
    match ctx.fs().borrow().remove_dir_all(path) {
        Ok(()) => Value::integer(1),
        Err(err) => Value::error(format!("fs/rm_dir_all: failed to remove {path}: {err}")),
    }
}

fn cmd_mk_dir(ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let path = str_value(&args[0]);
    match ctx.fs().borrow().make_dir(path) {
        Ok(()) => Value::integer(1),
        Err(err) => Value::error(format!("fs/mk_dir: failed to create {path}: {err}")),
    }
}

fn cmd_mk_dir_all(ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let path = str_value(&args[0]);
    match ctx.fs().borrow().make_dir_all(path) {
        Ok(()) => Value::integer(1),
        Err(err) => Value::error(format!("fs/mk_dir_all: failed to create {path}: {err}")),
    }
}

fn cmd_list_dir(ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let path = str_value(&args[0]);
    match ctx.fs().borrow().list_dir(path) {
        Ok(names) => Value::list(names.into_iter().map(Value::string).collect()),
        Err(err) => Value::error(format!("fs/list_dir: failed to list {path}: {err}")),
    }
}

fn cmd_working_dir(ctx: &mut EvalContext, _args: Vec<Value>) -> Value {
    let dir = ctx.fs().borrow().working_dir();
    Value::string(dir.to_string_lossy().into_owned())
}

fn cmd_set_working_dir(ctx: &mut EvalContext, args: Vec<Value>) -> Value {
    let path = str_value(&args[0]);
    match ctx.fs().borrow_mut().set_working_dir(path) {
        Ok(()) => Value::integer(1),
        Err(err) => Value::error(format!("fs/set_working_dir: {path}: {err}")),
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::context::ContextBuilder;
    use crate::fs::{Fs, HostFs};
    use crate::groups;
    use crate::io::BufferIo;
    use crate::parser::Parser;

    fn ctx_in_tempdir() -> (EvalContext, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let mut hfs = HostFs::new();
        hfs.set_working_dir(&dir.path().to_string_lossy()).unwrap();
        let ctx = ContextBuilder::new()
            .with_io(Box::new(BufferIo::default()))
            .with_fs(Box::new(hfs))
            .with_function_group(groups::core::group())
            .with_function_group(groups::fs::group())
            .build();
        (ctx, dir)
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
    fn test_file_lifecycle() {
        let (mut ctx, _dir) = ctx_in_tempdir();

        assert_eq!(eval(&mut ctx, "(fs/exists? \"f.txt\")"), Value::integer(0));
        assert_eq!(
            eval(&mut ctx, "(fs/write_file \"f.txt\" \"one\")"),
            Value::integer(1)
        );
        assert_eq!(eval(&mut ctx, "(fs/exists? \"f.txt\")"), Value::integer(1));
        assert_eq!(eval(&mut ctx, "(fs/file? \"f.txt\")"), Value::integer(1));
        assert_eq!(eval(&mut ctx, "(fs/dir? \"f.txt\")"), Value::integer(0));

        eval(&mut ctx, "(fs/append_file \"f.txt\" \" two\")");
        assert_eq!(
            eval(&mut ctx, "(fs/read_file \"f.txt\")"),
            Value::string("one two")
        );

        assert_eq!(eval(&mut ctx, "(fs/rm_file \"f.txt\")"), Value::integer(1));
        assert_eq!(eval(&mut ctx, "(fs/exists? \"f.txt\")"), Value::integer(0));
        assert!(eval(&mut ctx, "(fs/read_file \"f.txt\")").is_error());
    }

    #[test]
    fn test_directories() {
        let (mut ctx, dir) = ctx_in_tempdir();

        eval(&mut ctx, "(fs/mk_dir_all \"a/b\")");
        assert_eq!(eval(&mut ctx, "(fs/dir? \"a/b\")"), Value::integer(1));
        eval(&mut ctx, "(fs/write_file \"a/b/c.txt\" \"x\")");

        assert_eq!(
            eval(&mut ctx, "(fs/list_dir \"a/b\")").encode(),
            "(\"c.txt\")"
        );

        assert_eq!(
            eval(&mut ctx, "(fs/set_working_dir \"a\")"),
            Value::integer(1)
        );
        let wd = eval(&mut ctx, "(fs/working_dir)");
        assert_eq!(wd, Value::string(dir.path().join("a").to_string_lossy()));

        assert_eq!(eval(&mut ctx, "(fs/rm_dir_all \"b\")"), Value::integer(1));
        assert_eq!(eval(&mut ctx, "(fs/exists? \"b\")"), Value::integer(0));
    }
}
