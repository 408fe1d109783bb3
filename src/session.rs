//! Sessions: the canonical way to run scripts against a persistent
//! environment. A session owns an evaluation context preloaded with the
//! standard function groups, seeds the current file from its start path,
//! and evaluates source strings one top-level expression at a time.

use std::path::Path;

use crate::context::{ContextBuilder, EvalContext, FunctionGroup};
use crate::fs::Fs;
use crate::groups;
use crate::io::Io;
use crate::mem::MemRef;
use crate::object::Value;
use crate::parser::{ParseError, Parser};

pub struct SessionBuilder {
    io: Option<Box<dyn Io>>,
    fs: Option<Box<dyn Fs>>,
    mem: Option<MemRef>,
    max_recursion_depth: Option<usize>,
    extra_groups: Vec<FunctionGroup>,
}

impl SessionBuilder {
    pub fn new() -> SessionBuilder {
        SessionBuilder {
            io: None,
            fs: None,
            mem: None,
            max_recursion_depth: None,
            extra_groups: Vec::new(),
        }
    }

    pub fn with_io(mut self, io: Box<dyn Io>) -> SessionBuilder {
        self.io = Some(io);
        self
    }

    pub fn with_fs(mut self, fs: Box<dyn Fs>) -> SessionBuilder {
        self.fs = Some(fs);
        self
    }

    pub fn with_mem(mut self, mem: MemRef) -> SessionBuilder {
        self.mem = Some(mem);
        self
    }

    pub fn with_max_recursion_depth(mut self, depth: usize) -> SessionBuilder {
        self.max_recursion_depth = Some(depth);
        self
    }

    pub fn with_function_group(mut self, group: FunctionGroup) -> SessionBuilder {
        self.extra_groups.push(group);
        self
    }

    /// Build a session rooted at `start_path`: typically the script the
    /// caller is about to run. The path becomes the context's current file
    /// (used for error attribution and `use` resolution) and its directory
    /// seeds the filesystem capability's working directory.
    pub fn build(self, start_path: impl AsRef<Path>) -> Session {
        let start_path = start_path.as_ref().to_path_buf();

        let mut builder = ContextBuilder::new()
            .with_function_group(groups::core::group())
            .with_function_group(groups::numbers::group())
            .with_function_group(groups::strings::group())
            .with_function_group(groups::lists::group())
            .with_function_group(groups::reflect::group())
            .with_function_group(groups::fs::group())
            .with_function_group(groups::io::group())
            .with_function_group(groups::bits::group())
            .with_function_group(groups::host::group());

        if let Some(io) = self.io {
            builder = builder.with_io(io);
        }
        if let Some(fs) = self.fs {
            builder = builder.with_fs(fs);
        }
        if let Some(mem) = self.mem {
            builder = builder.with_mem(mem);
        }
        if let Some(depth) = self.max_recursion_depth {
            builder = builder.with_max_recursion_depth(depth);
        }
        for group in self.extra_groups {
            builder = builder.with_function_group(group);
        }

        let mut ctx = builder.build();
        ctx.set_current_file(start_path.to_string_lossy().into_owned());

        if let Some(dir) = start_path.parent()
            && !dir.as_os_str().is_empty()
        {
            let _ = ctx
                .fs()
                .borrow_mut()
                .set_working_dir(&dir.to_string_lossy());
        }

        Session { ctx }
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        SessionBuilder::new()
    }
}

pub struct Session {
    ctx: EvalContext,
}

impl Session {
    /// Parse and evaluate a source string. Top-level expressions run in
    /// order against the session's environment; the first error value stops
    /// the walk and is returned as the result. Parse failures surface on
    /// the `Err` channel before anything runs.
    pub fn evaluate(&mut self, source: &str) -> Result<Value, ParseError> {
        let items = Parser::new(source).parse_all()?;
        tracing::debug!(expressions = items.len(), "evaluating source");

        let mut result = Value::none();
        for item in &items {
            let value = self.ctx.evaluate(item);
            if value.is_error() {
                return Ok(value);
            }
            result = value;
        }
        Ok(result)
    }

    pub fn context(&mut self) -> &mut EvalContext {
        &mut self.ctx
    }

    pub fn mem(&self) -> MemRef {
        self.ctx.mem()
    }

    pub fn io(&self) -> std::rc::Rc<std::cell::RefCell<Box<dyn Io>>> {
        self.ctx.io()
    }

    pub fn fs(&self) -> std::rc::Rc<std::cell::RefCell<Box<dyn Fs>>> {
        self.ctx.fs()
    }
}
