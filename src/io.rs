//! Terminal I/O capability.
//!
//! Every frame in an evaluation context shares one [`Io`] handle. The host
//! implementation buffers standard output (interleaved `write_string` calls
//! stay well-defined within the single writer) and exposes `flush` to the
//! language; [`BufferIo`] captures everything in memory for tests and
//! embedders.

use std::io::{self, BufRead, BufReader, BufWriter, Cursor, Read, Write};
use std::sync::{Arc, Mutex, PoisonError};

pub trait Io: Send {
    /// Read one line from the input sink, without the trailing newline.
    fn read_line(&mut self) -> io::Result<String>;
    /// Read the input sink to exhaustion.
    fn read_all(&mut self) -> io::Result<Vec<u8>>;
    fn write(&mut self, data: &[u8]) -> io::Result<usize>;
    fn write_string(&mut self, s: &str) -> io::Result<usize>;
    fn write_error(&mut self, data: &[u8]) -> io::Result<usize>;
    fn write_error_string(&mut self, s: &str) -> io::Result<usize>;
    fn flush(&mut self) -> io::Result<()>;
    fn set_input(&mut self, input: Box<dyn BufRead + Send>);
    fn set_output(&mut self, output: Box<dyn Write + Send>);
    fn set_error(&mut self, error: Box<dyn Write + Send>);
}

/// Host I/O over stdin/stdout/stderr, with buffered standard output.
pub struct StdIo {
    input: Box<dyn BufRead + Send>,
    output: BufWriter<Box<dyn Write + Send>>,
    error: Box<dyn Write + Send>,
}

impl StdIo {
    pub fn new() -> StdIo {
        StdIo {
            input: Box::new(BufReader::new(io::stdin())),
            output: BufWriter::new(Box::new(io::stdout())),
            error: Box::new(io::stderr()),
        }
    }
}

impl Default for StdIo {
    fn default() -> Self {
        StdIo::new()
    }
}

impl Io for StdIo {
    fn read_line(&mut self) -> io::Result<String> {
        read_line_from(&mut self.input)
    }

    fn read_all(&mut self) -> io::Result<Vec<u8>> {
        let mut data = Vec::new();
        self.input.read_to_end(&mut data)?;
        Ok(data)
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.output.write(data)
    }

    fn write_string(&mut self, s: &str) -> io::Result<usize> {
        self.output.write(s.as_bytes())
    }

    fn write_error(&mut self, data: &[u8]) -> io::Result<usize> {
        self.error.write(data)
    }

    fn write_error_string(&mut self, s: &str) -> io::Result<usize> {
        self.error.write(s.as_bytes())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.output.flush()
    }

    fn set_input(&mut self, input: Box<dyn BufRead + Send>) {
        self.input = input;
    }

    fn set_output(&mut self, output: Box<dyn Write + Send>) {
        self.output = BufWriter::new(output);
    }

    fn set_error(&mut self, error: Box<dyn Write + Send>) {
        self.error = error;
    }
}

impl Drop for StdIo {
    fn drop(&mut self) {
        let _ = self.output.flush();
    }
}

fn read_line_from(input: &mut (dyn BufRead + Send)) -> io::Result<String> {
    let mut line = String::new();
    let n = input.read_line(&mut line)?;
    if n == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "end of input"));
    }
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(line)
}

/// A clonable in-memory sink. Clones share the same underlying buffer, so a
/// handle kept outside a context still sees everything written inside it.
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> Vec<u8> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn contents_string(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Capture-everything I/O: scripted input, shared in-memory output and error
/// buffers. Used by tests and by embedders that want to run scripts without
/// touching the host terminal.
pub struct BufferIo {
    input: Box<dyn BufRead + Send>,
    output: Box<dyn Write + Send>,
    error: Box<dyn Write + Send>,
    captured_output: SharedBuffer,
    captured_error: SharedBuffer,
}

impl BufferIo {
    pub fn new(input: impl Into<Vec<u8>>) -> BufferIo {
        let captured_output = SharedBuffer::default();
        let captured_error = SharedBuffer::default();
        BufferIo {
            input: Box::new(Cursor::new(input.into())),
            output: Box::new(captured_output.clone()),
            error: Box::new(captured_error.clone()),
            captured_output,
            captured_error,
        }
    }

    /// Handle to the output buffer; valid after the `BufferIo` moves into a
    /// session.
    pub fn output(&self) -> SharedBuffer {
        self.captured_output.clone()
    }

    pub fn error_output(&self) -> SharedBuffer {
        self.captured_error.clone()
    }
}

impl Default for BufferIo {
    fn default() -> Self {
        BufferIo::new(Vec::new())
    }
}

impl Io for BufferIo {
    fn read_line(&mut self) -> io::Result<String> {
        read_line_from(&mut self.input)
    }

    fn read_all(&mut self) -> io::Result<Vec<u8>> {
        let mut data = Vec::new();
        self.input.read_to_end(&mut data)?;
        Ok(data)
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.output.write(data)
    }

    fn write_string(&mut self, s: &str) -> io::Result<usize> {
        self.output.write(s.as_bytes())
    }

    fn write_error(&mut self, data: &[u8]) -> io::Result<usize> {
        self.error.write(data)
    }

    fn write_error_string(&mut self, s: &str) -> io::Result<usize> {
        self.error.write(s.as_bytes())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.output.flush()
    }

    fn set_input(&mut self, input: Box<dyn BufRead + Send>) {
        self.input = input;
    }

    fn set_output(&mut self, output: Box<dyn Write + Send>) {
        self.output = output;
    }

    fn set_error(&mut self, error: Box<dyn Write + Send>) {
        self.error = error;
    }
}
