//! Output destinations for the `print` builtin.
//!
//! The interpreter has exactly one side effect, and this module decides where it
//! goes. A root environment is built with one [`PrintSink`]; every `print` call
//! evaluated against that environment writes one line to it.

use std::sync::Arc;

use parking_lot::Mutex;

/// Where `print` writes its formatted line
#[derive(Clone, Default)]
pub enum PrintSink {
    /// Writes each line to stdout (default)
    #[default]
    Stdout,
    /// Appends each line, newline terminated, to a shared buffer
    Buffer(Arc<Mutex<String>>),
    /// Discards all output
    Silent,
}

impl PrintSink {
    /// Create a capturing sink together with a handle for reading what it captured
    pub fn buffer() -> (Self, Arc<Mutex<String>>) {
        let buffer = Arc::new(Mutex::new(String::new()));
        (PrintSink::Buffer(Arc::clone(&buffer)), buffer)
    }

    /// Emit one line (a newline is appended)
    pub fn println(&self, line: &str) {
        match self {
            PrintSink::Stdout => println!("{line}"),
            PrintSink::Buffer(buffer) => {
                let mut buf = buffer.lock();
                buf.push_str(line);
                buf.push('\n');
            }
            PrintSink::Silent => {}
        }
    }

    /// Everything captured so far. Empty for sinks that don't capture.
    pub fn get_output(&self) -> String {
        match self {
            PrintSink::Buffer(buffer) => buffer.lock().clone(),
            PrintSink::Stdout | PrintSink::Silent => String::new(),
        }
    }
}

impl std::fmt::Debug for PrintSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrintSink::Stdout => write!(f, "Stdout"),
            PrintSink::Buffer(_) => write!(f, "Buffer"),
            PrintSink::Silent => write!(f, "Silent"),
        }
    }
}
