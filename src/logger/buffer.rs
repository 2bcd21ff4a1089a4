//! In-memory run log buffer.

use std::io;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing_subscriber::fmt::MakeWriter;

/// An append-only byte buffer shared between a run logger and its reader.
///
/// Cloning yields another handle to the same bytes: the logger writes
/// through one handle while a handler reads the accumulated run log through
/// another. Each formatted record lands under a single lock acquisition, so
/// records never interleave.
#[derive(Clone, Debug, Default)]
pub struct RunLogBuffer(Arc<Mutex<Vec<u8>>>);

impl RunLogBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    /// A snapshot of everything written so far.
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.lock().clone()
    }

    /// The run log as text, with invalid UTF-8 replaced.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }

    /// Drains the buffer, returning its contents.
    pub fn take(&self) -> Vec<u8> {
        std::mem::take(&mut *self.0.lock())
    }
}

impl io::Write for RunLogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for RunLogBuffer {
    type Writer = RunLogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
