//! A recording destination for tests.

use std::{io, sync::Arc};

use parking_lot::Mutex;
use tracing_subscriber::fmt::MakeWriter;

/// A [`MakeWriter`] keeping every `write()` call as a separate chunk.
#[derive(Clone, Debug, Default)]
pub(crate) struct Capture {
    state: Arc<Mutex<CaptureState>>,
}

#[derive(Debug, Default)]
struct CaptureState {
    writes: Vec<Vec<u8>>,
    flushes: usize,
}

impl Capture {
    /// The chunks written so far, one per `write()` call.
    pub(crate) fn writes(&self) -> Vec<Vec<u8>> {
        self.state.lock().writes.clone()
    }

    pub(crate) fn flushes(&self) -> usize {
        self.state.lock().flushes
    }

    /// Everything written so far.
    #[allow(clippy::unwrap_used)]
    pub(crate) fn text(&self) -> String {
        String::from_utf8(self.state.lock().writes.concat()).unwrap()
    }

    /// Everything written so far, split into lines without their terminators.
    pub(crate) fn lines(&self) -> Vec<String> {
        self.text().lines().map(str::to_owned).collect()
    }
}

impl<'a> MakeWriter<'a> for Capture {
    type Writer = CaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        CaptureWriter {
            state: Arc::clone(&self.state),
        }
    }
}

#[derive(Debug)]
pub(crate) struct CaptureWriter {
    state: Arc<Mutex<CaptureState>>,
}

impl io::Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.state.lock().writes.push(buf.to_vec());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.state.lock().flushes += 1;
        Ok(())
    }
}
