//! Append stream handle

use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::records::RecordId;

use super::append::{AppendBuffer, AppendSink};

/// Write handle returned by `Storage::append_stream`
///
/// Writes land in the cached buffer for the record and reach the heap when
/// the buffer is flushed (eviction, `Storage::force`, `Storage::dispose`, or
/// any other operation on the same record). Dropping the handle and
/// `Write::flush` leave the buffer in the cache so later streams can keep
/// coalescing into it.
pub struct AppendStream {
    record: RecordId,
    buffer: Arc<Mutex<AppendBuffer>>,
    sink: Arc<dyn AppendSink>,
}

impl AppendStream {
    pub(crate) fn new(
        record: RecordId,
        buffer: Arc<Mutex<AppendBuffer>>,
        sink: Arc<dyn AppendSink>,
    ) -> Self {
        Self {
            record,
            buffer,
            sink,
        }
    }

    /// The record this stream appends to
    pub fn record(&self) -> RecordId {
        self.record
    }
}

impl Write for AppendStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        {
            let mut buffer = self.buffer.lock();
            if !buffer.detached {
                buffer.data.extend_from_slice(buf);
                return Ok(buf.len());
            }
        }

        // Buffer already flushed out of the cache: append directly
        self.sink.flush_appended(self.record, buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
