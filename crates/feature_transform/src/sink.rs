//! In-memory byte sink with random-access writes.
//!
//! The Arrow IPC file writer emits a header, the record batches and a footer
//! that points back into the stream. `SeekableByteSink` gives it a growable
//! buffer with `Write + Seek` semantics so the whole payload stays in memory.

use std::io::{self, Seek, SeekFrom, Write};

use bytes::Bytes;

#[derive(Debug, Default, Clone)]
pub struct SeekableByteSink {
    buf: Vec<u8>,
    offset: u64,
}

impl SeekableByteSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            offset: 0,
        }
    }

    /// Current cursor position.
    pub fn position(&self) -> u64 {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub fn into_bytes(self) -> Bytes {
        Bytes::from(self.buf)
    }
}

impl Write for SeekableByteSink {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        // Seeks keep the cursor within [0, len].
        let start = self.offset as usize;
        let end = start + data.len();
        if end > self.buf.len() {
            self.buf.resize(end, 0);
        }
        self.buf[start..end].copy_from_slice(data);
        self.offset = end as u64;
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for SeekableByteSink {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let len = self.buf.len() as i128;
        let target = match pos {
            SeekFrom::Start(offset) => i128::from(offset),
            SeekFrom::Current(delta) => i128::from(self.offset) + i128::from(delta),
            SeekFrom::End(delta) => len + i128::from(delta),
        };

        // A seek that leaves the cursor where it is never fails.
        if target == i128::from(self.offset) {
            return Ok(self.offset);
        }
        if target < 0 || target > len {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid seek: new offset {target} out of range [0 {len}]"),
            ));
        }

        self.offset = target as u64;
        Ok(self.offset)
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        Ok(self.offset)
    }
}
