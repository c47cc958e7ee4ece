// Progress-observing byte source.
//
// `ProgressReader` wraps a reader of known length and reports the size of
// every successful read to a `ProgressObserver`. It is handed to the HTTP
// client as a streamed request body, so memory use stays bounded by the
// transport's read buffer whatever the file size.

use indicatif::ProgressBar;
use std::io::{self, Read, Seek, SeekFrom};

/// Receives byte-count deltas as data is consumed.
pub trait ProgressObserver: Send {
    fn advance(&self, delta: u64);
}

impl ProgressObserver for ProgressBar {
    fn advance(&self, delta: u64) {
        self.inc(delta);
    }
}

/// Observer that discards every event.
pub struct NullObserver;

impl ProgressObserver for NullObserver {
    fn advance(&self, _delta: u64) {}
}

pub struct ProgressReader<R> {
    inner: R,
    observer: Box<dyn ProgressObserver>,
    len: u64,
    bytes_read: u64,
}

impl<R> ProgressReader<R> {
    /// Wrap `inner`, whose total size is `len` bytes.
    pub fn new(inner: R, len: u64, observer: Box<dyn ProgressObserver>) -> Self {
        Self {
            inner,
            observer,
            len,
            bytes_read: 0,
        }
    }

    /// Total length of the wrapped stream, as given at construction.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Sum of all deltas reported so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.bytes_read += n as u64;
        self.observer.advance(n as u64);
        Ok(n)
    }
}

// Seeking is passed straight through; the observer only ever sees reads.
impl<R: Seek> Seek for ProgressReader<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}
