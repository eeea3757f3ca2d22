//! Combined digest-and-byte-count sink.
//!
//! The verification path tees a download through one of these while the
//! entry loop reads `size()` to check alignment, so the counter must be
//! readable while another component is still writing. The size is an
//! atomic; the digest accumulator is single-writer behind a mutex.

use std::io::{self, Read};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use md5::Md5;
use sha2::Sha256;
use sha2::digest::{Digest, Output};

pub struct HasherSizer<D: Digest> {
    bytes: AtomicU64,
    digest: Mutex<D>,
}

pub type Sha256Sizer = HasherSizer<Sha256>;
pub type Md5Sizer = HasherSizer<Md5>;

impl<D: Digest + Clone> HasherSizer<D> {
    pub fn new() -> Self {
        Self {
            bytes: AtomicU64::new(0),
            digest: Mutex::new(D::new()),
        }
    }

    /// Feed bytes into the digest and the counter. Takes `&self` so a tee
    /// and an observer can share one sizer.
    pub fn update(&self, buf: &[u8]) {
        self.bytes.fetch_add(buf.len() as u64, Ordering::Relaxed);
        self.digest.lock().unwrap().update(buf);
    }

    /// Total bytes written so far. Safe to call from another thread.
    pub fn size(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    /// Snapshot the digest of everything written so far.
    pub fn finish(&self) -> Output<D> {
        self.digest.lock().unwrap().clone().finalize()
    }
}

impl<D: Digest + Clone> Default for HasherSizer<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Digest + Clone> io::Write for &HasherSizer<D> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Reader adapter that copies everything read into a shared [`HasherSizer`].
pub struct TeeReader<R, D: Digest> {
    inner: R,
    sink: Arc<HasherSizer<D>>,
}

impl<R: Read, D: Digest + Clone> TeeReader<R, D> {
    pub fn new(inner: R, sink: Arc<HasherSizer<D>>) -> Self {
        Self { inner, sink }
    }
}

impl<R: Read, D: Digest + Clone> Read for TeeReader<R, D> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.sink.update(&buf[..n]);
        Ok(n)
    }
}
