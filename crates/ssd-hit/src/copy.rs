//! Fixed-buffer streaming copy.
//!
//! The buffer size is a tuning knob only: any size of at least one byte
//! produces identical output. Each pass fills the buffer as far as the
//! source allows, writes exactly the bytes read, and stops after the first
//! chunk shorter than the buffer (including an empty one).

use std::io::{self, Read, Write};
use std::num::NonZeroUsize;

use thiserror::Error;

/// Default copy buffer size (64 KiB).
pub const DEFAULT_BUFFER_SIZE: NonZeroUsize = match NonZeroUsize::new(64 * 1024) {
    Some(size) => size,
    None => unreachable!(),
};

/// Tuning for materialization.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HitConfig {
    pub buffer_size: NonZeroUsize,
}

impl Default for HitConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

/// Which side of a copy failed.
#[derive(Debug, Error)]
pub enum CopyError {
    #[error("read failed: {0}")]
    Read(#[source] io::Error),
    #[error("write failed: {0}")]
    Write(#[source] io::Error),
}

/// Copy `src` into `dst` through a buffer of `buffer_size` bytes.
///
/// Returns the number of bytes written. A read error is reported as
/// [`CopyError::Read`], distinct from end of stream; a write error as
/// [`CopyError::Write`]. `dst` is flushed before returning.
pub fn copy_stream<R, W>(src: &mut R, dst: &mut W, buffer_size: NonZeroUsize) -> Result<u64, CopyError>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut buf = vec![0u8; buffer_size.get()];
    let mut total: u64 = 0;

    loop {
        let filled = fill_chunk(src, &mut buf).map_err(CopyError::Read)?;
        dst.write_all(&buf[..filled]).map_err(CopyError::Write)?;
        total += filled as u64;
        if filled < buf.len() {
            break;
        }
    }

    dst.flush().map_err(CopyError::Write)?;
    Ok(total)
}

/// Read until `buf` is full or the source reports end of stream.
fn fill_chunk<R: Read + ?Sized>(src: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match src.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
