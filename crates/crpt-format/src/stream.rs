use std::io::{Read, Write};

use crpt_core::crypto::{CbcStream, BLOCK_LEN};
use crpt_core::io_ext::read_full;
use tracing::debug;
use zeroize::Zeroizing;

use crate::container::FormatError;
use crate::observer::Observer;

/// Bytes read from the source per cipher update.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Turns byte counts into the fraction sequence handed to [`Observer::report`].
#[derive(Debug)]
pub(crate) struct ProgressTracker {
    total: u64,
    done: u64,
    completed: bool,
}

impl ProgressTracker {
    pub(crate) fn new(total: u64) -> Self {
        Self {
            total,
            done: 0,
            completed: false,
        }
    }

    pub(crate) fn done(&self) -> u64 {
        self.done
    }

    pub(crate) fn advance<O: Observer + ?Sized>(&mut self, bytes: u64, observer: &mut O) {
        self.done = self.done.saturating_add(bytes);
        let fraction = if self.total == 0 {
            1.0
        } else {
            (self.done as f64 / self.total as f64).min(1.0)
        };
        self.emit(fraction, observer);
    }

    pub(crate) fn finish<O: Observer + ?Sized>(&mut self, observer: &mut O) {
        self.emit(1.0, observer);
    }

    fn emit<O: Observer + ?Sized>(&mut self, fraction: f64, observer: &mut O) {
        if self.completed {
            return;
        }
        if fraction >= 1.0 {
            self.completed = true;
        }
        observer.report(fraction);
    }
}

/// Streams `reader` through `cipher` into `writer` in [`CHUNK_SIZE`] pieces,
/// polling for cancellation before each read. Returns the number of bytes
/// written.
pub(crate) fn pump<R, W, O>(
    reader: &mut R,
    writer: &mut W,
    mut cipher: CbcStream,
    total: u64,
    observer: &mut O,
) -> Result<u64, FormatError>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
    O: Observer + ?Sized,
{
    let mut progress = ProgressTracker::new(total);
    let mut chunk = Zeroizing::new(vec![0u8; CHUNK_SIZE]);
    let mut out = Zeroizing::new(Vec::with_capacity(CHUNK_SIZE + BLOCK_LEN));
    let mut written = 0u64;

    loop {
        if observer.is_cancelled() {
            debug!(processed = progress.done(), total, "cancellation requested");
            return Err(FormatError::Cancelled);
        }

        let read = read_full(reader, &mut chunk)?;
        if read == 0 {
            break;
        }

        out.clear();
        cipher.update(&chunk[..read], &mut out);
        writer.write_all(&out)?;
        written += out.len() as u64;
        progress.advance(read as u64, observer);
    }

    out.clear();
    cipher.finalize(&mut out)?;
    writer.write_all(&out)?;
    writer.flush()?;
    written += out.len() as u64;

    progress.finish(observer);
    Ok(written)
}
