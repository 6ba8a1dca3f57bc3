//! The byte source/sink abstraction the header and record codecs are built on top of.
//!
//! A simple read/write split: the Format is a flat byte stream (no page allocator), so the
//! transport only needs to track a logical position, support forward skipping, and (for writers)
//! support seeking back to the start to rewrite the header on close.

use crate::error::{DbnError, DbnErrorKind, Result};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Cursor, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// The magic 4 bytes that begin a zstd-compressed frame.
pub const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// A forward-only (or seekable) byte source, as consumed by the header and record codecs.
pub trait ReadTransport {
    /// Reads exactly `buf.len()` bytes, failing with [`DbnErrorKind::UnexpectedEof`] if the
    /// stream ends first.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Reads exactly `buf.len()` bytes, or returns `Ok(false)` without modifying `buf` if the
    /// stream is already at EOF before any byte is read. If the stream ends partway through,
    /// this still returns `UnexpectedEof` (a truncated record is malformed, not a clean EOF).
    fn try_read_exact(&mut self, buf: &mut [u8]) -> Result<bool>;

    /// Discards the next `n` bytes without returning them.
    fn skip(&mut self, n: u64) -> Result<()>;

    /// The current logical byte position (on the decompressed view, if compressed).
    fn position(&self) -> u64;
}

/// A seekable byte sink, as consumed by the header codec and the finalizing writer.
pub trait WriteTransport {
    /// Writes all of `buf`.
    fn write_all(&mut self, buf: &[u8]) -> Result<()>;

    /// Seeks to an absolute byte offset from the start of the stream.
    fn seek(&mut self, absolute: u64) -> Result<()>;

    /// The current byte position.
    fn stream_position(&mut self) -> Result<u64>;

    /// Flushes any buffered writes to the underlying sink.
    fn flush(&mut self) -> Result<()>;

    /// Releases the underlying sink. Idempotent; safe to call more than once.
    fn close(&mut self) -> Result<()>;
}

impl<T: WriteTransport + ?Sized> WriteTransport for &mut T {
    fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        (**self).write_all(buf)
    }

    fn seek(&mut self, absolute: u64) -> Result<()> {
        (**self).seek(absolute)
    }

    fn stream_position(&mut self) -> Result<u64> {
        (**self).stream_position()
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

/// A [`ReadTransport`] over any [`Read`] implementation.
///
/// `R` is commonly `BufReader<File>` for uncompressed input, or `zstd::Decoder<BufReader<File>>`
/// (which performs its own internal buffering in large chunks) for compressed input.
pub struct Reader<R> {
    inner: R,
    pos: u64,
}

impl<R: Read> Reader<R> {
    /// Wraps an existing [`Read`] implementation, starting the logical position at 0.
    pub fn new(inner: R) -> Self {
        Self { inner, pos: 0 }
    }

    /// Consumes this reader, returning the wrapped value.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> ReadTransport for Reader<R> {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.inner.read_exact(buf).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                DbnError::unexpected_eof(format!(
                    "expected {} bytes at offset {}, stream ended early",
                    buf.len(),
                    self.pos
                ))
                .with_offset(self.pos)
            } else {
                DbnError::from(e)
            }
        })?;
        self.pos += buf.len() as u64;
        Ok(())
    }

    fn try_read_exact(&mut self, buf: &mut [u8]) -> Result<bool> {
        if buf.is_empty() {
            return Ok(true);
        }
        let mut filled = 0usize;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => {
                    if filled == 0 {
                        return Ok(false);
                    }
                    return Err(DbnError::unexpected_eof(format!(
                        "stream ended after {filled} of {} bytes at offset {}",
                        buf.len(),
                        self.pos
                    ))
                    .with_offset(self.pos));
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(DbnError::from(e)),
            }
        }
        self.pos += filled as u64;
        Ok(true)
    }

    fn skip(&mut self, n: u64) -> Result<()> {
        let mut remaining = n;
        let mut buf = [0u8; 4096];
        while remaining > 0 {
            let chunk = remaining.min(buf.len() as u64) as usize;
            self.read_exact(&mut buf[..chunk])?;
            remaining -= chunk as u64;
        }
        Ok(())
    }

    fn position(&self) -> u64 {
        self.pos
    }
}

/// A [`WriteTransport`] over any [`Write`] + [`Seek`] implementation.
pub struct Writer<W> {
    inner: W,
}

impl<W: Write + Seek> Writer<W> {
    /// Wraps an existing [`Write`] + [`Seek`] implementation.
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Consumes this writer, returning the wrapped value.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write + Seek> WriteTransport for Writer<W> {
    fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        self.inner.write_all(buf).map_err(DbnError::from)
    }

    fn seek(&mut self, absolute: u64) -> Result<()> {
        self.inner
            .seek(SeekFrom::Start(absolute))
            .map_err(DbnError::from)?;
        Ok(())
    }

    fn stream_position(&mut self) -> Result<u64> {
        self.inner.stream_position().map_err(DbnError::from)
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush().map_err(DbnError::from)
    }

    fn close(&mut self) -> Result<()> {
        self.flush()
    }
}

/// Opens a file for reading, transparently wrapping it in a zstd decompressor if the stream is
/// compressed (detected by magic or by a `.zst` path suffix).
pub fn open_read_file(path: &Path) -> Result<Reader<Box<dyn Read + Send>>> {
    let file = File::open(path).map_err(DbnError::from)?;
    let buffered = BufReader::with_capacity(64 * 1024, file);
    let path_suggests_zst = path.extension().is_some_and(|ext| ext == "zst");
    open_read_stream(buffered, path_suggests_zst)
}

/// Wraps an already-open [`Read`] implementation, detecting compression by magic.
/// `path_suggests_zst` lets a caller force compression detection for streams whose name carries
/// a `.zst` suffix even if the magic bytes have not arrived yet (e.g. a pipe that has not
/// produced its first 4 bytes).
pub fn open_read_stream<R: Read + Send + 'static>(
    mut inner: R,
    path_suggests_zst: bool,
) -> Result<Reader<Box<dyn Read + Send>>> {
    let mut magic = [0u8; 4];
    let mut filled = 0usize;
    while filled < magic.len() {
        match inner.read(&mut magic[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(DbnError::from(e)),
        }
    }
    let is_compressed = (filled == 4 && magic == ZSTD_MAGIC) || path_suggests_zst;
    let prefix = Cursor::new(magic[..filled].to_vec());
    let chained = prefix.chain(inner);

    let boxed: Box<dyn Read + Send> = if is_compressed {
        Box::new(zstd::Decoder::new(chained).map_err(DbnError::from)?)
    } else {
        Box::new(chained)
    };
    Ok(Reader::new(boxed))
}

/// Opens (creating/truncating) a file for writing. The finalizing writer requires this: it must
/// be able to seek back to offset 0 to rewrite the header on close.
pub fn create_write_file(path: &Path) -> Result<Writer<BufWriter<File>>> {
    let file = File::create(path).map_err(DbnError::from)?;
    Ok(Writer::new(BufWriter::new(file)))
}

/// An in-memory transport over a `Vec<u8>`, used by tests so they don't touch the filesystem.
pub type CursorReader = Reader<Cursor<Vec<u8>>>;
/// An in-memory writable transport over a `Vec<u8>`.
pub type CursorWriter = Writer<Cursor<Vec<u8>>>;

/// Builds an in-memory reader over a byte buffer, applying the same compression detection as
/// [`open_read_file`].
pub fn cursor_reader(bytes: Vec<u8>) -> Result<Reader<Box<dyn Read + Send>>> {
    open_read_stream(Cursor::new(bytes), false)
}

/// Builds an in-memory writer over an empty byte buffer.
pub fn cursor_writer() -> CursorWriter {
    Writer::new(Cursor::new(Vec::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_read_exact_reports_clean_eof() {
        let mut r = Reader::new(Cursor::new(Vec::<u8>::new()));
        let mut buf = [0u8; 4];
        assert!(!r.try_read_exact(&mut buf).unwrap());
    }

    #[test]
    fn try_read_exact_reports_truncation_as_error() {
        let mut r = Reader::new(Cursor::new(vec![1u8, 2]));
        let mut buf = [0u8; 4];
        let err = r.try_read_exact(&mut buf).unwrap_err();
        assert_eq!(err.kind(), DbnErrorKind::UnexpectedEof);
    }

    #[test]
    fn skip_advances_position() {
        let mut r = Reader::new(Cursor::new(vec![0u8; 100]));
        r.skip(40).unwrap();
        assert_eq!(r.position(), 40);
    }

    #[test]
    fn compressed_stream_is_detected_and_decoded() {
        let payload = b"hello world, this is some sample data to compress".to_vec();
        let compressed = zstd::encode_all(Cursor::new(payload.clone()), 3).unwrap();
        let mut r = cursor_reader(compressed).unwrap();
        let mut out = vec![0u8; payload.len()];
        r.read_exact(&mut out).unwrap();
        assert_eq!(out, payload);
    }

    #[test]
    fn uncompressed_stream_passes_through() {
        let payload = vec![1u8, 2, 3, 4, 5, 6, 7, 8];
        let mut r = cursor_reader(payload.clone()).unwrap();
        let mut out = vec![0u8; payload.len()];
        r.read_exact(&mut out).unwrap();
        assert_eq!(out, payload);
    }
}
