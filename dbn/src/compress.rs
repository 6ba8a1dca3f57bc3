//! File-level compression: copy a stream through the codec unchanged, wrapping the destination
//! in a streaming compressor.
//!
//! The compressor is finished explicitly with `enc.finish()`, never relying on `Drop` to flush
//! it, and the outer pipeline returns `anyhow::Result` wrapping an inner precise error type.

use crate::error::{DbnError, DbnErrorKind, Result};
use crate::reader::RecordDecoder;
use crate::transport::{open_read_file, ReadTransport, WriteTransport};
use crate::writer::BulkWriter;
use anyhow::Context;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// The result of a [`compress`] or [`decompress`] operation.
#[non_exhaustive]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CompressSummary {
    /// The size, in bytes, of the source file.
    pub original_size: u64,
    /// The size, in bytes, of the destination file.
    pub compressed_size: u64,
    /// `1 - compressed_size / original_size`. Negative if the destination ended up larger.
    pub ratio: f64,
    /// `original_size - compressed_size`, as a signed value (negative if the destination grew).
    pub space_saved: i64,
}

impl CompressSummary {
    fn new(original_size: u64, compressed_size: u64) -> Self {
        let ratio = if original_size == 0 {
            0.0
        } else {
            1.0 - (compressed_size as f64 / original_size as f64)
        };
        Self {
            original_size,
            compressed_size,
            ratio,
            space_saved: original_size as i64 - compressed_size as i64,
        }
    }
}

/// A [`WriteTransport`] over a streaming zstd encoder. Never seekable: records are streamed
/// straight into the compressor as they are decoded from the source, since a rewinding writer
/// must not be wrapped in a streaming compressor. `close` calls `finish()` exactly once rather
/// than relying on a `Drop` impl to flush the last frame.
struct CompressedSink {
    encoder: Option<zstd::Encoder<'static, BufWriter<File>>>,
}

impl CompressedSink {
    fn new(file: File, level: i32) -> Result<Self> {
        let encoder = zstd::Encoder::new(BufWriter::new(file), level).map_err(DbnError::from)?;
        Ok(Self {
            encoder: Some(encoder),
        })
    }

    fn encoder_mut(&mut self) -> &mut zstd::Encoder<'static, BufWriter<File>> {
        self.encoder
            .as_mut()
            .expect("encoder is only taken by close(), which runs once")
    }
}

impl WriteTransport for CompressedSink {
    fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        self.encoder_mut().write_all(buf).map_err(DbnError::from)
    }

    fn seek(&mut self, _absolute: u64) -> Result<()> {
        Err(DbnError::new(
            DbnErrorKind::Io,
            "cannot seek a streaming-compressed sink",
        ))
    }

    fn stream_position(&mut self) -> Result<u64> {
        Err(DbnError::new(
            DbnErrorKind::Io,
            "cannot query the position of a streaming-compressed sink",
        ))
    }

    fn flush(&mut self) -> Result<()> {
        self.encoder_mut().flush().map_err(DbnError::from)
    }

    fn close(&mut self) -> Result<()> {
        if let Some(enc) = self.encoder.take() {
            enc.finish().map_err(DbnError::from)?;
        }
        Ok(())
    }
}

impl Drop for CompressedSink {
    fn drop(&mut self) {
        if self.encoder.is_some() {
            tracing::warn!("CompressedSink dropped without an explicit close(); finishing the zstd frame best-effort");
            let _ = self.close();
        }
    }
}

/// Pipes every record from `decoder` into `sink` through the record codec, preserving the
/// source metadata exactly.
fn pipe_records<T: ReadTransport, S: WriteTransport>(
    mut decoder: RecordDecoder<T>,
    sink: &mut BulkWriter<S>,
) -> Result<()> {
    decoder.for_each_record(|record| sink.write_record(record))
}

/// Reads `src_path` (transparently decompressing it if already compressed) and writes a
/// zstd-compressed copy to `dst_path`, preserving metadata exactly. Deletes `src_path` on
/// success if `delete_source` is set.
///
/// Opens the source via the normal transport, opens the destination wrapped in a streaming
/// compressor, writes metadata verbatim, pipes every record through unchanged, then flushes and
/// closes the compressor before the sink.
pub fn compress(src_path: &Path, dst_path: &Path, level: i32, delete_source: bool) -> anyhow::Result<CompressSummary> {
    let original_size = std::fs::metadata(src_path)
        .with_context(|| format!("statting source file {}", src_path.display()))?
        .len();

    let reader =
        open_read_file(src_path).with_context(|| format!("opening source file {}", src_path.display()))?;
    let decoder = RecordDecoder::new(reader).context("reading source metadata header")?;
    let metadata = decoder.metadata().clone();

    let dst_file = File::create(dst_path)
        .with_context(|| format!("creating destination file {}", dst_path.display()))?;
    let mut sink = CompressedSink::new(dst_file, level).context("starting zstd encoder")?;
    {
        let mut writer = BulkWriter::new(&mut sink, &metadata).context("writing destination header")?;
        pipe_records(decoder, &mut writer).context("piping records into the compressed sink")?;
        writer.flush().context("flushing compressed sink")?;
    }
    sink.close().context("finishing the zstd frame")?;

    let compressed_size = std::fs::metadata(dst_path)
        .with_context(|| format!("statting destination file {}", dst_path.display()))?
        .len();

    if delete_source {
        std::fs::remove_file(src_path)
            .with_context(|| format!("deleting source file {}", src_path.display()))?;
    }

    Ok(CompressSummary::new(original_size, compressed_size))
}

/// The symmetric counterpart to [`compress`]: materializes a plain (uncompressed) copy of
/// `src_path`, which may itself already be compressed (transparently detected).
pub fn decompress(src_path: &Path, dst_path: &Path, delete_source: bool) -> anyhow::Result<CompressSummary> {
    let original_size = std::fs::metadata(src_path)
        .with_context(|| format!("statting source file {}", src_path.display()))?
        .len();

    let reader =
        open_read_file(src_path).with_context(|| format!("opening source file {}", src_path.display()))?;
    let decoder = RecordDecoder::new(reader).context("reading source metadata header")?;
    let metadata = decoder.metadata().clone();

    let dst_transport = crate::transport::create_write_file(dst_path)
        .with_context(|| format!("creating destination file {}", dst_path.display()))?;
    let mut writer = BulkWriter::new(dst_transport, &metadata).context("writing destination header")?;
    pipe_records(decoder, &mut writer).context("piping records into the plain sink")?;
    writer.flush().context("flushing destination file")?;
    drop(writer);

    let compressed_size = std::fs::metadata(dst_path)
        .with_context(|| format!("statting destination file {}", dst_path.display()))?
        .len();

    if delete_source {
        std::fs::remove_file(src_path)
            .with_context(|| format!("deleting source file {}", src_path.display()))?;
    }

    Ok(CompressSummary::new(original_size, compressed_size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::Metadata;
    use crate::record::{write_record, Record, RecordHeader, TradeMsg};
    use dbn_types::{I32le, I64le, SType, Schema, U16le, U32le};
    use std::io::Read;

    fn unique_temp_path(tag: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!(
            "dbn_compress_test_{tag}_{}_{:?}.dbn",
            std::process::id(),
            std::thread::current().id()
        ))
    }

    fn sample_metadata() -> Metadata {
        Metadata {
            version: 3,
            dataset: "XNAS".to_string(),
            schema: Schema::Trades,
            start_ts: 100,
            end_ts: Some(900),
            limit: Some(2),
            stype_in: Some(SType::RawSymbol),
            stype_out: SType::RawSymbol,
            ts_out: false,
            symbol_width: crate::header::WRITE_SYMBOL_WIDTH,
            symbols: vec!["AAPL".to_string()],
            partial: vec![],
            not_found: vec![],
            mappings: vec![],
        }
    }

    fn trade(ts_event: i64) -> Record {
        Record::Trade(
            RecordHeader {
                length_units: 0,
                rtype: 0,
                publisher_id: U16le::new(1),
                instrument_id: U32le::new(12345),
                ts_event: I64le::new(ts_event),
            },
            TradeMsg {
                price: I64le::new(1_005_000_000_000),
                size: U32le::new(100),
                action: b'T',
                side: b'B',
                flags: 0,
                depth: 0,
                ts_recv: I64le::new(ts_event),
                ts_in_delta: I32le::new(0),
                sequence: U32le::new(1),
            },
        )
    }

    #[test]
    fn compress_then_decode_round_trips_records_and_shrinks_compressible_input() {
        let src = unique_temp_path("src");
        let dst = unique_temp_path("dst");

        let metadata = sample_metadata();
        let transport = crate::transport::create_write_file(&src).unwrap();
        let mut writer = BulkWriter::new(transport, &metadata).unwrap();
        // Write enough repetitive records that zstd can actually shrink the file.
        for i in 0..5000i64 {
            writer.write_record(&trade(100 + i % 3 * 400)).unwrap();
        }
        writer.flush().unwrap();
        drop(writer);

        let summary = compress(&src, &dst, 3, false).unwrap();
        assert!(summary.compressed_size < summary.original_size);
        assert!(summary.ratio > 0.0);

        let mut magic = [0u8; 4];
        File::open(&dst).unwrap().read_exact(&mut magic).unwrap();
        assert_eq!(magic, crate::transport::ZSTD_MAGIC);

        let reader = open_read_file(&dst).unwrap();
        let mut decoder = RecordDecoder::new(reader).unwrap();
        assert_eq!(decoder.metadata().dataset, "XNAS");
        let count = decoder.by_ref().count();
        assert_eq!(count, 5000);

        let _ = std::fs::remove_file(&src);
        let _ = std::fs::remove_file(&dst);
    }

    #[test]
    fn decompress_undoes_compress_byte_for_byte_in_record_content() {
        let src = unique_temp_path("plain");
        let compressed = unique_temp_path("gz");
        let roundtrip = unique_temp_path("roundtrip");

        let metadata = sample_metadata();
        let transport = crate::transport::create_write_file(&src).unwrap();
        let mut writer = BulkWriter::new(transport, &metadata).unwrap();
        writer.write_record(&trade(500)).unwrap();
        writer.write_record(&trade(600)).unwrap();
        writer.flush().unwrap();
        drop(writer);

        compress(&src, &compressed, 3, false).unwrap();
        decompress(&compressed, &roundtrip, false).unwrap();

        let reader = open_read_file(&roundtrip).unwrap();
        let mut decoder = RecordDecoder::new(reader).unwrap();
        let records: Vec<_> = (&mut decoder).map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 2);
        assert!(matches!(records[0], Record::Trade(..)));

        let _ = std::fs::remove_file(&src);
        let _ = std::fs::remove_file(&compressed);
        let _ = std::fs::remove_file(&roundtrip);
    }

    #[test]
    fn delete_source_removes_the_input_file() {
        let src = unique_temp_path("del_src");
        let dst = unique_temp_path("del_dst");

        let metadata = sample_metadata();
        let transport = crate::transport::create_write_file(&src).unwrap();
        let mut writer = BulkWriter::new(transport, &metadata).unwrap();
        writer.write_record(&trade(1)).unwrap();
        writer.flush().unwrap();
        drop(writer);

        compress(&src, &dst, 3, true).unwrap();
        assert!(!src.exists());

        let _ = std::fs::remove_file(&dst);
    }
}
