//! The encode side: a finalizing writer that rewrites the header on close, and a non-finalizing
//! bulk writer for sinks that can't seek.
//!
//! The finalizing writer's two-pass shape — write a placeholder header, stream records, seek
//! back and rewrite the header once the true `start_ts`/`end_ts`/record count are known — puts
//! the real work in an explicit `close()`; `Drop` is a best-effort safety net for callers who
//! forget, not the primary path (a dropped-without-closing writer logs a warning).

use crate::error::{DbnError, DbnErrorKind, Result};
use crate::header::{Metadata, SymbolMapping};
use crate::record::{write_record, Record};
use crate::transport::WriteTransport;
use dbn_types::{SType, Schema};

/// Configuration for starting a new encode from scratch (as opposed to recompressing an existing
/// stream, which instead reads a [`Metadata`] and passes it through unchanged).
#[derive(Clone, Debug)]
pub struct WriterOptions {
    /// The Format version to write, `2` or `3`.
    pub version: u8,
    /// The dataset code, ASCII, at most 15 bytes.
    pub dataset: String,
    /// The schema tag. Use [`Schema::Mixed`] if records of more than one schema will be written.
    pub schema: Schema,
    /// The symbology of raw symbols, if known.
    pub stype_in: Option<SType>,
    /// The symbology instrument IDs are reported in.
    pub stype_out: SType,
    /// Whether records will carry a receive timestamp in addition to `ts_event`.
    pub ts_out: bool,
    /// Symbols that were explicitly requested.
    pub symbols: Vec<String>,
    /// Symbols that were only partially resolved.
    pub partial: Vec<String>,
    /// Symbols that could not be resolved at all.
    pub not_found: Vec<String>,
    /// The raw-to-mapped symbology mapping table.
    pub mappings: Vec<SymbolMapping>,
}

impl WriterOptions {
    /// Builds the initial [`Metadata`] this configuration describes. `start_ts`/`end_ts`/`limit`
    /// are placeholders; [`FinalizingWriter::close`] rewrites them from the records actually
    /// written.
    pub fn build_metadata(&self) -> Metadata {
        Metadata {
            version: self.version,
            dataset: self.dataset.clone(),
            schema: self.schema,
            start_ts: 0,
            end_ts: None,
            limit: None,
            stype_in: self.stype_in,
            stype_out: self.stype_out,
            ts_out: self.ts_out,
            symbol_width: crate::header::WRITE_SYMBOL_WIDTH,
            symbols: self.symbols.clone(),
            partial: self.partial.clone(),
            not_found: self.not_found.clone(),
            mappings: self.mappings.clone(),
        }
    }
}

fn finalize<T: WriteTransport>(
    transport: &mut T,
    metadata: &mut Metadata,
    min_ts: Option<i64>,
    max_ts: Option<i64>,
    record_count: u64,
) -> Result<()> {
    metadata.start_ts = min_ts.unwrap_or(metadata.start_ts);
    metadata.end_ts = max_ts;
    metadata.limit = Some(record_count);
    transport.seek(0)?;
    transport.write_all(&metadata.to_bytes_with_width(metadata.symbol_width))?;
    transport.flush()
}

/// A writer that tracks the true `start_ts`/`end_ts`/record count as records stream through, and
/// rewrites the metadata header with those values on [`close`](Self::close).
///
/// Requires a seekable sink. For a sink that can't seek (a pipe), use [`BulkWriter`] instead.
pub struct FinalizingWriter<T> {
    transport: Option<T>,
    metadata: Metadata,
    min_ts_event: Option<i64>,
    max_ts_event: Option<i64>,
    record_count: u64,
    closed: bool,
}

impl<T: WriteTransport> FinalizingWriter<T> {
    /// Writes a placeholder header built from `metadata` and returns a writer ready to accept
    /// records. `metadata`'s `start_ts`/`end_ts`/`limit` are overwritten on close; its symbol
    /// tables are fixed for the life of the writer and never change after construction.
    pub fn new(mut transport: T, metadata: Metadata) -> Result<Self> {
        transport.write_all(&metadata.to_bytes_with_width(metadata.symbol_width))?;
        Ok(Self {
            transport: Some(transport),
            metadata,
            min_ts_event: None,
            max_ts_event: None,
            record_count: 0,
            closed: false,
        })
    }

    /// Writes a placeholder header built from `options`.
    pub fn with_options(transport: T, options: &WriterOptions) -> Result<Self> {
        Self::new(transport, options.build_metadata())
    }

    /// Encodes and writes one record, updating the tracked `ts_event` range and count.
    pub fn write_record(&mut self, record: &Record) -> Result<()> {
        if self.closed {
            return Err(DbnError::new(DbnErrorKind::WriterClosed, "writer has already been closed"));
        }
        let ts_event = record.header().ts_event.get();
        self.min_ts_event = Some(self.min_ts_event.map_or(ts_event, |m| m.min(ts_event)));
        self.max_ts_event = Some(self.max_ts_event.map_or(ts_event, |m| m.max(ts_event)));
        self.record_count += 1;
        let version = self.metadata.version;
        let transport = self
            .transport
            .as_mut()
            .expect("transport is only taken by into_inner, which closes first");
        write_record(transport, record, version)
    }

    /// The number of records written so far.
    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    /// Seeks back to the start and rewrites the metadata header with the observed
    /// `start_ts`/`end_ts`/record count. Idempotent: a second call, or the [`Drop`] safety net
    /// running after an explicit close, is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let transport = self
            .transport
            .as_mut()
            .expect("transport is only taken by into_inner, which closes first");
        let result = finalize(
            transport,
            &mut self.metadata,
            self.min_ts_event,
            self.max_ts_event,
            self.record_count,
        );
        transport.close()?;
        result
    }

    /// Closes (if not already closed) and releases the underlying transport.
    pub fn into_inner(mut self) -> Result<T> {
        self.close()?;
        Ok(self.transport.take().expect("close() leaves transport in place exactly once"))
    }
}

impl<T: WriteTransport> Drop for FinalizingWriter<T> {
    fn drop(&mut self) {
        if !self.closed {
            tracing::warn!("FinalizingWriter dropped without an explicit close(); finalizing header best-effort");
            let _ = self.close();
        }
    }
}

/// A writer that streams records without ever seeking, for sinks that can't support it (named
/// pipes, sockets). The header it writes up front carries whatever `start_ts`/`end_ts`/`limit`
/// the caller supplied in `metadata` and is never rewritten.
pub struct BulkWriter<T> {
    transport: T,
    version: u8,
}

impl<T: WriteTransport> BulkWriter<T> {
    /// Writes `metadata` as-is, then returns a writer ready to accept records.
    pub fn new(mut transport: T, metadata: &Metadata) -> Result<Self> {
        transport.write_all(&metadata.to_bytes_with_width(metadata.symbol_width))?;
        Ok(Self {
            transport,
            version: metadata.version,
        })
    }

    /// Encodes and writes one record.
    pub fn write_record(&mut self, record: &Record) -> Result<()> {
        write_record(&mut self.transport, record, self.version)
    }

    /// Flushes any buffered writes.
    pub fn flush(&mut self) -> Result<()> {
        self.transport.flush()
    }

    /// Releases the underlying transport.
    pub fn into_transport(self) -> T {
        self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::RecordDecoder;
    use crate::record::{RecordHeader, TradeMsg};
    use crate::transport::cursor_writer;
    use dbn_types::{I32le, I64le, U16le, U32le};

    fn sample_options() -> WriterOptions {
        WriterOptions {
            version: 2,
            dataset: "XNAS".to_string(),
            schema: Schema::Trades,
            stype_in: Some(SType::RawSymbol),
            stype_out: SType::RawSymbol,
            ts_out: false,
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
                instrument_id: U32le::new(100),
                ts_event: I64le::new(ts_event),
            },
            TradeMsg {
                price: I64le::new(100_000_000_000),
                size: U32le::new(1),
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
    fn close_rewrites_start_end_ts_and_limit() {
        let options = sample_options();
        let transport = cursor_writer();
        let mut writer = FinalizingWriter::with_options(transport, &options).unwrap();
        writer.write_record(&trade(500)).unwrap();
        writer.write_record(&trade(100)).unwrap();
        writer.write_record(&trade(900)).unwrap();
        assert_eq!(writer.record_count(), 3);
        let transport = writer.into_inner().unwrap();
        let bytes = transport.into_inner().into_inner();

        let reader = crate::transport::cursor_reader(bytes).unwrap();
        let decoder = RecordDecoder::new(reader).unwrap();
        assert_eq!(decoder.metadata().start_ts, 100);
        assert_eq!(decoder.metadata().end_ts, Some(900));
        assert_eq!(decoder.metadata().limit, Some(3));
    }

    #[test]
    fn write_after_close_is_rejected() {
        let options = sample_options();
        let transport = cursor_writer();
        let mut writer = FinalizingWriter::with_options(transport, &options).unwrap();
        writer.close().unwrap();
        let err = writer.write_record(&trade(1)).unwrap_err();
        assert_eq!(err.kind(), DbnErrorKind::WriterClosed);
    }

    #[test]
    fn bulk_writer_never_seeks_and_round_trips_records() {
        let options = sample_options();
        let metadata = options.build_metadata();
        let transport = cursor_writer();
        let mut writer = BulkWriter::new(transport, &metadata).unwrap();
        writer.write_record(&trade(500)).unwrap();
        writer.flush().unwrap();
        let bytes = writer.into_transport().into_inner().into_inner();

        let reader = crate::transport::cursor_reader(bytes).unwrap();
        let mut decoder = RecordDecoder::new(reader).unwrap();
        let records: Vec<_> = (&mut decoder).map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 1);
    }
}
