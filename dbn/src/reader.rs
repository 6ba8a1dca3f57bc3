//! The streaming decode runtime: a pull iterator over records, plus a thin callback wrapper for
//! callers who would rather drive the loop from a closure.
//!
//! [`RecordDecoder`] owns both the metadata and the transport for the lifetime of the decode, and
//! stays exhausted once a parse fails rather than trying to resume: a failed parse leaves nothing
//! to gain from discarding and rebuilding the iterator's internal state. Once a `next()` call
//! returns `None` or `Some(Err(_))`, the decoder is exhausted for good — an I/O error or a
//! truncated record leaves the transport at an unknown position relative to any record boundary,
//! so retrying is unsound.

use crate::error::Result;
use crate::header::Metadata;
use crate::record::{read_record, DecodedRecord, Record};
use crate::transport::ReadTransport;

/// Configuration for a decode pass: lenient-vs-strict enum decoding (see DESIGN.md for why
/// lenient is the default).
///
/// A small, `Copy`, by-value options struct rather than a builder, since there are only a
/// couple of independent knobs.
#[derive(Copy, Clone, Debug, Default)]
pub struct DecodeOptions {
    /// When `true`, an out-of-range `Action`/`Side`/`InstrumentClass` byte inside an otherwise
    /// well-formed record is a fatal decode error instead of the documented lenient substitution.
    /// Defaults to `false`, matching the source behavior.
    pub strict: bool,
}

/// Decodes the metadata header once, then yields records one at a time.
pub struct RecordDecoder<T> {
    transport: T,
    metadata: Metadata,
    options: DecodeOptions,
    exhausted: bool,
}

impl<T: ReadTransport> RecordDecoder<T> {
    /// Reads the metadata header from `transport`, then returns a decoder positioned at the
    /// first record, using lenient enum decoding.
    pub fn new(transport: T) -> Result<Self> {
        Self::with_options(transport, DecodeOptions::default())
    }

    /// Like [`RecordDecoder::new`], but with explicit [`DecodeOptions`].
    pub fn with_options(mut transport: T, options: DecodeOptions) -> Result<Self> {
        let metadata = Metadata::read(&mut transport)?;
        Ok(Self {
            transport,
            metadata,
            options,
            exhausted: false,
        })
    }

    /// The metadata header read at construction.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Releases the underlying transport. Useful when a caller stops iterating early but still
    /// wants the transport back (e.g. to close a file handle explicitly).
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Invokes `f` for every record in the stream, stopping at the first error.
    ///
    /// This is the zero-allocation streaming path: no `Vec<Record>` is ever materialized, `f` is
    /// called once per record as it is decoded.
    pub fn for_each_record<F>(&mut self, mut f: F) -> Result<()>
    where
        F: FnMut(&Record) -> Result<()>,
    {
        while let Some(record) = self.next() {
            f(&record?)?;
        }
        Ok(())
    }
}

impl<T: ReadTransport> Iterator for RecordDecoder<T> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Result<Record>> {
        if self.exhausted {
            return None;
        }
        loop {
            match read_record(&mut self.transport, self.metadata.version) {
                Ok(None) => {
                    self.exhausted = true;
                    return None;
                }
                Ok(Some(DecodedRecord::Skipped { .. })) => continue,
                Ok(Some(DecodedRecord::Record(record))) => {
                    if self.options.strict {
                        if let Err(e) = record.check_enums_strict() {
                            self.exhausted = true;
                            return Some(Err(e));
                        }
                    }
                    return Some(Ok(record));
                }
                Err(e) => {
                    self.exhausted = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::SymbolMapping as HeaderSymbolMapping;
    use crate::record::{write_record, MboMsg, Record, RecordHeader, TradeMsg};
    use crate::transport::{cursor_reader, cursor_writer, WriteTransport};
    use dbn_types::{I32le, I64le, SType, Schema, U16le, U32le, U64le};

    fn sample_metadata() -> Metadata {
        Metadata {
            version: 2,
            dataset: "XNAS".to_string(),
            schema: Schema::Trades,
            start_ts: 0,
            end_ts: None,
            limit: None,
            stype_in: Some(SType::RawSymbol),
            stype_out: SType::RawSymbol,
            ts_out: false,
            symbol_width: crate::header::WRITE_SYMBOL_WIDTH,
            symbols: vec![],
            partial: vec![],
            not_found: vec![],
            mappings: vec![HeaderSymbolMapping {
                raw: "AAPL".to_string(),
                mapped: "AAPL.O".to_string(),
                start_date: 20200101,
                end_date: 20200201,
            }],
        }
    }

    fn header(rtype: u8) -> RecordHeader {
        RecordHeader {
            length_units: 0,
            rtype,
            publisher_id: U16le::new(1),
            instrument_id: U32le::new(100),
            ts_event: I64le::new(1_000_000_000),
        }
    }

    fn trade_msg() -> TradeMsg {
        TradeMsg {
            price: I64le::new(100_000_000_000),
            size: U32le::new(10),
            action: b'T',
            side: b'B',
            flags: 0,
            depth: 0,
            ts_recv: I64le::new(1_000_000_000),
            ts_in_delta: I32le::new(0),
            sequence: U32le::new(1),
        }
    }

    #[test]
    fn iterates_records_in_order_and_reports_metadata() {
        let md = sample_metadata();
        let mut w = cursor_writer();
        md.write(&mut w).unwrap();
        write_record(&mut w, &Record::Trade(header(0x00), trade_msg()), md.version).unwrap();
        write_record(
            &mut w,
            &Record::Mbo(
                header(0xA0),
                MboMsg {
                    ts_recv: I64le::new(2_000_000_000),
                    order_id: U64le::new(42),
                    size: U32le::new(5),
                    flags: 0,
                    channel_id: 0,
                    action: b'A',
                    side: b'A',
                    price: I64le::new(99_000_000_000),
                    ts_in_delta: I32le::new(0),
                    sequence: U32le::new(2),
                },
            ),
            md.version,
        )
        .unwrap();
        let bytes = w.into_inner().into_inner();

        let reader = cursor_reader(bytes).unwrap();
        let mut decoder = RecordDecoder::new(reader).unwrap();
        assert_eq!(decoder.metadata().dataset, "XNAS");

        let records: Vec<_> = (&mut decoder).map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 2);
        assert!(matches!(records[0], Record::Trade(..)));
        assert!(matches!(records[1], Record::Mbo(..)));
    }

    #[test]
    fn skips_unknown_rtype_without_failing() {
        let md = sample_metadata();
        let mut w = cursor_writer();
        md.write(&mut w).unwrap();

        // A record with an unrecognized rtype (0xEE), 8 bytes total (length_units = 2).
        w.write_all(&[2, 0xEE, 0, 0, 0, 0, 0, 0]).unwrap();
        write_record(&mut w, &Record::Trade(header(0x00), trade_msg()), md.version).unwrap();
        let bytes = w.into_inner().into_inner();

        let reader = cursor_reader(bytes).unwrap();
        let mut decoder = RecordDecoder::new(reader).unwrap();
        let records: Vec<_> = (&mut decoder).map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 1);
        assert!(matches!(records[0], Record::Trade(..)));
    }

    #[test]
    fn strict_mode_rejects_an_out_of_range_enum_byte_that_lenient_mode_accepts() {
        let md = sample_metadata();
        let mut w = cursor_writer();
        md.write(&mut w).unwrap();
        let mut bad_trade = trade_msg();
        bad_trade.side = b'?'; // not one of B/A/N
        write_record(&mut w, &Record::Trade(header(0x00), bad_trade), md.version).unwrap();
        let bytes = w.into_inner().into_inner();

        let reader = cursor_reader(bytes.clone()).unwrap();
        let mut lenient = RecordDecoder::new(reader).unwrap();
        assert!(lenient.next().unwrap().is_ok());

        let reader = cursor_reader(bytes).unwrap();
        let mut strict =
            RecordDecoder::with_options(reader, DecodeOptions { strict: true }).unwrap();
        let err = strict.next().unwrap().unwrap_err();
        assert_eq!(err.kind(), crate::error::DbnErrorKind::MalformedHeader);
        assert!(strict.next().is_none());
    }

    #[test]
    fn for_each_record_visits_every_record_once() {
        let md = sample_metadata();
        let mut w = cursor_writer();
        md.write(&mut w).unwrap();
        write_record(&mut w, &Record::Trade(header(0x00), trade_msg()), md.version).unwrap();
        write_record(&mut w, &Record::Trade(header(0x00), trade_msg()), md.version).unwrap();
        let bytes = w.into_inner().into_inner();

        let reader = cursor_reader(bytes).unwrap();
        let mut decoder = RecordDecoder::new(reader).unwrap();
        let mut count = 0;
        decoder
            .for_each_record(|_| {
                count += 1;
                Ok(())
            })
            .unwrap();
        assert_eq!(count, 2);
    }
}
