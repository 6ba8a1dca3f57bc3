//! A bidirectional codec for the DBN binary market-data container format.
//!
//! Three tightly coupled subsystems, leaves first:
//! - [`header`] — the version-aware metadata block that precedes every record.
//! - [`record`] — the 16-byte common record header plus per-`rtype` body layouts.
//! - [`reader`] / [`callback`] — two streaming decode runtimes over a transport: a pull iterator
//!   yielding a tagged [`record::Record`] enum, and a type-specialized, zero-allocation callback
//!   engine for callers who know the record layout they want up front.
//! - [`writer`] — a finalizing writer (header rewritten on close) and a non-finalizing bulk
//!   writer for sinks that can't seek.
//! - [`transport`] — the byte source/sink abstraction every other module is built on, including
//!   transparent zstd-compression detection.
//! - [`compress`] — the file-level compress/decompress operation built out of the above.
//!
//! Primitive types, sentinels, and enums live in the sibling `dbn-types` crate and are
//! re-exported here for convenience.

#![forbid(unsafe_code)]

pub mod bytes;
pub mod callback;
pub mod compress;
pub mod error;
pub mod header;
pub mod reader;
pub mod record;
pub mod transport;
pub mod writer;

pub use callback::{RecordBody, TypedRecordReader};
pub use compress::{compress as compress_file, decompress as decompress_file, CompressSummary};
pub use error::{DbnError, DbnErrorKind, Result};
pub use header::{Metadata, SymbolMapping};
pub use reader::{DecodeOptions, RecordDecoder};
pub use record::{
    BidAskPair, DecodedRecord, ErrorMsg, ImbalanceMsg, InstrumentDefLegs, InstrumentDefMsg, MboMsg,
    Mbp10Msg, Mbp1Msg, OhlcvMsg, RType, Record, RecordHeader, StatMsg, StatusMsg, SymbolMappingMsg,
    SystemMsg, TradeMsg,
};
pub use transport::{
    create_write_file, cursor_reader, cursor_writer, open_read_file, open_read_stream, CursorReader,
    CursorWriter, ReadTransport, Reader, WriteTransport, Writer,
};
pub use writer::{BulkWriter, FinalizingWriter, WriterOptions};

pub use dbn_types::{
    datetime_to_ts, float_to_price, price_to_float, ts_to_datetime, Action, InstrumentClass, SType,
    Schema, Side,
};
