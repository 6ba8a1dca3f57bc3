//! The type-specialized callback streaming engine.
//!
//! Unlike [`crate::reader::RecordDecoder`], which yields a heap-free-but-enum-tagged [`Record`]
//! per step, [`TypedRecordReader::for_each`] asserts the caller's expected wire layout up front
//! and reuses a single body-sized buffer across every iteration — no per-record `Record` enum is
//! ever constructed. Record bodies are bitwise-copyable, so the buffer just gets overwritten and
//! reinterpreted in place, read directly out of a borrowed slice rather than boxed.

use crate::error::{DbnError, DbnErrorKind, Result};
use crate::header::Metadata;
use crate::record::{
    ImbalanceMsg, MboMsg, Mbp10Msg, Mbp1Msg, OhlcvMsg, RType, RecordHeader, StatMsg, StatusMsg,
    TradeMsg, IMBALANCE_BODY_LEN, MBO_BODY_LEN, MBP10_BODY_LEN, MBP1_BODY_LEN, OHLCV_BODY_LEN,
    RECORD_HEADER_LEN, STAT_BODY_LEN, STATUS_BODY_LEN, TRADE_BODY_LEN,
};
use crate::transport::ReadTransport;
use zerocopy::{FromBytes, Immutable, KnownLayout};

/// A fixed-size record body layout that the callback engine can decode directly into a reused
/// buffer.
///
/// Implemented only for the closed-size record bodies; the variable-length
/// layouts (`InstrumentDef`, `Error`, `SymbolMapping`, `System`) aren't meaningful to stream
/// through a fixed-size buffer and are only reachable via [`crate::reader::RecordDecoder`].
pub trait RecordBody: FromBytes + KnownLayout + Immutable + Copy {
    /// The exact on-disk body length for this layout.
    const BODY_LEN: usize;

    /// Whether `rtype` decodes to this body layout. Several `rtype`s share one layout (the four
    /// OHLCV cadences plus end-of-day all share [`OhlcvMsg`]; the consolidated/BBO family all
    /// share [`Mbp1Msg`]), so this is a predicate, not a single value.
    fn accepts(rtype: RType) -> bool;

    /// A human-readable name for error messages.
    fn type_name() -> &'static str;
}

macro_rules! impl_record_body {
    ($ty:ty, $len:expr, $name:expr, $accepts:expr) => {
        impl RecordBody for $ty {
            const BODY_LEN: usize = $len;
            fn accepts(rtype: RType) -> bool {
                $accepts(rtype)
            }
            fn type_name() -> &'static str {
                $name
            }
        }
    };
}

impl_record_body!(MboMsg, MBO_BODY_LEN, "MBO", |r: RType| r == RType::Mbo);
impl_record_body!(TradeMsg, TRADE_BODY_LEN, "Trade", |r: RType| r == RType::Mbp0);
impl_record_body!(Mbp1Msg, MBP1_BODY_LEN, "MBP-1", RType::is_mbp1_family);
impl_record_body!(Mbp10Msg, MBP10_BODY_LEN, "MBP-10", |r: RType| r == RType::Mbp10);
impl_record_body!(OhlcvMsg, OHLCV_BODY_LEN, "OHLCV", RType::is_ohlcv);
impl_record_body!(StatusMsg, STATUS_BODY_LEN, "Status", |r: RType| r == RType::Status);
impl_record_body!(ImbalanceMsg, IMBALANCE_BODY_LEN, "Imbalance", |r: RType| r == RType::Imbalance);
impl_record_body!(StatMsg, STAT_BODY_LEN, "Stat", |r: RType| r == RType::Stat);

/// Streams records of one expected wire layout `R` out of a transport, reusing a single
/// `R`-sized buffer for the whole traversal.
pub struct TypedRecordReader<T> {
    transport: T,
    metadata: Metadata,
    buf: Vec<u8>,
    exhausted: bool,
}

impl<T: ReadTransport> TypedRecordReader<T> {
    /// Reads the metadata header from `transport`, then returns a reader positioned at the
    /// first record.
    pub fn new(mut transport: T) -> Result<Self> {
        let metadata = Metadata::read(&mut transport)?;
        Ok(Self {
            transport,
            metadata,
            buf: Vec::new(),
            exhausted: false,
        })
    }

    /// The metadata header read at construction.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Releases the underlying transport.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Invokes `f` once for every record whose `rtype` matches `R` (per [`RecordBody::accepts`]),
    /// silently skipping any other known `rtype` as well as unrecognized ones, and failing with a
    /// decode error if a record claims a body size inconsistent with its own `length_units`.
    ///
    /// `f` receives a reference into a buffer owned by this reader and reused on every call; the
    /// reference does not outlive the call. The callback must not retain it past return — copy
    /// the record out instead.
    pub fn for_each<R, F>(&mut self, mut f: F) -> Result<()>
    where
        R: RecordBody,
        F: FnMut(&RecordHeader, &R) -> Result<()>,
    {
        if self.exhausted {
            return Ok(());
        }
        self.buf.resize(R::BODY_LEN, 0);
        loop {
            let mut prefix = [0u8; 2];
            if !self.transport.try_read_exact(&mut prefix)? {
                self.exhausted = true;
                return Ok(());
            }
            let length_units = prefix[0];
            let rtype_byte = prefix[1];
            let byte_len = length_units as usize * 4;
            if byte_len < RECORD_HEADER_LEN || byte_len % 4 != 0 {
                self.exhausted = true;
                return Err(DbnError::new(
                    DbnErrorKind::MalformedHeader,
                    format!("record length_units={length_units} implies an invalid byte length"),
                )
                .with_offset(self.transport.position()));
            }

            let Some(rtype) = RType::try_from_u8(rtype_byte) else {
                tracing::debug!(rtype = rtype_byte, byte_len, "skipping unknown record type");
                self.transport.skip((byte_len - 2) as u64)?;
                continue;
            };

            if !R::accepts(rtype) {
                // A known rtype that doesn't match the requested layout is a decode error, not a
                // skip — only genuinely unrecognized rtypes are forward-compat skips. The OHLCV
                // cadence unification above is the one exception, handled by `R::accepts` itself.
                self.exhausted = true;
                return Err(DbnError::new(
                    DbnErrorKind::MalformedHeader,
                    format!(
                        "expected a {} record, found rtype {rtype_byte:#04x}",
                        R::type_name()
                    ),
                )
                .with_offset(self.transport.position()));
            }

            let mut rest = [0u8; RECORD_HEADER_LEN - 2];
            self.transport.read_exact(&mut rest)?;
            let mut header_bytes = [0u8; RECORD_HEADER_LEN];
            header_bytes[0] = length_units;
            header_bytes[1] = rtype_byte;
            header_bytes[2..].copy_from_slice(&rest);
            let header = RecordHeader::read_from_bytes(&header_bytes[..])
                .expect("RecordHeader is exactly RECORD_HEADER_LEN bytes");

            let body_len = byte_len - RECORD_HEADER_LEN;
            if body_len != R::BODY_LEN {
                self.exhausted = true;
                return Err(DbnError::record_overrun(format!(
                    "{} record body is {body_len} bytes, expected {}",
                    R::type_name(),
                    R::BODY_LEN
                )));
            }

            self.transport.read_exact(&mut self.buf)?;
            let body = R::read_from_bytes(&self.buf[..]).map_err(|_| {
                DbnError::malformed_header(format!("{} body has invalid layout", R::type_name()))
            })?;
            f(&header, &body)?;
        }
    }
}
