//! The metadata header: magic, version, and the self-describing metadata block that precedes
//! every record.
//!
//! This is the only component that depends on the Format version. Layout is fixed at
//! `DatasetField(16) + schema(2) + start_ts(8) + end_ts(8) + limit(8) + stype_in(1) +
//! stype_out(1) + ts_out(1) + symbol_width(2) + reserved(53) + schema_def_len(4) + symbols +
//! partial + not_found + mappings`, little-endian throughout.

use crate::bytes::{ByteReader, ByteWriter};
use crate::error::{DbnError, DbnErrorKind, Result};
use crate::transport::{ReadTransport, WriteTransport};
use dbn_types::{SCHEMA_MIXED, UNDEF_LIMIT, UNDEF_METADATA_TIMESTAMP, UNDEF_STYPE};
use dbn_types::Schema;

/// The 3-byte magic that begins every Format stream.
pub const MAGIC: [u8; 3] = *b"DBN";

/// The lowest version this codec will decode. Version 1 is explicitly unsupported; there is no
/// upgrade path from it.
pub const MIN_SUPPORTED_VERSION: u8 = 2;

/// The highest version this codec knows about.
pub const MAX_SUPPORTED_VERSION: u8 = 3;

/// The width, in bytes, of the fixed `dataset` field (15 bytes of ASCII plus a NUL terminator).
pub const DATASET_WIDTH: usize = 16;

/// The number of reserved padding bytes following `symbol_width` for version >= 2.
const RESERVED_PADDING_V2: usize = 53;

/// The symbol width this codec emits for newly written files.
pub const WRITE_SYMBOL_WIDTH: u16 = 71;

/// One entry in the metadata's symbology-mapping table.
///
/// The on-disk format allows each mapping to carry a list of `(start_date, end_date, symbol)`
/// intervals; this decoder retains only the first interval (start, end, mapped) per mapping.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymbolMapping {
    /// The input symbol, in `stype_in` symbology.
    pub raw: String,
    /// The mapped symbol, in `stype_out` symbology.
    pub mapped: String,
    /// Inclusive start date, as a 32-bit day-granularity integer.
    pub start_date: u32,
    /// Exclusive end date, as a 32-bit day-granularity integer.
    pub end_date: u32,
}

/// The metadata header for a Format stream.
///
/// Immutable after being read; the finalizing writer rewrites only `start_ts`, `end_ts`, and
/// `limit` on close, never the symbol tables, since those are fixed at construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Metadata {
    /// The Format version, `2` or `3`.
    pub version: u8,
    /// The dataset code, ASCII, at most 15 bytes.
    pub dataset: String,
    /// The schema tag. `Schema::Mixed` means the file contains more than one record schema.
    pub schema: Schema,
    /// Nanoseconds since the Unix epoch of the first record requested (not necessarily present).
    pub start_ts: i64,
    /// Nanoseconds since the Unix epoch of the last record requested, if bounded.
    pub end_ts: Option<i64>,
    /// A cap on the number of records in the file, if one was requested.
    pub limit: Option<u64>,
    /// The symbology of `symbols`/`partial`/`not_found`'s raw entries, if known.
    pub stype_in: Option<dbn_types::SType>,
    /// The symbology instrument IDs are reported in.
    pub stype_out: dbn_types::SType,
    /// Whether records carry a receive timestamp in addition to `ts_event`.
    pub ts_out: bool,
    /// The on-disk byte width of every symbol string in this file, NUL-padded.
    ///
    /// Decoders observe this from the file; writers constructing a brand new file always emit
    /// [`WRITE_SYMBOL_WIDTH`]. Carried through faithfully by [`Metadata::to_bytes_with_width`]
    /// so that copying an existing (possibly narrower) file forward, as `compress()` does,
    /// reproduces the original header exactly (see DESIGN.md for the resolution of this choice).
    pub symbol_width: u16,
    /// Symbols that were explicitly requested.
    pub symbols: Vec<String>,
    /// Symbols that were only partially resolved.
    pub partial: Vec<String>,
    /// Symbols that could not be resolved at all.
    pub not_found: Vec<String>,
    /// The raw-to-mapped symbology mapping table.
    pub mappings: Vec<SymbolMapping>,
}

impl Metadata {
    /// Reads the magic, version, and metadata block from `transport`.
    pub fn read(transport: &mut impl ReadTransport) -> Result<Self> {
        let mut magic = [0u8; 3];
        transport.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(DbnError::new(
                DbnErrorKind::InvalidMagic,
                format!("expected \"DBN\", found {magic:?}"),
            )
            .with_offset(0));
        }

        let mut version_buf = [0u8; 1];
        transport.read_exact(&mut version_buf)?;
        let version = version_buf[0];
        if version < MIN_SUPPORTED_VERSION || version > MAX_SUPPORTED_VERSION {
            return Err(DbnError::new(
                DbnErrorKind::UnsupportedVersion,
                format!(
                    "version {version} is not supported (supported: {MIN_SUPPORTED_VERSION}..={MAX_SUPPORTED_VERSION})"
                ),
            )
            .with_offset(3));
        }

        let mut len_buf = [0u8; 4];
        transport.read_exact(&mut len_buf)?;
        let metadata_length = u32::from_le_bytes(len_buf) as usize;

        let mut body = vec![0u8; metadata_length];
        transport.read_exact(&mut body)?;

        Self::parse_body(version, &body)
    }

    fn parse_body(version: u8, body: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(body, 8);

        let dataset = r.fixed_str(DATASET_WIDTH)?;
        let schema_tag = r.u16()?;
        let schema = Schema::from_u16(schema_tag);
        let start_ts = r.i64()?;
        let end_ts_raw = r.u64()?;
        let end_ts = if end_ts_raw == 0 || end_ts_raw == UNDEF_METADATA_TIMESTAMP {
            None
        } else {
            Some(end_ts_raw as i64)
        };
        let limit_raw = r.u64()?;
        let limit = if limit_raw == UNDEF_LIMIT {
            None
        } else {
            Some(limit_raw)
        };
        let stype_in_raw = r.u8()?;
        let stype_in = if stype_in_raw == UNDEF_STYPE {
            None
        } else {
            Some(dbn_types::SType::from_u8(stype_in_raw))
        };
        let stype_out = dbn_types::SType::from_u8(r.u8()?);
        let ts_out = r.u8()? != 0;
        let symbol_width = r.u16()?;
        r.skip(RESERVED_PADDING_V2)?;

        let schema_def_len = r.u32()?;
        if schema_def_len != 0 {
            return Err(DbnError::new(
                DbnErrorKind::UnsupportedSchema,
                format!("schema_def_len must be 0, found {schema_def_len}"),
            )
            .with_offset(r.offset()));
        }

        let symbols = Self::read_symbol_list(&mut r, symbol_width)?;
        let partial = Self::read_symbol_list(&mut r, symbol_width)?;
        let not_found = Self::read_symbol_list(&mut r, symbol_width)?;
        let mappings = Self::read_mappings(&mut r, symbol_width)?;

        Ok(Self {
            version,
            dataset,
            schema,
            start_ts,
            end_ts,
            limit,
            stype_in,
            stype_out,
            ts_out,
            symbol_width,
            symbols,
            partial,
            not_found,
            mappings,
        })
    }

    fn read_symbol_list(r: &mut ByteReader<'_>, symbol_width: u16) -> Result<Vec<String>> {
        let count = r.u32()?;
        let mut out = Vec::with_capacity(count as usize);
        for _ in 0..count {
            out.push(r.fixed_str(symbol_width as usize)?);
        }
        Ok(out)
    }

    fn read_mappings(r: &mut ByteReader<'_>, symbol_width: u16) -> Result<Vec<SymbolMapping>> {
        let count = r.u32()?;
        let mut out = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let raw = r.fixed_str(symbol_width as usize)?;
            let intervals = r.u32()?;
            let mut first: Option<(u32, u32, String)> = None;
            for i in 0..intervals {
                let start_date = r.u32()?;
                let end_date = r.u32()?;
                let mapped = r.fixed_str(symbol_width as usize)?;
                if i == 0 {
                    first = Some((start_date, end_date, mapped));
                }
            }
            let (start_date, end_date, mapped) = first.unwrap_or((0, 0, String::new()));
            out.push(SymbolMapping {
                raw,
                mapped,
                start_date,
                end_date,
            });
        }
        Ok(out)
    }

    /// Serializes this metadata using [`WRITE_SYMBOL_WIDTH`], as a brand-new write does.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_bytes_with_width(WRITE_SYMBOL_WIDTH)
    }

    /// Serializes this metadata using an explicit on-disk symbol width.
    ///
    /// `compress()` uses this with the *observed* width of the source file, so that re-encoding
    /// an existing file's metadata is byte-for-byte faithful rather than silently widening every
    /// symbol slot to [`WRITE_SYMBOL_WIDTH`].
    pub fn to_bytes_with_width(&self, symbol_width: u16) -> Vec<u8> {
        let mut body = ByteWriter::new();
        body.fixed_str(&self.dataset, DATASET_WIDTH);
        body.u16(self.schema.to_u16());
        body.i64(self.start_ts);
        body.u64(self.end_ts.map(|t| t as u64).unwrap_or(0));
        body.u64(self.limit.unwrap_or(0));
        body.u8(self.stype_in.map(|s| s.to_u8()).unwrap_or(UNDEF_STYPE));
        body.u8(self.stype_out.to_u8());
        body.u8(self.ts_out as u8);
        body.u16(symbol_width);
        body.zeros(RESERVED_PADDING_V2);
        body.u32(0); // schema_def_len, must be zero

        Self::write_symbol_list(&mut body, &self.symbols, symbol_width);
        Self::write_symbol_list(&mut body, &self.partial, symbol_width);
        Self::write_symbol_list(&mut body, &self.not_found, symbol_width);
        Self::write_mappings(&mut body, &self.mappings, symbol_width);

        let body_bytes = body.into_bytes();
        let mut out = Vec::with_capacity(8 + body_bytes.len());
        out.extend_from_slice(&MAGIC);
        out.push(self.version);
        out.extend_from_slice(&(body_bytes.len() as u32).to_le_bytes());
        out.extend_from_slice(&body_bytes);
        out
    }

    fn write_symbol_list(w: &mut ByteWriter, symbols: &[String], symbol_width: u16) {
        w.u32(symbols.len() as u32);
        for s in symbols {
            w.fixed_str(s, symbol_width as usize);
        }
    }

    fn write_mappings(w: &mut ByteWriter, mappings: &[SymbolMapping], symbol_width: u16) {
        w.u32(mappings.len() as u32);
        for m in mappings {
            w.fixed_str(&m.raw, symbol_width as usize);
            w.u32(1); // intervals_count: this codec always writes exactly the retained interval
            w.u32(m.start_date);
            w.u32(m.end_date);
            w.fixed_str(&m.mapped, symbol_width as usize);
        }
    }

    /// Writes this metadata to `transport` using [`WRITE_SYMBOL_WIDTH`].
    pub fn write(&self, transport: &mut impl WriteTransport) -> Result<()> {
        self.write_with_width(transport, WRITE_SYMBOL_WIDTH)
    }

    /// Writes this metadata to `transport` using an explicit on-disk symbol width.
    pub fn write_with_width(&self, transport: &mut impl WriteTransport, symbol_width: u16) -> Result<()> {
        transport.write_all(&self.to_bytes_with_width(symbol_width))
    }

    /// `true` if `schema` is [`SCHEMA_MIXED`]'s decoded form.
    pub fn is_mixed_schema(&self) -> bool {
        matches!(self.schema, Schema::Mixed) || self.schema.to_u16() == SCHEMA_MIXED
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{cursor_reader, cursor_writer};

    fn sample() -> Metadata {
        Metadata {
            version: 3,
            dataset: "XNAS".to_string(),
            schema: Schema::Trades,
            start_ts: 0,
            end_ts: None,
            limit: None,
            stype_in: Some(dbn_types::SType::RawSymbol),
            stype_out: dbn_types::SType::RawSymbol,
            ts_out: false,
            symbol_width: WRITE_SYMBOL_WIDTH,
            symbols: vec!["AAPL".to_string()],
            partial: vec![],
            not_found: vec![],
            mappings: vec![],
        }
    }

    #[test]
    fn show_magic() {
        use pretty_hex::PrettyHex;
        println!("MAGIC:");
        println!("{:?}", MAGIC.hex_dump());
    }

    #[test]
    fn round_trips_through_bytes() {
        let md = sample();
        let bytes = md.to_bytes();
        assert_eq!(&bytes[0..3], b"DBN");
        assert_eq!(bytes[3], 3);

        let mut reader = cursor_reader(bytes).unwrap();
        let decoded = Metadata::read(&mut reader).unwrap();
        assert_eq!(decoded, md);
    }

    #[test]
    fn symbol_width_field_reads_71_for_v3_write() {
        let md = sample();
        let bytes = md.to_bytes();
        // magic(3) + version(1) + metadata_length(4) + dataset(16) + schema(2) + start_ts(8)
        // + end_ts(8) + limit(8) + stype_in(1) + stype_out(1) + ts_out(1) = offset 53
        let width = u16::from_le_bytes([bytes[53], bytes[54]]);
        assert_eq!(width, WRITE_SYMBOL_WIDTH);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = sample().to_bytes();
        bytes[0] = b'X';
        let mut reader = cursor_reader(bytes).unwrap();
        let err = Metadata::read(&mut reader).unwrap_err();
        assert_eq!(err.kind(), DbnErrorKind::InvalidMagic);
    }

    #[test]
    fn rejects_unsupported_version() {
        for bad_version in [0u8, 1, 4, 255] {
            let mut bytes = sample().to_bytes();
            bytes[3] = bad_version;
            let mut reader = cursor_reader(bytes).unwrap();
            let err = Metadata::read(&mut reader).unwrap_err();
            assert_eq!(err.kind(), DbnErrorKind::UnsupportedVersion);
        }
    }

    #[test]
    fn rejects_nonzero_schema_def_len() {
        let md = sample();
        let mut bytes = md.to_bytes();
        // schema_def_len sits right after the reserved padding; compute its offset the same way
        // `parse_body` does: 8 (magic+version+len) + 16 + 2 + 8 + 8 + 8 + 1 + 1 + 1 + 2 + 53
        let offset = 8 + DATASET_WIDTH + 2 + 8 + 8 + 8 + 1 + 1 + 1 + 2 + RESERVED_PADDING_V2;
        bytes[offset..offset + 4].copy_from_slice(&7u32.to_le_bytes());
        let mut reader = cursor_reader(bytes).unwrap();
        let err = Metadata::read(&mut reader).unwrap_err();
        assert_eq!(err.kind(), DbnErrorKind::UnsupportedSchema);
    }

    #[test]
    fn retains_only_first_interval_per_mapping() {
        let mut md = sample();
        md.mappings.push(SymbolMapping {
            raw: "AAPL".to_string(),
            mapped: "AAPL.O".to_string(),
            start_date: 20200101,
            end_date: 20200201,
        });
        // Manually encode a mapping with two intervals and confirm only the first survives.
        let mut w = ByteWriter::new();
        w.fixed_str("AAPL", WRITE_SYMBOL_WIDTH as usize);
        w.u32(2);
        w.u32(20200101);
        w.u32(20200201);
        w.fixed_str("AAPL.O", WRITE_SYMBOL_WIDTH as usize);
        w.u32(20200201);
        w.u32(20200301);
        w.fixed_str("AAPL.N", WRITE_SYMBOL_WIDTH as usize);
        let body = w.into_bytes();
        let mut r = ByteReader::new(&body, 0);
        let parsed = Metadata::read_mappings(&mut r, WRITE_SYMBOL_WIDTH).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].mapped, "AAPL.O");
        assert_eq!(parsed[0].end_date, 20200201);
    }
}
