//! In-band sentinel values used throughout the Format to mean "absent" or "undefined".
//!
//! The wire format has no tagged-union encoding for optional numeric fields; every optional
//! numeric slot instead reserves one bit pattern to mean "no value". These constants name those
//! patterns so callers never have to remember which sentinel applies to which field.

/// Marks an undefined fixed-point price (scale 10^9).
pub const UNDEF_PRICE: i64 = i64::MAX;

/// Marks an undefined timestamp (nanoseconds since the Unix epoch).
pub const UNDEF_TIMESTAMP: i64 = i64::MAX;

/// Marks an undefined order size / level size.
pub const UNDEF_ORDER_SIZE: u32 = u32::MAX;

/// Marks an undefined statistic quantity. Distinct from [`UNDEF_ORDER_SIZE`] because the
/// statistic quantity field is 64 bits wide on the wire.
pub const UNDEF_STAT_QUANTITY: u64 = u64::MAX;

/// The fixed-point scale applied to every price field: one unit equals 1e-9 of the quoted
/// currency.
pub const PRICE_SCALE: f64 = 1_000_000_000.0;

/// Marks an absent `end_ts` in the metadata header. Both `0` and all-ones decode to "absent";
/// writers always emit this value.
pub const UNDEF_METADATA_TIMESTAMP: u64 = u64::MAX;

/// Marks an absent `limit` (record-count cap) in the metadata header.
pub const UNDEF_LIMIT: u64 = 0;

/// Marks an absent `stype_in` / `stype_out` in the metadata header.
pub const UNDEF_STYPE: u8 = 0xFF;

/// The `schema` tag value meaning "this file mixes more than one record schema".
pub const SCHEMA_MIXED: u16 = 0xFFFF;
