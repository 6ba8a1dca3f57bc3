//! Little-endian wire-format numeric aliases shared by every on-disk struct.
//!
//! The Format is little-endian throughout. Naming these once here, instead of
//! writing `zerocopy::byteorder::U32<zerocopy::LE>` at every record field, keeps the record and
//! header struct definitions in `dbn` readable.

use zerocopy::byteorder::{I16, I32, I64, U16, U32, U64};
pub use zerocopy::byteorder::LE;

/// A little-endian `u16` on the wire.
pub type U16le = U16<LE>;
/// A little-endian `u32` on the wire.
pub type U32le = U32<LE>;
/// A little-endian `u64` on the wire.
pub type U64le = U64<LE>;
/// A little-endian `i16` on the wire.
pub type I16le = I16<LE>;
/// A little-endian `i32` on the wire.
pub type I32le = I32<LE>;
/// A little-endian `i64` on the wire.
pub type I64le = I64<LE>;
