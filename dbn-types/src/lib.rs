//! Primitive types, sentinel encodings, and wire-format numeric aliases for the Format.
//!
//! This crate has no knowledge of headers, records, or transports; it only defines the
//! building blocks that both the metadata header codec and the record codec build on top of.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod enums;
mod price;
mod sentinel;
mod timestamp;
mod wire;

pub use enums::{Action, InstrumentClass, SType, Schema, Side};
pub use price::{float_to_price, price_to_float};
pub use sentinel::{
    PRICE_SCALE, SCHEMA_MIXED, UNDEF_LIMIT, UNDEF_METADATA_TIMESTAMP, UNDEF_ORDER_SIZE,
    UNDEF_PRICE, UNDEF_STAT_QUANTITY, UNDEF_STYPE, UNDEF_TIMESTAMP,
};
pub use timestamp::{datetime_to_ts, ts_to_datetime};
pub use wire::{I16le, I32le, I64le, U16le, U32le, U64le, LE};
