//! Closed enumerations used by the metadata header and record bodies.
//!
//! Several of these fields are single bytes that the source format treats as loosely-typed:
//! an unrecognized value is not a framing error, it substitutes a documented default. Each enum
//! here models that with a `from_u8`/`from_u16` constructor that never fails, paired with a
//! `try_from_*` that does, for callers (such as a strict decode mode) that want to reject the
//! substitution instead of silently applying it.

use std::fmt;

/// The schema of every record in a file, or "mixed" if more than one schema is present.
///
/// Unrecognized tag values are preserved as [`Schema::Unknown`] rather than rejected, since the
/// header field is forward-looking: a file written by a newer encoder may carry a schema this
/// version of the codec doesn't know the name of.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
#[non_exhaustive]
pub enum Schema {
    Mbo,
    Mbp1,
    Mbp10,
    Tbbo,
    Trades,
    Ohlcv1S,
    Ohlcv1M,
    Ohlcv1H,
    Ohlcv1D,
    Definition,
    Statistics,
    Status,
    Imbalance,
    OhlcvEod,
    Cmbp1,
    Cbbo1S,
    Cbbo1M,
    Tcbbo,
    Bbo1S,
    Bbo1M,
    /// More than one schema is present in this file.
    Mixed,
    /// A tag value this release does not recognize.
    Unknown(u16),
}

impl Schema {
    /// Decodes the on-disk 16-bit schema tag. Never fails: an unrecognized value becomes
    /// [`Schema::Unknown`].
    pub fn from_u16(tag: u16) -> Self {
        match tag {
            0 => Self::Mbo,
            1 => Self::Mbp1,
            2 => Self::Mbp10,
            3 => Self::Tbbo,
            4 => Self::Trades,
            5 => Self::Ohlcv1S,
            6 => Self::Ohlcv1M,
            7 => Self::Ohlcv1H,
            8 => Self::Ohlcv1D,
            9 => Self::Definition,
            10 => Self::Statistics,
            11 => Self::Status,
            12 => Self::Imbalance,
            13 => Self::OhlcvEod,
            14 => Self::Cmbp1,
            15 => Self::Cbbo1S,
            16 => Self::Cbbo1M,
            17 => Self::Tcbbo,
            18 => Self::Bbo1S,
            19 => Self::Bbo1M,
            0xFFFF => Self::Mixed,
            other => Self::Unknown(other),
        }
    }

    /// Encodes this schema back to its on-disk 16-bit tag.
    pub fn to_u16(self) -> u16 {
        match self {
            Self::Mbo => 0,
            Self::Mbp1 => 1,
            Self::Mbp10 => 2,
            Self::Tbbo => 3,
            Self::Trades => 4,
            Self::Ohlcv1S => 5,
            Self::Ohlcv1M => 6,
            Self::Ohlcv1H => 7,
            Self::Ohlcv1D => 8,
            Self::Definition => 9,
            Self::Statistics => 10,
            Self::Status => 11,
            Self::Imbalance => 12,
            Self::OhlcvEod => 13,
            Self::Cmbp1 => 14,
            Self::Cbbo1S => 15,
            Self::Cbbo1M => 16,
            Self::Tcbbo => 17,
            Self::Bbo1S => 18,
            Self::Bbo1M => 19,
            Self::Mixed => 0xFFFF,
            Self::Unknown(tag) => tag,
        }
    }
}

/// Identifies the symbology used for a raw or mapped symbol string.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
#[non_exhaustive]
pub enum SType {
    InstrumentId,
    RawSymbol,
    Continuous,
    Parent,
    NasdaqSymbol,
    CmsSymbol,
    /// A tag value this release does not recognize.
    Unknown(u8),
}

impl SType {
    /// Decodes the on-disk `stype` byte. Never fails.
    pub fn from_u8(tag: u8) -> Self {
        match tag {
            0 => Self::InstrumentId,
            1 => Self::RawSymbol,
            2 => Self::Continuous,
            3 => Self::Parent,
            4 => Self::NasdaqSymbol,
            5 => Self::CmsSymbol,
            other => Self::Unknown(other),
        }
    }

    /// Encodes this symbol type back to its on-disk byte.
    pub fn to_u8(self) -> u8 {
        match self {
            Self::InstrumentId => 0,
            Self::RawSymbol => 1,
            Self::Continuous => 2,
            Self::Parent => 3,
            Self::NasdaqSymbol => 4,
            Self::CmsSymbol => 5,
            Self::Unknown(tag) => tag,
        }
    }
}

/// An order-book or trade action, stored on the wire as a printable ASCII letter.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum Action {
    /// `0x00`: no action (reserved / padding).
    None,
    Modify,
    Add,
    Cancel,
    /// Clears the book.
    Clear,
    Trade,
    Fill,
}

impl Action {
    /// Decodes a known action byte. Returns `None` for any byte not in the closed set.
    pub fn try_from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::None),
            b'M' => Some(Self::Modify),
            b'A' => Some(Self::Add),
            b'C' => Some(Self::Cancel),
            b'R' => Some(Self::Clear),
            b'T' => Some(Self::Trade),
            b'F' => Some(Self::Fill),
            _ => Option::None,
        }
    }

    /// Decodes an action byte, substituting [`Action::Trade`] for any byte outside the closed
    /// set (the documented fallback default for this field).
    pub fn from_u8_lenient(byte: u8) -> Self {
        Self::try_from_u8(byte).unwrap_or(Self::Trade)
    }

    /// Encodes this action back to its on-disk byte.
    pub fn to_u8(self) -> u8 {
        match self {
            Self::None => 0x00,
            Self::Modify => b'M',
            Self::Add => b'A',
            Self::Cancel => b'C',
            Self::Clear => b'R',
            Self::Trade => b'T',
            Self::Fill => b'F',
        }
    }
}

/// The side of a quote, order, or trade.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum Side {
    Ask,
    Bid,
    /// No side / not applicable.
    None,
}

impl Side {
    /// Decodes a known side byte. Returns `None` for any byte not in the closed set.
    pub fn try_from_u8(byte: u8) -> Option<Self> {
        match byte {
            b'A' => Some(Self::Ask),
            b'B' => Some(Self::Bid),
            b'N' | 0x00 => Some(Self::None),
            _ => Option::None,
        }
    }

    /// Decodes a side byte, substituting [`Side::None`] for any byte outside the closed set.
    pub fn from_u8_lenient(byte: u8) -> Self {
        Self::try_from_u8(byte).unwrap_or(Self::None)
    }

    /// Encodes this side back to its on-disk byte.
    pub fn to_u8(self) -> u8 {
        match self {
            Self::Ask => b'A',
            Self::Bid => b'B',
            Self::None => b'N',
        }
    }
}

/// The class of a tradeable instrument.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum InstrumentClass {
    Stock,
    Option,
    Future,
    FutureSpread,
    OptionSpread,
    MixedSpread,
    Fx,
    Bond,
    Other,
}

impl InstrumentClass {
    /// Decodes a known instrument-class byte. Returns `None` for any byte not in the closed set.
    pub fn try_from_u8(byte: u8) -> Option<Self> {
        match byte {
            b'K' => Some(Self::Stock),
            b'O' => Some(Self::Option),
            b'F' => Some(Self::Future),
            b'S' => Some(Self::FutureSpread),
            b'T' => Some(Self::OptionSpread),
            b'M' => Some(Self::MixedSpread),
            b'X' => Some(Self::Fx),
            b'B' => Some(Self::Bond),
            _ => Option::None,
        }
    }

    /// Decodes an instrument-class byte, substituting [`InstrumentClass::Other`] for any byte
    /// outside the closed set.
    pub fn from_u8_lenient(byte: u8) -> Self {
        Self::try_from_u8(byte).unwrap_or(Self::Other)
    }

    /// Encodes this instrument class back to its on-disk byte.
    pub fn to_u8(self) -> u8 {
        match self {
            Self::Stock => b'K',
            Self::Option => b'O',
            Self::Future => b'F',
            Self::FutureSpread => b'S',
            Self::OptionSpread => b'T',
            Self::MixedSpread => b'M',
            Self::Fx => b'X',
            Self::Bond => b'B',
            Self::Other => b'\0',
        }
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}
