//! Record framing and per-`rtype` dispatch.
//!
//! Every record on the wire begins with the 16-byte [`RecordHeader`]. The `rtype` byte selects
//! one of a closed set of body layouts; a table-driven `match` (not an if/else chain) dispatches
//! to the right parser/writer, keyed off a discriminant table. Fixed-size bodies are represented
//! as `#[repr(C)]` zerocopy structs (bitwise-copyable, no heap allocation to decode); the handful
//! of genuinely variable-length or version-dependent bodies (`InstrumentDef`, `Error`,
//! `SymbolMapping`, `System`) are parsed with the [`crate::bytes`] cursor instead.

use crate::bytes::{ByteReader, ByteWriter};
use crate::error::{DbnError, DbnErrorKind, Result};
use crate::transport::{ReadTransport, WriteTransport};
use dbn_types::{I32le, I64le, U16le, U32le, U64le};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// The common 16-byte header present on every record.
#[derive(Copy, Clone, Eq, PartialEq, Debug, IntoBytes, FromBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
pub struct RecordHeader {
    /// The record's total length, in 4-byte units. Multiply by 4 to get the byte length.
    pub length_units: u8,
    /// Selects the record's body layout.
    pub rtype: u8,
    /// Identifies the data publisher.
    pub publisher_id: U16le,
    /// Identifies the instrument.
    pub instrument_id: U32le,
    /// Nanoseconds since the Unix epoch of the event this record describes.
    pub ts_event: I64le,
}

/// Byte length of [`RecordHeader`].
pub const RECORD_HEADER_LEN: usize = 16;
static_assertions::const_assert_eq!(std::mem::size_of::<RecordHeader>(), RECORD_HEADER_LEN);

impl RecordHeader {
    /// The record's total length in bytes (`length_units * 4`).
    pub fn byte_len(&self) -> usize {
        self.length_units as usize * 4
    }
}

/// Identifies a record's body layout. Unlike most enums in this crate, decoding an unrecognized
/// `rtype` byte is not an error: the record codec skips unknown types rather than failing, so
/// [`RType::try_from_u8`] returns `None` for them and the caller skips.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[non_exhaustive]
pub enum RType {
    Mbp0,
    Mbp1,
    Mbp10,
    Ohlcv1S,
    Ohlcv1M,
    Ohlcv1H,
    Ohlcv1D,
    OhlcvEod,
    Status,
    InstrumentDef,
    Imbalance,
    Error,
    SymbolMapping,
    System,
    Stat,
    Mbo,
    Cmbp1,
    Cbbo1S,
    Cbbo1M,
    Tcbbo,
    Bbo1S,
    Bbo1M,
}

impl RType {
    /// Decodes a known `rtype` byte. Returns `None` for any byte outside the closed set, which
    /// the caller should treat as a forward-compatible skip, not an error.
    pub fn try_from_u8(byte: u8) -> Option<Self> {
        Some(match byte {
            0x00 => Self::Mbp0,
            0x01 => Self::Mbp1,
            0x0A => Self::Mbp10,
            0x12 => Self::Status,
            0x13 => Self::InstrumentDef,
            0x14 => Self::Imbalance,
            0x15 => Self::Error,
            0x16 => Self::SymbolMapping,
            0x17 => Self::System,
            0x18 => Self::Stat,
            0x20 => Self::Ohlcv1S,
            0x21 => Self::Ohlcv1M,
            0x22 => Self::Ohlcv1H,
            0x23 => Self::Ohlcv1D,
            0x24 => Self::OhlcvEod,
            0xA0 => Self::Mbo,
            0xB1 => Self::Cmbp1,
            0xC0 => Self::Cbbo1S,
            0xC1 => Self::Cbbo1M,
            0xC2 => Self::Tcbbo,
            0xC3 => Self::Bbo1S,
            0xC4 => Self::Bbo1M,
            _ => return None,
        })
    }

    /// Encodes this record kind to its on-disk `rtype` byte.
    pub fn to_u8(self) -> u8 {
        match self {
            Self::Mbp0 => 0x00,
            Self::Mbp1 => 0x01,
            Self::Mbp10 => 0x0A,
            Self::Status => 0x12,
            Self::InstrumentDef => 0x13,
            Self::Imbalance => 0x14,
            Self::Error => 0x15,
            Self::SymbolMapping => 0x16,
            Self::System => 0x17,
            Self::Stat => 0x18,
            Self::Ohlcv1S => 0x20,
            Self::Ohlcv1M => 0x21,
            Self::Ohlcv1H => 0x22,
            Self::Ohlcv1D => 0x23,
            Self::OhlcvEod => 0x24,
            Self::Mbo => 0xA0,
            Self::Cmbp1 => 0xB1,
            Self::Cbbo1S => 0xC0,
            Self::Cbbo1M => 0xC1,
            Self::Tcbbo => 0xC2,
            Self::Bbo1S => 0xC3,
            Self::Bbo1M => 0xC4,
        }
    }

    /// `true` if this rtype is any of the four OHLCV cadences or the end-of-day variant.
    ///
    /// The callback engine unifies all OHLCV cadences under one record type, so a caller asking
    /// for `OhlcvMsg` accepts any of these.
    pub fn is_ohlcv(self) -> bool {
        matches!(
            self,
            Self::Ohlcv1S | Self::Ohlcv1M | Self::Ohlcv1H | Self::Ohlcv1D | Self::OhlcvEod
        )
    }

    /// `true` if this rtype uses the MBP-1 body layout (the consolidated/BBO family).
    pub fn is_mbp1_family(self) -> bool {
        matches!(
            self,
            Self::Mbp1 | Self::Cmbp1 | Self::Cbbo1S | Self::Cbbo1M | Self::Tcbbo | Self::Bbo1S | Self::Bbo1M
        )
    }
}

/// One price level of the order book: a bid/ask pair with sizes and order counts.
#[derive(Copy, Clone, Eq, PartialEq, Debug, IntoBytes, FromBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
pub struct BidAskPair {
    pub bid_px: I64le,
    pub ask_px: I64le,
    pub bid_sz: U32le,
    pub ask_sz: U32le,
    pub bid_ct: U32le,
    pub ask_ct: U32le,
}

/// Byte length of [`BidAskPair`].
pub const BID_ASK_PAIR_LEN: usize = 32;
static_assertions::const_assert_eq!(std::mem::size_of::<BidAskPair>(), BID_ASK_PAIR_LEN);

/// Market-by-order body (40 bytes; 56 bytes with the common header).
#[derive(Copy, Clone, Eq, PartialEq, Debug, IntoBytes, FromBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
pub struct MboMsg {
    pub ts_recv: I64le,
    pub order_id: U64le,
    pub size: U32le,
    pub flags: u8,
    pub channel_id: u8,
    pub action: u8,
    pub side: u8,
    pub price: I64le,
    pub ts_in_delta: I32le,
    pub sequence: U32le,
}
pub const MBO_BODY_LEN: usize = 40;
static_assertions::const_assert_eq!(std::mem::size_of::<MboMsg>(), MBO_BODY_LEN);

/// Trade / MBP-0 body (32 bytes; 48 bytes with the common header).
#[derive(Copy, Clone, Eq, PartialEq, Debug, IntoBytes, FromBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
pub struct TradeMsg {
    pub price: I64le,
    pub size: U32le,
    pub action: u8,
    pub side: u8,
    pub flags: u8,
    pub depth: u8,
    pub ts_recv: I64le,
    pub ts_in_delta: I32le,
    pub sequence: U32le,
}
pub const TRADE_BODY_LEN: usize = 32;
static_assertions::const_assert_eq!(std::mem::size_of::<TradeMsg>(), TRADE_BODY_LEN);

fn require_action(byte: u8) -> Result<dbn_types::Action> {
    dbn_types::Action::try_from_u8(byte)
        .ok_or_else(|| DbnError::malformed_header(format!("invalid action byte {byte}")))
}

fn require_side(byte: u8) -> Result<dbn_types::Side> {
    dbn_types::Side::try_from_u8(byte)
        .ok_or_else(|| DbnError::malformed_header(format!("invalid side byte {byte}")))
}

fn require_instrument_class(byte: u8) -> Result<dbn_types::InstrumentClass> {
    dbn_types::InstrumentClass::try_from_u8(byte)
        .ok_or_else(|| DbnError::malformed_header(format!("invalid instrument_class byte {byte}")))
}

impl TradeMsg {
    /// Decodes `action`, defaulting to `Trade` for an out-of-range byte rather than failing; see
    /// [`crate::reader::DecodeOptions::strict`] for the strict alternative.
    pub fn action(&self) -> dbn_types::Action {
        dbn_types::Action::from_u8_lenient(self.action)
    }

    /// Decodes `action`, failing on an out-of-range byte.
    pub fn try_action(&self) -> Result<dbn_types::Action> {
        require_action(self.action)
    }

    /// Decodes `side`, defaulting to `None` for an out-of-range byte.
    pub fn side(&self) -> dbn_types::Side {
        dbn_types::Side::from_u8_lenient(self.side)
    }

    /// Decodes `side`, failing on an out-of-range byte.
    pub fn try_side(&self) -> Result<dbn_types::Side> {
        require_side(self.side)
    }
}

impl MboMsg {
    /// Decodes `action`, defaulting to `Trade` for an out-of-range byte.
    pub fn action(&self) -> dbn_types::Action {
        dbn_types::Action::from_u8_lenient(self.action)
    }

    /// Decodes `action`, failing on an out-of-range byte.
    pub fn try_action(&self) -> Result<dbn_types::Action> {
        require_action(self.action)
    }

    /// Decodes `side`, defaulting to `None` for an out-of-range byte.
    pub fn side(&self) -> dbn_types::Side {
        dbn_types::Side::from_u8_lenient(self.side)
    }

    /// Decodes `side`, failing on an out-of-range byte.
    pub fn try_side(&self) -> Result<dbn_types::Side> {
        require_side(self.side)
    }
}

impl ImbalanceMsg {
    /// Decodes `side`, defaulting to `None` for an out-of-range byte.
    pub fn side(&self) -> dbn_types::Side {
        dbn_types::Side::from_u8_lenient(self.side)
    }

    /// Decodes `side`, failing on an out-of-range byte.
    pub fn try_side(&self) -> Result<dbn_types::Side> {
        require_side(self.side)
    }
}

impl InstrumentDefMsg {
    /// Decodes `instrument_class`, defaulting to `Other` for an out-of-range byte.
    pub fn instrument_class(&self) -> dbn_types::InstrumentClass {
        dbn_types::InstrumentClass::from_u8_lenient(self.instrument_class)
    }

    /// Decodes `instrument_class`, failing on an out-of-range byte.
    pub fn try_instrument_class(&self) -> Result<dbn_types::InstrumentClass> {
        require_instrument_class(self.instrument_class)
    }
}

impl SymbolMappingMsg {
    /// Decodes `stype_in`, defaulting to `Unknown` for an out-of-range byte.
    pub fn stype_in(&self) -> dbn_types::SType {
        dbn_types::SType::from_u8(self.stype_in)
    }

    /// Decodes `stype_out`, defaulting to `Unknown` for an out-of-range byte.
    pub fn stype_out(&self) -> dbn_types::SType {
        dbn_types::SType::from_u8(self.stype_out)
    }
}

/// MBP-1 (and the consolidated/BBO family) body: [`TradeMsg`] plus one [`BidAskPair`] level.
/// 64 bytes; 80 bytes with the common header.
#[derive(Copy, Clone, Eq, PartialEq, Debug, IntoBytes, FromBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
pub struct Mbp1Msg {
    pub trade: TradeMsg,
    pub levels: [BidAskPair; 1],
}
pub const MBP1_BODY_LEN: usize = 64;
static_assertions::const_assert_eq!(std::mem::size_of::<Mbp1Msg>(), MBP1_BODY_LEN);

/// MBP-10 body: [`TradeMsg`] plus ten [`BidAskPair`] levels. 352 bytes; 368 with the header.
#[derive(Copy, Clone, Eq, PartialEq, Debug, IntoBytes, FromBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
pub struct Mbp10Msg {
    pub trade: TradeMsg,
    pub levels: [BidAskPair; 10],
}
pub const MBP10_BODY_LEN: usize = 352;
static_assertions::const_assert_eq!(std::mem::size_of::<Mbp10Msg>(), MBP10_BODY_LEN);

/// OHLCV bar body, shared by all four cadences and the end-of-day variant. 40 bytes; 56 with
/// the header.
#[derive(Copy, Clone, Eq, PartialEq, Debug, IntoBytes, FromBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
pub struct OhlcvMsg {
    pub open: I64le,
    pub high: I64le,
    pub low: I64le,
    pub close: I64le,
    pub volume: U64le,
}
pub const OHLCV_BODY_LEN: usize = 40;
static_assertions::const_assert_eq!(std::mem::size_of::<OhlcvMsg>(), OHLCV_BODY_LEN);

/// Trading-status body. 24 bytes; 40 with the header.
#[derive(Copy, Clone, Eq, PartialEq, Debug, IntoBytes, FromBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
pub struct StatusMsg {
    pub ts_recv: U64le,
    pub action: U16le,
    pub reason: U16le,
    pub trading_event: U16le,
    pub is_trading: u8,
    pub is_quoting: u8,
    pub is_short_sell_restricted: u8,
    pub reserved: [u8; 7],
}
pub const STATUS_BODY_LEN: usize = 24;
static_assertions::const_assert_eq!(std::mem::size_of::<StatusMsg>(), STATUS_BODY_LEN);

/// Auction-imbalance body. 96 bytes; 112 with the header. The last byte is reserved padding.
#[derive(Copy, Clone, Eq, PartialEq, Debug, IntoBytes, FromBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
pub struct ImbalanceMsg {
    pub ts_recv: U64le,
    pub ref_price: I64le,
    pub auction_time: U64le,
    pub cont_book_clr_price: I64le,
    pub auct_interest_clr_price: I64le,
    pub ssr_filling_price: I64le,
    pub ind_match_price: I64le,
    pub upper_collar: I64le,
    pub lower_collar: I64le,
    pub paired_qty: U32le,
    pub total_imbalance_qty: U32le,
    pub market_imbalance_qty: U32le,
    pub unpaired_qty: U32le,
    pub auction_type: u8,
    pub side: u8,
    pub auction_status: u8,
    pub freeze_status: u8,
    pub num_extensions: u8,
    pub unpaired_side: u8,
    pub significant_imbalance: u8,
    pub reserved: u8,
}
pub const IMBALANCE_BODY_LEN: usize = 96;
static_assertions::const_assert_eq!(std::mem::size_of::<ImbalanceMsg>(), IMBALANCE_BODY_LEN);

/// Aggregate-statistic body. 48 bytes; 64 with the header.
///
/// The `reserved` tail is sized to fit the 48-byte body: summing every named field up to
/// `stat_flags` already accounts for 46 bytes, so only 2 reserved bytes remain (see DESIGN.md
/// for the discrepancy with the field list's literal prose, which implies 18).
#[derive(Copy, Clone, Eq, PartialEq, Debug, IntoBytes, FromBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
pub struct StatMsg {
    pub ts_recv: U64le,
    pub ts_ref: U64le,
    pub price: I64le,
    /// Sentinel `u64::MAX` means "undefined quantity".
    pub quantity: U64le,
    pub sequence: U32le,
    pub ts_in_delta: I32le,
    pub stat_type: U16le,
    pub channel_id: U16le,
    pub update_action: u8,
    pub stat_flags: u8,
    pub reserved: [u8; 2],
}
pub const STAT_BODY_LEN: usize = 48;
static_assertions::const_assert_eq!(std::mem::size_of::<StatMsg>(), STAT_BODY_LEN);

/// The 13 trailing "leg" fields that version-3 `InstrumentDef` records add for multi-leg
/// (spread) instruments. 52 bytes.
#[derive(Copy, Clone, Eq, PartialEq, Debug, IntoBytes, FromBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
pub struct InstrumentDefLegs {
    pub leg_instrument_id: U32le,
    pub leg_underlying_id: U32le,
    pub leg_index: I32le,
    pub leg_side: I32le,
    pub leg_instrument_class: I32le,
    pub leg_ratio_qty_numerator: I32le,
    pub leg_ratio_qty_denominator: I32le,
    pub leg_ratio_price_numerator: I32le,
    pub leg_ratio_price_denominator: I32le,
    pub leg_strike_price_numerator: I32le,
    pub leg_strike_price_denominator: I32le,
    pub leg_delta_numerator: I32le,
    pub leg_delta_denominator: I32le,
}
pub const INSTRUMENT_DEF_LEGS_LEN: usize = 52;
static_assertions::const_assert_eq!(std::mem::size_of::<InstrumentDefLegs>(), INSTRUMENT_DEF_LEGS_LEN);

/// Instrument-definition body. The only record layout that depends on the
/// metadata `version`: v2 uses a 19-byte `raw_symbol` slot and carries no leg fields; v3 widens
/// `raw_symbol` to 22 bytes and appends the 13 [`InstrumentDefLegs`] fields. Parsed and written
/// manually (not via a `#[repr(C)]` struct) because its width is not a compile-time constant.
#[derive(Clone, Debug, PartialEq)]
pub struct InstrumentDefMsg {
    pub ts_recv: u64,
    pub min_price_increment: i64,
    pub display_factor: i64,
    pub expiration: i64,
    pub activation: i64,
    pub high_limit_price: i64,
    pub low_limit_price: i64,
    pub max_price_variation: i64,
    pub trading_reference_price: i64,
    pub unit_of_measure_qty: i64,
    pub min_price_increment_amount: i64,
    pub price_ratio: i64,
    pub strike_price: i64,
    pub inst_attrib_value: i32,
    pub underlying_id: u32,
    pub raw_instrument_id: u32,
    pub market_depth_implied: i32,
    pub market_depth: i32,
    pub market_segment_id: u32,
    pub max_trade_vol: u32,
    pub min_lot_size: i32,
    pub min_lot_size_block: i32,
    pub min_lot_size_round_lot: i32,
    pub min_trade_vol: u32,
    pub contract_multiplier: i32,
    pub decay_quantity: i32,
    pub original_contract_size: i32,
    pub trading_reference_date: u32,
    pub appl_id: i32,
    pub maturity_year: u16,
    pub maturity_month: u16,
    pub maturity_day: u16,
    pub maturity_week: u16,
    pub decay_start_date: u16,
    pub channel_id: u16,
    pub currency: String,
    pub settl_currency: String,
    pub secsubtype: String,
    pub raw_symbol: String,
    pub group: String,
    pub exchange: String,
    pub asset: String,
    pub cfi: String,
    pub security_type: String,
    pub unit_of_measure: String,
    pub underlying: String,
    pub strike_price_currency: String,
    pub instrument_class: u8,
    pub match_algorithm: u8,
    pub md_security_trading_status: u8,
    pub main_fraction: u8,
    pub price_display_format: u8,
    pub settl_price_type: u8,
    pub sub_fraction: u8,
    pub underlying_product: u8,
    pub security_update_action: u8,
    pub flow_schedule_type: u8,
    pub tick_rule: u8,
    /// Present only for version-3 records.
    pub legs: Option<InstrumentDefLegs>,
}

/// Width of the `raw_symbol` string field for version 2.
pub const INSTRUMENT_DEF_RAW_SYMBOL_WIDTH_V2: usize = 19;
/// Width of the `raw_symbol` string field for version 3.
pub const INSTRUMENT_DEF_RAW_SYMBOL_WIDTH_V3: usize = 22;

const CURRENCY_WIDTH: usize = 4;
const SETTL_CURRENCY_WIDTH: usize = 4;
const SECSUBTYPE_WIDTH: usize = 6;
const GROUP_WIDTH: usize = 21;
const EXCHANGE_WIDTH: usize = 5;
const ASSET_WIDTH: usize = 7;
const CFI_WIDTH: usize = 7;
const SECURITY_TYPE_WIDTH: usize = 7;
const UNIT_OF_MEASURE_WIDTH: usize = 31;
const UNDERLYING_WIDTH: usize = 21;
const STRIKE_PRICE_CURRENCY_WIDTH: usize = 4;

impl InstrumentDefMsg {
    fn raw_symbol_width(version: u8) -> usize {
        if version >= 3 {
            INSTRUMENT_DEF_RAW_SYMBOL_WIDTH_V3
        } else {
            INSTRUMENT_DEF_RAW_SYMBOL_WIDTH_V2
        }
    }

    /// The exact on-disk body length for this record at the given version, including the
    /// trailing alignment pad that fills the declared `length_units * 4`.
    pub fn body_len(version: u8) -> usize {
        let core = 13 * 8
            + 16 * 4
            + 6 * 2
            + (CURRENCY_WIDTH
                + SETTL_CURRENCY_WIDTH
                + SECSUBTYPE_WIDTH
                + Self::raw_symbol_width(version)
                + GROUP_WIDTH
                + EXCHANGE_WIDTH
                + ASSET_WIDTH
                + CFI_WIDTH
                + SECURITY_TYPE_WIDTH
                + UNIT_OF_MEASURE_WIDTH
                + UNDERLYING_WIDTH
                + STRIKE_PRICE_CURRENCY_WIDTH)
            + 11;
        let with_legs = if version >= 3 {
            core + INSTRUMENT_DEF_LEGS_LEN
        } else {
            core
        };
        with_legs.div_ceil(4) * 4
    }

    fn parse(version: u8, body: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(body, 0);

        let ts_recv = r.u64()?;
        let min_price_increment = r.i64()?;
        let display_factor = r.i64()?;
        let expiration = r.i64()?;
        let activation = r.i64()?;
        let high_limit_price = r.i64()?;
        let low_limit_price = r.i64()?;
        let max_price_variation = r.i64()?;
        let trading_reference_price = r.i64()?;
        let unit_of_measure_qty = r.i64()?;
        let min_price_increment_amount = r.i64()?;
        let price_ratio = r.i64()?;
        let strike_price = r.i64()?;

        let inst_attrib_value = r.u32()? as i32;
        let underlying_id = r.u32()?;
        let raw_instrument_id = r.u32()?;
        let market_depth_implied = r.u32()? as i32;
        let market_depth = r.u32()? as i32;
        let market_segment_id = r.u32()?;
        let max_trade_vol = r.u32()?;
        let min_lot_size = r.u32()? as i32;
        let min_lot_size_block = r.u32()? as i32;
        let min_lot_size_round_lot = r.u32()? as i32;
        let min_trade_vol = r.u32()?;
        let contract_multiplier = r.u32()? as i32;
        let decay_quantity = r.u32()? as i32;
        let original_contract_size = r.u32()? as i32;
        let trading_reference_date = r.u32()?;
        let appl_id = r.u32()? as i32;

        let maturity_year = r.u16()?;
        let maturity_month = r.u16()?;
        let maturity_day = r.u16()?;
        let maturity_week = r.u16()?;
        let decay_start_date = r.u16()?;
        let channel_id = r.u16()?;

        let currency = r.fixed_str(CURRENCY_WIDTH)?;
        let settl_currency = r.fixed_str(SETTL_CURRENCY_WIDTH)?;
        let secsubtype = r.fixed_str(SECSUBTYPE_WIDTH)?;
        let raw_symbol = r.fixed_str(Self::raw_symbol_width(version))?;
        let group = r.fixed_str(GROUP_WIDTH)?;
        let exchange = r.fixed_str(EXCHANGE_WIDTH)?;
        let asset = r.fixed_str(ASSET_WIDTH)?;
        let cfi = r.fixed_str(CFI_WIDTH)?;
        let security_type = r.fixed_str(SECURITY_TYPE_WIDTH)?;
        let unit_of_measure = r.fixed_str(UNIT_OF_MEASURE_WIDTH)?;
        let underlying = r.fixed_str(UNDERLYING_WIDTH)?;
        let strike_price_currency = r.fixed_str(STRIKE_PRICE_CURRENCY_WIDTH)?;

        let instrument_class = r.u8()?;
        let match_algorithm = r.u8()?;
        let md_security_trading_status = r.u8()?;
        let main_fraction = r.u8()?;
        let price_display_format = r.u8()?;
        let settl_price_type = r.u8()?;
        let sub_fraction = r.u8()?;
        let underlying_product = r.u8()?;
        let security_update_action = r.u8()?;
        let flow_schedule_type = r.u8()?;
        let tick_rule = r.u8()?;

        let legs = if version >= 3 {
            let bytes = r.bytes(INSTRUMENT_DEF_LEGS_LEN)?;
            Some(
                InstrumentDefLegs::read_from_bytes(bytes)
                    .map_err(|_| DbnError::malformed_header("InstrumentDef leg block truncated"))?,
            )
        } else {
            None
        };

        Ok(Self {
            ts_recv,
            min_price_increment,
            display_factor,
            expiration,
            activation,
            high_limit_price,
            low_limit_price,
            max_price_variation,
            trading_reference_price,
            unit_of_measure_qty,
            min_price_increment_amount,
            price_ratio,
            strike_price,
            inst_attrib_value,
            underlying_id,
            raw_instrument_id,
            market_depth_implied,
            market_depth,
            market_segment_id,
            max_trade_vol,
            min_lot_size,
            min_lot_size_block,
            min_lot_size_round_lot,
            min_trade_vol,
            contract_multiplier,
            decay_quantity,
            original_contract_size,
            trading_reference_date,
            appl_id,
            maturity_year,
            maturity_month,
            maturity_day,
            maturity_week,
            decay_start_date,
            channel_id,
            currency,
            settl_currency,
            secsubtype,
            raw_symbol,
            group,
            exchange,
            asset,
            cfi,
            security_type,
            unit_of_measure,
            underlying,
            strike_price_currency,
            instrument_class,
            match_algorithm,
            md_security_trading_status,
            main_fraction,
            price_display_format,
            settl_price_type,
            sub_fraction,
            underlying_product,
            security_update_action,
            flow_schedule_type,
            tick_rule,
            legs,
        })
    }

    fn write(&self, version: u8, w: &mut ByteWriter) {
        w.u64(self.ts_recv);
        w.i64(self.min_price_increment);
        w.i64(self.display_factor);
        w.i64(self.expiration);
        w.i64(self.activation);
        w.i64(self.high_limit_price);
        w.i64(self.low_limit_price);
        w.i64(self.max_price_variation);
        w.i64(self.trading_reference_price);
        w.i64(self.unit_of_measure_qty);
        w.i64(self.min_price_increment_amount);
        w.i64(self.price_ratio);
        w.i64(self.strike_price);

        w.u32(self.inst_attrib_value as u32);
        w.u32(self.underlying_id);
        w.u32(self.raw_instrument_id);
        w.u32(self.market_depth_implied as u32);
        w.u32(self.market_depth as u32);
        w.u32(self.market_segment_id);
        w.u32(self.max_trade_vol);
        w.u32(self.min_lot_size as u32);
        w.u32(self.min_lot_size_block as u32);
        w.u32(self.min_lot_size_round_lot as u32);
        w.u32(self.min_trade_vol);
        w.u32(self.contract_multiplier as u32);
        w.u32(self.decay_quantity as u32);
        w.u32(self.original_contract_size as u32);
        w.u32(self.trading_reference_date);
        w.u32(self.appl_id as u32);

        w.u16(self.maturity_year);
        w.u16(self.maturity_month);
        w.u16(self.maturity_day);
        w.u16(self.maturity_week);
        w.u16(self.decay_start_date);
        w.u16(self.channel_id);

        w.fixed_str(&self.currency, CURRENCY_WIDTH);
        w.fixed_str(&self.settl_currency, SETTL_CURRENCY_WIDTH);
        w.fixed_str(&self.secsubtype, SECSUBTYPE_WIDTH);
        w.fixed_str(&self.raw_symbol, Self::raw_symbol_width(version));
        w.fixed_str(&self.group, GROUP_WIDTH);
        w.fixed_str(&self.exchange, EXCHANGE_WIDTH);
        w.fixed_str(&self.asset, ASSET_WIDTH);
        w.fixed_str(&self.cfi, CFI_WIDTH);
        w.fixed_str(&self.security_type, SECURITY_TYPE_WIDTH);
        w.fixed_str(&self.unit_of_measure, UNIT_OF_MEASURE_WIDTH);
        w.fixed_str(&self.underlying, UNDERLYING_WIDTH);
        w.fixed_str(&self.strike_price_currency, STRIKE_PRICE_CURRENCY_WIDTH);

        w.u8(self.instrument_class);
        w.u8(self.match_algorithm);
        w.u8(self.md_security_trading_status);
        w.u8(self.main_fraction);
        w.u8(self.price_display_format);
        w.u8(self.settl_price_type);
        w.u8(self.sub_fraction);
        w.u8(self.underlying_product);
        w.u8(self.security_update_action);
        w.u8(self.flow_schedule_type);
        w.u8(self.tick_rule);

        if version >= 3 {
            if let Some(legs) = &self.legs {
                w.bytes(legs.as_bytes());
            } else {
                w.zeros(INSTRUMENT_DEF_LEGS_LEN);
            }
        }

        let unpadded = w.len();
        let padded = Self::body_len(version);
        if padded > unpadded {
            w.zeros(padded - unpadded);
        }
    }
}

/// A decode or forward-compatible-skip result from [`read_record`].
pub enum DecodedRecord {
    /// A record of a known type.
    Record(Record),
    /// A record whose `rtype` this codec does not recognize. The payload was consumed and
    /// discarded.
    Skipped { rtype: u8, byte_len: usize },
}

/// A decoded record value, tagged by its `rtype`.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum Record {
    Mbo(RecordHeader, MboMsg),
    Trade(RecordHeader, TradeMsg),
    Mbp1(RecordHeader, Mbp1Msg),
    Mbp10(RecordHeader, Mbp10Msg),
    Ohlcv1S(RecordHeader, OhlcvMsg),
    Ohlcv1M(RecordHeader, OhlcvMsg),
    Ohlcv1H(RecordHeader, OhlcvMsg),
    Ohlcv1D(RecordHeader, OhlcvMsg),
    OhlcvEod(RecordHeader, OhlcvMsg),
    Status(RecordHeader, StatusMsg),
    InstrumentDef(RecordHeader, InstrumentDefMsg),
    Imbalance(RecordHeader, ImbalanceMsg),
    Stat(RecordHeader, StatMsg),
    Cmbp1(RecordHeader, Mbp1Msg),
    Cbbo1S(RecordHeader, Mbp1Msg),
    Cbbo1M(RecordHeader, Mbp1Msg),
    Tcbbo(RecordHeader, Mbp1Msg),
    Bbo1S(RecordHeader, Mbp1Msg),
    Bbo1M(RecordHeader, Mbp1Msg),
    Error(RecordHeader, ErrorMsg),
    SymbolMapping(RecordHeader, SymbolMappingMsg),
    System(RecordHeader, SystemMsg),
}

impl Record {
    /// The common header shared by every record.
    pub fn header(&self) -> &RecordHeader {
        match self {
            Self::Mbo(h, _)
            | Self::Trade(h, _)
            | Self::Mbp1(h, _)
            | Self::Mbp10(h, _)
            | Self::Ohlcv1S(h, _)
            | Self::Ohlcv1M(h, _)
            | Self::Ohlcv1H(h, _)
            | Self::Ohlcv1D(h, _)
            | Self::OhlcvEod(h, _)
            | Self::Status(h, _)
            | Self::InstrumentDef(h, _)
            | Self::Imbalance(h, _)
            | Self::Stat(h, _)
            | Self::Cmbp1(h, _)
            | Self::Cbbo1S(h, _)
            | Self::Cbbo1M(h, _)
            | Self::Tcbbo(h, _)
            | Self::Bbo1S(h, _)
            | Self::Bbo1M(h, _)
            | Self::Error(h, _)
            | Self::SymbolMapping(h, _)
            | Self::System(h, _) => h,
        }
    }

    /// Views this record as an OHLCV bar, regardless of which of the five cadence `rtype`s
    /// produced it. The callback engine uses this to let a caller iterate "OHLCV bars" without
    /// matching on every cadence individually.
    pub fn as_ohlcv(&self) -> Option<(&RecordHeader, &OhlcvMsg)> {
        match self {
            Self::Ohlcv1S(h, m)
            | Self::Ohlcv1M(h, m)
            | Self::Ohlcv1H(h, m)
            | Self::Ohlcv1D(h, m)
            | Self::OhlcvEod(h, m) => Some((h, m)),
            _ => None,
        }
    }

    /// Views this record as an MBP-1-shaped body, regardless of which member of the
    /// consolidated/BBO family produced it.
    pub fn as_mbp1(&self) -> Option<(&RecordHeader, &Mbp1Msg)> {
        match self {
            Self::Mbp1(h, m)
            | Self::Cmbp1(h, m)
            | Self::Cbbo1S(h, m)
            | Self::Cbbo1M(h, m)
            | Self::Tcbbo(h, m)
            | Self::Bbo1S(h, m)
            | Self::Bbo1M(h, m) => Some((h, m)),
            _ => None,
        }
    }

    /// The record's `rtype`.
    pub fn rtype(&self) -> RType {
        match self {
            Self::Mbo(..) => RType::Mbo,
            Self::Trade(..) => RType::Mbp0,
            Self::Mbp1(..) => RType::Mbp1,
            Self::Mbp10(..) => RType::Mbp10,
            Self::Ohlcv1S(..) => RType::Ohlcv1S,
            Self::Ohlcv1M(..) => RType::Ohlcv1M,
            Self::Ohlcv1H(..) => RType::Ohlcv1H,
            Self::Ohlcv1D(..) => RType::Ohlcv1D,
            Self::OhlcvEod(..) => RType::OhlcvEod,
            Self::Status(..) => RType::Status,
            Self::InstrumentDef(..) => RType::InstrumentDef,
            Self::Imbalance(..) => RType::Imbalance,
            Self::Stat(..) => RType::Stat,
            Self::Cmbp1(..) => RType::Cmbp1,
            Self::Cbbo1S(..) => RType::Cbbo1S,
            Self::Cbbo1M(..) => RType::Cbbo1M,
            Self::Tcbbo(..) => RType::Tcbbo,
            Self::Bbo1S(..) => RType::Bbo1S,
            Self::Bbo1M(..) => RType::Bbo1M,
            Self::Error(..) => RType::Error,
            Self::SymbolMapping(..) => RType::SymbolMapping,
            Self::System(..) => RType::System,
        }
    }

    /// Re-validates every enum-typed byte field this record carries (`Action`, `Side`,
    /// `InstrumentClass`), failing on the first one outside its closed set.
    ///
    /// Used by [`crate::reader::RecordDecoder`] when [`crate::reader::DecodeOptions::strict`] is
    /// set; by default those bytes are decoded leniently (see each message type's lenient
    /// accessor) and this is never called (see DESIGN.md for the resolution of this default).
    pub fn check_enums_strict(&self) -> Result<()> {
        match self {
            Self::Mbo(_, m) => {
                m.try_action()?;
                m.try_side()?;
            }
            Self::Trade(_, m)
            | Self::Mbp1(_, m)
            | Self::Cmbp1(_, m)
            | Self::Cbbo1S(_, m)
            | Self::Cbbo1M(_, m)
            | Self::Tcbbo(_, m)
            | Self::Bbo1S(_, m)
            | Self::Bbo1M(_, m) => {
                m.trade.try_action()?;
                m.trade.try_side()?;
            }
            Self::Mbp10(_, m) => {
                m.trade.try_action()?;
                m.trade.try_side()?;
            }
            Self::Imbalance(_, m) => {
                m.try_side()?;
            }
            Self::InstrumentDef(_, m) => {
                m.try_instrument_class()?;
            }
            Self::Ohlcv1S(..)
            | Self::Ohlcv1M(..)
            | Self::Ohlcv1H(..)
            | Self::Ohlcv1D(..)
            | Self::OhlcvEod(..)
            | Self::Status(..)
            | Self::Stat(..)
            | Self::Error(..)
            | Self::SymbolMapping(..)
            | Self::System(..) => {}
        }
        Ok(())
    }
}

/// An error record: the common header plus a NUL-terminated UTF-8 message filling the rest of
/// the body.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ErrorMsg {
    pub message: String,
}

/// A symbol-mapping record.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SymbolMappingMsg {
    pub stype_in: u8,
    pub stype_in_symbol: String,
    pub stype_out: u8,
    pub stype_out_symbol: String,
    pub start_ts: i64,
    pub end_ts: i64,
}

/// A system record: the common header plus up to two NUL-terminated UTF-8 strings, `msg` and
/// `code`. An absent second string decodes to an empty `code`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SystemMsg {
    pub msg: String,
    pub code: String,
}

/// Decodes the next record from `transport`, or `None` at a clean end-of-stream.
///
/// Reads `length_units` and `rtype` first; for an unrecognized `rtype` it skips the remainder of
/// the record without reading the rest of the common header (forward compatibility is the point:
/// a newer writer's record kinds must not break an older reader). `version` selects the
/// `InstrumentDef` layout.
pub fn read_record(transport: &mut impl ReadTransport, version: u8) -> Result<Option<DecodedRecord>> {
    let mut prefix = [0u8; 2];
    if !transport.try_read_exact(&mut prefix)? {
        return Ok(None);
    }
    let length_units = prefix[0];
    let rtype_byte = prefix[1];
    let byte_len = length_units as usize * 4;
    if byte_len < RECORD_HEADER_LEN || byte_len % 4 != 0 {
        return Err(DbnError::new(
            DbnErrorKind::MalformedHeader,
            format!("record length_units={length_units} implies an invalid byte length"),
        )
        .with_offset(transport.position()));
    }

    let Some(rtype) = RType::try_from_u8(rtype_byte) else {
        tracing::debug!(rtype = rtype_byte, byte_len, "skipping unknown record type");
        transport.skip((byte_len - 2) as u64)?;
        return Ok(Some(DecodedRecord::Skipped { rtype: rtype_byte, byte_len }));
    };

    let mut rest = [0u8; RECORD_HEADER_LEN - 2];
    transport.read_exact(&mut rest)?;
    let mut header_bytes = [0u8; RECORD_HEADER_LEN];
    header_bytes[0] = length_units;
    header_bytes[1] = rtype_byte;
    header_bytes[2..].copy_from_slice(&rest);
    let header = RecordHeader::read_from_bytes(&header_bytes[..])
        .expect("RecordHeader is exactly RECORD_HEADER_LEN bytes");

    let body_len = byte_len - RECORD_HEADER_LEN;
    let mut body = vec![0u8; body_len];
    transport.read_exact(&mut body)?;

    let record = decode_body(rtype, version, header, &body)?;
    Ok(Some(DecodedRecord::Record(record)))
}

fn decode_fixed<T>(rtype_name: &'static str, body: &[u8], expected: usize) -> Result<T>
where
    T: FromBytes + KnownLayout + Immutable,
{
    if body.len() < expected {
        return Err(DbnError::unexpected_eof(format!(
            "{rtype_name} body is {} bytes, expected at least {expected}",
            body.len()
        )));
    }
    T::read_from_bytes(&body[..expected])
        .map_err(|_| DbnError::malformed_header(format!("{rtype_name} body has invalid layout")))
}

fn decode_body(rtype: RType, version: u8, header: RecordHeader, body: &[u8]) -> Result<Record> {
    Ok(match rtype {
        RType::Mbo => Record::Mbo(header, decode_fixed("MBO", body, MBO_BODY_LEN)?),
        RType::Mbp0 => Record::Trade(header, decode_fixed("Trade", body, TRADE_BODY_LEN)?),
        RType::Mbp1 => Record::Mbp1(header, decode_fixed("MBP-1", body, MBP1_BODY_LEN)?),
        RType::Mbp10 => Record::Mbp10(header, decode_fixed("MBP-10", body, MBP10_BODY_LEN)?),
        RType::Ohlcv1S => Record::Ohlcv1S(header, decode_fixed("OHLCV-1s", body, OHLCV_BODY_LEN)?),
        RType::Ohlcv1M => Record::Ohlcv1M(header, decode_fixed("OHLCV-1m", body, OHLCV_BODY_LEN)?),
        RType::Ohlcv1H => Record::Ohlcv1H(header, decode_fixed("OHLCV-1h", body, OHLCV_BODY_LEN)?),
        RType::Ohlcv1D => Record::Ohlcv1D(header, decode_fixed("OHLCV-1d", body, OHLCV_BODY_LEN)?),
        RType::OhlcvEod => Record::OhlcvEod(header, decode_fixed("OHLCV-eod", body, OHLCV_BODY_LEN)?),
        RType::Status => Record::Status(header, decode_fixed("Status", body, STATUS_BODY_LEN)?),
        RType::InstrumentDef => {
            Record::InstrumentDef(header, InstrumentDefMsg::parse(version, body)?)
        }
        RType::Imbalance => Record::Imbalance(header, decode_fixed("Imbalance", body, IMBALANCE_BODY_LEN)?),
        RType::Stat => Record::Stat(header, decode_fixed("Stat", body, STAT_BODY_LEN)?),
        RType::Cmbp1 => Record::Cmbp1(header, decode_fixed("CMBP-1", body, MBP1_BODY_LEN)?),
        RType::Cbbo1S => Record::Cbbo1S(header, decode_fixed("CBBO-1s", body, MBP1_BODY_LEN)?),
        RType::Cbbo1M => Record::Cbbo1M(header, decode_fixed("CBBO-1m", body, MBP1_BODY_LEN)?),
        RType::Tcbbo => Record::Tcbbo(header, decode_fixed("TCBBO", body, MBP1_BODY_LEN)?),
        RType::Bbo1S => Record::Bbo1S(header, decode_fixed("BBO-1s", body, MBP1_BODY_LEN)?),
        RType::Bbo1M => Record::Bbo1M(header, decode_fixed("BBO-1m", body, MBP1_BODY_LEN)?),
        RType::Error => {
            let mut r = ByteReader::new(body, 0);
            let message = r.nul_terminated_rest()?;
            Record::Error(header, ErrorMsg { message })
        }
        RType::SymbolMapping => {
            let mut r = ByteReader::new(body, 0);
            let stype_in = r.u8()?;
            r.skip(3)?;
            let stype_in_len = r.u16()? as usize;
            let stype_in_symbol = r.fixed_str(stype_in_len)?;
            let stype_out = r.u8()?;
            r.skip(3)?;
            let stype_out_len = r.u16()? as usize;
            let stype_out_symbol = r.fixed_str(stype_out_len)?;
            let start_ts = r.i64()?;
            let end_ts = r.i64()?;
            Record::SymbolMapping(
                header,
                SymbolMappingMsg {
                    stype_in,
                    stype_in_symbol,
                    stype_out,
                    stype_out_symbol,
                    start_ts,
                    end_ts,
                },
            )
        }
        RType::System => {
            let mut r = ByteReader::new(body, 0);
            let msg = r.nul_terminated_field()?;
            let code = r.nul_terminated_field()?;
            Record::System(header, SystemMsg { msg, code })
        }
    })
}

/// Encodes and writes `record` to `transport`.
///
/// Computes `length_units` as `(16 + body_bytes) / 4`, which must be an integer.
pub fn write_record(transport: &mut impl WriteTransport, record: &Record, version: u8) -> Result<()> {
    let header = *record.header();
    let body: Vec<u8> = match record {
        Record::Mbo(_, m) => m.as_bytes().to_vec(),
        Record::Trade(_, m) => m.as_bytes().to_vec(),
        Record::Mbp1(_, m) | Record::Cmbp1(_, m) | Record::Cbbo1S(_, m) | Record::Cbbo1M(_, m)
        | Record::Tcbbo(_, m) | Record::Bbo1S(_, m) | Record::Bbo1M(_, m) => m.as_bytes().to_vec(),
        Record::Mbp10(_, m) => m.as_bytes().to_vec(),
        Record::Ohlcv1S(_, m)
        | Record::Ohlcv1M(_, m)
        | Record::Ohlcv1H(_, m)
        | Record::Ohlcv1D(_, m)
        | Record::OhlcvEod(_, m) => m.as_bytes().to_vec(),
        Record::Status(_, m) => m.as_bytes().to_vec(),
        Record::InstrumentDef(_, m) => {
            let mut w = ByteWriter::new();
            m.write(version, &mut w);
            w.into_bytes()
        }
        Record::Imbalance(_, m) => m.as_bytes().to_vec(),
        Record::Stat(_, m) => m.as_bytes().to_vec(),
        Record::Error(_, m) => {
            let mut w = ByteWriter::new();
            w.bytes(m.message.as_bytes());
            w.u8(0);
            pad_to_multiple_of_4(&mut w);
            w.into_bytes()
        }
        Record::SymbolMapping(_, m) => {
            let mut w = ByteWriter::new();
            w.u8(m.stype_in);
            w.zeros(3);
            w.u16(m.stype_in_symbol.len() as u16);
            w.bytes(m.stype_in_symbol.as_bytes());
            w.u8(m.stype_out);
            w.zeros(3);
            w.u16(m.stype_out_symbol.len() as u16);
            w.bytes(m.stype_out_symbol.as_bytes());
            w.i64(m.start_ts);
            w.i64(m.end_ts);
            pad_to_multiple_of_4(&mut w);
            w.into_bytes()
        }
        Record::System(_, m) => {
            let mut w = ByteWriter::new();
            w.bytes(m.msg.as_bytes());
            w.u8(0);
            if !m.code.is_empty() {
                w.bytes(m.code.as_bytes());
                w.u8(0);
            }
            pad_to_multiple_of_4(&mut w);
            w.into_bytes()
        }
    };

    let total_len = RECORD_HEADER_LEN + body.len();
    if total_len % 4 != 0 {
        return Err(DbnError::record_overrun(format!(
            "encoded record length {total_len} is not a multiple of 4"
        )));
    }
    let length_units = u8::try_from(total_len / 4).map_err(|_| {
        DbnError::record_overrun(format!("record of {total_len} bytes exceeds the 255 * 4 byte limit"))
    })?;

    let mut out_header = header;
    out_header.length_units = length_units;
    out_header.rtype = record.rtype().to_u8();

    transport.write_all(out_header.as_bytes())?;
    transport.write_all(&body)?;
    Ok(())
}

fn pad_to_multiple_of_4(w: &mut ByteWriter) {
    let rem = w.len() % 4;
    if rem != 0 {
        w.zeros(4 - rem);
    }
}
