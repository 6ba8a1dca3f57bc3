//! Black-box end-to-end tests against the public API only, one per documented scenario.

use dbn::header::{Metadata, WRITE_SYMBOL_WIDTH};
use dbn::reader::RecordDecoder;
use dbn::record::{
    InstrumentDefMsg, OhlcvMsg, Record, RecordHeader, TradeMsg, INSTRUMENT_DEF_RAW_SYMBOL_WIDTH_V2,
    INSTRUMENT_DEF_RAW_SYMBOL_WIDTH_V3,
};
use dbn::transport::{cursor_reader, cursor_writer, WriteTransport};
use dbn::writer::{BulkWriter, FinalizingWriter, WriterOptions};
use dbn_types::{I32le, I64le, SType, Schema, U16le, U32le, U64le};

fn e1_metadata() -> Metadata {
    Metadata {
        version: 3,
        dataset: "XNAS".to_string(),
        schema: Schema::Trades,
        start_ts: 0,
        end_ts: None,
        limit: None,
        stype_in: Some(SType::RawSymbol),
        stype_out: SType::RawSymbol,
        ts_out: false,
        symbol_width: WRITE_SYMBOL_WIDTH,
        symbols: vec!["AAPL".to_string()],
        partial: vec![],
        not_found: vec![],
        mappings: vec![],
    }
}

fn e1_trade() -> Record {
    Record::Trade(
        RecordHeader {
            length_units: 0,
            rtype: 0,
            publisher_id: U16le::new(1),
            instrument_id: U32le::new(12345),
            ts_event: I64le::new(1_700_000_000_000_000_000),
        },
        TradeMsg {
            price: I64le::new(1_005_000_000_000),
            size: U32le::new(100),
            action: b'T',
            side: b'B',
            flags: 0,
            depth: 0,
            ts_recv: I64le::new(1_700_000_000_000_000_000),
            ts_in_delta: I32le::new(0),
            sequence: U32le::new(1),
        },
    )
}

#[test]
fn e1_fresh_write_round_trips_a_trade_and_carries_symbol_width_71() {
    let metadata = e1_metadata();
    let mut w = cursor_writer();
    metadata.write(&mut w).unwrap();
    dbn::record::write_record(&mut w, &e1_trade(), metadata.version).unwrap();
    let bytes = w.into_inner().into_inner();

    assert_eq!(&bytes[0..3], b"DBN");
    assert_eq!(bytes[3], 0x03);
    let metadata_len = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
    let body = &bytes[8..8 + metadata_len];
    // dataset(16) + schema(2) + start_ts(8) + end_ts(8) + limit(8) + stype_in(1) + stype_out(1)
    // + ts_out(1) brings us to the symbol_width field.
    let width_offset = 16 + 2 + 8 + 8 + 8 + 1 + 1 + 1;
    let width = u16::from_le_bytes([body[width_offset], body[width_offset + 1]]);
    assert_eq!(width, 71);

    let reader = cursor_reader(bytes).unwrap();
    let mut decoder = RecordDecoder::new(reader).unwrap();
    assert_eq!(decoder.metadata(), &metadata);
    let records: Vec<_> = (&mut decoder).map(|r| r.unwrap()).collect();
    assert_eq!(records, vec![e1_trade()]);
}

#[test]
fn e2_unknown_type_is_skipped_leaving_only_the_trade() {
    let metadata = e1_metadata();
    let mut w = cursor_writer();
    metadata.write(&mut w).unwrap();
    // length_units=14 -> 56 bytes total; rtype=0xEE; 54 arbitrary trailing bytes.
    w.write_all(&[14, 0xEE]).unwrap();
    w.write_all(&[0x5A; 54]).unwrap();
    dbn::record::write_record(&mut w, &e1_trade(), metadata.version).unwrap();
    let bytes = w.into_inner().into_inner();

    let reader = cursor_reader(bytes).unwrap();
    let mut decoder = RecordDecoder::new(reader).unwrap();
    let records: Vec<_> = (&mut decoder).map(|r| r.unwrap()).collect();
    assert_eq!(records, vec![e1_trade()]);
    assert!(decoder.next().is_none());
}

#[test]
fn e3_callback_engine_unifies_every_ohlcv_cadence() {
    let metadata = Metadata {
        version: 3,
        dataset: "XNAS".to_string(),
        schema: Schema::Ohlcv1S,
        start_ts: 0,
        end_ts: None,
        limit: None,
        stype_in: Some(SType::RawSymbol),
        stype_out: SType::RawSymbol,
        ts_out: false,
        symbol_width: WRITE_SYMBOL_WIDTH,
        symbols: vec![],
        partial: vec![],
        not_found: vec![],
        mappings: vec![],
    };
    let bar = OhlcvMsg {
        open: I64le::new(100_000_000_000),
        high: I64le::new(110_000_000_000),
        low: I64le::new(95_000_000_000),
        close: I64le::new(105_000_000_000),
        volume: U64le::new(1_000),
    };
    let header = |rtype: u8| RecordHeader {
        length_units: 0,
        rtype,
        publisher_id: U16le::new(1),
        instrument_id: U32le::new(1),
        ts_event: I64le::new(1),
    };

    // Two separate one-record files: an OHLCV_1S_MSG file and an OHLCV_1D_MSG file. The same
    // typed reader accepts both because `OhlcvMsg::accepts` unifies every cadence.
    for rtype in [0x20u8, 0x23u8] {
        let mut w = cursor_writer();
        metadata.write(&mut w).unwrap();
        dbn::record::write_record(
            &mut w,
            &match rtype {
                0x20 => Record::Ohlcv1S(header(rtype), bar),
                0x23 => Record::Ohlcv1D(header(rtype), bar),
                _ => unreachable!(),
            },
            metadata.version,
        )
        .unwrap();
        let bytes = w.into_inner().into_inner();

        let reader = cursor_reader(bytes).unwrap();
        let mut typed = dbn::callback::TypedRecordReader::new(reader).unwrap();
        let mut seen = Vec::new();
        typed
            .for_each::<OhlcvMsg, _>(|_, body| {
                seen.push(*body);
                Ok(())
            })
            .unwrap();
        assert_eq!(seen, vec![bar]);
    }
}

#[test]
fn e4_finalizing_writer_rewrites_header_with_observed_range_and_count() {
    let options = WriterOptions {
        version: 3,
        dataset: "XNAS".to_string(),
        schema: Schema::Trades,
        stype_in: Some(SType::RawSymbol),
        stype_out: SType::RawSymbol,
        ts_out: false,
        symbols: vec![],
        partial: vec![],
        not_found: vec![],
        mappings: vec![],
    };
    let transport = cursor_writer();
    let mut writer = FinalizingWriter::with_options(transport, &options).unwrap();

    let trade_at = |ts_event: i64| {
        Record::Trade(
            RecordHeader {
                length_units: 0,
                rtype: 0,
                publisher_id: U16le::new(1),
                instrument_id: U32le::new(1),
                ts_event: I64le::new(ts_event),
            },
            TradeMsg {
                price: I64le::new(1_000_000_000),
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
    };

    writer.write_record(&trade_at(10)).unwrap();
    writer.write_record(&trade_at(30)).unwrap();
    writer.write_record(&trade_at(20)).unwrap();
    let transport = writer.into_inner().unwrap();
    let bytes = transport.into_inner().into_inner();

    let reader = cursor_reader(bytes).unwrap();
    let mut decoder = RecordDecoder::new(reader).unwrap();
    assert_eq!(decoder.metadata().start_ts, 10);
    assert_eq!(decoder.metadata().end_ts, Some(30));
    assert_eq!(decoder.metadata().limit, Some(3));

    let records: Vec<_> = (&mut decoder).map(|r| r.unwrap()).collect();
    let ts_events: Vec<i64> = records.iter().map(|r| r.header().ts_event.get()).collect();
    assert_eq!(ts_events, vec![10, 30, 20]);
}

#[test]
fn e5_compress_shrinks_a_compressible_megabyte_and_round_trips_bit_for_bit() {
    let src = std::env::temp_dir().join(format!(
        "dbn_e2e_e5_src_{}_{:?}.dbn",
        std::process::id(),
        std::thread::current().id()
    ));
    let dst = std::env::temp_dir().join(format!(
        "dbn_e2e_e5_dst_{}_{:?}.dbn.zst",
        std::process::id(),
        std::thread::current().id()
    ));

    let metadata = Metadata {
        version: 3,
        dataset: "XNAS".to_string(),
        schema: Schema::Trades,
        start_ts: 0,
        end_ts: None,
        limit: None,
        stype_in: Some(SType::RawSymbol),
        stype_out: SType::RawSymbol,
        ts_out: false,
        symbol_width: WRITE_SYMBOL_WIDTH,
        symbols: vec![],
        partial: vec![],
        not_found: vec![],
        mappings: vec![],
    };

    let transport = dbn::transport::create_write_file(&src).unwrap();
    let mut writer = BulkWriter::new(transport, &metadata).unwrap();
    // ~56 bytes/record; ~19000 records clears 1 MiB of highly repetitive (compressible) content.
    let mut written = Vec::new();
    for i in 0..19_000i64 {
        let record = Record::Trade(
            RecordHeader {
                length_units: 0,
                rtype: 0,
                publisher_id: U16le::new(1),
                instrument_id: U32le::new(1),
                ts_event: I64le::new(i % 5),
            },
            TradeMsg {
                price: I64le::new(1_000_000_000),
                size: U32le::new(1),
                action: b'T',
                side: b'B',
                flags: 0,
                depth: 0,
                ts_recv: I64le::new(i % 5),
                ts_in_delta: I32le::new(0),
                sequence: U32le::new(1),
            },
        );
        writer.write_record(&record).unwrap();
        written.push(record);
    }
    writer.flush().unwrap();
    drop(writer);

    let src_len = std::fs::metadata(&src).unwrap().len();
    assert!(src_len >= 1024 * 1024, "fixture is {src_len} bytes, expected >= 1 MiB");

    let summary = dbn::compress::compress(&src, &dst, 9, false).unwrap();
    assert!(summary.compressed_size < summary.original_size);

    let reader = dbn::transport::open_read_file(&dst).unwrap();
    let mut decoder = RecordDecoder::new(reader).unwrap();
    let decoded: Vec<_> = (&mut decoder).map(|r| r.unwrap()).collect();
    assert_eq!(decoded, written);

    let _ = std::fs::remove_file(&src);
    let _ = std::fs::remove_file(&dst);
}

fn sample_instrument_def(version: u8, raw_symbol: &str) -> InstrumentDefMsg {
    InstrumentDefMsg {
        ts_recv: 1,
        min_price_increment: 1,
        display_factor: 1,
        expiration: 1,
        activation: 1,
        high_limit_price: 1,
        low_limit_price: 1,
        max_price_variation: 1,
        trading_reference_price: 1,
        unit_of_measure_qty: 1,
        min_price_increment_amount: 1,
        price_ratio: 1,
        strike_price: 1,
        inst_attrib_value: 0,
        underlying_id: 0,
        raw_instrument_id: 0,
        market_depth_implied: 0,
        market_depth: 0,
        market_segment_id: 0,
        max_trade_vol: 0,
        min_lot_size: 0,
        min_lot_size_block: 0,
        min_lot_size_round_lot: 0,
        min_trade_vol: 0,
        contract_multiplier: 0,
        decay_quantity: 0,
        original_contract_size: 0,
        trading_reference_date: 0,
        appl_id: 0,
        maturity_year: 0,
        maturity_month: 0,
        maturity_day: 0,
        maturity_week: 0,
        decay_start_date: 0,
        channel_id: 0,
        currency: "USD".to_string(),
        settl_currency: "USD".to_string(),
        secsubtype: String::new(),
        raw_symbol: raw_symbol.to_string(),
        group: "XNAS".to_string(),
        exchange: "XNAS".to_string(),
        asset: "AAPL".to_string(),
        cfi: String::new(),
        security_type: String::new(),
        unit_of_measure: String::new(),
        underlying: String::new(),
        strike_price_currency: String::new(),
        instrument_class: b'K',
        match_algorithm: 0,
        md_security_trading_status: 0,
        main_fraction: 0,
        price_display_format: 0,
        settl_price_type: 0,
        sub_fraction: 0,
        underlying_product: 0,
        security_update_action: b'A',
        flow_schedule_type: 0,
        tick_rule: 0,
        legs: if version >= 3 {
            Some(dbn::record::InstrumentDefLegs {
                leg_instrument_id: U32le::new(0),
                leg_underlying_id: U32le::new(0),
                leg_index: I32le::new(0),
                leg_side: I32le::new(0),
                leg_instrument_class: I32le::new(0),
                leg_ratio_qty_numerator: I32le::new(0),
                leg_ratio_qty_denominator: I32le::new(0),
                leg_ratio_price_numerator: I32le::new(0),
                leg_ratio_price_denominator: I32le::new(0),
                leg_strike_price_numerator: I32le::new(0),
                leg_strike_price_denominator: I32le::new(0),
                leg_delta_numerator: I32le::new(0),
                leg_delta_denominator: I32le::new(0),
            })
        } else {
            None
        },
    }
}

fn instrument_def_header() -> RecordHeader {
    RecordHeader {
        length_units: 0,
        rtype: 0x13,
        publisher_id: U16le::new(1),
        instrument_id: U32le::new(1),
        ts_event: I64le::new(1),
    }
}

#[test]
fn e6_v2_raw_symbol_decodes_from_19_bytes_and_v3_round_trips_at_22() {
    let v2_def = sample_instrument_def(2, "AAPL");
    assert_eq!(v2_def.legs, None);

    let mut w = cursor_writer();
    dbn::record::write_record(
        &mut w,
        &Record::InstrumentDef(instrument_def_header(), v2_def.clone()),
        2,
    )
    .unwrap();
    let bytes = w.into_inner().into_inner();

    assert_eq!(INSTRUMENT_DEF_RAW_SYMBOL_WIDTH_V2, 19);
    assert_eq!(INSTRUMENT_DEF_RAW_SYMBOL_WIDTH_V3, 22);

    let mut reader = cursor_reader(bytes).unwrap();
    // No metadata header was written above (this is a bare record round-trip through
    // `write_record`/`read_record`), so decode directly rather than through `RecordDecoder`.
    let decoded = dbn::record::read_record(&mut reader, 2).unwrap().unwrap();
    let record = match decoded {
        dbn::record::DecodedRecord::Record(r) => r,
        dbn::record::DecodedRecord::Skipped { .. } => panic!("InstrumentDef rtype must not skip"),
    };
    match &record {
        Record::InstrumentDef(_, m) => assert_eq!(m.raw_symbol, "AAPL"),
        other => panic!("expected InstrumentDef, got {other:?}"),
    }

    // Re-encoding the same logical record at v3 widens raw_symbol's on-disk slot to 22 bytes and
    // exactly round-trips through the v3 layout (NUL-padding is an encoding detail the string
    // accessor already strips, per `ByteReader::fixed_str`).
    let v3_def = sample_instrument_def(3, "AAPL");
    let mut w3 = cursor_writer();
    dbn::record::write_record(
        &mut w3,
        &Record::InstrumentDef(instrument_def_header(), v3_def.clone()),
        3,
    )
    .unwrap();
    let bytes3 = w3.into_inner().into_inner();
    let mut reader3 = cursor_reader(bytes3).unwrap();
    let decoded3 = dbn::record::read_record(&mut reader3, 3).unwrap().unwrap();
    match decoded3 {
        dbn::record::DecodedRecord::Record(Record::InstrumentDef(_, m)) => {
            assert_eq!(m, v3_def);
            assert!(m.legs.is_some());
        }
        _ => panic!("expected a v3 InstrumentDef record"),
    }

    // This crate promises nothing about decoding a v2-framed body as v3 or vice versa: the two
    // layouts differ in width and the v3 layout has no source of the 13 leg fields a v2 record
    // never carried. There is deliberately no cross-version promotion helper to call here.
}
