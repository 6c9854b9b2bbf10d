//! Integration tests for MessageCodec on inconsistent or truncated headers.

mod common;

use common::*;
use gribcore::grib::GribError;
use gribcore::{Error, FileReader, MessageCodec, Value};

/// Offsets of Ni and Nj in a message built by `MessageBuilder::regular_ll`
const NI_OFFSET: usize = 67;
const NJ_OFFSET: usize = 71;

fn assert_malformed(bytes: &[u8]) {
    match MessageCodec::new().decode(bytes) {
        Err(Error::Decode { index: 1, offset: 0, source: GribError::MalformedMessage(_) }) => {}
        other => panic!("expected a malformed message, got {:?}", other.map(|r| r.values().shape())),
    }
}

fn indicator_only(length: u64) -> Vec<u8> {
    let mut bytes = b"GRIB\0\0\0\x02".to_vec();
    bytes.extend_from_slice(&length.to_be_bytes());
    bytes.resize(length as usize, 0);
    bytes
}

#[test]
fn test_column_major_grid_larger_than_num_points() {
    init_logger();
    let mut bytes = MessageBuilder::regular_ll(2, 2, 0, 0)
        .with_scanning_mode(0x20)
        .with_values(vec![1.0, 2.0, 3.0, 4.0])
        .build();
    MessageCodec::new().decode(&bytes).unwrap();

    bytes[NJ_OFFSET..NJ_OFFSET + 4].copy_from_slice(&3u32.to_be_bytes());
    assert_malformed(&bytes);
}

#[test]
fn test_row_major_grid_disagreeing_with_num_points() {
    init_logger();
    let bytes = MessageBuilder::regular_ll(3, 2, 0, 0).with_fn(|j, i| (j * 3 + i) as f64).build();

    let mut larger = bytes.clone();
    larger[NI_OFFSET..NI_OFFSET + 4].copy_from_slice(&4u32.to_be_bytes());
    assert_malformed(&larger);

    let mut smaller = bytes;
    smaller[NJ_OFFSET..NJ_OFFSET + 4].copy_from_slice(&1u32.to_be_bytes());
    assert_malformed(&smaller);
}

#[test]
fn test_no_room_for_end_section() {
    init_logger();
    for length in 17..20 {
        assert_malformed(&indicator_only(length));
    }
    // nothing but the indicator
    assert_malformed(&indicator_only(16));
}

#[test]
fn test_reader_survives_short_message() {
    init_logger();
    let messages = flux_messages();
    let bytes = [indicator_only(18), messages[1].clone()].concat();
    let file = write_temp(&bytes);
    let mut reader = FileReader::open(file.path()).unwrap();

    assert!(matches!(
        reader.next_message(),
        Err(Error::Decode { index: 1, offset: 0, source: GribError::MalformedMessage(_) })
    ));
    assert_eq!(reader.next_message().unwrap().get_by_name("shortName").unwrap(), Value::from("sp"));
}

#[test]
fn test_constant_field_with_inflated_value_count() {
    init_logger();
    let mut bytes = MessageBuilder::regular_ll(3, 2, 0, 0).with_values(vec![273.0; 6]).build();
    let sect5 = find_section(&bytes, 5);
    bytes[sect5 + 5..sect5 + 9].copy_from_slice(&0xFFFF_FFF0u32.to_be_bytes());

    assert_malformed(&bytes);
}

#[test]
fn test_bitmap_field_with_more_values_than_points() {
    init_logger();
    let values = vec![
        1.0, 2.0, f64::NAN, 4.0,
        5.0, 6.0, 7.0, 8.0,
        9.0, 10.0, 11.0, 12.0,
    ];
    let mut bytes = MessageBuilder::regular_ll(4, 3, 0, 0).with_values(values).build();
    let record = MessageCodec::new().decode(&bytes).unwrap();
    assert_eq!(record.get_by_name("numberOfValues").unwrap(), Value::from(11));

    let sect5 = find_section(&bytes, 5);
    bytes[sect5 + 5..sect5 + 9].copy_from_slice(&13u32.to_be_bytes());
    assert_malformed(&bytes);
}
