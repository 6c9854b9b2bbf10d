//! Integration tests for FileWriter.

mod common;

use common::*;
use gribcore::{Error, FileReader, FileWriter, Value, WriteMode};

#[test]
fn test_copy_preserves_bytes() {
    init_logger();
    let file = flux_file();
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("copy.grib2");

    let reader = FileReader::open(file.path()).unwrap();
    let mut writer = FileWriter::open(&output, WriteMode::Truncate).unwrap();
    for record in reader {
        writer.write_message(&mut record.unwrap()).unwrap();
    }
    writer.close().unwrap();

    assert_eq!(std::fs::read(&output).unwrap(), flux_bytes());
}

#[test]
fn test_append_mode() {
    init_logger();
    let messages = flux_messages();
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("append.grib2");

    let mut writer = FileWriter::open(&output, WriteMode::Truncate).unwrap();
    writer.write(&messages[0]).unwrap();
    writer.close().unwrap();

    let mut writer = FileWriter::open(&output, WriteMode::Append).unwrap();
    writer.write(&messages[3]).unwrap();
    writer.close().unwrap();

    let mut reader = FileReader::open(&output).unwrap();
    assert_eq!(reader.message_count().unwrap(), 2);
    assert_eq!(reader.message(2).unwrap().get_by_name("shortName").unwrap(), Value::from("tmin"));

    // truncating starts over
    let mut writer = FileWriter::open(&output, WriteMode::Truncate).unwrap();
    writer.write(&messages[1]).unwrap();
    drop(writer);
    assert_eq!(std::fs::read(&output).unwrap(), messages[1]);
}

#[test]
fn test_write_after_close() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let mut writer = FileWriter::open(dir.path().join("closed.grib2"), WriteMode::Truncate).unwrap();
    writer.close().unwrap();

    assert!(matches!(writer.write(b"GRIB"), Err(Error::ClosedHandle)));
    assert!(matches!(writer.close(), Err(Error::ClosedHandle)));

    let mut record = gribcore::MessageCodec::new().decode(&flux_messages()[0]).unwrap();
    assert!(matches!(writer.write_message(&mut record), Err(Error::ClosedHandle)));
}

#[test]
fn test_unwritable_path() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let result = FileWriter::open(dir.path().join("missing").join("out.grib2"), WriteMode::Truncate);
    assert!(matches!(result, Err(Error::Io(_))));
}
