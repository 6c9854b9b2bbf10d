#[macro_use]
extern crate log;

pub mod codec;
pub mod config;
pub mod error;
pub mod field;
pub mod grib;
pub mod grid;
pub mod reader;
pub mod record;
pub mod stamp;
pub mod tables;
pub mod writer;

pub use codec::MessageCodec;
pub use config::Config;
pub use error::{Error, Result};
pub use field::Field;
pub use reader::FileReader;
pub use record::{Key, MessageRecord, Value};
pub use writer::{FileWriter, WriteMode};

/// Opens a GRIB file for reading, positioned before its first message.
pub fn open(path: impl AsRef<std::path::Path>) -> Result<FileReader> {
    FileReader::open(path)
}
