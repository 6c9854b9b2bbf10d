use std::path::PathBuf;
use crate::grib;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("FileNotFound: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),

    #[error("ClosedHandle: the file handle was closed")]
    ClosedHandle,

    #[error("EndOfFile: no message after position {position}")]
    EndOfFile { position: usize },

    #[error("OutOfRange: message {requested} requested, file holds {count}")]
    OutOfRange { requested: usize, count: usize },

    #[error("DecodeError: message {index} at offset {offset}: {source}")]
    Decode {
        index: usize,
        offset: u64,
        #[source]
        source: grib::GribError,
    },

    #[error("EncodeError: message {index}: {source}")]
    Encode {
        index: usize,
        #[source]
        source: grib::GribError,
    },

    #[error("InvalidAttribute: `{key}`: {reason}")]
    InvalidAttribute { key: String, reason: String },

    #[error("UnknownAttributeKey: `{key}`")]
    UnknownAttributeKey { key: String },

    #[error("MissingAttribute: message {index} has no `{key}`")]
    MissingAttribute { key: String, index: usize },

    #[error("UnsupportedGridType: {0}")]
    UnsupportedGridType(String),

    #[error("ConfigError: {0}")]
    Config(#[from] confy::ConfyError),

    #[error("YamlError: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    pub(crate) fn invalid(key: impl ToString, reason: impl ToString) -> Self {
        Error::InvalidAttribute { key: key.to_string(), reason: reason.to_string() }
    }
}
