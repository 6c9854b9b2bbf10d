use std::sync::Arc;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::grib::{GribError, Message};
use crate::grib::sections::sect5::DataRepresentationDefinition;
use crate::grib::sections::sect6::BitMap;
use crate::record::MessageRecord;
use crate::tables::ParameterTable;

/// Decodes single GRIB2 messages into [`MessageRecord`]s and encodes them back.
///
/// Holds only immutable options, so one codec can be cloned into every reader
/// and shared across threads.
#[derive(Debug, Clone)]
pub struct MessageCodec {
    tables: Arc<ParameterTable>,
    default_bits_per_value: usize,
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self::with_config(&Config::default())
    }
}

impl MessageCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: &Config) -> Self {
        Self {
            tables: Arc::new(ParameterTable::with_parameters(&config.parameters)),
            default_bits_per_value: config.packing.default_bits_per_value,
        }
    }

    pub fn tables(&self) -> &ParameterTable {
        &self.tables
    }

    /// Decodes one standalone message; the record gets index 1.
    pub fn decode(&self, bytes: &[u8]) -> Result<MessageRecord> {
        self.decode_at(bytes, 1, 0)
    }

    pub(crate) fn decode_at(&self, bytes: &[u8], index: usize, offset: u64) -> Result<MessageRecord> {
        let (message, values) = Message::from_bytes(bytes)
            .map_err(|source| Error::Decode { index, offset, source })?;

        debug!("Decoded message {} ({} octets, grid {:?})", index, bytes.len(), values.shape());

        Ok(MessageRecord::new(index, message, values, bytes.to_vec(), self.clone()))
    }

    /// Serializes `record` from its current state; unmodified records give back their original bytes.
    pub fn encode(&self, record: &MessageRecord) -> Result<Vec<u8>> {
        match record.cached_bytes() {
            Some(bytes) => Ok(bytes.to_vec()),
            None => {
                let (bytes, _, _) = self.pack(record)?;
                Ok(bytes)
            }
        }
    }

    pub(crate) fn pack(&self, record: &MessageRecord) -> Result<(Vec<u8>, DataRepresentationDefinition, BitMap)> {
        record.message()
            .to_bytes(record.values(), self.default_bits_per_value)
            .map_err(|source| match source {
                GribError::InvalidAttribute { key, reason } => Error::InvalidAttribute { key, reason },
                source => Error::Encode { index: record.index(), source },
            })
    }
}
