use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use crate::error::{Error, Result};
use crate::record::MessageRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Start from an empty file
    Truncate,
    /// Keep the existing messages and add after them
    Append,
}

/// Appends encoded messages to a file. Bytes are written as given, without validation.
#[derive(Debug)]
pub struct FileWriter {
    path: PathBuf,
    file: Option<BufWriter<File>>,
}

impl FileWriter {
    pub fn open(path: impl AsRef<Path>, mode: WriteMode) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut options = OpenOptions::new();
        match mode {
            WriteMode::Truncate => options.write(true).create(true).truncate(true),
            WriteMode::Append => options.append(true).create(true),
        };
        let file = options.open(&path)?;

        debug!("Opened {} for writing ({:?})", path.display(), mode);

        Ok(Self { path, file: Some(BufWriter::new(file)) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let file = self.file.as_mut().ok_or(Error::ClosedHandle)?;
        file.write_all(bytes)?;
        Ok(())
    }

    /// Encodes `record` from its current state and appends it.
    pub fn write_message(&mut self, record: &mut MessageRecord) -> Result<()> {
        if self.file.is_none() {
            return Err(Error::ClosedHandle);
        }
        let index = record.index();
        let bytes = record.to_bytes()?;
        debug!("Writing message {} ({} octets) to {}", index, bytes.len(), self.path.display());
        let file = self.file.as_mut().ok_or(Error::ClosedHandle)?;
        file.write_all(bytes)?;
        Ok(())
    }

    /// Flushes and releases the file; every later call fails with [`Error::ClosedHandle`].
    pub fn close(&mut self) -> Result<()> {
        let mut file = self.file.take().ok_or(Error::ClosedHandle)?;
        file.flush()?;
        debug!("Closed {}", self.path.display());
        Ok(())
    }
}

impl Drop for FileWriter {
    fn drop(&mut self) {
        if let Some(file) = self.file.as_mut() {
            if let Err(e) = file.flush() {
                warn!("Failed to flush {} : {}", self.path.display(), e);
            }
        }
    }
}
