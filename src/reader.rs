use std::fs::File;
use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use crate::codec::MessageCodec;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::grib::{peek_indicator, GribError, SECT0_IS_MAGIC, SECT0_IS_SIZE};
use crate::record::{Key, MessageRecord, Value};

const SCAN_CHUNK_SIZE: usize = 64 * 1024;

/// Location of one message in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    offset: u64,
    length: u64,
}

/// Cursor over the messages of a GRIB file.
///
/// Position 0 is before the first message, position `n` is at message `n`. Messages are
/// delimited lazily from their indicator section and every read decodes afresh.
#[derive(Debug)]
pub struct FileReader {
    path: PathBuf,
    file: Option<BufReader<File>>,
    file_len: u64,
    spans: Vec<Span>,
    scanned_to: u64,
    scan_complete: bool,
    position: usize,
    stalled_at: Option<usize>,
    skip_garbage: bool,
    codec: MessageCodec,
}

impl FileReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(path, &Config::default())
    }

    pub fn open_with_config(path: impl AsRef<Path>, config: &Config) -> Result<Self> {
        Self::open_with_codec(path, MessageCodec::with_config(config), config.reader.skip_garbage)
    }

    pub fn open_with_codec(path: impl AsRef<Path>, codec: MessageCodec, skip_garbage: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::FileNotFound { path: path.clone() },
            _ => Error::Io(e),
        })?;
        let file_len = file.metadata()?.len();

        debug!("Opened {} ({} octets)", path.display(), file_len);

        Ok(Self {
            path,
            file: Some(BufReader::new(file)),
            file_len,
            spans: Vec::new(),
            scanned_to: 0,
            scan_complete: false,
            position: 0,
            stalled_at: None,
            skip_garbage,
            codec,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decodes the message after the cursor and moves onto it.
    ///
    /// Past the last message this fails with [`Error::EndOfFile`] and leaves the cursor alone.
    /// A message that cannot be decoded still moves the cursor.
    pub fn next_message(&mut self) -> Result<MessageRecord> {
        self.check_open()?;
        let target = self.position + 1;
        match self.span(target)? {
            Some(span) => {
                self.position = target;
                self.decode(target, span)
            }
            None => Err(Error::EndOfFile { position: self.position }),
        }
    }

    /// Decodes message `n` (1-based) and moves the cursor onto it.
    pub fn message(&mut self, n: usize) -> Result<MessageRecord> {
        self.check_open()?;
        let span = match n {
            0 => None,
            n => self.span(n)?,
        };
        match span {
            Some(span) => {
                self.position = n;
                self.stalled_at = None;
                self.decode(n, span)
            }
            None => Err(Error::OutOfRange { requested: n, count: self.message_count()? }),
        }
    }

    /// Decodes up to `n` messages after the cursor.
    pub fn read(&mut self, n: usize) -> Result<Vec<MessageRecord>> {
        let mut records = Vec::with_capacity(n);
        for _ in 0..n {
            match self.next_message() {
                Ok(record) => records.push(record),
                Err(Error::EndOfFile { .. }) => break,
                Err(e) => return Err(e),
            }
        }
        Ok(records)
    }

    pub fn rewind(&mut self) -> Result<()> {
        self.seek(0)
    }

    /// Moves the cursor to position `n` without decoding.
    pub fn seek(&mut self, n: usize) -> Result<()> {
        self.check_open()?;
        if n > 0 && self.span(n)?.is_none() {
            return Err(Error::OutOfRange { requested: n, count: self.message_count()? });
        }
        self.position = n;
        self.stalled_at = None;
        Ok(())
    }

    pub fn tell(&self) -> Result<usize> {
        self.check_open()?;
        Ok(self.position)
    }

    pub fn message_count(&mut self) -> Result<usize> {
        self.check_open()?;
        while self.scan_next()?.is_some() {}
        Ok(self.spans.len())
    }

    /// Every message whose attributes equal all of `criteria`; the cursor does not move.
    ///
    /// Integer and float values compare numerically.
    pub fn select(&mut self, criteria: &[(&str, Value)]) -> Result<Vec<MessageRecord>> {
        let criteria = criteria.iter()
            .map(|(key, value)| Ok((key.parse::<Key>()?, value)))
            .collect::<Result<Vec<_>>>()?;

        let count = self.message_count()?;
        let mut selected = Vec::new();
        for n in 1..=count {
            let span = self.spans[n - 1];
            let record = self.decode(n, span)?;
            let matches = criteria.iter().all(|(key, expected)| {
                record.get(*key).map_or(false, |actual| same_value(&actual, expected))
            });
            if matches {
                selected.push(record);
            }
        }

        debug!("Selected {} of {} messages in {}", selected.len(), count, self.path.display());
        Ok(selected)
    }

    /// Releases the file; every later call fails with [`Error::ClosedHandle`].
    pub fn close(&mut self) -> Result<()> {
        self.check_open()?;
        self.file = None;
        debug!("Closed {}", self.path.display());
        Ok(())
    }

    fn check_open(&self) -> Result<()> {
        match self.file {
            Some(_) => Ok(()),
            None => Err(Error::ClosedHandle),
        }
    }

    fn file(&mut self) -> Result<&mut BufReader<File>> {
        self.file.as_mut().ok_or(Error::ClosedHandle)
    }

    fn decode(&mut self, index: usize, span: Span) -> Result<MessageRecord> {
        let mut bytes = vec![0; span.length as usize];
        let file = self.file()?;
        file.seek(SeekFrom::Start(span.offset))?;
        file.read_exact(&mut bytes)?;
        self.codec.decode_at(&bytes, index, span.offset)
    }

    /// Span of message `n`, scanning forward as far as needed.
    fn span(&mut self, n: usize) -> Result<Option<Span>> {
        while self.spans.len() < n {
            if self.scan_next()?.is_none() {
                return Ok(None);
            }
        }
        Ok(self.spans.get(n - 1).copied())
    }

    /// Delimits the message following the last known one.
    fn scan_next(&mut self) -> Result<Option<Span>> {
        while !self.scan_complete {
            let index = self.spans.len() + 1;
            let offset = match self.find_magic(self.scanned_to)? {
                Some(offset) => offset,
                None => {
                    self.scan_complete = true;
                    break;
                }
            };
            if offset > self.scanned_to {
                if !self.skip_garbage {
                    return Err(malformed(index, self.scanned_to, "octets between messages do not start with GRIB"));
                }
                warn!("Skipped {} octets before offset {} in {}", offset - self.scanned_to, offset, self.path.display());
            }

            if self.file_len - offset < SECT0_IS_SIZE as u64 {
                return Err(malformed(index, offset, "indicator section runs past the end of the file"));
            }
            let mut indicator = [0; SECT0_IS_SIZE];
            let file = self.file()?;
            file.seek(SeekFrom::Start(offset))?;
            file.read_exact(&mut indicator)?;

            let length = match peek_indicator(&indicator) {
                Ok((_, length)) => length,
                Err(source) if self.skip_garbage => {
                    warn!("Ignored GRIB marker at offset {}: {}", offset, source);
                    self.scanned_to = offset + 1;
                    continue;
                }
                Err(source) => return Err(Error::Decode { index, offset, source }),
            };
            if length < SECT0_IS_SIZE as u64 || length > self.file_len - offset {
                return Err(malformed(index, offset, format!("declared length {} runs past the end of the file", length)));
            }

            let span = Span { offset, length };
            debug!("Message {} at offset {} ({} octets)", index, offset, length);
            self.spans.push(span);
            self.scanned_to = offset + length;
            return Ok(Some(span));
        }
        Ok(None)
    }

    /// Offset of the next `GRIB` marker at or after `from`. Without garbage skipping only
    /// `from` itself is looked at, and any other content is reported as found there.
    fn find_magic(&mut self, from: u64) -> Result<Option<u64>> {
        if from >= self.file_len {
            return Ok(None);
        }
        let skip_garbage = self.skip_garbage;
        let file = self.file()?;
        file.seek(SeekFrom::Start(from))?;

        if !skip_garbage {
            let mut magic = [0; 4];
            let n = file.read(&mut magic)?;
            return Ok(if n == magic.len() && magic[..] == *SECT0_IS_MAGIC { Some(from) } else { Some(from + 1) });
        }

        let mut offset = from;
        let mut window = Vec::with_capacity(SCAN_CHUNK_SIZE + SECT0_IS_MAGIC.len());
        let mut chunk = vec![0; SCAN_CHUNK_SIZE];
        loop {
            let n = file.read(&mut chunk)?;
            if n == 0 {
                return Ok(None);
            }
            window.extend_from_slice(&chunk[..n]);
            if let Some(i) = window.windows(SECT0_IS_MAGIC.len()).position(|w| w == SECT0_IS_MAGIC) {
                return Ok(Some(offset + i as u64));
            }
            let keep = window.len().min(SECT0_IS_MAGIC.len() - 1);
            let drained = window.len() - keep;
            window.drain(..drained);
            offset += drained as u64;
        }
    }
}

fn malformed(index: usize, offset: u64, reason: impl ToString) -> Error {
    Error::Decode { index, offset, source: GribError::MalformedMessage(reason.to_string()) }
}

fn same_value(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Text(a), Value::Text(b)) => a == b,
        (a, b) => matches!((a.as_float(), b.as_float()), (Some(a), Some(b)) if a == b),
    }
}

/// Yields the messages after the cursor; a message failing to decode is yielded as an
/// error and iteration goes on with the next one. A closed reader yields
/// [`Error::ClosedHandle`] once.
impl Iterator for FileReader {
    type Item = Result<MessageRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.stalled_at == Some(self.position) {
            return None;
        }
        let position = self.position;
        match self.next_message() {
            Err(Error::EndOfFile { .. }) => None,
            Err(e) if self.position == position => {
                // closed, or the next message could not even be delimited
                self.stalled_at = Some(position);
                Some(Err(e))
            }
            result => Some(result),
        }
    }
}
