use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use tempfile::Builder;

use crate::proxy_record::ProxyRecord;
use crate::run::RunSegment;

/// source (4), record number (8), offset (8), length (4), key length (4)
pub(crate) const RECORD_HEADER_SIZE: usize = 28;
pub(crate) const WRITE_BUFFER_SIZE: usize = 32768;

/// Temp file holding proxy records back to back.
///
/// Records are appended through a write buffer and read back by the byte offset [RunStore::write]
/// returned for them. The file is removed when the store is dropped.
pub(crate) struct RunStore {
    path: PathBuf,
    file: Option<File>,
    write_buffer: Vec<u8>,
    write_position: u64,
    records: u64,
}

impl RunStore {
    pub(crate) fn create(dir: &Path, prefix: &str, suffix: &str) -> Result<RunStore, anyhow::Error> {
        let (file, path) = Builder::new()
            .prefix(prefix)
            .suffix(suffix)
            .tempfile_in(dir)
            .with_context(|| anyhow!("Failed to create run store in {}", dir.display()))?
            .keep()
            .with_context(|| anyhow!("Failed to persist run store in {}", dir.display()))?;
        log::debug!("Opened run store {}, buffer size is {} bytes", path.display(), WRITE_BUFFER_SIZE);
        Ok(
            RunStore {
                path,
                file: Some(file),
                write_buffer: Vec::with_capacity(WRITE_BUFFER_SIZE),
                write_position: 0,
                records: 0,
            }
        )
    }

    pub(crate) fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Bytes written so far, buffered bytes included.
    pub(crate) fn position(&self) -> u64 {
        self.write_position
    }

    /// Append `record`, returning the offset it can be read back from.
    pub(crate) fn write(&mut self, record: &ProxyRecord) -> Result<u64, anyhow::Error> {
        let size = RECORD_HEADER_SIZE + record.key.len();
        if !self.write_buffer.is_empty() && self.write_buffer.len() + size > WRITE_BUFFER_SIZE {
            self.flush_writes()?;
        }
        let key_length = u32::try_from(record.key.len())
            .with_context(|| anyhow!("key of record {} is {} bytes long", record.record_number, record.key.len()))?;
        self.write_buffer.extend_from_slice(&record.source.to_be_bytes());
        self.write_buffer.extend_from_slice(&record.record_number.to_be_bytes());
        self.write_buffer.extend_from_slice(&record.offset.to_be_bytes());
        self.write_buffer.extend_from_slice(&record.length.to_be_bytes());
        self.write_buffer.extend_from_slice(&key_length.to_be_bytes());
        self.write_buffer.extend_from_slice(&record.key);

        let starting_position = self.write_position;
        self.write_position += size as u64;
        self.records += 1;
        // a record larger than the buffer goes straight to the file
        if self.write_buffer.len() >= WRITE_BUFFER_SIZE {
            self.flush_writes()?;
        }
        Ok(starting_position)
    }

    /// Append already sorted records as one contiguous run.
    pub(crate) fn write_run(&mut self, records: &[ProxyRecord]) -> Result<RunSegment, anyhow::Error> {
        let start = self.write_position;
        for record in records {
            self.write(record)?;
        }
        Ok(RunSegment::new(start, self.write_position, records.len() as u64))
    }

    /// Read the record starting at `position` into `record`. Returns the number of bytes consumed.
    pub(crate) fn read(&mut self, position: u64, record: &mut ProxyRecord) -> Result<u64, anyhow::Error> {
        if !self.write_buffer.is_empty() {
            self.flush_writes()?;
        }
        let path = &self.path;
        let file = self.file.as_mut().ok_or_else(|| anyhow!("run store {} is closed", path.display()))?;
        file.seek(SeekFrom::Start(position))?;
        read_record(file, record).with_context(|| anyhow!("run store: {}, position: {}", path.display(), position))
    }

    /// Independent sequential reader. All writes must be flushed.
    pub(crate) fn reader(&self) -> Result<RunReader, anyhow::Error> {
        if !self.write_buffer.is_empty() {
            return Err(anyhow!("run store {} has unflushed writes", self.path.display()));
        }
        RunReader::open(&self.path)
    }

    /// Flush buffered records and release the write handle.
    pub(crate) fn close(&mut self) -> Result<(), anyhow::Error> {
        if !self.write_buffer.is_empty() {
            self.flush_writes()?;
        }
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }
        // only show the statistic when the store has been written to
        if self.write_position > 0 {
            log::debug!("{} bytes, {} records in run store {}", self.write_position, self.records, self.path.display());
        }
        log::debug!("Closed run store {}", self.path.display());
        Ok(())
    }

    fn flush_writes(&mut self) -> Result<(), anyhow::Error> {
        let flushed = self.write_position - self.write_buffer.len() as u64;
        let path = &self.path;
        let file = self.file.as_mut().ok_or_else(|| anyhow!("run store {} is closed", path.display()))?;
        file.seek(SeekFrom::Start(flushed))?;
        file.write_all(&self.write_buffer)
            .with_context(|| anyhow!("run store: {}", path.display()))?;
        self.write_buffer.clear();
        Ok(())
    }
}

impl Drop for RunStore {
    fn drop(&mut self) {
        self.file.take();
        match std::fs::remove_file(&self.path) {
            Ok(()) => log::debug!("Deleted run store {}", self.path.display()),
            Err(e) => log::warn!("Failed to delete run store {}: {}", self.path.display(), e),
        }
    }
}

/// Buffered reader over a finished [RunStore]. Seeks only when asked for a position other than
/// the one following the previous record.
pub(crate) struct RunReader {
    path: PathBuf,
    reader: BufReader<File>,
    position: u64,
}

impl RunReader {
    fn open(path: &Path) -> Result<RunReader, anyhow::Error> {
        let file = File::open(path).with_context(|| anyhow!("path: {}", path.display()))?;
        Ok(
            RunReader {
                path: path.to_path_buf(),
                reader: BufReader::new(file),
                position: 0,
            }
        )
    }

    pub(crate) fn read(&mut self, position: u64, record: &mut ProxyRecord) -> Result<u64, anyhow::Error> {
        if position != self.position {
            self.reader.seek(SeekFrom::Start(position))?;
        }
        let consumed = read_record(&mut self.reader, record)
            .with_context(|| anyhow!("run store: {}, position: {}", self.path.display(), position))?;
        self.position = position + consumed;
        Ok(consumed)
    }
}

fn read_record<R: Read>(reader: &mut R, record: &mut ProxyRecord) -> Result<u64, std::io::Error> {
    let mut header = [0u8; RECORD_HEADER_SIZE];
    reader.read_exact(&mut header)?;
    record.source = u32::from_be_bytes(be_bytes(&header[0..4]));
    record.record_number = u64::from_be_bytes(be_bytes(&header[4..12]));
    record.offset = u64::from_be_bytes(be_bytes(&header[12..20]));
    record.length = u32::from_be_bytes(be_bytes(&header[20..24]));
    let key_length = u32::from_be_bytes(be_bytes(&header[24..28])) as usize;
    record.key.resize(key_length, 0);
    reader.read_exact(&mut record.key)?;
    Ok((RECORD_HEADER_SIZE + key_length) as u64)
}

fn be_bytes<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut result = [0u8; N];
    result.copy_from_slice(bytes);
    result
}
