use std::io::{BufWriter, Write};

/// Writes records in output order, each followed by the output delimiter.
pub(crate) struct RecordWriter<W: Write> {
    writer: BufWriter<W>,
    delimiter: Vec<u8>,
    write_count: u64,
}

impl<W: Write> RecordWriter<W> {
    pub(crate) fn new(writer: W, delimiter: &[u8]) -> RecordWriter<W> {
        RecordWriter {
            writer: BufWriter::new(writer),
            delimiter: delimiter.to_vec(),
            write_count: 0,
        }
    }

    pub(crate) fn write(&mut self, record: &[u8]) -> Result<(), anyhow::Error> {
        self.writer.write_all(record)?;
        self.writer.write_all(&self.delimiter)?;
        self.write_count += 1;
        Ok(())
    }

    /// Flush and return the number of records written.
    pub(crate) fn finish(mut self) -> Result<u64, anyhow::Error> {
        self.writer.flush()?;
        Ok(self.write_count)
    }
}
