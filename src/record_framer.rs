use crate::error::SortError;
use crate::input_cache::InputCache;

/// Location of one logical record in its source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Frame {
    pub(crate) record_number: u64,
    pub(crate) offset: u64,
    pub(crate) length: usize,
    pub(crate) terminated: bool,
}

/// Splits the bytes of an [InputCache] into records ending with a delimiter of any length.
///
/// Record numbers count every record framed by this framer, so reading several inputs through one
/// framer numbers them in arrival order.
pub(crate) struct RecordFramer {
    delimiter: Vec<u8>,
    records: u64,
}

impl RecordFramer {
    pub(crate) fn new(delimiter: &[u8]) -> Result<RecordFramer, SortError> {
        if delimiter.is_empty() {
            return Err(SortError::config("record delimiter is empty"));
        }
        Ok(
            RecordFramer {
                delimiter: delimiter.to_vec(),
                records: 0,
            }
        )
    }

    /// Read the next record into `record`, without its delimiter. Returns `None` at end of input.
    pub(crate) fn read(&mut self, cache: &mut InputCache, record: &mut Vec<u8>) -> Result<Option<Frame>, anyhow::Error> {
        record.clear();
        let offset = cache.position();
        let mut matched = 0;
        while let Some(b) = cache.read_next_byte()? {
            if self.delimiter[matched] == b {
                matched += 1;
                if matched == self.delimiter.len() {
                    return Ok(Some(self.frame(offset, record.len(), true)));
                }
            } else {
                // bytes that looked like a delimiter but were not go back to the record
                record.extend_from_slice(&self.delimiter[..matched]);
                matched = 0;
                record.push(b);
            }
        }
        // a partial delimiter at end of input is dropped
        if record.is_empty() {
            return Ok(None);
        }
        log::warn!(
            "Assuming a record delimiter at end of {} where {} unterminated bytes were found",
            cache.name(),
            record.len()
        );
        Ok(Some(self.frame(offset, record.len(), false)))
    }

    fn frame(&mut self, offset: u64, length: usize, terminated: bool) -> Frame {
        let record_number = self.records;
        self.records += 1;
        Frame { record_number, offset, length, terminated }
    }
}
