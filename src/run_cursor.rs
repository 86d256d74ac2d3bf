use std::cmp::Ordering;

use crate::proxy_record::ProxyRecord;
use crate::run::Run;
use crate::run_store::RunReader;

/// Merge-side view of a run: the record at the head and a reader for the rest.
pub(crate) struct RunCursor {
    run: Run,
    reader: RunReader,
    position: u64,
    head: ProxyRecord,
}

impl RunCursor {
    /// Cursor positioned at the first record of `run`, `None` for an empty run.
    pub(crate) fn new(run: Run) -> Result<Option<RunCursor>, anyhow::Error> {
        let start = run.segment().start();
        if start >= run.segment().end() {
            return Ok(None);
        }
        let mut reader = run.store().reader()?;
        let mut head = ProxyRecord::default();
        let consumed = reader.read(start, &mut head)?;
        Ok(
            Some(
                RunCursor {
                    run,
                    reader,
                    position: start + consumed,
                    head,
                }
            )
        )
    }

    pub(crate) fn head(&self) -> &ProxyRecord {
        &self.head
    }

    /// Move to the next record. Returns false when the run is exhausted.
    pub(crate) fn advance(&mut self) -> Result<bool, anyhow::Error> {
        if self.position >= self.run.segment().end() {
            return Ok(false);
        }
        let consumed = self.reader.read(self.position, &mut self.head)?;
        self.position += consumed;
        Ok(true)
    }
}

impl Eq for RunCursor {}

impl PartialEq<Self> for RunCursor {
    fn eq(&self, other: &Self) -> bool {
        self.head.eq(&other.head)
    }
}

impl PartialOrd<Self> for RunCursor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RunCursor {
    // flipped so that BinaryHeap (a max heap) pops the smallest head first
    fn cmp(&self, other: &Self) -> Ordering {
        other.head.cmp(&self.head)
    }
}
