use std::cmp::Ordering;
use std::rc::Rc;

use crate::run_store::RunStore;

/// Byte range of one sorted run inside a run store
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct RunSegment {
    start: u64,
    end: u64,
    records: u64,
}

impl RunSegment {
    pub(crate) fn new(start: u64, end: u64, records: u64) -> RunSegment {
        RunSegment {
            start,
            end,
            records,
        }
    }

    pub(crate) fn start(&self) -> u64 {
        self.start
    }

    pub(crate) fn end(&self) -> u64 {
        self.end
    }

    pub(crate) fn records(&self) -> u64 {
        self.records
    }
}

/// A spilled run. The store is shared by every run written to it and is deleted with the last one.
pub(crate) struct Run {
    store: Rc<RunStore>,
    segment: RunSegment,
}

impl Run {
    pub(crate) fn new(store: Rc<RunStore>, segment: RunSegment) -> Run {
        Run {
            store,
            segment,
        }
    }

    pub(crate) fn store(&self) -> &RunStore {
        &self.store
    }

    pub(crate) fn segment(&self) -> &RunSegment {
        &self.segment
    }
}

impl Eq for Run {}

impl PartialEq<Self> for Run {
    fn eq(&self, other: &Self) -> bool {
        self.segment.records.eq(&other.segment.records)
    }
}

impl PartialOrd<Self> for Run {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Run {
    fn cmp(&self, other: &Self) -> Ordering {
        self.segment.records.cmp(&other.segment.records)
    }
}
