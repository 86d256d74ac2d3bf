/// Counters reported by a completed sort
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SortStatistics {
    pub(crate) records_read: u64,
    pub(crate) records_written: u64,
    pub(crate) spilled_runs: u64,
    pub(crate) intermediate_merges: u64,
}

impl SortStatistics {
    /// Records framed from the inputs, ignored records included.
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    /// Records written to the output.
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Runs sorted and spilled to run stores. Zero when the input fit into one in-memory run.
    pub fn spilled_runs(&self) -> u64 {
        self.spilled_runs
    }

    /// Merges of spilled runs into intermediate runs, needed when the runs outnumber the fan-in.
    pub fn intermediate_merges(&self) -> u64 {
        self.intermediate_merges
    }
}
