use std::cell::RefCell;
use std::sync::Mutex;

use anyhow::anyhow;
use command_executor::command::Command;

use crate::proxy_record::ProxyRecord;
use crate::run::RunSegment;
use crate::run_store::RunStore;
use crate::sort::get_tl_config;

/// What one worker thread has spilled: its run store and the runs inside it.
#[derive(Default)]
pub(crate) struct SpilledRuns {
    pub(crate) store: Option<RunStore>,
    pub(crate) segments: Vec<RunSegment>,
    pub(crate) errors: Vec<anyhow::Error>,
}

thread_local! {
    pub(crate) static SPILLED_RUNS: RefCell<SpilledRuns> = RefCell::new(SpilledRuns::default());
}

/// Sorts one full run buffer and appends it to the worker's run store.
pub(crate) struct RunCommand {
    records: Mutex<Vec<ProxyRecord>>,
}

impl RunCommand {
    pub(crate) fn new(records: Vec<ProxyRecord>) -> RunCommand {
        RunCommand {
            records: Mutex::new(records),
        }
    }

    fn spill(&self) -> Result<(), anyhow::Error> {
        let config = get_tl_config()?;
        let mut records = std::mem::take(
            &mut *self.records
                .lock()
                .map_err(|_| anyhow!("run buffer lock poisoned"))?
        );
        records.sort_unstable();
        SPILLED_RUNS.with(
            |spilled_runs| {
                let mut spilled_runs = spilled_runs.borrow_mut();
                let SpilledRuns { store, segments, .. } = &mut *spilled_runs;
                if store.is_none() {
                    *store = Some(RunStore::create(config.tmp(), config.tmp_prefix(), config.tmp_suffix())?);
                }
                let store = store.as_mut().ok_or_else(|| anyhow!("worker has no run store"))?;
                let segment = store.write_run(&records)?;
                log::debug!(
                    "Spilled run of {} records to {}, thread: {}",
                    segment.records(),
                    store.path().display(),
                    std::thread::current().name().unwrap_or("unnamed")
                );
                segments.push(segment);
                Ok::<(), anyhow::Error>(())
            }
        )
    }
}

impl Command for RunCommand {
    fn execute(&self) -> Result<(), anyhow::Error> {
        // failures are handed back with the spilled runs, the pool only sees success
        if let Err(e) = self.spill() {
            log::error!("Failed to spill run: {:#}", e);
            SPILLED_RUNS.with(|spilled_runs| spilled_runs.borrow_mut().errors.push(e));
        }
        Ok(())
    }
}
