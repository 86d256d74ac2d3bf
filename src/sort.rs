use std::cell::RefCell;
use std::cmp::{max, min, Reverse};
use std::collections::binary_heap::PeekMut;
use std::collections::BinaryHeap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::thread;

use anyhow::{anyhow, Context};
use command_executor::shutdown_mode::ShutdownMode;
use command_executor::thread_pool::ThreadPool;
use command_executor::thread_pool_builder::ThreadPoolBuilder;
use regex::bytes::Regex;
use rlimit::{getrlimit, Resource, setrlimit};
use tempfile::Builder;

use crate::config::Config;
use crate::error::SortError;
use crate::input_cache::InputCache;
use crate::key::KeyChain;
use crate::key_part::KeyPart;
use crate::key_type::KeyType;
use crate::proxy_record::ProxyRecord;
use crate::record_framer::RecordFramer;
use crate::record_writer::RecordWriter;
use crate::run::{Run, RunSegment};
use crate::run_command::{RunCommand, SpilledRuns, SPILLED_RUNS};
use crate::run_cursor::RunCursor;
use crate::run_store::{RunStore, RECORD_HEADER_SIZE};
use crate::statistics::SortStatistics;

thread_local! {
    pub(crate) static CONFIG: RefCell<Option<Config>> = RefCell::new(None);
}

pub(crate) fn get_tl_config() -> Result<Config, anyhow::Error> {
    CONFIG.with(|config| config.borrow().clone())
        .ok_or_else(|| anyhow!("No sort configuration, thread: {}", thread::current().name().unwrap_or("unnamed")))
}

enum GeneratedRuns {
    InMemory(Vec<ProxyRecord>),
    Spilled,
}

/// Sort record files larger than memory
///
/// Records are framed by a delimiter, keyed by a sequence of [KeyPart]s and sorted by the encoded
/// keys. Only a compact proxy of each record (its key and where it lives) is sorted and spilled
/// to disk; the original bytes are read again from the inputs when the output is written.
///
/// # Examples
/// ```
/// use std::path::PathBuf;
/// use funnel_sort::direction::Direction;
/// use funnel_sort::key_part::KeyPart;
/// use funnel_sort::key_type::KeyType;
/// use funnel_sort::sort::Sort;
///
/// // sort CRLF terminated records by a zip code in the first five bytes, newest date first
/// // for equal zip codes, and write them with LF endings
/// fn sort_records(input: PathBuf, output: PathBuf, tmp: PathBuf) -> Result<(), anyhow::Error> {
///     let mut funnel_sort = Sort::new(vec![input], output);
///     funnel_sort.add_key_part(KeyPart::new(0, KeyType::Integer).with_offset(0).with_length(5));
///     funnel_sort.add_key_part(
///         KeyPart::new(0, KeyType::Date)
///             .with_offset(6)
///             .with_length(10)
///             .with_direction(Direction::Desc)
///     );
///     funnel_sort.with_record_delimiter(b"\r\n");
///     funnel_sort.with_output_delimiter(b"\n");
///     // set the directory for run stores. The default is the system temp dir -
///     // std::env::temp_dir(), however, for large files it is recommended to provide a dedicated
///     // directory on a file system with enough room.
///     funnel_sort.with_tmp_dir(tmp);
///     let statistics = funnel_sort.sort()?;
///     log::info!("sorted {} records", statistics.records_written());
///     Ok(())
/// }
/// ```
pub struct Sort {
    input_files: Vec<PathBuf>,
    output: PathBuf,
    tmp: PathBuf,
    tasks: usize,
    field_separator: u8,
    ignore_empty: bool,
    ignore_records: Option<Regex>,
    max_rows: usize,
    run_size_bytes: u64,
    fan_in: usize,
    cache_buffer_size: usize,
    cache_buffers: usize,
    key_parts: Vec<KeyPart>,
    record_delimiter: Vec<u8>,
    output_delimiter: Option<Vec<u8>>,
    stop_after: Option<u64>,
}

impl Sort {
    /// Create a default Sort definition.
    ///
    /// A default Sort definition will use the system temporary
    /// directory as defined by std::env::temp_dir().
    /// * An input path of "-" reads STDIN. No input paths at all also reads STDIN
    /// * The default record delimiter is '\n', also used for output unless set otherwise
    /// * The default field separator is a TAB ('\t')
    /// * The complete record is a single ascending String key
    /// * a run holds at most 1,000,000 records and 64 MB of keys
    /// * up to 64 runs are merged at once
    /// * each input is cached in 16 buffers of 32 KiB
    /// * all CPU cores sort runs
    ///
    /// The Sort implementation will increase the file descriptor rlimit to accommodate the
    /// configured fan-in
    pub fn new(input_files: Vec<PathBuf>, output: PathBuf) -> Sort {
        Sort {
            input_files,
            output,
            tmp: std::env::temp_dir(),
            tasks: 0,
            field_separator: b'\t',
            ignore_empty: false,
            ignore_records: None,
            max_rows: 1_000_000,
            run_size_bytes: 64_000_000,
            fan_in: 64,
            cache_buffer_size: 32768,
            cache_buffers: 16,
            key_parts: vec![],
            record_delimiter: b"\n".to_vec(),
            output_delimiter: None,
            stop_after: None,
        }
    }

    /// Set directory for run stores and spooled STDIN. By default use std::env::temp_dir()
    pub fn with_tmp_dir(&mut self, tmp: PathBuf) {
        self.tmp = tmp;
    }

    /// Set the number of tasks sorting runs. The default is zero which will result in using all
    /// system cores. The output does not depend on the number of tasks.
    pub fn with_tasks(&mut self, tasks: usize) {
        self.tasks = tasks;
    }

    /// Set the byte separating fields for key parts with a field index. The default is '\t'
    pub fn with_field_separator(&mut self, field_separator: u8) {
        self.field_separator = field_separator
    }

    /// Direct the algorithm to ignore records made of ASCII white space only. The default is false
    pub fn with_ignore_empty(&mut self) {
        self.ignore_empty = true;
    }

    /// Specify which records to ignore. Each record matching the regex will be ignored and will
    /// not appear in the output.
    pub fn with_ignore_records(&mut self, r: Regex) {
        self.ignore_records = Some(r)
    }

    /// Set the maximal number of records in a run
    pub fn with_max_rows(&mut self, max_rows: usize) {
        self.max_rows = max_rows;
    }

    /// Set the maximal size of a run, counted as spilled bytes: keys plus a fixed header per record
    pub fn with_run_size_bytes(&mut self, run_size_bytes: u64) {
        self.run_size_bytes = run_size_bytes;
    }

    /// Set the maximal size of a run in MB
    pub fn with_run_size_mb(&mut self, run_size_mb: u64) {
        self.run_size_bytes = run_size_mb * 1_000_000;
    }

    /// Set the number of runs merged at once. Extra runs are merged into intermediate runs first.
    pub fn with_fan_in(&mut self, fan_in: usize) {
        self.fan_in = fan_in;
    }

    /// Set the size of each input cache buffer
    pub fn with_cache_buffer_size(&mut self, cache_buffer_size: usize) {
        self.cache_buffer_size = cache_buffer_size;
    }

    /// Set the number of buffers cached per input
    pub fn with_cache_buffers(&mut self, cache_buffers: usize) {
        self.cache_buffers = cache_buffers;
    }

    /// Add a key part. The default is to treat the complete record as a single String key
    pub fn add_key_part(&mut self, key_part: KeyPart) {
        self.key_parts.push(key_part);
    }

    /// Replace all key parts with the `key_parts` value.
    pub fn with_key_parts(&mut self, key_parts: Vec<KeyPart>) {
        self.key_parts = key_parts
    }

    /// Set the byte sequence ending each input record, for example b"\r\n"
    pub fn with_record_delimiter(&mut self, record_delimiter: &[u8]) {
        self.record_delimiter = record_delimiter.to_vec()
    }

    /// Set the byte sequence written after each output record. Defaults to the record delimiter
    pub fn with_output_delimiter(&mut self, output_delimiter: &[u8]) {
        self.output_delimiter = Some(output_delimiter.to_vec())
    }

    /// Stop reading input after `records` records
    pub fn with_stop_after(&mut self, records: u64) {
        self.stop_after = Some(records)
    }

    /// Sort the inputs into the output path.
    ///
    /// The result is written to a temp file next to the output and renamed over it when
    /// complete, so the output may be one of the inputs.
    pub fn sort(&self) -> Result<SortStatistics, anyhow::Error> {
        let directory = match self.output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let output_file = Builder::new()
            .prefix(".funnel-")
            .suffix(".out")
            .tempfile_in(&directory)
            .with_context(|| anyhow!("Failed to create output file in {}", directory.display()))?;
        let statistics = self.sort_to(output_file.as_file())?;
        output_file.persist(&self.output)
            .with_context(|| anyhow!("Persist output {}", self.output.display()))?;
        Ok(statistics)
    }

    /// Sort the inputs into `writer`.
    pub fn sort_to<W: Write>(&self, writer: W) -> Result<SortStatistics, anyhow::Error> {
        let config = self.create_config()?;
        let inputs = self.inputs();
        let (current_soft, current_hard) = Self::get_rlimits()?;
        log::info!("Current rlimit NOFILE, soft: {}, hard: {}", current_soft, current_hard);
        let wanted = (config.fan_in() + config.tasks() + inputs.len() + 256) as u64;
        let new_soft = min(max(wanted, current_soft), current_hard);
        log::info!("Set new rlimit NOFILE, soft: {}, hard: {}", new_soft, current_hard);
        Self::set_rlimits(new_soft, current_hard)?;
        let result = Self::open_inputs(&inputs, &config)
            .and_then(|caches| Self::internal_sort(caches, &config, writer));
        log::info!("Restore rlimit NOFILE, soft: {}, hard: {}", current_soft, current_hard);
        Self::set_rlimits(current_soft, current_hard)?;
        result
    }

    /// Check whether every input is already in key order
    pub fn check(&self) -> Result<bool, anyhow::Error> {
        let config = self.create_config()?;
        let mut framer = RecordFramer::new(config.record_delimiter())?;

        let mut result = true;
        for (i, path) in self.inputs().iter().enumerate() {
            let mut cache = InputCache::open(i as u32, path, config.cache_buffer_size(), config.cache_buffers(), config.tmp())?;
            result = Self::internal_check(&mut cache, &mut framer, &config)?;
            if !result {
                break;
            }
        }
        Ok(result)
    }

    fn get_rlimits() -> Result<(u64, u64), anyhow::Error> {
        getrlimit(Resource::NOFILE).with_context(|| "getrlimit")
    }

    fn set_rlimits(soft: u64, hard: u64) -> Result<(), anyhow::Error> {
        setrlimit(Resource::NOFILE, soft, hard)
            .with_context(|| format!("set rlimit NOFILE, soft: {}, hard: {}", soft, hard))?;
        Ok(())
    }

    fn inputs(&self) -> Vec<PathBuf> {
        if self.input_files.is_empty() {
            vec![PathBuf::from("-")]
        } else {
            self.input_files.clone()
        }
    }

    fn create_config(&self) -> Result<Config, SortError> {
        if self.record_delimiter.is_empty() {
            return Err(SortError::config("record delimiter is empty"));
        }
        if self.max_rows == 0 {
            return Err(SortError::config("max rows must be positive"));
        }
        if self.run_size_bytes == 0 {
            return Err(SortError::config("run size must be positive"));
        }
        if self.fan_in < 2 {
            return Err(SortError::config(format!("fan-in of {} cannot merge runs", self.fan_in)));
        }
        if self.cache_buffer_size == 0 {
            return Err(SortError::config("cache buffer size must be positive"));
        }
        if self.cache_buffers < 2 {
            return Err(SortError::config(format!("at least 2 cache buffers are required, got {}", self.cache_buffers)));
        }
        if self.input_files.iter().filter(|path| path.as_path() == Path::new("-")).count() > 1 {
            return Err(SortError::config("STDIN can be given as input only once"));
        }

        let key_parts = if self.key_parts.is_empty() {
            vec![KeyPart::new(0, KeyType::String)]
        } else {
            self.key_parts.clone()
        };
        let key_chain = KeyChain::new(key_parts, self.field_separator)?;

        let mut tasks = self.tasks;
        if self.tasks == 0 {
            tasks = num_cpus::get();
        }

        let output_delimiter = self.output_delimiter
            .clone()
            .unwrap_or_else(|| self.record_delimiter.clone());

        let config = Config::new(
            self.tmp.clone(),
            "funnel-".to_string(),
            ".run".to_string(),
            tasks,
            self.ignore_empty,
            self.ignore_records.clone(),
            self.max_rows,
            self.run_size_bytes,
            self.fan_in,
            self.cache_buffer_size,
            self.cache_buffers,
            key_chain,
            self.record_delimiter.clone(),
            output_delimiter,
            self.stop_after,
        );
        Ok(config)
    }

    fn ignored(record: &[u8], config: &Config) -> bool {
        if config.ignore_empty() && record.iter().all(|b| b.is_ascii_whitespace()) {
            return true;
        }
        match config.ignore_records() {
            Some(r) => r.is_match(record),
            None => false,
        }
    }

    pub(crate) fn internal_check(cache: &mut InputCache, framer: &mut RecordFramer, config: &Config) -> Result<bool, anyhow::Error> {
        let mut record = Vec::new();
        let mut key = Vec::new();
        let mut previous: Option<Vec<u8>> = None;
        while let Some(frame) = framer.read(cache, &mut record)? {
            if Self::ignored(&record, config) {
                continue;
            }
            config.key_chain()
                .encode(&record, frame.record_number, &mut key)
                .with_context(|| anyhow!("input: {}, offset: {}", cache.name(), frame.offset))?;
            if let Some(previous) = &previous {
                if previous > &key {
                    log::info!("Record {} of {} is out of order", frame.record_number, cache.name());
                    return Ok(false);
                }
            }
            previous = Some(key.clone());
        }
        Ok(true)
    }

    fn open_inputs(inputs: &[PathBuf], config: &Config) -> Result<Vec<InputCache>, anyhow::Error> {
        inputs.iter()
            .enumerate()
            .map(|(i, path)| InputCache::open(i as u32, path, config.cache_buffer_size(), config.cache_buffers(), config.tmp()))
            .collect()
    }

    fn generate_runs(
        caches: &mut [InputCache],
        config: &Config,
        sorting_pool: &mut ThreadPool,
        statistics: &mut SortStatistics,
    ) -> Result<GeneratedRuns, anyhow::Error> {
        let mut framer = RecordFramer::new(config.record_delimiter())?;
        let mut run = Vec::new();
        let mut run_bytes: u64 = 0;
        let mut record = Vec::new();
        let mut key_capacity = 0;
        let mut records_read: u64 = 0;

        'inputs: for cache in caches.iter_mut() {
            log::info!("Start reading {}", cache.name());
            loop {
                if let Some(limit) = config.stop_after() {
                    if records_read >= limit {
                        log::info!("Stop reading after {} records", limit);
                        break 'inputs;
                    }
                }
                let frame = match framer.read(cache, &mut record)? {
                    Some(frame) => frame,
                    None => break,
                };
                records_read += 1;
                if Self::ignored(&record, config) {
                    continue;
                }

                let mut key = Vec::with_capacity(key_capacity);
                config.key_chain()
                    .encode(&record, frame.record_number, &mut key)
                    .with_context(|| anyhow!("input: {}, offset: {}", cache.name(), frame.offset))?;
                key_capacity = max(key_capacity, key.len());
                let length = u32::try_from(frame.length)
                    .with_context(|| anyhow!("input: {}, record {} is {} bytes long", cache.name(), frame.record_number, frame.length))?;

                run_bytes += (RECORD_HEADER_SIZE + key.len()) as u64;
                run.push(ProxyRecord::new(cache.source_index(), frame.record_number, frame.offset, length, key));
                if run.len() >= config.max_rows() || run_bytes >= config.run_size_bytes() {
                    statistics.spilled_runs += 1;
                    sorting_pool.submit(Box::new(RunCommand::new(std::mem::take(&mut run))));
                    run_bytes = 0;
                }
            }
            log::info!("Finish reading {}", cache.name());
        }
        statistics.records_read = records_read;

        if statistics.spilled_runs == 0 {
            log::info!("All {} records fit into one in-memory run", run.len());
            run.sort_unstable();
            return Ok(GeneratedRuns::InMemory(run));
        }
        if !run.is_empty() {
            statistics.spilled_runs += 1;
            sorting_pool.submit(Box::new(RunCommand::new(run)));
        }
        Ok(GeneratedRuns::Spilled)
    }

    fn collect_spilled_runs(thread_pool: &mut ThreadPool) -> Result<Vec<Run>, anyhow::Error> {
        let result: Arc<Mutex<Vec<SpilledRuns>>> = Arc::new(Mutex::new(Vec::new()));
        let result_clone = result.clone();
        thread_pool.in_all_threads_mut(
            Arc::new(
                Mutex::new(
                    move || {
                        SPILLED_RUNS.with(
                            |spilled_runs| {
                                let spilled = std::mem::take(&mut *spilled_runs.borrow_mut());
                                log::info!(
                                    "Collected {} spilled runs, thread: {}",
                                    spilled.segments.len(),
                                    thread::current().name().unwrap_or("unnamed")
                                );
                                match result_clone.lock() {
                                    Ok(mut result_guard) => result_guard.push(spilled),
                                    Err(_) => log::error!("Spilled runs lock poisoned"),
                                }
                            }
                        );
                    }
                )
            )
        );

        let collected = std::mem::take(
            &mut *result.lock().map_err(|_| anyhow!("Spilled runs lock poisoned"))?
        );
        let mut runs = Vec::new();
        let mut errors = Vec::new();
        for spilled in collected {
            errors.extend(spilled.errors);
            if let Some(mut store) = spilled.store {
                store.close()?;
                let store = Rc::new(store);
                for segment in spilled.segments {
                    runs.push(Run::new(store.clone(), segment));
                }
            }
        }
        match errors.into_iter().next() {
            Some(e) => Err(e),
            None => Ok(runs),
        }
    }

    /// Merge runs into intermediate runs until no more than fan-in runs remain. The smallest runs
    /// are merged first.
    pub(crate) fn internal_merge(runs: Vec<Run>, config: &Config, statistics: &mut SortStatistics) -> Result<Vec<Run>, anyhow::Error> {
        let mut runs: BinaryHeap<Reverse<Run>> = runs.into_iter().map(Reverse).collect();
        while runs.len() > config.fan_in() {
            // no more runs than needed to get down to the fan-in
            let group_size = min(config.fan_in(), runs.len() - config.fan_in() + 1);
            let group: Vec<Run> = (0..group_size)
                .filter_map(|_| runs.pop())
                .map(|run| run.0)
                .collect();
            let mut store = RunStore::create(config.tmp(), config.tmp_prefix(), config.tmp_suffix())?;
            let records = Self::merge_runs(group, |record| store.write(record).map(|_| ()))?;
            store.close()?;
            let segment = RunSegment::new(0, store.position(), records);
            runs.push(Reverse(Run::new(Rc::new(store), segment)));
            statistics.intermediate_merges += 1;
        }
        Ok(runs.into_iter().map(|run| run.0).collect())
    }

    /// K-way merge of `runs`, handing each record to `emit` in key order. Returns the number of
    /// records merged.
    pub(crate) fn merge_runs<F>(runs: Vec<Run>, mut emit: F) -> Result<u64, anyhow::Error>
        where F: FnMut(&ProxyRecord) -> Result<(), anyhow::Error> {
        log::info!("Merging {} runs, thread: {}", runs.len(), thread::current().name().unwrap_or("unnamed"));
        let mut cursors = BinaryHeap::with_capacity(runs.len());
        for run in runs {
            if let Some(cursor) = RunCursor::new(run)? {
                cursors.push(cursor);
            }
        }
        let mut merged: u64 = 0;
        while let Some(mut cursor) = cursors.peek_mut() {
            emit(cursor.head())?;
            merged += 1;
            if !cursor.advance()? {
                PeekMut::pop(cursor);
            }
        }
        log::info!("Finished merging runs, merged length: {} records", merged);
        Ok(merged)
    }

    fn publish<W: Write>(
        record: &ProxyRecord,
        caches: &mut [InputCache],
        row: &mut Vec<u8>,
        record_writer: &mut RecordWriter<W>,
    ) -> Result<(), anyhow::Error> {
        let cache = caches.get_mut(record.source as usize)
            .ok_or_else(|| anyhow!("Record {} refers to unknown input {}", record.record_number, record.source))?;
        row.resize(record.length as usize, 0);
        let n = cache.read(record.offset, row)?;
        if n < row.len() {
            return Err(
                anyhow!(
                    "Input {} ended before record {} at offset {} could be read again",
                    cache.name(),
                    record.record_number,
                    record.offset
                )
            );
        }
        record_writer.write(row)
    }

    fn internal_sort<W: Write>(mut caches: Vec<InputCache>, config: &Config, writer: W) -> Result<SortStatistics, anyhow::Error> {
        log::info!("Start funnel sort of {} inputs by {} key parts", caches.len(), config.key_chain().parts().len());
        let mut statistics = SortStatistics::default();

        let mut thread_pool_builder = ThreadPoolBuilder::new();
        let mut sorting_pool = thread_pool_builder
            .with_name("sorting".to_string())
            .with_tasks(config.tasks())
            .with_queue_size(config.queue_size())
            .with_shutdown_mode(ShutdownMode::CompletePending)
            .build()
            .map_err(|e| anyhow!("Failed to build sorting pool: {}", e))?;

        sorting_pool.set_thread_local(&CONFIG, Some(config.clone()));

        let generated = Self::generate_runs(&mut caches, config, &mut sorting_pool, &mut statistics);
        let spilled = Self::collect_spilled_runs(&mut sorting_pool);
        log::info!("Shutting down sorting pool");
        sorting_pool.shutdown();
        sorting_pool.join()?;
        let generated = generated?;
        let runs = spilled?;

        let mut record_writer = RecordWriter::new(writer, config.output_delimiter());
        let mut row = Vec::new();
        match generated {
            GeneratedRuns::InMemory(records) => {
                for record in &records {
                    Self::publish(record, &mut caches, &mut row, &mut record_writer)?;
                }
            }
            GeneratedRuns::Spilled => {
                log::info!("Merging {} spilled runs with fan-in {}", runs.len(), config.fan_in());
                let runs = Self::internal_merge(runs, config, &mut statistics)?;
                Self::merge_runs(runs, |record| Self::publish(record, &mut caches, &mut row, &mut record_writer))?;
            }
        }
        statistics.records_written = record_writer.finish()?;
        log::info!(
            "Finish funnel sort, read: {}, written: {}, spilled runs: {}, intermediate merges: {}",
            statistics.records_read,
            statistics.records_written,
            statistics.spilled_runs,
            statistics.intermediate_merges
        );
        Ok(statistics)
    }
}
