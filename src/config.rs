use std::path::PathBuf;

use regex::bytes::Regex;

use crate::key::KeyChain;

#[derive(Clone)]
pub(crate) struct Config {
    tmp: PathBuf,
    tmp_prefix: String,
    tmp_suffix: String,
    tasks: usize,
    queue_size: usize,
    ignore_empty: bool,
    ignore_records: Option<Regex>,
    max_rows: usize,
    run_size_bytes: u64,
    fan_in: usize,
    cache_buffer_size: usize,
    cache_buffers: usize,
    key_chain: KeyChain,
    record_delimiter: Vec<u8>,
    output_delimiter: Vec<u8>,
    stop_after: Option<u64>,
}

impl Config {
    pub(crate) fn new(
        tmp: PathBuf,
        tmp_prefix: String,
        tmp_suffix: String,
        tasks: usize,
        ignore_empty: bool,
        ignore_records: Option<Regex>,
        max_rows: usize,
        run_size_bytes: u64,
        fan_in: usize,
        cache_buffer_size: usize,
        cache_buffers: usize,
        key_chain: KeyChain,
        record_delimiter: Vec<u8>,
        output_delimiter: Vec<u8>,
        stop_after: Option<u64>,
    ) -> Config {
        // bounds the number of full run buffers waiting for a worker
        let queue_size = tasks;
        Config {
            tmp,
            tmp_prefix,
            tmp_suffix,
            tasks,
            queue_size,
            ignore_empty,
            ignore_records,
            max_rows,
            run_size_bytes,
            fan_in,
            cache_buffer_size,
            cache_buffers,
            key_chain,
            record_delimiter,
            output_delimiter,
            stop_after,
        }
    }

    pub(crate) fn tmp(&self) -> &PathBuf {
        &self.tmp
    }

    pub(crate) fn tmp_prefix(&self) -> &String {
        &self.tmp_prefix
    }

    pub(crate) fn tmp_suffix(&self) -> &String {
        &self.tmp_suffix
    }

    pub(crate) fn tasks(&self) -> usize {
        self.tasks
    }

    pub(crate) fn queue_size(&self) -> usize {
        self.queue_size
    }

    pub(crate) fn ignore_empty(&self) -> bool {
        self.ignore_empty
    }

    pub(crate) fn ignore_records(&self) -> &Option<Regex> {
        &self.ignore_records
    }

    pub(crate) fn max_rows(&self) -> usize {
        self.max_rows
    }

    pub(crate) fn run_size_bytes(&self) -> u64 {
        self.run_size_bytes
    }

    pub(crate) fn fan_in(&self) -> usize {
        self.fan_in
    }

    pub(crate) fn cache_buffer_size(&self) -> usize {
        self.cache_buffer_size
    }

    pub(crate) fn cache_buffers(&self) -> usize {
        self.cache_buffers
    }

    pub(crate) fn key_chain(&self) -> &KeyChain {
        &self.key_chain
    }

    pub(crate) fn record_delimiter(&self) -> &Vec<u8> {
        &self.record_delimiter
    }

    pub(crate) fn output_delimiter(&self) -> &Vec<u8> {
        &self.output_delimiter
    }

    pub(crate) fn stop_after(&self) -> Option<u64> {
        self.stop_after
    }
}
