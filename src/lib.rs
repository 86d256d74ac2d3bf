//! This crate implements an external sort for files of delimited records that may be far larger
//! than memory.
//!
//! Records end with a delimiter of one or more bytes, for example `\n` or `\r\n`. Each record is
//! ordered by a key built from one or more key parts: a field of the record, or a byte window
//! inside it, read as a string, an integer, a floating point number or a date, ascending or
//! descending. Equal keys keep the order in which the records were read.
//!
//! Only a compact proxy of each record, its encoded key and its location in the input, is sorted.
//! Full runs of proxies are sorted by a pool of worker threads and spilled to temporary run stores,
//! merged down to the configured fan-in and finally merged while the original record bytes are
//! read again from the inputs. Inputs that cannot be re-read, such as STDIN, are spooled to a temp
//! file on the way in.
//!
//! # Examples
//! ```
//! use std::path::PathBuf;
//! use funnel_sort::key_part::KeyPart;
//! use funnel_sort::key_type::KeyType;
//! use funnel_sort::sort::Sort;
//!
//! // optimized for use with Jemalloc
//! use tikv_jemallocator::Jemalloc;
//! #[global_allocator]
//! static GLOBAL: Jemalloc = Jemalloc;
//!
//! // sort tab separated records by the numeric value of their second field. Field indexes start
//! // at 1, index 0 is the complete record
//! fn sort_records(input: PathBuf, output: PathBuf, tmp: PathBuf) -> Result<(), anyhow::Error> {
//!     let mut funnel_sort = Sort::new(vec![input.clone()], output.clone());
//!     funnel_sort.add_key_part(KeyPart::new(2, KeyType::Number));
//!
//!     // set number of CPU cores used to sort runs. The default is to use all available cores.
//!     funnel_sort.with_tasks(2);
//!
//!     // set the directory for run stores. The default is the system temp dir -
//!     // std::env::temp_dir(), however, for large files it is recommended to provide a dedicated
//!     // directory with enough room for the keys of all records.
//!     funnel_sort.with_tmp_dir(tmp);
//!
//!     // keep at most 500,000 records in memory before a run is spilled and merge 32 runs at once
//!     funnel_sort.with_max_rows(500_000);
//!     funnel_sort.with_fan_in(32);
//!
//!     funnel_sort.sort()?;
//!     Ok(())
//! }
//! ```
//!

pub(crate) mod config;
pub(crate) mod input_cache;
pub(crate) mod key;
pub(crate) mod proxy_record;
pub(crate) mod record_framer;
pub(crate) mod record_writer;
pub(crate) mod run;
pub(crate) mod run_command;
pub(crate) mod run_cursor;
pub(crate) mod run_store;

pub mod direction;
pub mod error;
pub mod key_part;
pub mod key_type;
pub mod sort;
pub mod statistics;
