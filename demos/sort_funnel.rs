use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Error;
use simple_logger::SimpleLogger;

use funnel_sort::direction::Direction;
use funnel_sort::key_part::KeyPart;
use funnel_sort::key_type::KeyType;
use funnel_sort::sort::Sort;

use tikv_jemallocator::Jemalloc;
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

fn create_input(path: &Path, count: usize) -> Result<(), Error> {
    let mut writer = BufWriter::new(File::create(path)?);
    for i in 0..count {
        write!(writer, "{:08}\tname-{}\t{}\t2023-{:02}-{:02}\r\n", i, i % 97, (i * 7919) % 10000, i % 12 + 1, i % 28 + 1)?;
    }
    writer.flush()?;
    Ok(())
}

fn sort_random(input_path: &Path, output_path: &Path) -> Result<(), Error> {
    let mut funnel_sort = Sort::new(vec![input_path.to_path_buf()], output_path.to_path_buf());
    funnel_sort.with_key_parts(vec![KeyPart::new(0, KeyType::String).with_random(true)]);
    funnel_sort.with_record_delimiter(b"\r\n");
    funnel_sort.sort()?;
    Ok(())
}

fn sort_records_ascending(input_path: &Path, output_path: &Path) -> Result<(), Error> {
    // the complete record ascending is the default key
    let mut funnel_sort = Sort::new(vec![input_path.to_path_buf()], output_path.to_path_buf());
    funnel_sort.with_record_delimiter(b"\r\n");
    funnel_sort.with_output_delimiter(b"\n");
    funnel_sort.sort()?;
    Ok(())
}

fn sort_by_date_and_amount(input_path: &Path, output_path: &Path) -> Result<(), Error> {
    let mut funnel_sort = Sort::new(vec![input_path.to_path_buf()], output_path.to_path_buf());
    funnel_sort.add_key_part(KeyPart::new(4, KeyType::Date).with_name("date"));
    funnel_sort.add_key_part(KeyPart::new(3, KeyType::Integer).with_name("amount").with_direction(Direction::Desc));
    funnel_sort.with_record_delimiter(b"\r\n");
    funnel_sort.with_max_rows(10_000);
    funnel_sort.with_fan_in(4);
    let statistics = funnel_sort.sort()?;
    log::info!(
        "Sorted {} records in {} runs with {} intermediate merges",
        statistics.records_written(),
        statistics.spilled_runs(),
        statistics.intermediate_merges()
    );
    Ok(())
}

// cargo run -r --example sort_funnel
pub fn main() -> Result<(), Error> {
    SimpleLogger::new().init()?;
    let input_path = PathBuf::from("./target/input-100000.dat");
    let random_path = PathBuf::from("./target/random-100000.dat");
    let ascending_path = PathBuf::from("./target/ascending-100000.dat");
    let records_path = PathBuf::from("./target/records-100000.dat");

    create_input(&input_path, 100_000)?;
    sort_random(&input_path, &random_path)?;
    sort_records_ascending(&random_path, &ascending_path)?;
    sort_by_date_and_amount(&random_path, &records_path)?;

    Ok(())
}
