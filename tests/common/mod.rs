use std::fs;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::str::FromStr;

use data_encoding::HEXLOWER;

pub fn setup() {
    let results_dir_path = PathBuf::from_str("./target/results/").unwrap();
    let parallel_results_dir_path = PathBuf::from_str("./target/parallel-results/").unwrap();

    if !results_dir_path.exists() {
        fs::create_dir_all(&results_dir_path).unwrap_or_else(|_|
            panic!("Failed to create results directory: {:?}", results_dir_path)
        );
    }

    if !parallel_results_dir_path.exists() {
        fs::create_dir_all(&parallel_results_dir_path).unwrap_or_else(|_|
            panic!("Failed to create parallel results directory: {:?}", parallel_results_dir_path)
        );
    }
}

#[allow(dead_code)]
pub fn read_lines(path: PathBuf) -> Result<Vec<String>, anyhow::Error> {
    let reader = BufReader::new(File::open(path)?);
    let lines = reader.lines().map(|x| x.unwrap()).collect();
    Ok(lines)
}

#[allow(dead_code)]
pub fn read_bytes(path: PathBuf) -> Result<Vec<u8>, anyhow::Error> {
    Ok(fs::read(path)?)
}

#[allow(dead_code)]
pub fn temp_file_name(dir: &str) -> PathBuf {
    let mut result = PathBuf::from(dir);
    let name = HEXLOWER.encode(&rand::random::<[u8; 16]>());
    result.push(name);
    result
}

#[allow(dead_code)]
pub fn write_file(dir: &str, content: &[u8]) -> Result<PathBuf, anyhow::Error> {
    let path = temp_file_name(dir);
    fs::write(&path, content)?;
    Ok(path)
}

/// Tab separated records `<id>\t<name>\t<amount>\t<date>` in ascending order of the whole record.
#[allow(dead_code)]
pub fn sorted_lines(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            format!(
                "{:08}\tname-{}\t{}.{:02}\t20{:02}-{:02}-{:02}",
                i * 3,
                i % 97,
                (i * 7919) % 10000,
                i % 100,
                i % 30,
                i % 12 + 1,
                i % 28 + 1
            )
        })
        .collect()
}

#[allow(dead_code)]
pub fn write_lines(dir: &str, lines: &[String], delimiter: &str) -> Result<PathBuf, anyhow::Error> {
    let path = temp_file_name(dir);
    let mut writer = BufWriter::new(File::create(&path)?);
    for line in lines {
        writer.write_all(line.as_bytes())?;
        writer.write_all(delimiter.as_bytes())?;
    }
    writer.flush()?;
    Ok(path)
}

#[allow(dead_code)]
pub fn sorted_fixture(dir: &str, count: usize) -> Result<PathBuf, anyhow::Error> {
    write_lines(dir, &sorted_lines(count), "\n")
}
