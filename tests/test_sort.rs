use std::fs;
use std::path::PathBuf;

use regex::bytes::Regex;

use funnel_sort::direction::Direction;
use funnel_sort::key_part::KeyPart;
use funnel_sort::key_type::KeyType;
use funnel_sort::sort::Sort;

mod common;

const RESULTS: &str = "./target/results/";

fn sort_content(content: &[u8], configure: impl FnOnce(&mut Sort)) -> Result<String, anyhow::Error> {
    common::setup();
    let input_path = common::write_file(RESULTS, content)?;
    let output_path = common::temp_file_name(RESULTS);
    let mut funnel_sort = Sort::new(vec![input_path.clone()], output_path.clone());
    funnel_sort.with_tmp_dir(PathBuf::from(RESULTS));
    configure(&mut funnel_sort);
    funnel_sort.sort()?;
    let output = String::from_utf8(common::read_bytes(output_path.clone())?)?;
    fs::remove_file(input_path)?;
    fs::remove_file(output_path)?;
    Ok(output)
}

#[test]
fn test_integer_window_key() -> Result<(), anyhow::Error> {
    let output = sort_content(
        b"54321 line 2\n12345 line 1\n",
        |funnel_sort| funnel_sort.add_key_part(KeyPart::new(0, KeyType::Integer).with_offset(0).with_length(5)),
    )?;
    assert_eq!(output, "12345 line 1\n54321 line 2\n");
    Ok(())
}

#[test]
fn test_two_crlf_inputs_to_lf() -> Result<(), anyhow::Error> {
    common::setup();
    let first = common::write_file(RESULTS, b"c 3\r\na 1\r\ne 5\r\n")?;
    let second = common::write_file(RESULTS, b"d 4\r\nb 2\r\nf 6\r\n")?;
    let output_path = common::temp_file_name(RESULTS);

    let mut funnel_sort = Sort::new(vec![first.clone(), second.clone()], output_path.clone());
    funnel_sort.with_tmp_dir(PathBuf::from(RESULTS));
    funnel_sort.with_max_rows(4);
    funnel_sort.with_cache_buffer_size(7);
    funnel_sort.with_cache_buffers(2);
    funnel_sort.with_record_delimiter(b"\r\n");
    funnel_sort.with_output_delimiter(b"\n");
    let statistics = funnel_sort.sort()?;

    assert_eq!(String::from_utf8(common::read_bytes(output_path.clone())?)?, "a 1\nb 2\nc 3\nd 4\ne 5\nf 6\n");
    assert_eq!(statistics.records_read(), 6);
    assert_eq!(statistics.records_written(), 6);
    assert_eq!(statistics.spilled_runs(), 2);
    assert_eq!(statistics.intermediate_merges(), 0);
    fs::remove_file(first)?;
    fs::remove_file(second)?;
    fs::remove_file(output_path)?;
    Ok(())
}

#[test]
fn test_equal_keys_keep_input_order() -> Result<(), anyhow::Error> {
    let output = sort_content(
        b"b 1\na 2\nb 3\na 4\nb 5\na 6\n",
        |funnel_sort| {
            funnel_sort.add_key_part(KeyPart::new(0, KeyType::String).with_length(1));
            funnel_sort.with_max_rows(1);
            funnel_sort.with_tasks(4);
        },
    )?;
    assert_eq!(output, "a 2\na 4\na 6\nb 1\nb 3\nb 5\n");
    Ok(())
}

#[test]
fn test_equal_keys_across_inputs() -> Result<(), anyhow::Error> {
    common::setup();
    let first = common::write_file(RESULTS, b"k line 1\nk line 2\n")?;
    let second = common::write_file(RESULTS, b"k line 3\nk line 4\n")?;
    let output_path = common::temp_file_name(RESULTS);

    let mut funnel_sort = Sort::new(vec![second.clone(), first.clone()], output_path.clone());
    funnel_sort.with_tmp_dir(PathBuf::from(RESULTS));
    funnel_sort.with_max_rows(4);
    funnel_sort.add_key_part(KeyPart::new(0, KeyType::String).with_length(1));
    funnel_sort.sort()?;

    assert_eq!(common::read_lines(output_path.clone())?, vec!["k line 3", "k line 4", "k line 1", "k line 2"]);
    fs::remove_file(first)?;
    fs::remove_file(second)?;
    fs::remove_file(output_path)?;
    Ok(())
}

#[test]
fn test_multiple_key_parts() -> Result<(), anyhow::Error> {
    let output = sort_content(
        b"a\t1.5\nd\t10\nc\t-2\nb\t10\n",
        |funnel_sort| {
            funnel_sort.add_key_part(KeyPart::new(2, KeyType::Number).with_direction(Direction::Desc));
            funnel_sort.add_key_part(KeyPart::new(1, KeyType::String));
        },
    )?;
    assert_eq!(output, "b\t10\nd\t10\na\t1.5\nc\t-2\n");
    Ok(())
}

#[test]
fn test_date_key_with_format() -> Result<(), anyhow::Error> {
    let output = sort_content(
        b"02/01/2020 x\n31/12/2019 y\n01/01/2020 z\n",
        |funnel_sort| {
            funnel_sort.with_field_separator(b' ');
            funnel_sort.add_key_part(KeyPart::new(1, KeyType::Date).with_format("%d/%m/%Y"));
        },
    )?;
    assert_eq!(output, "31/12/2019 y\n01/01/2020 z\n02/01/2020 x\n");
    Ok(())
}

#[test]
fn test_ignore_case() -> Result<(), anyhow::Error> {
    let output = sort_content(
        b"beta\nAlpha\nalpha\nBeta\n",
        |funnel_sort| funnel_sort.add_key_part(KeyPart::new(0, KeyType::String).with_direction(Direction::AscIgnoreCase)),
    )?;
    assert_eq!(output, "Alpha\nalpha\nbeta\nBeta\n");
    Ok(())
}

#[test]
fn test_desc_ignore_case() -> Result<(), anyhow::Error> {
    let output = sort_content(
        b"beta\nAlpha\ngamma\nalpha\nBeta\n",
        |funnel_sort| funnel_sort.add_key_part(KeyPart::new(0, KeyType::String).with_direction(Direction::DescIgnoreCase)),
    )?;
    assert_eq!(output, "gamma\nbeta\nBeta\nAlpha\nalpha\n");
    Ok(())
}

#[test]
fn test_unterminated_last_record() -> Result<(), anyhow::Error> {
    let output = sort_content(b"b\nc\na", |_| {})?;
    assert_eq!(output, "a\nb\nc\n");
    Ok(())
}

#[test]
fn test_multi_byte_delimiter() -> Result<(), anyhow::Error> {
    let output = sort_content(b"c||a|b||b", |funnel_sort| funnel_sort.with_record_delimiter(b"||"))?;
    assert_eq!(output, "a|b||b||c||");
    Ok(())
}

#[test]
fn test_empty_input() -> Result<(), anyhow::Error> {
    common::setup();
    let input_path = common::write_file(RESULTS, b"")?;
    let output_path = common::temp_file_name(RESULTS);
    let funnel_sort = Sort::new(vec![input_path.clone()], output_path.clone());
    let statistics = funnel_sort.sort()?;
    assert!(common::read_bytes(output_path.clone())?.is_empty());
    assert_eq!(statistics.records_read(), 0);
    assert_eq!(statistics.records_written(), 0);
    fs::remove_file(input_path)?;
    fs::remove_file(output_path)?;
    Ok(())
}

#[test]
fn test_stop_after() -> Result<(), anyhow::Error> {
    let output = sort_content(
        b"9\n8\n7\n6\n5\n4\n",
        |funnel_sort| {
            funnel_sort.with_stop_after(3);
            funnel_sort.with_max_rows(2);
        },
    )?;
    assert_eq!(output, "7\n8\n9\n");
    Ok(())
}

#[test]
fn test_ignore_empty_and_matching_records() -> Result<(), anyhow::Error> {
    let output = sort_content(
        b"b\n  \n# comment\n\na\n\t\n",
        |funnel_sort| {
            funnel_sort.with_ignore_empty();
            funnel_sort.with_ignore_records(Regex::new("^#").unwrap());
        },
    )?;
    assert_eq!(output, "a\nb\n");
    Ok(())
}

#[test]
fn test_sort_in_place() -> Result<(), anyhow::Error> {
    common::setup();
    let path = common::write_file(RESULTS, b"3 c\r\n1 a\r\n2 b\r\n")?;
    let mut funnel_sort = Sort::new(vec![path.clone()], path.clone());
    funnel_sort.with_record_delimiter(b"\r\n");
    funnel_sort.with_output_delimiter(b"\n");
    funnel_sort.sort()?;
    assert_eq!(common::read_lines(path.clone())?, vec!["1 a", "2 b", "3 c"]);
    assert_eq!(common::read_bytes(path.clone())?, b"1 a\n2 b\n3 c\n");
    fs::remove_file(path)?;
    Ok(())
}

#[test]
fn test_sort_to_writer() -> Result<(), anyhow::Error> {
    common::setup();
    let input_path = common::write_file(RESULTS, b"-1\n-10\n3\n0\n")?;
    let mut funnel_sort = Sort::new(vec![input_path.clone()], PathBuf::new());
    funnel_sort.add_key_part(KeyPart::new(0, KeyType::Integer));
    let mut output = Vec::new();
    let statistics = funnel_sort.sort_to(&mut output)?;
    assert_eq!(output, b"-10\n-1\n0\n3\n");
    assert_eq!(statistics.spilled_runs(), 0);
    fs::remove_file(input_path)?;
    Ok(())
}
