use std::str::FromStr;

use chrono::format::{Item, StrftimeItems};
use chrono::{NaiveDate, NaiveDateTime};

use crate::error::SortError;
use crate::key_part::KeyPart;
use crate::key_type::KeyType;

const SIGN_BIT: u64 = 0x8000_0000_0000_0000;
const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";
const RANDOM_KEY_LENGTH: usize = 16;

/// Builds memory comparable sort keys from records.
///
/// The encoded key of a record is the concatenation of the encoded key parts, in order.
/// Comparing two encoded keys as unsigned bytes gives the configured multi-part ordering.
#[derive(Clone, Debug)]
pub(crate) struct KeyChain {
    parts: Vec<KeyPart>,
    field_separator: u8,
}

impl KeyChain {
    pub(crate) fn new(parts: Vec<KeyPart>, field_separator: u8) -> Result<KeyChain, SortError> {
        if parts.is_empty() {
            return Err(SortError::config("at least one key part is required"));
        }
        for (i, part) in parts.iter().enumerate() {
            if part.length() == Some(0) {
                return Err(SortError::config(format!("key part {} has zero length", part.describe(i))));
            }
            match (part.key_type(), part.format()) {
                (KeyType::Date, Some(format)) => {
                    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
                        return Err(SortError::config(format!("key part {} has invalid date format {:?}", part.describe(i), format)));
                    }
                }
                (KeyType::Date, None) => {}
                (key_type, Some(format)) => {
                    return Err(SortError::config(format!("key part {} of type {:?} does not accept format {:?}", part.describe(i), key_type, format)));
                }
                (_, None) => {}
            }
        }
        Ok(KeyChain { parts, field_separator })
    }

    pub(crate) fn parts(&self) -> &Vec<KeyPart> {
        &self.parts
    }

    /// Encode the key of `record` into `key`, replacing its previous content.
    pub(crate) fn encode(&self, record: &[u8], record_number: u64, key: &mut Vec<u8>) -> Result<(), SortError> {
        key.clear();
        for (i, part) in self.parts.iter().enumerate() {
            let field = self.field(record, part).ok_or_else(|| SortError::Parse {
                record_number,
                part: part.describe(i),
                value: String::from_utf8_lossy(record).to_string(),
                expected: format!("field {}", part.index()),
                reason: format!("record has only {} fields", record.split(|b| *b == self.field_separator).count()),
            })?;
            let value = window(field, part.offset(), part.length());
            encode_part(part, value, key).map_err(|reason| SortError::Parse {
                record_number,
                part: part.describe(i),
                value: String::from_utf8_lossy(value).to_string(),
                expected: format!("{:?}", part.key_type()),
                reason,
            })?;
        }
        Ok(())
    }

    fn field<'a>(&self, record: &'a [u8], part: &KeyPart) -> Option<&'a [u8]> {
        if part.index() == 0 {
            Some(record)
        } else {
            record.split(|b| *b == self.field_separator).nth(part.index() - 1)
        }
    }
}

/// The bytes of `field` starting at `offset`, at most `length` of them. Never reads past the field
/// and never pads.
pub(crate) fn window(field: &[u8], offset: usize, length: Option<usize>) -> &[u8] {
    if offset >= field.len() {
        return &[];
    }
    let end = match length {
        Some(length) => field.len().min(offset.saturating_add(length)),
        None => field.len(),
    };
    &field[offset..end]
}

fn encode_part(part: &KeyPart, value: &[u8], key: &mut Vec<u8>) -> Result<(), String> {
    let start = key.len();
    if part.random() {
        key.extend_from_slice(&rand::random::<[u8; RANDOM_KEY_LENGTH]>());
        return Ok(());
    }
    match part.key_type() {
        KeyType::String => {
            key.extend_from_slice(value);
            if part.direction().ignores_case() {
                key[start..].make_ascii_uppercase();
            }
            // terminators stop a shorter value from being compared against the next key part
            if part.direction().is_descending() {
                complement(&mut key[start..]);
                key.push(0xff);
            } else {
                key.push(0x00);
            }
            return Ok(());
        }
        KeyType::Integer => {
            let i = i64::from_str(text(value)?.trim()).map_err(|e| e.to_string())?;
            key.extend_from_slice(&sortable_i64(i));
        }
        KeyType::Number => {
            let n = f64::from_str(text(value)?.trim()).map_err(|e| e.to_string())?;
            if n.is_nan() {
                return Err("NaN has no position in the sort order".to_string());
            }
            key.extend_from_slice(&sortable_f64(n));
        }
        KeyType::Date => {
            let format = part.format().unwrap_or(DEFAULT_DATE_FORMAT);
            let millis = parse_date(text(value)?.trim(), format)?;
            key.extend_from_slice(&sortable_i64(millis));
        }
    }
    if part.direction().is_descending() {
        complement(&mut key[start..]);
    }
    Ok(())
}

fn text(value: &[u8]) -> Result<&str, String> {
    std::str::from_utf8(value).map_err(|e| e.to_string())
}

fn complement(bytes: &mut [u8]) {
    for b in bytes.iter_mut() {
        *b ^= 0xff;
    }
}

fn sortable_i64(i: i64) -> [u8; 8] {
    ((i as u64) ^ SIGN_BIT).to_be_bytes()
}

fn sortable_f64(n: f64) -> [u8; 8] {
    // -0.0 and 0.0 compare equal
    let n = if n == 0.0 { 0.0 } else { n };
    let bits = n.to_bits();
    if bits & SIGN_BIT != 0 {
        (!bits).to_be_bytes()
    } else {
        (bits ^ SIGN_BIT).to_be_bytes()
    }
}

fn parse_date(s: &str, format: &str) -> Result<i64, String> {
    let date_time = match NaiveDateTime::parse_from_str(s, format) {
        Ok(date_time) => date_time,
        Err(_) => NaiveDate::parse_from_str(s, format)
            .map_err(|e| e.to_string())?
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| "midnight does not exist".to_string())?,
    };
    Ok(date_time.and_utc().timestamp_millis())
}
