use thiserror::Error;

/// Conditions a caller may want to tell apart from plain I/O failures.
///
/// Errors returned by this crate are [anyhow::Error] values. When the failure is one of the
/// conditions below it can be recovered with `error.downcast_ref::<SortError>()`.
#[derive(Debug, Error)]
pub enum SortError {
    /// A field could not be decoded under the type or format declared by its key part.
    #[error("record {record_number}, key part {part}: cannot parse {value:?} as {expected}: {reason}")]
    Parse {
        record_number: u64,
        part: String,
        value: String,
        expected: String,
        reason: String,
    },
    /// The sort definition is malformed. Raised before any record is read.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SortError {
    pub(crate) fn config(message: impl Into<String>) -> SortError {
        SortError::Config(message.into())
    }
}
