use crate::direction::Direction;
use crate::key_type::KeyType;

/// Defines one part of a composite sort key.
///
/// A key part selects a window of bytes inside a field of the record and states how the window is
/// interpreted and collated. The parts of a sort are evaluated in the order they were added, the
/// first part being the most significant.
///
/// # Examples
/// ```
/// // sort by the first five bytes of the record as an integer, then by the rest of the record,
/// // descending and ignoring case
/// use funnel_sort::direction::Direction;
/// use funnel_sort::key_part::KeyPart;
/// use funnel_sort::key_type::KeyType;
/// let zip_code = KeyPart::new(0, KeyType::Integer)
///     .with_offset(0)
///     .with_length(5);
/// let comment = KeyPart::new(0, KeyType::String)
///     .with_offset(6)
///     .with_direction(Direction::DescIgnoreCase);
/// ```
#[derive(Clone, Debug)]
pub struct KeyPart {
    name: String,
    index: usize,
    key_type: KeyType,
    offset: usize,
    length: Option<usize>,
    direction: Direction,
    format: Option<String>,
    random: bool,
}

impl KeyPart {
    /// Create a new [KeyPart]
    ///
    /// # Arguments
    /// * `index` - the index of the field, starting at 1. Index of 0 treats the complete record as
    ///   a field
    /// * `key_type` - the type of the value. See [KeyType] for supported types
    ///
    /// The window covers the whole field and the direction is [Direction::Asc].
    pub fn new(index: usize, key_type: KeyType) -> KeyPart {
        KeyPart {
            name: String::new(),
            index,
            key_type,
            offset: 0,
            length: None,
            direction: Direction::Asc,
            format: None,
            random: false,
        }
    }

    /// Get the name for this key part.
    pub fn name(&self) -> &String {
        &self.name
    }

    /// Get the field index for this key part.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Get the [KeyType] for this key part.
    pub fn key_type(&self) -> &KeyType {
        &self.key_type
    }

    /// Get the byte offset of the window inside the field.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Get the byte length of the window, `None` meaning up to the end of the field.
    pub fn length(&self) -> Option<usize> {
        self.length
    }

    /// Get the [Direction] for this key part.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Get the parse format for this key part.
    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    /// Get the random setting for this key part.
    pub fn random(&self) -> bool {
        self.random
    }

    /// Specify a name for this key part. The name is used in error messages.
    pub fn with_name(mut self, name: &str) -> KeyPart {
        self.name = name.to_string();
        self
    }

    /// Specify the field index, starting at 1. Index of 0 treats the complete record as a field.
    pub fn with_index(mut self, index: usize) -> KeyPart {
        self.index = index;
        self
    }

    /// Specify the key type. See [KeyType] for supported types.
    pub fn with_key_type(mut self, key_type: KeyType) -> KeyPart {
        self.key_type = key_type;
        self
    }

    /// Specify where the window starts inside the field.
    pub fn with_offset(mut self, offset: usize) -> KeyPart {
        self.offset = offset;
        self
    }

    /// Specify the window length. Fields shorter than the window contribute what they have.
    pub fn with_length(mut self, length: usize) -> KeyPart {
        self.length = Some(length);
        self
    }

    /// Specify the collation [Direction].
    pub fn with_direction(mut self, direction: Direction) -> KeyPart {
        self.direction = direction;
        self
    }

    /// Specify a strftime format for [KeyType::Date] key parts.
    pub fn with_format(mut self, format: &str) -> KeyPart {
        self.format = Some(format.to_string());
        self
    }

    /// Specify whether to generate a random key value. Specifying true will cause the input to
    /// be randomly shuffled.
    pub fn with_random(mut self, random: bool) -> KeyPart {
        self.random = random;
        self
    }

    pub(crate) fn describe(&self, position: usize) -> String {
        if self.name.is_empty() {
            format!("#{}", position + 1)
        } else {
            format!("#{} ({})", position + 1, self.name)
        }
    }
}
