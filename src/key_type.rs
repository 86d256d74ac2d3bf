/// Value type of a key part
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyType {
    /// Raw bytes, optionally compared ignoring ASCII case
    String,
    /// Signed 64 bit integer
    Integer,
    /// 64 bit floating point number
    Number,
    /// Date or date-time parsed with a strftime format. The default format is `%Y-%m-%d`
    Date,
}
