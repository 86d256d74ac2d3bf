use std::cmp::Ordering;

/// Stand-in for a record during sort and merge.
///
/// Holds the encoded sort key and where the original bytes live, never the bytes themselves.
#[derive(Clone, Debug, Default)]
pub(crate) struct ProxyRecord {
    pub(crate) source: u32,
    pub(crate) record_number: u64,
    pub(crate) offset: u64,
    pub(crate) length: u32,
    pub(crate) key: Vec<u8>,
}

impl ProxyRecord {
    pub(crate) fn new(source: u32, record_number: u64, offset: u64, length: u32, key: Vec<u8>) -> ProxyRecord {
        ProxyRecord {
            source,
            record_number,
            offset,
            length,
            key,
        }
    }
}

impl Eq for ProxyRecord {}

impl PartialEq<Self> for ProxyRecord {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.record_number == other.record_number
    }
}

impl PartialOrd<Self> for ProxyRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ProxyRecord {
    // equal keys keep arrival order
    fn cmp(&self, other: &Self) -> Ordering {
        self.key
            .cmp(&other.key)
            .then(self.record_number.cmp(&other.record_number))
    }
}

#[cfg(test)]
mod tests {
    use crate::proxy_record::ProxyRecord;

    #[test]
    fn test_key_then_arrival() {
        let mut records = vec![
            ProxyRecord::new(1, 3, 0, 1, b"b\0".to_vec()),
            ProxyRecord::new(0, 2, 0, 1, b"a\0".to_vec()),
            ProxyRecord::new(1, 1, 0, 1, b"b\0".to_vec()),
            ProxyRecord::new(0, 0, 0, 1, b"b\0".to_vec()),
        ];
        records.sort_unstable();
        let order: Vec<u64> = records.iter().map(|r| r.record_number).collect();
        assert_eq!(order, vec![2, 0, 1, 3]);
    }
}
