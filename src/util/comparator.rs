use std::cmp::Ordering;

/// A Comparator object provides a total order across byte slices that are
/// used as user keys. A Comparator implementation must be thread-safe since
/// it may invoke its methods concurrently from multiple threads.
pub trait Comparator: Sync + Send {
    /// Three-way comparison. Returns value:
    /// Ordering::Less iff a < b
    /// Ordering::Equal iff a == b
    /// Ordering::Greater iff a > b
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;

    /// The name of the comparator. Used to check for comparator
    /// mismatches (i.e., a DB created with one comparator is
    /// accessed using a different comparator.)
    fn name(&self) -> &str;

    /// Width in bytes of the timestamp suffix carried by user keys under
    /// this comparator. 0 means keys carry no timestamp.
    fn timestamp_size(&self) -> usize {
        0
    }

    /// Compare two timestamps extracted from user keys. Only meaningful
    /// when `timestamp_size()` is non-zero.
    fn compare_timestamp(&self, _a: &[u8], _b: &[u8]) -> Ordering {
        Ordering::Equal
    }

    /// Compare two user keys with their timestamp suffixes ignored.
    fn compare_without_timestamp(&self, a: &[u8], b: &[u8]) -> Ordering {
        let ts = self.timestamp_size();
        debug_assert!(a.len() >= ts && b.len() >= ts);
        self.compare(&a[..a.len() - ts], &b[..b.len() - ts])
    }
}

/// `BytewiseComparator` uses lexicographic byte-wise ordering.
#[derive(Default, Clone, Copy)]
pub struct BytewiseComparator {}

impl Comparator for BytewiseComparator {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }

    fn name(&self) -> &str {
        "BytewiseComparator"
    }
}
