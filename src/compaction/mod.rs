pub mod filter;

use std::time::Duration;

/// Per-call counters filled in by the merge scan for the surrounding
/// compaction's accounting.
#[derive(Debug, Clone, Default)]
pub struct CompactionIterationStats {
    /// Merge operands accumulated into chains.
    pub num_merge_operands: u64,
    /// Operands dropped because a range tombstone covered them.
    pub num_shadowed_operands: u64,
    /// Blob-backed base values resolved.
    pub num_blobs_read: u64,
    /// Bytes read while resolving blob-backed base values.
    pub total_blob_bytes_read: u64,
    /// Wall time spent inside compaction-filter callbacks.
    pub total_filter_time: Duration,
}
