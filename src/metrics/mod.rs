use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Counters and timers recorded by the merge path. All updates are relaxed
/// atomics; readers get eventually consistent totals, which is enough for
/// monitoring.
#[derive(Debug, Default)]
pub struct Statistics {
    merge_operation_nanos: AtomicU64,
    num_merge_failures: AtomicU64,
    filter_operation_nanos: AtomicU64,
    // Operand-count histogram for user-visible reads.
    merge_operand_reads: AtomicU64,
    merge_operands_read: AtomicU64,
    max_merge_operands_read: AtomicU64,
}

impl Statistics {
    pub fn new() -> Self {
        Statistics::default()
    }

    /// Time spent inside merge-operator callbacks, successful or not.
    pub fn record_merge_operation(&self, elapsed: Duration) {
        self.merge_operation_nanos
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn record_merge_failure(&self) {
        self.num_merge_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_filter_operation(&self, elapsed: Duration) {
        self.filter_operation_nanos
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
    }

    /// Feed the operand-count histogram. Called only on user-visible read
    /// paths, so iteration and compaction do not skew read statistics.
    pub fn record_read_merge_operands(&self, num_operands: usize) {
        let n = num_operands as u64;
        self.merge_operand_reads.fetch_add(1, Ordering::Relaxed);
        self.merge_operands_read.fetch_add(n, Ordering::Relaxed);
        self.max_merge_operands_read
            .fetch_max(n, Ordering::Relaxed);
    }

    pub fn merge_operation_nanos(&self) -> u64 {
        self.merge_operation_nanos.load(Ordering::Relaxed)
    }

    pub fn num_merge_failures(&self) -> u64 {
        self.num_merge_failures.load(Ordering::Relaxed)
    }

    pub fn filter_operation_nanos(&self) -> u64 {
        self.filter_operation_nanos.load(Ordering::Relaxed)
    }

    pub fn merge_operand_reads(&self) -> u64 {
        self.merge_operand_reads.load(Ordering::Relaxed)
    }

    pub fn merge_operands_read(&self) -> u64 {
        self.merge_operands_read.load(Ordering::Relaxed)
    }

    pub fn max_merge_operands_read(&self) -> u64 {
        self.max_merge_operands_read.load(Ordering::Relaxed)
    }
}

/// Writes the counters in prometheus-formatted text output.
impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# TYPE merge_operation_time_nanos counter")?;
        writeln!(
            f,
            "merge_operation_time_nanos {}",
            self.merge_operation_nanos()
        )?;
        writeln!(f, "# TYPE merge_failures counter")?;
        writeln!(f, "merge_failures {}", self.num_merge_failures())?;
        writeln!(f, "# TYPE filter_operation_time_nanos counter")?;
        writeln!(
            f,
            "filter_operation_time_nanos {}",
            self.filter_operation_nanos()
        )?;
        writeln!(f, "# TYPE read_merge_operands summary")?;
        writeln!(f, "read_merge_operands_count {}", self.merge_operand_reads())?;
        writeln!(f, "read_merge_operands_sum {}", self.merge_operands_read())?;
        write!(f, "read_merge_operands_max {}", self.max_merge_operands_read())
    }
}
