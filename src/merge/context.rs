use std::collections::VecDeque;

use bytes::Bytes;

/// Accumulates the merge operands of one user key.
///
/// A scan discovers operands newest first, but the operator must see them
/// in chronological (oldest first) order. `push_operand` prepends, so the
/// deque reads chronologically from front to back at all times and no
/// reversal happens at consumption time.
#[derive(Debug, Default)]
pub struct MergeContext {
    operands: VecDeque<Bytes>,
}

impl MergeContext {
    pub fn new() -> Self {
        MergeContext::default()
    }

    /// Record an operand discovered by a newest-to-oldest scan.
    pub fn push_operand(&mut self, operand: Bytes) {
        self.operands.push_front(operand);
    }

    /// Record an operand that is newer than everything recorded so far.
    pub fn push_operand_back(&mut self, operand: Bytes) {
        self.operands.push_back(operand);
    }

    pub fn clear(&mut self) {
        self.operands.clear();
    }

    pub fn num_operands(&self) -> usize {
        self.operands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operands.is_empty()
    }

    /// The operands in chronological order, as one contiguous slice.
    pub fn operands(&mut self) -> &[Bytes] {
        self.operands.make_contiguous()
    }

    /// Chronological iteration without requiring mutable access.
    pub fn iter(&self) -> impl Iterator<Item = &Bytes> {
        self.operands.iter()
    }

    /// The operand at chronological position `idx`.
    pub fn get(&self, idx: usize) -> Option<&Bytes> {
        self.operands.get(idx)
    }
}
