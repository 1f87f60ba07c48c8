use bytes::Bytes;

use crate::merge::operator::{MergeOperator, NewValue, OpFailureScope};

/// A simpler, associative merge operator: always takes two values and
/// combines them into one. Numeric addition and string concatenation are
/// examples. For anything more abstract, implement `MergeOperator`
/// directly.
pub trait AssociativeMergeOperator: Send + Sync {
    /// The name of the operator, see `MergeOperator::name`.
    fn name(&self) -> &str;

    /// Combine `existing` (or its absence) with one operand. `None` means
    /// the client found bad data or an internal fault; the engine treats
    /// it as an operator failure.
    fn merge(&self, key: &[u8], existing: Option<&[u8]>, operand: &[u8]) -> Option<Vec<u8>>;
}

/// Every associative operator is a full merge operator: the full merge is a
/// left fold of the binary merge over the operand list, and a partial merge
/// treats the left operand as the existing value.
impl<T: AssociativeMergeOperator> MergeOperator for T {
    fn name(&self) -> &str {
        AssociativeMergeOperator::name(self)
    }

    fn full_merge(
        &self,
        key: &[u8],
        existing: Option<&[u8]>,
        operands: &[Bytes],
    ) -> Result<NewValue, OpFailureScope> {
        // Identity on a singleton: no base and a single operand is already
        // the final value, no call needed.
        if existing.is_none() && operands.len() == 1 {
            return Ok(NewValue::ReusedOperand(0));
        }
        let mut acc = existing.map(|v| v.to_vec());
        for operand in operands {
            acc = Some(
                self.merge(key, acc.as_deref(), operand)
                    .ok_or(OpFailureScope::Default)?,
            );
        }
        Ok(NewValue::Plain(acc.unwrap_or_default()))
    }

    fn partial_merge(&self, key: &[u8], left: &[u8], right: &[u8]) -> Option<Vec<u8>> {
        self.merge(key, Some(left), right)
    }
}
