use bytes::Bytes;

use crate::db::wide_column::{WideColumn, WideColumns, DEFAULT_COLUMN_NAME};

/// Classifies the blast radius of a merge-operator failure.
///
/// - `Default`: falls back to `TryMerge`.
/// - `TryMerge`: operations that try to merge this key fail. This includes
///   flush and compaction, which put the store into read-only mode.
/// - `MustMerge`: only operations that must merge this key fail (point
///   reads, iteration). Flush and compaction may still proceed by copying
///   the input operands through to the output untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpFailureScope {
    Default,
    TryMerge,
    MustMerge,
}

/// The base value an operand chain folds onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExistingValue<'a> {
    /// The key did not exist before this chain.
    Absent,
    /// A plain byte-string value.
    Plain(&'a [u8]),
    /// A wide-column entity.
    Columns(&'a WideColumns),
}

/// The result of a full merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewValue {
    /// A new plain value.
    Plain(Vec<u8>),
    /// A new wide-column entity. Order is free; names must be unique.
    Columns(Vec<WideColumn>),
    /// The result equals the operand at this index of the input list,
    /// letting the engine reuse the buffer instead of copying.
    ReusedOperand(usize),
}

/// A merge operator specifies the semantics of read-modify-write updates,
/// which only the client knows. It can be numeric addition, list append,
/// string concatenation, edits of a structured value, anything. The engine
/// invokes it at the right times (during reads, compaction) and in the
/// right order.
///
/// Implementations must be deterministic, must not touch engine state, and
/// must report internal faults through the `Err` value. A panic escaping an
/// operator aborts the surrounding compaction or read.
pub trait MergeOperator: Send + Sync {
    /// The name of the operator. Used to check for merge-operator
    /// mismatches (i.e., a store created with one operator is accessed
    /// using a different one). The name is not currently persisted, so no
    /// check is enforced across reopenings; clients are responsible for
    /// providing a consistent operator.
    fn name(&self) -> &str;

    /// Apply a chain of merge operands onto an existing plain value (or
    /// its absence), oldest operand first.
    ///
    /// key:      the user key the chain belongs to. If the key space is
    ///           partitioned, an operator can multiplex on it.
    /// existing: `None` means the key did not exist before.
    /// operands: the operations to apply, in chronological order.
    fn full_merge(
        &self,
        key: &[u8],
        existing: Option<&[u8]>,
        operands: &[Bytes],
    ) -> Result<NewValue, OpFailureScope>;

    /// Wide-column-aware variant of `full_merge`, letting an operator
    /// transform whole entities during a merge. The default degrades to
    /// the plain contract via `degrade_to_plain_merge`, so operators
    /// written against `full_merge` keep working unmodified when their
    /// keys hold wide-column values.
    fn full_merge_wide(
        &self,
        key: &[u8],
        existing: ExistingValue<'_>,
        operands: &[Bytes],
    ) -> Result<NewValue, OpFailureScope> {
        degrade_to_plain_merge(|base, ops| self.full_merge(key, base, ops), existing, operands)
    }

    /// Combine two operands that would have been applied `left` first,
    /// `right` second, into a single operand with the same effect on any
    /// base value. `None` means "cannot combine now", not an error; the
    /// engine keeps both operands and applies them in order later.
    fn partial_merge(&self, key: &[u8], left: &[u8], right: &[u8]) -> Option<Vec<u8>> {
        let _ = (key, left, right);
        None
    }

    /// N-ary generalization of `partial_merge`. The default folds pairwise
    /// for backward compatibility; overriding it directly is usually more
    /// efficient. A single-operand list is an identity case, reachable
    /// only when `allow_single_operand()` is true.
    fn partial_merge_multi(&self, key: &[u8], operands: &[Bytes]) -> Option<Vec<u8>> {
        let (first, rest) = operands.split_first()?;
        let mut combined = first.to_vec();
        for operand in rest {
            combined = self.partial_merge(key, &combined, operand)?;
        }
        Some(combined)
    }

    /// Whether `partial_merge`/`partial_merge_multi` may be invoked with a
    /// single operand. Operators returning true must handle that case.
    fn allow_single_operand(&self) -> bool {
        false
    }

    /// Lets an operator cap how many operands a point read gathers before
    /// merging, which bounds how many older levels are consulted. Not used
    /// by iterators or compaction. Operands are passed newest first here,
    /// the reverse of their application order.
    fn should_merge(&self, operands: &[Bytes]) -> bool {
        let _ = operands;
        false
    }
}

/// The backward-compatibility rule that lets a plain-value merge function
/// serve wide-column data:
///
/// - `Absent`/`Plain` shapes go to the plain contract unchanged.
/// - A `Columns` shape merges only the default column's bytes under the
///   plain contract; every other column passes through untouched.
///
/// Kept as a free function so the rule can be tested in isolation; the
/// `full_merge_wide` default delegates here.
pub fn degrade_to_plain_merge<F>(
    full_merge_plain: F,
    existing: ExistingValue<'_>,
    operands: &[Bytes],
) -> Result<NewValue, OpFailureScope>
where
    F: FnOnce(Option<&[u8]>, &[Bytes]) -> Result<NewValue, OpFailureScope>,
{
    match existing {
        ExistingValue::Absent => full_merge_plain(None, operands),
        ExistingValue::Plain(value) => full_merge_plain(Some(value), operands),
        ExistingValue::Columns(columns) => {
            let base = columns.default_column().map(|c| c.value.clone());
            let merged = full_merge_plain(base.as_ref().map(|b| b.as_ref()), operands)?;
            let new_default: Bytes = match merged {
                NewValue::Plain(value) => value.into(),
                NewValue::ReusedOperand(idx) => operands
                    .get(idx)
                    .cloned()
                    .ok_or(OpFailureScope::Default)?,
                // The plain contract produced a whole entity on its own;
                // take it as the full result.
                columns_result @ NewValue::Columns(_) => return Ok(columns_result),
            };
            let mut out = Vec::with_capacity(columns.len() + 1);
            out.push(WideColumn::new(DEFAULT_COLUMN_NAME, new_default));
            for column in columns.columns() {
                if !column.is_default() {
                    out.push(column.clone());
                }
            }
            Ok(NewValue::Columns(out))
        }
    }
}
