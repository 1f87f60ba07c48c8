use std::time::Instant;

use bytes::Bytes;
use log::warn;

use crate::db::format::ValueType;
use crate::db::wide_column::{WideColumn, WideColumns, DEFAULT_COLUMN_NAME};
use crate::merge::operator::{ExistingValue, MergeOperator, NewValue, OpFailureScope};
use crate::metrics::Statistics;
use crate::{Error, IResult};

/// The base value handed to a timed full merge, in whatever shape the
/// caller happens to hold it.
#[derive(Debug, Clone, Copy)]
pub enum BaseValue<'a> {
    /// No base value exists.
    None,
    /// A plain value.
    Plain(&'a [u8]),
    /// A wide-column entity still in its serialized form; decoded here
    /// before the operator runs.
    WideEncoded(&'a [u8]),
    /// An already-decoded wide-column entity.
    Wide(&'a WideColumns),
}

/// A full-merge result with its shape preserved, for iteration and
/// compaction paths that must write the result back out without forcing a
/// decode or copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawMergeResult {
    Plain(Bytes),
    /// The result is one of the input operands, returned by reference.
    ReusedOperand(Bytes),
    /// A serialized wide-column entity.
    Columns(Bytes),
}

impl RawMergeResult {
    /// The entry type a key holding this result must carry.
    pub fn value_type(&self) -> ValueType {
        match self {
            RawMergeResult::Plain(_) | RawMergeResult::ReusedOperand(_) => ValueType::KTypeValue,
            RawMergeResult::Columns(_) => ValueType::KTypeWideColumnEntity,
        }
    }

    pub fn into_bytes(self) -> Bytes {
        match self {
            RawMergeResult::Plain(b) | RawMergeResult::ReusedOperand(b) | RawMergeResult::Columns(b) => b,
        }
    }
}

/// Invoke the operator once, with the timer always charged and a failure
/// mapped to `Corruption` carrying the reported scope. A wide-encoded base
/// that fails to decode returns before the operator is invoked.
fn invoke_full_merge(
    operator: &dyn MergeOperator,
    key: &[u8],
    base: BaseValue<'_>,
    operands: &[Bytes],
    stats: Option<&Statistics>,
    update_num_ops_stats: bool,
) -> IResult<NewValue> {
    debug_assert!(!operands.is_empty());

    if update_num_ops_stats {
        if let Some(stats) = stats {
            stats.record_read_merge_operands(operands.len());
        }
    }

    let decoded;
    let existing = match base {
        BaseValue::None => ExistingValue::Absent,
        BaseValue::Plain(value) => ExistingValue::Plain(value),
        BaseValue::Wide(columns) => ExistingValue::Columns(columns),
        BaseValue::WideEncoded(raw) => {
            decoded = WideColumns::decode(raw)?;
            ExistingValue::Columns(&decoded)
        }
    };

    let timer = Instant::now();
    let result = operator.full_merge_wide(key, existing, operands);
    if let Some(stats) = stats {
        stats.record_merge_operation(timer.elapsed());
    }

    result.map_err(|scope| {
        if let Some(stats) = stats {
            stats.record_merge_failure();
        }
        let scope = match scope {
            OpFailureScope::Default => OpFailureScope::TryMerge,
            reported => reported,
        };
        warn!(
            "merge operator '{}' failed with scope {:?}",
            operator.name(),
            scope
        );
        Error::merge_operator_failed(scope)
    })
}

fn reused_operand(operands: &[Bytes], idx: usize) -> IResult<Bytes> {
    operands
        .get(idx)
        .cloned()
        .ok_or_else(|| Error::corruption("merge operator reused an operand index out of range"))
}

/// Full merge preserving the result shape. Used by iteration and
/// compaction.
pub fn timed_full_merge(
    operator: &dyn MergeOperator,
    key: &[u8],
    base: BaseValue<'_>,
    operands: &[Bytes],
    stats: Option<&Statistics>,
    update_num_ops_stats: bool,
) -> IResult<RawMergeResult> {
    match invoke_full_merge(operator, key, base, operands, stats, update_num_ops_stats)? {
        NewValue::Plain(value) => Ok(RawMergeResult::Plain(value.into())),
        NewValue::ReusedOperand(idx) => Ok(RawMergeResult::ReusedOperand(reused_operand(operands, idx)?)),
        NewValue::Columns(columns) => {
            let columns = WideColumns::from_unsorted(columns)?;
            Ok(RawMergeResult::Columns(columns.encode()))
        }
    }
}

/// Full merge coerced to a plain value. Used by point lookups with a plain
/// external contract: a wide-column result yields its default column's
/// value (empty if the entity has none).
pub fn timed_full_merge_value(
    operator: &dyn MergeOperator,
    key: &[u8],
    base: BaseValue<'_>,
    operands: &[Bytes],
    stats: Option<&Statistics>,
    update_num_ops_stats: bool,
) -> IResult<Bytes> {
    match invoke_full_merge(operator, key, base, operands, stats, update_num_ops_stats)? {
        NewValue::Plain(value) => Ok(value.into()),
        NewValue::ReusedOperand(idx) => reused_operand(operands, idx),
        NewValue::Columns(columns) => {
            let columns = WideColumns::from_unsorted(columns)?;
            Ok(columns
                .default_column()
                .map(|c| c.value.clone())
                .unwrap_or_else(Bytes::new))
        }
    }
}

/// Full merge coerced to a wide-column entity. Used by point lookups with
/// an entity external contract: a plain result is wrapped as a single
/// default column.
pub fn timed_full_merge_entity(
    operator: &dyn MergeOperator,
    key: &[u8],
    base: BaseValue<'_>,
    operands: &[Bytes],
    stats: Option<&Statistics>,
    update_num_ops_stats: bool,
) -> IResult<WideColumns> {
    let wrap = |value: Bytes| {
        WideColumns::new(vec![WideColumn::new(DEFAULT_COLUMN_NAME, value)])
    };
    match invoke_full_merge(operator, key, base, operands, stats, update_num_ops_stats)? {
        NewValue::Plain(value) => wrap(value.into()),
        NewValue::ReusedOperand(idx) => wrap(reused_operand(operands, idx)?),
        NewValue::Columns(columns) => WideColumns::from_unsorted(columns),
    }
}
