//! The read-modify-write resolution engine: the merge-operator contract
//! and the machinery that folds chains of pending merge operands against a
//! base value during compaction and reads.

pub mod associative;
pub mod context;
pub mod dispatch;
pub mod helper;
pub mod operator;

pub use associative::AssociativeMergeOperator;
pub use context::MergeContext;
pub use dispatch::{
    timed_full_merge, timed_full_merge_entity, timed_full_merge_value, BaseValue, RawMergeResult,
};
pub use helper::{
    MergeHelper, MergeOutcome, MergeOutputIterator, MergeScan, RangeDelChecker, ShutdownSignal,
};
pub use operator::{ExistingValue, MergeOperator, NewValue, OpFailureScope};
