use std::cmp::Ordering;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use log::warn;

use crate::blob::{BlobFetcher, PrefetchBufferCollection};
use crate::compaction::filter::{CompactionFilter, FilterDecision};
use crate::compaction::CompactionIterationStats;
use crate::db::format::{
    extract_timestamp_from_user_key, parse_internal_key, update_internal_key, InternalKey,
    ParsedInternalKey, ValueType, INTERNAL_KEY_TAIL, MAX_KEY_SEQUENCE, VALUE_TYPE_FOR_SEEK,
};
use crate::iterator::Iter;
use crate::merge::context::MergeContext;
use crate::merge::dispatch::{timed_full_merge, BaseValue, RawMergeResult};
use crate::merge::operator::MergeOperator;
use crate::metrics::Statistics;
use crate::util::coding::decode_fixed_64;
use crate::util::comparator::Comparator;
use crate::{Error, IResult};

/// Answers whether an entry is fully shadowed by a range tombstone, i.e. a
/// deletion over a key range at a newer sequence number.
pub trait RangeDelChecker {
    fn covers(&self, key: &ParsedInternalKey<'_>) -> bool;
}

/// Cooperative cancellation token shared between a compaction or read
/// driver and its merge scans. Reads are relaxed; this is best-effort, a
/// racing trigger can let one extra entry through but never corrupts
/// state.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    flag: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        ShutdownSignal::default()
    }

    pub fn trigger(&self) {
        self.flag.store(true, AtomicOrdering::Relaxed);
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(AtomicOrdering::Relaxed)
    }
}

/// Per-call collaborators and knobs for `MergeHelper::merge_until`.
pub struct MergeScan<'a> {
    /// Cancellation token checked between chain entries.
    pub shutdown: Option<&'a ShutdownSignal>,
    /// Range-tombstone shadowing check applied to operands and bases.
    pub range_del: Option<&'a dyn RangeDelChecker>,
    /// Sequence number the fold must not cross; entries at or below it are
    /// left on the iterator. 0 means no snapshot boundary.
    pub stop_before: u64,
    /// True only when iterating the oldest data level, where the absence
    /// of a base value is a genuine absence.
    pub at_bottom: bool,
    /// Whether raw key/value bytes may appear in error messages and logs.
    pub allow_data_in_errors: bool,
    /// Resolves blob-indexed base values.
    pub blob_fetcher: Option<&'a dyn BlobFetcher>,
    /// Low watermark for timestamp-based garbage collection. Entries whose
    /// timestamp is at or above it must stay distinguishable.
    pub full_history_ts_low: Option<&'a [u8]>,
    /// Readahead buffers shared by blob resolutions within one compaction.
    pub prefetch_buffers: Option<&'a mut PrefetchBufferCollection>,
    /// Output slot for iteration counters.
    pub iter_stats: Option<&'a mut CompactionIterationStats>,
}

impl<'a> MergeScan<'a> {
    pub fn new(stop_before: u64, at_bottom: bool) -> Self {
        MergeScan {
            shutdown: None,
            range_del: None,
            stop_before,
            at_bottom,
            allow_data_in_errors: false,
            blob_fetcher: None,
            full_history_ts_low: None,
            prefetch_buffers: None,
            iter_stats: None,
        }
    }
}

/// What a `merge_until` call produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The chain folded into a single value, or nothing is left of it
    /// (all operands filtered away, or a filter reported a skip target).
    /// `keys()`/`values()` hold at most one entry.
    Resolved,
    /// No base value was reachable; `keys()`/`values()` hold the residual
    /// operand chain for a later pass at a lower level.
    InProgress,
}

/// Scans a maximal run of merge entries for one user key and resolves them
/// against the merge operator, the compaction filter, range tombstones and
/// the snapshot boundary.
///
/// The results are exposed through `keys()` and `values()` and stay valid
/// until the next `merge_until` call on the same instance:
///
/// - On `Resolved`, `keys()` holds a single key carrying the sequence
///   number of the newest folded entry. Its type changes to the merged
///   shape: `Put/Delete + Merge + ... + Merge => Put`.
/// - On `InProgress`, `keys()` holds the internal keys seen, chronological
///   front to back, with `values()` parallel to it. `Merge + ... + Merge
///   => Merge`; the last position is the first key the scan saw.
pub struct MergeHelper<C: Comparator> {
    user_comparator: C,
    merge_operator: Option<Arc<dyn MergeOperator>>,
    compaction_filter: Option<Arc<dyn CompactionFilter>>,
    // Enforce no internal key corruption?
    assert_valid_internal_key: bool,
    latest_snapshot: u64,
    level: usize,
    stats: Option<Arc<Statistics>>,

    // Scratch buffers holding the last merge_until result.
    keys: VecDeque<Bytes>,
    values: MergeContext,

    total_filter_time: Duration,
    filter_skip_until: Option<InternalKey>,
}

impl<C: Comparator> MergeHelper<C> {
    pub fn new(
        user_comparator: C,
        merge_operator: Option<Arc<dyn MergeOperator>>,
        compaction_filter: Option<Arc<dyn CompactionFilter>>,
        assert_valid_internal_key: bool,
        latest_snapshot: u64,
        level: usize,
        stats: Option<Arc<Statistics>>,
    ) -> Self {
        MergeHelper {
            user_comparator,
            merge_operator,
            compaction_filter,
            assert_valid_internal_key,
            latest_snapshot,
            level,
            stats,
            keys: VecDeque::new(),
            values: MergeContext::new(),
            total_filter_time: Duration::ZERO,
            filter_skip_until: None,
        }
    }

    pub fn has_operator(&self) -> bool {
        self.merge_operator.is_some()
    }

    /// The internal keys of the last result, chronological front to back.
    pub fn keys(&self) -> &VecDeque<Bytes> {
        &self.keys
    }

    /// The values of the last result, parallel to `keys()`.
    pub fn values(&self) -> &MergeContext {
        &self.values
    }

    /// Cumulative wall time spent inside compaction-filter callbacks.
    pub fn total_filter_time(&self) -> Duration {
        self.total_filter_time
    }

    /// If the last call ended because the filter returned a skip target,
    /// the encoded internal key the outer iteration should seek to. The
    /// result buffers are empty in that case.
    pub fn filtered_until(&self) -> Option<&[u8]> {
        self.filter_skip_until.as_ref().map(|k| k.encoded())
    }

    /// Scan forward from `iter`, which must address a syntactically valid
    /// merge-typed internal key, consuming the chain of that user key.
    /// Stops at a corrupted key, a Put/Delete (consumed as the base), a
    /// different user key, the snapshot boundary (left on the iterator), a
    /// filter skip target, a shutdown, or iterator exhaustion.
    pub fn merge_until<I>(&mut self, iter: &mut I, scan: &mut MergeScan<'_>) -> IResult<MergeOutcome>
    where
        I: Iter + ?Sized,
    {
        let filter_time_before = self.total_filter_time;
        let result = self.merge_until_inner(iter, scan);
        if let Some(stats) = scan.iter_stats.as_deref_mut() {
            stats.total_filter_time += self.total_filter_time - filter_time_before;
        }
        result
    }

    fn merge_until_inner<I>(
        &mut self,
        iter: &mut I,
        scan: &mut MergeScan<'_>,
    ) -> IResult<MergeOutcome>
    where
        I: Iter + ?Sized,
    {
        let operator = self
            .merge_operator
            .clone()
            .expect("merge_until requires a configured merge operator");
        let stats = self.stats.clone();

        self.keys.clear();
        self.values.clear();
        self.filter_skip_until = None;

        // Every entry of the chain shares the first entry's user key.
        let original_key = Bytes::copy_from_slice(iter.key());
        let orig = parse_internal_key(&original_key, scan.allow_data_in_errors)?;
        debug_assert_eq!(orig.value_type, ValueType::KTypeMerge);
        let user_key = original_key.slice(..original_key.len() - INTERNAL_KEY_TAIL);

        let ts_sz = self.user_comparator.timestamp_size();
        let mut first_key = true;
        let mut hit_next_user_key = false;
        // Set when the newest processed operand sits at or above the
        // timestamp low watermark and must stay readable at its timestamp.
        let mut keep_history = false;

        'scan: while iter.valid() {
            if let Some(signal) = scan.shutdown {
                if signal.is_set() {
                    self.keys.clear();
                    self.values.clear();
                    return Err(Error::ShutdownInProgress);
                }
            }

            let (sequence, value_type, covered) = {
                let ikey = match parse_internal_key(iter.key(), scan.allow_data_in_errors) {
                    Ok(parsed) => parsed,
                    Err(err) => {
                        if self.assert_valid_internal_key {
                            return Err(err);
                        }
                        // Lenient mode: a corrupt key silently terminates
                        // the chain.
                        break 'scan;
                    }
                };
                if first_key {
                    debug_assert_eq!(
                        self.user_comparator
                            .compare_without_timestamp(ikey.user_key, &user_key),
                        Ordering::Equal
                    );
                    first_key = false;
                } else if self
                    .user_comparator
                    .compare_without_timestamp(ikey.user_key, &user_key)
                    != Ordering::Equal
                {
                    // Hit a different user key, stop right here.
                    hit_next_user_key = true;
                    break 'scan;
                } else if scan.stop_before > 0 && ikey.sequence <= scan.stop_before {
                    // Visible under an older snapshot; folding must not
                    // cross it. The entry stays on the iterator.
                    break 'scan;
                }
                if ts_sz > 0 {
                    if let Some(ts_low) = scan.full_history_ts_low {
                        let ts = extract_timestamp_from_user_key(ikey.user_key, ts_sz);
                        keep_history =
                            self.user_comparator.compare_timestamp(ts, ts_low) != Ordering::Less;
                    }
                }
                let covered = match scan.range_del {
                    Some(range_del) => range_del.covers(&ikey),
                    None => false,
                };
                (ikey.sequence, ikey.value_type, covered)
            };

            if value_type != ValueType::KTypeMerge {
                // Hit a Put/Delete: merge the base value (or its absence)
                // with the accumulated operands and we are done.
                if self.keys.is_empty() {
                    // Every operand was filtered out. The base entry stays
                    // on the iterator for the caller to write through.
                    return Ok(MergeOutcome::Resolved);
                }

                let blob_value;
                let base = if covered {
                    // The base is shadowed by a range tombstone; merge
                    // against its absence.
                    BaseValue::None
                } else {
                    match value_type {
                        ValueType::KTypeValue => BaseValue::Plain(iter.value()),
                        ValueType::KTypeBlobIndex => {
                            let fetcher = scan.blob_fetcher.ok_or_else(|| {
                                Error::corruption("blob-indexed base value without a blob fetcher")
                            })?;
                            let (value, bytes_read) = fetcher.fetch_blob(
                                &user_key,
                                iter.value(),
                                scan.prefetch_buffers.as_deref_mut(),
                            )?;
                            if let Some(stats) = scan.iter_stats.as_deref_mut() {
                                stats.num_blobs_read += 1;
                                stats.total_blob_bytes_read += bytes_read;
                            }
                            blob_value = value;
                            BaseValue::Plain(&blob_value)
                        }
                        ValueType::KTypeWideColumnEntity => BaseValue::WideEncoded(iter.value()),
                        ValueType::KTypeDeletion | ValueType::KTypeSingleDeletion => {
                            BaseValue::None
                        }
                        ValueType::KTypeMerge => unreachable!(),
                    }
                };

                let operands = self.values.operands();
                let merged = timed_full_merge(
                    operator.as_ref(),
                    &user_key,
                    base,
                    operands,
                    stats.as_deref(),
                    false,
                )?;
                self.store_resolved(merged);
                iter.next();
                return Ok(MergeOutcome::Resolved);
            }

            // Hit a merge operand. Filter it, check tombstone shadowing,
            // and queue it until a base value or a chain boundary shows
            // up.
            let operand = iter.value();
            let mut decision = if sequence <= self.latest_snapshot {
                // Visible to a live snapshot: must be written out no
                // matter what the filter says.
                FilterDecision::Keep
            } else {
                self.filter_merge(&user_key, operand)
            };
            if covered && !matches!(decision, FilterDecision::SkipUntil(_)) {
                if let Some(stats) = scan.iter_stats.as_deref_mut() {
                    stats.num_shadowed_operands += 1;
                }
                decision = FilterDecision::Drop;
            }

            match decision {
                FilterDecision::Keep => {
                    self.keys.push_front(Bytes::copy_from_slice(iter.key()));
                    self.values.push_operand(Bytes::copy_from_slice(operand));
                    if let Some(stats) = scan.iter_stats.as_deref_mut() {
                        stats.num_merge_operands += 1;
                    }
                }
                FilterDecision::Drop => {}
                FilterDecision::ChangeValue(replacement) => {
                    // The replacement anchors the chain like a base value
                    // found at this position; nothing older matters.
                    if self.keys.is_empty() {
                        let mut key = iter.key().to_vec();
                        update_internal_key(&mut key, sequence, ValueType::KTypeValue);
                        self.keys.push_front(key.into());
                        self.values.push_operand(replacement.into());
                    } else {
                        let operands = self.values.operands();
                        let merged = timed_full_merge(
                            operator.as_ref(),
                            &user_key,
                            BaseValue::Plain(&replacement),
                            operands,
                            stats.as_deref(),
                            false,
                        )?;
                        self.store_resolved(merged);
                    }
                    iter.next();
                    return Ok(MergeOutcome::Resolved);
                }
                FilterDecision::SkipUntil(target) => {
                    // The entire accumulation is void; report the seek
                    // target so the caller can fast-forward.
                    self.keys.clear();
                    self.values.clear();
                    self.filter_skip_until = Some(InternalKey::new(
                        &target,
                        MAX_KEY_SEQUENCE,
                        VALUE_TYPE_FOR_SEEK,
                    ));
                    return Ok(MergeOutcome::Resolved);
                }
            }

            iter.next();
            if keep_history {
                // The operand may still be read at its own timestamp;
                // nothing older can fold into it.
                break 'scan;
            }
        }

        if self.values.is_empty() {
            // All operands were filtered out.
            return Ok(MergeOutcome::Resolved);
        }

        if scan.at_bottom && (hit_next_user_key || !iter.valid()) && !keep_history {
            // We have seen this key's entire history: the missing base is
            // a genuine absence. Fold and say goodbye to the merge type.
            let operands = self.values.operands();
            let merged = timed_full_merge(
                operator.as_ref(),
                &user_key,
                BaseValue::None,
                operands,
                stats.as_deref(),
                false,
            )?;
            self.store_resolved(merged);
            return Ok(MergeOutcome::Resolved);
        }

        // The beginning of the key's history is below this level. Try to
        // collapse the stacked operands into one; either way the chain
        // stays unresolved for a later pass.
        let num_operands = self.values.num_operands();
        if num_operands >= 2 || (num_operands == 1 && operator.allow_single_operand()) {
            let combined = {
                let operands = self.values.operands();
                let timer = Instant::now();
                let combined = operator.partial_merge_multi(&user_key, operands);
                if let Some(stats) = stats.as_deref() {
                    stats.record_merge_operation(timer.elapsed());
                }
                combined
            };
            if let Some(combined) = combined {
                // The newest key of the chain now carries the combined
                // operand; everything older collapses into it.
                let newest = self
                    .keys
                    .back()
                    .cloned()
                    .expect("keys track operands one to one");
                self.keys.clear();
                self.values.clear();
                self.keys.push_front(newest);
                self.values.push_operand(combined.into());
            }
        }
        Ok(MergeOutcome::InProgress)
    }

    /// Run the compaction filter on one operand, charging the filter
    /// timer. A `SkipUntil` target that does not move the scan strictly
    /// forward is invalid and downgrades to `Keep`.
    pub fn filter_merge(&mut self, user_key: &[u8], operand: &[u8]) -> FilterDecision {
        let filter = match &self.compaction_filter {
            Some(filter) => filter.clone(),
            None => return FilterDecision::Keep,
        };
        let timer = Instant::now();
        let mut decision = filter.filter_merge(self.level, user_key, operand);
        if let FilterDecision::SkipUntil(target) = &decision {
            if self.user_comparator.compare(target, user_key) != Ordering::Greater {
                warn!(
                    "compaction filter '{}' returned a skip target at or before the current key; keeping the operand",
                    filter.name()
                );
                decision = FilterDecision::Keep;
            }
        }
        let elapsed = timer.elapsed();
        self.total_filter_time += elapsed;
        if let Some(stats) = &self.stats {
            stats.record_filter_operation(elapsed);
        }
        decision
    }

    /// Replace the buffers with the single folded result. The newest kept
    /// entry anchors it: its sequence number shadows the whole chain and
    /// its type is rewritten to the merged shape.
    fn store_resolved(&mut self, merged: RawMergeResult) {
        let newest = self.keys.back().expect("resolved chain is never empty");
        let mut key = newest.to_vec();
        let tag = decode_fixed_64(&key[key.len() - INTERNAL_KEY_TAIL..]);
        update_internal_key(&mut key, tag >> 8, merged.value_type());
        self.keys.clear();
        self.values.clear();
        self.keys.push_front(key.into());
        self.values.push_operand(merged.into_bytes());
    }
}

/// Iterates the result of the last `merge_until` in emission order, newest
/// entry first. The backing buffers fill toward the front as the scan
/// walks newest to oldest, so the first-seen record sits in the last
/// position; this cursor starts there and walks backward. The storage
/// order stays private and changeable.
pub struct MergeOutputIterator<'a> {
    keys: &'a VecDeque<Bytes>,
    values: &'a MergeContext,
    pos: isize,
}

impl<'a> MergeOutputIterator<'a> {
    pub fn new<C: Comparator>(merge_helper: &'a MergeHelper<C>) -> Self {
        MergeOutputIterator {
            keys: &merge_helper.keys,
            values: &merge_helper.values,
            pos: -1,
        }
    }

    /// Position at the first record of the output.
    pub fn seek_to_first(&mut self) {
        self.pos = self.keys.len() as isize - 1;
    }

    /// Advance to the next record of the output.
    pub fn next(&mut self) {
        self.pos -= 1;
    }

    pub fn valid(&self) -> bool {
        self.pos >= 0
    }

    pub fn key(&self) -> &[u8] {
        &self.keys[self.pos as usize]
    }

    pub fn value(&self) -> &[u8] {
        self.values
            .get(self.pos as usize)
            .expect("keys and values are parallel")
    }
}
