use crate::IResult;

/// An internal-key iterator. Entries are ordered by user key ascending,
/// then sequence number descending, so all versions of one user key are
/// adjacent with the newest first.
///
/// `key()`/`value()` borrow buffers owned by the iterator and are
/// invalidated by any repositioning call.
pub trait Iter {
    /// An iterator is either positioned at a key/value pair, or not valid.
    fn valid(&self) -> bool;

    /// Position at the first entry in the source. Final state is `valid()`
    /// iff the source is not empty.
    fn seek_to_first(&mut self);

    /// Position at the first entry at or past `target` (an encoded
    /// internal key).
    fn seek(&mut self, target: &[u8]);

    /// Move to the next entry. REQUIRES: `valid()`.
    fn next(&mut self);

    /// The encoded internal key of the current entry. REQUIRES: `valid()`.
    fn key(&self) -> &[u8];

    /// The value of the current entry. REQUIRES: `valid()`.
    fn value(&self) -> &[u8];

    /// An error encountered by the source, if any.
    fn status(&mut self) -> IResult<()>;
}
