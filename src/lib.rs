//! The merge-resolution engine of an LSM-tree key-value store: a pluggable
//! merge-operator contract plus the compaction/read-time machinery that
//! folds chains of pending merge operands against a base value, honoring
//! snapshot visibility, range-tombstone shadowing and user-supplied
//! filtering.
//!
//! On-disk formats, WAL/manifest bookkeeping and the generic iterator
//! machinery live outside this crate and are consumed through the narrow
//! traits in `iterator`, `compaction::filter`, `blob` and
//! `merge::helper`.

#[macro_use]
extern crate num_derive;

pub mod blob;
pub mod compaction;
pub mod db;
mod error;
pub mod iterator;
pub mod merge;
pub mod metrics;
pub mod util;

pub use error::{Error, IResult};
