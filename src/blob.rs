use bytes::Bytes;
use fxhash::FxHashMap;

use crate::IResult;

/// Translates an indirect value reference (the raw bytes stored under a
/// blob-index entry) into the value it points at. The engine never decodes
/// blob indexes itself; the fetcher owns that format along with its own
/// retry and timeout policy. Any failure propagates to the merge scan
/// unchanged.
pub trait BlobFetcher {
    /// Resolve `blob_index` for `user_key`. Returns the value and the
    /// number of bytes read from the underlying file. When a prefetch
    /// collection is supplied the fetcher may satisfy the read from, and
    /// refill, the per-file readahead window.
    fn fetch_blob(
        &self,
        user_key: &[u8],
        blob_index: &[u8],
        prefetch_buffers: Option<&mut PrefetchBufferCollection>,
    ) -> IResult<(Bytes, u64)>;
}

/// A readahead window over one blob file. Consecutive reads double the
/// window up to the configured maximum, so scans that keep coming back pay
/// fewer I/Os over time.
#[derive(Debug)]
pub struct PrefetchBuffer {
    readahead_size: usize,
    max_readahead_size: usize,
    offset: u64,
    buffer: Vec<u8>,
}

impl PrefetchBuffer {
    pub fn new(initial_readahead_size: usize, max_readahead_size: usize) -> Self {
        PrefetchBuffer {
            readahead_size: initial_readahead_size,
            max_readahead_size,
            offset: 0,
            buffer: vec![],
        }
    }

    /// The number of bytes the next fill should read.
    pub fn readahead_size(&self) -> usize {
        self.readahead_size
    }

    /// If `[offset, offset + n)` lies inside the buffered window, return
    /// those bytes.
    pub fn try_read_from_cache(&self, offset: u64, n: usize) -> Option<&[u8]> {
        if offset < self.offset {
            return None;
        }
        let start = (offset - self.offset) as usize;
        let end = start.checked_add(n)?;
        if end > self.buffer.len() {
            return None;
        }
        Some(&self.buffer[start..end])
    }

    /// Install freshly read bytes starting at `offset` and widen the next
    /// readahead window.
    pub fn fill(&mut self, offset: u64, data: Vec<u8>) {
        self.offset = offset;
        self.buffer = data;
        self.readahead_size = (self.readahead_size * 2).min(self.max_readahead_size);
    }
}

/// Readahead buffers keyed by blob file number, shared across the chains of
/// one compaction.
#[derive(Debug)]
pub struct PrefetchBufferCollection {
    initial_readahead_size: usize,
    max_readahead_size: usize,
    buffers: FxHashMap<u64, PrefetchBuffer>,
}

impl PrefetchBufferCollection {
    pub fn new(initial_readahead_size: usize, max_readahead_size: usize) -> Self {
        PrefetchBufferCollection {
            initial_readahead_size,
            max_readahead_size,
            buffers: FxHashMap::default(),
        }
    }

    pub fn get_or_create(&mut self, file_number: u64) -> &mut PrefetchBuffer {
        let initial = self.initial_readahead_size;
        let max = self.max_readahead_size;
        self.buffers
            .entry(file_number)
            .or_insert_with(|| PrefetchBuffer::new(initial, max))
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}
