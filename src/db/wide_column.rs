use bytes::Bytes;

use crate::util::coding::VarintU32;
use crate::{Error, IResult};

/// Name of the designated default column. It is the empty byte string, so a
/// default column always sorts first in an entity.
pub const DEFAULT_COLUMN_NAME: &[u8] = b"";

const WIDE_COLUMN_VERSION: u32 = 1;

/// A single named sub-value of a wide-column entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WideColumn {
    pub name: Bytes,
    pub value: Bytes,
}

impl WideColumn {
    pub fn new(name: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        WideColumn {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn is_default(&self) -> bool {
        self.name.as_ref() == DEFAULT_COLUMN_NAME
    }
}

/// An ordered set of named columns under one key. Names are unique and
/// strictly ascending; at most one default (empty-named) column exists and,
/// when present, it is the first.
///
/// The serialized layout is:
///
/// ```text
///   +--------------------+
///   | varint32 version   |
///   +--------------------+
///   | varint32 count     |
///   +--------------------+ ---------------- repeated `count` times
///   | varint32 name len  |
///   | name bytes         |
///   | varint32 value len |
///   | value bytes        |
///   +--------------------+ ----------------
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WideColumns {
    columns: Vec<WideColumn>,
}

impl WideColumns {
    /// Build from columns already sorted by name. Fails with `Corruption`
    /// if the names are not strictly ascending.
    pub fn new(columns: Vec<WideColumn>) -> IResult<Self> {
        for pair in columns.windows(2) {
            if pair[0].name >= pair[1].name {
                return Err(Error::corruption("wide columns out of order or duplicated"));
            }
        }
        Ok(WideColumns { columns })
    }

    /// Build from columns in arbitrary order. Sorts by name; duplicate
    /// names are `Corruption`.
    pub fn from_unsorted(mut columns: Vec<WideColumn>) -> IResult<Self> {
        columns.sort_by(|a, b| a.name.cmp(&b.name));
        Self::new(columns)
    }

    pub fn columns(&self) -> &[WideColumn] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// The default column, if this entity has one.
    pub fn default_column(&self) -> Option<&WideColumn> {
        self.columns.first().filter(|c| c.is_default())
    }

    pub fn get(&self, name: &[u8]) -> Option<&WideColumn> {
        self.columns
            .binary_search_by(|c| c.name.as_ref().cmp(name))
            .ok()
            .map(|idx| &self.columns[idx])
    }

    pub fn encode(&self) -> Bytes {
        let mut out = vec![];
        VarintU32::put_varint(&mut out, WIDE_COLUMN_VERSION);
        VarintU32::put_varint(&mut out, self.columns.len() as u32);
        for column in &self.columns {
            VarintU32::put_varint_prefixed_slice(&mut out, &column.name);
            VarintU32::put_varint_prefixed_slice(&mut out, &column.value);
        }
        Bytes::from(out)
    }

    pub fn decode(input: &[u8]) -> IResult<WideColumns> {
        let mut src = input;
        let version = VarintU32::get_varint(&mut src)
            .ok_or_else(|| Error::corruption("truncated wide-column header"))?;
        if version != WIDE_COLUMN_VERSION {
            return Err(Error::corruption(format!(
                "unsupported wide-column version {}",
                version
            )));
        }
        let count = VarintU32::get_varint(&mut src)
            .ok_or_else(|| Error::corruption("truncated wide-column header"))?;
        let mut columns = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let name = VarintU32::get_varint_prefixed_slice(&mut src)
                .ok_or_else(|| Error::corruption("truncated wide-column name"))?;
            let value = VarintU32::get_varint_prefixed_slice(&mut src)
                .ok_or_else(|| Error::corruption("truncated wide-column value"))?;
            columns.push(WideColumn::new(name.to_vec(), value.to_vec()));
        }
        if !src.is_empty() {
            return Err(Error::corruption("trailing bytes after wide columns"));
        }
        WideColumns::new(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity() -> WideColumns {
        WideColumns::new(vec![
            WideColumn::new(&b""[..], &b"base"[..]),
            WideColumn::new(&b"attr"[..], &b"red"[..]),
            WideColumn::new(&b"size"[..], &b"42"[..]),
        ])
        .unwrap()
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let cols = entity();
        let decoded = WideColumns::decode(&cols.encode()).unwrap();
        assert_eq!(decoded, cols);
    }

    #[test]
    fn test_default_column() {
        let cols = entity();
        assert_eq!(cols.default_column().unwrap().value.as_ref(), b"base");

        let no_default =
            WideColumns::new(vec![WideColumn::new(&b"attr"[..], &b"red"[..])]).unwrap();
        assert!(no_default.default_column().is_none());
    }

    #[test]
    fn test_get_by_name() {
        let cols = entity();
        assert_eq!(cols.get(b"size").unwrap().value.as_ref(), b"42");
        assert!(cols.get(b"missing").is_none());
    }

    #[test]
    fn test_rejects_duplicates() {
        let dup = vec![
            WideColumn::new(&b"a"[..], &b"1"[..]),
            WideColumn::new(&b"a"[..], &b"2"[..]),
        ];
        assert!(WideColumns::new(dup.clone()).is_err());
        assert!(WideColumns::from_unsorted(dup).is_err());
    }

    #[test]
    fn test_from_unsorted_sorts() {
        let cols = WideColumns::from_unsorted(vec![
            WideColumn::new(&b"b"[..], &b"2"[..]),
            WideColumn::new(&b""[..], &b"0"[..]),
            WideColumn::new(&b"a"[..], &b"1"[..]),
        ])
        .unwrap();
        assert!(cols.columns()[0].is_default());
        assert_eq!(cols.columns()[2].name.as_ref(), b"b");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(WideColumns::decode(b"\xff\xff\xff\xff\xff\xff").is_err());
        // Valid header, truncated payload.
        let mut buf = vec![];
        VarintU32::put_varint(&mut buf, WIDE_COLUMN_VERSION);
        VarintU32::put_varint(&mut buf, 3);
        assert!(WideColumns::decode(&buf).is_err());
        // Trailing bytes.
        let mut buf = entity().encode().to_vec();
        buf.push(0);
        assert!(WideColumns::decode(&buf).is_err());
    }
}
