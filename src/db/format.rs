use num_traits::FromPrimitive;

use crate::util::coding::{decode_fixed_64, put_fixed_64};
use crate::{Error, IResult};

/// The max key sequence number. The value is 2^56 - 1 because the sequence
/// number only takes 56 bits when it is serialized to an internal key.
pub const MAX_KEY_SEQUENCE: u64 = (1u64 << 56) - 1;

/// The tail bytes length of an internal key
/// 7bytes sequence number + 1byte type number
pub const INTERNAL_KEY_TAIL: usize = 8;

#[derive(Debug, Clone, Copy, Eq, PartialEq, FromPrimitive)]
pub enum ValueType {
    KTypeDeletion = 0x0,
    KTypeValue = 0x1,
    KTypeMerge = 0x2,
    KTypeSingleDeletion = 0x3,
    /// The value bytes are an index into a blob file; the real value is
    /// resolved through a `BlobFetcher`.
    KTypeBlobIndex = 0x4,
    /// The value bytes are a serialized wide-column entity.
    KTypeWideColumnEntity = 0x5,
}

/// The type used when seeking to a user key: it sorts before every entry of
/// the same (user key, sequence) because entries sort by descending tag.
pub const VALUE_TYPE_FOR_SEEK: ValueType = ValueType::KTypeWideColumnEntity;

impl ValueType {
    /// True for entry types that can serve as the base value of a merge
    /// chain (everything except a merge operand).
    pub fn is_base_value(self) -> bool {
        self != ValueType::KTypeMerge
    }
}

/// Compose the sequence number and value type into a single u64.
pub fn compose_seq_number_and_type(seq_number: u64, value_type: ValueType) -> u64 {
    assert!(
        seq_number <= MAX_KEY_SEQUENCE,
        "key sequence number should be less than {}, but got {}",
        MAX_KEY_SEQUENCE,
        seq_number
    );
    seq_number << 8 | value_type as u64
}

/// An internal key parsed into its three components. The user key borrows
/// from the encoded input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedInternalKey<'a> {
    pub user_key: &'a [u8],
    pub sequence: u64,
    pub value_type: ValueType,
}

/// Split an encoded internal key into (user key, sequence, type).
///
/// `allow_data_in_errors` controls whether the raw key bytes appear in the
/// error message of a malformed key.
pub fn parse_internal_key(key: &[u8], allow_data_in_errors: bool) -> IResult<ParsedInternalKey<'_>> {
    if key.len() < INTERNAL_KEY_TAIL {
        return Err(corrupt_key_error("internal key too short", key, allow_data_in_errors));
    }
    let tag = decode_fixed_64(&key[key.len() - INTERNAL_KEY_TAIL..]);
    let value_type = match ValueType::from_u64(tag & 0xff) {
        Some(t) => t,
        None => {
            return Err(corrupt_key_error("unknown value type", key, allow_data_in_errors));
        }
    };
    Ok(ParsedInternalKey {
        user_key: &key[..key.len() - INTERNAL_KEY_TAIL],
        sequence: tag >> 8,
        value_type,
    })
}

fn corrupt_key_error(reason: &str, key: &[u8], allow_data_in_errors: bool) -> Error {
    if allow_data_in_errors {
        Error::corruption(format!("{}: {:?}", reason, key))
    } else {
        Error::corruption(reason)
    }
}

/// Append `user_key` plus the packed tail to `dst`.
pub fn append_internal_key(dst: &mut Vec<u8>, user_key: &[u8], sequence: u64, value_type: ValueType) {
    dst.extend_from_slice(user_key);
    put_fixed_64(dst, compose_seq_number_and_type(sequence, value_type));
}

/// Rewrite the sequence/type tail of an encoded internal key in place.
pub fn update_internal_key(ikey: &mut [u8], sequence: u64, value_type: ValueType) {
    assert!(ikey.len() >= INTERNAL_KEY_TAIL);
    let tag = compose_seq_number_and_type(sequence, value_type);
    let tail = ikey.len() - INTERNAL_KEY_TAIL;
    ikey[tail..].copy_from_slice(&tag.to_le_bytes());
}

/// The timestamp suffix of a user key under a timestamp-aware comparator.
pub fn extract_timestamp_from_user_key(user_key: &[u8], ts_sz: usize) -> &[u8] {
    debug_assert!(user_key.len() >= ts_sz);
    &user_key[user_key.len() - ts_sz..]
}

/// An owned, encoded internal key.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InternalKey {
    data: Vec<u8>,
}

impl InternalKey {
    pub fn new(user_key: &[u8], sequence: u64, value_type: ValueType) -> Self {
        let mut data = Vec::with_capacity(user_key.len() + INTERNAL_KEY_TAIL);
        append_internal_key(&mut data, user_key, sequence, value_type);
        InternalKey { data }
    }

    pub fn decoded_from(encoded: &[u8]) -> Self {
        InternalKey {
            data: encoded.to_vec(),
        }
    }

    pub fn encoded(&self) -> &[u8] {
        &self.data
    }

    pub fn user_key(&self) -> &[u8] {
        &self.data[..self.data.len().saturating_sub(INTERNAL_KEY_TAIL)]
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
