//! Key codec
//!
//! Keys and values are sequences of 4-byte unsigned columns stored
//! little-endian and concatenated. A tree fixes its key width as a multiple of
//! the column size; ordering compares column by column in declared order.
//!
//! ```text
//! ┌──────────┬──────────┬─────┬──────────┐
//! │ col0 (4) │ col1 (4) │ ... │ colN (4) │
//! └──────────┴──────────┴─────┴──────────┘
//! ```

use std::cmp::Ordering;

use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Width of a single column in bytes
pub const COLUMN_SIZE: usize = 4;

/// Smallest column value, used to build open lower bounds
pub const MIN_COLUMN: u32 = u32::MIN;

/// Largest column value, used to build open upper bounds
pub const MAX_COLUMN: u32 = u32::MAX;

/// Outcome of comparing two keys over a given width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOrdering {
    Less,
    Equal,
    Greater,
    /// The width is not a positive multiple of the column size, or one of
    /// the operands is shorter than it
    Indeterminate,
}

impl KeyOrdering {
    /// Convert to a standard ordering; `None` when indeterminate
    pub fn as_ordering(self) -> Option<Ordering> {
        match self {
            KeyOrdering::Less => Some(Ordering::Less),
            KeyOrdering::Equal => Some(Ordering::Equal),
            KeyOrdering::Greater => Some(Ordering::Greater),
            KeyOrdering::Indeterminate => None,
        }
    }
}

impl From<Ordering> for KeyOrdering {
    fn from(ordering: Ordering) -> Self {
        match ordering {
            Ordering::Less => KeyOrdering::Less,
            Ordering::Equal => KeyOrdering::Equal,
            Ordering::Greater => KeyOrdering::Greater,
        }
    }
}

/// Encode columns into a key/value byte string
pub fn encode(columns: &[u32]) -> Bytes {
    let mut buf = BytesMut::with_capacity(columns.len() * COLUMN_SIZE);
    for &column in columns {
        buf.put_u32_le(column);
    }
    buf.freeze()
}

/// Decode every whole column; a trailing partial column is ignored
pub fn decode(mut bytes: &[u8]) -> Vec<u32> {
    let mut columns = Vec::with_capacity(bytes.len() / COLUMN_SIZE);
    while bytes.remaining() >= COLUMN_SIZE {
        columns.push(bytes.get_u32_le());
    }
    columns
}

/// Width of an encoded key in bytes
pub fn width(bytes: &[u8]) -> usize {
    bytes.len()
}

/// Number of whole columns in an encoded key
pub fn column_count(bytes: &[u8]) -> usize {
    bytes.len() / COLUMN_SIZE
}

/// A key of `width` bytes with every column set to `column`
///
/// `bound(8, MIN_COLUMN)` and `bound(8, MAX_COLUMN)` span every two-column key.
pub fn bound(width: usize, column: u32) -> Bytes {
    encode(&vec![column; width / COLUMN_SIZE])
}

/// Compare the first `key_width` bytes of `a` and `b` column by column
///
/// Short-circuits on the first unequal column.
pub fn compare(a: &[u8], b: &[u8], key_width: usize) -> KeyOrdering {
    if key_width == 0 || key_width % COLUMN_SIZE != 0 {
        return KeyOrdering::Indeterminate;
    }
    if a.len() < key_width || b.len() < key_width {
        return KeyOrdering::Indeterminate;
    }

    let mut left = &a[..key_width];
    let mut right = &b[..key_width];
    while left.has_remaining() {
        match left.get_u32_le().cmp(&right.get_u32_le()) {
            Ordering::Equal => continue,
            unequal => return unequal.into(),
        }
    }
    KeyOrdering::Equal
}
