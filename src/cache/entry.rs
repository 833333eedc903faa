//! Framed cache entries
//!
//! Each resident value is stored as one contiguous little-endian frame so the
//! shard can recover the stored key for collision checks:
//!
//! ```text
//!   0        8        16     18          18+k
//!   ┌────────┬────────┬──────┬───────────┬─────────────┐
//!   │  ts    │  hash  │ klen │    key    │    value    │
//!   │  u64   │  u64   │ u16  │  k bytes  │  remainder  │
//!   └────────┴────────┴──────┴───────────┴─────────────┘
//! ```
//!
//! Readers assume a well-formed frame and panic on a truncated one.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};

/// Bytes preceding the key: timestamp, hash and key length
pub const HEADER_LEN: usize = 8 + 8 + 2;

/// Largest key the 16-bit length field can describe
pub const MAX_KEY_LEN: usize = u16::MAX as usize;

/// Total framed size of an entry
#[inline]
pub fn framed_len(key_len: usize, value_len: usize) -> usize {
    HEADER_LEN + key_len + value_len
}

/// Current Unix time in seconds
pub fn now_timestamp() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

/// Build a frame for `key`/`value`
pub fn frame(timestamp: u64, hash: u64, key: &str, value: &[u8]) -> Result<Bytes> {
    if key.len() > MAX_KEY_LEN {
        return Err(Error::KeyTooLong { len: key.len() });
    }

    let mut buf = BytesMut::with_capacity(framed_len(key.len(), value.len()));
    buf.put_u64_le(timestamp);
    buf.put_u64_le(hash);
    buf.put_u16_le(key.len() as u16);
    buf.put_slice(key.as_bytes());
    buf.put_slice(value);
    Ok(buf.freeze())
}

#[inline]
pub fn timestamp_of(frame: &[u8]) -> u64 {
    (&frame[0..8]).get_u64_le()
}

#[inline]
pub fn hash_of(frame: &[u8]) -> u64 {
    (&frame[8..16]).get_u64_le()
}

#[inline]
fn key_len_of(frame: &[u8]) -> usize {
    (&frame[16..HEADER_LEN]).get_u16_le() as usize
}

/// Key bytes embedded in the frame
#[inline]
pub fn key_of(frame: &[u8]) -> &[u8] {
    let len = key_len_of(frame);
    &frame[HEADER_LEN..HEADER_LEN + len]
}

/// Value bytes, sharing the frame's allocation
#[inline]
pub fn value_of(frame: &Bytes) -> Bytes {
    frame.slice(HEADER_LEN + key_len_of(frame)..)
}

// =============================================================================
// Tests
// =============================================================================
