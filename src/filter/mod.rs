//! Cuckoo Admission Filter
//!
//! Gate that defers caching of one-hit wonders: a key is only stored once
//! the filter has already seen it.
//!
//! # Architecture
//!
//! ```text
//!   key ──► hash(seed 0) % n ──────────────► i1
//!      └──► hash(seed 1335) % 255 + 1 ─────► fp ──► i2 = (i1 ^ hash(fp)) % n
//!
//!   buckets: [ fp fp fp fp ][ fp fp 0 0 ] ... (n = power of two)
//! ```

mod bucket;
mod cuckoo;
mod proptest;

pub use bucket::{Bucket, BUCKET_SIZE, EMPTY_FINGERPRINT};
pub use cuckoo::{CuckooFilter, FilterStats, MAX_CUCKOO_KICKS};
