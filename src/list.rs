//
// MVL Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

//! # Named list.
//!
//! An ordered, tag-indexed sequence of 64-bit values with an optional
//! open-addressed hash side-index for fast lookup. Tags may repeat; lookups
//! return the value of the *last* inserted entry with a matching tag.
//!
//! This is the in-memory structure behind both a writer's pending directory
//! / interned-string cache, and a reader's parsed directory / attributes
//! lists.

use crate::hash::{hash_bytes, Flags};
use crate::reader::Reader;

/// Sentinel meaning "end of chain" / "empty bucket", mirroring the format's
/// `~0` convention in a signed representation.
const END_OF_CHAIN: i64 = -1;

/// Minimum capacity a freshly created list reserves.
const MIN_CAPACITY: usize = 10;

struct HashIndex {
    buckets: Vec<i64>,
    next: Vec<i64>,
}

impl HashIndex {
    fn bucket_count_for(len: usize) -> usize {
        let mut n = 1usize;
        while n < len.max(1) {
            n <<= 1;
        }
        n
    }

    fn build(tags: &[Vec<u8>]) -> HashIndex {
        let bucket_count = Self::bucket_count_for(tags.len());
        let mut buckets = vec![END_OF_CHAIN; bucket_count];
        let mut next = vec![END_OF_CHAIN; tags.len()];

        for (i, tag) in tags.iter().enumerate() {
            let h = hash_bytes(tag, Flags::BOTH);
            let bucket = (h as usize) & (bucket_count - 1);
            next[i] = buckets[bucket];
            buckets[bucket] = i as i64;
        }

        HashIndex { buckets, next }
    }

    /// Links tag `idx` into its bucket's chain without touching any other
    /// entry — O(1), used to keep an already-sized index current between
    /// full rebuilds.
    fn insert(&mut self, tags: &[Vec<u8>], idx: usize) {
        let bucket_count = self.buckets.len();
        let h = hash_bytes(&tags[idx], Flags::BOTH);
        let bucket = (h as usize) & (bucket_count - 1);
        self.next.push(self.buckets[bucket]);
        self.buckets[bucket] = idx as i64;
    }

    fn find(&self, tags: &[Vec<u8>], tag: &[u8]) -> Option<usize> {
        let bucket_count = self.buckets.len();
        let h = hash_bytes(tag, Flags::BOTH);
        let mut cursor = self.buckets[(h as usize) & (bucket_count - 1)];
        while cursor != END_OF_CHAIN {
            let idx = cursor as usize;
            if tags[idx] == tag {
                return Some(idx);
            }
            cursor = self.next[idx];
        }
        None
    }
}

/// Ordered, tag-indexed collection of 64-bit values.
pub struct NamedList {
    tags: Vec<Vec<u8>>,
    values: Vec<u64>,
    hash_index: Option<HashIndex>,
}

impl NamedList {
    /// Creates an empty list with room for at least `expected_size` entries
    /// (capacity floor of `MIN_CAPACITY`, matching the source library).
    pub fn create(expected_size: usize) -> NamedList {
        let capacity = expected_size.max(MIN_CAPACITY);
        NamedList {
            tags: Vec::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
            hash_index: None,
        }
    }

    /// Number of entries currently stored.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Appends a new `(tag, value)` pair; amortized O(1). The tag is copied.
    /// If a hash side-index is attached, the new entry is linked into it in
    /// O(1) — unless the bucket table has fallen behind the power-of-two
    /// size the new length calls for, in which case the whole index is
    /// rebuilt, same as a `Vec`'s occasional doubling reallocation.
    pub fn append(&mut self, tag: &[u8], value: u64) {
        self.tags.push(tag.to_vec());
        self.values.push(value);

        let up_to_date = self
            .hash_index
            .as_ref()
            .map(|index| index.buckets.len() == HashIndex::bucket_count_for(self.tags.len()));

        match up_to_date {
            Some(true) => {
                let idx = self.tags.len() - 1;
                self.hash_index.as_mut().unwrap().insert(&self.tags, idx);
            }
            Some(false) => self.rebuild_hash(),
            None => {}
        }
    }

    /// Builds (or rebuilds) the hash side-index. Bucket count is the
    /// smallest power of two not less than the list's length.
    pub fn rebuild_hash(&mut self) {
        self.hash_index = Some(HashIndex::build(&self.tags));
    }

    /// Drops the hash side-index, falling back to linear search in `find`.
    pub fn drop_hash(&mut self) {
        self.hash_index = None;
    }

    /// Looks up the value of the most-recently-inserted entry matching `tag`.
    pub fn find(&self, tag: &[u8]) -> Option<u64> {
        if let Some(ref index) = self.hash_index {
            return index.find(&self.tags, tag).map(|i| self.values[i]);
        }
        self.tags
            .iter()
            .enumerate()
            .rev()
            .find(|(_, t)| t.as_slice() == tag)
            .map(|(i, _)| self.values[i])
    }

    /// Iterates entries in insertion order as `(tag, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], u64)> {
        self.tags.iter().map(|t| t.as_slice()).zip(self.values.iter().copied())
    }

    pub fn tag_at(&self, i: usize) -> &[u8] {
        &self.tags[i]
    }

    pub fn value_at(&self, i: usize) -> u64 {
        self.values[i]
    }

    /// Resolves `tag` to a vector offset via `find`, then reads element
    /// `idx` out of that vector as a widened `f64`. `NAN` if the tag is
    /// absent, the offset fails validation, or the vector is non-numeric.
    pub fn get_double<'a>(&self, reader: &Reader<'a>, tag: &[u8], idx: u64) -> f64 {
        self.get_double_default(reader, tag, idx, f64::NAN)
    }

    /// `get_double`, substituting `default` in every case that would
    /// otherwise produce `NAN`.
    pub fn get_double_default<'a>(&self, reader: &Reader<'a>, tag: &[u8], idx: u64, default: f64) -> f64 {
        match self.find(tag).and_then(|offset| reader.vector_at(offset).ok()) {
            Some(vector) => vector.view.as_double_default(idx, default),
            None => default,
        }
    }

    /// Resolves `tag` to a vector offset via `find`, then reads element
    /// `idx` out of that vector as an `OFFSET64` value. `0` if the tag is
    /// absent, the offset fails validation, or the vector is not `OFFSET64`.
    pub fn get_offset<'a>(&self, reader: &Reader<'a>, tag: &[u8], idx: u64) -> u64 {
        match self.find(tag).and_then(|offset| reader.vector_at(offset).ok()) {
            Some(vector) => vector.view.as_offset(idx).unwrap_or(0),
            None => 0,
        }
    }
}

impl std::fmt::Debug for NamedList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut dbg = f.debug_struct("NamedList");
        for (tag, value) in self.iter() {
            let rendered = ascii::AsciiStr::from_ascii(tag)
                .map(|s| s.to_string())
                .unwrap_or_else(|_| format!("{:02x?}", tag));
            dbg.field(&rendered, &value);
        }
        dbg.finish()
    }
}
