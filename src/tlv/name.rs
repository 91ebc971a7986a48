// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! TLV-backed content names with cheap prefix slices.
//!
//! All prefixes of a name share the same guts: the byte buffer, the parsed
//! segment extents and the cumulative hash cache live behind one `Rc`, and a
//! slice is a shallow copy with a shorter segment count. The cumulative hash
//! of prefix `k` is `H_k = fold(H_{k-1}, segment_k)`, computed lazily and
//! cached, so hashing any already-seen prefix is O(1).

use std::{cell::RefCell, fmt, hash::Hash, rc::Rc};

use bytes::Bytes;

use crate::tlv::{CodecError, extent::TlvExtent};

/// Segment extent vectors start here and double as the parser outgrows them.
const INITIAL_SEGMENT_CAPACITY: usize = 16;

const FNV1A_OFFSET: u32 = 0x811c_9dc5;
const FNV1A_PRIME: u32 = 0x0100_0193;

fn fnv1a_fold(seed: u32, bytes: &[u8]) -> u32 {
    let mut h = seed;
    for &b in bytes {
        h ^= u32::from(b);
        h = h.wrapping_mul(FNV1A_PRIME);
    }
    h
}

struct NameData {
    buf: Bytes,
    /// Extents cover the whole segment TLV (type, length and value).
    segments: Vec<TlvExtent>,
    /// Cumulative hashes through each prefix length, extended on demand.
    hashes: RefCell<Vec<u32>>,
}

/// An ordered sequence of typed name segments.
///
/// Cloning and [`Name::prefix`] are O(1) and share storage.
#[derive(Clone)]
pub struct Name {
    data: Rc<NameData>,
    seg_count: usize,
}

impl Name {
    /// Parse the value region of a Name TLV (concatenated segment TLVs).
    pub fn from_bytes(buf: Bytes) -> Result<Self, CodecError> {
        let mut segments = Vec::with_capacity(INITIAL_SEGMENT_CAPACITY);
        let mut offset = 0usize;
        while offset < buf.len() {
            if offset + 4 > buf.len() {
                return Err(CodecError::Malformed("name segment shorter than a TLV"));
            }
            let length =
                u16::from_be_bytes([buf[offset + 2], buf[offset + 3]]) as usize;
            if offset + 4 + length > buf.len() {
                return Err(CodecError::Malformed("name segment exceeds name"));
            }
            segments.push(TlvExtent::new(offset, 4 + length));
            offset += 4 + length;
        }

        let seg_count = segments.len();
        Ok(Self {
            data: Rc::new(NameData {
                buf,
                segments,
                hashes: RefCell::new(Vec::with_capacity(seg_count)),
            }),
            seg_count,
        })
    }

    #[inline]
    pub fn segment_count(&self) -> usize {
        self.seg_count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.seg_count == 0
    }

    /// The whole segment TLV (type, length and value) at index `i`.
    pub fn segment(&self, i: usize) -> &[u8] {
        assert!(i < self.seg_count, "segment index out of range");
        &self.data.buf[self.data.segments[i].range()]
    }

    /// Owned zero-copy slice of segment `i`, for use as a trie key.
    pub fn segment_bytes(&self, i: usize) -> Bytes {
        assert!(i < self.seg_count, "segment index out of range");
        self.data.buf.slice(self.data.segments[i].range())
    }

    pub fn segment_type(&self, i: usize) -> u16 {
        let seg = self.segment(i);
        u16::from_be_bytes([seg[0], seg[1]])
    }

    pub fn segment_value(&self, i: usize) -> &[u8] {
        &self.segment(i)[4..]
    }

    /// The first `k` segments, sharing storage with `self`.
    pub fn prefix(&self, k: usize) -> Name {
        assert!(k <= self.seg_count, "prefix longer than name");
        Name {
            data: Rc::clone(&self.data),
            seg_count: k,
        }
    }

    /// True when `self` begins with every segment of `other`.
    pub fn starts_with(&self, other: &Name) -> bool {
        other.seg_count <= self.seg_count
            && self.region_through(other.seg_count) == other.region_through(other.seg_count)
    }

    /// Cumulative 32-bit hash through the first `k` segments.
    ///
    /// `hash_of(prefix(k)) == cumulative_hash(k)` for any `k`; the cache is
    /// shared by all slices of this name, so later prefixes extend it.
    pub fn cumulative_hash(&self, k: usize) -> u32 {
        assert!(k <= self.data.segments.len(), "prefix longer than name");
        let mut hashes = self.data.hashes.borrow_mut();
        while hashes.len() < k {
            let i = hashes.len();
            let seed = if i == 0 { FNV1A_OFFSET } else { hashes[i - 1] };
            let seg = &self.data.buf[self.data.segments[i].range()];
            hashes.push(fnv1a_fold(seed, seg));
        }
        if k == 0 { FNV1A_OFFSET } else { hashes[k - 1] }
    }

    /// Hash over this name's full (possibly sliced) length.
    pub fn hash32(&self) -> u32 {
        self.cumulative_hash(self.seg_count)
    }

    fn region_through(&self, k: usize) -> &[u8] {
        if k == 0 {
            return &[];
        }
        &self.data.buf[..self.data.segments[k - 1].range().end]
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.seg_count == other.seg_count
            && self.region_through(self.seg_count)
                == other.region_through(other.seg_count)
    }
}

impl Eq for Name {}

impl Hash for Name {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        state.write_u32(self.hash32());
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lci:")?;
        if self.is_empty() {
            return write!(f, "/");
        }
        for i in 0..self.seg_count {
            let value = self.segment_value(i);
            if !value.is_empty()
                && value.iter().all(|b| b.is_ascii_graphic() && *b != b'/')
            {
                write!(f, "/{}", String::from_utf8_lossy(value))?;
            } else {
                write!(f, "/0x{}", hex::encode(value))?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({self})")
    }
}
