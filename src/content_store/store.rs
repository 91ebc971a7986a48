// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The Content Store: a bounded LRU + expiry cache of Content Objects.

use std::{
    cmp::Reverse,
    collections::{BinaryHeap, HashMap},
};

use bytes::Bytes;
use tracing::trace;

use crate::{
    content_store::lru::{LruHandle, LruList},
    core::{
        message::Message,
        ticks::{Ticks, ms_to_ticks},
    },
    tlv::name::Name,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsPutResult {
    Stored,
    /// Same `(name, hash)` already cached; the entry was promoted instead.
    Duplicate,
    /// The store is disabled (capacity 0).
    Dropped,
}

struct CsEntry {
    message: Message,
    name: Name,
    key_id: Option<Bytes>,
    hash: Bytes,
    lru: LruHandle,
    expiry: Ticks,
    heap_seq: u64,
}

/// Cache statistics exposed in the forwarder snapshot.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CsStats {
    pub adds: u64,
    pub duplicates: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions_capacity: u64,
    pub evictions_expired: u64,
}

/// Content Objects indexed three ways (name, name+keyid, name+hash) with an
/// LRU ordering and an expiry min-heap over the same entries.
///
/// Every cached entry appears in the slab exactly once, in the LRU exactly
/// once, and under each applicable index; removal goes through
/// [`ContentStore::take_entry`] so the structures cannot drift apart.
pub struct ContentStore {
    capacity: usize,
    default_ttl: Ticks,

    entries: Vec<Option<CsEntry>>,
    free: Vec<usize>,

    by_name: HashMap<Name, Vec<usize>>,
    by_keyid: HashMap<(Name, Bytes), usize>,
    by_hash: HashMap<(Name, Bytes), usize>,

    lru: LruList,
    heap: BinaryHeap<Reverse<(Ticks, u64, usize)>>,
    next_seq: u64,

    stats: CsStats,
}

impl ContentStore {
    pub fn new(capacity: usize, default_ttl: Ticks) -> Self {
        Self {
            capacity,
            default_ttl,
            entries: Vec::new(),
            free: Vec::new(),
            by_name: HashMap::new(),
            by_keyid: HashMap::new(),
            by_hash: HashMap::new(),
            lru: LruList::new(),
            heap: BinaryHeap::new(),
            next_seq: 0,
            stats: CsStats::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.lru.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lru.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> CsStats {
        self.stats
    }

    /// Cache a content object. The caller has already applied the
    /// cacheability policy.
    pub fn put(&mut self, object: &Message, now: Ticks) -> CsPutResult {
        if self.capacity == 0 {
            return CsPutResult::Dropped;
        }
        let name = object
            .name()
            .unwrap_or_else(|| unreachable!("content object without a name"))
            .clone();
        let hash = object.content_object_hash();

        if let Some(&slot) = self.by_hash.get(&(name.clone(), hash.clone())) {
            let handle = self.entries[slot]
                .as_ref()
                .map(|e| e.lru)
                .unwrap_or_else(|| unreachable!("hash index points at empty slot"));
            self.lru.move_to_front(handle);
            self.stats.duplicates += 1;
            return CsPutResult::Duplicate;
        }

        let expiry = self.entry_expiry(object, now);
        let key_id = object.key_id();
        let slot = self.alloc_slot();
        let handle = self.lru.push_front(slot);
        let seq = self.next_seq;
        self.next_seq += 1;

        self.by_hash.insert((name.clone(), hash.clone()), slot);
        if let Some(k) = &key_id {
            self.by_keyid.insert((name.clone(), k.clone()), slot);
        }
        self.by_name.entry(name.clone()).or_default().push(slot);
        self.heap.push(Reverse((expiry, seq, slot)));

        self.entries[slot] = Some(CsEntry {
            message: object.clone(),
            name,
            key_id,
            hash,
            lru: handle,
            expiry,
            heap_seq: seq,
        });
        self.stats.adds += 1;

        while self.lru.len() > self.capacity {
            if let Some(tail_slot) = self.lru.pop_tail() {
                self.take_entry(tail_slot);
                self.stats.evictions_capacity += 1;
            }
        }

        CsPutResult::Stored
    }

    /// Tiered lookup by the interest's most restrictive key. A hit is
    /// promoted; an expired entry is evicted and reported as a miss.
    pub fn match_interest(&mut self, interest: &Message, now: Ticks) -> Option<Message> {
        let name = interest.name()?;

        let slot = if let Some(hash) = interest.object_hash_restriction() {
            self.by_hash.get(&(name.clone(), hash)).copied()
        } else if let Some(key_id) = interest.key_id() {
            self.by_keyid.get(&(name.clone(), key_id)).copied()
        } else {
            self.by_name
                .get(name)
                .and_then(|slots| slots.first())
                .copied()
        };

        let Some(slot) = slot else {
            self.stats.misses += 1;
            return None;
        };
        let entry = self.entries[slot]
            .as_ref()
            .unwrap_or_else(|| unreachable!("index points at empty slot"));

        if entry.expiry <= now {
            let handle = entry.lru;
            self.lru.remove(handle);
            self.take_entry(slot);
            self.stats.evictions_expired += 1;
            self.stats.misses += 1;
            return None;
        }

        let handle = entry.lru;
        let message = entry.message.clone();
        self.lru.move_to_front(handle);
        self.stats.hits += 1;
        Some(message)
    }

    /// Evict entries whose expiry has passed; driven by a periodic
    /// dispatcher timer.
    pub fn purge_expired(&mut self, now: Ticks) -> usize {
        let mut evicted = 0usize;
        while let Some(&Reverse((tick, seq, slot))) = self.heap.peek() {
            if tick > now {
                break;
            }
            self.heap.pop();
            let live = self.entries[slot]
                .as_ref()
                .is_some_and(|e| e.heap_seq == seq && e.expiry <= now);
            if live {
                let handle = self.entries[slot]
                    .as_ref()
                    .map(|e| e.lru)
                    .unwrap_or_else(|| unreachable!("checked above"));
                self.lru.remove(handle);
                self.take_entry(slot);
                self.stats.evictions_expired += 1;
                evicted += 1;
            }
        }
        if evicted > 0 {
            trace!(evicted, "content store expiry sweep");
        }
        evicted
    }

    /// Earliest of content expiry, recommended cache time, and the default
    /// TTL, all relative to the object's ingress tick.
    fn entry_expiry(&self, object: &Message, now: Ticks) -> Ticks {
        let base = object.ingress_ticks().min(now);
        let mut expiry = base.saturating_add(self.default_ttl);
        if let Some(ms) = object.expiry_time_ms() {
            expiry = expiry.min(base.saturating_add(ms_to_ticks(ms)));
        }
        if let Some(ms) = object.recommended_cache_time_ms() {
            expiry = expiry.min(base.saturating_add(ms_to_ticks(ms)));
        }
        expiry
    }

    fn alloc_slot(&mut self) -> usize {
        match self.free.pop() {
            Some(slot) => slot,
            None => {
                self.entries.push(None);
                self.entries.len() - 1
            },
        }
    }

    /// Detach the entry at `slot` from every index and free the slot. The
    /// caller has already unlinked it from the LRU; heap items die lazily.
    fn take_entry(&mut self, slot: usize) {
        let entry = self.entries[slot]
            .take()
            .unwrap_or_else(|| unreachable!("double free of store slot"));
        let name_hash_key = (entry.name.clone(), entry.hash.clone());
        if self.by_hash.get(&name_hash_key) == Some(&slot) {
            self.by_hash.remove(&name_hash_key);
        }
        if let Some(k) = &entry.key_id {
            let key = (entry.name.clone(), k.clone());
            if self.by_keyid.get(&key) == Some(&slot) {
                self.by_keyid.remove(&key);
            }
        }
        if let Some(slots) = self.by_name.get_mut(&entry.name) {
            slots.retain(|s| *s != slot);
            if slots.is_empty() {
                self.by_name.remove(&entry.name);
            }
        }
        self.free.push(slot);
    }
}
