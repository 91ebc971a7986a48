// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The Pending Interest Table.

use std::{
    cmp::Reverse,
    collections::{BinaryHeap, HashMap},
};

use thiserror::Error;
use tracing::trace;

use crate::{
    core::{
        message::Message,
        number_set::NumberSet,
        ticks::Ticks,
    },
    processor::matching_rules::{Key, MatchingRulesTable, Restriction},
};

/// Outcome of receiving one interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PitVerdict {
    /// First interest for this key: forward it.
    New,
    /// Folded into an existing entry (or a retransmission): do not forward.
    Aggregated,
    /// Existing entry, but the new lifetime pushed the expiry out:
    /// re-forward to nexthops not yet used.
    Extended,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("pending interest table full")]
pub struct PitOverflow;

#[derive(Debug)]
pub struct PitEntry {
    ingress: NumberSet,
    egress: NumberSet,
    creation: Ticks,
    expiry: Ticks,
    heap_seq: u64,
}

impl PitEntry {
    pub fn ingress(&self) -> &NumberSet {
        &self.ingress
    }

    pub fn egress(&self) -> &NumberSet {
        &self.egress
    }

    pub fn creation(&self) -> Ticks {
        self.creation
    }

    pub fn expiry(&self) -> Ticks {
        self.expiry
    }
}

/// PIT with expiry driven by a single lazy-deletion min-heap.
///
/// Heap items carry a sequence number; an entry records the sequence of its
/// latest deadline, so superseded or removed deadlines are recognised as
/// stale when they surface and are simply discarded.
pub struct Pit {
    table: MatchingRulesTable<PitEntry>,
    heap: BinaryHeap<Reverse<(Ticks, u64)>>,
    heap_keys: HashMap<u64, Key>,
    next_seq: u64,
    len: usize,
    capacity: Option<usize>,
    default_lifetime: Ticks,
}

impl Pit {
    pub fn new(default_lifetime: Ticks, capacity: Option<usize>) -> Self {
        Self {
            table: MatchingRulesTable::new(),
            heap: BinaryHeap::new(),
            heap_keys: HashMap::new(),
            next_seq: 0,
            len: 0,
            capacity,
            default_lifetime,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The matching key of an interest, by its most restrictive field.
    pub fn interest_key(interest: &Message) -> Option<Key> {
        let name = interest.name()?.clone();
        let restriction = if let Some(hash) = interest.object_hash_restriction() {
            Restriction::ObjectHash(hash)
        } else if let Some(key_id) = interest.key_id() {
            Restriction::KeyId(key_id)
        } else {
            Restriction::None
        };
        Some(Key::new(name, restriction))
    }

    pub fn receive_interest(
        &mut self,
        interest: &Message,
        now: Ticks,
    ) -> Result<PitVerdict, PitOverflow> {
        let key = Self::interest_key(interest)
            .unwrap_or_else(|| unreachable!("interest without a name"));
        let lifetime = interest.interest_lifetime().unwrap_or(self.default_lifetime);
        let expiry = now.saturating_add(lifetime);
        let ingress = interest.ingress();

        if let Some(entry) = self.table.get_mut(&key) {
            if entry.expiry <= now {
                // Expired but not yet swept: start over.
                entry.ingress = NumberSet::from_iter([ingress]);
                entry.egress = NumberSet::new();
                entry.creation = now;
                entry.expiry = expiry;
                entry.heap_seq = self.next_seq;
                self.push_deadline(expiry, key);
                return Ok(PitVerdict::New);
            }

            if !entry.ingress.add(ingress) {
                // Same reverse path again: retransmission.
                return Ok(PitVerdict::Aggregated);
            }
            if expiry > entry.expiry {
                entry.expiry = expiry;
                entry.heap_seq = self.next_seq;
                self.push_deadline(expiry, key);
                return Ok(PitVerdict::Extended);
            }
            return Ok(PitVerdict::Aggregated);
        }

        if let Some(cap) = self.capacity
            && self.len >= cap
        {
            return Err(PitOverflow);
        }

        let entry = PitEntry {
            ingress: NumberSet::from_iter([ingress]),
            egress: NumberSet::new(),
            creation: now,
            expiry,
            heap_seq: self.next_seq,
        };
        self.table.insert(key.clone(), entry);
        self.len += 1;
        self.push_deadline(expiry, key);
        Ok(PitVerdict::New)
    }

    /// Reverse paths a content object satisfies, across all three indexes.
    /// Matched entries are removed.
    pub fn satisfy(&mut self, object: &Message, now: Ticks) -> NumberSet {
        let Some(name) = object.name() else {
            return NumberSet::new();
        };
        let key_id = object.key_id();
        // Hash the object only when somebody restricted on a hash.
        let hash = self
            .table
            .has_hash_entries()
            .then(|| object.content_object_hash());

        let removed =
            self.table
                .remove_matches(name, key_id.as_ref(), hash.as_ref());
        let mut union = NumberSet::new();
        for entry in removed {
            self.len -= 1;
            self.heap_keys.remove(&entry.heap_seq);
            if entry.expiry > now {
                union.extend(&entry.ingress);
            }
        }
        union
    }

    /// Drop the entry this interest created, if any (NoRoute path).
    pub fn remove_interest(&mut self, interest: &Message) {
        if let Some(key) = Self::interest_key(interest)
            && let Some(entry) = self.table.remove(&key)
        {
            self.len -= 1;
            self.heap_keys.remove(&entry.heap_seq);
        }
    }

    pub fn entry(&self, interest: &Message) -> Option<&PitEntry> {
        let key = Self::interest_key(interest)?;
        self.table.get(&key)
    }

    /// Record that `interest` was forwarded on `egress`.
    pub fn add_egress(&mut self, interest: &Message, egress: u32) {
        if let Some(key) = Self::interest_key(interest)
            && let Some(entry) = self.table.get_mut(&key)
        {
            entry.egress.add(egress);
        }
    }

    /// Drop every trace of a closed connection; entries whose reverse-path
    /// set becomes empty are removed outright.
    pub fn remove_connection(&mut self, id: u32) {
        let heap_keys = &mut self.heap_keys;
        let mut removed = 0usize;
        self.table.retain(|entry| {
            entry.ingress.remove(id);
            entry.egress.remove(id);
            if entry.ingress.is_empty() {
                heap_keys.remove(&entry.heap_seq);
                removed += 1;
                false
            } else {
                true
            }
        });
        self.len -= removed;
    }

    /// The tick at which the dispatcher should fire the expiry timer next.
    pub fn next_expiry(&mut self) -> Option<Ticks> {
        loop {
            let Reverse((tick, seq)) = *self.heap.peek()?;
            if self.deadline_is_live(tick, seq) {
                return Some(tick);
            }
            self.heap.pop();
            self.heap_keys.remove(&seq);
        }
    }

    /// Remove entries whose expiry has passed. Expired entries produce no
    /// downstream event.
    pub fn expire_due(&mut self, now: Ticks) -> usize {
        let mut expired = 0usize;
        while let Some(&Reverse((tick, seq))) = self.heap.peek() {
            if tick > now {
                break;
            }
            self.heap.pop();
            let Some(key) = self.heap_keys.remove(&seq) else {
                continue;
            };
            let live = self
                .table
                .get(&key)
                .is_some_and(|e| e.heap_seq == seq && e.expiry <= now);
            if live {
                self.table.remove(&key);
                self.len -= 1;
                expired += 1;
                trace!(key = ?key.name, "pit entry expired");
            }
        }
        expired
    }

    fn deadline_is_live(&self, tick: Ticks, seq: u64) -> bool {
        let Some(key) = self.heap_keys.get(&seq) else {
            return false;
        };
        self.table
            .get(key)
            .is_some_and(|e| e.heap_seq == seq && e.expiry == tick)
    }

    fn push_deadline(&mut self, expiry: Ticks, key: Key) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse((expiry, seq)));
        self.heap_keys.insert(seq, key);
    }
}
