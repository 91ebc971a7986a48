// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The three-index matching-rules table.
//!
//! An Interest lives in exactly one index, chosen by its most restrictive
//! matching field (object hash beats key id beats bare name). A Content
//! Object is matched against all three at once, because it may satisfy
//! interests restricted any of the three ways.

use std::collections::HashMap;

use bytes::Bytes;

use crate::tlv::name::Name;

/// An interest's matching restriction, most restrictive variant wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Restriction {
    None,
    KeyId(Bytes),
    ObjectHash(Bytes),
}

/// The matching key of one stored interest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    pub name: Name,
    pub restriction: Restriction,
}

impl Key {
    pub fn new(name: Name, restriction: Restriction) -> Self {
        Self { name, restriction }
    }
}

pub struct MatchingRulesTable<V> {
    by_name: HashMap<Name, V>,
    by_keyid: HashMap<(Name, Bytes), V>,
    by_hash: HashMap<(Name, Bytes), V>,
}

impl<V> MatchingRulesTable<V> {
    pub fn new() -> Self {
        Self {
            by_name: HashMap::new(),
            by_keyid: HashMap::new(),
            by_hash: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.by_name.len() + self.by_keyid.len() + self.by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when any stored interest is hash-restricted; lets the caller
    /// skip hashing objects nobody asked about.
    pub fn has_hash_entries(&self) -> bool {
        !self.by_hash.is_empty()
    }

    pub fn get(&self, key: &Key) -> Option<&V> {
        match &key.restriction {
            Restriction::None => self.by_name.get(&key.name),
            Restriction::KeyId(k) => {
                self.by_keyid.get(&(key.name.clone(), k.clone()))
            },
            Restriction::ObjectHash(h) => {
                self.by_hash.get(&(key.name.clone(), h.clone()))
            },
        }
    }

    pub fn get_mut(&mut self, key: &Key) -> Option<&mut V> {
        match &key.restriction {
            Restriction::None => self.by_name.get_mut(&key.name),
            Restriction::KeyId(k) => {
                self.by_keyid.get_mut(&(key.name.clone(), k.clone()))
            },
            Restriction::ObjectHash(h) => {
                self.by_hash.get_mut(&(key.name.clone(), h.clone()))
            },
        }
    }

    /// Store `value` in the index chosen by the key's restriction.
    pub fn insert(&mut self, key: Key, value: V) {
        match key.restriction {
            Restriction::None => {
                self.by_name.insert(key.name, value);
            },
            Restriction::KeyId(k) => {
                self.by_keyid.insert((key.name, k), value);
            },
            Restriction::ObjectHash(h) => {
                self.by_hash.insert((key.name, h), value);
            },
        }
    }

    pub fn remove(&mut self, key: &Key) -> Option<V> {
        match &key.restriction {
            Restriction::None => self.by_name.remove(&key.name),
            Restriction::KeyId(k) => {
                self.by_keyid.remove(&(key.name.clone(), k.clone()))
            },
            Restriction::ObjectHash(h) => {
                self.by_hash.remove(&(key.name.clone(), h.clone()))
            },
        }
    }

    /// Remove and return every entry a content object with these fields
    /// matches: by bare name, by name + key id, and by name + object hash.
    pub fn remove_matches(
        &mut self,
        name: &Name,
        key_id: Option<&Bytes>,
        object_hash: Option<&Bytes>,
    ) -> Vec<V> {
        let mut matched = Vec::new();
        if let Some(v) = self.by_name.remove(name) {
            matched.push(v);
        }
        if let Some(k) = key_id
            && let Some(v) = self.by_keyid.remove(&(name.clone(), k.clone()))
        {
            matched.push(v);
        }
        if let Some(h) = object_hash
            && let Some(v) = self.by_hash.remove(&(name.clone(), h.clone()))
        {
            matched.push(v);
        }
        matched
    }

    /// Keep only entries for which `keep` returns true, across all three
    /// indexes.
    pub fn retain(&mut self, mut keep: impl FnMut(&mut V) -> bool) {
        self.by_name.retain(|_, v| keep(v));
        self.by_keyid.retain(|_, v| keep(v));
        self.by_hash.retain(|_, v| keep(v));
    }
}

impl<V> Default for MatchingRulesTable<V> {
    fn default() -> Self {
        Self::new()
    }
}
