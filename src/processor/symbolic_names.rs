// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::collections::HashMap;

use crate::core::connection::ConnectionId;

/// Returned when a symbolic name does not resolve.
pub const SYMBOLIC_NONE: ConnectionId = ConnectionId::MAX;

/// User-chosen aliases for connection ids.
///
/// Names must begin with a letter and contain only alphanumerics; each name
/// maps to exactly one connection.
#[derive(Debug, Default)]
pub struct SymbolicNameTable {
    names: HashMap<String, ConnectionId>,
}

impl SymbolicNameTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid_name(name: &str) -> bool {
        let mut chars = name.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() => {},
            _ => return false,
        }
        chars.all(|c| c.is_ascii_alphanumeric())
    }

    /// Bind `name` to `id`; false when the name is already taken.
    pub fn add(&mut self, name: &str, id: ConnectionId) -> bool {
        if self.names.contains_key(name) {
            return false;
        }
        self.names.insert(name.to_string(), id);
        true
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.names.remove(name).is_some()
    }

    /// Drop any alias pointing at a removed connection.
    pub fn remove_by_connection(&mut self, id: ConnectionId) {
        self.names.retain(|_, v| *v != id);
    }

    /// Resolve a name, or [`SYMBOLIC_NONE`] when unknown.
    pub fn resolve(&self, name: &str) -> ConnectionId {
        self.names.get(name).copied().unwrap_or(SYMBOLIC_NONE)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
