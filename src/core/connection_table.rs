// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The dual-indexed registry of active links.

use std::collections::{BTreeSet, HashMap};

use thiserror::Error;

use crate::core::{
    address::AddressPair,
    connection::{Connection, ConnectionId},
};

const INITIAL_CAPACITY: usize = 16_384;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("connection id {0} already registered")]
pub struct DuplicateId(pub ConnectionId);

/// Connections indexed by id (owning) and by address pair (derived).
///
/// The ordered id set exists so configuration collaborators can enumerate
/// connections deterministically; the hash maps cannot give that.
pub struct ConnectionTable {
    by_id: HashMap<ConnectionId, Connection>,
    by_pair: HashMap<AddressPair, ConnectionId>,
    ordered_ids: BTreeSet<ConnectionId>,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self {
            by_id: HashMap::with_capacity(INITIAL_CAPACITY),
            by_pair: HashMap::with_capacity(INITIAL_CAPACITY),
            ordered_ids: BTreeSet::new(),
        }
    }

    pub fn add(&mut self, connection: Connection) -> Result<(), DuplicateId> {
        let id = connection.id();
        if self.by_id.contains_key(&id) {
            return Err(DuplicateId(id));
        }
        self.by_pair.insert(connection.pair().clone(), id);
        self.ordered_ids.insert(id);
        self.by_id.insert(id, connection);
        Ok(())
    }

    /// Remove and return the connection; no-op when absent.
    ///
    /// Secondary indexes are cleared before the owning map gives up the
    /// entry, so no index ever dangles.
    pub fn remove_by_id(&mut self, id: ConnectionId) -> Option<Connection> {
        let connection = self.by_id.get(&id)?;
        self.by_pair.remove(connection.pair());
        self.ordered_ids.remove(&id);
        self.by_id.remove(&id)
    }

    pub fn find_by_id(&self, id: ConnectionId) -> Option<&Connection> {
        self.by_id.get(&id)
    }

    pub fn find_by_pair(&self, pair: &AddressPair) -> Option<&Connection> {
        let id = self.by_pair.get(pair)?;
        self.by_id.get(id)
    }

    /// Snapshot of all connections, sorted by id.
    pub fn entries(&self) -> Vec<&Connection> {
        self.ordered_ids
            .iter()
            .filter_map(|id| self.by_id.get(id))
            .collect()
    }

    pub fn ids(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.ordered_ids.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

impl Default for ConnectionTable {
    fn default() -> Self {
        Self::new()
    }
}
