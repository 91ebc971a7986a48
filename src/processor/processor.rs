// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The receive/forward pipeline composing CS, PIT and FIB.

use bytes::Bytes;
use tracing::{debug, trace};

use crate::{
    content_store::store::{ContentStore, CsStats},
    core::{
        connection::{ConnectionId, SendError},
        connection_table::ConnectionTable,
        message::Message,
        ticks::Ticks,
    },
    processor::{
        fib::Fib,
        pit::{Pit, PitVerdict},
    },
    tlv::skeleton::PacketKind,
};

/// Where control packets go. The CPI protocol itself lives outside the
/// core; the default sink just drops.
pub trait ControlSink {
    fn on_control(&mut self, message: &Message);
}

/// Default collaborator: log and drop.
#[derive(Debug, Default)]
pub struct LogControlSink;

impl ControlSink for LogControlSink {
    fn on_control(&mut self, message: &Message) {
        debug!(ingress = message.ingress(), "dropping control message");
    }
}

/// Pipeline counters; one struct per forwarder, surfaced in snapshots.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorStats {
    pub interests_received: u64,
    pub objects_received: u64,
    pub control_received: u64,
    pub interest_returns: u64,
    pub cs_hits: u64,
    pub interests_forwarded: u64,
    pub objects_delivered: u64,
    pub drops_no_route: u64,
    pub drops_hop_limit: u64,
    pub drops_unsolicited: u64,
    pub drops_pit_overflow: u64,
    pub send_errors: u64,
}

/// The message processor owns the three forwarding tables and implements
/// `on_message`. It never owns connections; it sends through references
/// into the connection table and reports fatally-failed connection ids back
/// to the caller for removal.
pub struct MessageProcessor {
    pit: Pit,
    fib: Fib,
    store: ContentStore,
    stats: ProcessorStats,
}

impl MessageProcessor {
    pub fn new(pit: Pit, fib: Fib, store: ContentStore) -> Self {
        Self {
            pit,
            fib,
            store,
            stats: ProcessorStats::default(),
        }
    }

    pub fn pit(&self) -> &Pit {
        &self.pit
    }

    pub fn pit_mut(&mut self) -> &mut Pit {
        &mut self.pit
    }

    pub fn fib(&self) -> &Fib {
        &self.fib
    }

    pub fn fib_mut(&mut self) -> &mut Fib {
        &mut self.fib
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ContentStore {
        &mut self.store
    }

    pub fn stats(&self) -> ProcessorStats {
        self.stats
    }

    pub fn cs_stats(&self) -> CsStats {
        self.store.stats()
    }

    /// Entry point for every framed packet. Connection ids whose transport
    /// reported a fatal failure are appended to `dead`.
    pub fn on_message(
        &mut self,
        message: &Message,
        connections: &ConnectionTable,
        control: &mut dyn ControlSink,
        now: Ticks,
        dead: &mut Vec<ConnectionId>,
    ) {
        match message.kind() {
            PacketKind::Control => {
                self.stats.control_received += 1;
                control.on_control(message);
            },
            PacketKind::InterestReturn => {
                self.stats.interest_returns += 1;
                debug!(ingress = message.ingress(), "dropping interest return");
            },
            PacketKind::ContentObject => {
                self.process_object(message, connections, now, dead);
            },
            PacketKind::Interest => {
                self.process_interest(message, connections, now, dead);
            },
        }
    }

    fn process_interest(
        &mut self,
        interest: &Message,
        connections: &ConnectionTable,
        now: Ticks,
        dead: &mut Vec<ConnectionId>,
    ) {
        self.stats.interests_received += 1;

        if let Some(cached) = self.store.match_interest(interest, now) {
            self.stats.cs_hits += 1;
            trace!(ingress = interest.ingress(), "content store hit");
            if let Some(conn) = connections.find_by_id(interest.ingress())
                && conn.is_up()
                && let Err(e) = conn.send(&cached)
            {
                self.note_send_error(conn.id(), e, dead);
            }
            return;
        }

        let verdict = match self.pit.receive_interest(interest, now) {
            Ok(v) => v,
            Err(_) => {
                self.stats.drops_pit_overflow += 1;
                debug!(ingress = interest.ingress(), "interest dropped: pit full");
                return;
            },
        };
        if verdict == PitVerdict::Aggregated {
            return;
        }

        let name = interest
            .name()
            .unwrap_or_else(|| unreachable!("interest without a name"));
        let nexthops = self.fib.lookup(name).to_vec();
        if nexthops.is_empty() {
            self.pit.remove_interest(interest);
            self.stats.drops_no_route += 1;
            debug!(name = %name, "no route");
            return;
        }

        let already = self
            .pit
            .entry(interest)
            .map(|e| e.egress().clone())
            .unwrap_or_default();
        let hop_limit = interest.hop_limit();
        // One decremented copy serves every nexthop.
        let mut forward_frame: Option<Bytes> = None;

        for nexthop in nexthops {
            let id = nexthop.connection_id;
            if id == interest.ingress() || already.contains(id) {
                continue;
            }
            let Some(conn) = connections.find_by_id(id) else {
                continue;
            };
            if !conn.is_up() {
                continue;
            }

            let frame = match hop_limit {
                None => interest.as_bytes().clone(),
                Some(hl) => {
                    let out = hl.saturating_sub(1);
                    if out == 0 && !conn.is_local() {
                        self.stats.drops_hop_limit += 1;
                        trace!(egress = id, "hop limit exhausted");
                        continue;
                    }
                    forward_frame
                        .get_or_insert_with(|| interest.bytes_with_hop_limit(out))
                        .clone()
                },
            };

            match conn.send_bytes(frame) {
                Ok(()) => {
                    self.stats.interests_forwarded += 1;
                    self.pit.add_egress(interest, id);
                },
                Err(e) => self.note_send_error(id, e, dead),
            }
        }
    }

    fn process_object(
        &mut self,
        object: &Message,
        connections: &ConnectionTable,
        now: Ticks,
        dead: &mut Vec<ConnectionId>,
    ) {
        self.stats.objects_received += 1;

        let reverse_paths = self.pit.satisfy(object, now);
        if reverse_paths.is_empty() {
            self.stats.drops_unsolicited += 1;
            debug!(ingress = object.ingress(), "unsolicited content object");
            return;
        }

        for id in reverse_paths.iter() {
            let Some(conn) = connections.find_by_id(id) else {
                continue;
            };
            if !conn.is_up() {
                continue;
            }
            match conn.send(object) {
                Ok(()) => self.stats.objects_delivered += 1,
                Err(e) => self.note_send_error(id, e, dead),
            }
        }

        if Self::is_cacheable(object) {
            self.store.put(object, now);
        }
    }

    /// Cacheable unless the object opts out: an explicit do-not-cache TLV
    /// or a zero recommended cache time.
    fn is_cacheable(object: &Message) -> bool {
        if object.has_do_not_cache() {
            return false;
        }
        object.recommended_cache_time_ms() != Some(0)
    }

    fn note_send_error(
        &mut self,
        id: ConnectionId,
        error: SendError,
        dead: &mut Vec<ConnectionId>,
    ) {
        self.stats.send_errors += 1;
        match error {
            SendError::Closed => {
                debug!(connection = id, "send failed fatally, scheduling removal");
                if !dead.contains(&id) {
                    dead.push(id);
                }
            },
            SendError::WouldBlock | SendError::Down => {
                trace!(connection = id, %error, "copy dropped");
            },
        }
    }
}
