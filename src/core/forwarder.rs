// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The forwarder: owner of every table, target of every event.

use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tokio::{net::UdpSocket, sync::mpsc};
use tracing::{debug, info};

use crate::{
    content_store::store::{ContentStore, CsStats},
    core::{
        address::{Address, AddressPair},
        connection::{
            ConnKind, Connection, ConnectionId, EtherOut, EtherTransport,
            StreamTransport, Transport, UdpTransport,
        },
        connection_table::ConnectionTable,
        dispatcher::{CoreEvent, FrameSource},
        message::Message,
        ticks::{Clock, Ticks, duration_to_ticks},
    },
    processor::{
        fib::{FibRow, Nexthop},
        pit::Pit,
        processor::{ControlSink, LogControlSink, MessageProcessor, ProcessorStats},
        symbolic_names::{SYMBOLIC_NONE, SymbolicNameTable},
    },
};

/// Errors surfaced by the configuration operations API.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("connection id {0} already registered")]
    DuplicateId(ConnectionId),

    #[error("symbolic name {0:?} already in use")]
    DuplicateSymbolic(String),

    #[error("invalid symbolic name {0:?}")]
    InvalidSymbolic(String),

    #[error("unknown connection {0}")]
    UnknownConnection(ConnectionId),

    #[error("route cost must be positive")]
    InvalidCost,

    #[error("bind failed")]
    BindFailed(#[source] std::io::Error),

    #[error("connect failed")]
    ConnectFailed(#[source] std::io::Error),
}

/// Forwarder-tunable knobs; the cfg module builds this from YAML.
#[derive(Debug, Clone)]
pub struct ForwarderOptions {
    pub content_store_capacity: usize,
    pub content_store_default_ttl: std::time::Duration,
    pub default_interest_lifetime: std::time::Duration,
    pub pit_capacity: Option<usize>,
}

impl Default for ForwarderOptions {
    fn default() -> Self {
        Self {
            content_store_capacity: 65_536,
            content_store_default_ttl: std::time::Duration::from_secs(3600),
            default_interest_lifetime: std::time::Duration::from_secs(4),
            pit_capacity: None,
        }
    }
}

/// One row of a connection dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRow {
    pub id: ConnectionId,
    pub kind: ConnKind,
    pub pair: String,
    pub up: bool,
}

/// Aggregate state snapshot for collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwarderStats {
    pub processor: ProcessorStats,
    pub content_store: CsStats,
    pub connections: usize,
    pub pit_entries: usize,
    pub cs_entries: usize,
}

pub struct Forwarder {
    clock: Clock,
    connections: ConnectionTable,
    processor: MessageProcessor,
    symbolic_names: SymbolicNameTable,
    control: Box<dyn ControlSink>,
    next_connection_id: ConnectionId,
}

impl Forwarder {
    pub fn new(options: &ForwarderOptions, clock: Clock) -> Self {
        let pit = Pit::new(
            duration_to_ticks(options.default_interest_lifetime),
            options.pit_capacity,
        );
        let store = ContentStore::new(
            options.content_store_capacity,
            duration_to_ticks(options.content_store_default_ttl),
        );
        Self {
            clock,
            connections: ConnectionTable::new(),
            processor: MessageProcessor::new(pit, Default::default(), store),
            symbolic_names: SymbolicNameTable::new(),
            control: Box::new(LogControlSink),
            next_connection_id: 1,
        }
    }

    /// Swap in a real configuration collaborator for control packets.
    pub fn set_control_sink(&mut self, sink: Box<dyn ControlSink>) {
        self.control = sink;
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn connections(&self) -> &ConnectionTable {
        &self.connections
    }

    pub fn processor(&self) -> &MessageProcessor {
        &self.processor
    }

    pub fn processor_mut(&mut self) -> &mut MessageProcessor {
        &mut self.processor
    }

    /// Dense ids, starting at 1, never reused. Id 0 stays free as a
    /// historical listener id.
    fn allocate_connection_id(&mut self) -> ConnectionId {
        let id = self.next_connection_id;
        self.next_connection_id += 1;
        id
    }

    // ── Event handling ─────────────────────────────────────────────────

    pub fn handle_event(&mut self, event: CoreEvent) {
        match event {
            CoreEvent::Frame { source, frame } => match source {
                FrameSource::Connection(id) => self.on_frame(id, frame),
                FrameSource::Datagram {
                    local,
                    remote,
                    socket,
                } => self.on_datagram(local, remote, socket, frame),
                FrameSource::Ether {
                    local,
                    remote,
                    peer_mac,
                    writer,
                } => self.on_ether_packet(local, remote, peer_mac, writer, frame),
            },
            CoreEvent::StreamUp {
                pair,
                kind,
                writer,
                id_reply,
            } => {
                let id = self.register_stream(pair, kind, writer);
                let _ = id_reply.send(id);
            },
            CoreEvent::StreamClosed { connection_id } => {
                debug!(connection = connection_id, "stream closed");
                self.remove_connection(connection_id);
            },
            CoreEvent::ConfigOp(op) => op(self),
        }
    }

    fn on_frame(&mut self, connection_id: ConnectionId, frame: Bytes) {
        let now = self.clock.now();
        let message = match Message::from_wire(frame.clone(), connection_id, now) {
            Ok(message) => {
                if let Some(conn) = self.connections.find_by_id(connection_id) {
                    conn.record_frame_in();
                }
                message
            },
            Err(e) => {
                if let Some(conn) = self.connections.find_by_id(connection_id) {
                    conn.record_frame_error();
                }
                debug!(
                    connection = connection_id,
                    error = %e,
                    frame = ?crate::utils::HexPreview(&frame),
                    "malformed packet"
                );
                return;
            },
        };

        let mut dead = Vec::new();
        self.processor.on_message(
            &message,
            &self.connections,
            self.control.as_mut(),
            now,
            &mut dead,
        );
        for id in dead {
            self.remove_connection(id);
        }
    }

    fn on_datagram(
        &mut self,
        local: Address,
        remote: Address,
        socket: Arc<UdpSocket>,
        frame: Bytes,
    ) {
        let pair = AddressPair::new(local, remote.clone());
        let id = match self.connections.find_by_pair(&pair) {
            Some(conn) => conn.id(),
            None => {
                let Some(remote_addr) = remote.socket_addr() else {
                    unreachable!("datagram source without a socket address");
                };
                let id = self.allocate_connection_id();
                let transport =
                    Transport::from(UdpTransport::new(socket, remote_addr));
                self.insert_connection(Connection::new(id, pair, transport));
                debug!(connection = id, remote = %remote, "new udp peer");
                id
            },
        };
        self.on_frame(id, frame);
    }

    fn on_ether_packet(
        &mut self,
        local: Address,
        remote: Address,
        peer_mac: [u8; 6],
        writer: mpsc::Sender<EtherOut>,
        frame: Bytes,
    ) {
        let pair = AddressPair::new(local, remote.clone());
        let id = match self.connections.find_by_pair(&pair) {
            Some(conn) => conn.id(),
            None => {
                let id = self.allocate_connection_id();
                let transport =
                    Transport::from(EtherTransport::new(writer, peer_mac));
                self.insert_connection(Connection::new(id, pair, transport));
                debug!(connection = id, remote = %remote, "new ether peer");
                id
            },
        };
        self.on_frame(id, frame);
    }

    fn register_stream(
        &mut self,
        pair: AddressPair,
        kind: ConnKind,
        writer: mpsc::Sender<Bytes>,
    ) -> ConnectionId {
        let id = self.allocate_connection_id();
        let transport = Transport::from(StreamTransport::new(writer, kind));
        self.insert_connection(Connection::new(id, pair, transport));
        info!(connection = id, kind = ?kind, "stream connection up");
        id
    }

    fn insert_connection(&mut self, connection: Connection) {
        // Ids are allocated from a monotonic counter, so this cannot
        // collide.
        self.connections
            .add(connection)
            .unwrap_or_else(|e| unreachable!("{e}"));
    }

    /// Remove a connection and sweep every table referencing it.
    pub fn remove_connection(&mut self, id: ConnectionId) {
        let Some(connection) = self.connections.remove_by_id(id) else {
            return;
        };
        connection.set_down();
        self.processor.fib_mut().remove_by_connection(id);
        self.processor.pit_mut().remove_connection(id);
        self.symbolic_names.remove_by_connection(id);
        info!(connection = id, "connection removed");
    }

    // ── Configuration operations ───────────────────────────────────────

    /// Register an externally-built connection (outgoing link), optionally
    /// bound to a symbolic name.
    pub fn register_connection(
        &mut self,
        pair: AddressPair,
        transport: Transport,
        symbolic: Option<&str>,
    ) -> Result<ConnectionId, ConfigError> {
        if let Some(name) = symbolic {
            if !SymbolicNameTable::is_valid_name(name) {
                return Err(ConfigError::InvalidSymbolic(name.to_string()));
            }
            if self.symbolic_names.resolve(name) != SYMBOLIC_NONE {
                return Err(ConfigError::DuplicateSymbolic(name.to_string()));
            }
        }
        let id = self.allocate_connection_id();
        self.insert_connection(Connection::new(id, pair, transport));
        if let Some(name) = symbolic {
            let added = self.symbolic_names.add(name, id);
            debug_assert!(added, "symbolic name raced its own validation");
        }
        Ok(id)
    }

    pub fn resolve_symbolic(&self, name: &str) -> ConnectionId {
        self.symbolic_names.resolve(name)
    }

    /// Alias an existing connection under a symbolic name.
    pub fn bind_symbolic(
        &mut self,
        name: &str,
        id: ConnectionId,
    ) -> Result<(), ConfigError> {
        if !SymbolicNameTable::is_valid_name(name) {
            return Err(ConfigError::InvalidSymbolic(name.to_string()));
        }
        if self.connections.find_by_id(id).is_none() {
            return Err(ConfigError::UnknownConnection(id));
        }
        if !self.symbolic_names.add(name, id) {
            return Err(ConfigError::DuplicateSymbolic(name.to_string()));
        }
        Ok(())
    }

    pub fn add_route(
        &mut self,
        prefix: &crate::tlv::name::Name,
        connection_id: ConnectionId,
        cost: u16,
    ) -> Result<(), ConfigError> {
        if cost == 0 {
            return Err(ConfigError::InvalidCost);
        }
        if self.connections.find_by_id(connection_id).is_none() {
            return Err(ConfigError::UnknownConnection(connection_id));
        }
        self.processor
            .fib_mut()
            .add_or_update(prefix, connection_id, cost);
        info!(prefix = %prefix, connection = connection_id, cost, "route added");
        Ok(())
    }

    pub fn remove_route(
        &mut self,
        prefix: &crate::tlv::name::Name,
        connection_id: ConnectionId,
    ) -> bool {
        self.processor.fib_mut().remove(prefix, connection_id)
    }

    pub fn list_routes(&self) -> Vec<FibRow> {
        self.processor.fib().list()
    }

    pub fn lookup_route(&self, name: &crate::tlv::name::Name) -> Vec<Nexthop> {
        self.processor.fib().lookup(name).to_vec()
    }

    pub fn list_connections(&self) -> Vec<ConnectionRow> {
        self.connections
            .entries()
            .into_iter()
            .map(|c| ConnectionRow {
                id: c.id(),
                kind: c.kind(),
                pair: c.pair().to_string(),
                up: c.is_up(),
            })
            .collect()
    }

    pub fn stats(&self) -> ForwarderStats {
        ForwarderStats {
            processor: self.processor.stats(),
            content_store: self.processor.cs_stats(),
            connections: self.connections.len(),
            pit_entries: self.processor.pit().len(),
            cs_entries: self.processor.store().len(),
        }
    }

    // ── Timer hooks, called by the dispatcher ──────────────────────────

    pub fn next_pit_expiry(&mut self) -> Option<Ticks> {
        self.processor.pit_mut().next_expiry()
    }

    pub fn expire_pit(&mut self) {
        let now = self.clock.now();
        let expired = self.processor.pit_mut().expire_due(now);
        if expired > 0 {
            debug!(expired, "pit expiry timer");
        }
    }

    pub fn sweep_content_store(&mut self) {
        let now = self.clock.now();
        self.processor.store_mut().purge_expired(now);
    }
}

impl std::fmt::Debug for Forwarder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Forwarder")
            .field("connections", &self.connections.len())
            .field("pit_entries", &self.processor.pit().len())
            .field("cs_entries", &self.processor.store().len())
            .finish()
    }
}
