// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Connections: one registered link peer, whatever the transport.

use std::{cell::Cell, net::SocketAddr, sync::Arc};

use bytes::Bytes;
use enum_dispatch::enum_dispatch;
use thiserror::Error;
use tokio::{net::UdpSocket, sync::mpsc};

use crate::core::{address::AddressPair, message::Message};

/// Dense connection id; never reused during the process lifetime.
pub type ConnectionId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnKind {
    Tcp,
    Udp,
    Local,
    Ether,
}

#[derive(Debug, Error)]
pub enum SendError {
    /// Transient: the link cannot take the frame right now. The copy is
    /// dropped (datagram) or was not queued (full stream buffer).
    #[error("link would block")]
    WouldBlock,

    /// The connection is administratively or operationally down.
    #[error("connection is down")]
    Down,

    /// Fatal: the peer is gone. The owner must remove the connection and
    /// sweep the tables.
    #[error("peer closed")]
    Closed,
}

/// One outbound Ethernet packet, addressed by destination MAC. The ether
/// writer task fragments it to the link MTU.
#[derive(Debug)]
pub struct EtherOut {
    pub dst: [u8; 6],
    pub packet: Bytes,
}

/// Per-transport send behavior.
#[enum_dispatch]
pub trait IoOperations {
    /// Hand one framed packet to the link.
    fn send_frame(&self, frame: Bytes) -> Result<(), SendError>;

    fn kind(&self) -> ConnKind;

    /// Local transports deliver to applications on this node.
    fn is_local(&self) -> bool;
}

/// Stream links (TCP, PF_LOCAL): frames queue on the writer task's bounded
/// channel, which is the connection's outbound buffer.
#[derive(Debug)]
pub struct StreamTransport {
    tx: mpsc::Sender<Bytes>,
    kind: ConnKind,
}

impl StreamTransport {
    pub fn new(tx: mpsc::Sender<Bytes>, kind: ConnKind) -> Self {
        debug_assert!(matches!(kind, ConnKind::Tcp | ConnKind::Local));
        Self { tx, kind }
    }
}

impl IoOperations for StreamTransport {
    fn send_frame(&self, frame: Bytes) -> Result<(), SendError> {
        match self.tx.try_send(frame) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => Err(SendError::WouldBlock),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SendError::Closed),
        }
    }

    fn kind(&self) -> ConnKind {
        self.kind
    }

    fn is_local(&self) -> bool {
        self.kind == ConnKind::Local
    }
}

/// Datagram links: one `sendto` per frame, drop on would-block.
#[derive(Debug)]
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    remote: SocketAddr,
}

impl UdpTransport {
    pub fn new(socket: Arc<UdpSocket>, remote: SocketAddr) -> Self {
        Self { socket, remote }
    }
}

impl IoOperations for UdpTransport {
    fn send_frame(&self, frame: Bytes) -> Result<(), SendError> {
        match self.socket.try_send_to(&frame, self.remote) {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                Err(SendError::WouldBlock)
            },
            Err(_) => Err(SendError::Closed),
        }
    }

    fn kind(&self) -> ConnKind {
        ConnKind::Udp
    }

    fn is_local(&self) -> bool {
        false
    }
}

/// Raw-Ethernet links: frames go to the per-listener writer task, which
/// fragments to MTU and stamps the Ethernet header.
#[derive(Debug)]
pub struct EtherTransport {
    tx: mpsc::Sender<EtherOut>,
    peer: [u8; 6],
}

impl EtherTransport {
    pub fn new(tx: mpsc::Sender<EtherOut>, peer: [u8; 6]) -> Self {
        Self { tx, peer }
    }
}

impl IoOperations for EtherTransport {
    fn send_frame(&self, frame: Bytes) -> Result<(), SendError> {
        let out = EtherOut {
            dst: self.peer,
            packet: frame,
        };
        match self.tx.try_send(out) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => Err(SendError::WouldBlock),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SendError::Closed),
        }
    }

    fn kind(&self) -> ConnKind {
        ConnKind::Ether
    }

    fn is_local(&self) -> bool {
        false
    }
}

#[enum_dispatch(IoOperations)]
#[derive(Debug)]
pub enum Transport {
    StreamTransport,
    UdpTransport,
    EtherTransport,
}

/// Per-link frame counters.
#[derive(Debug, Default)]
pub struct ConnStats {
    pub frames_in: Cell<u64>,
    pub frames_error: Cell<u64>,
    pub frames_out: Cell<u64>,
    pub send_errors: Cell<u64>,
}

/// An active link, owned by the connection table.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    pair: AddressPair,
    transport: Transport,
    up: Cell<bool>,
    stats: ConnStats,
}

impl Connection {
    pub fn new(id: ConnectionId, pair: AddressPair, transport: Transport) -> Self {
        Self {
            id,
            pair,
            transport,
            up: Cell::new(true),
            stats: ConnStats::default(),
        }
    }

    #[inline]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    #[inline]
    pub fn pair(&self) -> &AddressPair {
        &self.pair
    }

    #[inline]
    pub fn kind(&self) -> ConnKind {
        self.transport.kind()
    }

    #[inline]
    pub fn is_local(&self) -> bool {
        self.transport.is_local()
    }

    #[inline]
    pub fn is_up(&self) -> bool {
        self.up.get()
    }

    pub fn set_down(&self) {
        self.up.set(false);
    }

    pub fn stats(&self) -> &ConnStats {
        &self.stats
    }

    pub fn record_frame_in(&self) {
        self.stats.frames_in.set(self.stats.frames_in.get() + 1);
    }

    pub fn record_frame_error(&self) {
        self.stats
            .frames_error
            .set(self.stats.frames_error.get() + 1);
    }

    pub fn send(&self, message: &Message) -> Result<(), SendError> {
        self.send_bytes(message.as_bytes().clone())
    }

    /// Send an already-encoded frame (e.g. a hop-limit-patched copy).
    pub fn send_bytes(&self, frame: Bytes) -> Result<(), SendError> {
        if !self.up.get() {
            return Err(SendError::Down);
        }
        match self.transport.send_frame(frame) {
            Ok(()) => {
                self.stats.frames_out.set(self.stats.frames_out.get() + 1);
                Ok(())
            },
            Err(e) => {
                self.stats.send_errors.set(self.stats.send_errors.get() + 1);
                if matches!(e, SendError::Closed) {
                    self.up.set(false);
                }
                Err(e)
            },
        }
    }
}
