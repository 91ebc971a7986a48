// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The single-threaded cooperative scheduler.
//!
//! One `select!` loop owns every table. Listeners, stream readers and
//! writer tasks live in auxiliary tasks and talk to the loop exclusively
//! through the event channel; no other code mutates forwarding state. The
//! loop also drives the two table timers (PIT next-expiry, content-store
//! sweep) and the shutdown signal.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result, bail};
use bytes::Bytes;
use tokio::{
    net::UdpSocket,
    sync::{mpsc, oneshot},
    time::MissedTickBehavior,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::core::{
    address::{Address, AddressPair},
    connection::{ConnKind, ConnectionId, EtherOut},
    forwarder::Forwarder,
};

/// How a frame reached the loop.
pub enum FrameSource {
    /// A registered stream connection.
    Connection(ConnectionId),
    /// A datagram on a bound UDP socket; the loop finds or creates the peer
    /// connection from the address pair.
    Datagram {
        local: Address,
        remote: Address,
        socket: Arc<UdpSocket>,
    },
    /// A reassembled packet from a raw-Ethernet listener.
    Ether {
        local: Address,
        remote: Address,
        peer_mac: [u8; 6],
        writer: mpsc::Sender<EtherOut>,
    },
}

/// Events delivered to the dispatcher loop.
pub enum CoreEvent {
    /// A framed packet arrived.
    Frame { source: FrameSource, frame: Bytes },
    /// A stream link came up (accepted or connected); the loop assigns the
    /// connection id and replies on the oneshot.
    StreamUp {
        pair: AddressPair,
        kind: ConnKind,
        writer: mpsc::Sender<Bytes>,
        id_reply: oneshot::Sender<ConnectionId>,
    },
    /// A stream link's socket errored or reached EOF.
    StreamClosed { connection_id: ConnectionId },
    /// A configuration operation submitted by a collaborator; runs inside
    /// the loop, like every other mutation.
    ConfigOp(Box<dyn FnOnce(&mut Forwarder) + Send>),
}

/// Cloneable handle used by listeners and collaborators to reach the loop.
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::Sender<CoreEvent>,
}

impl EventSender {
    pub async fn send(&self, event: CoreEvent) -> Result<()> {
        if self.tx.send(event).await.is_err() {
            bail!("dispatcher is gone");
        }
        Ok(())
    }

    pub fn try_send(&self, event: CoreEvent) -> Result<()> {
        if self.tx.try_send(event).is_err() {
            bail!("dispatcher queue full or gone");
        }
        Ok(())
    }

    /// Run a closure against the forwarder inside the loop and await its
    /// result. This is how configuration collaborators submit operations.
    pub async fn submit<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Forwarder) -> T + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.send(CoreEvent::ConfigOp(Box::new(move |forwarder| {
            let _ = tx.send(op(forwarder));
        })))
        .await?;
        rx.await.context("dispatcher dropped the operation")
    }
}

pub fn event_channel(depth: usize) -> (EventSender, mpsc::Receiver<CoreEvent>) {
    let (tx, rx) = mpsc::channel(depth);
    (EventSender { tx }, rx)
}

pub struct Dispatcher {
    rx: mpsc::Receiver<CoreEvent>,
    cancel: CancellationToken,
    cs_sweep_period: Duration,
}

impl Dispatcher {
    pub fn new(
        rx: mpsc::Receiver<CoreEvent>,
        cancel: CancellationToken,
        cs_sweep_period: Duration,
    ) -> Self {
        Self {
            rx,
            cancel,
            cs_sweep_period,
        }
    }

    /// Run until cancelled or until every event sender is gone.
    ///
    /// Callbacks run to completion on this task; the loop suspends only in
    /// `select!`. Timers due at the same instant fire in registration
    /// order because each arm drains fully before the next poll.
    pub async fn run(mut self, forwarder: &mut Forwarder) -> Result<()> {
        let mut cs_sweep = tokio::time::interval(self.cs_sweep_period);
        cs_sweep.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let pit_deadline = forwarder
                .next_pit_expiry()
                .map(|t| forwarder.clock().instant_at(t));

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("dispatcher shutting down");
                    break;
                },
                event = self.rx.recv() => {
                    match event {
                        Some(event) => forwarder.handle_event(event),
                        None => {
                            debug!("all event senders dropped");
                            break;
                        },
                    }
                },
                _ = tokio::time::sleep_until(
                    pit_deadline.unwrap_or_else(tokio::time::Instant::now)
                ), if pit_deadline.is_some() => {
                    forwarder.expire_pit();
                },
                _ = cs_sweep.tick() => {
                    forwarder.sweep_content_store();
                },
            }
        }
        Ok(())
    }
}
