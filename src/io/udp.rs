// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{net::SocketAddr, sync::Arc};

use bytes::Bytes;
use tokio::{net::UdpSocket, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::core::{
    address::Address,
    dispatcher::{CoreEvent, EventSender, FrameSource},
};

/// Largest datagram we accept; a CCNx packet length is 16 bits.
const MAX_DATAGRAM: usize = 64 * 1024;

/// A bound UDP listener. Each datagram is one packet; peers get
/// connections on their first datagram, keyed by the address pair.
pub struct UdpListenerHandle {
    local: SocketAddr,
    socket: Arc<UdpSocket>,
    task: JoinHandle<()>,
}

impl UdpListenerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    /// The shared socket, usable as the transport for outgoing peers.
    pub fn socket(&self) -> Arc<UdpSocket> {
        Arc::clone(&self.socket)
    }

    pub fn stop(&self) {
        self.task.abort();
    }
}

pub async fn bind(
    bind: SocketAddr,
    events: EventSender,
    cancel: CancellationToken,
) -> Result<UdpListenerHandle, crate::core::forwarder::ConfigError> {
    use crate::core::forwarder::ConfigError;

    let socket = UdpSocket::bind(bind)
        .await
        .map_err(ConfigError::BindFailed)?;
    let local = socket.local_addr().map_err(ConfigError::BindFailed)?;
    let socket = Arc::new(socket);
    info!(%local, "udp listener up");

    let task = tokio::spawn(recv_loop(
        Arc::clone(&socket),
        local,
        events,
        cancel,
    ));

    Ok(UdpListenerHandle {
        local,
        socket,
        task,
    })
}

pub(crate) async fn recv_loop(
    socket: Arc<UdpSocket>,
    local: SocketAddr,
    events: EventSender,
    cancel: CancellationToken,
) {
    let local_address = Address::from_socket_addr(local);
    let mut buf = vec![0u8; MAX_DATAGRAM];
    loop {
        let received = tokio::select! {
            _ = cancel.cancelled() => break,
            received = socket.recv_from(&mut buf) => received,
        };
        match received {
            Ok((len, peer)) => {
                let frame = Bytes::copy_from_slice(&buf[..len]);
                let event = CoreEvent::Frame {
                    source: FrameSource::Datagram {
                        local: local_address.clone(),
                        remote: Address::from_socket_addr(peer),
                        socket: Arc::clone(&socket),
                    },
                    frame,
                };
                if events.send(event).await.is_err() {
                    break;
                }
            },
            Err(e) => {
                warn!(error = %e, "udp recv failed");
            },
        }
    }
}
