// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::net::SocketAddr;

use tokio::{
    net::{TcpListener, TcpSocket, TcpStream},
    sync::oneshot,
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    core::{
        address::{Address, AddressPair},
        connection::{ConnKind, ConnectionId},
        dispatcher::EventSender,
        forwarder::ConfigError,
    },
    io::stream::start_stream,
};

/// A bound TCP listener; dropping the handle does not stop it, `stop()`
/// does.
pub struct TcpListenerHandle {
    local: SocketAddr,
    task: JoinHandle<()>,
}

impl TcpListenerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    pub fn stop(&self) {
        self.task.abort();
    }
}

/// Bind a TCP listener; accepted sockets become stream connections.
pub async fn bind(
    bind: SocketAddr,
    events: EventSender,
    cancel: CancellationToken,
) -> Result<TcpListenerHandle, ConfigError> {
    let listener = TcpListener::bind(bind)
        .await
        .map_err(ConfigError::BindFailed)?;
    let local = listener.local_addr().map_err(ConfigError::BindFailed)?;
    info!(%local, "tcp listener up");

    let task = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            debug!(%peer, "tcp connection accepted");
                            spawn_stream(stream, local, peer, &events, &cancel, None);
                        },
                        Err(e) => {
                            warn!(error = %e, "tcp accept failed");
                        },
                    }
                },
            }
        }
    });

    Ok(TcpListenerHandle { local, task })
}

/// Open an outgoing TCP connection, optionally bound to a local address.
/// Resolves once the loop has registered the connection.
pub async fn connect(
    remote: SocketAddr,
    local: Option<SocketAddr>,
    events: EventSender,
    cancel: CancellationToken,
) -> Result<ConnectionId, ConfigError> {
    let socket = match remote {
        SocketAddr::V4(_) => TcpSocket::new_v4(),
        SocketAddr::V6(_) => TcpSocket::new_v6(),
    }
    .map_err(ConfigError::ConnectFailed)?;
    if let Some(local) = local {
        socket.bind(local).map_err(ConfigError::BindFailed)?;
    }

    let stream = socket
        .connect(remote)
        .await
        .map_err(ConfigError::ConnectFailed)?;
    let local = stream.local_addr().map_err(ConfigError::ConnectFailed)?;

    let (announce, id_rx) = oneshot::channel();
    spawn_stream(stream, local, remote, &events, &cancel, Some(announce));
    id_rx
        .await
        .map_err(|_| ConfigError::ConnectFailed(std::io::Error::other("dispatcher gone")))
}

fn spawn_stream(
    stream: TcpStream,
    local: SocketAddr,
    peer: SocketAddr,
    events: &EventSender,
    cancel: &CancellationToken,
    announce: Option<oneshot::Sender<ConnectionId>>,
) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!(error = %e, "set_nodelay failed");
    }
    let (reader, writer) = stream.into_split();
    let pair = AddressPair::new(
        Address::from_socket_addr(local),
        Address::from_socket_addr(peer),
    );
    start_stream(
        reader,
        writer,
        pair,
        ConnKind::Tcp,
        events.clone(),
        cancel.clone(),
        announce,
    );
}
