// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Listeners and outgoing-connection plumbing.

pub mod ether;
pub mod local;
pub mod stream;
pub mod tcp;
pub mod udp;

use std::{net::SocketAddr, path::Path, sync::Arc};

use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use crate::{
    core::{
        address::{Address, AddressPair},
        connection::{ConnectionId, EtherTransport, Transport, UdpTransport},
        dispatcher::EventSender,
        forwarder::ConfigError,
    },
    io::ether::EtherListenerHandle,
    processor::symbolic_names::SymbolicNameTable,
};

/// The outgoing-connection API: each call takes a symbolic name, a remote
/// address and an optional local bind, and resolves to the new connection
/// id once the loop has registered it.
#[derive(Clone)]
pub struct Connector {
    events: EventSender,
    cancel: CancellationToken,
}

impl Connector {
    pub fn new(events: EventSender, cancel: CancellationToken) -> Self {
        Self { events, cancel }
    }

    pub async fn add_tcp(
        &self,
        symbolic: &str,
        remote: SocketAddr,
        local: Option<SocketAddr>,
    ) -> Result<ConnectionId, ConfigError> {
        check_symbolic(symbolic)?;
        let id =
            tcp::connect(remote, local, self.events.clone(), self.cancel.clone())
                .await?;
        self.bind_symbolic(symbolic, id).await?;
        Ok(id)
    }

    pub async fn add_local(
        &self,
        symbolic: &str,
        path: &Path,
    ) -> Result<ConnectionId, ConfigError> {
        check_symbolic(symbolic)?;
        let id =
            local::connect(path, self.events.clone(), self.cancel.clone()).await?;
        self.bind_symbolic(symbolic, id).await?;
        Ok(id)
    }

    pub async fn add_udp(
        &self,
        symbolic: &str,
        remote: SocketAddr,
        local: Option<SocketAddr>,
    ) -> Result<ConnectionId, ConfigError> {
        check_symbolic(symbolic)?;

        let bind_addr = local.unwrap_or_else(|| match remote {
            SocketAddr::V4(_) => "0.0.0.0:0".parse().expect("constant addr"),
            SocketAddr::V6(_) => "[::]:0".parse().expect("constant addr"),
        });
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(ConfigError::BindFailed)?;
        let local_addr = socket.local_addr().map_err(ConfigError::BindFailed)?;
        let socket = Arc::new(socket);

        // Datagrams arriving on the outgoing socket flow into the same loop.
        tokio::spawn(udp::recv_loop(
            Arc::clone(&socket),
            local_addr,
            self.events.clone(),
            self.cancel.clone(),
        ));

        let pair = AddressPair::new(
            Address::from_socket_addr(local_addr),
            Address::from_socket_addr(remote),
        );
        let transport = Transport::from(UdpTransport::new(socket, remote));
        self.register(pair, transport, symbolic).await
    }

    pub async fn add_ether(
        &self,
        symbolic: &str,
        listener: &EtherListenerHandle,
        peer_mac: [u8; 6],
    ) -> Result<ConnectionId, ConfigError> {
        check_symbolic(symbolic)?;
        let pair = AddressPair::new(listener.local_address().clone(), Address::Link {
            mac: peer_mac,
            ifname: None,
        });
        let transport =
            Transport::from(EtherTransport::new(listener.writer(), peer_mac));
        self.register(pair, transport, symbolic).await
    }

    async fn register(
        &self,
        pair: AddressPair,
        transport: Transport,
        symbolic: &str,
    ) -> Result<ConnectionId, ConfigError> {
        let symbolic = symbolic.to_string();
        self.events
            .submit(move |forwarder| {
                forwarder.register_connection(pair, transport, Some(&symbolic))
            })
            .await
            .map_err(dispatcher_gone)?
    }

    async fn bind_symbolic(
        &self,
        symbolic: &str,
        id: ConnectionId,
    ) -> Result<(), ConfigError> {
        let name = symbolic.to_string();
        let bound = self
            .events
            .submit(move |forwarder| forwarder.bind_symbolic(&name, id))
            .await
            .map_err(dispatcher_gone)?;
        if let Err(e) = bound {
            // The link is up but unnameable; tear it back down.
            let _ = self
                .events
                .submit(move |forwarder| forwarder.remove_connection(id))
                .await;
            return Err(e);
        }
        Ok(())
    }
}

fn check_symbolic(symbolic: &str) -> Result<(), ConfigError> {
    if SymbolicNameTable::is_valid_name(symbolic) {
        Ok(())
    } else {
        Err(ConfigError::InvalidSymbolic(symbolic.to_string()))
    }
}

fn dispatcher_gone(_: anyhow::Error) -> ConfigError {
    ConfigError::ConnectFailed(std::io::Error::other("dispatcher gone"))
}
