// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Outgoing-connection API driven against a live dispatcher loop.

use std::time::Duration;

use metis_forwarder::{
    core::{
        dispatcher::{Dispatcher, event_channel},
        forwarder::ConfigError,
    },
    io::Connector,
    processor::symbolic_names::SYMBOLIC_NONE,
};
use serial_test::serial;
use tokio_util::sync::CancellationToken;

use super::common::test_forwarder;

#[tokio::test]
#[serial]
async fn add_udp_registers_a_named_connection() {
    let local_set = tokio::task::LocalSet::new();
    local_set
        .run_until(async {
            let cancel = CancellationToken::new();
            let (events, rx) = event_channel(64);
            let connector = Connector::new(events.clone(), cancel.clone());

            let forwarder = test_forwarder();
            let dispatcher =
                Dispatcher::new(rx, cancel.clone(), Duration::from_secs(1));
            let loop_task = tokio::task::spawn_local(async move {
                let mut forwarder = forwarder;
                dispatcher.run(&mut forwarder).await
            });

            // A real socket to aim the connection at.
            let target = tokio::net::UdpSocket::bind("127.0.0.1:0")
                .await
                .expect("target");
            let remote = target.local_addr().expect("addr");

            let id = connector
                .add_udp("peer0", remote, None)
                .await
                .expect("add_udp");

            let resolved = events
                .submit(move |f| f.resolve_symbolic("peer0"))
                .await
                .expect("loop alive");
            assert_eq!(resolved, id);

            let rows = events
                .submit(|f| f.list_connections())
                .await
                .expect("loop alive");
            assert_eq!(rows.len(), 1);
            assert!(rows[0].up);

            // The symbolic name is taken now.
            let dup = connector.add_udp("peer0", remote, None).await;
            assert!(matches!(dup, Err(ConfigError::DuplicateSymbolic(_))));

            // And bad names never reach the loop.
            let bad = connector.add_udp("7peer", remote, None).await;
            assert!(matches!(bad, Err(ConfigError::InvalidSymbolic(_))));

            // Removing the connection releases the name.
            events
                .submit(move |f| f.remove_connection(id))
                .await
                .expect("loop alive");
            let resolved = events
                .submit(|f| f.resolve_symbolic("peer0"))
                .await
                .expect("loop alive");
            assert_eq!(resolved, SYMBOLIC_NONE);

            cancel.cancel();
            loop_task.await.expect("join").expect("dispatcher exit");
        })
        .await;
}
