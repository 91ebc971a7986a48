// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use bytes::Bytes;
use metis_forwarder::core::{
    address::{Address, AddressPair},
    connection::{ConnKind, Connection, IoOperations, StreamTransport, Transport},
    connection_table::ConnectionTable,
};
use tokio::sync::mpsc;

fn pair(index: u8) -> AddressPair {
    AddressPair::new(
        Address::Inet("127.0.0.1:9695".parse().expect("addr")),
        Address::Inet(format!("10.0.0.{index}:9695").parse().expect("addr")),
    )
}

fn connection(id: u32, index: u8) -> (Connection, mpsc::Receiver<Bytes>) {
    let (tx, rx) = mpsc::channel(8);
    let transport = Transport::from(StreamTransport::new(tx, ConnKind::Tcp));
    (Connection::new(id, pair(index), transport), rx)
}

#[test]
fn dual_index_agrees() {
    let mut table = ConnectionTable::new();
    for (id, index) in [(1u32, 1u8), (2, 2), (3, 3)] {
        let (conn, _rx) = connection(id, index);
        table.add(conn).expect("fresh id");
    }

    for (id, index) in [(1u32, 1u8), (2, 2), (3, 3)] {
        let by_id = table.find_by_id(id).expect("by id");
        let by_pair = table.find_by_pair(&pair(index)).expect("by pair");
        assert_eq!(by_id.id(), by_pair.id());
        assert_eq!(by_id.pair(), by_pair.pair());
    }
}

#[test]
fn duplicate_id_is_rejected_without_state_change() {
    let mut table = ConnectionTable::new();
    let (first, _rx1) = connection(7, 1);
    let (dup, _rx2) = connection(7, 2);

    table.add(first).expect("fresh id");
    assert!(table.add(dup).is_err());
    assert_eq!(table.len(), 1);
    // The original mapping survived.
    assert!(table.find_by_pair(&pair(1)).is_some());
    assert!(table.find_by_pair(&pair(2)).is_none());
}

#[test]
fn remove_clears_both_indexes() {
    let mut table = ConnectionTable::new();
    let (conn, _rx) = connection(4, 4);
    table.add(conn).expect("fresh id");

    assert!(table.remove_by_id(4).is_some());
    assert!(table.find_by_id(4).is_none());
    assert!(table.find_by_pair(&pair(4)).is_none());
    // Removal of an absent id is a no-op.
    assert!(table.remove_by_id(4).is_none());
    assert!(table.is_empty());
}

#[test]
fn entries_are_sorted_by_id() {
    let mut table = ConnectionTable::new();
    for (id, index) in [(9u32, 1u8), (2, 2), (5, 3)] {
        let (conn, _rx) = connection(id, index);
        table.add(conn).expect("fresh id");
    }
    let ids: Vec<_> = table.entries().iter().map(|c| c.id()).collect();
    assert_eq!(ids, vec![2, 5, 9]);
}

#[test]
fn send_flows_to_the_writer_channel() {
    let (conn, mut rx) = connection(1, 1);
    assert!(conn.is_up());
    assert_eq!(conn.kind(), ConnKind::Tcp);
    assert!(!conn.is_local());

    conn.send_bytes(Bytes::from_static(b"frame")).expect("queued");
    assert_eq!(rx.try_recv().expect("frame"), Bytes::from_static(b"frame"));
    assert_eq!(conn.stats().frames_out.get(), 1);

    // A closed writer is a fatal send error and downs the connection.
    rx.close();
    assert!(conn.send_bytes(Bytes::from_static(b"x")).is_err());
    assert!(!conn.is_up());
}

#[test]
fn transport_kind_dispatch() {
    let (tx, _rx) = mpsc::channel(1);
    let local = Transport::from(StreamTransport::new(tx, ConnKind::Local));
    assert_eq!(local.kind(), ConnKind::Local);
    assert!(local.is_local());
}
