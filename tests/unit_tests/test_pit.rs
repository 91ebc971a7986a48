// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use metis_forwarder::processor::pit::{Pit, PitVerdict};

use super::common::{self, InterestSpec, ObjectSpec};

fn pit() -> Pit {
    // 4-second default lifetime, unbounded.
    Pit::new(4_000, None)
}

#[test]
fn aggregation_across_connections() {
    let mut pit = pit();
    let packet = common::v1_interest(&[b"foo", b"bar"], &InterestSpec::hops(32));

    let verdicts: Vec<_> = (1u32..=3)
        .map(|conn| {
            let interest = common::message(packet.clone(), conn, 0);
            pit.receive_interest(&interest, 0).expect("no cap")
        })
        .collect();

    assert_eq!(verdicts, vec![
        PitVerdict::New,
        PitVerdict::Aggregated,
        PitVerdict::Aggregated,
    ]);
    assert_eq!(pit.len(), 1);

    let interest = common::message(packet, 1, 0);
    let entry = pit.entry(&interest).expect("entry");
    assert_eq!(entry.ingress().len(), 3);
}

#[test]
fn retransmission_is_aggregated() {
    let mut pit = pit();
    let packet = common::v1_interest(&[b"foo"], &InterestSpec::hops(32));
    let interest = common::message(packet, 7, 0);

    assert_eq!(pit.receive_interest(&interest, 0), Ok(PitVerdict::New));
    assert_eq!(pit.receive_interest(&interest, 1), Ok(PitVerdict::Aggregated));
    let entry = pit.entry(&interest).expect("entry");
    assert_eq!(entry.ingress().len(), 1);
}

#[test]
fn longer_lifetime_extends() {
    let mut pit = pit();
    let short = common::message(
        common::v1_interest(&[b"foo"], &InterestSpec {
            lifetime_ms: Some(100),
            hop_limit: 32,
            ..Default::default()
        }),
        1,
        0,
    );
    let long = common::message(
        common::v1_interest(&[b"foo"], &InterestSpec {
            lifetime_ms: Some(10_000),
            hop_limit: 32,
            ..Default::default()
        }),
        2,
        0,
    );

    assert_eq!(pit.receive_interest(&short, 0), Ok(PitVerdict::New));
    assert_eq!(pit.receive_interest(&long, 0), Ok(PitVerdict::Extended));
    assert_eq!(pit.entry(&short).expect("entry").expiry(), 10_000);
}

#[test]
fn restrictions_store_separately_and_object_matches_all() {
    let mut pit = pit();
    let name: &[&[u8]] = &[b"data", b"x"];
    let payload = ObjectSpec {
        payload: b"body".to_vec(),
        key_id: Some(vec![0x55; 4]),
        ..Default::default()
    };
    let object_packet = common::v1_object(name, &payload);
    let object = common::message(object_packet, 9, 0);
    let hash = object.content_object_hash();

    let by_name = common::message(
        common::v1_interest(name, &InterestSpec::hops(8)),
        1,
        0,
    );
    let by_keyid = common::message(
        common::v1_interest(name, &InterestSpec {
            key_id: Some(vec![0x55; 4]),
            hop_limit: 8,
            ..Default::default()
        }),
        2,
        0,
    );
    let by_hash = common::message(
        common::v1_interest(name, &InterestSpec {
            object_hash: Some(hash.to_vec()),
            hop_limit: 8,
            ..Default::default()
        }),
        3,
        0,
    );

    assert_eq!(pit.receive_interest(&by_name, 0), Ok(PitVerdict::New));
    assert_eq!(pit.receive_interest(&by_keyid, 0), Ok(PitVerdict::New));
    assert_eq!(pit.receive_interest(&by_hash, 0), Ok(PitVerdict::New));
    assert_eq!(pit.len(), 3);

    let reverse = pit.satisfy(&object, 1);
    let mut ids: Vec<_> = reverse.iter().collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 2, 3]);
    assert!(pit.is_empty());

    // A second identical object is unsolicited now.
    let object2 = common::message(
        common::v1_object(name, &payload),
        9,
        2,
    );
    assert!(pit.satisfy(&object2, 2).is_empty());
}

#[test]
fn expiry_removes_entries_silently() {
    let mut pit = pit();
    let interest = common::message(
        common::v1_interest(&[b"short"], &InterestSpec {
            lifetime_ms: Some(10),
            hop_limit: 4,
            ..Default::default()
        }),
        1,
        0,
    );
    pit.receive_interest(&interest, 0).expect("no cap");
    assert_eq!(pit.next_expiry(), Some(10));

    assert_eq!(pit.expire_due(9), 0);
    assert_eq!(pit.expire_due(11), 1);
    assert!(pit.is_empty());
    assert_eq!(pit.next_expiry(), None);

    // A late object finds nothing.
    let object = common::message(
        common::v1_object(&[b"short"], &ObjectSpec::default()),
        2,
        12,
    );
    assert!(pit.satisfy(&object, 12).is_empty());
}

#[test]
fn capacity_overflow_drops() {
    let mut pit = Pit::new(4_000, Some(1));
    let first = common::message(
        common::v1_interest(&[b"a"], &InterestSpec::hops(4)),
        1,
        0,
    );
    let second = common::message(
        common::v1_interest(&[b"b"], &InterestSpec::hops(4)),
        1,
        0,
    );
    assert!(pit.receive_interest(&first, 0).is_ok());
    assert!(pit.receive_interest(&second, 0).is_err());
    // Aggregation onto the existing entry still works at capacity.
    let again = common::message(
        common::v1_interest(&[b"a"], &InterestSpec::hops(4)),
        2,
        0,
    );
    assert_eq!(pit.receive_interest(&again, 0), Ok(PitVerdict::Aggregated));
}

#[test]
fn connection_sweep_clears_references() {
    let mut pit = pit();
    let packet = common::v1_interest(&[b"x"], &InterestSpec::hops(4));
    let from_one = common::message(packet.clone(), 1, 0);
    let from_two = common::message(packet.clone(), 2, 0);
    pit.receive_interest(&from_one, 0).expect("no cap");
    pit.receive_interest(&from_two, 0).expect("no cap");
    pit.add_egress(&from_one, 5);

    // Removing one reverse path keeps the entry alive.
    pit.remove_connection(1);
    let entry = pit.entry(&from_one).expect("entry");
    assert!(!entry.ingress().contains(1));
    assert!(entry.ingress().contains(2));

    // Removing the egress reference too.
    pit.remove_connection(5);
    assert!(!pit.entry(&from_one).expect("entry").egress().contains(5));

    // Removing the last reverse path removes the entry.
    pit.remove_connection(2);
    assert!(pit.is_empty());
}
