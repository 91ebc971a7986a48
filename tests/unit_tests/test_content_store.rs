// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use metis_forwarder::content_store::store::{ContentStore, CsPutResult};

use super::common::{self, InterestSpec, ObjectSpec};

const DEFAULT_TTL: u64 = 60_000;

fn store(capacity: usize) -> ContentStore {
    ContentStore::new(capacity, DEFAULT_TTL)
}

fn object(name: &[&[u8]], payload: &[u8]) -> metis_forwarder::core::message::Message {
    common::message(
        common::v1_object(name, &ObjectSpec {
            payload: payload.to_vec(),
            ..Default::default()
        }),
        1,
        0,
    )
}

fn interest(name: &[&[u8]]) -> metis_forwarder::core::message::Message {
    common::message(common::v1_interest(name, &InterestSpec::hops(8)), 2, 0)
}

#[test]
fn lru_eviction_at_capacity() {
    let mut store = store(3);
    for name in [&b"A"[..], b"B", b"C", b"D"] {
        assert_eq!(store.put(&object(&[name], b"data"), 0), CsPutResult::Stored);
    }
    assert_eq!(store.len(), 3);

    // A was the least recently used; it is gone.
    assert!(store.match_interest(&interest(&[b"A"]), 1).is_none());
    for name in [&b"B"[..], b"C", b"D"] {
        assert!(store.match_interest(&interest(&[name]), 1).is_some());
    }
}

#[test]
fn match_promotes_to_front() {
    let mut store = store(3);
    for name in [&b"A"[..], b"B", b"C"] {
        store.put(&object(&[name], b"data"), 0);
    }
    // Touch A so B becomes the eviction candidate.
    assert!(store.match_interest(&interest(&[b"A"]), 1).is_some());
    store.put(&object(&[b"D"], b"data"), 2);

    assert!(store.match_interest(&interest(&[b"B"]), 3).is_none());
    assert!(store.match_interest(&interest(&[b"A"]), 3).is_some());
}

#[test]
fn duplicate_put_promotes_instead_of_storing() {
    let mut store = store(2);
    let first = object(&[b"X"], b"same-bytes");
    assert_eq!(store.put(&first, 0), CsPutResult::Stored);

    let second = object(&[b"X"], b"same-bytes");
    assert_eq!(store.put(&second, 1), CsPutResult::Duplicate);
    assert_eq!(store.len(), 1);

    // Different payload hashes differently, so it is a distinct entry
    // under the same name.
    let variant = object(&[b"X"], b"other-bytes");
    assert_eq!(store.put(&variant, 2), CsPutResult::Stored);
    assert_eq!(store.len(), 2);
}

#[test]
fn tiered_match_by_hash_and_keyid() {
    let mut store = store(8);
    let name: &[&[u8]] = &[b"doc"];

    let signed = common::message(
        common::v1_object(name, &ObjectSpec {
            payload: b"signed".to_vec(),
            key_id: Some(vec![0x77; 4]),
            ..Default::default()
        }),
        1,
        0,
    );
    store.put(&signed, 0);
    let hash = signed.content_object_hash();

    let by_hash = common::message(
        common::v1_interest(name, &InterestSpec {
            object_hash: Some(hash.to_vec()),
            hop_limit: 8,
            ..Default::default()
        }),
        2,
        0,
    );
    let hit = store.match_interest(&by_hash, 1).expect("hash hit");
    assert_eq!(hit.as_bytes(), signed.as_bytes());

    let by_keyid = common::message(
        common::v1_interest(name, &InterestSpec {
            key_id: Some(vec![0x77; 4]),
            hop_limit: 8,
            ..Default::default()
        }),
        2,
        0,
    );
    assert!(store.match_interest(&by_keyid, 1).is_some());

    let wrong_hash = common::message(
        common::v1_interest(name, &InterestSpec {
            object_hash: Some(vec![0u8; 32]),
            hop_limit: 8,
            ..Default::default()
        }),
        2,
        0,
    );
    assert!(store.match_interest(&wrong_hash, 1).is_none());
}

#[test]
fn expired_entry_is_a_miss_and_gets_evicted() {
    let mut store = store(4);
    let short_lived = common::message(
        common::v1_object(&[b"E"], &ObjectSpec {
            payload: b"x".to_vec(),
            cache_time_ms: Some(10),
            ..Default::default()
        }),
        1,
        0,
    );
    store.put(&short_lived, 0);

    assert!(store.match_interest(&interest(&[b"E"]), 5).is_some());
    assert!(store.match_interest(&interest(&[b"E"]), 11).is_none());
    assert_eq!(store.len(), 0);
}

#[test]
fn periodic_purge_uses_earliest_deadline() {
    let mut store = store(4);
    store.put(
        &common::message(
            common::v1_object(&[b"soon"], &ObjectSpec {
                payload: b"x".to_vec(),
                expiry_time_ms: Some(100),
                cache_time_ms: Some(50_000),
                ..Default::default()
            }),
            1,
            0,
        ),
        0,
    );
    store.put(&object(&[b"later"], b"y"), 0);

    // ExpiryTime wins over the longer recommended cache time.
    assert_eq!(store.purge_expired(99), 0);
    assert_eq!(store.purge_expired(101), 1);
    assert_eq!(store.len(), 1);
    assert!(store.match_interest(&interest(&[b"later"]), 102).is_some());
}

#[test]
fn zero_capacity_disables_the_store() {
    let mut store = store(0);
    assert_eq!(store.put(&object(&[b"A"], b"x"), 0), CsPutResult::Dropped);
    assert_eq!(store.len(), 0);
}
