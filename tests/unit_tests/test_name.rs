// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use bytes::Bytes;
use metis_forwarder::tlv::name::Name;

use super::common;

#[test]
fn segments_include_type_and_length() -> Result<()> {
    // Two segments: (t=2, "hello") and (t=0xF000, "ouch").
    let mut raw = Vec::new();
    raw.extend_from_slice(&common::tlv(0x0002, b"hello"));
    raw.extend_from_slice(&common::tlv(0xF000, b"ouch"));
    let name = Name::from_bytes(Bytes::from(raw))?;

    assert_eq!(name.segment_count(), 2);
    assert_eq!(name.segment(0).len(), 9);
    assert_eq!(name.segment(1).len(), 8);
    assert_eq!(name.segment_type(0), 0x0002);
    assert_eq!(name.segment_type(1), 0xF000);
    assert_eq!(name.segment_value(0), b"hello");
    assert_eq!(name.segment_value(1), b"ouch");
    Ok(())
}

#[test]
fn parser_grows_past_initial_segment_capacity() -> Result<()> {
    // More segments than the initial extent allocation.
    let segments: Vec<Vec<u8>> = (0..18u8).map(|i| vec![b'a' + (i % 26)]).collect();
    let refs: Vec<&[u8]> = segments.iter().map(|s| s.as_slice()).collect();
    let name = common::name(&refs);
    assert_eq!(name.segment_count(), 18);
    assert_eq!(name.segment_value(17), &segments[17][..]);
    Ok(())
}

#[test]
fn truncated_segment_is_rejected() {
    // Segment claims 5 bytes but only 3 follow.
    let raw = b"\x00\x01\x00\x05abc".to_vec();
    assert!(Name::from_bytes(Bytes::from(raw)).is_err());
}

#[test]
fn hash_prefix_law() {
    let name = common::name(&[b"a", b"b", b"c", b"d"]);
    for k in 0..=name.segment_count() {
        let prefix = name.prefix(k);
        // A standalone parse of the same bytes must agree with the cached
        // cumulative hash.
        let standalone = common::name(
            &(0..k)
                .map(|i| name.segment_value(i))
                .collect::<Vec<_>>(),
        );
        assert_eq!(prefix.hash32(), name.cumulative_hash(k));
        assert_eq!(standalone.hash32(), prefix.hash32(), "prefix length {k}");
    }
}

#[test]
fn prefix_shares_guts_and_compares_equal() {
    let name = common::name(&[b"foo", b"bar", b"baz"]);
    let prefix = name.prefix(2);

    assert_eq!(prefix.segment_count(), 2);
    assert_eq!(prefix, common::name(&[b"foo", b"bar"]));
    assert_ne!(prefix, name);
    assert!(name.starts_with(&prefix));
    assert!(!prefix.starts_with(&name));

    let unrelated = common::name(&[b"foo", b"qux"]);
    assert!(!name.starts_with(&unrelated));
}

#[test]
fn display_is_lci_uri() {
    let name = common::name(&[b"foo", b"bar"]);
    assert_eq!(name.to_string(), "lci:/foo/bar");

    let binary = common::name(&[&[0x00, 0x01][..]]);
    assert_eq!(binary.to_string(), "lci:/0x0001");
}
