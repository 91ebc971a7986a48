// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use bytes::Bytes;
use hex_literal::hex;
use metis_forwarder::{
    core::message::Message,
    tlv::{
        CodecError,
        fixed_header::{FIXED_HEADER_LEN, total_header_length, total_packet_length},
        read_varint,
        skeleton::{PacketKind, SchemaVersion, TlvSkeleton},
    },
};
use sha2::{Digest, Sha256};

use super::common::{self, InterestSpec, ObjectSpec};

#[test]
fn fixed_header_lengths() {
    let packet = common::v1_interest(&[b"foo"], &InterestSpec::hops(32));
    assert_eq!(total_packet_length(&packet), packet.len());
    assert_eq!(total_header_length(&packet), FIXED_HEADER_LEN);

    let with_lifetime = common::v1_interest(&[b"foo"], &InterestSpec {
        lifetime_ms: Some(4000),
        hop_limit: 32,
        ..Default::default()
    });
    // One per-hop TLV: 4 bytes of T/L plus an 8-byte value.
    assert_eq!(total_header_length(&with_lifetime), FIXED_HEADER_LEN + 12);

    // Unknown version reports zero.
    assert_eq!(total_packet_length(&hex!("07 00 00 10 00 00 00 08")), 0);
    assert_eq!(total_packet_length(&hex!("01 00")), 0);
}

#[test]
fn v1_interest_skeleton_extents() -> Result<()> {
    let packet = common::v1_interest(&[b"help", b"me"], &InterestSpec {
        key_id: Some(vec![0xaa; 4]),
        object_hash: Some(vec![0xbb; 6]),
        lifetime_ms: Some(8000),
        hop_limit: 3,
    });
    let skeleton = TlvSkeleton::parse(&packet)?;

    assert_eq!(skeleton.kind, PacketKind::Interest);
    assert_eq!(skeleton.version, SchemaVersion::V1);
    // Hop limit is byte 4 of the fixed header in V1.
    assert_eq!(skeleton.hop_limit.offset, 4);
    assert_eq!(skeleton.hop_limit.length, 1);

    let name = skeleton.name.slice(&packet).expect("name extent");
    assert_eq!(name, &common::name_value(&[b"help", b"me"])[..]);
    assert_eq!(skeleton.key_id.slice(&packet), Some(&[0xaa; 4][..]));
    assert_eq!(skeleton.object_hash.slice(&packet), Some(&[0xbb; 6][..]));

    let lifetime = skeleton.interest_lifetime.slice(&packet).expect("lifetime");
    assert_eq!(read_varint(lifetime), Some(8000));
    Ok(())
}

#[test]
fn v0_interest_hop_limit_is_per_hop() -> Result<()> {
    let packet = common::v0_interest(&[b"foo"], 7, Some(1000));
    let skeleton = TlvSkeleton::parse(&packet)?;

    assert_eq!(skeleton.kind, PacketKind::Interest);
    assert_eq!(skeleton.version, SchemaVersion::V0);
    // First per-hop TLV value lands right after the fixed header T/L.
    assert_eq!(skeleton.hop_limit.offset, 12);
    assert_eq!(skeleton.hop_limit.length, 1);
    assert_eq!(skeleton.hop_limit.slice(&packet), Some(&[7u8][..]));

    let lifetime = skeleton.interest_lifetime.slice(&packet).expect("lifetime");
    assert_eq!(read_varint(lifetime), Some(1000));
    Ok(())
}

#[test]
fn v1_object_skeleton() -> Result<()> {
    let packet = common::v1_object(&[b"movie", b"chunk0"], &ObjectSpec {
        payload: b"DATA".to_vec(),
        key_id: Some(vec![0x11; 8]),
        cache_time_ms: Some(9000),
        expiry_time_ms: Some(5000),
        do_not_cache: false,
    });
    let skeleton = TlvSkeleton::parse(&packet)?;

    assert_eq!(skeleton.kind, PacketKind::ContentObject);
    assert_eq!(skeleton.payload.slice(&packet), Some(&b"DATA"[..]));
    assert_eq!(skeleton.key_id.slice(&packet), Some(&[0x11; 8][..]));
    assert_eq!(
        read_varint(skeleton.cache_time.slice(&packet).expect("cachetime")),
        Some(9000)
    );
    assert_eq!(
        read_varint(skeleton.expiry_time.slice(&packet).expect("expiry")),
        Some(5000)
    );
    assert!(!skeleton.do_not_cache);
    Ok(())
}

#[test]
fn control_packet_carries_body() -> Result<()> {
    let packet = common::v1_control(br#"{"command":"list routes"}"#);
    let skeleton = TlvSkeleton::parse(&packet)?;
    assert_eq!(skeleton.kind, PacketKind::Control);
    assert_eq!(
        skeleton.control.slice(&packet),
        Some(&br#"{"command":"list routes"}"#[..])
    );
    Ok(())
}

#[test]
fn malformed_packets_are_rejected() {
    // Interest with no name.
    let no_name = {
        let body = common::tlv(0x0001, &common::tlv(0x0001, b"payload-only"));
        let mut raw = vec![1u8, 0x00, 0, 0, 32, 0, 0, 8];
        raw.extend_from_slice(&body);
        let total = raw.len() as u16;
        raw[2..4].copy_from_slice(&total.to_be_bytes());
        Bytes::from(raw)
    };
    assert!(matches!(
        TlvSkeleton::parse(&no_name),
        Err(CodecError::Malformed(_))
    ));

    // Inner TLV overruns its container: corrupt the Name TLV length, which
    // sits right after the T_INTEREST container header.
    let mut overrun = common::v1_interest(&[b"x"], &InterestSpec::hops(1)).to_vec();
    overrun[15] = 0xff;
    assert!(matches!(
        TlvSkeleton::parse(&overrun),
        Err(CodecError::Malformed(_))
    ));

    // Packet length below header length.
    let short = hex!("01 00 00 04 00 00 00 08");
    assert!(matches!(
        TlvSkeleton::parse(&short),
        Err(CodecError::Malformed(_))
    ));

    // Unknown version.
    let bad_version = hex!("05 00 00 08 00 00 00 08");
    assert!(matches!(
        TlvSkeleton::parse(&bad_version),
        Err(CodecError::UnsupportedVersion(5))
    ));

    // Truncated buffer.
    assert!(matches!(
        TlvSkeleton::parse(&hex!("01 00")),
        Err(CodecError::Truncated { .. })
    ));
}

#[test]
fn varint_bounds() {
    assert_eq!(read_varint(&hex!("01 02")), Some(0x0102));
    assert_eq!(read_varint(&hex!("a0 a1 a3")), Some(0xa0a1a3));
    assert_eq!(read_varint(&[]), None);
    assert_eq!(read_varint(&[0u8; 9]), None);
}

#[test]
fn reserialise_is_byte_identical_and_reparse_matches() -> Result<()> {
    let packet = common::v1_object(&[b"a", b"b"], &ObjectSpec {
        payload: b"xyz".to_vec(),
        ..Default::default()
    });
    let message = Message::from_wire(packet.clone(), 1, 0)?;
    assert_eq!(message.as_bytes(), &packet);

    let reparsed = TlvSkeleton::parse(message.as_bytes())?;
    assert_eq!(&reparsed, message.skeleton());
    Ok(())
}

#[test]
fn content_object_hash_covers_body() -> Result<()> {
    let packet = common::v1_object(&[b"n"], &ObjectSpec {
        payload: b"hello".to_vec(),
        ..Default::default()
    });
    let message = Message::from_wire(packet.clone(), 1, 0)?;

    let start = total_header_length(&packet);
    let expected = Sha256::digest(&packet[start..]);
    assert_eq!(message.content_object_hash(), Bytes::copy_from_slice(&expected));
    // Cached value is stable.
    assert_eq!(message.content_object_hash(), message.content_object_hash());
    Ok(())
}
