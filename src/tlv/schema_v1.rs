// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! CCNx 1.0 TLV registry (schema version 1).

use crate::tlv::{
    CodecError,
    extent::TlvExtent,
    fixed_header::{FIXED_HEADER_LEN, FixedHeader},
    skeleton::{PacketKind, SchemaVersion, TlvCursor, TlvSkeleton},
};

// Packet types (fixed header byte 1).
pub const PT_INTEREST: u8 = 0x00;
pub const PT_CONTENT: u8 = 0x01;
pub const PT_RETURN: u8 = 0x02;
pub const PT_CONTROL: u8 = 0xA4;

// Hop-by-hop header TLVs.
pub const T_INTLIFE: u16 = 0x0001;
pub const T_CACHETIME: u16 = 0x0002;

// Top-level message containers.
pub const T_INTEREST: u16 = 0x0001;
pub const T_OBJECT: u16 = 0x0002;
pub const T_VALIDATION_ALG: u16 = 0x0003;
pub const T_VALIDATION_PAYLOAD: u16 = 0x0004;
pub const T_CPI: u16 = 0xBEEF;

// Message-level TLVs.
pub const T_NAME: u16 = 0x0000;
pub const T_PAYLOAD: u16 = 0x0001;
pub const T_KEYID_RESTRICTION: u16 = 0x0002;
pub const T_OBJHASH_RESTRICTION: u16 = 0x0003;
pub const T_EXPIRY_TIME: u16 = 0x0006;
pub const T_CACHE_CONTROL: u16 = 0x0007;

// Validation-algorithm TLVs.
pub const T_KEYID: u16 = 0x0009;

/// Byte offset of the hop-limit field inside the V1 fixed header.
const HOP_LIMIT_OFFSET: usize = 4;

pub(crate) fn parse(
    packet: &[u8],
    header: &FixedHeader,
) -> Result<TlvSkeleton, CodecError> {
    let kind = match header.packet_type {
        PT_INTEREST => PacketKind::Interest,
        PT_CONTENT => PacketKind::ContentObject,
        PT_RETURN => PacketKind::InterestReturn,
        PT_CONTROL => PacketKind::Control,
        _ => return Err(CodecError::Malformed("unknown packet type")),
    };

    let total = header.packet_length.get() as usize;
    let header_end = header.header_length as usize;

    let mut skeleton = TlvSkeleton {
        kind,
        version: SchemaVersion::V1,
        name: TlvExtent::EMPTY,
        key_id: TlvExtent::EMPTY,
        object_hash: TlvExtent::EMPTY,
        hop_limit: TlvExtent::EMPTY,
        interest_lifetime: TlvExtent::EMPTY,
        cache_time: TlvExtent::EMPTY,
        expiry_time: TlvExtent::EMPTY,
        payload: TlvExtent::EMPTY,
        control: TlvExtent::EMPTY,
        do_not_cache: false,
        header_end: header_end as u16,
        total_length: total as u16,
    };

    if matches!(kind, PacketKind::Interest | PacketKind::InterestReturn) {
        skeleton.hop_limit = TlvExtent::new(HOP_LIMIT_OFFSET, 1);
    }

    // Per-hop headers between the fixed header and the message.
    let mut cursor = TlvCursor::new(packet, FIXED_HEADER_LEN, header_end)?;
    while let Some((t, extent)) = cursor.next()? {
        match t {
            T_INTLIFE => skeleton.interest_lifetime = extent,
            T_CACHETIME => skeleton.cache_time = extent,
            _ => {},
        }
    }

    // Top-level: message container, then optional validation sections.
    let mut top = TlvCursor::new(packet, header_end, total)?;
    while let Some((t, extent)) = top.next()? {
        match t {
            T_INTEREST | T_OBJECT => {
                parse_message_body(packet, extent, &mut skeleton)?;
            },
            T_VALIDATION_ALG => {
                let mut alg =
                    TlvCursor::new(packet, extent.offset as usize, extent.range().end)?;
                while let Some((vt, vext)) = alg.next()? {
                    if vt == T_KEYID && skeleton.key_id.is_empty() {
                        skeleton.key_id = vext;
                    }
                }
            },
            T_VALIDATION_PAYLOAD => {},
            T_CPI => skeleton.control = extent,
            _ => {},
        }
    }

    Ok(skeleton)
}

fn parse_message_body(
    packet: &[u8],
    body: TlvExtent,
    skeleton: &mut TlvSkeleton,
) -> Result<(), CodecError> {
    let mut cursor = TlvCursor::new(packet, body.offset as usize, body.range().end)?;
    while let Some((t, extent)) = cursor.next()? {
        match t {
            T_NAME => skeleton.name = extent,
            T_PAYLOAD => skeleton.payload = extent,
            T_KEYID_RESTRICTION => skeleton.key_id = extent,
            T_OBJHASH_RESTRICTION => skeleton.object_hash = extent,
            T_EXPIRY_TIME => skeleton.expiry_time = extent,
            T_CACHE_CONTROL => skeleton.do_not_cache = true,
            _ => {},
        }
    }
    Ok(())
}
