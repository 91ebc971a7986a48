// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The packet skeleton: one forward pass, extents for everything.

use crate::tlv::{
    CodecError,
    extent::TlvExtent,
    fixed_header::{FIXED_HEADER_LEN, FixedHeader, VERSION_0, VERSION_1},
    schema_v0, schema_v1,
};

/// The four packet kinds the processor dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Interest,
    ContentObject,
    Control,
    InterestReturn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaVersion {
    V0,
    V1,
}

/// Byte extents of every field the forwarding plane uses, computed once at
/// ingress. Both schema versions produce the same logical skeleton.
///
/// An absent field has the [`TlvExtent::EMPTY`] extent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlvSkeleton {
    pub kind: PacketKind,
    pub version: SchemaVersion,

    /// Value region of the Name TLV (the concatenated name-segment TLVs).
    pub name: TlvExtent,
    /// KeyId restriction (Interest) or publisher KeyId (Content Object).
    pub key_id: TlvExtent,
    /// ContentObjectHash restriction (Interest only).
    pub object_hash: TlvExtent,
    /// One-byte hop limit; fixed-header byte for V1, per-hop TLV for V0.
    pub hop_limit: TlvExtent,
    pub interest_lifetime: TlvExtent,
    pub cache_time: TlvExtent,
    pub expiry_time: TlvExtent,
    pub payload: TlvExtent,
    /// Control message body (CPI payload) for `PacketKind::Control`.
    pub control: TlvExtent,

    /// Explicit do-not-cache marker (CacheControl TLV).
    pub do_not_cache: bool,

    /// Offset where the headers end; the content-object hash covers
    /// `header_end..total_length`.
    pub header_end: u16,
    pub total_length: u16,
}

impl TlvSkeleton {
    /// Parse the skeleton out of a framed packet.
    ///
    /// `packet` must hold at least `total_packet_length()` bytes; trailing
    /// bytes past the declared packet length are ignored.
    pub fn parse(packet: &[u8]) -> Result<TlvSkeleton, CodecError> {
        let header = FixedHeader::parse(packet)?;

        let total = header.packet_length.get() as usize;
        let header_end = header.header_length as usize;
        if header_end < FIXED_HEADER_LEN {
            return Err(CodecError::Malformed("header length below fixed header"));
        }
        if total < header_end {
            return Err(CodecError::Malformed("packet length below header length"));
        }
        if packet.len() < total {
            return Err(CodecError::Truncated {
                need: total,
                have: packet.len(),
            });
        }

        let skeleton = match header.version {
            VERSION_0 => schema_v0::parse(packet, header)?,
            VERSION_1 => schema_v1::parse(packet, header)?,
            other => return Err(CodecError::UnsupportedVersion(other)),
        };

        // Required fields per packet kind.
        match skeleton.kind {
            PacketKind::Interest | PacketKind::ContentObject => {
                if skeleton.name.is_empty() {
                    return Err(CodecError::Malformed("message carries no name"));
                }
            },
            PacketKind::Control => {
                if skeleton.control.is_empty() {
                    return Err(CodecError::Malformed("control packet without body"));
                }
            },
            PacketKind::InterestReturn => {},
        }

        Ok(skeleton)
    }
}

/// Cursor over a run of TLVs inside `packet[..end]`.
///
/// Yields `(type, value extent)`; container overrun is an error, which is
/// how an inner TLV lying about its length is caught.
pub(crate) struct TlvCursor<'a> {
    packet: &'a [u8],
    offset: usize,
    end: usize,
}

impl<'a> TlvCursor<'a> {
    pub(crate) fn new(
        packet: &'a [u8],
        offset: usize,
        end: usize,
    ) -> Result<Self, CodecError> {
        if end > packet.len() || offset > end {
            return Err(CodecError::Malformed("TLV container exceeds packet"));
        }
        Ok(Self {
            packet,
            offset,
            end,
        })
    }

    pub(crate) fn next(&mut self) -> Result<Option<(u16, TlvExtent)>, CodecError> {
        if self.offset == self.end {
            return Ok(None);
        }
        if self.offset + 4 > self.end {
            return Err(CodecError::Malformed("trailing bytes shorter than a TLV"));
        }
        let t = u16::from_be_bytes([self.packet[self.offset], self.packet[self.offset + 1]]);
        let l = u16::from_be_bytes([
            self.packet[self.offset + 2],
            self.packet[self.offset + 3],
        ]) as usize;
        let value_start = self.offset + 4;
        if value_start + l > self.end {
            return Err(CodecError::Malformed("TLV length exceeds its container"));
        }
        self.offset = value_start + l;
        Ok(Some((t, TlvExtent::new(value_start, l))))
    }
}
