// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Hop-by-hop fragmentation for raw-Ethernet links.
//!
//! A packet larger than the link MTU travels as a train of fragment frames,
//! each led by an 8-byte fragment header carrying Begin/Middle/End flags
//! and a sequence number. Reassembly state is kept per peer MAC and is
//! bounded; a peer that overruns the buffer or breaks the sequence loses
//! its partial packet, never more.

use std::collections::HashMap;

use bytes::{Bytes, BytesMut};
use zerocopy::{
    BigEndian, FromBytes as ZFromBytes, Immutable, IntoBytes, KnownLayout, U16,
};

use crate::tlv::{CodecError, fixed_header::VERSION_1};

/// Packet type marking a hop-by-hop fragment frame.
pub const PT_HOPFRAG: u8 = 0x04;

pub const FRAGMENT_HEADER_LEN: usize = 8;

pub const FLAG_BEGIN: u8 = 0x40;
pub const FLAG_MIDDLE: u8 = 0x20;
pub const FLAG_END: u8 = 0x10;

/// Upper bound on a single peer's partial reassembly buffer.
pub const REASSEMBLY_CAP: usize = 64 * 1024;

#[repr(C)]
#[derive(Debug, Default, PartialEq, ZFromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct FragmentHeader {
    pub version: u8,
    pub packet_type: u8,
    pub frame_length: U16<BigEndian>,
    pub flags: u8,
    pub reserved: u8,
    pub seqnum: U16<BigEndian>,
}

/// True when the frame is a fragment train member rather than a whole
/// packet.
pub fn is_fragment(frame: &[u8]) -> bool {
    frame.len() >= FRAGMENT_HEADER_LEN && frame[1] == PT_HOPFRAG
}

/// Split `packet` into fragment frames of at most `mtu` bytes.
///
/// A packet that already fits is returned unchanged as a single frame.
/// `seq` is the per-peer running sequence counter; it is advanced past the
/// sequence numbers consumed.
pub fn fragment(packet: &Bytes, mtu: usize, seq: &mut u16) -> Vec<Bytes> {
    assert!(mtu > FRAGMENT_HEADER_LEN, "mtu too small for a fragment");

    if packet.len() <= mtu {
        return vec![packet.clone()];
    }

    let chunk = mtu - FRAGMENT_HEADER_LEN;
    let mut frames = Vec::with_capacity(packet.len().div_ceil(chunk));
    let mut offset = 0usize;
    while offset < packet.len() {
        let end = usize::min(offset + chunk, packet.len());
        let mut flags = 0u8;
        if offset == 0 {
            flags |= FLAG_BEGIN;
        }
        if end == packet.len() {
            flags |= FLAG_END;
        }
        if flags == 0 {
            flags = FLAG_MIDDLE;
        }

        let header = FragmentHeader {
            version: VERSION_1,
            packet_type: PT_HOPFRAG,
            frame_length: U16::new((FRAGMENT_HEADER_LEN + end - offset) as u16),
            flags,
            reserved: 0,
            seqnum: U16::new(*seq),
        };
        *seq = seq.wrapping_add(1);

        let mut frame = BytesMut::with_capacity(FRAGMENT_HEADER_LEN + end - offset);
        frame.extend_from_slice(header.as_bytes());
        frame.extend_from_slice(&packet[offset..end]);
        frames.push(frame.freeze());

        offset = end;
    }
    frames
}

struct PeerState {
    buf: BytesMut,
    next_seq: u16,
}

/// Per-peer-MAC fragment reassembly.
#[derive(Default)]
pub struct Reassembler {
    peers: HashMap<[u8; 6], PeerState>,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one link frame from `peer`; returns a whole packet when one
    /// completes. Non-fragment frames pass straight through.
    pub fn receive(
        &mut self,
        peer: [u8; 6],
        frame: Bytes,
    ) -> Result<Option<Bytes>, CodecError> {
        if !is_fragment(&frame) {
            return Ok(Some(frame));
        }

        let (header, _) = FragmentHeader::ref_from_prefix(&frame[..])
            .map_err(|_| CodecError::Malformed("short fragment header"))?;
        let flags = header.flags;
        let seq = header.seqnum.get();
        let payload = &frame[FRAGMENT_HEADER_LEN..];

        if flags & FLAG_BEGIN != 0 {
            if flags & FLAG_END != 0 {
                // Single-frame train.
                self.peers.remove(&peer);
                return Ok(Some(frame.slice(FRAGMENT_HEADER_LEN..)));
            }
            let mut buf = BytesMut::with_capacity(payload.len() * 2);
            buf.extend_from_slice(payload);
            self.peers.insert(peer, PeerState {
                buf,
                next_seq: seq.wrapping_add(1),
            });
            return Ok(None);
        }

        let Some(state) = self.peers.get_mut(&peer) else {
            return Err(CodecError::Malformed("fragment without begin"));
        };
        if seq != state.next_seq {
            self.peers.remove(&peer);
            return Err(CodecError::Malformed("fragment out of order"));
        }
        if state.buf.len() + payload.len() > REASSEMBLY_CAP {
            self.peers.remove(&peer);
            return Err(CodecError::Malformed("reassembly buffer overflow"));
        }

        state.buf.extend_from_slice(payload);
        state.next_seq = seq.wrapping_add(1);

        if flags & FLAG_END != 0 {
            let state = self
                .peers
                .remove(&peer)
                .unwrap_or_else(|| unreachable!("peer state vanished"));
            return Ok(Some(state.buf.freeze()));
        }
        if flags & FLAG_MIDDLE == 0 {
            self.peers.remove(&peer);
            return Err(CodecError::Malformed("fragment with no flags"));
        }
        Ok(None)
    }
}
