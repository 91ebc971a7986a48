// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The 8-byte fixed header shared by both packet schemas.
//!
//! ```text
//!  0       1         2 3         4        5        6      7
//! +-------+---------+-----------+--------+--------+------+-----------+
//! |version|pkt type |packet len |hop lim |reserved|flags |header len |
//! +-------+---------+-----------+--------+--------+------+-----------+
//! ```
//!
//! `header_length` counts the fixed header plus the per-hop header block,
//! so it is the offset at which the CCNx message starts. `packet_length`
//! covers the whole packet. Bytes 4..7 are schema- and type-dependent;
//! byte 4 is the hop limit for V1 Interests.

use anyhow::{Result, bail};
use zerocopy::{
    BigEndian, FromBytes as ZFromBytes, Immutable, IntoBytes, KnownLayout, U16,
};

use crate::tlv::CodecError;

pub const FIXED_HEADER_LEN: usize = 8;

/// Supported schema version bytes.
pub const VERSION_0: u8 = 0;
pub const VERSION_1: u8 = 1;

#[repr(C)]
#[derive(Debug, Default, PartialEq, ZFromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct FixedHeader {
    pub version: u8,
    pub packet_type: u8,
    pub packet_length: U16<BigEndian>,
    pub hop_limit: u8,
    pub reserved: u8,
    pub flags: u8,
    pub header_length: u8,
}

impl FixedHeader {
    pub fn parse(packet: &[u8]) -> Result<&Self, CodecError> {
        let (header, _) =
            Self::ref_from_prefix(packet).map_err(|_| CodecError::Truncated {
                need: FIXED_HEADER_LEN,
                have: packet.len(),
            })?;
        if header.version != VERSION_0 && header.version != VERSION_1 {
            return Err(CodecError::UnsupportedVersion(header.version));
        }
        Ok(header)
    }

    pub fn to_wire_bytes(&self, buf: &mut [u8]) -> Result<()> {
        if buf.len() != FIXED_HEADER_LEN {
            bail!("buffer length must be {FIXED_HEADER_LEN}, got {}", buf.len());
        }
        buf.copy_from_slice(self.as_bytes());
        Ok(())
    }
}

/// Total packet length from the first 8 bytes, or 0 for an unknown version
/// or a short buffer.
///
/// This is the framing contract for stream links: read 8 bytes, then
/// `total_packet_length() - 8` more.
pub fn total_packet_length(packet: &[u8]) -> usize {
    match FixedHeader::parse(packet) {
        Ok(header) => header.packet_length.get() as usize,
        Err(_) => 0,
    }
}

/// Length of all headers (fixed + per-hop), which is the offset where the
/// CCNx message starts. Returns 0 for an unknown version.
pub fn total_header_length(packet: &[u8]) -> usize {
    match FixedHeader::parse(packet) {
        Ok(header) => header.header_length as usize,
        Err(_) => 0,
    }
}
