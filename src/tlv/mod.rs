// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Wire codec for the two CCNx packet schemas.
//!
//! A received packet is framed off the wire with [`fixed_header`], then a
//! single forward pass over its TLVs produces a [`skeleton::TlvSkeleton`]:
//! byte extents into the original buffer for every field the forwarding
//! plane cares about. Nothing is copied; all later lookups slice the
//! ingress `Bytes`.

pub mod extent;
pub mod fixed_header;
pub mod fragmenter;
pub mod name;
pub mod schema_v0;
pub mod schema_v1;
pub mod skeleton;

use thiserror::Error;

/// Errors produced while parsing a wire packet.
///
/// Every variant maps to a drop + per-link error counter in the pipeline;
/// none of them tear down the forwarder.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("unsupported packet version {0}")]
    UnsupportedVersion(u8),

    #[error("malformed packet: {0}")]
    Malformed(&'static str),

    #[error("truncated packet: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },
}

/// Parse a big-endian variable-length integer out of a TLV value.
///
/// The field must be 1 to 8 bytes; anything else returns `None`.
pub fn read_varint(bytes: &[u8]) -> Option<u64> {
    if bytes.is_empty() || bytes.len() > 8 {
        return None;
    }
    let mut value = 0u64;
    for &b in bytes {
        value = (value << 8) | u64::from(b);
    }
    Some(value)
}
