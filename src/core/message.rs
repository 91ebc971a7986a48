// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The parsed, immutable view of one wire packet.

use std::{fmt, rc::Rc};

use bytes::{Bytes, BytesMut};
use once_cell::unsync::OnceCell;
use sha2::{Digest, Sha256};

use crate::{
    core::{
        connection::ConnectionId,
        ticks::{Ticks, ms_to_ticks},
    },
    tlv::{
        CodecError, name::Name, read_varint,
        skeleton::{PacketKind, TlvSkeleton},
    },
};

struct MessageInner {
    packet: Bytes,
    skeleton: TlvSkeleton,
    ingress: ConnectionId,
    ingress_ticks: Ticks,
    /// Present for Interests and Content Objects (the skeleton requires it).
    name: Option<Name>,
    /// SHA-256 over the message body, computed on demand and cached.
    object_hash: OnceCell<Bytes>,
}

/// A reference-counted wire packet plus its skeleton.
///
/// Cloning is cheap; the PIT and the content store share the same guts with
/// the processor. Every accessor slices the original buffer, so
/// re-serialising a message is just handing back [`Message::as_bytes`].
#[derive(Clone)]
pub struct Message {
    inner: Rc<MessageInner>,
}

impl Message {
    /// Parse a framed packet received on `ingress` at `now`.
    pub fn from_wire(
        packet: Bytes,
        ingress: ConnectionId,
        now: Ticks,
    ) -> Result<Self, CodecError> {
        let skeleton = TlvSkeleton::parse(&packet)?;
        let name = if skeleton.name.is_empty() {
            None
        } else {
            Some(Name::from_bytes(packet.slice(skeleton.name.range()))?)
        };
        Ok(Self {
            inner: Rc::new(MessageInner {
                packet,
                skeleton,
                ingress,
                ingress_ticks: now,
                name,
                object_hash: OnceCell::new(),
            }),
        })
    }

    #[inline]
    pub fn kind(&self) -> PacketKind {
        self.inner.skeleton.kind
    }

    #[inline]
    pub fn ingress(&self) -> ConnectionId {
        self.inner.ingress
    }

    #[inline]
    pub fn ingress_ticks(&self) -> Ticks {
        self.inner.ingress_ticks
    }

    #[inline]
    pub fn skeleton(&self) -> &TlvSkeleton {
        &self.inner.skeleton
    }

    #[inline]
    pub fn name(&self) -> Option<&Name> {
        self.inner.name.as_ref()
    }

    /// The original wire bytes, unchanged since ingress.
    #[inline]
    pub fn as_bytes(&self) -> &Bytes {
        &self.inner.packet
    }

    pub fn key_id(&self) -> Option<Bytes> {
        self.extent_bytes(self.inner.skeleton.key_id)
    }

    /// The Interest's ContentObjectHash restriction, if any.
    pub fn object_hash_restriction(&self) -> Option<Bytes> {
        self.extent_bytes(self.inner.skeleton.object_hash)
    }

    pub fn payload(&self) -> Option<Bytes> {
        self.extent_bytes(self.inner.skeleton.payload)
    }

    pub fn control_body(&self) -> Option<Bytes> {
        self.extent_bytes(self.inner.skeleton.control)
    }

    pub fn hop_limit(&self) -> Option<u8> {
        self.inner
            .skeleton
            .hop_limit
            .slice(&self.inner.packet)
            .map(|v| v[0])
    }

    /// Interest lifetime in ticks, decoded from the per-hop varint
    /// (milliseconds on the wire).
    pub fn interest_lifetime(&self) -> Option<Ticks> {
        self.varint_field(self.inner.skeleton.interest_lifetime)
            .map(ms_to_ticks)
    }

    /// Recommended cache time in milliseconds, relative to ingress.
    pub fn recommended_cache_time_ms(&self) -> Option<u64> {
        self.varint_field(self.inner.skeleton.cache_time)
    }

    /// Expiry time in milliseconds, relative to ingress.
    pub fn expiry_time_ms(&self) -> Option<u64> {
        self.varint_field(self.inner.skeleton.expiry_time)
    }

    pub fn has_do_not_cache(&self) -> bool {
        self.inner.skeleton.do_not_cache
    }

    /// SHA-256 over the bytes from the end of headers through the end of
    /// the packet. Computed once, then served from the message.
    pub fn content_object_hash(&self) -> Bytes {
        self.inner
            .object_hash
            .get_or_init(|| {
                let start = self.inner.skeleton.header_end as usize;
                let end = self.inner.skeleton.total_length as usize;
                let digest = Sha256::digest(&self.inner.packet[start..end]);
                Bytes::copy_from_slice(&digest)
            })
            .clone()
    }

    /// A copy of the packet with the hop-limit byte replaced.
    ///
    /// The original buffer is shared state and never mutated; forwarding a
    /// decremented Interest sends this patched copy instead.
    pub fn bytes_with_hop_limit(&self, hop_limit: u8) -> Bytes {
        let extent = self.inner.skeleton.hop_limit;
        if extent.is_empty() {
            return self.inner.packet.clone();
        }
        let mut copy = BytesMut::from(&self.inner.packet[..]);
        copy[extent.offset as usize] = hop_limit;
        copy.freeze()
    }

    fn extent_bytes(&self, extent: crate::tlv::extent::TlvExtent) -> Option<Bytes> {
        if extent.is_empty() {
            return None;
        }
        Some(self.inner.packet.slice(extent.range()))
    }

    fn varint_field(&self, extent: crate::tlv::extent::TlvExtent) -> Option<u64> {
        extent
            .slice(&self.inner.packet)
            .and_then(read_varint)
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("kind", &self.kind())
            .field("ingress", &self.inner.ingress)
            .field("len", &self.inner.packet.len())
            .field("name", &self.inner.name)
            .finish()
    }
}
