// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    fmt,
    net::{SocketAddr, SocketAddrV4, SocketAddrV6},
    path::PathBuf,
};

/// A link endpoint address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Address {
    Inet(SocketAddrV4),
    Inet6(SocketAddrV6),
    /// A MAC address plus the interface it was seen on.
    Link {
        mac: [u8; 6],
        ifname: Option<String>,
    },
    /// A PF_LOCAL socket path.
    Local(PathBuf),
    /// An interface index, used for listeners bound to a device.
    Iface(u32),
}

impl Address {
    pub fn from_socket_addr(addr: SocketAddr) -> Self {
        match addr {
            SocketAddr::V4(v4) => Address::Inet(v4),
            SocketAddr::V6(v6) => Address::Inet6(v6),
        }
    }

    pub fn socket_addr(&self) -> Option<SocketAddr> {
        match self {
            Address::Inet(v4) => Some(SocketAddr::V4(*v4)),
            Address::Inet6(v6) => Some(SocketAddr::V6(*v6)),
            _ => None,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Inet(a) => write!(f, "inet://{a}"),
            Address::Inet6(a) => write!(f, "inet6://{a}"),
            Address::Link { mac, ifname } => {
                let mac = mac
                    .iter()
                    .map(|b| format!("{b:02x}"))
                    .collect::<Vec<_>>()
                    .join(":");
                match ifname {
                    Some(name) => write!(f, "link://{mac}%{name}"),
                    None => write!(f, "link://{mac}"),
                }
            },
            Address::Local(path) => write!(f, "local://{}", path.display()),
            Address::Iface(index) => write!(f, "iface://{index}"),
        }
    }
}

/// The `(local, remote)` pair identifying one link.
///
/// The derived hash is order-sensitive (local folded in before remote), so
/// the two directions of a link hash differently.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AddressPair {
    pub local: Address,
    pub remote: Address,
}

impl AddressPair {
    pub fn new(local: Address, remote: Address) -> Self {
        Self { local, remote }
    }
}

impl fmt::Display for AddressPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{ local={}, remote={} }}", self.local, self.remote)
    }
}
