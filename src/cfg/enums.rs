// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::fmt;

use serde::{Deserialize, Serialize};

/// The four listener flavors a config file can name.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerKind {
    #[serde(rename = "tcp", alias = "Tcp", alias = "TCP")]
    Tcp,
    #[serde(rename = "udp", alias = "Udp", alias = "UDP")]
    Udp,
    #[serde(rename = "local", alias = "Local", alias = "unix")]
    Local,
    #[serde(rename = "ether", alias = "Ether", alias = "ethernet")]
    Ether,
}

impl fmt::Display for ListenerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ListenerKind::Tcp => "tcp",
            ListenerKind::Udp => "udp",
            ListenerKind::Local => "local",
            ListenerKind::Ether => "ether",
        })
    }
}
