// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fs, net::SocketAddr, path::Path, path::PathBuf, time::Duration};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::{cfg::enums::ListenerKind, core::forwarder::ForwarderOptions};

/// The CCNx ethertype used when a raw-Ethernet listener does not name one.
pub const DEFAULT_ETHERTYPE: u16 = 0x0801;

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Config {
    /// Data-plane sizing and timing knobs.
    pub forwarder: ForwarderConfig,
    /// Listeners brought up at start; more can be added at runtime.
    #[serde(default)]
    pub listeners: Vec<ListenerConfig>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ForwarderConfig {
    #[serde(rename = "ContentStoreCapacity", default = "default_cs_capacity")]
    /// Content store entry cap; 0 disables caching.
    pub content_store_capacity: usize,

    #[serde(
        rename = "DefaultCacheTimeMs",
        default = "default_cache_ttl",
        with = "serde_millis"
    )]
    /// Cache lifetime for objects without a recommended cache time.
    pub default_cache_ttl: Duration,

    #[serde(
        rename = "InterestLifetimeMs",
        default = "default_interest_lifetime",
        with = "serde_millis"
    )]
    /// Lifetime for interests that do not carry one.
    pub default_interest_lifetime: Duration,

    #[serde(rename = "PitCapacity", default)]
    /// Optional cap on pending interests; absent means unbounded.
    pub pit_capacity: Option<usize>,

    #[serde(
        rename = "ContentStoreSweepMs",
        default = "default_cs_sweep",
        with = "serde_millis"
    )]
    /// Period of the content-store expiry sweep timer.
    pub content_store_sweep: Duration,

    #[serde(rename = "EventQueueDepth", default = "default_event_depth")]
    /// Depth of the dispatcher's event channel.
    pub event_queue_depth: usize,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ListenerConfig {
    #[serde(rename = "Type")]
    pub kind: ListenerKind,

    #[serde(rename = "Bind", default)]
    /// Socket address for TCP/UDP listeners.
    pub bind: Option<SocketAddr>,

    #[serde(rename = "Path", default)]
    /// Socket path for PF_LOCAL listeners.
    pub path: Option<PathBuf>,

    #[serde(rename = "Interface", default)]
    /// Device name for raw-Ethernet listeners.
    pub interface: Option<String>,

    #[serde(rename = "EtherType", default = "default_ethertype")]
    pub ethertype: u16,
}

fn default_cs_capacity() -> usize {
    65_536
}

fn default_cache_ttl() -> Duration {
    Duration::from_secs(3_600)
}

fn default_interest_lifetime() -> Duration {
    Duration::from_secs(4)
}

fn default_cs_sweep() -> Duration {
    Duration::from_secs(1)
}

fn default_event_depth() -> usize {
    1_024
}

fn default_ethertype() -> u16 {
    DEFAULT_ETHERTYPE
}

impl Config {
    /// Loads the configuration from YAML, validates it, and returns the
    /// ready-to-use value.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        let mut cfg: Config =
            serde_yaml::from_str(&s).context("failed to parse config YAML")?;
        cfg.validate_and_normalize()?;
        Ok(cfg)
    }

    /// Validates invariants and normalizes derived fields.
    pub fn validate_and_normalize(&mut self) -> Result<()> {
        ensure!(
            !self.forwarder.content_store_sweep.is_zero(),
            "ContentStoreSweepMs must be positive"
        );
        ensure!(
            self.forwarder.event_queue_depth >= 1,
            "EventQueueDepth must be >= 1"
        );
        if let Some(cap) = self.forwarder.pit_capacity {
            ensure!(cap >= 1, "PitCapacity must be >= 1 when set");
        }

        for listener in &self.listeners {
            match listener.kind {
                ListenerKind::Tcp | ListenerKind::Udp => {
                    ensure!(
                        listener.bind.is_some(),
                        "{} listener requires Bind",
                        listener.kind
                    );
                },
                ListenerKind::Local => {
                    ensure!(listener.path.is_some(), "local listener requires Path");
                },
                ListenerKind::Ether => {
                    ensure!(
                        listener.interface.is_some(),
                        "ether listener requires Interface"
                    );
                    ensure!(listener.ethertype >= 0x0600, "EtherType below 0x0600");
                },
            }
        }
        Ok(())
    }

    pub fn forwarder_options(&self) -> ForwarderOptions {
        ForwarderOptions {
            content_store_capacity: self.forwarder.content_store_capacity,
            content_store_default_ttl: self.forwarder.default_cache_ttl,
            default_interest_lifetime: self.forwarder.default_interest_lifetime,
            pit_capacity: self.forwarder.pit_capacity,
        }
    }
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            content_store_capacity: default_cs_capacity(),
            default_cache_ttl: default_cache_ttl(),
            default_interest_lifetime: default_interest_lifetime(),
            pit_capacity: None,
            content_store_sweep: default_cs_sweep(),
            event_queue_depth: default_event_depth(),
        }
    }
}

/// Serde helpers for representing `Duration` as milliseconds.
mod serde_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}
