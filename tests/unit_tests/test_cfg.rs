// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use anyhow::Result;
use metis_forwarder::cfg::{
    cli::DaemonArgs,
    config::Config,
    enums::ListenerKind,
};

#[test]
fn full_config_parses_and_validates() -> Result<()> {
    let yaml = r#"
forwarder:
  ContentStoreCapacity: 128
  DefaultCacheTimeMs: 10000
  InterestLifetimeMs: 2000
  PitCapacity: 4096
  ContentStoreSweepMs: 500
  EventQueueDepth: 64

listeners:
  - Type: udp
    Bind: "127.0.0.1:9695"
  - Type: tcp
    Bind: "127.0.0.1:9695"
  - Type: local
    Path: "/tmp/metis.sock"
  - Type: ether
    Interface: "eth0"
    EtherType: 0x0801
"#;
    let mut cfg: Config = serde_yaml::from_str(yaml)?;
    cfg.validate_and_normalize()?;

    assert_eq!(cfg.forwarder.content_store_capacity, 128);
    assert_eq!(cfg.forwarder.default_cache_ttl, Duration::from_secs(10));
    assert_eq!(cfg.forwarder.pit_capacity, Some(4096));
    assert_eq!(cfg.listeners.len(), 4);
    assert_eq!(cfg.listeners[0].kind, ListenerKind::Udp);
    assert_eq!(cfg.listeners[3].ethertype, 0x0801);

    let options = cfg.forwarder_options();
    assert_eq!(options.content_store_capacity, 128);
    assert_eq!(options.default_interest_lifetime, Duration::from_secs(2));
    Ok(())
}

#[test]
fn defaults_fill_in_missing_fields() -> Result<()> {
    let mut cfg: Config = serde_yaml::from_str("forwarder: {}\n")?;
    cfg.validate_and_normalize()?;
    assert_eq!(cfg.forwarder.content_store_capacity, 65_536);
    assert_eq!(cfg.forwarder.default_interest_lifetime, Duration::from_secs(4));
    assert!(cfg.forwarder.pit_capacity.is_none());
    assert!(cfg.listeners.is_empty());
    Ok(())
}

#[test]
fn listeners_missing_their_address_are_rejected() {
    let yaml = r#"
forwarder: {}
listeners:
  - Type: tcp
"#;
    let mut cfg: Config = serde_yaml::from_str(yaml).expect("parses");
    assert!(cfg.validate_and_normalize().is_err());

    let yaml = r#"
forwarder: {}
listeners:
  - Type: ether
    Interface: "eth0"
    EtherType: 0x0100
"#;
    let mut cfg: Config = serde_yaml::from_str(yaml).expect("parses");
    assert!(cfg.validate_and_normalize().is_err());
}

#[test]
fn daemon_args_default_and_override() -> Result<()> {
    let args = DaemonArgs::parse(["metisd".to_string()])?;
    assert_eq!(args.config, "config/metisd.yaml");
    assert_eq!(args.logger, "config/logger.yaml");

    let args = DaemonArgs::parse(
        ["metisd", "/etc/metis.yaml", "/etc/logger.yaml"]
            .map(String::from),
    )?;
    assert_eq!(args.config, "/etc/metis.yaml");
    assert_eq!(args.logger, "/etc/logger.yaml");

    assert!(DaemonArgs::parse(["a", "b", "c", "d"].map(String::from)).is_err());
    Ok(())
}
