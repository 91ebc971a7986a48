// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::{Context, Result, anyhow};
use metis_forwarder::{
    cfg::{
        cli::{DaemonArgs, resolve_config_path},
        config::Config,
        enums::ListenerKind,
        logger::init_logger,
    },
    core::{
        dispatcher::{Dispatcher, event_channel},
        forwarder::Forwarder,
        ticks::Clock,
    },
    io,
};
use tokio::task::LocalSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = DaemonArgs::parse(std::env::args())?;
    let _logger_guard = init_logger(&args.logger)?;

    let cfg = resolve_config_path(&args.config)
        .and_then(Config::load_from_file)
        .context("failed to resolve or load config")?;

    // The whole data plane is single-threaded; every table lives on this
    // task and auxiliary I/O tasks reach it through the event channel.
    let local = LocalSet::new();
    local.run_until(run(cfg)).await
}

async fn run(cfg: Config) -> Result<()> {
    let cancel = CancellationToken::new();
    let (events, event_rx) = event_channel(cfg.forwarder.event_queue_depth);
    let mut forwarder = Forwarder::new(&cfg.forwarder_options(), Clock::new());

    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down");
            signal_cancel.cancel();
        }
    });

    let mut tcp_listeners = Vec::new();
    let mut udp_listeners = Vec::new();
    let mut local_listeners = Vec::new();
    for listener in &cfg.listeners {
        match listener.kind {
            ListenerKind::Tcp => {
                let bind = listener
                    .bind
                    .ok_or_else(|| anyhow!("tcp listener without Bind"))?;
                tcp_listeners
                    .push(io::tcp::bind(bind, events.clone(), cancel.clone()).await?);
            },
            ListenerKind::Udp => {
                let bind = listener
                    .bind
                    .ok_or_else(|| anyhow!("udp listener without Bind"))?;
                udp_listeners
                    .push(io::udp::bind(bind, events.clone(), cancel.clone()).await?);
            },
            ListenerKind::Local => {
                let path = listener
                    .path
                    .as_deref()
                    .ok_or_else(|| anyhow!("local listener without Path"))?;
                local_listeners.push(io::local::bind(
                    path,
                    events.clone(),
                    cancel.clone(),
                )?);
            },
            ListenerKind::Ether => {
                // The raw capture device comes from a platform helper that
                // is not part of this crate.
                warn!(
                    interface = listener.interface.as_deref().unwrap_or(""),
                    "ether listener configured but no capture helper is linked"
                );
            },
        }
    }

    info!(
        tcp = tcp_listeners.len(),
        udp = udp_listeners.len(),
        local = local_listeners.len(),
        "forwarder up"
    );

    let dispatcher = Dispatcher::new(
        event_rx,
        cancel.clone(),
        cfg.forwarder.content_store_sweep,
    );
    let result = dispatcher.run(&mut forwarder).await;

    for l in &tcp_listeners {
        l.stop();
    }
    for l in &udp_listeners {
        l.stop();
    }
    for l in &local_listeners {
        l.stop();
    }
    result
}
