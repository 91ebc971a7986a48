// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! PF_LOCAL stream listener; framing is identical to TCP.

use std::{
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};

use tokio::{
    net::{UnixListener, UnixStream},
    sync::oneshot,
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    core::{
        address::{Address, AddressPair},
        connection::{ConnKind, ConnectionId},
        dispatcher::EventSender,
        forwarder::ConfigError,
    },
    io::stream::start_stream,
};

/// Accepted PF_LOCAL peers are anonymous; give each a synthetic remote
/// address so address pairs stay unique.
static ANON_COUNTER: AtomicU64 = AtomicU64::new(0);

pub struct LocalListenerHandle {
    path: PathBuf,
    task: JoinHandle<()>,
}

impl LocalListenerHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn stop(&self) {
        self.task.abort();
    }
}

pub fn bind(
    path: &Path,
    events: EventSender,
    cancel: CancellationToken,
) -> Result<LocalListenerHandle, ConfigError> {
    // A stale socket file from a previous run would make bind fail.
    let _ = std::fs::remove_file(path);
    let listener = UnixListener::bind(path).map_err(ConfigError::BindFailed)?;
    let path = path.to_path_buf();
    info!(path = %path.display(), "local listener up");

    let local = Address::Local(path.clone());
    let task = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, _)) => {
                            debug!("local connection accepted");
                            spawn_stream(stream, local.clone(), &events, &cancel, None);
                        },
                        Err(e) => {
                            warn!(error = %e, "local accept failed");
                        },
                    }
                },
            }
        }
    });

    Ok(LocalListenerHandle { path, task })
}

/// Open an outgoing PF_LOCAL connection to a forwarder socket.
pub async fn connect(
    path: &Path,
    events: EventSender,
    cancel: CancellationToken,
) -> Result<ConnectionId, ConfigError> {
    let stream = UnixStream::connect(path)
        .await
        .map_err(ConfigError::ConnectFailed)?;
    let (announce, id_rx) = oneshot::channel();
    spawn_stream(
        stream,
        Address::Local(path.to_path_buf()),
        &events,
        &cancel,
        Some(announce),
    );
    id_rx
        .await
        .map_err(|_| ConfigError::ConnectFailed(std::io::Error::other("dispatcher gone")))
}

fn spawn_stream(
    stream: UnixStream,
    local: Address,
    events: &EventSender,
    cancel: &CancellationToken,
    announce: Option<oneshot::Sender<ConnectionId>>,
) {
    let n = ANON_COUNTER.fetch_add(1, Ordering::Relaxed);
    let remote = Address::Local(PathBuf::from(format!("@peer-{n}")));
    let (reader, writer) = stream.into_split();
    start_stream(
        reader,
        writer,
        AddressPair::new(local, remote),
        ConnKind::Local,
        events.clone(),
        cancel.clone(),
        announce,
    );
}
