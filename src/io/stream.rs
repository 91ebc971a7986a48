// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Shared machinery for stream links (TCP and PF_LOCAL).
//!
//! Framing: read the 8-byte fixed header, derive the total packet length
//! from it, read the remainder. The writer side is a task draining a
//! bounded channel; that channel is the connection's outbound buffer.

use anyhow::{Context, Result, bail};
use bytes::{Bytes, BytesMut};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    sync::{mpsc, oneshot},
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    core::{
        address::AddressPair,
        connection::{ConnKind, ConnectionId},
        dispatcher::{CoreEvent, EventSender, FrameSource},
    },
    tlv::fixed_header::{FIXED_HEADER_LEN, total_packet_length},
};

/// Depth of the per-connection outbound frame queue.
pub const OUTBOUND_QUEUE_DEPTH: usize = 256;

/// Drive one stream link: register it with the loop, pump frames in both
/// directions, and report closure. `announce` (if any) receives the
/// assigned connection id.
pub fn start_stream<R, W>(
    reader: R,
    writer: W,
    pair: AddressPair,
    kind: ConnKind,
    events: EventSender,
    cancel: CancellationToken,
    announce: Option<oneshot::Sender<ConnectionId>>,
) where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) =
            run_stream(reader, writer, pair, kind, events, cancel, announce).await
        {
            debug!(error = %e, "stream connection ended");
        }
    });
}

async fn run_stream<R, W>(
    reader: R,
    mut writer: W,
    pair: AddressPair,
    kind: ConnKind,
    events: EventSender,
    cancel: CancellationToken,
    announce: Option<oneshot::Sender<ConnectionId>>,
) -> Result<()>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<Bytes>(OUTBOUND_QUEUE_DEPTH);
    let (id_tx, id_rx) = oneshot::channel();
    events
        .send(CoreEvent::StreamUp {
            pair,
            kind,
            writer: tx,
            id_reply: id_tx,
        })
        .await?;
    let id = id_rx.await.context("dispatcher dropped the stream")?;
    if let Some(announce) = announce {
        let _ = announce.send(id);
    }

    let write_cancel = cancel.clone();
    let writer_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = write_cancel.cancelled() => break,
                frame = rx.recv() => {
                    match frame {
                        None => break,
                        Some(frame) => {
                            if writer.write_all(&frame).await.is_err() {
                                break;
                            }
                        },
                    }
                },
            }
        }
    });

    let result = read_loop(reader, id, &events, &cancel).await;
    let _ = events
        .send(CoreEvent::StreamClosed { connection_id: id })
        .await;
    writer_task.abort();
    result
}

async fn read_loop<R>(
    mut reader: R,
    id: ConnectionId,
    events: &EventSender,
    cancel: &CancellationToken,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; FIXED_HEADER_LEN];
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            read = reader.read_exact(&mut header) => {
                match read {
                    Ok(_) => {},
                    Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                        return Ok(());
                    },
                    Err(e) => return Err(e.into()),
                }
            },
        }

        let total = total_packet_length(&header);
        if total < FIXED_HEADER_LEN {
            // A stream that lies about framing is unrecoverable.
            bail!("unparseable fixed header, closing stream");
        }

        let mut buf = BytesMut::with_capacity(total);
        buf.extend_from_slice(&header);
        buf.resize(total, 0);
        reader.read_exact(&mut buf[FIXED_HEADER_LEN..]).await?;

        events
            .send(CoreEvent::Frame {
                source: FrameSource::Connection(id),
                frame: buf.freeze(),
            })
            .await?;
    }
}
