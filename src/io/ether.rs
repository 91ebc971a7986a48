// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Raw-Ethernet listener over an abstract capture device.
//!
//! The platform capture helper (AF_PACKET, BPF, ...) is an external
//! collaborator; this module only needs the [`GenericEther`] interface. The
//! listener reassembles hop-by-hop fragment trains per peer MAC and hands
//! whole packets to the loop; the writer side fragments outbound packets to
//! the device MTU.

use std::collections::HashMap;

use bytes::Bytes;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    core::{
        address::Address,
        connection::EtherOut,
        dispatcher::{CoreEvent, EventSender, FrameSource},
    },
    tlv::fragmenter::{Reassembler, fragment},
};

/// Depth of the outbound packet queue shared by all peers on the device.
const OUTBOUND_QUEUE_DEPTH: usize = 256;

/// One Ethernet frame as the capture device sees it (header split off).
#[derive(Debug)]
pub struct EtherFrame {
    pub src: [u8; 6],
    pub dst: [u8; 6],
    pub ethertype: u16,
    pub payload: Bytes,
}

/// The platform raw-Ethernet capture device, reduced to the interface the
/// forwarder needs. Implementations bridge a real socket (or a test rig)
/// onto the two channels.
pub trait GenericEther: Send + 'static {
    fn mac(&self) -> [u8; 6];
    fn mtu(&self) -> usize;
    fn ifname(&self) -> &str;
    /// Inbound frames, already filtered to the listener's ethertype.
    fn inbound(&mut self) -> &mut mpsc::Receiver<EtherFrame>;
    /// Where outbound frames go.
    fn outbound(&self) -> mpsc::Sender<EtherFrame>;
}

pub struct EtherListenerHandle {
    local: Address,
    writer: mpsc::Sender<EtherOut>,
    task: JoinHandle<()>,
}

impl EtherListenerHandle {
    pub fn local_address(&self) -> &Address {
        &self.local
    }

    /// Outbound sink for registering ether connections by peer MAC.
    pub fn writer(&self) -> mpsc::Sender<EtherOut> {
        self.writer.clone()
    }

    pub fn stop(&self) {
        self.task.abort();
    }
}

/// Start a raw-Ethernet listener on `device` for `ethertype`.
pub fn start(
    mut device: Box<dyn GenericEther>,
    ethertype: u16,
    events: EventSender,
    cancel: CancellationToken,
) -> EtherListenerHandle {
    let mac = device.mac();
    let mtu = device.mtu();
    let ifname = device.ifname().to_string();
    let local = Address::Link {
        mac,
        ifname: Some(ifname),
    };
    info!(local = %local, mtu, "ether listener up");

    let (writer, mut out_rx) = mpsc::channel::<EtherOut>(OUTBOUND_QUEUE_DEPTH);
    let loop_local = local.clone();
    let loop_writer = writer.clone();

    let task = tokio::spawn(async move {
        let raw_out = device.outbound();
        let mut reassembler = Reassembler::new();
        // Per-peer outbound fragment sequence numbers.
        let mut sequences: HashMap<[u8; 6], u16> = HashMap::new();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                frame = device.inbound().recv() => {
                    let Some(frame) = frame else { break };
                    match reassembler.receive(frame.src, frame.payload) {
                        Ok(Some(packet)) => {
                            let event = CoreEvent::Frame {
                                source: FrameSource::Ether {
                                    local: loop_local.clone(),
                                    remote: Address::Link {
                                        mac: frame.src,
                                        ifname: None,
                                    },
                                    peer_mac: frame.src,
                                    writer: loop_writer.clone(),
                                },
                                frame: packet,
                            };
                            if events.send(event).await.is_err() {
                                break;
                            }
                        },
                        Ok(None) => {},
                        Err(e) => {
                            debug!(error = %e, "ether reassembly failed");
                        },
                    }
                },
                out = out_rx.recv() => {
                    let Some(EtherOut { dst, packet }) = out else { break };
                    let seq = sequences.entry(dst).or_insert(0);
                    for frag in fragment(&packet, mtu, seq) {
                        let frame = EtherFrame {
                            src: mac,
                            dst,
                            ethertype,
                            payload: frag,
                        };
                        if raw_out.send(frame).await.is_err() {
                            warn!("ether device write side gone");
                            return;
                        }
                    }
                },
            }
        }
    });

    EtherListenerHandle {
        local,
        writer,
        task,
    }
}
