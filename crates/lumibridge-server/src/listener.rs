//! UDP ingress listener.
//!
//! Reads eHuB datagrams into a reusable buffer and hands exact-size
//! copies to the decoder. Read errors are logged and the loop continues;
//! only the supervisor's shutdown signal (or the raw channel closing)
//! stops it. The socket is bound by the pipeline before this task spawns,
//! so bind failures surface there.

use std::net::SocketAddr;

use bytes::Bytes;
use tokio::{
    net::UdpSocket,
    sync::{mpsc, watch},
};
use tracing::{debug, info, warn};

/// Receive buffer size. eHuB frames for large installations compress to a
/// few KiB; 20 KiB leaves generous headroom.
pub(crate) const RECV_BUFFER_LEN: usize = 20 * 1024;

/// One raw datagram as read off the socket.
#[derive(Debug, Clone)]
pub(crate) struct RawPacket {
    /// Datagram bytes, sized exactly to the read.
    pub data: Bytes,
    /// Sender address, for diagnostics.
    pub from: SocketAddr,
}

pub(crate) async fn run_listener(
    socket: UdpSocket,
    raw_tx: mpsc::Sender<RawPacket>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut buf = vec![0u8; RECV_BUFFER_LEN];
    let mut received: u64 = 0;

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,

            result = socket.recv_from(&mut buf) => match result {
                Ok((len, from)) => {
                    received += 1;
                    let packet = RawPacket { data: Bytes::copy_from_slice(&buf[..len]), from };
                    if raw_tx.send(packet).await.is_err() {
                        debug!("raw channel closed, stopping listener");
                        break;
                    }
                },
                Err(err) => {
                    warn!(%err, "eHuB socket read error");
                },
            },
        }
    }

    info!(received, "ingress listener stopped");
}
