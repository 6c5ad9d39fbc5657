//! eHuB decode task.
//!
//! Drains raw datagrams, runs the stateless decoder, and forwards typed
//! records to the selector's live input. Malformed packets and unknown
//! message types are counted and dropped; a hostile or broken sender can
//! never take the pipeline down.

use tokio::sync::mpsc;
use tracing::{debug, info};

use lumibridge_proto::{Message, ProtocolError, decode_packet};

use crate::listener::RawPacket;

pub(crate) async fn run_decoder(
    mut raw_rx: mpsc::Receiver<RawPacket>,
    live_tx: mpsc::Sender<Message>,
) {
    let mut malformed: u64 = 0;
    let mut unknown_type: u64 = 0;

    while let Some(packet) = raw_rx.recv().await {
        match decode_packet(&packet.data) {
            Ok(message) => {
                if live_tx.send(message).await.is_err() {
                    break;
                }
            },
            Err(ProtocolError::UnknownType(kind)) => {
                unknown_type += 1;
                debug!(from = %packet.from, kind, "unknown eHuB message type");
            },
            Err(err) => {
                malformed += 1;
                debug!(from = %packet.from, %err, "dropping malformed eHuB packet");
            },
        }
    }

    info!(malformed, unknown_type, "decoder stopped");
}
