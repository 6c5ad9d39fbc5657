//! Source selector.
//!
//! A one-way switch between the live decoder and the pattern generator.
//! Whichever source is deselected keeps being drained — its records are
//! simply dropped — so a mode change can never leave stale records queued
//! for later replay. Mode changes take effect on the next record.

use tokio::sync::{mpsc, watch};
use tracing::info;

use lumibridge_proto::Message;

/// Which upstream feeds the accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceMode {
    /// Records from the UDP decoder pass; generated records are dropped.
    Live,
    /// Records from the pattern generator pass; live records are dropped.
    Faker,
}

pub(crate) async fn run_selector(
    mut live_rx: mpsc::Receiver<Message>,
    mut faker_rx: mpsc::Receiver<Message>,
    mode_rx: watch::Receiver<SourceMode>,
    config_tx: mpsc::Sender<lumibridge_proto::ConfigMessage>,
    update_tx: mpsc::Sender<lumibridge_proto::UpdateMessage>,
) {
    loop {
        let (message, origin) = tokio::select! {
            message = live_rx.recv() => (message, SourceMode::Live),
            message = faker_rx.recv() => (message, SourceMode::Faker),
        };

        let Some(message) = message else {
            break;
        };

        if *mode_rx.borrow() != origin {
            continue;
        }

        let forwarded = match message {
            Message::Config(config) => config_tx.send(config).await.is_ok(),
            Message::Update(update) => update_tx.send(update).await.is_ok(),
        };

        if !forwarded {
            break;
        }
    }

    info!("source selector stopped");
}
