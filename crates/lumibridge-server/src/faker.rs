//! Pattern generator task.
//!
//! Synthesizes the same Config + Update record shapes the live decoder
//! produces, so everything downstream is agnostic of the source. One-shot
//! patterns (gradient, off) emit a single update; continuous patterns
//! (solid, wave) run in a child task at 25 Hz until replaced. Starting
//! any pattern aborts the one in flight — at most one child runs.

use std::sync::Arc;

use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tracing::{debug, info};

use lumibridge_core::pattern;
use lumibridge_proto::Message;

use crate::selector::SourceMode;

/// Commands accepted by the pattern generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakerCommand {
    /// Hold every entity at one color. Continuous.
    Solid {
        /// Red.
        r: u8,
        /// Green.
        g: u8,
        /// Blue.
        b: u8,
        /// White.
        w: u8,
    },
    /// One linear ramp across the installation. One-shot.
    Gradient {
        /// Color at the first entity.
        start: (u8, u8, u8),
        /// Color at the last entity.
        end: (u8, u8, u8),
    },
    /// Travelling amber wave. Continuous.
    Wave,
    /// Black out every entity. One-shot.
    Off,
    /// Stop generating and hand the pipeline back to the live decoder.
    SwitchToLive,
}

pub(crate) async fn run_faker(
    mut commands: mpsc::Receiver<FakerCommand>,
    records_tx: mpsc::Sender<Message>,
    mode_tx: watch::Sender<SourceMode>,
    entity_ids: Arc<Vec<u16>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut running: Option<JoinHandle<()>> = None;

    loop {
        let command = tokio::select! {
            _ = shutdown.changed() => break,
            command = commands.recv() => match command {
                Some(command) => command,
                None => break,
            },
        };

        if let Some(task) = running.take() {
            task.abort();
        }

        debug!(?command, "pattern command");

        match command {
            FakerCommand::Solid { r, g, b, w } => {
                let _ = mode_tx.send(SourceMode::Faker);
                let ids = Arc::clone(&entity_ids);
                let tx = records_tx.clone();
                running = Some(tokio::spawn(solid_loop(ids, tx, r, g, b, w)));
            },

            FakerCommand::Wave => {
                let _ = mode_tx.send(SourceMode::Faker);
                let ids = Arc::clone(&entity_ids);
                let tx = records_tx.clone();
                running = Some(tokio::spawn(wave_loop(ids, tx)));
            },

            FakerCommand::Gradient { start, end } => {
                let _ = mode_tx.send(SourceMode::Faker);
                let frame = pattern::gradient_frame(&entity_ids, start, end);
                if emit_config(&entity_ids, &records_tx).await.is_err() {
                    break;
                }
                if records_tx.send(Message::Update(frame)).await.is_err() {
                    break;
                }
            },

            FakerCommand::Off => {
                let _ = mode_tx.send(SourceMode::Faker);
                let frame = pattern::solid_frame(&entity_ids, 0, 0, 0, 0);
                if emit_config(&entity_ids, &records_tx).await.is_err() {
                    break;
                }
                if records_tx.send(Message::Update(frame)).await.is_err() {
                    break;
                }
            },

            FakerCommand::SwitchToLive => {
                let _ = mode_tx.send(SourceMode::Live);
            },
        }
    }

    if let Some(task) = running.take() {
        task.abort();
    }

    info!("pattern generator stopped");
}

/// Emit the synthetic Config declaring every routed entity live. Every
/// pattern starts with this so the accumulator can compile a table even
/// when no live Config was ever seen.
async fn emit_config(
    ids: &[u16],
    tx: &mpsc::Sender<Message>,
) -> Result<(), mpsc::error::SendError<Message>> {
    tx.send(Message::Config(pattern::synthetic_config(ids))).await
}

async fn solid_loop(ids: Arc<Vec<u16>>, tx: mpsc::Sender<Message>, r: u8, g: u8, b: u8, w: u8) {
    if emit_config(&ids, &tx).await.is_err() {
        return;
    }

    let mut ticker = tokio::time::interval(pattern::PATTERN_TICK);
    loop {
        ticker.tick().await;
        let frame = pattern::solid_frame(&ids, r, g, b, w);
        if tx.send(Message::Update(frame)).await.is_err() {
            return;
        }
    }
}

async fn wave_loop(ids: Arc<Vec<u16>>, tx: mpsc::Sender<Message>) {
    if emit_config(&ids, &tx).await.is_err() {
        return;
    }

    let mut ticker = tokio::time::interval(pattern::PATTERN_TICK);
    let mut position = 0.0f32;

    loop {
        ticker.tick().await;
        position = pattern::advance_wave(position);
        let frame = pattern::wave_frame(&ids, position);
        if tx.send(Message::Update(frame)).await.is_err() {
            return;
        }
    }
}
