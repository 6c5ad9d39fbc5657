//! Pipeline assembly.
//!
//! Builds one incarnation of the full task tree — listener, decoder,
//! selector, faker, accumulator, emitter — wired by bounded channels, and
//! owns its shutdown. The supervisor creates and destroys incarnations;
//! nothing in here survives a restart.
//!
//! Channel capacities absorb roughly one second of burst at 30 Hz across
//! tens of universes; back-pressure beyond that propagates upstream to
//! the UDP receive buffer.

use std::{net::SocketAddr, sync::Arc};

use tokio::{
    net::UdpSocket,
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tracing::info;

use lumibridge_core::{Accumulator, MonitorSnapshot, PatchMap, PhysicalConfig};
use lumibridge_proto::artnet::ARTNET_PORT;

use crate::{
    DEFAULT_EHUB_PORT,
    accumulator::{AccumulatorControl, run_accumulator},
    decoder::run_decoder,
    emitter::Emitter,
    errors::PipelineError,
    faker::{FakerCommand, run_faker},
    listener::run_listener,
    selector::{SourceMode, run_selector},
};

const RAW_PACKETS: usize = 1000;
const SOURCE_RECORDS: usize = 1000;
const DECODED_CONFIG: usize = 50;
const DECODED_UPDATE: usize = 1000;
const OUTBOUND_DMX: usize = 10_000;
const COMMANDS: usize = 16;

/// Capacity of the monitor tap; overflow drops snapshots, never blocks.
pub(crate) const MONITOR_TAP: usize = 100;

/// Socket configuration for one pipeline incarnation.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// UDP port for eHuB ingress. Port 0 binds an ephemeral port (tests).
    pub ehub_port: u16,
    /// UDP port controllers listen on.
    pub artnet_port: u16,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self { ehub_port: DEFAULT_EHUB_PORT, artnet_port: ARTNET_PORT }
    }
}

/// One running pipeline incarnation.
pub struct Pipeline {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
    faker_tx: mpsc::Sender<FakerCommand>,
    control_tx: mpsc::Sender<AccumulatorControl>,
    ehub_addr: SocketAddr,
}

impl Pipeline {
    /// Bind sockets and spawn the task tree.
    ///
    /// # Errors
    ///
    /// [`PipelineError`] when either the ingress or an emitter socket
    /// cannot be bound; no tasks are spawned in that case.
    pub async fn start(
        physical: PhysicalConfig,
        patch: Option<PatchMap>,
        patching_active: bool,
        options: &PipelineOptions,
        monitor_tx: mpsc::Sender<MonitorSnapshot>,
    ) -> Result<Self, PipelineError> {
        let socket = UdpSocket::bind(("0.0.0.0", options.ehub_port))
            .await
            .map_err(|source| PipelineError::BindIngress { port: options.ehub_port, source })?;
        let ehub_addr = socket
            .local_addr()
            .map_err(|source| PipelineError::BindIngress { port: options.ehub_port, source })?;

        let emitter = Emitter::bind(physical.universe_ip(), options.artnet_port).await?;

        let (raw_tx, raw_rx) = mpsc::channel(RAW_PACKETS);
        let (live_tx, live_rx) = mpsc::channel(SOURCE_RECORDS);
        let (faker_records_tx, faker_records_rx) = mpsc::channel(SOURCE_RECORDS);
        let (config_tx, config_rx) = mpsc::channel(DECODED_CONFIG);
        let (update_tx, update_rx) = mpsc::channel(DECODED_UPDATE);
        let (dmx_tx, dmx_rx) = mpsc::channel(OUTBOUND_DMX);
        let (faker_tx, faker_rx) = mpsc::channel(COMMANDS);
        let (control_tx, control_rx) = mpsc::channel(COMMANDS);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (mode_tx, mode_rx) = watch::channel(SourceMode::Live);

        let entity_ids = Arc::new(physical.entity_ids());

        let mut accumulator = Accumulator::new(physical);
        if let Some(patch) = patch {
            accumulator.set_patch(patch);
            accumulator.set_patching_active(patching_active);
        }

        let tasks = vec![
            tokio::spawn(run_listener(socket, raw_tx, shutdown_rx.clone())),
            tokio::spawn(run_decoder(raw_rx, live_tx)),
            tokio::spawn(run_selector(live_rx, faker_records_rx, mode_rx, config_tx, update_tx)),
            tokio::spawn(run_faker(
                faker_rx,
                faker_records_tx,
                mode_tx,
                entity_ids,
                shutdown_rx.clone(),
            )),
            tokio::spawn(run_accumulator(
                accumulator,
                config_rx,
                update_rx,
                control_rx,
                dmx_tx,
                monitor_tx,
            )),
            tokio::spawn(emitter.run(dmx_rx, shutdown_rx)),
        ];

        info!(%ehub_addr, "pipeline started");

        Ok(Self { shutdown: shutdown_tx, tasks, faker_tx, control_tx, ehub_addr })
    }

    /// The ingress socket's actual address (useful with port 0).
    #[must_use]
    pub fn ehub_addr(&self) -> SocketAddr {
        self.ehub_addr
    }

    /// Command handle for the pattern generator.
    #[must_use]
    pub fn faker(&self) -> mpsc::Sender<FakerCommand> {
        self.faker_tx.clone()
    }

    /// Control handle for the accumulator (patch requests).
    #[must_use]
    pub fn control(&self) -> mpsc::Sender<AccumulatorControl> {
        self.control_tx.clone()
    }

    /// Cancel every task and wait for the tree to unwind.
    pub async fn stop(self) {
        let Self { shutdown, tasks, faker_tx, control_tx, ehub_addr } = self;

        // Closing the command channels ends the faker; the watch ends the
        // listener and emitter; everything between exits as its input
        // channel drains and closes.
        drop(faker_tx);
        drop(control_tx);
        let _ = shutdown.send(true);

        for task in tasks {
            let _ = task.await;
        }

        info!(%ehub_addr, "pipeline stopped");
    }
}
