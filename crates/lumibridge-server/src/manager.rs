//! Config manager: the pipeline supervisor.
//!
//! Owns the only mutable copy of the current routing configuration and
//! the running [`Pipeline`], and serializes every configuration mutation:
//! requests are processed strictly in the order they arrive, each
//! answering on its own reply slot.
//!
//! Structural changes (sheet reload, controller IP rewrite) stop the
//! pipeline, swap the configuration, and start a fresh incarnation —
//! sockets must be rebound, so there is no cheaper path. Patch changes
//! forward to the running accumulator without a restart. A failed sheet
//! parse keeps the previous configuration (and pipeline) untouched; a
//! failed restart leaves the system idle awaiting another load.

use std::{net::IpAddr, path::PathBuf};

use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use lumibridge_core::{MonitorSnapshot, PatchMap, PhysicalConfig, sheet};

use crate::{
    accumulator::AccumulatorControl,
    errors::ManagerError,
    monitor::MonitorTap,
    pipeline::{MONITOR_TAP, Pipeline, PipelineOptions},
};

/// Reply slot carried by every control request.
pub type ControlReply = oneshot::Sender<Result<(), ManagerError>>;

/// One controller-address rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpRewrite {
    /// Replace every occurrence of `old` across the configuration.
    Global {
        /// Address to replace.
        old: IpAddr,
        /// Replacement address.
        new: IpAddr,
    },
    /// Repoint a single universe, leaving other universes on the old
    /// address untouched.
    Universe {
        /// Universe to repoint.
        universe: u16,
        /// Replacement address.
        new: IpAddr,
    },
}

/// Requests accepted by the config manager.
#[derive(Debug)]
pub enum ControlRequest {
    /// Load a routing sheet and (re)start the pipeline on it. Optional IP
    /// rewrites apply to the freshly loaded sheet before start.
    LoadFile {
        /// Routing sheet path.
        path: PathBuf,
        /// Rewrites applied after loading, before the pipeline starts.
        ip_changes: Vec<IpRewrite>,
        /// Outcome slot.
        reply: ControlReply,
    },

    /// Rewrite controller addresses in the current configuration and
    /// restart the pipeline.
    ApplyIpChanges {
        /// Rewrites, applied in order.
        changes: Vec<IpRewrite>,
        /// Outcome slot.
        reply: ControlReply,
    },

    /// Serialize the current configuration to a routing sheet. No
    /// restart.
    Export {
        /// Destination path.
        path: PathBuf,
        /// Outcome slot.
        reply: ControlReply,
    },

    /// Load a patch sheet and activate it on the running accumulator. No
    /// restart.
    LoadPatch {
        /// Patch sheet path.
        path: PathBuf,
        /// Outcome slot.
        reply: ControlReply,
    },

    /// Drop the loaded patch. No restart.
    ClearPatch {
        /// Outcome slot.
        reply: ControlReply,
    },

    /// Toggle patching without touching the loaded map. No restart.
    SetPatchingActive {
        /// Desired state.
        active: bool,
        /// Outcome slot.
        reply: ControlReply,
    },

    /// Stop the pipeline and end the manager loop.
    Shutdown {
        /// Outcome slot.
        reply: ControlReply,
    },
}

/// Outcome receiver paired with each constructor below.
pub type ControlOutcome = oneshot::Receiver<Result<(), ManagerError>>;

impl ControlRequest {
    /// Build a [`ControlRequest::LoadFile`] and its outcome receiver.
    #[must_use]
    pub fn load_file(path: PathBuf) -> (Self, ControlOutcome) {
        let (reply, outcome) = oneshot::channel();
        (Self::LoadFile { path, ip_changes: Vec::new(), reply }, outcome)
    }

    /// [`ControlRequest::LoadFile`] combined with IP rewrites.
    #[must_use]
    pub fn load_file_with_changes(path: PathBuf, ip_changes: Vec<IpRewrite>) -> (Self, ControlOutcome) {
        let (reply, outcome) = oneshot::channel();
        (Self::LoadFile { path, ip_changes, reply }, outcome)
    }

    /// Build a [`ControlRequest::ApplyIpChanges`] and its outcome receiver.
    #[must_use]
    pub fn apply_ip_changes(changes: Vec<IpRewrite>) -> (Self, ControlOutcome) {
        let (reply, outcome) = oneshot::channel();
        (Self::ApplyIpChanges { changes, reply }, outcome)
    }

    /// Build a [`ControlRequest::Export`] and its outcome receiver.
    #[must_use]
    pub fn export(path: PathBuf) -> (Self, ControlOutcome) {
        let (reply, outcome) = oneshot::channel();
        (Self::Export { path, reply }, outcome)
    }

    /// Build a [`ControlRequest::LoadPatch`] and its outcome receiver.
    #[must_use]
    pub fn load_patch(path: PathBuf) -> (Self, ControlOutcome) {
        let (reply, outcome) = oneshot::channel();
        (Self::LoadPatch { path, reply }, outcome)
    }

    /// Build a [`ControlRequest::ClearPatch`] and its outcome receiver.
    #[must_use]
    pub fn clear_patch() -> (Self, ControlOutcome) {
        let (reply, outcome) = oneshot::channel();
        (Self::ClearPatch { reply }, outcome)
    }

    /// Build a [`ControlRequest::SetPatchingActive`] and its outcome
    /// receiver.
    #[must_use]
    pub fn set_patching_active(active: bool) -> (Self, ControlOutcome) {
        let (reply, outcome) = oneshot::channel();
        (Self::SetPatchingActive { active, reply }, outcome)
    }

    /// Build a [`ControlRequest::Shutdown`] and its outcome receiver.
    #[must_use]
    pub fn shutdown() -> (Self, ControlOutcome) {
        let (reply, outcome) = oneshot::channel();
        (Self::Shutdown { reply }, outcome)
    }
}

/// The supervisor. See the module docs for the state machine.
pub struct ConfigManager {
    options: PipelineOptions,
    monitor_tx: mpsc::Sender<MonitorSnapshot>,
    physical: Option<PhysicalConfig>,
    patch: Option<PatchMap>,
    patching_active: bool,
    pipeline: Option<Pipeline>,
}

impl ConfigManager {
    /// Create an idle manager and the [`MonitorTap`] observers read
    /// from. The tap survives pipeline restarts.
    #[must_use]
    pub fn new(options: PipelineOptions) -> (Self, MonitorTap) {
        let (monitor_tx, monitor_rx) = mpsc::channel(MONITOR_TAP);
        let manager = Self {
            options,
            monitor_tx,
            physical: None,
            patch: None,
            patching_active: false,
            pipeline: None,
        };
        (manager, MonitorTap::new(monitor_rx))
    }

    /// Process control requests until [`ControlRequest::Shutdown`] (or
    /// the request channel closes).
    pub async fn run(mut self, mut requests: mpsc::Receiver<ControlRequest>) {
        while let Some(request) = requests.recv().await {
            match request {
                ControlRequest::LoadFile { path, ip_changes, reply } => {
                    let outcome = self.load_file(&path, &ip_changes).await;
                    let _ = reply.send(outcome);
                },

                ControlRequest::ApplyIpChanges { changes, reply } => {
                    let outcome = self.apply_ip_changes(&changes).await;
                    let _ = reply.send(outcome);
                },

                ControlRequest::Export { path, reply } => {
                    let outcome = self.export(&path);
                    let _ = reply.send(outcome);
                },

                ControlRequest::LoadPatch { path, reply } => {
                    let outcome = self.load_patch(&path).await;
                    let _ = reply.send(outcome);
                },

                ControlRequest::ClearPatch { reply } => {
                    self.patch = None;
                    self.patching_active = false;
                    self.forward(AccumulatorControl::ClearPatch).await;
                    let _ = reply.send(Ok(()));
                },

                ControlRequest::SetPatchingActive { active, reply } => {
                    self.patching_active = active;
                    self.forward(AccumulatorControl::SetPatchingActive(active)).await;
                    let _ = reply.send(Ok(()));
                },

                ControlRequest::Shutdown { reply } => {
                    self.stop_pipeline().await;
                    let _ = reply.send(Ok(()));
                    info!("config manager shut down");
                    return;
                },
            }
        }

        // Request channel closed without an explicit shutdown.
        self.stop_pipeline().await;
        warn!("control channel closed, config manager stopped");
    }

    async fn load_file(&mut self, path: &std::path::Path, ip_changes: &[IpRewrite]) -> Result<(), ManagerError> {
        // Parse before touching anything: a bad sheet must leave the
        // previous configuration (and the running pipeline) active.
        let mut config = sheet::load_routing(path)?;
        apply_rewrites(&mut config, ip_changes);

        self.stop_pipeline().await;
        self.physical = Some(config);
        self.start_pipeline().await
    }

    async fn apply_ip_changes(&mut self, changes: &[IpRewrite]) -> Result<(), ManagerError> {
        let Some(config) = self.physical.as_mut() else {
            return Err(ManagerError::NotLoaded);
        };

        apply_rewrites(config, changes);

        self.stop_pipeline().await;
        self.start_pipeline().await
    }

    fn export(&self, path: &std::path::Path) -> Result<(), ManagerError> {
        let Some(config) = self.physical.as_ref() else {
            return Err(ManagerError::NotLoaded);
        };
        sheet::save_routing(config, path)?;
        Ok(())
    }

    async fn load_patch(&mut self, path: &std::path::Path) -> Result<(), ManagerError> {
        let patch = sheet::load_patch(path)?;
        self.patch = Some(patch.clone());
        self.patching_active = true;
        self.forward(AccumulatorControl::SetPatch(patch)).await;
        Ok(())
    }

    async fn start_pipeline(&mut self) -> Result<(), ManagerError> {
        let Some(config) = self.physical.as_ref() else {
            return Err(ManagerError::NotLoaded);
        };

        match Pipeline::start(
            config.clone(),
            self.patch.clone(),
            self.patching_active,
            &self.options,
            self.monitor_tx.clone(),
        )
        .await
        {
            Ok(pipeline) => {
                self.pipeline = Some(pipeline);
                Ok(())
            },
            Err(err) => {
                error!(%err, "pipeline failed to start, staying idle");
                Err(err.into())
            },
        }
    }

    async fn stop_pipeline(&mut self) {
        if let Some(pipeline) = self.pipeline.take() {
            pipeline.stop().await;
        }
    }

    async fn forward(&self, control: AccumulatorControl) {
        if let Some(pipeline) = self.pipeline.as_ref() {
            if pipeline.control().send(control).await.is_err() {
                warn!("accumulator control channel closed");
            }
        }
    }
}

fn apply_rewrites(config: &mut PhysicalConfig, changes: &[IpRewrite]) {
    for change in changes {
        match *change {
            IpRewrite::Global { old, new } => {
                let touched = config.rewrite_ip(old, new);
                info!(%old, %new, touched, "global controller rewrite");
            },
            IpRewrite::Universe { universe, new } => {
                let touched = config.rewrite_universe_ip(universe, new);
                info!(universe, %new, touched, "universe controller rewrite");
            },
        }
    }
}
