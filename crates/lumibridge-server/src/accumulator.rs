//! Accumulator task.
//!
//! Wraps the sans-IO [`Accumulator`] in the single task that owns it —
//! task ownership gives the same total order over the persistent DMX
//! state that a mutex would, without one. Outgoing frames go to the
//! emitter with back-pressure; monitor snapshots are published
//! non-blocking and dropped when observers fall behind, so the realtime
//! path never waits on them.

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use lumibridge_core::{Accumulator, FrameOut, MonitorSnapshot, PatchMap};
use lumibridge_proto::{ConfigMessage, UpdateMessage};

/// Patch-related requests forwarded by the supervisor while the pipeline
/// keeps running.
#[derive(Debug, Clone)]
pub enum AccumulatorControl {
    /// Install a patch map and activate it.
    SetPatch(PatchMap),
    /// Drop the patch map.
    ClearPatch,
    /// Toggle patching without touching the loaded map.
    SetPatchingActive(bool),
}

pub(crate) async fn run_accumulator(
    mut acc: Accumulator,
    mut config_rx: mpsc::Receiver<ConfigMessage>,
    mut update_rx: mpsc::Receiver<UpdateMessage>,
    mut control_rx: mpsc::Receiver<AccumulatorControl>,
    dmx_tx: mpsc::Sender<FrameOut>,
    monitor_tx: mpsc::Sender<MonitorSnapshot>,
) {
    // Logged once per congestion burst, reset on the next success.
    let mut tap_congested = false;
    let mut control_open = true;

    loop {
        tokio::select! {
            config = config_rx.recv() => {
                let Some(config) = config else { break };
                if acc.handle_config(config) {
                    info!("routing table recompiled");
                }
            },

            update = update_rx.recv() => {
                let Some(update) = update else { break };
                let out = acc.handle_update(&update);

                for frame in out.frames {
                    if dmx_tx.send(frame).await.is_err() {
                        return;
                    }
                }

                for snapshot in out.snapshots {
                    match monitor_tx.try_send(snapshot) {
                        Ok(()) => tap_congested = false,
                        Err(TrySendError::Full(_)) => {
                            if !tap_congested {
                                warn!("monitor tap full, dropping snapshots");
                                tap_congested = true;
                            }
                        },
                        Err(TrySendError::Closed(_)) => {},
                    }
                }
            },

            control = control_rx.recv(), if control_open => match control {
                Some(AccumulatorControl::SetPatch(patch)) => {
                    info!(universes = patch.universe_count(), "patch installed");
                    acc.set_patch(patch);
                },
                Some(AccumulatorControl::ClearPatch) => {
                    info!("patch cleared");
                    acc.clear_patch();
                },
                Some(AccumulatorControl::SetPatchingActive(active)) => {
                    debug!(active, "patching toggled");
                    acc.set_patching_active(active);
                },
                None => control_open = false,
            },
        }
    }

    let stats = acc.stats();
    info!(
        unmapped = stats.unmapped,
        offset_out_of_range = stats.offset_out_of_range,
        missing_universe_ip = stats.missing_universe_ip,
        "accumulator stopped"
    );
}
