//! Art-Net emitter.
//!
//! Owns one connected UDP socket per destination controller and a
//! precomputed 18-byte ArtDmx header per universe. Incoming frames
//! coalesce into a `latest` map between ticks; on each 33 ms tick the
//! emitter sends only universes whose frame differs from the last one
//! sent, except every 30th tick, when everything known is re-sent to
//! recover from UDP loss downstream.
//!
//! `last_sent` is updated *before* each write so a failing link cannot
//! make the emitter spin retransmitting the same buffer every tick; the
//! next forced refresh reconciles. When a tick schedules N packets they
//! are spread across 80% of the tick window to avoid microbursts on small
//! industrial switches.

use std::{
    collections::{BTreeMap, HashMap},
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr},
    time::Duration,
};

use tokio::{
    net::UdpSocket,
    sync::{mpsc, watch},
};
use tracing::{info, warn};

use lumibridge_core::FrameOut;
use lumibridge_proto::artnet::{self, DMX_CHANNELS, HEADER_LEN, PACKET_LEN};

use crate::errors::PipelineError;

/// Emitter tick period (nominal 30 Hz).
pub const EMIT_TICK: Duration = Duration::from_millis(33);

/// Ticks between forced full refreshes (roughly one per second).
pub const REFRESH_EVERY: u32 = 30;

/// One packet the emitter decided to send this tick.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Outgoing {
    ip: IpAddr,
    universe: u16,
    packet: [u8; PACKET_LEN],
}

/// The emitter's diffing state, separated from the sockets so every
/// scheduling decision is testable without I/O.
struct EmitterState {
    headers: HashMap<u16, [u8; HEADER_LEN]>,
    latest: BTreeMap<u16, FrameOut>,
    last_sent: HashMap<u16, [u8; DMX_CHANNELS]>,
    ticks_since_refresh: u32,
}

impl EmitterState {
    fn new(universes: impl Iterator<Item = u16>) -> Self {
        Self {
            headers: universes.map(|u| (u, artnet::build_header(u))).collect(),
            latest: BTreeMap::new(),
            last_sent: HashMap::new(),
            ticks_since_refresh: 0,
        }
    }

    /// Coalesce an incoming frame: only the most recent frame per
    /// universe between two ticks is kept.
    fn absorb(&mut self, frame: FrameOut) {
        self.latest.insert(frame.universe, frame);
    }

    /// Advance one tick and return the packets due.
    ///
    /// Updates `last_sent` for every scheduled packet before the caller
    /// attempts any write.
    fn tick(&mut self) -> Vec<Outgoing> {
        self.ticks_since_refresh += 1;
        let force_refresh = self.ticks_since_refresh >= REFRESH_EVERY;
        if force_refresh {
            self.ticks_since_refresh = 0;
        }

        let due: Vec<FrameOut> = self
            .latest
            .values()
            .filter(|frame| {
                force_refresh || self.last_sent.get(&frame.universe) != Some(&frame.data)
            })
            .cloned()
            .collect();

        due.into_iter()
            .map(|frame| {
                self.last_sent.insert(frame.universe, frame.data);
                let header = self
                    .headers
                    .entry(frame.universe)
                    .or_insert_with(|| artnet::build_header(frame.universe));
                Outgoing {
                    ip: frame.ip,
                    universe: frame.universe,
                    packet: artnet::build_packet(header, &frame.data),
                }
            })
            .collect()
    }
}

/// The emitter: scheduling state plus its sockets.
pub(crate) struct Emitter {
    sockets: HashMap<IpAddr, UdpSocket>,
    state: EmitterState,
}

impl Emitter {
    /// Bind one outbound socket per distinct controller address and
    /// precompute per-universe headers.
    pub(crate) async fn bind(
        universe_ip: &BTreeMap<u16, IpAddr>,
        artnet_port: u16,
    ) -> Result<Self, PipelineError> {
        let mut sockets = HashMap::new();

        for &ip in universe_ip.values() {
            if sockets.contains_key(&ip) {
                continue;
            }

            let local: SocketAddr = match ip {
                IpAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
                IpAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
            };

            let socket = UdpSocket::bind(local)
                .await
                .map_err(|source| PipelineError::BindEmitter { ip, source })?;
            socket
                .connect((ip, artnet_port))
                .await
                .map_err(|source| PipelineError::BindEmitter { ip, source })?;

            sockets.insert(ip, socket);
        }

        info!(controllers = sockets.len(), universes = universe_ip.len(), "emitter ready");

        Ok(Self { sockets, state: EmitterState::new(universe_ip.keys().copied()) })
    }

    pub(crate) async fn run(
        mut self,
        mut dmx_rx: mpsc::Receiver<FrameOut>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(EMIT_TICK);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,

                frame = dmx_rx.recv() => {
                    let Some(frame) = frame else { break };
                    self.state.absorb(frame);
                },

                _ = ticker.tick() => self.flush().await,
            }
        }

        info!("emitter stopped");
    }

    /// Send everything due this tick, paced across 80% of the tick
    /// window.
    async fn flush(&mut self) {
        let due = self.state.tick();
        let count = due.len();
        if count == 0 {
            return;
        }

        let gap = EMIT_TICK.mul_f64(0.8 / count as f64);

        for (index, outgoing) in due.iter().enumerate() {
            match self.sockets.get(&outgoing.ip) {
                Some(socket) => {
                    if let Err(err) = socket.send(&outgoing.packet).await {
                        warn!(universe = outgoing.universe, ip = %outgoing.ip, %err, "ArtDmx send failed");
                    }
                },
                None => {
                    warn!(universe = outgoing.universe, ip = %outgoing.ip, "no socket for controller");
                },
            }

            if index + 1 < count {
                tokio::time::sleep(gap).await;
            }
        }
    }
}
