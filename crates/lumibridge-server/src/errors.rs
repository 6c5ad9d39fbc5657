//! Error types for the runtime layer.

use std::{io, net::IpAddr};

use thiserror::Error;

use lumibridge_core::ConfigError;

/// Fatal errors while bringing a pipeline incarnation up.
///
/// Bind failures kill the incarnation before it starts; the supervisor
/// reports them and stays idle awaiting another load request. Nothing in
/// the running data plane produces these.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The eHuB ingress socket could not be bound.
    #[error("failed to bind eHuB ingress on port {port}: {source}")]
    BindIngress {
        /// Requested port.
        port: u16,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },

    /// An outbound Art-Net socket could not be set up.
    #[error("failed to open Art-Net socket for {ip}: {source}")]
    BindEmitter {
        /// Destination controller the socket was meant for.
        ip: IpAddr,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },
}

/// Errors reported on the config manager's reply channel.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// A request needing a configuration arrived before any load
    /// succeeded.
    #[error("no routing configuration loaded")]
    NotLoaded,

    /// Sheet load or export failed. The previously active configuration
    /// stays in effect.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The restarted pipeline failed to come up. The system is idle.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}
