//! Error types for configuration handling.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced while loading or saving configuration sheets.
///
/// A failed load always leaves the previously active configuration
/// untouched; the caller reports the error on its control channel and the
/// pipeline keeps running on the old tables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading or parsing a sheet file failed outright (I/O error, broken
    /// CSV framing). Individually malformed rows are skipped, not fatal.
    #[error("failed to read sheet {path}: {source}")]
    Sheet {
        /// The file that failed.
        path: PathBuf,
        /// Underlying CSV or I/O error.
        #[source]
        source: csv::Error,
    },

    /// Writing a sheet file failed.
    #[error("failed to write sheet {path}: {source}")]
    SheetWrite {
        /// The file that failed.
        path: PathBuf,
        /// Underlying CSV or I/O error.
        #[source]
        source: csv::Error,
    },

    /// A patch channel outside the DMX range `1..=512`.
    #[error("patch channel {channel} outside 1..=512")]
    ChannelOutOfRange {
        /// The offending channel number.
        channel: u16,
    },
}
