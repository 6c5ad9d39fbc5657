//! CSV sheet codec for the routing and patch configuration.
//!
//! Routing sheets carry one row per fixture range:
//!
//! ```csv
//! name,entity_start,entity_end,ip,universe
//! strip-1,101,160,10.0.0.5,0
//! ```
//!
//! Patch sheets carry one row per `source → destination` pair:
//!
//! ```csv
//! universe,source,destination
//! 0,1,2
//! ```
//!
//! Loading is tolerant: individually malformed rows (bad numbers, bad IPs,
//! channels out of range) are logged and skipped, so an operator fixing a
//! sheet live never takes the pipeline down. An unreadable file is an
//! error and leaves whatever configuration was active before in place.
//!
//! Export is the inverse of loading: per-entity entries are grouped by
//! `(name, ip, universe)` and contiguous ID runs are re-compressed into
//! ranges, so load → save → load is identity on the routing set.

use std::{collections::BTreeMap, net::IpAddr, path::Path};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    config::{PhysicalConfig, RangeSpec},
    errors::ConfigError,
    patch::PatchMap,
};

/// One routing sheet row, as serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RoutingRow {
    name: String,
    entity_start: u16,
    entity_end: u16,
    ip: String,
    universe: u16,
}

/// One patch sheet row, as serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PatchRow {
    universe: u16,
    source: u16,
    destination: u16,
}

/// Load and expand a routing sheet.
///
/// # Errors
///
/// [`ConfigError::Sheet`] when the file cannot be read at all. Malformed
/// rows are skipped with a warning.
pub fn load_routing(path: &Path) -> Result<PhysicalConfig, ConfigError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|source| ConfigError::Sheet { path: path.to_path_buf(), source })?;

    let mut ranges = Vec::new();
    for (index, row) in reader.deserialize::<RoutingRow>().enumerate() {
        let line = index + 2; // header is line 1
        let row = match row {
            Ok(row) => row,
            Err(err) => {
                warn!(%err, line, "skipping malformed routing row");
                continue;
            },
        };

        let ip: IpAddr = match row.ip.parse() {
            Ok(ip) => ip,
            Err(_) => {
                warn!(ip = %row.ip, line, "skipping routing row with unparseable IP");
                continue;
            },
        };

        if row.entity_end < row.entity_start {
            warn!(line, "skipping routing row with inverted entity range");
            continue;
        }

        ranges.push(RangeSpec {
            name: row.name,
            entity_start: row.entity_start,
            entity_end: row.entity_end,
            ip,
            universe: row.universe,
        });
    }

    let config = PhysicalConfig::from_ranges(ranges);
    info!(
        path = %path.display(),
        entries = config.entries().len(),
        universes = config.universe_ip().len(),
        "routing sheet loaded"
    );
    Ok(config)
}

/// Serialize a configuration back into a routing sheet.
///
/// Contiguous entity-ID runs within one `(name, ip, universe)` group
/// collapse back into range rows, ordered by universe then start ID.
///
/// # Errors
///
/// [`ConfigError::SheetWrite`] when the file cannot be written.
pub fn save_routing(config: &PhysicalConfig, path: &Path) -> Result<(), ConfigError> {
    let mut groups: BTreeMap<(String, String, u16), Vec<u16>> = BTreeMap::new();
    for entry in config.entries() {
        groups
            .entry((entry.name.clone(), entry.ip.to_string(), entry.universe))
            .or_default()
            .push(entry.entity_id);
    }

    let mut rows = Vec::new();
    for ((name, ip, universe), mut ids) in groups {
        ids.sort_unstable();
        ids.dedup();

        let mut run_start = ids[0];
        let mut run_end = ids[0];
        for &id in &ids[1..] {
            if id == run_end + 1 {
                run_end = id;
            } else {
                rows.push(RoutingRow {
                    name: name.clone(),
                    entity_start: run_start,
                    entity_end: run_end,
                    ip: ip.clone(),
                    universe,
                });
                run_start = id;
                run_end = id;
            }
        }
        rows.push(RoutingRow { name, entity_start: run_start, entity_end: run_end, ip, universe });
    }

    rows.sort_by_key(|row| (row.universe, row.entity_start));

    let mut writer = csv::Writer::from_path(path)
        .map_err(|source| ConfigError::SheetWrite { path: path.to_path_buf(), source })?;
    for row in &rows {
        writer
            .serialize(row)
            .map_err(|source| ConfigError::SheetWrite { path: path.to_path_buf(), source })?;
    }
    writer.flush().map_err(|source| ConfigError::SheetWrite {
        path: path.to_path_buf(),
        source: csv::Error::from(source),
    })?;

    info!(path = %path.display(), rows = rows.len(), "routing sheet exported");
    Ok(())
}

/// Load a patch sheet.
///
/// Duplicate `(universe, source)` rows accumulate destinations.
///
/// # Errors
///
/// [`ConfigError::Sheet`] when the file cannot be read at all. Rows with
/// channels outside `1..=512` or unparseable numbers are skipped with a
/// warning.
pub fn load_patch(path: &Path) -> Result<PatchMap, ConfigError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|source| ConfigError::Sheet { path: path.to_path_buf(), source })?;

    let mut patch = PatchMap::new();
    for (index, row) in reader.deserialize::<PatchRow>().enumerate() {
        let line = index + 2;
        let row = match row {
            Ok(row) => row,
            Err(err) => {
                warn!(%err, line, "skipping malformed patch row");
                continue;
            },
        };

        if let Err(err) = patch.insert(row.universe, row.source, row.destination) {
            warn!(%err, line, "skipping patch row");
        }
    }

    info!(path = %path.display(), universes = patch.universe_count(), "patch sheet loaded");
    Ok(patch)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn sheet(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn loads_and_expands_ranges() {
        let file = sheet(
            "name,entity_start,entity_end,ip,universe\n\
             strip-1,101,103,10.0.0.5,0\n\
             spot,200,200,10.0.0.6,1\n",
        );

        let config = load_routing(file.path()).unwrap();
        assert_eq!(config.entries().len(), 4);
        assert_eq!(config.universe_ip().len(), 2);
        assert_eq!(config.entries()[2].dmx_offset, 6);
        assert_eq!(config.entries()[3].dmx_offset, 0);
    }

    #[test]
    fn malformed_rows_are_skipped_not_fatal() {
        let file = sheet(
            "name,entity_start,entity_end,ip,universe\n\
             ok,1,2,10.0.0.5,0\n\
             bad-number,x,2,10.0.0.5,0\n\
             bad-ip,3,4,not-an-ip,0\n\
             inverted,9,5,10.0.0.5,0\n",
        );

        let config = load_routing(file.path()).unwrap();
        assert_eq!(config.entries().len(), 2);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(matches!(
            load_routing(Path::new("/nonexistent/routing.csv")),
            Err(ConfigError::Sheet { .. })
        ));
    }

    #[test]
    fn export_recompresses_contiguous_runs() {
        let file = sheet(
            "name,entity_start,entity_end,ip,universe\n\
             strip,1,5,10.0.0.5,0\n",
        );
        let config = load_routing(file.path()).unwrap();

        let out = NamedTempFile::new().unwrap();
        save_routing(&config, out.path()).unwrap();

        let text = std::fs::read_to_string(out.path()).unwrap();
        assert_eq!(text, "name,entity_start,entity_end,ip,universe\nstrip,1,5,10.0.0.5,0\n");
    }

    #[test]
    fn patch_rows_accumulate_destinations() {
        let file = sheet(
            "universe,source,destination\n\
             0,1,2\n\
             0,1,3\n\
             2,7,9\n",
        );

        let patch = load_patch(file.path()).unwrap();
        assert_eq!(patch.universe_count(), 2);

        let mut frame = [0u8; 512];
        frame[0] = 42;
        patch.apply(0, &mut frame);
        assert_eq!(frame[3], 42);
        assert_eq!(frame[6], 42);
        assert_eq!(frame[0], 0);
    }

    #[test]
    fn out_of_range_patch_channels_are_skipped() {
        let file = sheet(
            "universe,source,destination\n\
             0,0,2\n\
             0,1,513\n\
             0,1,2\n",
        );

        let patch = load_patch(file.path()).unwrap();
        let mut frame = [0u8; 512];
        frame[0] = 9;
        patch.apply(0, &mut frame);
        assert_eq!(frame[3], 9);
    }
}
