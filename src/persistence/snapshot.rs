use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

use crate::colony::Colony;

const PREFIX: &str = "colony-tick";

/// A colony snapshot found on disk, described by its filename.
#[derive(Debug, Clone)]
pub struct SnapshotMetadata {
    pub path: PathBuf,
    pub tick_count: u64,
    pub timestamp: u64,
    pub file_size: u64,
}

#[derive(Debug)]
pub enum SnapshotError {
    Io(io::Error),
    Serialize(String),
    Deserialize(String),
    /// Decoded, but the maps or body fields have the wrong shape.
    Corrupt(PathBuf),
    NoValidSnapshots,
}

impl std::fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotError::Io(e) => write!(f, "snapshot I/O failed: {}", e),
            SnapshotError::Serialize(e) => write!(f, "cannot encode colony: {}", e),
            SnapshotError::Deserialize(e) => write!(f, "cannot decode colony: {}", e),
            SnapshotError::Corrupt(path) => {
                write!(f, "inconsistent colony snapshot: {}", path.display())
            }
            SnapshotError::NoValidSnapshots => write!(
                f,
                "no loadable colony snapshot; start a fresh colony with `huddle run`"
            ),
        }
    }
}

impl std::error::Error for SnapshotError {}

impl From<io::Error> for SnapshotError {
    fn from(e: io::Error) -> Self {
        SnapshotError::Io(e)
    }
}

fn snapshot_filename(tick_count: u64, timestamp: u64) -> String {
    format!("{}{}-{}.bin", PREFIX, tick_count, timestamp)
}

/// `colony-tick{N}-{timestamp}.bin` -> `(N, timestamp)`
fn parse_snapshot_filename(filename: &str) -> Option<(u64, u64)> {
    let (tick, ts) = filename
        .strip_suffix(".bin")?
        .strip_prefix(PREFIX)?
        .split_once('-')?;
    Some((tick.parse().ok()?, ts.parse().ok()?))
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Write the whole colony (agents, grid, generator state) to `snapshot_dir`.
///
/// The bytes go to a hidden temp file that is renamed into place, so an
/// interrupted save never leaves a half-written snapshot behind.
pub fn save_snapshot(colony: &Colony, snapshot_dir: &Path) -> Result<PathBuf, SnapshotError> {
    fs::create_dir_all(snapshot_dir)?;

    let encoded =
        bincode::serialize(colony).map_err(|e| SnapshotError::Serialize(e.to_string()))?;

    let name = snapshot_filename(colony.tick_count(), now_secs());
    let target = snapshot_dir.join(&name);
    let staging = snapshot_dir.join(format!(".{}.tmp", name));

    let written = fs::write(&staging, &encoded).and_then(|()| fs::rename(&staging, &target));
    if let Err(e) = written {
        let _ = fs::remove_file(&staging);
        return Err(SnapshotError::Io(e));
    }
    Ok(target)
}

/// Read a colony back. A file that decodes but whose map dimensions or
/// body fields disagree is reported as `Corrupt`.
pub fn load_snapshot(path: &Path) -> Result<Colony, SnapshotError> {
    let bytes = fs::read(path)?;
    let colony: Colony =
        bincode::deserialize(&bytes).map_err(|e| SnapshotError::Deserialize(e.to_string()))?;
    if colony.is_consistent() {
        Ok(colony)
    } else {
        Err(SnapshotError::Corrupt(path.to_path_buf()))
    }
}

/// Snapshots in `snapshot_dir`, newest first. A missing directory is empty.
pub fn list_snapshots(snapshot_dir: &Path) -> Result<Vec<SnapshotMetadata>, SnapshotError> {
    if !snapshot_dir.exists() {
        return Ok(Vec::new());
    }

    let mut found = Vec::new();
    for entry in fs::read_dir(snapshot_dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        // Hidden names are in-flight temp files.
        let Some((tick_count, timestamp)) = path
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.starts_with('.'))
            .and_then(parse_snapshot_filename)
        else {
            continue;
        };
        found.push(SnapshotMetadata {
            file_size: entry.metadata().map(|m| m.len()).unwrap_or(0),
            path,
            tick_count,
            timestamp,
        });
    }

    found.sort_by(|a, b| (b.timestamp, b.tick_count).cmp(&(a.timestamp, a.tick_count)));
    Ok(found)
}

/// Delete all but the `max_snapshots` newest snapshots; returns what was removed.
pub fn prune_snapshots(
    snapshot_dir: &Path,
    max_snapshots: usize,
) -> Result<Vec<PathBuf>, SnapshotError> {
    let stale: Vec<PathBuf> = list_snapshots(snapshot_dir)?
        .into_iter()
        .skip(max_snapshots)
        .map(|s| s.path)
        .collect();
    for path in &stale {
        fs::remove_file(path)?;
    }
    Ok(stale)
}

/// Newest snapshot that loads cleanly, skipping corrupt ones.
pub fn load_latest_valid_snapshot(snapshot_dir: &Path) -> Result<Colony, SnapshotError> {
    for snapshot in list_snapshots(snapshot_dir)? {
        match load_snapshot(&snapshot.path) {
            Ok(colony) => return Ok(colony),
            Err(e) => warn!(
                path = %snapshot.path.display(),
                error = %e,
                "Skipping unreadable colony snapshot"
            ),
        }
    }
    Err(SnapshotError::NoValidSnapshots)
}
