//! Snapshot and config loading.
//!
//! Snapshots are read from RON (hand-written test worlds) or JSON (dumped by
//! a game server), picked by file extension.

use std::path::Path;

use empire_core::config::EngineConfig;
use empire_core::snapshot::WorldSnapshot;
use thiserror::Error;

/// Error type for loading inputs.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Snapshot file not found: {0}")]
    FileNotFound(String),
    /// Failed to read or write a file.
    #[error("Failed to access file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse RON: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// Failed to parse JSON.
    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),
    /// Engine rejected the input.
    #[error(transparent)]
    Engine(#[from] empire_core::error::GameError),
}

/// Snapshot file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotFormat {
    /// Rusty Object Notation.
    Ron,
    /// JSON.
    Json,
}

impl SnapshotFormat {
    /// Format implied by a file extension; anything but `.json` is RON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Ron,
        }
    }
}

/// Parse a snapshot from text.
pub fn parse_snapshot(text: &str, format: SnapshotFormat) -> Result<WorldSnapshot, ScenarioError> {
    let snapshot = match format {
        SnapshotFormat::Ron => ron::from_str(text)?,
        SnapshotFormat::Json => serde_json::from_str(text)?,
    };
    Ok(snapshot)
}

/// Load a snapshot from a RON or JSON file.
pub fn load_snapshot<P: AsRef<Path>>(path: P) -> Result<WorldSnapshot, ScenarioError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ScenarioError::FileNotFound(path.display().to_string()));
    }
    let contents = std::fs::read_to_string(path)?;
    let snapshot = parse_snapshot(&contents, SnapshotFormat::from_path(path))?;
    tracing::debug!(
        path = %path.display(),
        ships = snapshot.ships.len(),
        planets = snapshot.planets.len(),
        tick = snapshot.tick,
        "Loaded snapshot"
    );
    Ok(snapshot)
}

/// Load an engine config, or the defaults when no path is given.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig, ScenarioError> {
    match path {
        Some(path) => Ok(EngineConfig::load(path)?),
        None => Ok(EngineConfig::default()),
    }
}

/// Write a snapshot as pretty RON.
pub fn save_snapshot<P: AsRef<Path>>(
    snapshot: &WorldSnapshot,
    path: P,
) -> Result<(), ScenarioError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let text = ron::ser::to_string_pretty(snapshot, ron::ser::PrettyConfig::default())
        .map_err(|e| empire_core::error::GameError::Serialization(e.to_string()))?;
    std::fs::write(path, text)?;
    Ok(())
}
