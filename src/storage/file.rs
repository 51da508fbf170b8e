use super::GraphSnapshot;
use crate::config::GraphConfig;
use crate::constants::{CURRENT_SNAPSHOT_VERSION, SNAPSHOT_EXTENSION};
use crate::error::SignallingError;
use crate::models::RailGraph;
use std::path::Path;

/// Serialize a snapshot to bytes with version header
///
/// # Errors
/// Returns an error if `MessagePack` serialization fails
pub fn serialize_snapshot_to_bytes(snapshot: &GraphSnapshot) -> Result<Vec<u8>, SignallingError> {
    let body = rmp_serde::to_vec(snapshot)
        .map_err(|e| SignallingError::Snapshot(format!("Failed to serialize snapshot: {e}")))?;

    // [4 bytes u32 version][`MessagePack` data]
    let mut bytes = Vec::with_capacity(4 + body.len());
    bytes.extend_from_slice(&CURRENT_SNAPSHOT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&body);
    Ok(bytes)
}

/// Deserialize a snapshot, checking the version header
///
/// # Errors
/// Returns an error if the data is truncated, the version is unsupported, or decoding fails
pub fn deserialize_snapshot_from_bytes(bytes: &[u8]) -> Result<GraphSnapshot, SignallingError> {
    let Some((header, body)) = bytes.split_first_chunk::<4>() else {
        return Err(SignallingError::Snapshot("Invalid snapshot: too small".to_string()));
    };
    let version = u32::from_le_bytes(*header);
    if version != CURRENT_SNAPSHOT_VERSION {
        return Err(SignallingError::Snapshot(format!(
            "Unsupported snapshot version: {version}"
        )));
    }
    rmp_serde::from_slice(body)
        .map_err(|e| SignallingError::Snapshot(format!("Failed to parse snapshot: {e}")))
}

/// Write a graph to disk
///
/// # Errors
/// Returns an error if encoding or the write fails
pub fn save_graph(graph: &RailGraph, path: &Path) -> Result<(), SignallingError> {
    let bytes = serialize_snapshot_to_bytes(&graph.snapshot())?;
    std::fs::write(path, bytes)
        .map_err(|e| SignallingError::Snapshot(format!("Failed to write {}: {e}", path.display())))
}

/// Read a graph back from disk
///
/// # Errors
/// Returns an error if the file cannot be read or decoded
pub fn load_graph(path: &Path, config: GraphConfig) -> Result<RailGraph, SignallingError> {
    let bytes = std::fs::read(path)
        .map_err(|e| SignallingError::Snapshot(format!("Failed to read {}: {e}", path.display())))?;
    let snapshot = deserialize_snapshot_from_bytes(&bytes)?;
    RailGraph::restore(&snapshot, config)
}

/// Timestamped file name for a world's snapshot
#[must_use]
pub fn create_snapshot_filename(world_name: &str) -> String {
    let now = chrono::Utc::now();
    format!(
        "{}.{}.{SNAPSHOT_EXTENSION}",
        world_name.replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|'], "_"),
        now.format("%Y-%m-%d-%H%M%S")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Axis, Direction, Position, Rails, SignalKey, Signals, TrackShape};

    fn sample_graph() -> RailGraph {
        let mut graph = RailGraph::new();
        for x in 0..3 {
            graph
                .add_rail(Position::new(x, 0, 0), TrackShape::Straight(Axis::EastWest))
                .expect("rail should be added");
        }
        graph
            .add_rail_signal(SignalKey::new(Position::new(0, 0, 0), Direction::East))
            .expect("signal should be added");
        graph
    }

    #[test]
    fn test_bytes_round_trip() {
        let snapshot = sample_graph().snapshot();
        let bytes = serialize_snapshot_to_bytes(&snapshot).expect("Failed to serialize");
        let decoded = deserialize_snapshot_from_bytes(&bytes).expect("Failed to deserialize");
        assert_eq!(decoded, snapshot);
    }

    #[test]
    fn test_deserialize_invalid_size() {
        let result = deserialize_snapshot_from_bytes(&[0u8, 1u8, 2u8]);
        assert!(result.expect_err("Expected error").to_string().contains("too small"));
    }

    #[test]
    fn test_deserialize_invalid_version() {
        let mut bytes = vec![0u8; 8];
        bytes[0..4].copy_from_slice(&99u32.to_le_bytes());
        let result = deserialize_snapshot_from_bytes(&bytes);
        assert!(result
            .expect_err("Expected error")
            .to_string()
            .contains("Unsupported snapshot version"));
    }

    #[test]
    fn test_save_and_load_graph() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join(create_snapshot_filename("overworld"));
        let graph = sample_graph();

        save_graph(&graph, &path).expect("written");
        let loaded = load_graph(&path, GraphConfig::default()).expect("read back");
        assert_eq!(loaded.snapshot(), graph.snapshot());
        assert!(loaded.validate_partition().is_ok());
    }

    #[test]
    fn test_create_snapshot_filename_sanitizes_invalid_chars() {
        let filename = create_snapshot_filename("My/World:Nether");
        assert!(filename.starts_with("My_World_Nether."));
        assert!(!filename.contains('/'));
        assert!(!filename.contains(':'));
        assert!(filename.ends_with(".segsnap"));
    }
}
