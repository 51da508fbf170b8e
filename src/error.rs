//! Error types for graph and segment operations.
//!
//! Only caller bugs and physically impossible placements are reported through
//! these errors. Load/unload races in the host are logged and repaired locally
//! instead.

use crate::models::{Position, SegmentId, SignalKey};

/// Errors returned by rail graph, segment and snapshot operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignallingError {
    /// A rail is already loaded at this position
    #[error("rail already loaded at {0}")]
    RailExists(Position),

    /// No rail is loaded at this position
    #[error("no rail loaded at {0}")]
    MissingRail(Position),

    /// The signal is already registered (on the graph or as a segment guard)
    #[error("signal {0} is already registered")]
    DuplicateSignal(SignalKey),

    /// The signal is not registered on the graph
    #[error("signal {0} is not registered")]
    UnknownSignal(SignalKey),

    /// A rail was added to a segment it shares no open link with
    #[error("rail {rail} is not connected to segment {segment}")]
    DisconnectedRail { rail: Position, segment: SegmentId },

    /// No live segment has this id
    #[error("unknown segment {0}")]
    UnknownSegment(SegmentId),

    /// The segment partition does not match the track graph
    #[error("partition invariant violated: {0}")]
    Partition(String),

    /// A snapshot could not be encoded or decoded
    #[error("snapshot error: {0}")]
    Snapshot(String),

    /// A configuration file could not be read or parsed
    #[error("config error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Direction;

    #[test]
    fn test_error_display() {
        let err = SignallingError::MissingRail(Position::new(1, 64, -3));
        assert_eq!(err.to_string(), "no rail loaded at (1, 64, -3)");

        let key = SignalKey::new(Position::new(0, 0, 0), Direction::East);
        let err = SignallingError::DuplicateSignal(key);
        assert_eq!(err.to_string(), "signal (0, 0, 0)/east is already registered");

        let err = SignallingError::DisconnectedRail {
            rail: Position::new(5, 0, 5),
            segment: SegmentId(2),
        };
        assert_eq!(err.to_string(), "rail (5, 0, 5) is not connected to segment #2");
    }
}
