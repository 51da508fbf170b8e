use crate::models::{BlockingState, Position, SegmentId, SignalKey, TrackShape, TrainId};
use serde::{Deserialize, Serialize};

/// Serializable image of a rail graph
///
/// Only rails, signals and segment states are stored. Links and guard
/// assignments are derived again on restore. Track parked in unloaded
/// regions is kept apart so it can wait for its region again.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub rails: Vec<RailRecord>,
    pub signals: Vec<SignalKey>,
    pub segments: Vec<SegmentRecord>,
    #[serde(default)]
    pub pending_rails: Vec<(Position, TrackShape)>,
    #[serde(default)]
    pub pending_signals: Vec<SignalKey>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RailRecord {
    pub position: Position,
    pub shape: TrackShape,
    #[serde(default)]
    pub segment: Option<SegmentId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentRecord {
    pub id: SegmentId,
    pub state: BlockingState,
    #[serde(default)]
    pub reservation: Option<TrainId>,
}

impl GraphSnapshot {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rails.is_empty() && self.pending_rails.is_empty()
    }
}
