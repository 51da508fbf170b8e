use super::RailGraph;
use crate::error::SignallingError;
use crate::models::{BlockingState, Position, Segment, SegmentId, TrainId};

/// Extension trait for the train controller's view of segments
pub trait Reservations {
    /// Ask for exclusive use of a segment
    ///
    /// # Errors
    ///
    /// Returns `UnknownSegment` if the id is not live.
    fn attempt_reserve(&mut self, segment: SegmentId, train: Option<TrainId>) -> Result<bool, SignallingError>;

    /// Reserve whichever segment the rail at `position` belongs to
    ///
    /// # Errors
    ///
    /// Returns `MissingRail` if the rail has no segment.
    fn attempt_reserve_at(&mut self, position: Position, train: TrainId) -> Result<bool, SignallingError>;

    /// A train crossed into the segment; returns the resulting state
    ///
    /// # Errors
    ///
    /// Returns `UnknownSegment` if the id is not live.
    fn on_enter(&mut self, segment: SegmentId, train: TrainId) -> Result<BlockingState, SignallingError>;

    /// A train left the segment; returns whether the reservation was released
    ///
    /// # Errors
    ///
    /// Returns `UnknownSegment` if the id is not live.
    fn on_exit(&mut self, segment: SegmentId, train: TrainId) -> Result<bool, SignallingError>;

    fn reservation(&self, segment: SegmentId) -> Option<TrainId>;

    /// Every segment currently held by `train`, in id order
    fn reservations_for(&self, train: TrainId) -> Vec<SegmentId>;
}

impl Reservations for RailGraph {
    fn attempt_reserve(&mut self, segment: SegmentId, train: Option<TrainId>) -> Result<bool, SignallingError> {
        let target = self
            .segments
            .get_mut(segment)
            .ok_or(SignallingError::UnknownSegment(segment))?;
        Ok(target.attempt_reserve(train, &mut self.signals))
    }

    fn attempt_reserve_at(&mut self, position: Position, train: TrainId) -> Result<bool, SignallingError> {
        let segment = self
            .live_segment_of(position)
            .ok_or(SignallingError::MissingRail(position))?;
        self.attempt_reserve(segment, Some(train))
    }

    fn on_enter(&mut self, segment: SegmentId, train: TrainId) -> Result<BlockingState, SignallingError> {
        let target = self
            .segments
            .get_mut(segment)
            .ok_or(SignallingError::UnknownSegment(segment))?;
        Ok(target.on_enter(train, &mut self.signals))
    }

    fn on_exit(&mut self, segment: SegmentId, train: TrainId) -> Result<bool, SignallingError> {
        let target = self
            .segments
            .get_mut(segment)
            .ok_or(SignallingError::UnknownSegment(segment))?;
        Ok(target.on_exit(train, &mut self.signals))
    }

    fn reservation(&self, segment: SegmentId) -> Option<TrainId> {
        self.segments.get(segment).and_then(Segment::reservation)
    }

    fn reservations_for(&self, train: TrainId) -> Vec<SegmentId> {
        self.segments
            .iter()
            .filter(|segment| segment.reservation() == Some(train))
            .map(Segment::id)
            .collect()
    }
}
