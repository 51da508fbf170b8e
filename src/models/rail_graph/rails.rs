use super::{LinkOutcome, RailGraph, Signals};
use crate::error::SignallingError;
use crate::logging::log;
use crate::models::{Direction, Position, SegmentId, SignalEvent, SignalKey, TrackShape};
use tracing::warn;

/// Extension trait for loading and unloading track pieces
pub trait Rails {
    /// Load a rail, link it to neighbours that reach back and update segments
    ///
    /// # Errors
    ///
    /// Returns `RailExists` if a rail is already loaded at `position`.
    fn add_rail(&mut self, position: Position, shape: TrackShape) -> Result<LinkOutcome, SignallingError>;

    /// Unload a rail together with the signals mounted on it
    ///
    /// Returns `false` (after logging) when nothing is loaded there.
    ///
    /// # Errors
    ///
    /// Propagates errors from segment recalculation.
    fn remove_rail(&mut self, position: Position) -> Result<bool, SignallingError>;

    /// Swap a rail's shape in place, keeping the signals mounted on it
    ///
    /// # Errors
    ///
    /// Returns `MissingRail` if nothing is loaded at `position`.
    fn reshape_rail(&mut self, position: Position, shape: TrackShape) -> Result<LinkOutcome, SignallingError>;
}

impl Rails for RailGraph {
    fn add_rail(&mut self, position: Position, shape: TrackShape) -> Result<LinkOutcome, SignallingError> {
        if self.rails.contains_key(&position) {
            return Err(SignallingError::RailExists(position));
        }
        if !self.region_available(position) {
            self.pending.defer_rail(position, shape);
            log!("Deferred rail at {} until region {} loads", position, position.region(self.config.region_size));
            return Ok(LinkOutcome::Deferred);
        }

        self.insert_rail(position, shape);
        self.recalculate_segments_near_vertex(position)?;

        let segment = self.live_segment_of(position).ok_or_else(|| {
            SignallingError::Partition(format!("rail {position} was left without a segment"))
        })?;
        Ok(LinkOutcome::Linked(segment))
    }

    fn remove_rail(&mut self, position: Position) -> Result<bool, SignallingError> {
        if self.pending.cancel_rail(position) {
            return Ok(true);
        }
        let Some(rail) = self.rails.get(&position) else {
            warn!("Unable to remove rail at {position}: nothing loaded there");
            return Ok(false);
        };
        let neighbors: Vec<(Direction, Position)> = rail.neighbor_rails().collect();
        let former_segment = rail.segment();

        // Signals mounted here go down with the rail
        for direction in Direction::ALL {
            let key = SignalKey::new(position, direction);
            if self.signals.contains(key) {
                self.discard_signal(key);
            }
        }
        let open: Vec<Position> = neighbors
            .iter()
            .filter(|(direction, neighbor)| {
                self.is_open_toward(position, *direction) && self.live_segment_of(*neighbor) == former_segment
            })
            .map(|(_, neighbor)| *neighbor)
            .collect();

        let Some(rail) = self.rails.remove(&position) else {
            return Ok(false);
        };
        for (direction, neighbor) in &neighbors {
            if let Some(other) = self.rails.get_mut(neighbor) {
                other.unlink(direction.opposite());
            }
            self.dirty.insert(*neighbor);
        }
        self.graph.remove_node(rail.node);
        self.dirty.insert(position);

        if let Some(id) = former_segment.filter(|id| self.segments.contains(*id)) {
            self.detach_rail(id, position);
            let remaining = self.segments.get(id).is_some_and(|segment| !segment.is_empty());
            if remaining && self.splits_apart(&open) {
                self.dissolve_segment(id, &open)?;
            }
        }

        for (_, neighbor) in neighbors {
            self.recalculate_segments_near_vertex(neighbor)?;
        }
        self.finish_update()?;
        log!("Removed rail at {}", position);
        Ok(true)
    }

    fn reshape_rail(&mut self, position: Position, shape: TrackShape) -> Result<LinkOutcome, SignallingError> {
        if self.pending.reshape_rail(position, shape) {
            return Ok(LinkOutcome::Deferred);
        }
        let Some(rail) = self.rails.get(&position) else {
            return Err(SignallingError::MissingRail(position));
        };
        if rail.shape() == shape {
            return self
                .live_segment_of(position)
                .map(LinkOutcome::Linked)
                .ok_or(SignallingError::MissingRail(position));
        }
        let mounted: Vec<SignalKey> = Direction::ALL
            .into_iter()
            .map(|direction| SignalKey::new(position, direction))
            .filter(|key| self.signals.contains(*key))
            .collect();

        self.remove_rail(position)?;
        let outcome = self.add_rail(position, shape)?;
        for key in mounted {
            if let Err(err) = self.add_rail_signal(key) {
                warn!("Dropping signal {key} after reshaping {position}: {err}");
            }
        }
        Ok(self.live_segment_of(position).map_or(outcome, LinkOutcome::Linked))
    }
}

impl RailGraph {
    /// Whether the rails that shared a segment through a removed rail fell apart
    fn splits_apart(&self, open: &[Position]) -> bool {
        let Some((first, rest)) = open.split_first() else {
            return false;
        };
        rest.iter()
            .any(|other| !self.connected_over_open_links(*first, *other))
    }

    /// Retire a segment and map each remaining piece under a fresh id
    ///
    /// Every piece keeps the dissolved segment's state and reservation.
    fn dissolve_segment(&mut self, id: SegmentId, starts: &[Position]) -> Result<(), SignallingError> {
        let inherit = self.segment_state(id);
        let Some(segment) = self.segments.get_mut(id) else {
            return Ok(());
        };
        let members = segment.take_rails();
        segment.take_guards();
        for member in &members {
            if let Some(rail) = self.rails.get_mut(member) {
                rail.set_segment(None);
            }
            self.dirty.insert(*member);
        }
        self.segments.retire(id);
        self.vacated.shift_remove(&id);

        for start in starts {
            if self.rails.contains_key(start) && self.live_segment_of(*start).is_none() {
                self.map_segment_inheriting(*start, inherit)?;
            }
        }
        // Members cut off from every start (should not happen) still need a home
        for member in members {
            if self.rails.get(&member).is_some_and(|rail| rail.segment().is_none()) {
                warn!("Rail {member} was unreachable after dissolving segment {id}");
                self.map_segment_inheriting(member, inherit)?;
            }
        }
        log!("Dissolved segment {} into {} pieces", id, starts.len());
        Ok(())
    }

    /// Remove a registered signal, release its link and detach it from its segment
    ///
    /// Returns `true` when the link it sat on became open.
    pub(super) fn discard_signal(&mut self, key: SignalKey) -> bool {
        let Some(signal) = self.signals.remove(key) else {
            return false;
        };
        if let Some(id) = signal.guarded_segment() {
            if let Some(segment) = self.segments.get_mut(id) {
                segment.remove_rail_signal(key);
            }
            self.signals.push_event(SignalEvent::Unguarded { signal: key });
        }
        self.dirty.insert(key.rail);
        self.dirty.insert(key.exit_rail());
        let Some(edge) = self.link_between(key.rail, key.exit_rail()) else {
            return false;
        };
        let link = &mut self.graph[edge];
        link.signals = link.signals.saturating_sub(1);
        link.is_open()
    }
}
