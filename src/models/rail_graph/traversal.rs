use super::RailGraph;
use crate::error::SignallingError;
use crate::logging::log;
use crate::models::{BlockingState, Position, Rail, Segment, SegmentId, TrainId};
use indexmap::IndexSet;
use std::collections::{HashSet, VecDeque};
use tracing::warn;

impl RailGraph {
    /// Create a fresh segment at `start` and flood it over open links
    ///
    /// Segments emptied by the flood are folded into the new one, which
    /// takes over the most restrictive state and any reservation.
    ///
    /// # Errors
    ///
    /// Returns `MissingRail` if nothing is loaded at `start`.
    pub fn map_segment(&mut self, start: Position) -> Result<SegmentId, SignallingError> {
        let previous: IndexSet<SegmentId> = self
            .open_component(start)
            .into_iter()
            .filter_map(|position| self.live_segment_of(position))
            .collect();
        let id = self.map_segment_inheriting(start, None)?;
        for old in previous {
            self.absorb_segment(id, old);
        }
        self.finish_update()?;
        Ok(id)
    }

    /// Like [`RailGraph::map_segment`], but the new segment starts out in
    /// the given state, as happens when a segment is split in two.
    pub(crate) fn map_segment_inheriting(
        &mut self,
        start: Position,
        inherit: Option<(BlockingState, Option<TrainId>)>,
    ) -> Result<SegmentId, SignallingError> {
        if !self.rails.contains_key(&start) {
            return Err(SignallingError::MissingRail(start));
        }
        let id = self.segments.allocate();
        if let Some((state, reservation)) = inherit {
            if let Some(segment) = self.segments.get_mut(id) {
                segment.advance_to(state, reservation, &mut self.signals);
            }
        }
        self.assign(start, id)?;

        let mut visited = HashSet::from([start]);
        for next in self.open_neighbors(start) {
            self.explore_straight(id, start, next, &mut visited)?;
        }
        log!(
            "Mapped segment {} from {} ({} rails)",
            id,
            start,
            self.segments.get(id).map_or(0, Segment::len)
        );
        Ok(id)
    }

    /// Tag every rail reachable from `next` (entered from `source`) with `segment`
    ///
    /// Straight runs are followed in a tight loop; each junction pushes its
    /// remaining branches onto a work list. Closed links are never crossed and
    /// `visited` is shared across calls so loops terminate.
    ///
    /// Returns the number of rails that changed segment.
    ///
    /// # Errors
    ///
    /// Propagates `DisconnectedRail` and `UnknownSegment` from the segment index.
    pub fn explore_straight(
        &mut self,
        segment: SegmentId,
        source: Position,
        next: Position,
        visited: &mut HashSet<Position>,
    ) -> Result<usize, SignallingError> {
        let mut tagged = 0;
        let mut branches = vec![(source, next)];

        while let Some((mut source, mut next)) = branches.pop() {
            if !self.is_open_link(source, next) {
                continue;
            }
            loop {
                if !visited.insert(next) {
                    break;
                }
                if self.assign(next, segment)? {
                    tagged += 1;
                }
                let choices: Vec<Position> = self
                    .open_neighbors(next)
                    .into_iter()
                    .filter(|choice| *choice != source && !visited.contains(choice))
                    .collect();
                match choices.as_slice() {
                    [] => break,
                    [only] => {
                        source = next;
                        next = *only;
                    }
                    _ => {
                        branches.extend(choices.iter().map(|choice| (next, *choice)));
                        break;
                    }
                }
            }
        }
        Ok(tagged)
    }

    /// Relabel the open component around `start` into `target`
    ///
    /// Segments emptied along the way are folded into `target` (their state
    /// included) and their ids retired. Returns the number of rails moved.
    ///
    /// # Errors
    ///
    /// Returns `UnknownSegment` if `target` is not live.
    pub fn propagate_segment(&mut self, target: SegmentId, start: Position) -> Result<usize, SignallingError> {
        if !self.segments.contains(target) {
            return Err(SignallingError::UnknownSegment(target));
        }
        let mut absorbed = IndexSet::new();
        let mut queue = VecDeque::from([start]);
        let mut moved = 0;

        while let Some(position) = queue.pop_front() {
            let Some(current) = self.rails.get(&position).map(Rail::segment) else {
                continue;
            };
            if current == Some(target) {
                continue;
            }
            if let Some(old) = current {
                absorbed.insert(old);
            }
            self.assign(position, target)?;
            moved += 1;
            queue.extend(self.open_neighbors(position));
        }

        for old in absorbed {
            self.absorb_segment(target, old);
        }
        if moved > 0 {
            log!("Propagated segment {} over {} rails from {}", target, moved, start);
        }
        Ok(moved)
    }

    /// Restore the partition around one rail after it or its links changed
    ///
    /// Rails joined by an open link end up in one segment. Across a closed
    /// link the two sides keep separate segments unless a loop joins them.
    ///
    /// # Errors
    ///
    /// Propagates errors from the segment index; the graph is left valid for
    /// every rail that was processed.
    pub fn recalculate_segments_near_vertex(&mut self, position: Position) -> Result<(), SignallingError> {
        #[cfg(feature = "perf_timing")]
        let started = std::time::Instant::now();

        let Some(rail) = self.rails.get(&position) else {
            warn!("Cannot recalculate segments around {position}: no rail loaded");
            return Ok(());
        };
        let neighbors: Vec<Position> = rail.neighbor_rails().map(|(_, neighbor)| neighbor).collect();

        for neighbor in neighbors {
            let own = self.ensure_segment(position)?;
            let theirs = self.live_segment_of(neighbor);
            if self.is_open_link(position, neighbor) {
                if theirs != Some(own) {
                    self.propagate_segment(own, neighbor)?;
                }
                continue;
            }
            match theirs {
                None => {
                    self.map_segment_inheriting(neighbor, None)?;
                }
                Some(id) if id == own && !self.connected_over_open_links(position, neighbor) => {
                    let inherit = self.segment_state(own);
                    self.map_segment_inheriting(neighbor, inherit)?;
                }
                Some(_) => {}
            }
            self.dirty.insert(neighbor);
        }
        self.ensure_segment(position)?;
        self.finish_update()?;

        #[cfg(feature = "perf_timing")]
        crate::logging::log!(
            "[PERF] recalculate_segments_near_vertex({}): {:?}",
            position,
            started.elapsed()
        );
        Ok(())
    }
}
