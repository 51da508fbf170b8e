use super::RailGraph;
use crate::config::GraphConfig;
use crate::error::SignallingError;
use crate::logging::log;
use crate::models::{RailSignal, Segment, SegmentId, SignalKey};
use crate::storage::{GraphSnapshot, RailRecord, SegmentRecord};
use tracing::warn;

impl RailGraph {
    /// Capture rails, signals and segment states
    #[must_use]
    pub fn snapshot(&self) -> GraphSnapshot {
        let mut rails: Vec<RailRecord> = self
            .rails
            .values()
            .map(|rail| RailRecord {
                position: rail.position(),
                shape: rail.shape(),
                segment: rail.segment(),
            })
            .collect();
        rails.sort_by_key(|record| record.position);

        let mut signals: Vec<SignalKey> = self.signals.iter().map(RailSignal::key).collect();
        signals.sort();

        let segments = self
            .segments
            .iter()
            .map(|segment| SegmentRecord {
                id: segment.id(),
                state: segment.state(),
                reservation: segment.reservation(),
            })
            .collect();

        GraphSnapshot {
            rails,
            signals,
            segments,
            pending_rails: self.pending.rails().collect(),
            pending_signals: self.pending.signals().collect(),
        }
    }

    /// Rebuild a graph from a snapshot
    ///
    /// Recorded segment ids are reused when they still describe a valid
    /// partition; otherwise the partition is recomputed, keeping states.
    /// Every guarded signal receives its current state as an event. Parked
    /// track goes back into the pending queue until its region loads.
    ///
    /// # Errors
    ///
    /// Returns `Snapshot` for duplicate rails, signals or segment ids, or
    /// for parked track that overlaps loaded rails.
    pub fn restore(snapshot: &GraphSnapshot, config: GraphConfig) -> Result<Self, SignallingError> {
        let mut graph = Self::with_config(config);
        let size = graph.config.region_size;

        for record in &snapshot.rails {
            if graph.rails.contains_key(&record.position) {
                return Err(SignallingError::Snapshot(format!(
                    "rail {} recorded twice",
                    record.position
                )));
            }
            graph.loaded_regions.insert(record.position.region(size));
            graph.insert_rail(record.position, record.shape);
        }

        for key in &snapshot.signals {
            if graph.signals.contains(*key) {
                return Err(SignallingError::Snapshot(format!("signal {key} recorded twice")));
            }
            if !graph.rails.contains_key(&key.rail) {
                warn!("Dropping recorded signal {key}: no rail under it");
                continue;
            }
            graph.signals.insert(RailSignal::new(*key));
            if let Some(edge) = graph.link_between(key.rail, key.exit_rail()) {
                let link = &mut graph.graph[edge];
                link.signals = link.signals.saturating_add(1);
            }
        }

        for record in &snapshot.segments {
            if !graph.segments.allocate_at(record.id) {
                return Err(SignallingError::Snapshot(format!(
                    "segment {} recorded twice",
                    record.id
                )));
            }
            if let Some(segment) = graph.segments.get_mut(record.id) {
                segment.restore_state(record.state, record.reservation);
            }
        }

        for record in &snapshot.rails {
            let Some(id) = record.segment.filter(|id| graph.segments.contains(*id)) else {
                continue;
            };
            if let Some(segment) = graph.segments.get_mut(id) {
                segment.restore_rail(record.position);
            }
            if let Some(rail) = graph.rails.get_mut(&record.position) {
                rail.set_segment(Some(id));
            }
        }

        let unused: Vec<SegmentId> = graph
            .segments
            .iter()
            .filter(|segment| segment.is_empty())
            .map(Segment::id)
            .collect();
        for id in unused {
            graph.segments.retire(id);
        }

        let keys: Vec<SignalKey> = graph.signals.iter().map(RailSignal::key).collect();
        for key in keys {
            graph.resync_signal(key)?;
        }
        graph.dirty.clear();

        if let Err(err) = graph.validate_partition() {
            warn!("Recorded partition rejected ({err}); recomputing");
            // Events above describe segments that are about to be discarded
            graph.signals.drain_events();
            graph.recompute_all()?;
        }

        for &(position, shape) in &snapshot.pending_rails {
            if graph.rails.contains_key(&position) || graph.pending.has_rail(position) {
                return Err(SignallingError::Snapshot(format!(
                    "parked rail {position} overlaps recorded track"
                )));
            }
            graph.loaded_regions.remove(&position.region(size));
            graph.pending.defer_rail(position, shape);
        }
        for &key in &snapshot.pending_signals {
            if graph.signals.contains(key) || graph.pending.has_signal(key) {
                return Err(SignallingError::Snapshot(format!("signal {key} recorded twice")));
            }
            graph.pending.defer_signal(key);
        }
        log!(
            "Restored {} rails, {} signals, {} segments, {} parked edits",
            graph.rails.len(),
            graph.signals.len(),
            graph.segments.len(),
            graph.pending.len()
        );
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::models::{
        Axis, BlockingState, Direction, Rails, Regions, Reservations, SignalEvent, Signals, TrackShape, TrainId,
    };

    fn signalled_line() -> RailGraph {
        let mut graph = straight_line(4);
        graph
            .add_rail_signal(SignalKey::new(pos(1, 0), Direction::East))
            .expect("signal should be added");
        let protected = graph.segment_of(pos(3, 0)).expect("segment");
        graph
            .attempt_reserve(protected, Some(TrainId(6)))
            .expect("segment exists");
        graph
    }

    #[test]
    fn test_restore_keeps_ids_and_states() {
        let graph = signalled_line();
        let snapshot = graph.snapshot();
        assert_eq!(snapshot.rails.len(), 4);
        assert_eq!(snapshot.signals.len(), 1);

        let mut restored = RailGraph::restore(&snapshot, GraphConfig::default()).expect("valid snapshot");
        assert_valid(&restored);
        for x in 0..4 {
            assert_eq!(restored.segment_of(pos(x, 0)), graph.segment_of(pos(x, 0)));
        }
        let protected = restored.segment_of(pos(3, 0)).expect("segment");
        assert_eq!(
            restored.segment(protected).map(Segment::state),
            Some(BlockingState::Expecting)
        );
        assert_eq!(restored.reservation(protected), Some(TrainId(6)));
        assert_eq!(restored.snapshot(), snapshot);

        // Presentation learns the current aspect of every guarded signal
        assert_eq!(
            restored.drain_signal_events(),
            vec![SignalEvent::StateChanged {
                signal: SignalKey::new(pos(1, 0), Direction::East),
                previous: BlockingState::Expecting,
                current: BlockingState::Expecting,
            }]
        );
    }

    #[test]
    fn test_restore_recomputes_broken_partition() {
        let mut snapshot = signalled_line().snapshot();
        // Claim the whole line is one segment despite the signal
        for record in &mut snapshot.rails {
            record.segment = Some(SegmentId(0));
        }

        let mut restored = RailGraph::restore(&snapshot, GraphConfig::default()).expect("repairable snapshot");
        assert_valid(&restored);
        assert_eq!(restored.segment_count(), 2);
        assert_ne!(restored.segment_of(pos(0, 0)), restored.segment_of(pos(3, 0)));

        // Only the recomputed partition is announced; the rails all claimed
        // the open segment, so that is the state they keep
        let protected = restored.segment_of(pos(3, 0)).expect("segment");
        let key = SignalKey::new(pos(1, 0), Direction::East);
        assert_eq!(restored.signal(key).and_then(RailSignal::guarded_segment), Some(protected));
        assert_eq!(
            restored.drain_signal_events(),
            vec![SignalEvent::StateChanged {
                signal: key,
                previous: BlockingState::Open,
                current: BlockingState::Open,
            }]
        );
    }

    #[test]
    fn test_restore_without_segments() {
        let mut snapshot = signalled_line().snapshot();
        snapshot.segments.clear();
        for record in &mut snapshot.rails {
            record.segment = None;
        }
        let restored = RailGraph::restore(&snapshot, GraphConfig::default()).expect("repairable snapshot");
        assert_valid(&restored);
        assert_eq!(restored.segment_count(), 2);
    }

    #[test]
    fn test_restore_rejects_duplicates() {
        let mut snapshot = signalled_line().snapshot();
        let first = snapshot.rails[0];
        snapshot.rails.push(first);
        assert!(matches!(
            RailGraph::restore(&snapshot, GraphConfig::default()),
            Err(SignallingError::Snapshot(_))
        ));
    }

    #[test]
    fn test_parked_track_survives_restore() {
        let config = GraphConfig {
            region_size: 4,
            defer_unloaded_regions: true,
        };
        let mut graph = RailGraph::with_config(config.clone());
        let left = pos(0, 0).region(4);
        let right = pos(4, 0).region(4);
        graph.region_loaded(left).expect("nothing queued");
        graph.region_loaded(right).expect("nothing queued");
        for x in 0..8 {
            graph
                .add_rail(pos(x, 0), TrackShape::Straight(Axis::EastWest))
                .expect("rail should be added");
        }
        let key = SignalKey::new(pos(5, 0), Direction::East);
        graph.add_rail_signal(key).expect("signal should be added");
        assert_eq!(graph.region_unloaded(right), Ok(4));

        let snapshot = graph.snapshot();
        assert_eq!(snapshot.rails.len(), 4);
        assert_eq!(snapshot.pending_rails.len(), 4);
        assert_eq!(snapshot.pending_signals, vec![key]);

        let mut restored = RailGraph::restore(&snapshot, config).expect("valid snapshot");
        assert_valid(&restored);
        assert_eq!(restored.snapshot(), snapshot);
        assert!(restored.is_region_loaded(left));
        assert!(!restored.is_region_loaded(right));

        assert_eq!(restored.region_loaded(right), Ok(5));
        assert_valid(&restored);
        assert_eq!(restored.rail_count(), 8);
        assert_eq!(restored.segment_count(), 2);
        assert!(restored.signal(key).is_some());
        assert!(restored.pending_updates().is_empty());
    }

    #[test]
    fn test_restore_rejects_parked_rail_over_loaded_track() {
        let mut snapshot = signalled_line().snapshot();
        let first = snapshot.rails[0];
        snapshot.pending_rails.push((first.position, first.shape));
        assert!(matches!(
            RailGraph::restore(&snapshot, GraphConfig::default()),
            Err(SignallingError::Snapshot(_))
        ));
    }
}
