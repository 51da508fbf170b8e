use super::blocking_state::BlockingState;
use super::position::{Direction, Position, RegionKey};
use super::rail::{Rail, TrackShape};
use super::segment::{Segment, SegmentId};
use super::segment_pool::SegmentPool;
use super::signal::{RailSignal, SignalEvent, SignalKey, SignalTable};
use super::train::TrainId;
use crate::config::GraphConfig;
use crate::error::SignallingError;
use indexmap::IndexSet;
use petgraph::algo::has_path_connecting;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableUnGraph};
use petgraph::unionfind::UnionFind;
use petgraph::visit::{EdgeFiltered, EdgeRef, IntoEdgeReferences, NodeIndexable};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::warn;

mod persistence;
mod rails;
mod regions;
mod reservations;
mod signals;
mod traversal;

pub use rails::Rails;
pub use regions::{PendingUpdates, Regions};
pub use reservations::Reservations;
pub use signals::Signals;

/// Physical connection between two adjacent rails
///
/// A link with at least one signal on it is closed: segments never extend
/// across it except around a loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Link {
    pub signals: u8,
}

impl Link {
    #[must_use]
    pub fn is_open(self) -> bool {
        self.signals == 0
    }
}

/// Result of handing a rail or signal to the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// Attached; the rail's segment, or the segment the signal protects
    Linked(SegmentId),
    /// Signal registered but nothing on its protected side yet
    Unlinked,
    /// Queued until its region becomes available
    Deferred,
}

impl LinkOutcome {
    #[must_use]
    pub fn segment(self) -> Option<SegmentId> {
        match self {
            LinkOutcome::Linked(id) => Some(id),
            LinkOutcome::Unlinked | LinkOutcome::Deferred => None,
        }
    }
}

/// Every loaded rail of one world, its signals and the segment partition
///
/// The adjacency graph is authoritative. Segments are a view over it: each
/// segment is one connected component of the graph restricted to open links.
#[derive(Debug, Clone, Default)]
pub struct RailGraph {
    graph: StableUnGraph<Position, Link>,
    rails: HashMap<Position, Rail>,
    signals: SignalTable,
    segments: SegmentPool,
    pending: PendingUpdates,
    loaded_regions: HashSet<RegionKey>,
    config: GraphConfig,
    /// Rails whose segment or links changed during the current update
    dirty: IndexSet<Position>,
    /// Segments that lost rails during the current update
    vacated: IndexSet<SegmentId>,
}

impl RailGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(config: GraphConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// The underlying adjacency graph
    #[must_use]
    pub fn graph(&self) -> &StableUnGraph<Position, Link> {
        &self.graph
    }

    #[must_use]
    pub fn rail(&self, position: Position) -> Option<&Rail> {
        self.rails.get(&position)
    }

    pub fn rails(&self) -> impl Iterator<Item = &Rail> {
        self.rails.values()
    }

    #[must_use]
    pub fn rail_count(&self) -> usize {
        self.rails.len()
    }

    #[must_use]
    pub fn segment(&self, id: SegmentId) -> Option<&Segment> {
        self.segments.get(id)
    }

    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter()
    }

    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Segment the rail at `position` currently belongs to
    #[must_use]
    pub fn segment_of(&self, position: Position) -> Option<SegmentId> {
        self.live_segment_of(position)
    }

    /// Member rails of a segment, sorted by position
    #[must_use]
    pub fn rails_in(&self, id: SegmentId) -> Vec<Position> {
        let mut rails: Vec<Position> = self
            .segments
            .get(id)
            .map(|segment| segment.rails().collect())
            .unwrap_or_default();
        rails.sort();
        rails
    }

    /// Signals currently guarding a segment, sorted
    #[must_use]
    pub fn signals_guarding(&self, id: SegmentId) -> Vec<SignalKey> {
        let mut keys: Vec<SignalKey> = self
            .segments
            .get(id)
            .map(|segment| segment.guarding_signals().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    #[must_use]
    pub fn signal(&self, key: SignalKey) -> Option<&RailSignal> {
        self.signals.get(key)
    }

    pub fn signals(&self) -> impl Iterator<Item = &RailSignal> {
        self.signals.iter()
    }

    /// The signal on `position` controlling travel towards `direction`
    #[must_use]
    pub fn rail_signal_blocking(&self, position: Position, direction: Direction) -> Option<&RailSignal> {
        self.signals.get(SignalKey::new(position, direction))
    }

    /// Whether the link leaving `position` towards `direction` exists and carries no signal
    #[must_use]
    pub fn is_open_toward(&self, position: Position, direction: Direction) -> bool {
        self.link_between(position, position.offset(direction))
            .is_some_and(|edge| self.graph[edge].is_open())
    }

    /// Hand all queued signal notifications to the presentation layer
    pub fn drain_signal_events(&mut self) -> Vec<SignalEvent> {
        self.signals.drain_events()
    }

    /// Check every structural invariant of the partition
    ///
    /// # Errors
    ///
    /// Returns `Partition` describing the first violation found.
    pub fn validate_partition(&self) -> Result<(), SignallingError> {
        let violation = |message: String| Err(SignallingError::Partition(message));

        for rail in self.rails.values() {
            let position = rail.position();
            let Some(id) = rail.segment() else {
                return violation(format!("rail {position} has no segment"));
            };
            let Some(segment) = self.segments.get(id) else {
                return violation(format!("rail {position} points at retired segment {id}"));
            };
            if !segment.contains_rail(position) {
                return violation(format!("segment {id} does not list rail {position}"));
            }
        }

        for segment in self.segments.iter() {
            let id = segment.id();
            if segment.is_empty() {
                return violation(format!("segment {id} is live but empty"));
            }
            for position in segment.rails() {
                if self.rails.get(&position).and_then(Rail::segment) != Some(id) {
                    return violation(format!("segment {id} lists foreign rail {position}"));
                }
            }
            let Some(first) = segment.rails().next() else {
                continue;
            };
            let reachable = self.open_component(first);
            if reachable.len() != segment.len() {
                return violation(format!(
                    "segment {id} has {} rails but {} are connected",
                    segment.len(),
                    reachable.len()
                ));
            }
            for key in segment.guarding_signals() {
                if self.signals.get(key).and_then(RailSignal::guarded_segment) != Some(id) {
                    return violation(format!("segment {id} lists stale guard {key}"));
                }
            }
        }

        for edge in self.graph.edge_references() {
            let a = self.graph[edge.source()];
            let b = self.graph[edge.target()];
            let Some(direction) = Direction::between(a, b) else {
                return violation(format!("link {a} - {b} joins cells that are not adjacent"));
            };
            let expected = self.count_signals_on_link(a, direction);
            if edge.weight().signals != expected {
                return violation(format!(
                    "link {a} - {b} counts {} signals, found {expected}",
                    edge.weight().signals
                ));
            }
            if edge.weight().is_open() && self.live_segment_of(a) != self.live_segment_of(b) {
                return violation(format!("open link {a} - {b} spans two segments"));
            }
        }

        for signal in self.signals.iter() {
            let key = signal.key();
            let expected = self.protected_segment(key);
            if signal.guarded_segment() != expected {
                return violation(format!(
                    "signal {key} guards {:?}, expected {expected:?}",
                    signal.guarded_segment()
                ));
            }
            if let Some(id) = expected {
                if !self.segments.get(id).is_some_and(|segment| segment.has_signal(key)) {
                    return violation(format!("segment {id} is missing guard {key}"));
                }
            }
        }

        Ok(())
    }

    /// Rebuild the whole partition from the adjacency graph
    ///
    /// Rails that shared a segment keep its state: each new segment adopts
    /// the most restrictive state found among its rails' previous segments.
    ///
    /// # Errors
    ///
    /// Propagates invariant violations from segment bookkeeping.
    pub fn recompute_all(&mut self) -> Result<(), SignallingError> {
        let mut sets = UnionFind::new(self.graph.node_bound());
        for edge in self.graph.edge_references() {
            if edge.weight().is_open() {
                sets.union(edge.source().index(), edge.target().index());
            }
        }

        let previous: HashMap<Position, (BlockingState, Option<TrainId>)> = self
            .rails
            .values()
            .filter_map(|rail| {
                let state = self.segment_state(rail.segment()?)?;
                Some((rail.position(), state))
            })
            .collect();

        self.segments.clear();
        self.vacated.clear();
        self.dirty.clear();
        let keys: Vec<SignalKey> = self.signals.iter().map(RailSignal::key).collect();

        let mut positions: Vec<Position> = self.rails.keys().copied().collect();
        positions.sort();
        let mut roots: HashMap<usize, SegmentId> = HashMap::new();
        for position in positions {
            let Some(node) = self.rails.get(&position).map(|rail| rail.node) else {
                continue;
            };
            let root = sets.find(node.index());
            let id = *roots.entry(root).or_insert_with(|| self.segments.allocate());
            if let Some(segment) = self.segments.get_mut(id) {
                segment.restore_rail(position);
                if let Some((state, reservation)) = previous.get(&position) {
                    segment.advance_to(*state, *reservation, &mut self.signals);
                }
            }
            if let Some(rail) = self.rails.get_mut(&position) {
                rail.set_segment(Some(id));
            }
        }

        for key in keys {
            self.resync_signal(key)?;
        }
        crate::logging::log!(
            "Recomputed partition: {} rails in {} segments",
            self.rails.len(),
            self.segments.len()
        );
        Ok(())
    }

    fn live_segment_of(&self, position: Position) -> Option<SegmentId> {
        self.rails
            .get(&position)
            .and_then(Rail::segment)
            .filter(|id| self.segments.contains(*id))
    }

    fn segment_state(&self, id: SegmentId) -> Option<(BlockingState, Option<TrainId>)> {
        self.segments
            .get(id)
            .map(|segment| (segment.state(), segment.reservation()))
    }

    fn region_available(&self, position: Position) -> bool {
        !self.config.defer_unloaded_regions
            || self
                .loaded_regions
                .contains(&position.region(self.config.region_size))
    }

    fn link_between(&self, a: Position, b: Position) -> Option<EdgeIndex> {
        let a = self.rails.get(&a)?.node;
        let b = self.rails.get(&b)?.node;
        self.graph.find_edge(a, b)
    }

    fn is_open_link(&self, a: Position, b: Position) -> bool {
        self.link_between(a, b)
            .is_some_and(|edge| self.graph[edge].is_open())
    }

    /// Neighbours reachable from `position` over links without a signal
    fn open_neighbors(&self, position: Position) -> Vec<Position> {
        let Some(rail) = self.rails.get(&position) else {
            return Vec::new();
        };
        rail.neighbor_rails()
            .filter(|(direction, _)| self.is_open_toward(position, *direction))
            .map(|(_, neighbor)| neighbor)
            .collect()
    }

    /// Connectivity test that ignores every closed link
    fn connected_over_open_links(&self, from: Position, to: Position) -> bool {
        let (Some(a), Some(b)) = (self.rails.get(&from), self.rails.get(&to)) else {
            return false;
        };
        let open = EdgeFiltered::from_fn(&self.graph, |edge| edge.weight().is_open());
        has_path_connecting(&open, a.node, b.node, None)
    }

    /// Every rail reachable from `start` over open links
    fn open_component(&self, start: Position) -> HashSet<Position> {
        let mut seen = HashSet::new();
        if !self.rails.contains_key(&start) {
            return seen;
        }
        let mut queue = VecDeque::from([start]);
        seen.insert(start);
        while let Some(position) = queue.pop_front() {
            for neighbor in self.open_neighbors(position) {
                if seen.insert(neighbor) {
                    queue.push_back(neighbor);
                }
            }
        }
        seen
    }

    fn count_signals_on_link(&self, position: Position, direction: Direction) -> u8 {
        let key = SignalKey::new(position, direction);
        u8::from(self.signals.contains(key)) + u8::from(self.signals.contains(key.reversed()))
    }

    /// Signals mounted on `position` plus those whose protected side starts there
    fn signals_near(&self, position: Position) -> Vec<SignalKey> {
        let mut keys = Vec::new();
        for direction in Direction::ALL {
            let mounted = SignalKey::new(position, direction);
            if self.signals.contains(mounted) {
                keys.push(mounted);
            }
            let facing = SignalKey::new(position.offset(direction), direction.opposite());
            if self.signals.contains(facing) {
                keys.push(facing);
            }
        }
        keys
    }

    /// The segment a signal should guard right now
    fn protected_segment(&self, key: SignalKey) -> Option<SegmentId> {
        self.link_between(key.rail, key.exit_rail())?;
        self.live_segment_of(key.exit_rail())
    }

    /// Move a rail into `segment`, keeping both sides of the index in step
    ///
    /// Returns `false` if the rail already belonged to it.
    fn assign(&mut self, position: Position, segment: SegmentId) -> Result<bool, SignallingError> {
        let old = self.rails.get(&position).and_then(Rail::segment);
        if old == Some(segment) && self.segments.contains(segment) {
            return Ok(false);
        }
        let open = self.open_neighbors(position);
        self.segments
            .get_mut(segment)
            .ok_or(SignallingError::UnknownSegment(segment))?
            .add_rail(position, &open)?;
        if let Some(old) = old.filter(|old| *old != segment) {
            self.detach_rail(old, position);
        }
        if let Some(rail) = self.rails.get_mut(&position) {
            rail.set_segment(Some(segment));
        }
        self.dirty.insert(position);
        Ok(true)
    }

    fn detach_rail(&mut self, segment: SegmentId, position: Position) {
        if let Some(old) = self.segments.get_mut(segment) {
            old.remove_rail(position);
            if old.is_empty() {
                self.vacated.insert(segment);
            }
        }
    }

    /// Make sure the rail has a live segment, joining an open neighbour's if possible
    fn ensure_segment(&mut self, position: Position) -> Result<SegmentId, SignallingError> {
        if let Some(id) = self.live_segment_of(position) {
            return Ok(id);
        }
        if let Some(stale) = self.rails.get(&position).and_then(Rail::segment) {
            warn!("Rail {position} still pointed at retired segment {stale}");
        }
        let adopted = self
            .open_neighbors(position)
            .into_iter()
            .find_map(|neighbor| self.live_segment_of(neighbor));
        match adopted {
            Some(id) => {
                self.assign(position, id)?;
                Ok(id)
            }
            None => self.map_segment_inheriting(position, None),
        }
    }

    /// Fold an emptied segment into `target` and free its id
    fn absorb_segment(&mut self, target: SegmentId, absorbed: SegmentId) {
        if target == absorbed {
            return;
        }
        let Some((state, reservation)) = self.segment_state(absorbed) else {
            return;
        };
        if self.segments.get(absorbed).is_some_and(|segment| !segment.is_empty()) {
            warn!("Segment {absorbed} was only partly merged into {target}");
            return;
        }
        if let Some(segment) = self.segments.get_mut(target) {
            segment.advance_to(state, reservation, &mut self.signals);
        }
        self.segments.retire(absorbed);
        self.vacated.shift_remove(&absorbed);
        crate::logging::log!("Merged segment {} into {}", absorbed, target);
    }

    /// Point a signal at the segment on its protected side
    fn resync_signal(&mut self, key: SignalKey) -> Result<(), SignallingError> {
        let Some(current) = self.signals.get(key).map(RailSignal::guarded_segment) else {
            return Ok(());
        };
        let target = self.protected_segment(key);
        if current == target
            && target.map_or(true, |id| self.segments.get(id).is_some_and(|s| s.has_signal(key)))
        {
            return Ok(());
        }
        if let Some(old) = current {
            if let Some(segment) = self.segments.get_mut(old) {
                segment.release_guard(key);
            }
        }
        match target {
            Some(id) => {
                let segment = self
                    .segments
                    .get_mut(id)
                    .ok_or(SignallingError::UnknownSegment(id))?;
                segment.release_guard(key);
                segment.add_rail_signal(key, &mut self.signals)?;
            }
            None => {
                if let Some(signal) = self.signals.get_mut(key) {
                    let event = signal.on_unguarded();
                    self.signals.push_event(event);
                }
            }
        }
        Ok(())
    }

    /// Close out a structural update: free emptied ids and refresh guards
    fn finish_update(&mut self) -> Result<(), SignallingError> {
        for id in std::mem::take(&mut self.vacated) {
            if self.segments.get(id).is_some_and(Segment::is_empty) {
                if let Some(train) = self.segments.get(id).and_then(Segment::reservation) {
                    warn!("Retiring segment {id} while reserved by {train}");
                }
                self.segments.retire(id);
            }
        }
        let dirty = std::mem::take(&mut self.dirty);
        let mut keys: IndexSet<SignalKey> = IndexSet::new();
        for position in dirty {
            keys.extend(self.signals_near(position));
        }
        for key in keys {
            self.resync_signal(key)?;
        }
        Ok(())
    }

    /// Create the node and the mutually agreed links for a new rail
    fn insert_rail(&mut self, position: Position, shape: TrackShape) -> NodeIndex {
        let node = self.graph.add_node(position);
        let mut rail = Rail::new(position, shape, node);
        for direction in shape.connections().directions() {
            let neighbor_position = position.offset(direction);
            let Some(neighbor) = self.rails.get_mut(&neighbor_position) else {
                // Soft connection: nothing loaded there yet
                continue;
            };
            if !neighbor.is_connected_to(direction.opposite()) {
                continue;
            }
            neighbor.link(direction.opposite());
            let neighbor_node = neighbor.node;
            rail.link(direction);
            let signals = self.count_signals_on_link(position, direction);
            self.graph.add_edge(node, neighbor_node, Link { signals });
            self.dirty.insert(neighbor_position);
        }
        self.rails.insert(position, rail);
        self.dirty.insert(position);
        node
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::models::{Axis, Connections};
    use proptest::prelude::*;

    #[test]
    fn test_empty_graph_is_valid() {
        let graph = RailGraph::new();
        assert_valid(&graph);
        assert_eq!(graph.segment_count(), 0);
    }

    #[test]
    fn test_open_and_closed_links() {
        let mut graph = straight_line(3);
        assert!(graph.is_open_toward(pos(1, 0), Direction::East));
        assert!(!graph.is_open_toward(pos(2, 0), Direction::East));

        graph
            .add_rail_signal(SignalKey::new(pos(1, 0), Direction::East))
            .expect("signal should be added");
        assert!(!graph.is_open_toward(pos(1, 0), Direction::East));
        assert!(!graph.is_open_toward(pos(2, 0), Direction::West));
        assert!(graph
            .rail_signal_blocking(pos(1, 0), Direction::East)
            .is_some());
        assert!(graph
            .rail_signal_blocking(pos(2, 0), Direction::West)
            .is_none());
    }

    #[test]
    fn test_validate_detects_broken_back_reference() {
        let mut graph = straight_line(2);
        if let Some(rail) = graph.rails.get_mut(&pos(1, 0)) {
            rail.set_segment(None);
        }
        assert!(matches!(
            graph.validate_partition(),
            Err(SignallingError::Partition(_))
        ));
    }

    #[test]
    fn test_recompute_all_preserves_partition_and_state() {
        let mut graph = straight_line(4);
        graph
            .add_rail_signal(SignalKey::new(pos(1, 0), Direction::East))
            .expect("signal should be added");
        let far = graph.segment_of(pos(3, 0)).expect("segment");
        graph
            .attempt_reserve(far, Some(TrainId(5)))
            .expect("segment exists");

        graph.recompute_all().expect("recompute should succeed");
        assert_valid(&graph);
        assert_eq!(graph.segment_count(), 2);
        let far = graph.segment_of(pos(3, 0)).expect("segment");
        let near = graph.segment_of(pos(0, 0)).expect("segment");
        assert_ne!(far, near);
        assert_eq!(graph.segment(far).map(Segment::state), Some(BlockingState::Expecting));
        assert_eq!(graph.reservation(far), Some(TrainId(5)));
        assert_eq!(graph.segment(near).map(Segment::state), Some(BlockingState::Open));
    }

    #[derive(Debug, Clone)]
    enum Edit {
        AddRail(i32, i32, bool),
        RemoveRail(i32, i32),
        AddSignal(i32, i32, Direction),
        RemoveSignal(i32, i32, Direction),
        Reserve(i32, i32, u64),
    }

    fn level_direction() -> impl Strategy<Value = Direction> {
        prop_oneof![
            Just(Direction::North),
            Just(Direction::South),
            Just(Direction::East),
            Just(Direction::West),
        ]
    }

    fn edit() -> impl Strategy<Value = Edit> {
        prop_oneof![
            4 => (0..4i32, 0..4i32, any::<bool>()).prop_map(|(x, z, j)| Edit::AddRail(x, z, j)),
            1 => (0..4i32, 0..4i32).prop_map(|(x, z)| Edit::RemoveRail(x, z)),
            2 => (0..4i32, 0..4i32, level_direction()).prop_map(|(x, z, d)| Edit::AddSignal(x, z, d)),
            1 => (0..4i32, 0..4i32, level_direction()).prop_map(|(x, z, d)| Edit::RemoveSignal(x, z, d)),
            1 => (0..4i32, 0..4i32, 1..3u64).prop_map(|(x, z, t)| Edit::Reserve(x, z, t)),
        ]
    }

    fn apply(graph: &mut RailGraph, edit: &Edit) {
        // Rejected edits (duplicates, missing rails) are part of the exercise
        let _ = match *edit {
            Edit::AddRail(x, z, junction) => {
                let shape = if junction {
                    TrackShape::Junction(Connections::LEVEL)
                } else {
                    TrackShape::Straight(Axis::EastWest)
                };
                graph.add_rail(pos(x, z), shape).map(|_| ())
            }
            Edit::RemoveRail(x, z) => graph.remove_rail(pos(x, z)).map(|_| ()),
            Edit::AddSignal(x, z, d) => graph.add_rail_signal(SignalKey::new(pos(x, z), d)).map(|_| ()),
            Edit::RemoveSignal(x, z, d) => graph
                .remove_rail_signal(SignalKey::new(pos(x, z), d))
                .map(|_| ()),
            Edit::Reserve(x, z, train) => match graph.segment_of(pos(x, z)) {
                Some(id) => graph.attempt_reserve(id, Some(TrainId(train))).map(|_| ()),
                None => Ok(()),
            },
        };
    }

    proptest! {
        #[test]
        fn prop_partition_holds_after_every_edit(edits in prop::collection::vec(edit(), 1..40)) {
            let mut graph = RailGraph::new();
            for edit in &edits {
                apply(&mut graph, edit);
                prop_assert!(graph.validate_partition().is_ok(), "{:?} after {:?}", graph.validate_partition(), edit);
            }
        }

        #[test]
        fn prop_segment_ids_are_unique_and_dense(edits in prop::collection::vec(edit(), 1..40)) {
            let mut graph = RailGraph::new();
            for edit in &edits {
                apply(&mut graph, edit);
            }
            let ids: Vec<SegmentId> = graph.segments().map(Segment::id).collect();
            let unique: HashSet<SegmentId> = ids.iter().copied().collect();
            prop_assert_eq!(ids.len(), unique.len());
            prop_assert!(ids.len() <= graph.rail_count());
        }

        #[test]
        fn prop_recalculation_is_idempotent(edits in prop::collection::vec(edit(), 1..30)) {
            let mut graph = RailGraph::new();
            for edit in &edits {
                apply(&mut graph, edit);
            }
            graph.drain_signal_events();
            let before: Vec<(Position, Option<SegmentId>)> = {
                let mut v: Vec<_> = graph.rails().map(|r| (r.position(), r.segment())).collect();
                v.sort();
                v
            };
            let positions: Vec<Position> = before.iter().map(|(p, _)| *p).collect();
            for position in positions {
                graph.recalculate_segments_near_vertex(position).expect("recalculation");
            }
            let after: Vec<(Position, Option<SegmentId>)> = {
                let mut v: Vec<_> = graph.rails().map(|r| (r.position(), r.segment())).collect();
                v.sort();
                v
            };
            prop_assert_eq!(before, after);
            prop_assert!(graph.drain_signal_events().is_empty());
        }

        #[test]
        fn prop_every_transition_reaches_every_guard(edits in prop::collection::vec(edit(), 1..30), train in 1..5u64) {
            let mut graph = RailGraph::new();
            for edit in &edits {
                apply(&mut graph, edit);
            }
            graph.drain_signal_events();
            let ids: Vec<SegmentId> = graph.segments().map(Segment::id).collect();
            for id in ids {
                let guards = graph.signals_guarding(id);
                let before = graph.segment(id).map(Segment::state);
                let reserved = graph.attempt_reserve(id, Some(TrainId(train))).expect("live segment");
                let after = graph.segment(id).map(Segment::state);
                let events = graph.drain_signal_events();
                if reserved && before != after {
                    prop_assert_eq!(events.len(), guards.len());
                    for event in events {
                        prop_assert!(guards.contains(&event.signal()));
                    }
                } else {
                    prop_assert!(events.is_empty());
                }
            }
        }
    }
}
