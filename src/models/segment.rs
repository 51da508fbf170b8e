use super::blocking_state::BlockingState;
use super::position::Position;
use super::signal::{SignalKey, SignalTable};
use super::train::TrainId;
use crate::error::SignallingError;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Small recycled identifier of a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentId(pub u32);

impl SegmentId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A section of railway guarded by zero or more signals
///
/// A railway with no signals is a single segment. The segment is the only
/// mutual-exclusion unit: at most one train holds a reservation on it at a time.
#[derive(Debug, Clone)]
pub struct Segment {
    id: SegmentId,
    state: BlockingState,
    reservation: Option<TrainId>,
    guards: IndexSet<SignalKey>,
    rails: IndexSet<Position>,
}

impl Segment {
    pub(crate) fn new(id: SegmentId) -> Self {
        Self {
            id,
            state: BlockingState::Open,
            reservation: None,
            guards: IndexSet::new(),
            rails: IndexSet::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> SegmentId {
        self.id
    }

    #[must_use]
    pub fn state(&self) -> BlockingState {
        self.state
    }

    #[must_use]
    pub fn reservation(&self) -> Option<TrainId> {
        self.reservation
    }

    pub fn guarding_signals(&self) -> impl Iterator<Item = SignalKey> + '_ {
        self.guards.iter().copied()
    }

    #[must_use]
    pub fn has_signal(&self, key: SignalKey) -> bool {
        self.guards.contains(&key)
    }

    pub fn rails(&self) -> impl Iterator<Item = Position> + '_ {
        self.rails.iter().copied()
    }

    #[must_use]
    pub fn contains_rail(&self, position: Position) -> bool {
        self.rails.contains(&position)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rails.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rails.is_empty()
    }

    /// Register a guard and immediately push the current state to it
    ///
    /// # Errors
    ///
    /// Returns `DuplicateSignal` if the signal already guards this segment.
    pub(crate) fn add_rail_signal(
        &mut self,
        key: SignalKey,
        signals: &mut SignalTable,
    ) -> Result<(), SignallingError> {
        if !self.guards.insert(key) {
            return Err(SignallingError::DuplicateSignal(key));
        }
        if let Some(signal) = signals.get_mut(key) {
            signal.set_guarded(Some(self.id));
        }
        signals.notify(key, self.state, self.state);
        Ok(())
    }

    /// Drop a guard. Unknown guards are logged and ignored.
    pub(crate) fn remove_rail_signal(&mut self, key: SignalKey) -> bool {
        if self.guards.shift_remove(&key) {
            true
        } else {
            warn!("Attempting to remove signal {key} that does not guard segment {}", self.id);
            false
        }
    }

    /// Drop a guard that is moving to another segment; no warning if absent
    pub(crate) fn release_guard(&mut self, key: SignalKey) -> bool {
        self.guards.shift_remove(&key)
    }

    /// Add a member rail
    ///
    /// `open_neighbors` are the rails reachable from `position` over links
    /// without a signal. Unless the segment is empty, one of them must
    /// already be a member.
    ///
    /// # Errors
    ///
    /// Returns `DisconnectedRail` when the rail would break the segment's
    /// connectivity.
    pub(crate) fn add_rail(
        &mut self,
        position: Position,
        open_neighbors: &[Position],
    ) -> Result<(), SignallingError> {
        if !self.rails.is_empty()
            && !self.rails.contains(&position)
            && !open_neighbors.iter().any(|n| self.rails.contains(n))
        {
            return Err(SignallingError::DisconnectedRail {
                rail: position,
                segment: self.id,
            });
        }
        self.rails.insert(position);
        Ok(())
    }

    /// Add a member without the adjacency check; callers rebuild whole components
    pub(crate) fn restore_rail(&mut self, position: Position) {
        self.rails.insert(position);
    }

    pub(crate) fn remove_rail(&mut self, position: Position) -> bool {
        self.rails.shift_remove(&position)
    }

    pub(crate) fn take_rails(&mut self) -> Vec<Position> {
        self.rails.drain(..).collect()
    }

    pub(crate) fn take_guards(&mut self) -> Vec<SignalKey> {
        self.guards.drain(..).collect()
    }

    /// Reserve this segment for `train`
    ///
    /// Fails when no train is given, when another train holds the
    /// reservation, or when the segment is not open. A repeated request by
    /// the current holder succeeds without a transition.
    pub(crate) fn attempt_reserve(&mut self, train: Option<TrainId>, signals: &mut SignalTable) -> bool {
        let Some(train) = train else {
            return false;
        };
        match self.reservation {
            Some(holder) if holder == train => return true,
            Some(_) => return false,
            None => {}
        }
        if self.state != BlockingState::Open {
            return false;
        }
        self.reservation = Some(train);
        self.set_state(BlockingState::Expecting, signals);
        true
    }

    /// A train physically entered the segment
    ///
    /// The track is trusted hardware: a mismatched or missing reservation is
    /// logged and the segment is closed behind whichever train entered.
    pub(crate) fn on_enter(&mut self, train: TrainId, signals: &mut SignalTable) -> BlockingState {
        match self.state {
            BlockingState::Open => {
                warn!("{train} entered segment {} without a reservation", self.id);
                self.reservation = Some(train);
                self.set_state(BlockingState::Expecting, signals);
                self.set_state(BlockingState::Closed, signals);
            }
            BlockingState::Expecting => {
                if self.reservation != Some(train) {
                    warn!(
                        "{train} entered segment {} reserved for {:?}",
                        self.id, self.reservation
                    );
                    self.reservation = Some(train);
                }
                self.set_state(BlockingState::Closed, signals);
            }
            BlockingState::Closed => {
                if self.reservation != Some(train) {
                    warn!("{train} entered occupied segment {}", self.id);
                }
            }
        }
        self.state
    }

    /// The reserving train left the segment
    ///
    /// Only the train that holds the reservation of a closed segment can
    /// release it; anything else is logged and ignored.
    pub(crate) fn on_exit(&mut self, train: TrainId, signals: &mut SignalTable) -> bool {
        if self.state != BlockingState::Closed {
            warn!("{train} left segment {} which is {:?}", self.id, self.state);
            return false;
        }
        if self.reservation != Some(train) {
            warn!(
                "{train} left segment {} occupied by {:?}",
                self.id, self.reservation
            );
            return false;
        }
        self.reservation = None;
        self.set_state(BlockingState::Open, signals);
        true
    }

    /// Step forward through the cycle until `target` is reached
    ///
    /// Only moves towards more restrictive states; used when a segment takes
    /// over rails (and possibly a train) from another one.
    pub(crate) fn advance_to(
        &mut self,
        target: BlockingState,
        reservation: Option<TrainId>,
        signals: &mut SignalTable,
    ) {
        match (self.reservation, reservation) {
            (None, Some(train)) => self.reservation = Some(train),
            (Some(ours), Some(theirs)) if ours != theirs => {
                warn!(
                    "Segment {} keeps {ours}; dropping conflicting reservation of {theirs}",
                    self.id
                );
            }
            _ => {}
        }
        if target.severity() <= self.state.severity() {
            return;
        }
        while self.state != target {
            let next = self.state.successor();
            self.set_state(next, signals);
        }
    }

    fn set_state(&mut self, next: BlockingState, signals: &mut SignalTable) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {:?} -> {next:?}",
            self.state
        );
        let previous = self.state;
        self.state = next;
        for key in &self.guards {
            signals.notify(*key, previous, next);
        }
    }

    pub(crate) fn restore_state(&mut self, state: BlockingState, reservation: Option<TrainId>) {
        self.state = state;
        self.reservation = reservation;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Direction, RailSignal, SignalEvent};

    fn guarded_segment() -> (Segment, SignalTable, SignalKey) {
        let key = SignalKey::new(Position::new(0, 0, 0), Direction::East);
        let mut signals = SignalTable::default();
        signals.insert(RailSignal::new(key));
        let mut segment = Segment::new(SegmentId(0));
        segment.add_rail(Position::new(1, 0, 0), &[]).expect("empty segment accepts any rail");
        segment.add_rail_signal(key, &mut signals).expect("first registration");
        signals.drain_events();
        (segment, signals, key)
    }

    #[test]
    fn test_add_rail_signal_pushes_current_state() {
        let key = SignalKey::new(Position::new(0, 0, 0), Direction::East);
        let mut signals = SignalTable::default();
        signals.insert(RailSignal::new(key));
        let mut segment = Segment::new(SegmentId(3));

        segment.add_rail_signal(key, &mut signals).expect("first registration");
        assert_eq!(
            signals.pending_events(),
            &[SignalEvent::StateChanged {
                signal: key,
                previous: BlockingState::Open,
                current: BlockingState::Open,
            }]
        );
        assert_eq!(signals.get(key).and_then(RailSignal::guarded_segment), Some(SegmentId(3)));
    }

    #[test]
    fn test_duplicate_signal_registration_fails() {
        let (mut segment, mut signals, key) = guarded_segment();
        assert_eq!(
            segment.add_rail_signal(key, &mut signals),
            Err(SignallingError::DuplicateSignal(key))
        );
    }

    #[test]
    fn test_remove_unknown_signal_is_ignored() {
        let (mut segment, _signals, key) = guarded_segment();
        assert!(!segment.remove_rail_signal(key.reversed()));
        assert!(segment.remove_rail_signal(key));
        assert!(!segment.has_signal(key));
    }

    #[test]
    fn test_add_disconnected_rail_fails() {
        let mut segment = Segment::new(SegmentId(1));
        segment.add_rail(Position::new(0, 0, 0), &[]).expect("first rail");
        segment
            .add_rail(Position::new(1, 0, 0), &[Position::new(0, 0, 0)])
            .expect("adjacent rail");

        let err = segment.add_rail(Position::new(5, 0, 0), &[Position::new(6, 0, 0)]);
        assert_eq!(
            err,
            Err(SignallingError::DisconnectedRail {
                rail: Position::new(5, 0, 0),
                segment: SegmentId(1),
            })
        );
        assert_eq!(segment.len(), 2);
    }

    #[test]
    fn test_reservation_is_exclusive() {
        let (mut segment, mut signals, key) = guarded_segment();
        let t1 = TrainId(1);
        let t2 = TrainId(2);

        assert!(!segment.attempt_reserve(None, &mut signals));
        assert!(segment.attempt_reserve(Some(t1), &mut signals));
        assert_eq!(segment.state(), BlockingState::Expecting);
        assert!(!segment.attempt_reserve(Some(t2), &mut signals));
        assert_eq!(segment.state(), BlockingState::Expecting);
        assert_eq!(segment.reservation(), Some(t1));

        // Repeat by the holder is accepted without another transition
        assert!(segment.attempt_reserve(Some(t1), &mut signals));
        let events = signals.drain_events();
        assert_eq!(
            events,
            vec![SignalEvent::StateChanged {
                signal: key,
                previous: BlockingState::Open,
                current: BlockingState::Expecting,
            }]
        );
    }

    #[test]
    fn test_full_cycle() {
        let (mut segment, mut signals, _key) = guarded_segment();
        let train = TrainId(9);

        assert!(segment.attempt_reserve(Some(train), &mut signals));
        assert_eq!(segment.on_enter(train, &mut signals), BlockingState::Closed);
        assert!(!segment.attempt_reserve(Some(TrainId(10)), &mut signals));
        assert!(segment.on_exit(train, &mut signals));
        assert_eq!(segment.state(), BlockingState::Open);
        assert_eq!(segment.reservation(), None);

        let states: Vec<BlockingState> = signals
            .drain_events()
            .into_iter()
            .filter_map(|event| match event {
                SignalEvent::StateChanged { current, .. } => Some(current),
                SignalEvent::Unguarded { .. } => None,
            })
            .collect();
        assert_eq!(
            states,
            vec![BlockingState::Expecting, BlockingState::Closed, BlockingState::Open]
        );
    }

    #[test]
    fn test_enter_without_reservation_walks_the_cycle() {
        let (mut segment, mut signals, _key) = guarded_segment();
        assert_eq!(segment.on_enter(TrainId(4), &mut signals), BlockingState::Closed);
        assert_eq!(segment.reservation(), Some(TrainId(4)));
        assert_eq!(signals.drain_events().len(), 2);
    }

    #[test]
    fn test_exit_by_wrong_train_is_ignored() {
        let (mut segment, mut signals, _key) = guarded_segment();
        assert!(segment.attempt_reserve(Some(TrainId(1)), &mut signals));
        assert!(!segment.on_exit(TrainId(1), &mut signals));
        segment.on_enter(TrainId(1), &mut signals);
        assert!(!segment.on_exit(TrainId(2), &mut signals));
        assert_eq!(segment.state(), BlockingState::Closed);
    }

    #[test]
    fn test_advance_to_steps_through_expecting() {
        let (mut segment, mut signals, _key) = guarded_segment();
        segment.advance_to(BlockingState::Closed, Some(TrainId(7)), &mut signals);
        assert_eq!(segment.state(), BlockingState::Closed);
        assert_eq!(segment.reservation(), Some(TrainId(7)));
        assert_eq!(signals.drain_events().len(), 2);

        // Never relaxes
        segment.advance_to(BlockingState::Open, None, &mut signals);
        assert_eq!(segment.state(), BlockingState::Closed);
        assert!(signals.drain_events().is_empty());
    }
}
